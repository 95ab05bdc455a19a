//! Error types shared by every vmws crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised error kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VmwsErrorKind {
    /// Bad user input: malformed MAC, USB id, path, conflicting flags.
    InvalidInput,
    /// No instance matched the given id / name / path.
    VmNotFound,
    /// An instance with the requested name or path already exists.
    AlreadyExists,
    /// The operation requires a different power state.
    WrongPowerState,
    /// The shell or child process could not be run.
    RemoteExecFailed,
    /// A command exited non-zero under the check policy.
    RemoteNonZeroExit,
    /// TCP / TLS / SSH transport failure.
    TransportFailed,
    /// Input that cannot be expressed as HID key events.
    Unencodable,
    /// The instance is encrypted; further queries are suppressed.
    EncryptedInstance,
    /// Incomplete or inconsistent configuration.
    ConfigError,
    /// A wait exceeded its budget.
    Timeout,
    /// Output from the host could not be parsed.
    ParseError,
    /// HTTP API returned a non-success status.
    ApiError(u16),
    /// Local filesystem error.
    Io,
}

/// Crate error type carrying a kind, a human-readable message and optional
/// details (usually captured stderr or a response body).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmwsError {
    pub kind: VmwsErrorKind,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl fmt::Display for VmwsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)?;
        if let Some(ref d) = self.details {
            write!(f, " ({})", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for VmwsError {}

impl VmwsError {
    pub fn new(kind: VmwsErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        kind: VmwsErrorKind,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Some(details.into()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(VmwsErrorKind::InvalidInput, message)
    }

    pub fn vm_not_found(vid: &str) -> Self {
        Self::new(VmwsErrorKind::VmNotFound, format!("VM '{}' not found", vid))
    }

    pub fn already_exists(what: &str) -> Self {
        Self::new(
            VmwsErrorKind::AlreadyExists,
            format!("'{}' already exists", what),
        )
    }

    pub fn wrong_power_state(vm: &str, current: &str, expected: &str) -> Self {
        Self::new(
            VmwsErrorKind::WrongPowerState,
            format!(
                "VM '{}' is in power state '{}', expected '{}'",
                vm, current, expected
            ),
        )
    }

    pub fn exec_failed(command: &str, reason: impl Into<String>) -> Self {
        Self::with_details(
            VmwsErrorKind::RemoteExecFailed,
            format!("failed to run '{}'", command),
            reason,
        )
    }

    pub fn non_zero_exit(command: &str, exit_code: i32, stderr: &[String]) -> Self {
        let message = format!("'{}' exited with code {}", command, exit_code);
        if stderr.is_empty() {
            Self::new(VmwsErrorKind::RemoteNonZeroExit, message)
        } else {
            Self::with_details(VmwsErrorKind::RemoteNonZeroExit, message, stderr.join("; "))
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(VmwsErrorKind::TransportFailed, message)
    }

    pub fn unencodable(message: impl Into<String>) -> Self {
        Self::new(VmwsErrorKind::Unencodable, message)
    }

    pub fn encrypted(vm: &str) -> Self {
        Self::new(
            VmwsErrorKind::EncryptedInstance,
            format!("VM '{}' is encrypted", vm),
        )
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(VmwsErrorKind::ConfigError, message)
    }

    pub fn timeout(op: &str) -> Self {
        Self::new(VmwsErrorKind::Timeout, format!("'{}' timed out", op))
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(VmwsErrorKind::ParseError, message)
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::new(VmwsErrorKind::ApiError(status), message)
    }

    pub fn is(&self, kind: &VmwsErrorKind) -> bool {
        &self.kind == kind
    }
}

impl From<std::io::Error> for VmwsError {
    fn from(e: std::io::Error) -> Self {
        Self::new(VmwsErrorKind::Io, format!("I/O error: {e}"))
    }
}

impl From<reqwest::Error> for VmwsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::transport(format!("HTTP timeout: {e}"))
        } else if e.is_connect() {
            Self::transport(format!("Connection failed: {e}"))
        } else if let Some(status) = e.status() {
            Self::api(status.as_u16(), format!("HTTP error: {e}"))
        } else if e.is_decode() {
            Self::parse(format!("Failed to decode response: {e}"))
        } else {
            Self::transport(format!("HTTP error: {e}"))
        }
    }
}

impl From<serde_json::Error> for VmwsError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {e}"))
    }
}

/// Convenience alias.
pub type VmwsResult<T> = Result<T, VmwsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_details() {
        let e = VmwsError::non_zero_exit("vmrun list", 255, &["boom".to_string()]);
        assert_eq!(
            e.to_string(),
            "[RemoteNonZeroExit] 'vmrun list' exited with code 255 (boom)"
        );
    }

    #[test]
    fn api_kind_carries_status() {
        let e = VmwsError::api(404, "404 Not Found");
        assert!(e.is(&VmwsErrorKind::ApiError(404)));
        assert!(!e.is(&VmwsErrorKind::ApiError(401)));
    }
}
