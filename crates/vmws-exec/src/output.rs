//! Captured result of a host command.

use serde::de::DeserializeOwned;
use vmws_core::{VmwsError, VmwsErrorKind, VmwsResult};

/// Exit-code handling for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Non-zero exit is an error.
    Check,
    /// Non-zero exit is returned to the caller.
    Capture,
}

/// Result of a host command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit_code: i32,
}

impl ExecOutput {
    /// Build from raw captured streams.
    pub fn from_raw(stdout: &str, stderr: &str, exit_code: i32) -> Self {
        Self {
            stdout: split_lines(stdout),
            stderr: split_lines(stderr),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Apply `policy` on behalf of `command`.
    pub fn check(self, command: &str, policy: ExitPolicy) -> VmwsResult<Self> {
        if policy == ExitPolicy::Check && !self.success() {
            return Err(VmwsError::non_zero_exit(command, self.exit_code, &self.stderr));
        }
        Ok(self)
    }

    /// Stdout joined back into one string.
    pub fn text(&self) -> String {
        self.stdout.join("\n")
    }

    /// Parse stdout as JSON.
    pub fn parse_json_as<T: DeserializeOwned>(&self) -> VmwsResult<T> {
        let text = self.text();
        if text.trim().is_empty() {
            return Err(VmwsError::parse("Empty command output"));
        }
        serde_json::from_str(&text).map_err(|e| {
            VmwsError::with_details(
                VmwsErrorKind::ParseError,
                format!("Failed to parse JSON output: {}", e),
                text.chars().take(500).collect::<String>(),
            )
        })
    }
}

/// Trim, split on LF, and drop trailing empty lines.
pub fn split_lines(raw: &str) -> Vec<String> {
    let mut lines: Vec<String> = raw
        .split('\n')
        .map(|l| l.trim().to_string())
        .collect();
    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_trimmed_and_trailing_blanks_dropped() {
        assert_eq!(
            split_lines("  Total running VMs: 1\r\n/vms/a/a.vmx \r\n\r\n"),
            vec!["Total running VMs: 1", "/vms/a/a.vmx"]
        );
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn check_policy() {
        let out = ExecOutput::from_raw("", "no such vm\n", 255);
        let err = out.clone().check("vmrun list", ExitPolicy::Check).unwrap_err();
        assert!(err.is(&VmwsErrorKind::RemoteNonZeroExit));
        assert_eq!(err.details.as_deref(), Some("no such vm"));
        assert_eq!(out.check("vmrun list", ExitPolicy::Capture).unwrap().exit_code, 255);
    }

    #[test]
    fn json_stdout() {
        let out = ExecOutput::from_raw("{\"PowerState\": \"on\"}\n", "", 0);
        let v: serde_json::Value = out.parse_json_as().unwrap();
        assert_eq!(v["PowerState"], "on");
    }
}
