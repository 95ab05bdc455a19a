//! Operating-system tags for the operator and the host.

use serde::{Deserialize, Serialize};
use std::fmt;

/// OS family of a machine taking part in an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostOs {
    Windows,
    Linux,
    OpenBsd,
    Darwin,
    #[serde(other)]
    Other,
}

impl HostOs {
    /// OS of the process we are running in.
    pub fn current() -> Self {
        Self::parse(std::env::consts::OS)
    }

    /// Parse a `uname -s` string or a Rust `target_os` name.
    pub fn parse(s: &str) -> Self {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "windows" | "windows_nt" => Self::Windows,
            "linux" => Self::Linux,
            "openbsd" => Self::OpenBsd,
            "darwin" | "macos" => Self::Darwin,
            _ if lower.starts_with("mingw") || lower.starts_with("cygwin") => Self::Windows,
            _ => Self::Other,
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Self::Windows)
    }

    /// Path style used when emitting host paths for this OS.
    pub fn path_style(&self) -> PathStyle {
        if self.is_windows() {
            PathStyle::Windows
        } else {
            PathStyle::Unix
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::OpenBsd => "openbsd",
            Self::Darwin => "darwin",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Target notation for [`crate::path::format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// `C:\dir\file`
    Windows,
    /// `/C/dir/file` (forward slashes, canonical form)
    Unix,
    /// `C:/dir/file`, the remote side of an `scp` argument
    Scp,
}

impl PathStyle {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "windows" => Self::Windows,
            "scp" => Self::Scp,
            _ => Self::Unix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uname_output() {
        assert_eq!(HostOs::parse("Linux\n"), HostOs::Linux);
        assert_eq!(HostOs::parse("OpenBSD"), HostOs::OpenBsd);
        assert_eq!(HostOs::parse("Darwin"), HostOs::Darwin);
        assert_eq!(HostOs::parse("MINGW64_NT-10.0"), HostOs::Windows);
        assert_eq!(HostOs::parse("plan9"), HostOs::Other);
    }

    #[test]
    fn path_style_follows_family() {
        assert_eq!(HostOs::Windows.path_style(), PathStyle::Windows);
        assert_eq!(HostOs::OpenBsd.path_style(), PathStyle::Unix);
    }
}
