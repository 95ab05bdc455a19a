//! Connection settings for the host shell.

use serde::{Deserialize, Serialize};
use vmws_core::{VmwsError, VmwsResult};

/// How a non-local host is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Ssh,
    Winexec,
}

impl Default for Transport {
    fn default() -> Self {
        Self::Ssh
    }
}

/// Client certificate, key and CA bundle paths. Either all three are set
/// or none is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsFiles {
    #[serde(default)]
    pub cert: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub ca: String,
}

impl TlsFiles {
    pub fn is_empty(&self) -> bool {
        self.cert.is_empty() && self.key.is_empty() && self.ca.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        !self.cert.is_empty() && !self.key.is_empty() && !self.ca.is_empty()
    }

    /// Reject a partial triple.
    pub fn validate(&self, what: &str) -> VmwsResult<()> {
        if self.is_empty() || self.is_complete() {
            return Ok(());
        }
        Err(VmwsError::config(format!(
            "{} TLS configuration is incomplete: cert, key and ca must all be set",
            what
        )))
    }
}

/// Remote-exec RPC endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinexecConfig {
    #[serde(default)]
    pub url: String,
    #[serde(flatten)]
    pub tls: TlsFiles,
}

/// Everything the executor needs to reach the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Hostname; empty or `localhost` means the operator is the host.
    pub host: String,
    pub user: String,
    pub ssh_key: String,
    pub transport: Transport,
    pub winexec: WinexecConfig,
    /// Per-command timeout in seconds (0 = none).
    pub command_timeout: u64,
}

impl ExecConfig {
    pub fn is_local(&self) -> bool {
        matches!(
            self.host.trim().to_lowercase().as_str(),
            "" | "localhost" | "127.0.0.1" | "::1"
        )
    }

    /// `user@host`, or just `host` without a user.
    pub fn ssh_target(&self) -> String {
        if self.user.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }

    pub fn validate(&self) -> VmwsResult<()> {
        self.winexec.tls.validate("winexec")?;
        if !self.is_local() && self.transport == Transport::Winexec && self.winexec.url.is_empty() {
            return Err(VmwsError::config("winexec transport requires winexec.url"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tls_is_rejected() {
        let tls = TlsFiles {
            cert: "c.pem".into(),
            ..Default::default()
        };
        assert!(tls.validate("api").is_err());
        assert!(TlsFiles::default().validate("api").is_ok());
    }

    #[test]
    fn local_host_detection() {
        assert!(ExecConfig::default().is_local());
        let cfg = ExecConfig {
            host: "vmhost".into(),
            user: "admin".into(),
            ..Default::default()
        };
        assert!(!cfg.is_local());
        assert_eq!(cfg.ssh_target(), "admin@vmhost");
    }

    #[test]
    fn winexec_requires_url() {
        let cfg = ExecConfig {
            host: "winhost".into(),
            transport: Transport::Winexec,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
