//! The host-shell capability and the command lines it composes.

use crate::config::TlsFiles;
use crate::output::{ExecOutput, ExitPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use vmws_core::path;
use vmws_core::shell::quote_arg;
use vmws_core::{HostOs, VmwsResult};

/// Shell flavour used to reach the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    Sh,
    Cmd,
    Ssh,
    Winexec,
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sh => "sh",
            Self::Cmd => "cmd",
            Self::Ssh => "ssh",
            Self::Winexec => "winexec",
        })
    }
}

/// Command execution and file movement on the host.
///
/// Paths taken by these methods are canonical; implementations emit them
/// in the host's notation.
#[async_trait]
pub trait HostShell: Send + Sync {
    fn local_os(&self) -> &HostOs;
    fn remote_os(&self) -> &HostOs;
    fn shell(&self) -> Shell;
    /// True when the operator machine is the host.
    fn is_local(&self) -> bool;

    /// Run one shell line on the host.
    async fn remote_exec(&self, command: &str, policy: ExitPolicy) -> VmwsResult<ExecOutput>;

    /// Start one shell line on the host without waiting for it.
    async fn remote_spawn(&self, command: &str, policy: ExitPolicy) -> VmwsResult<()>;

    /// Run one shell line on the operator machine.
    async fn local_exec(&self, command: &str, policy: ExitPolicy) -> VmwsResult<ExecOutput>;

    /// Copy a local file to a host path.
    async fn put_file(&self, local: &Path, remote: &str) -> VmwsResult<()>;

    /// Copy a host path to a local file.
    async fn get_file(&self, remote: &str, local: &Path) -> VmwsResult<()>;

    async fn mkdir_all(&self, remote: &str) -> VmwsResult<()> {
        let cmd = mkdir_all_command(self.remote_os(), remote)?;
        self.remote_exec(&cmd, ExitPolicy::Check).await.map(|_| ())
    }

    async fn remove_all(&self, remote: &str) -> VmwsResult<()> {
        let cmd = remove_all_command(self.remote_os(), remote)?;
        self.remote_exec(&cmd, ExitPolicy::Check).await.map(|_| ())
    }

    /// Download `url` to the host path `dest`.
    async fn fetch_url(&self, url: &str, dest: &str, tls: &TlsFiles) -> VmwsResult<()> {
        let cmd = fetch_command(self.remote_os(), url, dest, tls)?;
        self.remote_exec(&cmd, ExitPolicy::Check).await.map(|_| ())
    }
}

// ── Command builders ────────────────────────────────────────────────

/// Quote a canonical path for a command line on `os`.
pub fn host_path_arg(os: &HostOs, p: &str) -> VmwsResult<String> {
    Ok(quote_arg(os, &path::format_for(os, p)?))
}

pub fn mkdir_all_command(os: &HostOs, p: &str) -> VmwsResult<String> {
    let arg = host_path_arg(os, p)?;
    Ok(if os.is_windows() {
        format!("if not exist {arg} mkdir {arg}")
    } else {
        format!("mkdir -p {arg}")
    })
}

pub fn remove_all_command(os: &HostOs, p: &str) -> VmwsResult<String> {
    let arg = host_path_arg(os, p)?;
    Ok(if os.is_windows() {
        format!("rmdir /S /Q {arg}")
    } else {
        format!("rm -rf {arg}")
    })
}

/// `curl -sSfL [--cacert CA] [--cert C --key K] -o <dest> <url>`
pub fn fetch_command(os: &HostOs, url: &str, dest: &str, tls: &TlsFiles) -> VmwsResult<String> {
    let mut parts = vec!["curl".to_string(), "-sSfL".to_string()];
    if !tls.ca.is_empty() {
        parts.push("--cacert".into());
        parts.push(host_path_arg(os, &tls.ca)?);
    }
    if !tls.cert.is_empty() && !tls.key.is_empty() {
        parts.push("--cert".into());
        parts.push(host_path_arg(os, &tls.cert)?);
        parts.push("--key".into());
        parts.push(host_path_arg(os, &tls.key)?);
    }
    parts.push("-o".into());
    parts.push(host_path_arg(os, dest)?);
    parts.push(quote_arg(os, url));
    Ok(parts.join(" "))
}

/// Detached form of `command` for a host shell on `os`.
pub fn spawn_command(os: &HostOs, command: &str) -> String {
    if os.is_windows() {
        format!("cmd /c start /MIN {}", command)
    } else {
        format!("nohup {} >/dev/null 2>&1 &", command)
    }
}

/// Directory listing command whose output [`path::parse_file_list`] reads.
pub fn list_dir_command(os: &HostOs, p: &str) -> VmwsResult<String> {
    let arg = host_path_arg(os, p)?;
    Ok(if os.is_windows() {
        format!("dir /-C {arg}")
    } else {
        format!("ls -al {arg}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkdir_and_remove() {
        assert_eq!(
            mkdir_all_command(&HostOs::Linux, "/vms/tvm").unwrap(),
            "mkdir -p /vms/tvm"
        );
        assert_eq!(
            mkdir_all_command(&HostOs::Windows, "/C/vms/tvm").unwrap(),
            "if not exist C:\\vms\\tvm mkdir C:\\vms\\tvm"
        );
        assert_eq!(
            remove_all_command(&HostOs::Windows, "/C/vms/tvm").unwrap(),
            "rmdir /S /Q C:\\vms\\tvm"
        );
        assert_eq!(remove_all_command(&HostOs::Linux, "/vms/t v").unwrap(), "rm -rf '/vms/t v'");
    }

    #[test]
    fn curl_threads_tls_flags_only_when_present() {
        let plain = fetch_command(&HostOs::Linux, "https://m/d.iso", "/iso/d.iso", &TlsFiles::default())
            .unwrap();
        assert_eq!(plain, "curl -sSfL -o /iso/d.iso 'https://m/d.iso'");

        let tls = TlsFiles {
            cert: "/etc/c.pem".into(),
            key: "/etc/k.pem".into(),
            ca: "/etc/ca.pem".into(),
        };
        let full = fetch_command(&HostOs::Linux, "https://m/d.iso", "/iso/d.iso", &tls).unwrap();
        assert_eq!(
            full,
            "curl -sSfL --cacert /etc/ca.pem --cert /etc/c.pem --key /etc/k.pem -o /iso/d.iso 'https://m/d.iso'"
        );
    }

    #[test]
    fn spawn_forms() {
        assert_eq!(
            spawn_command(&HostOs::Windows, "vmrun -T ws start C:\\v\\a.vmx nogui"),
            "cmd /c start /MIN vmrun -T ws start C:\\v\\a.vmx nogui"
        );
        assert_eq!(
            spawn_command(&HostOs::Linux, "vmrun -T ws start /v/a.vmx nogui"),
            "nohup vmrun -T ws start /v/a.vmx nogui >/dev/null 2>&1 &"
        );
    }
}
