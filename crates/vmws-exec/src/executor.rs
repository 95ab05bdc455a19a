//! Host-shell implementation over `sh`, `cmd`, `ssh`/`scp` and the
//! `winexec` RPC.

use crate::config::{ExecConfig, TlsFiles, Transport};
use crate::output::{ExecOutput, ExitPolicy};
use crate::process::{self, Invocation};
use crate::rpc::WinexecClient;
use crate::shell::{
    fetch_command, mkdir_all_command, remove_all_command, spawn_command, HostShell, Shell,
};
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use std::time::Duration;
use vmws_core::path;
use vmws_core::{HostOs, PathStyle, VmwsError, VmwsResult};

/// Runs commands on the configured host.
pub struct Executor {
    config: ExecConfig,
    local_os: HostOs,
    remote_os: HostOs,
    shell: Shell,
    rpc: Option<WinexecClient>,
    timeout: Option<Duration>,
}

impl Executor {
    /// Choose the shell for `config` and, over ssh, detect the host OS.
    pub async fn connect(config: ExecConfig) -> VmwsResult<Self> {
        config.validate()?;
        let local_os = HostOs::current();
        let timeout = match config.command_timeout {
            0 => None,
            s => Some(Duration::from_secs(s)),
        };

        if config.is_local() {
            let shell = if local_os.is_windows() { Shell::Cmd } else { Shell::Sh };
            debug!("host is local ({}), using {}", local_os, shell);
            return Ok(Self {
                config,
                remote_os: local_os.clone(),
                local_os,
                shell,
                rpc: None,
                timeout,
            });
        }

        if config.transport == Transport::Winexec {
            let rpc = WinexecClient::new(&config.winexec, timeout)?;
            info!("connected to {} via winexec", rpc.base_url());
            return Ok(Self {
                config,
                local_os,
                remote_os: HostOs::Windows,
                shell: Shell::Winexec,
                rpc: Some(rpc),
                timeout,
            });
        }

        let mut exec = Self {
            config,
            local_os,
            remote_os: HostOs::Other,
            shell: Shell::Ssh,
            rpc: None,
            timeout,
        };
        exec.remote_os = exec.detect_remote_os().await?;
        info!("connected to {} via ssh ({})", exec.config.host, exec.remote_os);
        Ok(exec)
    }

    /// `env` exposes `WINDIR` on Windows hosts; otherwise `uname` names the
    /// system. A host that runs neither is a bare `cmd` shell.
    async fn detect_remote_os(&self) -> VmwsResult<HostOs> {
        let env = process::run(&self.ssh_argv_invocation("env"), self.timeout).await?;
        if env.exit_code == 255 {
            return Err(VmwsError::with_details(
                vmws_core::VmwsErrorKind::TransportFailed,
                format!("ssh to {} failed", self.config.ssh_target()),
                env.stderr.join("; "),
            ));
        }
        let windows = env.stdout.iter().any(|l| {
            l.to_uppercase().starts_with("WINDIR=") && l.to_uppercase().contains("WINDOWS")
        });
        if windows {
            return Ok(HostOs::Windows);
        }
        let uname = process::run(&self.ssh_argv_invocation("uname -s"), self.timeout).await?;
        if uname.success() {
            if let Some(first) = uname.stdout.first() {
                return Ok(HostOs::parse(first));
            }
        }
        Ok(HostOs::Windows)
    }

    fn ssh_base_args(&self) -> Vec<String> {
        let mut args = vec!["-q".to_string()];
        if !self.config.ssh_key.is_empty() {
            args.push("-i".into());
            args.push(self.config.ssh_key.clone());
        }
        args
    }

    fn ssh_argv_invocation(&self, command: &str) -> Invocation {
        let mut args = self.ssh_base_args();
        args.push(self.config.ssh_target());
        args.push(command.to_string());
        Invocation::new("ssh", args)
    }

    /// Windows hosts get the command as one argv element; POSIX login
    /// shells read it from stdin.
    fn ssh_invocation(&self, command: &str) -> Invocation {
        if self.remote_os.is_windows() {
            return self.ssh_argv_invocation(command);
        }
        let mut args = self.ssh_base_args();
        args.push(self.config.ssh_target());
        Invocation::new("ssh", args).with_stdin(format!("{}\n", command))
    }

    fn local_invocation(&self, command: &str) -> Invocation {
        if self.local_os.is_windows() {
            Invocation::new("cmd", vec!["/c".into(), command.to_string()])
        } else {
            Invocation::new("sh", vec!["-c".into(), command.to_string()])
        }
    }

    fn rpc(&self) -> VmwsResult<&WinexecClient> {
        self.rpc
            .as_ref()
            .ok_or_else(|| VmwsError::config("winexec client is not configured"))
    }

    fn scp_remote(&self, remote: &str) -> VmwsResult<String> {
        let style = if self.remote_os.is_windows() {
            PathStyle::Scp
        } else {
            PathStyle::Unix
        };
        Ok(format!("{}:{}", self.config.ssh_target(), path::format(style, remote)?))
    }

    async fn scp(&self, src: String, dst: String) -> VmwsResult<()> {
        let mut args = self.ssh_base_args();
        args.push(src);
        args.push(dst);
        let inv = Invocation::new("scp", args);
        let display = inv.display();
        process::run(&inv, self.timeout)
            .await?
            .check(&display, ExitPolicy::Check)
            .map(|_| ())
    }

    fn native_local(&self, remote: &str) -> VmwsResult<String> {
        path::format_for(&self.local_os, remote)
    }
}

#[async_trait]
impl HostShell for Executor {
    fn local_os(&self) -> &HostOs {
        &self.local_os
    }

    fn remote_os(&self) -> &HostOs {
        &self.remote_os
    }

    fn shell(&self) -> Shell {
        self.shell
    }

    fn is_local(&self) -> bool {
        matches!(self.shell, Shell::Sh | Shell::Cmd)
    }

    async fn remote_exec(&self, command: &str, policy: ExitPolicy) -> VmwsResult<ExecOutput> {
        let out = match self.shell {
            Shell::Sh | Shell::Cmd => process::run(&self.local_invocation(command), self.timeout).await?,
            Shell::Ssh => process::run(&self.ssh_invocation(command), self.timeout).await?,
            Shell::Winexec => {
                self.rpc()?
                    .exec("cmd", &["/c".to_string(), command.to_string()])
                    .await?
            }
        };
        out.check(command, policy)
    }

    async fn remote_spawn(&self, command: &str, policy: ExitPolicy) -> VmwsResult<()> {
        debug!("spawn via {}: {}", self.shell, command);
        if self.shell == Shell::Winexec {
            return self
                .rpc()?
                .spawn("cmd", &["/c".to_string(), command.to_string()])
                .await?
                .check(command, policy)
                .map(|_| ());
        }
        let line = spawn_command(&self.remote_os, command);
        self.remote_exec(&line, policy).await.map(|_| ())
    }

    async fn local_exec(&self, command: &str, policy: ExitPolicy) -> VmwsResult<ExecOutput> {
        process::run(&self.local_invocation(command), self.timeout)
            .await?
            .check(command, policy)
    }

    async fn put_file(&self, local: &Path, remote: &str) -> VmwsResult<()> {
        debug!("upload {} -> {}", local.display(), remote);
        match self.shell {
            Shell::Sh | Shell::Cmd => {
                tokio::fs::copy(local, self.native_local(remote)?).await?;
                Ok(())
            }
            Shell::Ssh => {
                let dst = self.scp_remote(remote)?;
                self.scp(local.display().to_string(), dst).await
            }
            Shell::Winexec => {
                let data = tokio::fs::read(local).await?;
                let dst = path::format(PathStyle::Windows, remote)?;
                self.rpc()?.upload(&dst, &data).await
            }
        }
    }

    async fn get_file(&self, remote: &str, local: &Path) -> VmwsResult<()> {
        debug!("download {} -> {}", remote, local.display());
        match self.shell {
            Shell::Sh | Shell::Cmd => {
                tokio::fs::copy(self.native_local(remote)?, local).await?;
                Ok(())
            }
            Shell::Ssh => {
                let src = self.scp_remote(remote)?;
                self.scp(src, local.display().to_string()).await
            }
            Shell::Winexec => {
                let src = path::format(PathStyle::Windows, remote)?;
                let data = self.rpc()?.download(&src).await?;
                tokio::fs::write(local, data).await?;
                Ok(())
            }
        }
    }

    async fn mkdir_all(&self, remote: &str) -> VmwsResult<()> {
        if self.shell == Shell::Winexec {
            return self.rpc()?.mkdir_all(&path::format(PathStyle::Windows, remote)?).await;
        }
        let cmd = mkdir_all_command(&self.remote_os, remote)?;
        self.remote_exec(&cmd, ExitPolicy::Check).await.map(|_| ())
    }

    async fn remove_all(&self, remote: &str) -> VmwsResult<()> {
        if self.shell == Shell::Winexec {
            return self.rpc()?.remove_all(&path::format(PathStyle::Windows, remote)?).await;
        }
        let cmd = remove_all_command(&self.remote_os, remote)?;
        self.remote_exec(&cmd, ExitPolicy::Check).await.map(|_| ())
    }

    async fn fetch_url(&self, url: &str, dest: &str, tls: &TlsFiles) -> VmwsResult<()> {
        info!("fetching {} to {}", url, dest);
        if self.shell == Shell::Winexec {
            let dest = path::format(PathStyle::Windows, dest)?;
            return self.rpc()?.fetch_iso(url, &dest, tls).await;
        }
        let cmd = fetch_command(&self.remote_os, url, dest, tls)?;
        self.remote_exec(&cmd, ExitPolicy::Check).await.map(|_| ())
    }
}
