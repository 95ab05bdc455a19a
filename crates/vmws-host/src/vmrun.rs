//! `vmrun -T ws` command lines and output parsing.

use log::debug;
use vmws_core::shell::{join_args, quote_arg};
use vmws_core::{path, HostOs, Vid, VmwsResult};
use vmws_exec::{ExitPolicy, HostShell};

pub struct VmRun<'a> {
    shell: &'a dyn HostShell,
    tool: &'a str,
}

impl<'a> VmRun<'a> {
    pub fn new(shell: &'a dyn HostShell, tool: &'a str) -> Self {
        Self { shell, tool }
    }

    fn os(&self) -> &HostOs {
        self.shell.remote_os()
    }

    fn vmx_arg(&self, vid: &Vid) -> VmwsResult<String> {
        Ok(quote_arg(self.os(), &path::format_for(self.os(), &vid.path)?))
    }

    pub fn start_command(&self, vid: &Vid, background: bool) -> VmwsResult<String> {
        let mode = if background { "nogui" } else { "gui" };
        Ok(format!("{} -T ws start {} {}", self.tool, self.vmx_arg(vid)?, mode))
    }

    pub fn stop_command(&self, vid: &Vid, power_off: bool) -> VmwsResult<String> {
        let mode = if power_off { "hard" } else { "soft" };
        Ok(format!("{} -T ws stop {} {}", self.tool, self.vmx_arg(vid)?, mode))
    }

    pub async fn stop(&self, vid: &Vid, power_off: bool) -> VmwsResult<()> {
        let cmd = self.stop_command(vid, power_off)?;
        self.shell.remote_exec(&cmd, ExitPolicy::Check).await.map(|_| ())
    }

    /// Canonical paths of the running instances.
    pub async fn list(&self) -> VmwsResult<Vec<String>> {
        let cmd = format!("{} -T ws list", self.tool);
        let out = self.shell.remote_exec(&cmd, ExitPolicy::Check).await?;
        Ok(parse_list(&out.stdout))
    }

    pub async fn is_running(&self, vid: &Vid) -> VmwsResult<bool> {
        let running = self.list().await?;
        Ok(running.iter().any(|p| p == &vid.path))
    }

    pub async fn guest_ip(&self, vid: &Vid) -> VmwsResult<String> {
        let cmd = format!("{} -T ws getGuestIPAddress {}", self.tool, self.vmx_arg(vid)?);
        let out = self.shell.remote_exec(&cmd, ExitPolicy::Capture).await?;
        if !out.success() {
            debug!("{}: no guest IP ({})", vid.name, out.text());
            return Ok(String::new());
        }
        Ok(out.stdout.first().cloned().unwrap_or_default())
    }

    /// Run `vmrun` with arbitrary arguments and return its output lines.
    pub async fn passthrough(&self, args: &[String]) -> VmwsResult<Vec<String>> {
        let cmd = format!("{} {}", self.tool, join_args(self.os(), args));
        let out = self.shell.remote_exec(&cmd, ExitPolicy::Check).await?;
        Ok(out.stdout)
    }
}

/// Skip the `Total running VMs: N` header and normalize every path.
pub fn parse_list(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter(|l| !l.is_empty() && !l.starts_with("Total running VMs"))
        .filter_map(|l| path::normalize(l).ok())
        .collect()
}
