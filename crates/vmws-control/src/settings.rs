//! Controller settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use vmws_core::{VmwsError, VmwsResult};
use vmws_host::HostTools;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directories holding one sub-directory per instance.
    pub roots: Vec<String>,
    pub iso_root: String,
    /// Poll interval, seconds.
    pub interval: u64,
    /// Wait budget, seconds; 0 waits forever.
    pub timeout: u64,
    pub no_humanize: bool,
    #[serde(flatten)]
    pub tools: HostTools,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            iso_root: String::new(),
            interval: 1,
            timeout: 300,
            no_humanize: false,
            tools: HostTools::default(),
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }

    pub fn wait_budget(&self) -> Option<Duration> {
        match self.timeout {
            0 => None,
            s => Some(Duration::from_secs(s)),
        }
    }

    /// Root new instances are created under.
    pub fn primary_root(&self) -> VmwsResult<&str> {
        self.roots
            .first()
            .map(String::as_str)
            .ok_or_else(|| VmwsError::config("no instance roots configured"))
    }

    pub fn require_iso_root(&self) -> VmwsResult<&str> {
        if self.iso_root.is_empty() {
            return Err(VmwsError::config("iso_root is not configured"));
        }
        Ok(&self.iso_root)
    }
}
