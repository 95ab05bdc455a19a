//! YAML configuration with environment overrides.
//!
//! The file is read once at startup and split into the per-crate
//! configuration structs handed to the executor, the REST client and the
//! controller.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vmws_control::Settings;
use vmws_core::flags::CreateFlags;
use vmws_core::{VmwsError, VmwsResult};
use vmws_exec::{ExecConfig, Transport, WinexecConfig};
use vmws_host::{ApiConfig, HostTools};

pub const ENV_HOST: &str = "VMWS_HOST";
pub const ENV_USER: &str = "VMWS_USER";
pub const ENV_SSH_KEY: &str = "VMWS_SSH_KEY";
pub const ENV_API_URL: &str = "VMWS_API_URL";
pub const ENV_API_USER: &str = "VMWS_API_USER";
pub const ENV_API_PASSWORD: &str = "VMWS_API_PASSWORD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub user: String,
    pub ssh_key: String,
    pub transport: Transport,
    /// Per-command timeout on the host, seconds (0 = none).
    pub command_timeout: u64,
    pub winexec: WinexecConfig,
    pub api: ApiConfig,

    pub roots: Vec<String>,
    pub iso_root: String,
    pub interval: u64,
    pub timeout: u64,
    pub no_humanize: bool,

    pub disk_single_file: bool,
    pub disk_preallocated: bool,
    pub default_cpu: Option<u32>,
    pub default_memory: Option<String>,
    pub default_disk: Option<String>,
    pub default_guest_os: Option<String>,

    #[serde(flatten)]
    pub tools: HostTools,
}

impl Default for Config {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            host: String::new(),
            user: String::new(),
            ssh_key: String::new(),
            transport: Transport::default(),
            command_timeout: 0,
            winexec: WinexecConfig::default(),
            api: ApiConfig::default(),
            roots: Vec::new(),
            iso_root: String::new(),
            interval: settings.interval,
            timeout: settings.timeout,
            no_humanize: false,
            disk_single_file: false,
            disk_preallocated: false,
            default_cpu: None,
            default_memory: None,
            default_disk: None,
            default_guest_os: None,
            tools: HostTools::default(),
        }
    }
}

/// `<config_dir>/vmws/config.yaml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vmws").join("config.yaml"))
}

impl Config {
    /// Read `path`, or the default location when `None`. A missing default
    /// file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> VmwsResult<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };
        if !explicit && !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|e| {
            VmwsError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        log::debug!("loaded config from {}", path.display());
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> VmwsResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| VmwsError::config(format!("invalid config: {}", e)))
    }

    /// Apply `VMWS_*` overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut String); 6] = [
            (ENV_HOST, &mut self.host),
            (ENV_USER, &mut self.user),
            (ENV_SSH_KEY, &mut self.ssh_key),
            (ENV_API_URL, &mut self.api.url),
            (ENV_API_USER, &mut self.api.username),
            (ENV_API_PASSWORD, &mut self.api.password),
        ];
        for (name, field) in targets {
            if let Some(v) = lookup(name).filter(|v| !v.is_empty()) {
                *field = v;
            }
        }
    }

    pub fn validate(&self) -> VmwsResult<()> {
        self.exec_config().validate()?;
        self.api.validate()
    }

    pub fn exec_config(&self) -> ExecConfig {
        ExecConfig {
            host: self.host.clone(),
            user: self.user.clone(),
            ssh_key: self.ssh_key.clone(),
            transport: self.transport,
            winexec: self.winexec.clone(),
            command_timeout: self.command_timeout,
        }
    }

    pub fn api_config(&self) -> Option<ApiConfig> {
        self.api.is_configured().then(|| self.api.clone())
    }

    pub fn settings(&self) -> Settings {
        Settings {
            roots: self.roots.clone(),
            iso_root: self.iso_root.clone(),
            interval: self.interval,
            timeout: self.timeout,
            no_humanize: self.no_humanize,
            tools: self.tools.clone(),
        }
    }

    /// Fill the create flags the operator left unset.
    pub fn apply_create_defaults(&self, flags: &mut CreateFlags) {
        if flags.cpu.is_none() {
            flags.cpu = self.default_cpu;
        }
        if flags.memory.is_none() {
            flags.memory = self.default_memory.clone();
        }
        if flags.disk.is_none() {
            flags.disk = self.default_disk.clone();
        }
        if flags.guest_os.is_none() {
            flags.guest_os = self.default_guest_os.clone();
        }
        flags.disk_single_file.get_or_insert(self.disk_single_file);
        flags.disk_preallocated.get_or_insert(self.disk_preallocated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.interval, 1);
        assert_eq!(cfg.timeout, 300);
        assert_eq!(cfg.tools.vdiskmanager, "vmware-vdiskmanager");
    }

    #[test]
    fn parses_full_document() {
        let cfg = Config::parse(
            r#"
host: vmhost
user: admin
transport: winexec
winexec:
  url: https://vmhost:8443
  cert: /etc/vmws/client.pem
  key: /etc/vmws/client.key
  ca: /etc/vmws/ca.pem
api:
  url: https://vmhost:8697
  username: api
  password: secret
roots: ["C:/vms", "D:/vms"]
iso_root: C:/iso
timeout: 0
default_cpu: 2
default_memory: 4G
vmrun: C:/VMware/vmrun.exe
"#,
        )
        .unwrap();
        assert_eq!(cfg.transport, Transport::Winexec);
        assert_eq!(cfg.roots.len(), 2);
        assert_eq!(cfg.api_config().unwrap().username, "api");
        assert_eq!(cfg.tools.vmrun, "C:/VMware/vmrun.exe");
        assert_eq!(cfg.tools.vmcli, "vmcli");
        assert_eq!(cfg.settings().wait_budget(), None);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_partial_tls() {
        let cfg = Config::parse("api:\n  url: https://h\n  cert: c.pem\n").unwrap();
        assert!(cfg.validate().is_err());
        assert!(Config::parse("roots: 3").is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [(ENV_HOST, "other"), (ENV_API_PASSWORD, "pw"), (ENV_USER, "")]
            .into_iter()
            .collect();
        let mut cfg = Config::parse("host: vmhost\nuser: admin\n").unwrap();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.host, "other");
        assert_eq!(cfg.user, "admin");
        assert_eq!(cfg.api.password, "pw");
    }

    #[test]
    fn create_defaults_fill_gaps_only() {
        let cfg = Config {
            default_cpu: Some(2),
            default_memory: Some("2G".into()),
            disk_preallocated: true,
            ..Default::default()
        };
        let mut flags = CreateFlags {
            memory: Some("8G".into()),
            ..Default::default()
        };
        cfg.apply_create_defaults(&mut flags);
        assert_eq!(flags.cpu, Some(2));
        assert_eq!(flags.memory.as_deref(), Some("8G"));
        assert_eq!(flags.disk_preallocated, Some(true));
        assert_eq!(flags.disk_single_file, Some(false));
    }

    #[test]
    fn missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.yaml"))).is_err());
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "iso_root: /srv/iso\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().iso_root, "/srv/iso");
    }
}
