//! `vmcli` wrapper: power query, VMX parameters, CD/DVD backing and
//! keyboard injection.

use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use vmws_core::shell::{join_args, quote_arg};
use vmws_core::size::format_size;
use vmws_core::{path, PowerState, Vid, Vm, VmwsError, VmwsErrorKind, VmwsResult};
use vmws_exec::{ExecOutput, ExitPolicy, HostShell};

/// Marker printed by `vmcli` for instances it cannot open without a
/// password.
pub const ENCRYPTED_VM_ERROR: &str = "ENCRYPTED_VM_ERROR";

/// CD/DVD slot used for ISO media.
pub const ISO_DEVICE: &str = "ide1:0";

/// `vmcli` bound to a host shell.
pub struct VmCli<'a> {
    shell: &'a dyn HostShell,
    tool: &'a str,
}

impl<'a> VmCli<'a> {
    pub fn new(shell: &'a dyn HostShell, tool: &'a str) -> Self {
        Self { shell, tool }
    }

    fn command(&self, vid: &Vid, args: &[&str]) -> VmwsResult<String> {
        let os = self.shell.remote_os();
        let vmx = quote_arg(os, &path::format_for(os, &vid.path)?);
        Ok(format!("{} {} {}", self.tool, vmx, join_args(os, args)))
    }

    /// Run a `vmcli` verb, classifying the encrypted-instance failure.
    async fn run(&self, vid: &Vid, args: &[&str]) -> VmwsResult<ExecOutput> {
        let cmd = self.command(vid, args)?;
        let out = self.shell.remote_exec(&cmd, ExitPolicy::Capture).await?;
        if out
            .stdout
            .iter()
            .chain(out.stderr.iter())
            .any(|l| l.contains(ENCRYPTED_VM_ERROR))
        {
            return Err(VmwsError::encrypted(&vid.name));
        }
        out.check(&cmd, ExitPolicy::Check)
    }

    // ── Power ───────────────────────────────────────────────────────

    pub async fn query_power_state(&self, vid: &Vid) -> VmwsResult<PowerState> {
        let out = self.run(vid, &["power", "query", "-f", "json"]).await?;
        let v: Value = out.parse_json_as()?;
        let state = find_key(&v, &["power_state", "powerstate", "state"])
            .and_then(|s| s.as_str().map(str::to_string))
            .ok_or_else(|| {
                VmwsError::with_details(
                    VmwsErrorKind::ParseError,
                    "vmcli power query returned no power state",
                    out.text(),
                )
            })?;
        PowerState::parse(&state)
    }

    // ── Parameters ──────────────────────────────────────────────────

    pub async fn get_params(&self, vid: &Vid) -> VmwsResult<BTreeMap<String, String>> {
        let out = self.run(vid, &["configParams", "query", "-f", "json"]).await?;
        let v: Value = out.parse_json_as()?;
        Ok(flatten_params(&v))
    }

    /// One parameter, looked up case-insensitively.
    pub async fn get_param(&self, vid: &Vid, key: &str) -> VmwsResult<Option<String>> {
        let params = self.get_params(vid).await?;
        Ok(params
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v))
    }

    pub async fn set_param(&self, vid: &Vid, key: &str, value: &str) -> VmwsResult<()> {
        debug!("{}: set {} = {}", vid.name, key, value);
        self.run(vid, &["configParams", "SetEntry", key, value]).await?;
        Ok(())
    }

    // ── CD/DVD ──────────────────────────────────────────────────────

    pub async fn get_iso_options(&self, vid: &Vid) -> VmwsResult<vmws_core::IsoOptions> {
        let params = self.get_params(vid).await?;
        let cfg = ParamConfig::from_params(&params);
        Ok(vmws_core::IsoOptions {
            iso_present: cfg.iso_present,
            iso_file: cfg.iso_file,
            iso_boot_connected: cfg.iso_start_connected,
            ..Default::default()
        })
    }

    /// Present, backing file and start-connected in one sequence.
    pub async fn set_iso_options(&self, vid: &Vid, opts: &vmws_core::IsoOptions) -> VmwsResult<()> {
        if !opts.iso_present {
            self.run(vid, &["disk", "setPresent", ISO_DEVICE, "false"]).await?;
            return Ok(());
        }
        let os = self.shell.remote_os();
        let file = path::format_for(os, &opts.iso_file)?;
        let connected = bool_arg(opts.iso_boot_connected);
        self.run(vid, &["disk", "setPresent", ISO_DEVICE, "true"]).await?;
        self.run(vid, &["disk", "setBackingInfo", ISO_DEVICE, "cdrom-image", &file, connected])
            .await?;
        self.set_iso_start_connected(vid, opts.iso_boot_connected).await
    }

    pub async fn set_iso_start_connected(&self, vid: &Vid, connected: bool) -> VmwsResult<()> {
        self.run(vid, &["disk", "setStartConnected", ISO_DEVICE, bool_arg(connected)])
            .await?;
        Ok(())
    }

    // ── Keyboard ────────────────────────────────────────────────────

    pub async fn send_key_sequence(&self, vid: &Vid, keys: &str) -> VmwsResult<()> {
        self.run(vid, &["mks", "sendKeySequence", keys]).await?;
        Ok(())
    }

    pub async fn send_key_event(&self, vid: &Vid, code: u32, modifier: u32) -> VmwsResult<()> {
        let code = format!("0x{:08x}", code);
        let modifier = modifier.to_string();
        self.run(vid, &["mks", "sendKeyEvent", &code, &modifier]).await?;
        Ok(())
    }

    /// Fill the configuration fields of `vm` from its parameters.
    /// An encrypted instance is flagged instead of failing.
    pub async fn query_config(&self, vm: &mut Vm, no_humanize: bool) -> VmwsResult<()> {
        let vid = vm.vid();
        match self.get_params(&vid).await {
            Ok(params) => {
                ParamConfig::from_params(&params).apply(vm, no_humanize)
            }
            Err(e) if e.is(&VmwsErrorKind::EncryptedInstance) => {
                warn!("{}: instance is encrypted, configuration unavailable", vid.name);
                vm.encrypted = true;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn bool_arg(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Depth-first search for the first scalar under a key matching one of
/// `names` (case-insensitive, underscores ignored).
fn find_key<'v>(v: &'v Value, names: &[&str]) -> Option<&'v Value> {
    let norm = |s: &str| s.to_lowercase().replace('_', "");
    match v {
        Value::Object(map) => {
            for name in names {
                let want = norm(name);
                let hit = map
                    .iter()
                    .find(|(k, val)| norm(k.as_str()) == want && !val.is_object() && !val.is_array());
                if let Some((_, val)) = hit {
                    return Some(val);
                }
            }
            map.values().find_map(|child| find_key(child, names))
        }
        Value::Array(items) => items.iter().find_map(|child| find_key(child, names)),
        _ => None,
    }
}

/// `configParams query` prints either an object of key/value pairs,
/// optionally nested under one key, or a list of `{name, value}` entries.
fn flatten_params(v: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    match v {
        Value::Object(map) if map.len() == 1 && map.values().all(|c| c.is_object() || c.is_array()) => {
            if let Some(inner) = map.values().next() {
                return flatten_params(inner);
            }
        }
        Value::Object(map) => {
            for (k, val) in map {
                out.insert(k.clone(), scalar(val));
            }
        }
        Value::Array(items) => {
            for item in items {
                let name = item
                    .get("name")
                    .or_else(|| item.get("key"))
                    .and_then(Value::as_str);
                if let Some(name) = name {
                    let value = item.get("value").map(scalar).unwrap_or_default();
                    out.insert(name.to_string(), value);
                }
            }
        }
        _ => {}
    }
    out
}

fn scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Structured view of the VMX parameters the controller reports on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamConfig {
    pub cpu_count: u32,
    pub memory_mb: u64,
    pub guest_os: String,
    pub guest_time_zone: String,
    pub iso_present: bool,
    pub iso_file: String,
    pub iso_start_connected: bool,
    pub mac_address: String,
    pub serial_attached: bool,
    pub serial_pipe: String,
    pub vnc_enabled: bool,
    pub vnc_port: u16,
    pub clipboard_enabled: bool,
    pub file_share_enabled: bool,
}

impl ParamConfig {
    pub fn from_params(params: &BTreeMap<String, String>) -> Self {
        let lower: BTreeMap<String, &str> = params
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.as_str()))
            .collect();
        let get = |k: &str| lower.get(&k.to_lowercase()).copied().unwrap_or("");
        let truthy = |k: &str| {
            matches!(
                get(k).to_lowercase().as_str(),
                "true" | "yes" | "1" | "on"
            )
        };

        let mac_address = if get("ethernet0.addressType").eq_ignore_ascii_case("static") {
            get("ethernet0.address").to_string()
        } else {
            get("ethernet0.generatedAddress").to_string()
        };

        let vnc_enabled = truthy("RemoteDisplay.vnc.enabled");
        let vnc_port = get("RemoteDisplay.vnc.port").parse().unwrap_or(if vnc_enabled { 5900 } else { 0 });

        Self {
            cpu_count: get("numvcpus").parse().unwrap_or(1),
            memory_mb: get("memsize").parse().unwrap_or(0),
            guest_os: get("guestOS").to_string(),
            guest_time_zone: get("guestTimeZone").to_string(),
            iso_present: truthy("ide1:0.present"),
            iso_file: get("ide1:0.fileName").to_string(),
            iso_start_connected: truthy("ide1:0.startConnected"),
            mac_address,
            serial_attached: truthy("serial0.present"),
            serial_pipe: get("serial0.fileName").to_string(),
            vnc_enabled,
            vnc_port,
            clipboard_enabled: !(truthy("isolation.tools.copy.disable")
                || truthy("isolation.tools.paste.disable")),
            file_share_enabled: get("isolation.tools.hgfs.disable").eq_ignore_ascii_case("false")
                && truthy("sharedFolder0.enabled"),
        }
    }

    pub fn apply(&self, vm: &mut Vm, no_humanize: bool) -> VmwsResult<()> {
        let ram_bytes = self.memory_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            VmwsError::parse(format!("memsize {} MB is out of range", self.memory_mb))
        })?;
        vm.cpu_count = self.cpu_count;
        vm.ram_size = format_size(ram_bytes, no_humanize);
        vm.guest_os = self.guest_os.clone();
        vm.guest_time_zone = self.guest_time_zone.clone();
        vm.iso_attached = self.iso_present;
        vm.iso_attach_on_start = self.iso_start_connected;
        vm.iso_file = self.iso_file.clone();
        vm.mac_address = self.mac_address.clone();
        vm.serial_attached = self.serial_attached;
        vm.serial_pipe = self.serial_pipe.clone();
        vm.vnc_enabled = self.vnc_enabled;
        vm.vnc_port = self.vnc_port;
        vm.clipboard_enabled = self.clipboard_enabled;
        vm.file_share_enabled = self.file_share_enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;
    use vmws_core::HostOs;
    use vmws_exec::Shell;

    /// Answers every command with one canned reply and records it.
    struct CannedShell {
        os: HostOs,
        reply: ExecOutput,
        seen: Mutex<Vec<String>>,
    }

    impl CannedShell {
        fn new(stdout: &str, exit_code: i32) -> Self {
            Self {
                os: HostOs::Linux,
                reply: ExecOutput::from_raw(stdout, "", exit_code),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HostShell for CannedShell {
        fn local_os(&self) -> &HostOs {
            &self.os
        }

        fn remote_os(&self) -> &HostOs {
            &self.os
        }

        fn shell(&self) -> Shell {
            Shell::Ssh
        }

        fn is_local(&self) -> bool {
            false
        }

        async fn remote_exec(&self, command: &str, policy: ExitPolicy) -> VmwsResult<ExecOutput> {
            self.seen.lock().unwrap().push(command.to_string());
            self.reply.clone().check(command, policy)
        }

        async fn remote_spawn(&self, command: &str, _policy: ExitPolicy) -> VmwsResult<()> {
            self.seen.lock().unwrap().push(command.to_string());
            Ok(())
        }

        async fn local_exec(&self, command: &str, policy: ExitPolicy) -> VmwsResult<ExecOutput> {
            self.remote_exec(command, policy).await
        }

        async fn put_file(&self, _local: &Path, _remote: &str) -> VmwsResult<()> {
            Ok(())
        }

        async fn get_file(&self, _remote: &str, _local: &Path) -> VmwsResult<()> {
            Ok(())
        }
    }

    fn vm() -> Vm {
        Vm::from_vid(&Vid::from_path("/vms/sec/sec.vmx").unwrap())
    }

    #[tokio::test]
    async fn encrypted_instance_is_flagged_not_failed() {
        let shell = CannedShell::new("Error: ENCRYPTED_VM_ERROR", 1);
        let cli = VmCli::new(&shell, "vmcli");
        let mut vm = vm();
        cli.query_config(&mut vm, false).await.unwrap();
        assert!(vm.encrypted);
        assert_eq!(vm.cpu_count, 0);

        let err = cli.query_power_state(&vm.vid()).await.unwrap_err();
        assert!(err.is(&VmwsErrorKind::EncryptedInstance));
        assert!(shell.seen.lock().unwrap()[0].starts_with("vmcli /vms/sec/sec.vmx configParams query"));
    }

    #[tokio::test]
    async fn other_vmcli_failures_surface() {
        let shell = CannedShell::new("Error: file not found", 1);
        let cli = VmCli::new(&shell, "vmcli");
        let mut vm = vm();
        assert!(cli.query_config(&mut vm, false).await.is_err());
        assert!(!vm.encrypted);
    }

    #[test]
    fn oversized_memsize_is_a_parse_error() {
        let mut p = BTreeMap::new();
        p.insert("memsize".to_string(), u64::MAX.to_string());
        let mut vm = Vm::default();
        let err = ParamConfig::from_params(&p).apply(&mut vm, false).unwrap_err();
        assert!(err.is(&VmwsErrorKind::ParseError));
        assert!(vm.ram_size.is_empty());
    }

    #[test]
    fn power_state_key_is_found_anywhere() {
        let v = json!({"PowerState": {"power_state": "poweredOn"}});
        let s = find_key(&v, &["power_state"]).unwrap();
        assert_eq!(s, "poweredOn");
        let v = json!({"PowerState": "off"});
        assert_eq!(find_key(&v, &["power_state", "powerstate"]).unwrap(), "off");
    }

    #[test]
    fn params_in_every_shape() {
        let flat = flatten_params(&json!({"numvcpus": "2", "memsize": 2048}));
        assert_eq!(flat["numvcpus"], "2");
        assert_eq!(flat["memsize"], "2048");

        let nested = flatten_params(&json!({"ConfigParams": {"numvcpus": "4"}}));
        assert_eq!(nested["numvcpus"], "4");

        let list = flatten_params(&json!([{"name": "guestOS", "value": "ubuntu-64"}]));
        assert_eq!(list["guestOS"], "ubuntu-64");
    }

    #[test]
    fn mac_follows_address_type() {
        let mut p = BTreeMap::new();
        p.insert("ethernet0.addressType".to_string(), "generated".to_string());
        p.insert("ethernet0.generatedAddress".to_string(), "00:0c:29:01:02:03".to_string());
        p.insert("ethernet0.address".to_string(), "aa:bb:cc:dd:ee:ff".to_string());
        assert_eq!(ParamConfig::from_params(&p).mac_address, "00:0c:29:01:02:03");
        p.insert("ethernet0.addressType".to_string(), "static".to_string());
        assert_eq!(ParamConfig::from_params(&p).mac_address, "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn config_fields() {
        let mut p = BTreeMap::new();
        for (k, v) in [
            ("numvcpus", "2"),
            ("memsize", "2048"),
            ("ide1:0.present", "TRUE"),
            ("ide1:0.fileName", "/iso/d.iso"),
            ("ide1:0.startConnected", "FALSE"),
            ("RemoteDisplay.vnc.enabled", "TRUE"),
            ("isolation.tools.copy.disable", "FALSE"),
            ("isolation.tools.paste.disable", "FALSE"),
        ] {
            p.insert(k.to_string(), v.to_string());
        }
        let cfg = ParamConfig::from_params(&p);
        let mut vm = Vm::default();
        cfg.apply(&mut vm, false).unwrap();
        assert_eq!(vm.cpu_count, 2);
        assert_eq!(vm.ram_size, "2G");
        assert!(vm.iso_attached && !vm.iso_attach_on_start);
        assert!(vm.vnc_enabled);
        assert_eq!(vm.vnc_port, 5900);
        assert!(vm.clipboard_enabled);
        assert!(!vm.file_share_enabled);
    }
}
