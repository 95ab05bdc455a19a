//! Controller façade.
//!
//! `Controller` owns the host shell, the optional REST client and the
//! per-operation instance index, and exposes every operator intent.
//! Each public operation begins by rebuilding the index.

use crate::settings::Settings;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use std::sync::Arc;
use url::Url;
use vmws_core::size::format_size;
use vmws_core::{path, IsoOptions, PowerState, Vid, Vm, VmDisk, VmwsError, VmwsErrorKind, VmwsResult};
use vmws_exec::transfer::{read_host_path, write_host_path};
use vmws_exec::{HostShell, TlsFiles};
use vmws_host::{vmdk, ControlApi, InstanceIndex, VmCli, VmRun};
use vmws_vmx::VmxDocument;

lazy_static! {
    static ref DISK_FILE_KEY: Regex =
        Regex::new(r"(?i)^((?:nvme|scsi|sata|ide)\d+:\d+)\.filename$").expect("disk key pattern");
}

pub struct Controller {
    pub(crate) shell: Arc<dyn HostShell>,
    pub(crate) api: Option<Arc<dyn ControlApi>>,
    pub(crate) settings: Settings,
    pub(crate) index: InstanceIndex,
}

impl Controller {
    pub fn new(
        shell: Arc<dyn HostShell>,
        api: Option<Arc<dyn ControlApi>>,
        settings: Settings,
    ) -> Self {
        Self {
            shell,
            api,
            settings,
            index: InstanceIndex::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn shell(&self) -> &dyn HostShell {
        self.shell.as_ref()
    }

    pub(crate) fn vmcli(&self) -> VmCli<'_> {
        VmCli::new(self.shell.as_ref(), &self.settings.tools.vmcli)
    }

    pub(crate) fn vmrun(&self) -> VmRun<'_> {
        VmRun::new(self.shell.as_ref(), &self.settings.tools.vmrun)
    }

    // ── Index ───────────────────────────────────────────────────────

    /// Drop the cached index and rebuild it from the REST inventory when
    /// an API is configured, otherwise from a filesystem scan.
    pub async fn refresh_index(&mut self) -> VmwsResult<&InstanceIndex> {
        self.index.reset();
        self.index = match self.api {
            Some(ref api) => InstanceIndex::from_api(api.as_ref()).await?,
            None => InstanceIndex::discover(self.shell.as_ref(), &self.settings.roots).await?,
        };
        Ok(&self.index)
    }

    /// Rebuild the index and resolve an id, name or path.
    pub async fn resolve(&mut self, key: &str) -> VmwsResult<Vid> {
        self.refresh_index().await?.resolve(key)
    }

    // ── Power ───────────────────────────────────────────────────────

    /// REST when the instance has a REST id, `vmcli` otherwise.
    pub(crate) async fn power_state(&self, vid: &Vid) -> VmwsResult<PowerState> {
        if let (Some(api), Some(rest_id)) = (self.api.as_ref(), self.index.rest_id(vid)) {
            let power = api.get_power(rest_id).await?;
            return PowerState::parse(&power.power_state);
        }
        self.vmcli().query_power_state(vid).await
    }

    /// Fail with `WrongPowerState` unless the instance is off.
    pub(crate) async fn require_off(&self, vid: &Vid) -> VmwsResult<()> {
        let state = self.power_state(vid).await?;
        if state != PowerState::Off {
            return Err(VmwsError::wrong_power_state(&vid.name, state.as_str(), "off"));
        }
        Ok(())
    }

    // ── Inspection ──────────────────────────────────────────────────

    /// Materialize an instance record. With `all` the configuration, guest
    /// IP and disks are filled in as well.
    pub async fn query_vm(&self, vid: &Vid, all: bool) -> VmwsResult<Vm> {
        let mut vm = Vm::from_vid(vid);
        match self.power_state(vid).await {
            Ok(state) => {
                vm.power_state = state;
                vm.running = state != PowerState::Off;
            }
            Err(e) if e.is(&VmwsErrorKind::EncryptedInstance) => {
                warn!("{}: encrypted, skipping further queries", vid.name);
                vm.encrypted = true;
                return Ok(vm);
            }
            Err(e) => return Err(e),
        }
        if !all {
            return Ok(vm);
        }

        self.vmcli().query_config(&mut vm, self.settings.no_humanize).await?;
        if vm.encrypted {
            return Ok(vm);
        }
        if vm.running {
            vm.ip_address = self.vmrun().guest_ip(vid).await?;
        }
        vm.disks = self.query_disks(vid).await?;
        let total: u64 = vm.disks.iter().map(|d| d.capacity).sum();
        vm.disk_size = format_size(total, self.settings.no_humanize);
        Ok(vm)
    }

    /// Disks referenced by the VMX, with their descriptors.
    pub(crate) async fn query_disks(&self, vid: &Vid) -> VmwsResult<Vec<VmDisk>> {
        let doc = self.read_vmx(vid).await?;
        let mut disks = Vec::new();
        for (key, value) in doc.to_map() {
            let Some(caps) = DISK_FILE_KEY.captures(&key) else {
                continue;
            };
            if !value.to_lowercase().ends_with(".vmdk") {
                continue;
            }
            let file = self.instance_file(vid, &value)?;
            debug!("{}: disk {} -> {}", vid.name, &caps[1], file);
            disks.push(
                vmdk::read_disk(self.shell.as_ref(), &caps[1], &file, self.settings.no_humanize)
                    .await?,
            );
        }
        Ok(disks)
    }

    /// Canonical path of a VMX file reference, relative to the instance
    /// directory unless absolute.
    pub(crate) fn instance_file(&self, vid: &Vid, reference: &str) -> VmwsResult<String> {
        let slashed = reference.replace('\\', "/");
        let absolute = slashed.starts_with('/')
            || (slashed.len() > 1 && slashed.as_bytes()[1] == b':');
        if absolute {
            path::normalize(reference)
        } else {
            Ok(vid.file(&slashed))
        }
    }

    // ── VMX round-trip ──────────────────────────────────────────────

    pub(crate) async fn read_vmx(&self, vid: &Vid) -> VmwsResult<VmxDocument> {
        let data = read_host_path(self.shell.as_ref(), &vid.path).await?;
        let text = String::from_utf8_lossy(&data);
        Ok(VmxDocument::parse(&text, self.shell.remote_os().clone()))
    }

    pub(crate) async fn write_vmx(&self, vid: &Vid, doc: &VmxDocument) -> VmwsResult<()> {
        write_host_path(self.shell.as_ref(), &vid.path, doc.render().as_bytes()).await
    }

    // ── ISO media ───────────────────────────────────────────────────

    /// Turn the operator's ISO reference into a host path: URLs are
    /// downloaded into the ISO root, names are placed under it.
    pub(crate) async fn resolve_iso(&self, iso: &IsoOptions) -> VmwsResult<IsoOptions> {
        let mut out = iso.clone();
        if !iso.modify_iso || iso.iso_file.is_empty() {
            return Ok(out);
        }
        if iso.is_url() {
            let root = path::normalize(self.settings.require_iso_root()?)?;
            let url = Url::parse(&iso.iso_file).map_err(|e| {
                VmwsError::invalid_input(format!("invalid ISO URL '{}': {}", iso.iso_file, e))
            })?;
            let name = url
                .path_segments()
                .and_then(|mut s| s.next_back())
                .unwrap_or_default()
                .to_string();
            if name.is_empty() {
                return Err(VmwsError::invalid_input(format!(
                    "ISO URL '{}' has no file name",
                    iso.iso_file
                )));
            }
            let dest = path::join(&[&root, &name]);
            let tls = TlsFiles {
                cert: iso.iso_client_cert.clone(),
                key: iso.iso_client_key.clone(),
                ca: iso.iso_ca.clone(),
            };
            info!("downloading {} to {}", iso.iso_file, dest);
            self.shell.fetch_url(&iso.iso_file, &dest, &tls).await?;
            out.iso_file = dest;
            return Ok(out);
        }
        let slashed = iso.iso_file.replace('\\', "/");
        let absolute = slashed.starts_with('/') || slashed.as_bytes().get(1) == Some(&b':');
        out.iso_file = if absolute {
            path::normalize(&iso.iso_file)?
        } else {
            path::format_iso_pathname(self.settings.require_iso_root()?, &iso.iso_file)?
        };
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{controller, seed};
    use vmws_core::PowerState;

    #[tokio::test]
    async fn encrypted_instance_degrades_to_flag() {
        let (mut ctl, state) = controller(false);
        seed(&state, "sec", "displayName = \"sec\"\nnvme0:0.fileName = \"sec.vmdk\"\n", PowerState::On);
        state.lock().unwrap().encrypted = true;

        let vid = ctl.resolve("sec").await.unwrap();
        let vm = ctl.query_vm(&vid, true).await.unwrap();
        assert!(vm.encrypted);
        assert!(vm.disks.is_empty());

        let st = state.lock().unwrap();
        assert_eq!(st.positions("power query").len(), 1);
        assert!(st.positions("getGuestIPAddress").is_empty());
        assert!(st.positions("head -c").is_empty());
    }

    #[tokio::test]
    async fn encrypted_config_stops_detail_queries() {
        let (mut ctl, state) = controller(true);
        seed(&state, "sec", "displayName = \"sec\"\nnvme0:0.fileName = \"sec.vmdk\"\n", PowerState::On);
        state.lock().unwrap().encrypted = true;

        let vid = ctl.resolve("sec").await.unwrap();
        let vm = ctl.query_vm(&vid, true).await.unwrap();
        assert!(vm.encrypted);
        assert_eq!(vm.power_state, PowerState::On);

        let st = state.lock().unwrap();
        assert_eq!(st.positions("configParams query").len(), 1);
        assert!(st.positions("getGuestIPAddress").is_empty());
        assert!(st.positions("head -c").is_empty());
    }
}
