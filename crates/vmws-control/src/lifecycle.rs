//! Instance lifecycle: create, modify, start, stop, restart, destroy and
//! power-state waits.

use crate::controller::Controller;
use log::{debug, info};
use tokio::time::{sleep, Instant};
use vmws_core::shell::quote_arg;
use vmws_core::size::{parse_size, to_megabytes};
use vmws_core::{
    path, CreateOptions, DestroyOptions, IsoOptions, PowerState, StartOptions, StopOptions, Vid,
    Vm, VmState, VmwsError, VmwsResult,
};
use vmws_exec::ExitPolicy;
use vmws_vmx::{vmx_bool, VmxDocument};

/// `vmware-vdiskmanager -t` value.
pub fn disk_type(single_file: bool, preallocated: bool) -> u8 {
    match (single_file, preallocated) {
        (true, false) => 0,
        (false, false) => 1,
        (true, true) => 2,
        (false, true) => 3,
    }
}

fn check_instance_name(name: &str) -> VmwsResult<()> {
    if name.is_empty() {
        return Err(VmwsError::invalid_input("instance name is required"));
    }
    if name.contains(['/', '\\', ':']) || name.starts_with('.') {
        return Err(VmwsError::invalid_input(format!(
            "instance name '{}' must not contain path separators",
            name
        )));
    }
    Ok(())
}

impl Controller {
    // ── Create ──────────────────────────────────────────────────────

    pub async fn create(
        &mut self,
        name: &str,
        opts: &CreateOptions,
        iso: &IsoOptions,
    ) -> VmwsResult<Vm> {
        check_instance_name(name)?;
        if self.refresh_index().await?.contains_name(name) {
            return Err(VmwsError::already_exists(name));
        }
        let root = path::normalize(self.settings.primary_root()?)?;
        let vid = Vid::from_path(&path::join(&[&root, name, &format!("{}.vmx", name)]))?;
        info!("creating {} at {}", name, vid.path);

        self.shell.mkdir_all(&vid.dir()).await?;
        let iso = self.resolve_iso(iso).await?;

        let mut o = opts.clone();
        if !o.modify_name {
            o.modify_name = true;
            o.name = name.to_string();
        }
        let disk_mb = match (o.modify_disk, o.disk_size.is_empty()) {
            (true, false) => {
                o.disk_file = format!("{}.vmdk", name);
                Some(to_megabytes(parse_size(&o.disk_size)?))
            }
            _ => None,
        };

        let mut doc = VmxDocument::template(self.shell.remote_os().clone());
        doc.configure(&o, &iso)?;
        self.write_vmx(&vid, &doc).await?;

        if let Some(mb) = disk_mb {
            let cmd = format!(
                "{}{} -c -s {}MB -a nvme -t {} {}",
                path::chdir_command(self.shell.remote_os(), &vid.dir())?,
                self.settings.tools.vdiskmanager,
                mb,
                disk_type(o.disk_single_file, o.disk_preallocated),
                quote_arg(self.shell.remote_os(), &o.disk_file),
            );
            self.shell.remote_exec(&cmd, ExitPolicy::Check).await?;
        }

        if o.wait {
            // One boot lets the host finish first-boot configuration.
            self.wait_for(&vid, PowerState::Off).await?;
            let start = StartOptions {
                background: true,
                wait: true,
                ..Default::default()
            };
            self.start_vid(&vid, &start, &IsoOptions::default()).await?;
            self.stop_vid(&vid, &StopOptions { power_off: false, wait: true }).await?;
        }

        self.query_vm(&vid, false).await
    }

    // ── Modify ──────────────────────────────────────────────────────

    pub async fn modify(
        &mut self,
        key: &str,
        opts: &CreateOptions,
        iso: &IsoOptions,
    ) -> VmwsResult<Vec<String>> {
        let vid = self.resolve(key).await?;
        self.modify_vid(&vid, opts, iso).await
    }

    pub(crate) async fn modify_vid(
        &self,
        vid: &Vid,
        opts: &CreateOptions,
        iso: &IsoOptions,
    ) -> VmwsResult<Vec<String>> {
        self.require_off(vid).await?;
        let mut doc = self.read_vmx(vid).await?;
        let iso = self.resolve_iso(iso).await?;

        let mut o = opts.clone();
        if o.modify_disk {
            o.disk_file = doc
                .get("nvme0:0.fileName")
                .unwrap_or_else(|| format!("{}.vmdk", vid.name));
        }
        let actions = doc.configure(&o, &iso)?;
        self.write_vmx(vid, &doc).await?;

        if o.modify_disk && !o.disk_size.is_empty() {
            let mb = to_megabytes(parse_size(&o.disk_size)?);
            let file = self.instance_file(vid, &o.disk_file)?;
            let os = self.shell.remote_os();
            let cmd = format!(
                "{}{} -x {}MB {}",
                path::chdir_command(os, &vid.dir())?,
                self.settings.tools.vdiskmanager,
                mb,
                quote_arg(os, &path::format_for(os, &file)?),
            );
            self.shell.remote_exec(&cmd, ExitPolicy::Check).await?;
        }
        Ok(actions)
    }

    // ── Start ───────────────────────────────────────────────────────

    pub async fn start(
        &mut self,
        key: &str,
        opts: &StartOptions,
        iso: &IsoOptions,
    ) -> VmwsResult<VmState> {
        let vid = self.resolve(key).await?;
        self.start_vid(&vid, opts, iso).await
    }

    pub(crate) async fn start_vid(
        &self,
        vid: &Vid,
        opts: &StartOptions,
        iso: &IsoOptions,
    ) -> VmwsResult<VmState> {
        if self.power_state(vid).await? == PowerState::On {
            let vm = self.query_vm(vid, false).await?;
            return Ok(VmState::of(&vm, "already started"));
        }

        let mut restore_boot_connected = None;
        if iso.modify_iso {
            let current = self.vmcli().get_iso_options(vid).await?;
            restore_boot_connected = Some(current.iso_boot_connected);
            let matches = if iso.modify_boot_connected && iso.iso_file.is_empty() {
                current.iso_boot_connected == iso.iso_boot_connected
            } else {
                current.iso_present == iso.iso_present
                    && (!iso.iso_present || path::compare(&current.iso_file, &iso.iso_file))
                    && current.iso_boot_connected == iso.iso_boot_connected
            };
            if matches {
                info!("{}: ISO settings already match", vid.name);
            } else {
                if !iso.modify_boot_connected {
                    info!(
                        "{}: ISO present {} -> {}, file '{}' -> '{}'",
                        vid.name, current.iso_present, iso.iso_present, current.iso_file, iso.iso_file
                    );
                }
                self.modify_vid(vid, &CreateOptions::default(), iso).await?;
            }
        }

        let os = self.shell.remote_os();
        let cmd = if opts.fullscreen {
            format!(
                "{} -n -q -X {}",
                self.settings.tools.vmware,
                quote_arg(os, &path::format_for(os, &vid.path)?)
            )
        } else {
            self.vmrun().start_command(vid, opts.background)?
        };

        if opts.modify_stretch {
            self.vmcli()
                .set_param(vid, "gui.EnableStretchGuest", vmx_bool(opts.stretch_enabled))
                .await?;
        }

        self.shell.remote_spawn(&cmd, ExitPolicy::Check).await?;

        if opts.wait {
            self.wait_for(vid, PowerState::On).await?;
            if let Some(original) = restore_boot_connected {
                if original != iso.iso_boot_connected {
                    debug!("{}: restoring ISO boot-connected {}", vid.name, original);
                    self.vmcli().set_iso_start_connected(vid, original).await?;
                }
            }
        }

        let vm = self.query_vm(vid, false).await?;
        Ok(VmState::of(&vm, "started"))
    }

    // ── Stop / restart ──────────────────────────────────────────────

    pub async fn stop(&mut self, key: &str, opts: &StopOptions) -> VmwsResult<VmState> {
        let vid = self.resolve(key).await?;
        self.stop_vid(&vid, opts).await
    }

    pub(crate) async fn stop_vid(&self, vid: &Vid, opts: &StopOptions) -> VmwsResult<VmState> {
        if self.power_state(vid).await? == PowerState::Off {
            let vm = self.query_vm(vid, false).await?;
            return Ok(VmState::of(&vm, "already stopped"));
        }
        self.vmrun().stop(vid, opts.power_off).await?;
        if opts.wait {
            self.wait_for(vid, PowerState::Off).await?;
        }
        let vm = self.query_vm(vid, false).await?;
        Ok(VmState::of(&vm, "stopped"))
    }

    pub async fn restart(&mut self, key: &str, opts: &StartOptions) -> VmwsResult<VmState> {
        let vid = self.resolve(key).await?;
        self.stop_vid(&vid, &StopOptions { power_off: false, wait: true }).await?;
        self.start_vid(&vid, opts, &IsoOptions::default()).await
    }

    // ── Destroy ─────────────────────────────────────────────────────

    pub async fn destroy(&mut self, key: &str, opts: &DestroyOptions) -> VmwsResult<VmState> {
        let vid = self.resolve(key).await?;
        let state = self.power_state(&vid).await?;
        if state != PowerState::Off {
            if !opts.force {
                return Err(VmwsError::wrong_power_state(&vid.name, state.as_str(), "off"));
            }
            self.stop_vid(&vid, &StopOptions { power_off: true, wait: true }).await?;
        }
        info!("destroying {} ({})", vid.name, vid.dir());
        self.shell.remove_all(&vid.dir()).await?;
        Ok(VmState {
            name: vid.name.clone(),
            path: vid.path.clone(),
            id: vid.id.clone(),
            power_state: PowerState::Off,
            result: "destroyed".to_string(),
            ..Default::default()
        })
    }

    // ── Wait ────────────────────────────────────────────────────────

    /// Wait for a state given by name or alias (`up`, `running`, `down`).
    pub async fn wait(&mut self, key: &str, state: &str) -> VmwsResult<VmState> {
        let want = PowerState::parse(state)?;
        let vid = self.resolve(key).await?;
        self.wait_for(&vid, want).await?;
        let vm = self.query_vm(&vid, false).await?;
        Ok(VmState::of(&vm, format!("reached {}", want)))
    }

    /// Poll until `want` is observed. Waiting for `on` first requires the
    /// instance to show up in `vmrun list`. The last sample is taken at the
    /// deadline.
    pub(crate) async fn wait_for(&self, vid: &Vid, want: PowerState) -> VmwsResult<()> {
        let started = Instant::now();
        let budget = self.settings.wait_budget();
        let interval = self.settings.poll_interval();
        loop {
            let visible = want != PowerState::On || self.vmrun().is_running(vid).await?;
            if visible {
                let state = self.power_state(vid).await?;
                debug!("{}: power {} (waiting for {})", vid.name, state, want);
                if state == want {
                    return Ok(());
                }
            } else {
                debug!("{}: not yet listed by vmrun", vid.name);
            }
            let pause = match budget {
                Some(limit) => {
                    let elapsed = started.elapsed();
                    if elapsed >= limit {
                        return Err(VmwsError::timeout(&format!("wait for {} {}", vid.name, want)));
                    }
                    interval.min(limit - elapsed)
                }
                None => interval,
            };
            sleep(pause).await;
        }
    }
}
