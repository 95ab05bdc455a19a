//! Listings, inventory display, transfers, VMX editing and utility
//! passthroughs.

use crate::controller::Controller;
use log::{debug, info};
use std::path::{Path, PathBuf};
use vmws_core::shell::join_args;
use vmws_core::{path, FilesOptions, ShowOptions, Vid, Vm, VmFile, VmwsError, VmwsResult};
use vmws_exec::shell::list_dir_command;
use vmws_exec::{transfer, ExitPolicy};

fn keep_file(name: &str, opts: &FilesOptions) -> bool {
    let lower = name.to_lowercase();
    if opts.all {
        true
    } else if opts.iso {
        lower.ends_with(".iso")
    } else {
        lower.ends_with(".vmx")
    }
}

impl Controller {
    // ── Files ───────────────────────────────────────────────────────

    /// List an instance directory, every instance directory (`key == ""`),
    /// or the ISO store. Without `detail` each name is a canonical path.
    pub async fn files(&mut self, key: &str, opts: &FilesOptions) -> VmwsResult<Vec<VmFile>> {
        let dirs: Vec<String> = if opts.iso || path::is_iso_path(key) {
            let root = self.settings.require_iso_root()?;
            let rel = if key.is_empty() { "iso" } else { key };
            vec![path::format_iso_path(root, rel)?]
        } else if key.is_empty() {
            self.refresh_index().await?.vids().iter().map(Vid::dir).collect()
        } else {
            vec![self.resolve(key).await?.dir()]
        };
        let opts = FilesOptions {
            iso: opts.iso || path::is_iso_path(key),
            ..opts.clone()
        };

        let os = self.shell.remote_os().clone();
        let mut out = Vec::new();
        for dir in dirs {
            let cmd = list_dir_command(&os, &dir)?;
            let listing = self.shell.remote_exec(&cmd, ExitPolicy::Check).await?;
            for f in path::parse_file_list(&os, &listing.stdout) {
                if !keep_file(&f.name, &opts) {
                    continue;
                }
                if opts.detail {
                    out.push(f);
                } else {
                    out.push(VmFile {
                        name: path::join(&[&dir, &f.name]),
                        length: f.length,
                    });
                }
            }
        }
        Ok(out)
    }

    // ── Show ────────────────────────────────────────────────────────

    pub async fn show(&mut self, key: &str, opts: &ShowOptions) -> VmwsResult<Vec<Vm>> {
        self.refresh_index().await?;
        let vids: Vec<Vid> = if opts.running_only && key.is_empty() {
            let running = self.vmrun().list().await?;
            running
                .iter()
                .map(|p| self.index.resolve(p).or_else(|_| Vid::from_path(p)))
                .collect::<VmwsResult<_>>()?
        } else {
            let running = if opts.running_only {
                Some(self.vmrun().list().await?)
            } else {
                None
            };
            self.index
                .vids()
                .into_iter()
                .filter(|v| key.is_empty() || v.name.eq_ignore_ascii_case(key))
                .filter(|v| running.as_ref().map_or(true, |r| r.contains(&v.path)))
                .collect()
        };
        if !key.is_empty() && vids.is_empty() {
            return Err(VmwsError::vm_not_found(key));
        }

        let mut vms = Vec::with_capacity(vids.len());
        for vid in &vids {
            vms.push(self.query_vm(vid, opts.detail).await?);
        }
        Ok(vms)
    }

    // ── Transfers ───────────────────────────────────────────────────

    /// Copy a local file into the instance directory. Returns the host path.
    pub async fn upload(&mut self, local: &Path, key: &str, dest: Option<&str>) -> VmwsResult<String> {
        let vid = self.resolve(key).await?;
        let filename = match dest {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => local
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| VmwsError::invalid_input("local path has no file name"))?,
        };
        let remote = transfer::upload(self.shell.as_ref(), &vid, local, &filename).await?;
        info!("uploaded {} to {}", local.display(), remote);
        Ok(remote)
    }

    /// Copy a file out of the instance directory. Returns the local path.
    pub async fn download(
        &mut self,
        key: &str,
        filename: &str,
        local: Option<&Path>,
    ) -> VmwsResult<PathBuf> {
        let vid = self.resolve(key).await?;
        let local = match local {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(path::basename(filename)),
        };
        let remote = transfer::download(self.shell.as_ref(), &vid, &local, filename).await?;
        info!("downloaded {} to {}", remote, local.display());
        Ok(local)
    }

    // ── Edit ────────────────────────────────────────────────────────

    /// Copy the VMX to a local temp file, hand it to `edit`, and write it
    /// back when it changed. Returns whether it changed.
    pub async fn edit<F>(&mut self, key: &str, edit: F) -> VmwsResult<bool>
    where
        F: FnOnce(&Path) -> VmwsResult<()>,
    {
        let vid = self.resolve(key).await?;
        self.require_off(&vid).await?;
        let doc = self.read_vmx(&vid).await?;
        let before = doc.render();

        let tmp = tempfile::Builder::new()
            .prefix(&format!("{}-", vid.name))
            .suffix(".vmx")
            .tempfile()?;
        tokio::fs::write(tmp.path(), &before).await?;
        edit(tmp.path())?;
        let after = tokio::fs::read_to_string(tmp.path()).await?;

        if after == before {
            debug!("{}: vmx unchanged", vid.name);
            return Ok(false);
        }
        let doc = vmws_vmx::VmxDocument::parse(&after, self.shell.remote_os().clone());
        self.write_vmx(&vid, &doc).await?;
        Ok(true)
    }

    // ── Passthroughs ────────────────────────────────────────────────

    pub async fn vmrun_passthrough(&self, args: &[String]) -> VmwsResult<Vec<String>> {
        self.vmrun().passthrough(args).await
    }

    /// Launch the `vmware` GUI on the host with `args`.
    pub async fn vmware_passthrough(&self, args: &[String]) -> VmwsResult<()> {
        let os = self.shell.remote_os();
        let cmd = format!("{} {}", self.settings.tools.vmware, join_args(os, args));
        self.shell.remote_spawn(cmd.trim_end(), ExitPolicy::Check).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{controller, seed, Shared};
    use vmws_core::{PowerState, VmwsErrorKind};

    fn two_instances(state: &Shared) {
        seed(state, "alpha", "displayName = \"alpha\"\n", PowerState::On);
        seed(state, "beta", "displayName = \"beta\"\n", PowerState::Off);
        state
            .lock()
            .unwrap()
            .files
            .insert("/vms/alpha/alpha.vmdk".into(), vec![0; 16]);
    }

    #[test]
    fn listing_filters() {
        let vmx_only = FilesOptions::default();
        assert!(keep_file("a.VMX", &vmx_only));
        assert!(!keep_file("a.vmdk", &vmx_only));
        let iso = FilesOptions { iso: true, ..Default::default() };
        assert!(keep_file("debian.iso", &iso));
        let all = FilesOptions { all: true, ..Default::default() };
        assert!(keep_file("vmware.log", &all));
    }

    #[tokio::test]
    async fn lists_vmx_files_as_paths() {
        let (mut ctl, state) = controller(false);
        two_instances(&state);

        let files = ctl.files("", &FilesOptions::default()).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["/vms/alpha/alpha.vmx", "/vms/beta/beta.vmx"]);

        let all = FilesOptions { all: true, detail: true, ..Default::default() };
        let files = ctl.files("alpha", &all).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["alpha.vmdk", "alpha.vmx"]);
        assert_eq!(files[0].length, 16);
    }

    #[tokio::test]
    async fn lists_iso_store() {
        let (mut ctl, state) = controller(false);
        state.lock().unwrap().files.insert("/vms/iso/debian.iso".into(), vec![0; 4]);
        let iso = FilesOptions { iso: true, ..Default::default() };
        let files = ctl.files("", &iso).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "/vms/iso/debian.iso");
    }

    #[tokio::test]
    async fn show_filters_by_name_and_power() {
        let (mut ctl, state) = controller(false);
        two_instances(&state);

        let vms = ctl.show("", &ShowOptions::default()).await.unwrap();
        assert_eq!(vms.len(), 2);

        let vms = ctl.show("BETA", &ShowOptions::default()).await.unwrap();
        assert_eq!(vms[0].name, "beta");
        assert_eq!(vms[0].power_state, PowerState::Off);

        let running = ShowOptions { running_only: true, ..Default::default() };
        let vms = ctl.show("", &running).await.unwrap();
        assert_eq!(vms.len(), 1);
        assert_eq!(vms[0].name, "alpha");

        let err = ctl.show("gamma", &ShowOptions::default()).await.unwrap_err();
        assert!(err.is(&VmwsErrorKind::VmNotFound));
    }

    #[tokio::test]
    async fn transfers_use_instance_directory() {
        let (mut ctl, state) = controller(false);
        two_instances(&state);
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("notes.txt");
        std::fs::write(&local, "hello").unwrap();

        let remote = ctl.upload(&local, "beta", None).await.unwrap();
        assert!(remote.ends_with("notes.txt"));
        assert_eq!(state.lock().unwrap().files["/vms/beta/notes.txt"], b"hello".to_vec());

        let back = dir.path().join("copy.txt");
        ctl.download("beta", "notes.txt", Some(&back)).await.unwrap();
        assert_eq!(std::fs::read_to_string(&back).unwrap(), "hello");
    }

    #[tokio::test]
    async fn edit_writes_back_only_changes() {
        let (mut ctl, state) = controller(false);
        two_instances(&state);

        let changed = ctl.edit("beta", |_| Ok(())).await.unwrap();
        assert!(!changed);
        assert!(state.lock().unwrap().positions("put").is_empty());

        let changed = ctl
            .edit("beta", |p| {
                let mut text = std::fs::read_to_string(p)?;
                text.push_str("numvcpus = \"4\"\n");
                std::fs::write(p, text)?;
                Ok(())
            })
            .await
            .unwrap();
        assert!(changed);
        assert!(state
            .lock()
            .unwrap()
            .vmx_text("/vms/beta/beta.vmx")
            .contains("numvcpus = \"4\""));

        let err = ctl.edit("alpha", |_| Ok(())).await.unwrap_err();
        assert!(err.is(&VmwsErrorKind::WrongPowerState));
    }
}
