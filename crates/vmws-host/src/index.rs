//! Instance index: discovery and identity resolution.

use crate::api::ControlApi;
use log::{debug, warn};
use std::collections::HashMap;
use vmws_core::shell::quote_arg;
use vmws_core::{path, Vid, VmwsError, VmwsResult};
use vmws_exec::{ExitPolicy, HostShell};

/// Discovered instances keyed by id, name and canonical path.
#[derive(Debug, Clone, Default)]
pub struct InstanceIndex {
    by_id: HashMap<String, Vid>,
    by_name: HashMap<String, Vid>,
    by_path: HashMap<String, Vid>,
    /// canonical path -> REST id
    rest_ids: HashMap<String, String>,
}

impl InstanceIndex {
    /// Build from `.vmx` paths in any notation. Duplicate names are a host
    /// configuration error; duplicate paths collapse.
    pub fn from_paths<I, S>(paths: I) -> VmwsResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for p in paths {
            index.insert(Vid::from_path(p.as_ref())?)?;
        }
        Ok(index)
    }

    /// Build from the REST inventory, remembering each REST id.
    pub async fn from_api(api: &dyn ControlApi) -> VmwsResult<Self> {
        let vms = api.list_vms().await?;
        let mut index = Self::default();
        for vm in vms {
            let vid = Vid::from_path(&vm.path)?;
            index.rest_ids.insert(vid.path.clone(), vm.id);
            index.insert(vid)?;
        }
        debug!("indexed {} instances from the REST API", index.len());
        Ok(index)
    }

    /// Scan each root one directory level deep.
    pub async fn discover(shell: &dyn HostShell, roots: &[String]) -> VmwsResult<Self> {
        if roots.is_empty() {
            return Err(VmwsError::config("no instance roots configured"));
        }
        let mut paths = Vec::new();
        for root in roots {
            paths.extend(scan_root(shell, root).await?);
        }
        let index = Self::from_paths(&paths)?;
        debug!("indexed {} instances under {} roots", index.len(), roots.len());
        Ok(index)
    }

    fn insert(&mut self, vid: Vid) -> VmwsResult<()> {
        if self.by_path.contains_key(&vid.path) {
            return Ok(());
        }
        if let Some(other) = self.by_name.get(&vid.name) {
            return Err(VmwsError::config(format!(
                "duplicate instance name '{}': {} and {}",
                vid.name, other.path, vid.path
            )));
        }
        self.by_id.insert(vid.id.clone(), vid.clone());
        self.by_name.insert(vid.name.clone(), vid.clone());
        self.by_path.insert(vid.path.clone(), vid);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.by_id.clear();
        self.by_name.clear();
        self.by_path.clear();
        self.rest_ids.clear();
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// All instances, ordered by name.
    pub fn vids(&self) -> Vec<Vid> {
        let mut v: Vec<Vid> = self.by_path.values().cloned().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v
    }

    pub fn rest_id(&self, vid: &Vid) -> Option<&str> {
        self.rest_ids.get(&vid.path).map(String::as_str)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Resolve an id, a name, a path, or an unambiguous path prefix.
    pub fn resolve(&self, key: &str) -> VmwsResult<Vid> {
        if key.is_empty() {
            return Err(VmwsError::invalid_input("empty instance reference"));
        }
        if let Some(v) = self.by_id.get(key) {
            return Ok(v.clone());
        }
        if let Some(v) = self.by_name.get(key) {
            return Ok(v.clone());
        }
        let canonical = match path::normalize(key) {
            Ok(p) => p,
            Err(_) => return Err(VmwsError::vm_not_found(key)),
        };
        if let Some(v) = self.by_path.get(&canonical) {
            return Ok(v.clone());
        }
        let matches: Vec<&Vid> = self
            .by_path
            .iter()
            .filter(|(p, _)| p.starts_with(&canonical))
            .map(|(_, v)| v)
            .collect();
        match matches.as_slice() {
            [one] => Ok((*one).clone()),
            [] => Err(VmwsError::vm_not_found(key)),
            many => Err(VmwsError::invalid_input(format!(
                "'{}' matches {} instances",
                key,
                many.len()
            ))),
        }
    }
}

/// `.vmx` paths directly below `root/<sub>/`.
async fn scan_root(shell: &dyn HostShell, root: &str) -> VmwsResult<Vec<String>> {
    let os = shell.remote_os();
    let host_root = path::format_for(os, root)?;
    if os.is_windows() {
        let cmd = format!("dir /B /AD {}", quote_arg(os, &host_root));
        let out = shell.remote_exec(&cmd, ExitPolicy::Capture).await?;
        if !out.success() {
            warn!("scan of {} exited {}", root, out.exit_code);
        }
        Ok(out
            .stdout
            .iter()
            .filter(|l| !l.is_empty())
            .map(|sub| path::join(&[root, sub, &format!("{}.vmx", sub)]))
            .collect())
    } else {
        let cmd = format!(
            "find {} -maxdepth 2 -type f -name '*.vmx'",
            quote_arg(os, &host_root)
        );
        let out = shell.remote_exec(&cmd, ExitPolicy::Capture).await?;
        if !out.success() {
            warn!("scan of {} exited {}", root, out.exit_code);
        }
        Ok(out
            .stdout
            .into_iter()
            .filter(|l| l.ends_with(".vmx"))
            .collect())
    }
}
