//! In-memory host and REST API that journal every call.

use crate::{Controller, Settings};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use vmws_core::{HostOs, PowerState, VmwsError, VmwsResult};
use vmws_exec::{ExecOutput, ExitPolicy, HostShell, Shell, TlsFiles};
use vmws_host::types::{ApiParam, ApiPower, ApiVm, ApiVmInfo, Restrictions};
use vmws_host::ControlApi;

#[derive(Debug, Default)]
pub struct HostState {
    pub files: BTreeMap<String, Vec<u8>>,
    pub power: HashMap<String, PowerState>,
    pub params: BTreeMap<String, String>,
    pub journal: Vec<String>,
    pub encrypted: bool,
    /// `vmrun list` calls still to answer with no running instances.
    pub hidden_lists: u32,
}

pub type Shared = Arc<Mutex<HostState>>;

impl HostState {
    fn vmx_in(&self, cmd: &str) -> Option<String> {
        self.files
            .keys()
            .filter(|p| p.ends_with(".vmx") && cmd.contains(p.as_str()))
            .max_by_key(|p| p.len())
            .cloned()
    }

    fn file_in(&self, cmd: &str) -> Option<String> {
        self.files
            .keys()
            .filter(|p| cmd.contains(p.as_str()))
            .max_by_key(|p| p.len())
            .cloned()
    }

    /// Indices of journal entries containing `needle`.
    pub fn positions(&self, needle: &str) -> Vec<usize> {
        self.journal
            .iter()
            .enumerate()
            .filter(|(_, e)| e.contains(needle))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn vmx_text(&self, path: &str) -> String {
        self.files
            .get(path)
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .unwrap_or_default()
    }
}

fn ok(stdout: &str) -> ExecOutput {
    ExecOutput::from_raw(stdout, "", 0)
}

pub struct FakeHost {
    os: HostOs,
    state: Shared,
}

impl FakeHost {
    fn respond(&self, cmd: &str) -> ExecOutput {
        let mut st = self.state.lock().unwrap();
        st.journal.push(format!("exec {}", cmd));
        let vmx = st.vmx_in(cmd);

        if cmd.contains("power query") {
            if st.encrypted {
                return ExecOutput::from_raw("Error: ENCRYPTED_VM_ERROR", "", 1);
            }
            let state = vmx
                .and_then(|p| st.power.get(&p).copied())
                .unwrap_or_default();
            return ok(&format!("{{\"PowerState\": {{\"power_state\": \"{}\"}}}}", state));
        }
        if cmd.contains("configParams query") {
            if st.encrypted {
                return ExecOutput::from_raw("Error: ENCRYPTED_VM_ERROR", "", 1);
            }
            return ok(&serde_json::to_string(&st.params).unwrap());
        }
        if let Some(rest) = cmd.split(" configParams SetEntry ").nth(1) {
            let mut parts = rest.splitn(2, ' ');
            let key = parts.next().unwrap_or_default().to_string();
            let value = parts.next().unwrap_or_default().trim_matches('\'').to_string();
            st.params.insert(key, value);
            return ok("");
        }
        if cmd.contains("-T ws list") {
            let hidden = st.hidden_lists > 0;
            if hidden {
                st.hidden_lists -= 1;
            }
            let running: Vec<String> = st
                .power
                .iter()
                .filter(|(_, s)| !hidden && **s == PowerState::On)
                .map(|(p, _)| p.clone())
                .collect();
            st.journal.push(format!("vmrun listed {}", running.len()));
            let mut out = format!("Total running VMs: {}\n", running.len());
            for p in running {
                out.push_str(&p);
                out.push('\n');
            }
            return ok(&out);
        }
        if cmd.contains("-T ws stop") {
            if let Some(p) = vmx {
                st.power.insert(p, PowerState::Off);
            }
            return ok("");
        }
        if cmd.contains("getGuestIPAddress") {
            return ok("192.168.10.20");
        }
        if cmd.starts_with("find ") {
            let paths: Vec<String> = st.files.keys().filter(|p| p.ends_with(".vmx")).cloned().collect();
            return ok(&paths.join("\n"));
        }
        if cmd.starts_with("head -c") {
            let text = st.file_in(cmd).map(|p| st.vmx_text(&p)).unwrap_or_default();
            return ok(&text);
        }
        if let Some(dir) = cmd.strip_prefix("ls -al ") {
            let prefix = format!("{}/", dir.trim_matches('\''));
            let lines: Vec<String> = st
                .files
                .iter()
                .filter_map(|(p, d)| {
                    let name = p.strip_prefix(&prefix)?;
                    (!name.contains('/'))
                        .then(|| format!("-rw-r--r-- 1 vm vm {} Jan  1 12:00 {}", d.len(), name))
                })
                .collect();
            return ok(&lines.join("\n"));
        }
        ok("")
    }
}

#[async_trait]
impl HostShell for FakeHost {
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
        self.respond(command).check(command, policy)
    }

    async fn remote_spawn(&self, command: &str, _policy: ExitPolicy) -> VmwsResult<()> {
        let mut st = self.state.lock().unwrap();
        st.journal.push(format!("spawn {}", command));
        if command.contains("-T ws start") {
            if let Some(p) = st.vmx_in(command) {
                st.power.insert(p, PowerState::On);
            }
        }
        Ok(())
    }

    async fn local_exec(&self, command: &str, policy: ExitPolicy) -> VmwsResult<ExecOutput> {
        self.remote_exec(command, policy).await
    }

    async fn put_file(&self, local: &Path, remote: &str) -> VmwsResult<()> {
        let data = std::fs::read(local)?;
        let mut st = self.state.lock().unwrap();
        st.journal.push(format!("put {}", remote));
        st.files.insert(remote.to_string(), data);
        Ok(())
    }

    async fn get_file(&self, remote: &str, local: &Path) -> VmwsResult<()> {
        let data = {
            let mut st = self.state.lock().unwrap();
            st.journal.push(format!("get {}", remote));
            st.files.get(remote).cloned()
        };
        let data = data.ok_or_else(|| VmwsError::non_zero_exit(&format!("scp {}", remote), 1, &[]))?;
        std::fs::write(local, data)?;
        Ok(())
    }

    async fn mkdir_all(&self, remote: &str) -> VmwsResult<()> {
        self.state.lock().unwrap().journal.push(format!("mkdir {}", remote));
        Ok(())
    }

    async fn remove_all(&self, remote: &str) -> VmwsResult<()> {
        let mut st = self.state.lock().unwrap();
        st.journal.push(format!("rm {}", remote));
        let prefix = format!("{}/", remote);
        st.files.retain(|p, _| !p.starts_with(&prefix));
        Ok(())
    }

    async fn fetch_url(&self, url: &str, dest: &str, tls: &TlsFiles) -> VmwsResult<()> {
        let mut st = self.state.lock().unwrap();
        st.journal.push(format!("fetch {} -> {} cert={}", url, dest, !tls.is_empty()));
        st.files.insert(dest.to_string(), b"ISO".to_vec());
        Ok(())
    }
}

/// REST ids are the canonical paths.
pub struct FakeApi {
    state: Shared,
}

#[async_trait]
impl ControlApi for FakeApi {
    async fn list_vms(&self) -> VmwsResult<Vec<ApiVm>> {
        let mut st = self.state.lock().unwrap();
        st.journal.push("api GET vms".to_string());
        Ok(st
            .files
            .keys()
            .filter(|p| p.ends_with(".vmx"))
            .map(|p| ApiVm { id: p.clone(), path: p.clone() })
            .collect())
    }

    async fn get_vm(&self, id: &str) -> VmwsResult<ApiVmInfo> {
        Ok(ApiVmInfo { id: id.to_string(), ..Default::default() })
    }

    async fn get_restrictions(&self, id: &str) -> VmwsResult<Restrictions> {
        self.state.lock().unwrap().journal.push(format!("api GET vms/{}/restrictions", id));
        Ok(Restrictions { id: id.to_string(), memory: 2048, ..Default::default() })
    }

    async fn get_param(&self, _id: &str, name: &str) -> VmwsResult<ApiParam> {
        Ok(ApiParam { name: name.to_string(), value: String::new() })
    }

    async fn set_param(&self, _id: &str, _name: &str, _value: &str) -> VmwsResult<()> {
        Ok(())
    }

    async fn get_power(&self, id: &str) -> VmwsResult<ApiPower> {
        let mut st = self.state.lock().unwrap();
        st.journal.push(format!("api GET vms/{}/power", id));
        let state = st.power.get(id).copied().unwrap_or_default();
        let name = match state {
            PowerState::On => "poweredOn",
            PowerState::Off => "poweredOff",
            PowerState::Paused => "paused",
            PowerState::Suspended => "suspended",
        };
        Ok(ApiPower { power_state: name.to_string() })
    }
}

pub fn settings() -> Settings {
    Settings {
        roots: vec!["/vms".to_string()],
        iso_root: "/vms/iso".to_string(),
        interval: 1,
        timeout: 5,
        ..Default::default()
    }
}

/// Controller over a fresh fake host; with `api` the REST fake is attached.
pub fn controller(api: bool) -> (Controller, Shared) {
    let state: Shared = Arc::new(Mutex::new(HostState::default()));
    let shell = Arc::new(FakeHost { os: HostOs::Linux, state: state.clone() });
    let api: Option<Arc<dyn ControlApi>> = if api {
        Some(Arc::new(FakeApi { state: state.clone() }))
    } else {
        None
    };
    (Controller::new(shell, api, settings()), state)
}

/// Place an instance on the fake host. Returns its canonical path.
pub fn seed(state: &Shared, name: &str, vmx: &str, power: PowerState) -> String {
    let path = format!("/vms/{}/{}.vmx", name, name);
    let mut st = state.lock().unwrap();
    st.files.insert(path.clone(), vmx.as_bytes().to_vec());
    st.power.insert(path.clone(), power);
    path
}
