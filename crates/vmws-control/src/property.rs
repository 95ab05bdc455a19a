//! Property reflector: `get` / `set` by name.
//!
//! Names are matched case-insensitively with underscores ignored. Reserved
//! names are computed views; a name matching a serialized [`Vm`] field
//! reads that field; anything else passes through to the VMX parameters.

use crate::controller::Controller;
use lazy_static::lazy_static;
use serde_json::{json, Value};
use std::collections::HashMap;
use vmws_core::size::{format_size, parse_size, to_megabytes};
use vmws_core::{Vid, Vm, VmState, VmwsError, VmwsResult};
use vmws_vmx::VmxDocument;

lazy_static! {
    /// Lowercased field name -> serialized (PascalCase) field name.
    static ref VM_FIELDS: HashMap<String, String> = {
        let mut map = HashMap::new();
        if let Ok(Value::Object(fields)) = serde_json::to_value(Vm::default()) {
            for name in fields.keys() {
                map.insert(fold(name), name.clone());
            }
        }
        map.insert("disks".to_string(), "Disks".to_string());
        map
    };
}

fn fold(name: &str) -> String {
    name.to_lowercase().replace(['_', '-'], "")
}

/// Canonical field name for a property, if it names a [`Vm`] field.
pub fn vm_field(property: &str) -> Option<&'static str> {
    VM_FIELDS.get(&fold(property)).map(String::as_str)
}

/// VMX key written for a settable field; other fields are read-only.
fn writable_key(field: &str) -> Option<&'static str> {
    match field {
        "CpuCount" => Some("numvcpus"),
        "RamSize" => Some("memsize"),
        "GuestOS" => Some("guestOS"),
        "GuestTimeZone" => Some("guestTimeZone"),
        _ => None,
    }
}

/// Validate and convert a field value to its VMX form.
fn field_value(field: &str, value: &str) -> VmwsResult<String> {
    match field {
        "CpuCount" => match value.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(n.to_string()),
            _ => Err(VmwsError::invalid_input(format!("invalid CPU count '{}'", value))),
        },
        "RamSize" => {
            let mb = to_megabytes(parse_size(value)?);
            if mb == 0 {
                return Err(VmwsError::invalid_input(format!("invalid memory size '{}'", value)));
            }
            Ok(mb.to_string())
        }
        _ => {
            if value.is_empty() {
                return Err(VmwsError::invalid_input(format!("{} must not be empty", field)));
            }
            Ok(value.to_string())
        }
    }
}

impl Controller {
    pub async fn get_property(&mut self, key: &str, property: &str) -> VmwsResult<Value> {
        let vid = self.resolve(key).await?;
        self.get_property_vid(&vid, property).await
    }

    pub(crate) async fn get_property_vid(&self, vid: &Vid, property: &str) -> VmwsResult<Value> {
        let prop = property.to_lowercase();
        match prop.as_str() {
            "vmx" => Ok(Value::String(self.read_vmx(vid).await?.render())),
            "power" => Ok(Value::String(self.power_state(vid).await?.to_string())),
            "ip" => Ok(Value::String(self.vmrun().guest_ip(vid).await?)),
            "disk" | "disks" => Ok(serde_json::to_value(self.query_disks(vid).await?)?),
            "disksize" | "diskcapacity" => {
                let total: u64 = self.query_disks(vid).await?.iter().map(|d| d.capacity).sum();
                if prop == "diskcapacity" {
                    Ok(json!(total))
                } else {
                    Ok(Value::String(format_size(total, self.settings.no_humanize)))
                }
            }
            "mac" => {
                let vm = self.query_vm(vid, true).await?;
                Ok(Value::String(vm.mac_address))
            }
            "state" => {
                let vm = self.query_vm(vid, false).await?;
                Ok(serde_json::to_value(VmState::of(&vm, ""))?)
            }
            "config" => {
                if let (Some(api), Some(rest_id)) = (self.api.as_ref(), self.index.rest_id(vid)) {
                    return Ok(serde_json::to_value(api.get_restrictions(rest_id).await?)?);
                }
                Ok(serde_json::to_value(self.vmcli().get_params(vid).await?)?)
            }
            "" | "all" | "detail" => Ok(serde_json::to_value(self.query_vm(vid, true).await?)?),
            _ => {
                if let Some(field) = vm_field(&prop) {
                    let vm = serde_json::to_value(self.query_vm(vid, true).await?)?;
                    return Ok(vm.get(field).cloned().unwrap_or(Value::Null));
                }
                match self.vmcli().get_param(vid, property).await? {
                    Some(v) => Ok(Value::String(v)),
                    None => Err(VmwsError::invalid_input(format!(
                        "{} has no property '{}'",
                        vid.name, property
                    ))),
                }
            }
        }
    }

    /// Returns an action string.
    pub async fn set_property(&mut self, key: &str, property: &str, value: &str) -> VmwsResult<String> {
        let vid = self.resolve(key).await?;

        if property.eq_ignore_ascii_case("vmx") {
            self.require_off(&vid).await?;
            let doc = VmxDocument::parse(value, self.shell.remote_os().clone());
            self.write_vmx(&vid, &doc).await?;
            return Ok(format!("vmx: {} lines", doc.lines().len()));
        }

        let (vmx_key, vmx_value) = match vm_field(property) {
            Some(field) => {
                let vmx_key = writable_key(field).ok_or_else(|| {
                    VmwsError::invalid_input(format!("property {} is read-only", field))
                })?;
                let converted = field_value(field, value)?;
                self.require_off(&vid).await?;
                (vmx_key.to_string(), converted)
            }
            None => (property.to_string(), value.to_string()),
        };
        self.vmcli().set_param(&vid, &vmx_key, &vmx_value).await?;
        Ok(format!("{} = {}", vmx_key, vmx_value))
    }
}
