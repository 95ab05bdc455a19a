//! Shared types for VMware Workstation instance management.

use crate::error::{VmwsError, VmwsResult};
use crate::path;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Instance identity triple. `path` is canonical, `id` is base64 of `path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vid {
    pub id: String,
    pub path: String,
    pub name: String,
}

impl Vid {
    /// Build the identity of the `.vmx` file at `p` (any notation).
    pub fn from_path(p: &str) -> VmwsResult<Self> {
        let path = path::normalize(p)?;
        Ok(Self {
            id: encode_id(&path),
            name: path::to_name(&path),
            path,
        })
    }

    /// Canonical directory holding the instance.
    pub fn dir(&self) -> String {
        path::dirname(&self.path)
    }

    /// Canonical path of a file in the instance directory.
    pub fn file(&self, filename: &str) -> String {
        path::join(&[&self.dir(), filename])
    }
}

impl fmt::Display for Vid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Deterministic id of a canonical path.
pub fn encode_id(canonical_path: &str) -> String {
    STANDARD.encode(canonical_path.as_bytes())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Power State
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
    Paused,
    Suspended,
}

impl Default for PowerState {
    fn default() -> Self {
        Self::Off
    }
}

impl PowerState {
    /// Parse a state name or one of its aliases (`up`, `running`, `down`, ...).
    pub fn parse(s: &str) -> VmwsResult<Self> {
        match s.trim().to_lowercase().replace(['_', '-'], "").as_str() {
            "on" | "up" | "running" | "poweredon" | "start" | "started" => Ok(Self::On),
            "off" | "down" | "stopped" | "poweredoff" | "stop" | "halted" => Ok(Self::Off),
            "paused" | "pause" => Ok(Self::Paused),
            "suspended" | "suspend" => Ok(Self::Suspended),
            other => Err(VmwsError::invalid_input(format!(
                "unknown power state '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Paused => "paused",
            Self::Suspended => "suspended",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Instance Records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Full instance record. Field names serialize in PascalCase so property
/// lookups (`CpuCount`, `GuestOS`) match the serialized keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vm {
    pub id: String,
    pub path: String,
    pub name: String,
    pub cpu_count: u32,
    pub ram_size: String,
    pub disk_size: String,
    pub mac_address: String,
    pub ip_address: String,
    #[serde(rename = "GuestOS")]
    pub guest_os: String,
    pub guest_time_zone: String,
    pub iso_attached: bool,
    pub iso_attach_on_start: bool,
    pub iso_file: String,
    pub serial_attached: bool,
    pub serial_pipe: String,
    pub vnc_enabled: bool,
    pub vnc_port: u16,
    pub clipboard_enabled: bool,
    pub file_share_enabled: bool,
    pub running: bool,
    pub power_state: PowerState,
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<VmDisk>,
}

impl Vm {
    pub fn from_vid(vid: &Vid) -> Self {
        Self {
            id: vid.id.clone(),
            path: vid.path.clone(),
            name: vid.name.clone(),
            ..Default::default()
        }
    }

    pub fn vid(&self) -> Vid {
        Vid {
            id: self.id.clone(),
            path: self.path.clone(),
            name: self.name.clone(),
        }
    }
}

/// Terse status projection of [`Vm`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmState {
    pub name: String,
    pub path: String,
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mac: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip: String,
    pub power_state: PowerState,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub result: String,
}

impl VmState {
    pub fn of(vm: &Vm, result: impl Into<String>) -> Self {
        Self {
            name: vm.name.clone(),
            path: vm.path.clone(),
            id: vm.id.clone(),
            mac: vm.mac_address.clone(),
            ip: vm.ip_address.clone(),
            power_state: vm.power_state,
            result: result.into(),
        }
    }
}

/// One entry of a host directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmFile {
    pub name: String,
    pub length: u64,
}

/// A virtual disk attached to an instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmDisk {
    /// Controller slot, e.g. `nvme0:0`
    pub device: String,
    pub file: String,
    /// Declared capacity in bytes
    pub capacity: u64,
    pub size: String,
    #[serde(default)]
    pub descriptor: BTreeMap<String, String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Configuration Requests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A USB device passed through by vendor/product id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbDevice {
    pub label: String,
    /// `vvvv:pppp` in hex
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsbOptions {
    pub allow_hid: bool,
    pub allow_ccid: bool,
    pub devices: Vec<UsbDevice>,
}

/// Feature-group configuration request. Payload fields are honored only
/// when the group's `modify_*` gate is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptions {
    pub modify_name: bool,
    pub name: String,

    pub modify_guest_os: bool,
    pub guest_os: String,

    pub modify_cpu: bool,
    pub cpu_count: u32,

    pub modify_memory: bool,
    pub memory_size: String,

    pub modify_disk: bool,
    pub disk_size: String,
    /// Disk file written into the VMX; empty removes the disk lines.
    pub disk_file: String,
    pub disk_single_file: bool,
    pub disk_preallocated: bool,

    pub modify_floppy: bool,
    pub floppy_enabled: bool,

    pub modify_efi: bool,
    pub efi_boot: bool,

    pub modify_usb: bool,
    pub usb: UsbOptions,

    pub modify_nic: bool,
    /// `""` disables, `"auto"` generates, otherwise a static MAC.
    pub mac_address: String,

    pub modify_tty: bool,
    pub serial_pipe: String,
    pub serial_client: bool,
    pub serial_v2v: bool,

    pub modify_vnc: bool,
    pub vnc_enabled: bool,
    pub vnc_port: u16,

    pub modify_clipboard: bool,
    pub clipboard_enabled: bool,

    pub modify_share: bool,
    pub share_enabled: bool,
    pub share_host: String,
    pub share_guest: String,

    pub modify_time_sync: bool,
    pub time_sync: bool,

    pub modify_time_zone: bool,
    pub time_zone: String,

    /// Boot once after creation to let the hypervisor finalize the VMX.
    pub wait: bool,
}

impl CreateOptions {
    /// True when any VMX feature group is gated.
    pub fn any_modified(&self) -> bool {
        self.modify_name
            || self.modify_guest_os
            || self.modify_cpu
            || self.modify_memory
            || self.modify_disk
            || self.modify_floppy
            || self.modify_efi
            || self.modify_usb
            || self.modify_nic
            || self.modify_tty
            || self.modify_vnc
            || self.modify_clipboard
            || self.modify_share
            || self.modify_time_sync
            || self.modify_time_zone
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsoOptions {
    pub modify_iso: bool,
    pub iso_present: bool,
    /// Host path, name under the ISO root, or `http(s)://` URL
    pub iso_file: String,
    pub iso_ca: String,
    pub iso_client_cert: String,
    pub iso_client_key: String,
    pub iso_boot_connected: bool,
    pub modify_boot_connected: bool,
}

impl IsoOptions {
    pub fn is_url(&self) -> bool {
        self.iso_file.starts_with("http://") || self.iso_file.starts_with("https://")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    pub background: bool,
    pub fullscreen: bool,
    pub wait: bool,
    pub modify_stretch: bool,
    pub stretch_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOptions {
    pub power_off: bool,
    pub wait: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyOptions {
    /// Power off a running instance first. The power-off is always
    /// awaited before the directory is removed.
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowOptions {
    pub running_only: bool,
    pub detail: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesOptions {
    pub detail: bool,
    pub all: bool,
    pub iso: bool,
}
