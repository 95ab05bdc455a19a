//! Binding of command-line feature flags to [`CreateOptions`] and
//! [`IsoOptions`], with conflict checks.

use crate::error::{VmwsError, VmwsResult};
use crate::types::{CreateOptions, IsoOptions, UsbDevice, UsbOptions};
use serde::{Deserialize, Serialize};

/// Raw flag values as the operator typed them. `None` / `false` means the
/// flag was not given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateFlags {
    pub name: Option<String>,
    pub guest_os: Option<String>,
    pub cpu: Option<u32>,
    pub memory: Option<String>,
    pub disk: Option<String>,
    pub disk_single_file: Option<bool>,
    pub disk_preallocated: Option<bool>,
    pub floppy_disable: bool,
    pub boot_efi: bool,
    pub boot_bios: bool,

    pub iso_attach: Option<String>,
    pub iso_detach: bool,
    pub iso_disable: bool,
    pub iso_connect: bool,
    pub iso_ca: Option<String>,
    pub iso_cert: Option<String>,
    pub iso_key: Option<String>,

    pub eth_enable: bool,
    pub eth_disable: bool,
    pub mac: Option<String>,

    pub serial_pipe: Option<String>,
    pub serial_client: bool,
    pub serial_v2v: bool,
    pub serial_disable: bool,

    pub vnc_enable: bool,
    pub vnc_disable: bool,
    pub vnc_port: Option<u16>,

    pub clipboard_enable: bool,
    pub clipboard_disable: bool,

    pub share: Option<String>,
    pub share_guest: Option<String>,
    pub share_disable: bool,

    pub time_sync_enable: bool,
    pub time_sync_disable: bool,
    pub time_zone: Option<String>,

    pub usb_allow_hid: bool,
    pub usb_allow_ccid: bool,
    /// `label=vvvv:pppp`
    pub usb_devices: Vec<String>,

    pub wait: bool,
}

fn conflict(a: &str, b: &str) -> VmwsError {
    VmwsError::invalid_input(format!("--{} conflicts with --{}", a, b))
}

fn exclusive(pairs: &[(&str, bool)]) -> VmwsResult<()> {
    let set: Vec<&str> = pairs.iter().filter(|(_, on)| *on).map(|(n, _)| *n).collect();
    if set.len() > 1 {
        return Err(conflict(set[0], set[1]));
    }
    Ok(())
}

impl CreateOptions {
    /// Turn operator flags into gated option structs.
    pub fn from_flags(f: &CreateFlags) -> VmwsResult<(CreateOptions, IsoOptions)> {
        exclusive(&[("eth-enable", f.eth_enable), ("eth-disable", f.eth_disable)])?;
        exclusive(&[("mac", f.mac.is_some()), ("eth-disable", f.eth_disable)])?;
        exclusive(&[
            ("iso-attach", f.iso_attach.is_some()),
            ("iso-detach", f.iso_detach),
            ("iso-disable", f.iso_disable),
            ("iso-connect", f.iso_connect),
        ])?;
        exclusive(&[("vnc-enable", f.vnc_enable), ("vnc-disable", f.vnc_disable)])?;
        exclusive(&[("boot-efi", f.boot_efi), ("boot-bios", f.boot_bios)])?;
        exclusive(&[
            ("serial-pipe", f.serial_pipe.is_some()),
            ("serial-disable", f.serial_disable),
        ])?;
        exclusive(&[
            ("clipboard-enable", f.clipboard_enable),
            ("clipboard-disable", f.clipboard_disable),
        ])?;
        exclusive(&[("share", f.share.is_some()), ("share-disable", f.share_disable)])?;
        exclusive(&[
            ("time-sync-enable", f.time_sync_enable),
            ("time-sync-disable", f.time_sync_disable),
        ])?;

        let mut o = CreateOptions::default();

        if let Some(ref name) = f.name {
            o.modify_name = true;
            o.name = name.clone();
        }
        if let Some(ref os) = f.guest_os {
            o.modify_guest_os = true;
            o.guest_os = os.clone();
        }
        if let Some(cpu) = f.cpu {
            if cpu == 0 {
                return Err(VmwsError::invalid_input("CPU count must be at least 1"));
            }
            o.modify_cpu = true;
            o.cpu_count = cpu;
        }
        if let Some(ref mem) = f.memory {
            o.modify_memory = true;
            o.memory_size = mem.clone();
        }
        if let Some(ref disk) = f.disk {
            o.modify_disk = true;
            o.disk_size = disk.clone();
        }
        o.disk_single_file = f.disk_single_file.unwrap_or(false);
        o.disk_preallocated = f.disk_preallocated.unwrap_or(false);
        if f.floppy_disable {
            o.modify_floppy = true;
            o.floppy_enabled = false;
        }
        if f.boot_efi || f.boot_bios {
            o.modify_efi = true;
            o.efi_boot = f.boot_efi;
        }

        if f.eth_disable {
            o.modify_nic = true;
            o.mac_address = String::new();
        } else if let Some(ref mac) = f.mac {
            o.modify_nic = true;
            o.mac_address = mac.to_lowercase();
        } else if f.eth_enable {
            o.modify_nic = true;
            o.mac_address = "auto".to_string();
        }

        if f.serial_disable {
            o.modify_tty = true;
        } else if let Some(ref pipe) = f.serial_pipe {
            o.modify_tty = true;
            o.serial_pipe = pipe.clone();
            o.serial_client = f.serial_client;
            o.serial_v2v = f.serial_v2v;
        }

        if f.vnc_enable || f.vnc_disable || f.vnc_port.is_some() {
            o.modify_vnc = true;
            o.vnc_enabled = !f.vnc_disable;
            o.vnc_port = f.vnc_port.unwrap_or(5900);
        }

        if f.clipboard_enable || f.clipboard_disable {
            o.modify_clipboard = true;
            o.clipboard_enabled = f.clipboard_enable;
        }

        if f.share_disable {
            o.modify_share = true;
        } else if let Some(ref host) = f.share {
            o.modify_share = true;
            o.share_enabled = true;
            o.share_host = host.clone();
            o.share_guest = f.share_guest.clone().unwrap_or_default();
        }

        if f.time_sync_enable || f.time_sync_disable {
            o.modify_time_sync = true;
            o.time_sync = f.time_sync_enable;
        }
        if let Some(ref tz) = f.time_zone {
            o.modify_time_zone = true;
            o.time_zone = tz.clone();
        }

        if f.usb_allow_hid || f.usb_allow_ccid || !f.usb_devices.is_empty() {
            o.modify_usb = true;
            o.usb = UsbOptions {
                allow_hid: f.usb_allow_hid,
                allow_ccid: f.usb_allow_ccid,
                devices: f
                    .usb_devices
                    .iter()
                    .map(|d| parse_usb_device(d))
                    .collect::<VmwsResult<Vec<_>>>()?,
            };
        }

        o.wait = f.wait;

        let mut iso = IsoOptions {
            iso_ca: f.iso_ca.clone().unwrap_or_default(),
            iso_client_cert: f.iso_cert.clone().unwrap_or_default(),
            iso_client_key: f.iso_key.clone().unwrap_or_default(),
            ..Default::default()
        };
        if let Some(ref file) = f.iso_attach {
            iso.modify_iso = true;
            iso.iso_present = true;
            iso.iso_file = file.clone();
            iso.iso_boot_connected = true;
        } else if f.iso_detach {
            iso.modify_iso = true;
            iso.modify_boot_connected = true;
            iso.iso_boot_connected = false;
        } else if f.iso_connect {
            iso.modify_iso = true;
            iso.modify_boot_connected = true;
            iso.iso_boot_connected = true;
        } else if f.iso_disable {
            iso.modify_iso = true;
            iso.iso_present = false;
        }

        Ok((o, iso))
    }
}

/// Parse `label=vvvv:pppp`, or a bare `vvvv:pppp` labelled by its position.
fn parse_usb_device(s: &str) -> VmwsResult<UsbDevice> {
    let (label, id) = match s.split_once('=') {
        Some((l, i)) => (l.trim().to_string(), i.trim().to_string()),
        None => (format!("device{}", s.replace(':', "")), s.trim().to_string()),
    };
    if label.is_empty() {
        return Err(VmwsError::invalid_input(format!("USB device '{}' has an empty label", s)));
    }
    Ok(UsbDevice { label, id })
}
