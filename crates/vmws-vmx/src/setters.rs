//! Feature-group setters. Each validates its input first, leaves the
//! document untouched on error, and returns a one-line description of what
//! changed.

use crate::boolean::{parse_vmx_bool, vmx_bool};
use crate::document::VmxDocument;
use lazy_static::lazy_static;
use regex::Regex;
use vmws_core::size::{parse_size, to_megabytes};
use vmws_core::{path, IsoOptions, UsbOptions, VmwsError, VmwsResult};

lazy_static! {
    static ref MAC: Regex =
        Regex::new(r"^([0-9a-f]{2}:){5}[0-9a-f]{2}$").expect("mac pattern");
    static ref USB_ID: Regex =
        Regex::new(r"^([0-9a-fA-F]{4}):([0-9a-fA-F]{4})$").expect("usb id pattern");
    static ref USB_LABEL: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").expect("usb label pattern");
}

const VNC_DEFAULT_PORT: u16 = 5900;

const CLIPBOARD_KEYS: [&str; 3] = [
    "isolation.tools.copy.disable",
    "isolation.tools.paste.disable",
    "isolation.tools.dnd.disable",
];

const TIME_SYNC_KEYS: [&str; 5] = [
    "time.synchronize.continue",
    "time.synchronize.restore",
    "time.synchronize.resume.disk",
    "time.synchronize.shrink",
    "time.synchronize.tools.startup",
];

impl VmxDocument {
    pub fn set_name(&mut self, name: &str) -> VmwsResult<String> {
        if name.trim().is_empty() {
            return Err(VmwsError::invalid_input("display name must not be empty"));
        }
        self.set("displayName", name);
        Ok(format!("name: {}", name))
    }

    pub fn set_guest_os(&mut self, guest_os: &str) -> VmwsResult<String> {
        if guest_os.trim().is_empty() {
            return Err(VmwsError::invalid_input("guest OS must not be empty"));
        }
        self.set("guestOS", guest_os);
        Ok(format!("guest OS: {}", guest_os))
    }

    pub fn set_cpu(&mut self, count: u32) -> VmwsResult<String> {
        if count == 0 {
            return Err(VmwsError::invalid_input("CPU count must be at least 1"));
        }
        self.set("numvcpus", &count.to_string());
        Ok(format!("cpu: {}", count))
    }

    /// `size` is a size string such as `2G` or `4096M`.
    pub fn set_memory(&mut self, size: &str) -> VmwsResult<String> {
        let mb = to_megabytes(parse_size(size)?);
        if mb == 0 {
            return Err(VmwsError::invalid_input(format!("memory size '{}' is below 1MB", size)));
        }
        self.remove_key("memsize");
        self.remove_key("memory.maxsize");
        self.append("memsize", &mb.to_string());
        Ok(format!("memory: {}MB", mb))
    }

    /// Attach `disk_file` as the NVMe boot disk; empty only removes it.
    pub fn set_disk(&mut self, disk_file: &str) -> VmwsResult<String> {
        self.remove_prefix("nvme0");
        if disk_file.is_empty() {
            return Ok("disk: removed".to_string());
        }
        self.append("nvme0.present", "TRUE");
        self.append("nvme0:0.fileName", disk_file);
        self.append("nvme0:0.present", "TRUE");
        Ok(format!("disk: {}", disk_file))
    }

    /// Only disabling is supported.
    pub fn set_floppy(&mut self, enabled: bool) -> VmwsResult<String> {
        if enabled {
            return Err(VmwsError::invalid_input("enabling the floppy drive is not supported"));
        }
        self.remove_prefix("floppy0");
        self.append("floppy0.present", "FALSE");
        Ok("floppy: disabled".to_string())
    }

    pub fn set_efi(&mut self, efi: bool) -> VmwsResult<String> {
        self.remove_key("firmware");
        if efi {
            self.append("firmware", "efi");
            Ok("firmware: efi".to_string())
        } else {
            Ok("firmware: bios".to_string())
        }
    }

    /// `opts.iso_file` must already be a host path (canonical or native).
    pub fn set_iso(&mut self, opts: &IsoOptions) -> VmwsResult<String> {
        if opts.modify_boot_connected && opts.iso_file.is_empty() {
            let present = self.get("ide1:0.present").unwrap_or_else(|| "TRUE".to_string());
            let device_type = self
                .get("ide1:0.deviceType")
                .unwrap_or_else(|| "cdrom-image".to_string());
            let file = self.get("ide1:0.fileName");
            self.remove_prefix("ide1:0.");
            self.append("ide1:0.present", &present);
            self.append("ide1:0.deviceType", &device_type);
            if let Some(ref f) = file {
                self.append("ide1:0.fileName", f);
            }
            self.append("ide1:0.startConnected", vmx_bool(opts.iso_boot_connected));
            return Ok(format!(
                "iso: boot connected {}",
                vmx_bool(opts.iso_boot_connected)
            ));
        }

        if !opts.iso_present {
            self.remove_prefix("ide1:0.");
            self.append("ide1:0.present", "FALSE");
            return Ok("iso: disabled".to_string());
        }

        if opts.iso_file.is_empty() {
            return Err(VmwsError::invalid_input("an ISO file is required to attach media"));
        }
        let host_file = path::format_for(self.os(), &opts.iso_file)?;
        self.remove_prefix("ide1:0.");
        self.append("ide1:0.present", "TRUE");
        self.append("ide1:0.deviceType", "cdrom-image");
        self.append("ide1:0.fileName", &host_file);
        self.append("ide1:0.startConnected", vmx_bool(opts.iso_boot_connected));
        Ok(format!(
            "iso: {} (boot connected {})",
            host_file,
            vmx_bool(opts.iso_boot_connected)
        ))
    }

    /// `""` disables, `"auto"` generates, otherwise a static MAC.
    pub fn set_ethernet(&mut self, mac: &str) -> VmwsResult<String> {
        let mac = mac.trim().to_lowercase();
        if !(mac.is_empty() || mac == "auto" || MAC.is_match(&mac)) {
            return Err(VmwsError::invalid_input(format!("invalid MAC address '{}'", mac)));
        }
        self.remove_prefix("ethernet0.");
        if mac.is_empty() {
            self.append("ethernet0.present", "FALSE");
            return Ok("nic: disabled".to_string());
        }
        self.append("ethernet0.present", "TRUE");
        self.append("ethernet0.virtualDev", "e1000");
        if mac == "auto" {
            self.append("ethernet0.addressType", "generated");
            Ok("nic: generated MAC".to_string())
        } else {
            self.append("ethernet0.address", &mac);
            self.append("ethernet0.addressType", "static");
            Ok(format!("nic: {}", mac))
        }
    }

    /// Named-pipe serial port. `is_v2v` connects two guests rather than a
    /// guest and an application.
    pub fn set_serial(&mut self, pipe: &str, is_client: bool, is_v2v: bool) -> VmwsResult<String> {
        self.remove_prefix("serial0.");
        if pipe.is_empty() {
            self.append("serial0.present", "FALSE");
            return Ok("serial: disabled".to_string());
        }
        let host_pipe = if self.os().is_windows() && !pipe.starts_with("\\\\") {
            format!("\\\\.\\pipe\\{}", pipe)
        } else {
            pipe.to_string()
        };
        self.append("serial0.present", "TRUE");
        self.append("serial0.fileType", "pipe");
        self.append("serial0.fileName", &host_pipe);
        self.append("serial0.tryNoRxLoss", vmx_bool(!is_v2v));
        if is_client {
            self.append("serial0.pipe.endPoint", "client");
        }
        Ok(format!(
            "serial: {} ({})",
            host_pipe,
            if is_client { "client" } else { "server" }
        ))
    }

    pub fn set_vnc(&mut self, enabled: bool, port: u16) -> VmwsResult<String> {
        self.remove_prefix("RemoteDisplay.vnc.");
        self.append("RemoteDisplay.vnc.enabled", vmx_bool(enabled));
        if !enabled {
            return Ok("vnc: disabled".to_string());
        }
        if port != 0 && port != VNC_DEFAULT_PORT {
            self.append("RemoteDisplay.vnc.port", &port.to_string());
            return Ok(format!("vnc: enabled on port {}", port));
        }
        Ok(format!("vnc: enabled on port {}", VNC_DEFAULT_PORT))
    }

    pub fn set_clipboard(&mut self, enabled: bool) -> VmwsResult<String> {
        for key in CLIPBOARD_KEYS {
            self.remove_key(key);
        }
        for key in CLIPBOARD_KEYS {
            self.append(key, vmx_bool(!enabled));
        }
        Ok(format!("clipboard: {}", if enabled { "enabled" } else { "disabled" }))
    }

    /// One shared folder. The guest name defaults to the host directory's
    /// basename.
    pub fn set_file_share(&mut self, enabled: bool, host: &str, guest: &str) -> VmwsResult<String> {
        if enabled && host.trim().is_empty() {
            return Err(VmwsError::invalid_input("a host path is required to share a folder"));
        }
        let host_path = if enabled {
            path::format_for(self.os(), host)?
        } else {
            String::new()
        };
        self.remove_prefix("sharedFolder");
        self.remove_prefix("isolation.tools.hgfs.");
        if !enabled {
            return Ok("share: disabled".to_string());
        }
        let guest_name = if guest.is_empty() {
            path::basename(host)
        } else {
            guest.to_string()
        };
        self.append("isolation.tools.hgfs.disable", "FALSE");
        self.append("sharedFolder0.present", "TRUE");
        self.append("sharedFolder0.enabled", "TRUE");
        self.append("sharedFolder0.readAccess", "TRUE");
        self.append("sharedFolder0.writeAccess", "TRUE");
        self.append("sharedFolder0.hostPath", &host_path);
        self.append("sharedFolder0.guestName", &guest_name);
        self.append("sharedFolder0.expiration", "never");
        self.append("sharedFolder.maxNum", "1");
        Ok(format!("share: {} as {}", host_path, guest_name))
    }

    pub fn set_time_sync(&mut self, enabled: bool) -> VmwsResult<String> {
        self.remove_prefix("tools.syncTime");
        self.remove_prefix("time.synchronize.");
        if !enabled {
            return Ok("time sync: disabled".to_string());
        }
        self.append("tools.syncTime", "TRUE");
        for key in TIME_SYNC_KEYS {
            self.append(key, "TRUE");
        }
        Ok("time sync: enabled".to_string())
    }

    pub fn set_guest_timezone(&mut self, zone: &str) -> VmwsResult<String> {
        self.remove_key("guestTimeZone");
        if zone.is_empty() {
            return Ok("timezone: removed".to_string());
        }
        self.append("guestTimeZone", zone);
        Ok(format!("timezone: {}", zone))
    }

    pub fn set_usb(&mut self, opts: &UsbOptions) -> VmwsResult<String> {
        let mut devices = Vec::with_capacity(opts.devices.len());
        for d in &opts.devices {
            if !USB_LABEL.is_match(&d.label) {
                return Err(VmwsError::invalid_input(format!("invalid USB device label '{}'", d.label)));
            }
            let caps = USB_ID
                .captures(d.id.trim())
                .ok_or_else(|| VmwsError::invalid_input(format!("invalid USB id '{}', expected vvvv:pppp", d.id)))?;
            devices.push((d.label.as_str(), caps[1].to_lowercase(), caps[2].to_lowercase()));
        }

        self.remove_prefix("usb.generic.");
        self.remove_prefix("usb.quirks.");
        self.remove_prefix("usb.autoConnect.");
        if opts.allow_hid {
            self.append("usb.generic.allowHID", "TRUE");
        }
        if opts.allow_ccid {
            self.append("usb.generic.allowCCID", "TRUE");
        }
        for (label, vid, pid) in &devices {
            self.append(&format!("usb.quirks.{}", label), &format!("0x{}:0x{} allow", vid, pid));
            self.append(
                &format!("usb.autoConnect.{}", label),
                &format!("vid:0x{} pid:0x{}", vid, pid),
            );
        }
        Ok(format!(
            "usb: hid={} ccid={} devices={}",
            vmx_bool(opts.allow_hid),
            vmx_bool(opts.allow_ccid),
            devices.len()
        ))
    }

    /// Current ISO settings as recorded in the document.
    pub fn iso_options(&self) -> IsoOptions {
        IsoOptions {
            iso_present: self.get("ide1:0.present").map(|v| parse_vmx_bool(&v)).unwrap_or(false),
            iso_file: self.get("ide1:0.fileName").unwrap_or_default(),
            iso_boot_connected: self
                .get("ide1:0.startConnected")
                .map(|v| parse_vmx_bool(&v))
                .unwrap_or(false),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmws_core::{HostOs, UsbDevice};

    fn lines(doc: &VmxDocument) -> Vec<&str> {
        doc.lines().iter().map(String::as_str).collect()
    }

    #[test]
    fn disk_on_empty_document() {
        let mut doc = VmxDocument::new(HostOs::Linux);
        doc.set_disk("vm.vmdk").unwrap();
        assert_eq!(
            lines(&doc),
            vec![
                "nvme0.present = \"TRUE\"",
                "nvme0:0.fileName = \"vm.vmdk\"",
                "nvme0:0.present = \"TRUE\"",
            ]
        );
    }

    #[test]
    fn ethernet_static_then_auto() {
        let mut doc = VmxDocument::new(HostOs::Linux);
        doc.set_ethernet("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(
            lines(&doc),
            vec![
                "ethernet0.present = \"TRUE\"",
                "ethernet0.virtualDev = \"e1000\"",
                "ethernet0.address = \"aa:bb:cc:dd:ee:ff\"",
                "ethernet0.addressType = \"static\"",
            ]
        );
        doc.set_ethernet("auto").unwrap();
        assert_eq!(doc.lines().last().unwrap(), "ethernet0.addressType = \"generated\"");
        assert!(doc.get("ethernet0.address").is_none());
    }

    #[test]
    fn bad_input_leaves_document_unchanged() {
        let mut doc = VmxDocument::parse("ethernet0.present = \"TRUE\"\n", HostOs::Linux);
        let before = doc.clone();
        assert!(doc.set_ethernet("aa:bb:cc").is_err());
        assert!(doc
            .set_usb(&UsbOptions {
                devices: vec![UsbDevice { label: "key".into(), id: "10500407".into() }],
                ..Default::default()
            })
            .is_err());
        assert!(doc.set_file_share(true, "", "").is_err());
        assert!(doc.set_floppy(true).is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn memory_replaces_maxsize() {
        let mut doc = VmxDocument::parse("memory.maxsize = \"8192\"\nmemsize = \"1024\"\n", HostOs::Linux);
        assert_eq!(doc.set_memory("2G").unwrap(), "memory: 2048MB");
        assert_eq!(lines(&doc), vec!["memsize = \"2048\""]);
    }

    #[test]
    fn iso_attach_and_disable() {
        let mut doc = VmxDocument::new(HostOs::Windows);
        let opts = IsoOptions {
            modify_iso: true,
            iso_present: true,
            iso_file: "/C/iso/debian.iso".into(),
            iso_boot_connected: true,
            ..Default::default()
        };
        doc.set_iso(&opts).unwrap();
        assert_eq!(
            lines(&doc),
            vec![
                "ide1:0.present = \"TRUE\"",
                "ide1:0.deviceType = \"cdrom-image\"",
                "ide1:0.fileName = \"C:\\iso\\debian.iso\"",
                "ide1:0.startConnected = \"TRUE\"",
            ]
        );
        doc.set_iso(&IsoOptions { modify_iso: true, ..Default::default() }).unwrap();
        assert_eq!(lines(&doc), vec!["ide1:0.present = \"FALSE\""]);
    }

    #[test]
    fn iso_boot_connected_alone_preserves_file() {
        let mut doc = VmxDocument::parse(
            "ide1:0.present = \"TRUE\"\nide1:0.fileName = \"/iso/a.iso\"\nide1:0.startConnected = \"TRUE\"\n",
            HostOs::Linux,
        );
        doc.set_iso(&IsoOptions {
            modify_iso: true,
            modify_boot_connected: true,
            iso_boot_connected: false,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(doc.get("ide1:0.fileName").as_deref(), Some("/iso/a.iso"));
        assert_eq!(doc.get("ide1:0.present").as_deref(), Some("TRUE"));
        assert_eq!(doc.get("ide1:0.startConnected").as_deref(), Some("FALSE"));
        let iso = doc.iso_options();
        assert!(iso.iso_present && !iso.iso_boot_connected);
    }

    #[test]
    fn serial_pipe_on_windows() {
        let mut doc = VmxDocument::new(HostOs::Windows);
        doc.set_serial("com1", true, false).unwrap();
        assert_eq!(
            lines(&doc),
            vec![
                "serial0.present = \"TRUE\"",
                "serial0.fileType = \"pipe\"",
                "serial0.fileName = \"\\\\.\\pipe\\com1\"",
                "serial0.tryNoRxLoss = \"TRUE\"",
                "serial0.pipe.endPoint = \"client\"",
            ]
        );
        doc.set_serial("", false, false).unwrap();
        assert_eq!(lines(&doc), vec!["serial0.present = \"FALSE\""]);
    }

    #[test]
    fn vnc_port_only_when_not_default() {
        let mut doc = VmxDocument::new(HostOs::Linux);
        doc.set_vnc(true, 5900).unwrap();
        assert_eq!(lines(&doc), vec!["RemoteDisplay.vnc.enabled = \"TRUE\""]);
        doc.set_vnc(true, 5901).unwrap();
        assert_eq!(
            lines(&doc),
            vec!["RemoteDisplay.vnc.enabled = \"TRUE\"", "RemoteDisplay.vnc.port = \"5901\""]
        );
        doc.set_vnc(false, 5901).unwrap();
        assert_eq!(lines(&doc), vec!["RemoteDisplay.vnc.enabled = \"FALSE\""]);
    }

    #[test]
    fn clipboard_inverts() {
        let mut doc = VmxDocument::new(HostOs::Linux);
        doc.set_clipboard(true).unwrap();
        assert_eq!(doc.get("isolation.tools.paste.disable").as_deref(), Some("FALSE"));
        doc.set_clipboard(false).unwrap();
        assert_eq!(doc.lines().len(), 3);
        assert_eq!(doc.get("isolation.tools.dnd.disable").as_deref(), Some("TRUE"));
    }

    #[test]
    fn file_share_lines() {
        let mut doc = VmxDocument::new(HostOs::Linux);
        doc.set_file_share(true, "/srv/share/data", "").unwrap();
        assert_eq!(doc.lines().len(), 9);
        assert_eq!(doc.get("sharedFolder0.guestName").as_deref(), Some("data"));
        assert_eq!(doc.get("sharedFolder0.expiration").as_deref(), Some("never"));
        doc.set_file_share(false, "", "").unwrap();
        assert!(doc.lines().is_empty());
    }

    #[test]
    fn time_sync_on_and_off() {
        let mut doc = VmxDocument::new(HostOs::Linux);
        doc.set_time_sync(true).unwrap();
        assert_eq!(doc.lines().len(), 6);
        doc.set_time_sync(false).unwrap();
        assert!(doc.lines().is_empty());
    }

    #[test]
    fn usb_devices() {
        let mut doc = VmxDocument::new(HostOs::Linux);
        doc.set_usb(&UsbOptions {
            allow_hid: true,
            allow_ccid: false,
            devices: vec![UsbDevice { label: "yubikey".into(), id: "1050:0407".into() }],
        })
        .unwrap();
        assert_eq!(
            lines(&doc),
            vec![
                "usb.generic.allowHID = \"TRUE\"",
                "usb.quirks.yubikey = \"0x1050:0x0407 allow\"",
                "usb.autoConnect.yubikey = \"vid:0x1050 pid:0x0407\"",
            ]
        );
    }

    #[test]
    fn every_setter_is_idempotent() {
        let iso = IsoOptions {
            modify_iso: true,
            iso_present: true,
            iso_file: "/iso/a.iso".into(),
            ..Default::default()
        };
        let usb = UsbOptions {
            allow_ccid: true,
            devices: vec![UsbDevice { label: "k".into(), id: "1050:0407".into() }],
            ..Default::default()
        };
        let setters: Vec<Box<dyn Fn(&mut VmxDocument)>> = vec![
            Box::new(|d: &mut VmxDocument| { d.set_name("web").unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_guest_os("debian12-64").unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_cpu(2).unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_memory("1G").unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_disk("web.vmdk").unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_floppy(false).unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_efi(true).unwrap(); }),
            Box::new(move |d: &mut VmxDocument| { d.set_iso(&iso).unwrap(); }),
            Box::new(move |d: &mut VmxDocument| { d.set_usb(&usb).unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_ethernet("auto").unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_serial("p", false, true).unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_vnc(true, 5999).unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_clipboard(true).unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_file_share(true, "/srv/x", "y").unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_time_sync(true).unwrap(); }),
            Box::new(|d: &mut VmxDocument| { d.set_guest_timezone("Europe/Paris").unwrap(); }),
        ];
        for set in &setters {
            let mut doc = VmxDocument::parse(
                ".encoding = \"UTF-8\"\ncustom.key = \"kept\"\n",
                HostOs::Linux,
            );
            set(&mut doc);
            let once = doc.clone();
            set(&mut doc);
            assert_eq!(doc, once);
            assert_eq!(doc.lines()[0], ".encoding = \"UTF-8\"");
            assert_eq!(doc.lines()[1], "custom.key = \"kept\"");
        }
    }
}
