//! New-instance template and gated application of option groups.

use crate::document::VmxDocument;
use log::debug;
use vmws_core::{CreateOptions, HostOs, IsoOptions, VmwsResult};

const TEMPLATE: &[(&str, &str)] = &[
    (".encoding", "UTF-8"),
    ("config.version", "8"),
    ("virtualHW.version", "21"),
    ("pciBridge0.present", "TRUE"),
    ("pciBridge4.present", "TRUE"),
    ("pciBridge4.virtualDev", "pcieRootPort"),
    ("pciBridge4.functions", "8"),
    ("pciBridge5.present", "TRUE"),
    ("pciBridge5.virtualDev", "pcieRootPort"),
    ("pciBridge5.functions", "8"),
    ("pciBridge6.present", "TRUE"),
    ("pciBridge6.virtualDev", "pcieRootPort"),
    ("pciBridge6.functions", "8"),
    ("pciBridge7.present", "TRUE"),
    ("pciBridge7.virtualDev", "pcieRootPort"),
    ("pciBridge7.functions", "8"),
    ("vmci0.present", "TRUE"),
    ("hpet0.present", "TRUE"),
    ("usb.present", "TRUE"),
    ("ehci.present", "TRUE"),
    ("usb_xhci.present", "TRUE"),
    ("tools.upgrade.policy", "useGlobal"),
    ("guestOS", "other-64"),
    ("numvcpus", "1"),
    ("memsize", "1024"),
];

impl VmxDocument {
    /// Skeleton document for a new instance.
    pub fn template(os: HostOs) -> Self {
        let mut doc = VmxDocument::new(os);
        for (k, v) in TEMPLATE {
            doc.append(k, v);
        }
        doc
    }

    /// Apply every gated group in a fixed order and return the action
    /// strings. On error the document is left as it was.
    pub fn configure(&mut self, o: &CreateOptions, iso: &IsoOptions) -> VmwsResult<Vec<String>> {
        let mut doc = self.clone();
        let mut actions = Vec::new();

        if o.modify_name {
            actions.push(doc.set_name(&o.name)?);
        }
        if o.modify_guest_os {
            actions.push(doc.set_guest_os(&o.guest_os)?);
        }
        if o.modify_cpu {
            actions.push(doc.set_cpu(o.cpu_count)?);
        }
        if o.modify_memory {
            actions.push(doc.set_memory(&o.memory_size)?);
        }
        if o.modify_disk {
            actions.push(doc.set_disk(&o.disk_file)?);
        }
        if o.modify_floppy {
            actions.push(doc.set_floppy(o.floppy_enabled)?);
        }
        if o.modify_efi {
            actions.push(doc.set_efi(o.efi_boot)?);
        }
        if iso.modify_iso {
            actions.push(doc.set_iso(iso)?);
        }
        if o.modify_usb {
            actions.push(doc.set_usb(&o.usb)?);
        }
        if o.modify_nic {
            actions.push(doc.set_ethernet(&o.mac_address)?);
        }
        if o.modify_tty {
            actions.push(doc.set_serial(&o.serial_pipe, o.serial_client, o.serial_v2v)?);
        }
        if o.modify_vnc {
            actions.push(doc.set_vnc(o.vnc_enabled, o.vnc_port)?);
        }
        if o.modify_clipboard {
            actions.push(doc.set_clipboard(o.clipboard_enabled)?);
        }
        if o.modify_share {
            actions.push(doc.set_file_share(o.share_enabled, &o.share_host, &o.share_guest)?);
        }
        if o.modify_time_sync {
            actions.push(doc.set_time_sync(o.time_sync)?);
        }
        if o.modify_time_zone {
            actions.push(doc.set_guest_timezone(&o.time_zone)?);
        }

        for a in &actions {
            debug!("vmx {}", a);
        }
        *self = doc;
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_has_platform_devices() {
        let doc = VmxDocument::template(HostOs::Linux);
        assert_eq!(doc.get("vmci0.present").as_deref(), Some("TRUE"));
        assert_eq!(doc.get("memsize").as_deref(), Some("1024"));
        assert_eq!(doc.lines()[0], ".encoding = \"UTF-8\"");
    }

    #[test]
    fn configure_applies_groups_in_order() {
        let mut doc = VmxDocument::template(HostOs::Linux);
        let o = CreateOptions {
            modify_name: true,
            name: "tvm".into(),
            modify_guest_os: true,
            guest_os: "debian12-64".into(),
            modify_cpu: true,
            cpu_count: 2,
            modify_memory: true,
            memory_size: "2G".into(),
            modify_disk: true,
            disk_file: "tvm.vmdk".into(),
            modify_efi: true,
            efi_boot: true,
            ..Default::default()
        };
        let actions = doc.configure(&o, &IsoOptions::default()).unwrap();
        assert_eq!(
            actions,
            vec![
                "name: tvm",
                "guest OS: debian12-64",
                "cpu: 2",
                "memory: 2048MB",
                "disk: tvm.vmdk",
                "firmware: efi",
            ]
        );
        assert_eq!(doc.display_name().as_deref(), Some("tvm"));
        assert_eq!(doc.get("numvcpus").as_deref(), Some("2"));
        assert_eq!(doc.get("firmware").as_deref(), Some("efi"));
        assert_eq!(doc.get("nvme0:0.fileName").as_deref(), Some("tvm.vmdk"));
    }

    #[test]
    fn configure_is_all_or_nothing() {
        let mut doc = VmxDocument::template(HostOs::Linux);
        let before = doc.clone();
        let o = CreateOptions {
            modify_cpu: true,
            cpu_count: 4,
            modify_nic: true,
            mac_address: "not-a-mac".into(),
            ..Default::default()
        };
        assert!(doc.configure(&o, &IsoOptions::default()).is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn ungated_groups_are_ignored() {
        let mut doc = VmxDocument::template(HostOs::Linux);
        let before = doc.clone();
        let o = CreateOptions {
            cpu_count: 8,
            mac_address: "aa:bb:cc:dd:ee:ff".into(),
            ..Default::default()
        };
        assert!(doc.configure(&o, &IsoOptions::default()).unwrap().is_empty());
        assert_eq!(doc, before);
    }
}
