use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use vmws_core::flags::CreateFlags;

#[derive(Parser, Debug)]
#[command(name = "vmws", version, about = "Control VMware Workstation instances on a local or remote host")]
pub struct Cli {
    /// Path to the config file (default: <config dir>/vmws/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Host override
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Log records as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print exact byte counts instead of human-readable sizes
    #[arg(long, global = true)]
    pub no_humanize: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new instance
    Create {
        name: String,

        #[command(flatten)]
        features: FeatureArgs,
    },

    /// Change the configuration of a stopped instance
    Modify {
        vid: String,

        /// Rename the instance (display name only)
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        features: FeatureArgs,
    },

    /// Delete an instance and its directory
    Destroy {
        vid: String,

        /// Power off a running instance first, waiting until it is off
        #[arg(short, long)]
        force: bool,
    },

    /// Edit the VMX file of a stopped instance with $EDITOR
    Edit { vid: String },

    /// Read a property (all fields when omitted)
    Get { vid: String, property: Option<String> },

    /// Set a property
    Set {
        vid: String,
        property: String,
        value: String,
    },

    /// List instance files, or the ISO store with `iso`
    #[command(visible_alias = "files")]
    List {
        target: Option<String>,

        /// Include file sizes and bare names
        #[arg(short = 'l', long)]
        detail: bool,

        /// Every file, not only .vmx
        #[arg(short, long)]
        all: bool,

        /// List the ISO store
        #[arg(short, long)]
        iso: bool,
    },

    /// Show instance records
    Show {
        vid: Option<String>,

        /// Only running instances
        #[arg(short, long)]
        running: bool,

        /// Include configuration, IP and disks
        #[arg(short = 'l', long)]
        detail: bool,
    },

    /// Power on an instance
    Start {
        vid: String,

        #[command(flatten)]
        start: StartArgs,

        #[command(flatten)]
        iso: IsoArgs,
    },

    /// Power off an instance
    Stop {
        vid: String,

        /// Hard power off instead of a guest shutdown
        #[arg(short = 'p', long)]
        power_off: bool,

        /// Wait until the instance is off
        #[arg(short, long)]
        wait: bool,
    },

    /// Stop then start an instance
    Restart {
        vid: String,

        #[command(flatten)]
        start: StartArgs,
    },

    /// Wait for a power state (on, off, paused, suspended, up, down)
    Wait { vid: String, state: String },

    /// Type a string into the instance console (C escapes allowed)
    Sendkeys { vid: String, keys: String },

    /// Copy a local file into the instance directory
    Upload {
        local: PathBuf,
        vid: String,
        dest: Option<String>,
    },

    /// Copy a file out of the instance directory
    Download {
        vid: String,
        file: String,
        local: Option<PathBuf>,
    },

    /// Run vmrun on the host
    Vmrun {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Launch the vmware GUI on the host
    Vmware {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Start without a console window
    #[arg(short, long)]
    pub background: bool,

    /// Open the console full screen
    #[arg(short = 'F', long, conflicts_with = "background")]
    pub fullscreen: bool,

    /// Wait until the instance is running
    #[arg(short, long)]
    pub wait: bool,

    /// Stretch the guest display to the window
    #[arg(long, conflicts_with = "no_stretch")]
    pub stretch: bool,

    #[arg(long)]
    pub no_stretch: bool,
}

#[derive(Args, Debug, Default)]
pub struct IsoArgs {
    /// Attach an ISO: a path, a name under the ISO store, or a URL to fetch
    #[arg(long, value_name = "ISO")]
    pub iso_attach: Option<String>,

    /// Keep the ISO but do not connect it at power-on
    #[arg(long)]
    pub iso_detach: bool,

    /// Connect the attached ISO at power-on
    #[arg(long)]
    pub iso_connect: bool,

    /// Remove the CD/DVD device
    #[arg(long)]
    pub iso_disable: bool,

    /// CA bundle for ISO downloads
    #[arg(long)]
    pub iso_ca: Option<String>,

    /// Client certificate for ISO downloads
    #[arg(long)]
    pub iso_cert: Option<String>,

    /// Client key for ISO downloads
    #[arg(long)]
    pub iso_key: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct FeatureArgs {
    /// Guest OS identifier, e.g. debian12-64
    #[arg(long)]
    pub guest_os: Option<String>,

    /// Virtual CPU count
    #[arg(long)]
    pub cpu: Option<u32>,

    /// Memory size, e.g. 4G
    #[arg(long)]
    pub memory: Option<String>,

    /// Boot disk size, e.g. 32G
    #[arg(long)]
    pub disk: Option<String>,

    /// Store the disk as a single file
    #[arg(long, conflicts_with = "disk_split")]
    pub disk_single_file: bool,

    /// Split the disk into 2GB extents
    #[arg(long)]
    pub disk_split: bool,

    /// Allocate the full disk up front
    #[arg(long, conflicts_with = "disk_growable")]
    pub disk_preallocated: bool,

    /// Grow the disk on demand
    #[arg(long)]
    pub disk_growable: bool,

    #[arg(long)]
    pub floppy_disable: bool,

    #[arg(long)]
    pub boot_efi: bool,

    #[arg(long)]
    pub boot_bios: bool,

    #[command(flatten)]
    pub iso: IsoArgs,

    #[arg(long)]
    pub eth_enable: bool,

    #[arg(long)]
    pub eth_disable: bool,

    /// Static MAC address, or `auto`
    #[arg(long)]
    pub mac: Option<String>,

    /// Attach serial0 to a named pipe
    #[arg(long, value_name = "PIPE")]
    pub serial_pipe: Option<String>,

    #[arg(long)]
    pub serial_client: bool,

    #[arg(long)]
    pub serial_v2v: bool,

    #[arg(long)]
    pub serial_disable: bool,

    #[arg(long)]
    pub vnc_enable: bool,

    #[arg(long)]
    pub vnc_disable: bool,

    #[arg(long)]
    pub vnc_port: Option<u16>,

    #[arg(long)]
    pub clipboard_enable: bool,

    #[arg(long)]
    pub clipboard_disable: bool,

    /// Share a host directory with the guest
    #[arg(long, value_name = "HOST_PATH")]
    pub share: Option<String>,

    /// Guest-side name of the shared folder
    #[arg(long)]
    pub share_guest: Option<String>,

    #[arg(long)]
    pub share_disable: bool,

    #[arg(long)]
    pub time_sync_enable: bool,

    #[arg(long)]
    pub time_sync_disable: bool,

    #[arg(long)]
    pub time_zone: Option<String>,

    #[arg(long)]
    pub usb_allow_hid: bool,

    #[arg(long)]
    pub usb_allow_ccid: bool,

    /// Pass a USB device through: `label=vvvv:pppp`
    #[arg(long = "usb-device", value_name = "DEVICE")]
    pub usb_devices: Vec<String>,

    /// Create: boot once to let the host finish setup
    #[arg(short, long)]
    pub wait: bool,
}

fn either(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl IsoArgs {
    pub fn apply(&self, f: &mut CreateFlags) {
        f.iso_attach = self.iso_attach.clone();
        f.iso_detach = self.iso_detach;
        f.iso_connect = self.iso_connect;
        f.iso_disable = self.iso_disable;
        f.iso_ca = self.iso_ca.clone();
        f.iso_cert = self.iso_cert.clone();
        f.iso_key = self.iso_key.clone();
    }
}

impl FeatureArgs {
    pub fn to_flags(&self) -> CreateFlags {
        let mut f = CreateFlags {
            guest_os: self.guest_os.clone(),
            cpu: self.cpu,
            memory: self.memory.clone(),
            disk: self.disk.clone(),
            disk_single_file: either(self.disk_single_file, self.disk_split),
            disk_preallocated: either(self.disk_preallocated, self.disk_growable),
            floppy_disable: self.floppy_disable,
            boot_efi: self.boot_efi,
            boot_bios: self.boot_bios,
            eth_enable: self.eth_enable,
            eth_disable: self.eth_disable,
            mac: self.mac.clone(),
            serial_pipe: self.serial_pipe.clone(),
            serial_client: self.serial_client,
            serial_v2v: self.serial_v2v,
            serial_disable: self.serial_disable,
            vnc_enable: self.vnc_enable,
            vnc_disable: self.vnc_disable,
            vnc_port: self.vnc_port,
            clipboard_enable: self.clipboard_enable,
            clipboard_disable: self.clipboard_disable,
            share: self.share.clone(),
            share_guest: self.share_guest.clone(),
            share_disable: self.share_disable,
            time_sync_enable: self.time_sync_enable,
            time_sync_disable: self.time_sync_disable,
            time_zone: self.time_zone.clone(),
            usb_allow_hid: self.usb_allow_hid,
            usb_allow_ccid: self.usb_allow_ccid,
            usb_devices: self.usb_devices.clone(),
            wait: self.wait,
            ..Default::default()
        };
        self.iso.apply(&mut f);
        f
    }
}

impl StartArgs {
    pub fn to_options(&self) -> vmws_core::StartOptions {
        vmws_core::StartOptions {
            background: self.background,
            fullscreen: self.fullscreen,
            wait: self.wait,
            modify_stretch: self.stretch || self.no_stretch,
            stretch_enabled: self.stretch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn create_flags_bind() {
        let cli = Cli::try_parse_from([
            "vmws", "create", "web", "--cpu", "2", "--memory", "2G", "--disk", "16G",
            "--boot-efi", "--iso-attach", "debian", "--disk-split", "-w",
        ])
        .unwrap();
        let Command::Create { name, features } = cli.command else {
            panic!("expected create");
        };
        assert_eq!(name, "web");
        let flags = features.to_flags();
        assert_eq!(flags.cpu, Some(2));
        assert_eq!(flags.disk_single_file, Some(false));
        assert_eq!(flags.disk_preallocated, None);
        assert_eq!(flags.iso_attach.as_deref(), Some("debian"));
        assert!(flags.boot_efi && flags.wait);
    }

    #[test]
    fn passthrough_keeps_hyphen_args() {
        let cli = Cli::try_parse_from(["vmws", "vmrun", "-T", "ws", "list"]).unwrap();
        let Command::Vmrun { args } = cli.command else {
            panic!("expected vmrun");
        };
        assert_eq!(args, vec!["-T", "ws", "list"]);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["vmws", "show", "-vv", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        assert!(Cli::try_parse_from(["vmws", "start", "a", "-b", "-F"]).is_err());
    }

    #[test]
    fn destroy_takes_force_only() {
        let cli = Cli::try_parse_from(["vmws", "destroy", "a", "-f"]).unwrap();
        assert!(matches!(cli.command, Command::Destroy { force: true, .. }));
        assert!(Cli::try_parse_from(["vmws", "destroy", "a", "-w"]).is_err());
    }
}
