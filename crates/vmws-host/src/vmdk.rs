//! VMDK text descriptor reader.
//!
//! Only the descriptor is interpreted: extent lines give the capacity and
//! `key = "value"` lines are kept verbatim. Binary content is ignored.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use vmws_core::shell::quote_arg;
use vmws_core::size::format_size;
use vmws_core::{path, VmDisk, VmwsResult};
use vmws_exec::{ExitPolicy, HostShell};

/// Upper bound on the bytes read from a disk file.
pub const DESCRIPTOR_LIMIT: usize = 65536;

const SECTOR_SIZE: u64 = 512;

lazy_static! {
    static ref EXTENT: Regex =
        Regex::new(r"^(RW|RDONLY|NOACCESS)\s+(\d+)\s").expect("extent pattern");
    static ref ENTRY: Regex =
        Regex::new(r#"^([A-Za-z0-9_.]+)\s*=\s*"(.*)"\s*$"#).expect("descriptor entry pattern");
}

/// Capacity in bytes and the descriptor map.
pub fn parse_descriptor(lines: &[String]) -> (u64, BTreeMap<String, String>) {
    let mut capacity = 0u64;
    let mut map = BTreeMap::new();
    for line in lines {
        let line = line.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        if let Some(caps) = EXTENT.captures(line) {
            if let Ok(sectors) = caps[2].parse::<u64>() {
                capacity = capacity.saturating_add(sectors.saturating_mul(SECTOR_SIZE));
            }
        } else if let Some(caps) = ENTRY.captures(line) {
            map.insert(caps[1].to_string(), caps[2].to_string());
        }
    }
    (capacity, map)
}

/// Host command printing at most [`DESCRIPTOR_LIMIT`] bytes of a disk file.
pub fn read_command(shell: &dyn HostShell, file: &str) -> VmwsResult<String> {
    let os = shell.remote_os();
    let native = path::format_for(os, file)?;
    if os.is_windows() {
        let script = format!(
            "$b = New-Object byte[] {limit}; $f = [IO.File]::OpenRead('{p}'); \
             $n = $f.Read($b, 0, {limit}); $f.Close(); \
             [Text.Encoding]::ASCII.GetString($b, 0, $n)",
            limit = DESCRIPTOR_LIMIT,
            p = native.replace('\'', "''"),
        );
        Ok(format!(
            "powershell -NoProfile -NonInteractive -Command {}",
            quote_arg(os, &script)
        ))
    } else {
        Ok(format!("head -c {} {}", DESCRIPTOR_LIMIT, quote_arg(os, &native)))
    }
}

/// Read the descriptor of `file` (canonical path) attached at `device`.
pub async fn read_disk(
    shell: &dyn HostShell,
    device: &str,
    file: &str,
    no_humanize: bool,
) -> VmwsResult<VmDisk> {
    let cmd = read_command(shell, file)?;
    let out = shell.remote_exec(&cmd, ExitPolicy::Check).await?;
    let (capacity, descriptor) = parse_descriptor(&out.stdout);
    Ok(VmDisk {
        device: device.to_string(),
        file: file.to_string(),
        capacity,
        size: format_size(capacity, no_humanize),
        descriptor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_capacity_and_entries() {
        let text = r#"# Disk DescriptorFile
version=1
CID=fffffffe
parentCID=ffffffff
createType="twoGbMaxExtentSparse"

# Extent description
RW 16646144 SPARSE "tvm-s001.vmdk"
RW 16646144 SPARSE "tvm-s002.vmdk"
RW 262144 SPARSE "tvm-s003.vmdk"

ddb.adapterType = "lsilogic"
ddb.virtualHWVersion = "21"
"#;
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let (capacity, map) = parse_descriptor(&lines);
        assert_eq!(capacity, 16u64 << 30);
        assert_eq!(format_size(capacity, false), "16G");
        assert_eq!(map["createType"], "twoGbMaxExtentSparse");
        assert_eq!(map["ddb.adapterType"], "lsilogic");
        assert!(!map.contains_key("version"));
    }

    #[test]
    fn binary_noise_is_ignored() {
        let lines = vec!["KDMV\0\0\u{1}".to_string(), "RW 2048 SPARSE \"a.vmdk\"".to_string()];
        assert_eq!(parse_descriptor(&lines).0, 1024 * 1024);
    }
}
