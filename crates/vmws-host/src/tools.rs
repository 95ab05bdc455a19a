//! Names of the host utilities.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostTools {
    pub vmrun: String,
    pub vmcli: String,
    pub vdiskmanager: String,
    pub vmware: String,
}

impl Default for HostTools {
    fn default() -> Self {
        Self {
            vmrun: "vmrun".to_string(),
            vmcli: "vmcli".to_string(),
            vdiskmanager: "vmware-vdiskmanager".to_string(),
            vmware: "vmware".to_string(),
        }
    }
}
