//! REST API wire types.

use serde::{Deserialize, Deserializer, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Inventory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVm {
    pub id: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCpu {
    #[serde(default)]
    pub processors: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVmInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub cpu: ApiCpu,
    /// Megabytes
    #[serde(default)]
    pub memory: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiParam {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiPower {
    #[serde(default)]
    pub power_state: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Restrictions snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Accepts `true`, `"true"`, `"yes"`, `"connected"` and friends.
fn flex_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        serde_json::Value::String(s) => matches!(
            s.to_lowercase().as_str(),
            "true" | "yes" | "on" | "1" | "connected"
        ),
        _ => false,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDevice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub device_path: String,
    #[serde(default)]
    pub connection_status: String,
    #[serde(default, deserialize_with = "flex_bool")]
    pub start_connected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDeviceList {
    #[serde(default)]
    pub devices: Vec<ApiDevice>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNic {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default, rename = "type")]
    pub nic_type: String,
    #[serde(default)]
    pub vmnet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiNicList {
    #[serde(default)]
    pub nics: Vec<ApiNic>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVnc {
    #[serde(default, rename = "VNCEnabled", deserialize_with = "flex_bool")]
    pub enabled: bool,
    #[serde(default, rename = "VNCPort")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIsolation {
    #[serde(default, deserialize_with = "flex_bool")]
    pub copy_disabled: bool,
    #[serde(default, deserialize_with = "flex_bool")]
    pub paste_disabled: bool,
    #[serde(default, deserialize_with = "flex_bool")]
    pub dnd_disabled: bool,
    #[serde(default, deserialize_with = "flex_bool")]
    pub hgfs_disabled: bool,
}

/// `GET vms/{id}/restrictions`. Unlisted fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restrictions {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub cpu: ApiCpu,
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub cddvd_list: ApiDeviceList,
    #[serde(default)]
    pub nic_list: ApiNicList,
    #[serde(default)]
    pub serial_port_list: ApiDeviceList,
    #[serde(default, rename = "remoteVNC")]
    pub remote_vnc: ApiVnc,
    #[serde(default)]
    pub guest_isolation: ApiIsolation,
}
