//! # vmws – Host Surfaces
//!
//! The VMware host's control surfaces other than the raw shell.
//!
//! ## Modules
//!
//! - **api**: REST control API client (`ControlApi`, `RestClient`)
//! - **types**: REST wire types and the restrictions snapshot
//! - **index**: instance discovery and id / name / path resolution
//! - **vmcli**: power query, parameters, CD/DVD backing, keyboard
//! - **vmrun**: start / stop / list / guest IP
//! - **vmdk**: disk descriptor reader
//! - **tools**: host utility names

pub mod api;
pub mod index;
pub mod tools;
pub mod types;
pub mod vmcli;
pub mod vmdk;
pub mod vmrun;

pub use api::{ApiConfig, ControlApi, RestClient};
pub use index::InstanceIndex;
pub use tools::HostTools;
pub use vmcli::VmCli;
pub use vmrun::VmRun;
