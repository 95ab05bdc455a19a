//! # vmws – Core
//!
//! Types and codecs shared by every crate of the VMware Workstation
//! controller.
//!
//! ## Modules
//!
//! - **error**: `VmwsError` / `VmwsErrorKind` and the `VmwsResult` alias
//! - **os**: Host OS tags and path-emission styles
//! - **path**: Canonical path codec, directory-listing parser, ISO paths
//! - **size**: `16G` / `1.25G` byte-count codec
//! - **shell**: Argument quoting for `sh` and `cmd.exe`
//! - **types**: Identity, instance records, option structs
//! - **flags**: Operator flag binding with conflict checks
//! - **hexdump**: Hex dump of payloads for trace logs

pub mod error;
pub mod flags;
pub mod hexdump;
pub mod os;
pub mod path;
pub mod shell;
pub mod size;
pub mod types;

pub use error::{VmwsError, VmwsErrorKind, VmwsResult};
pub use os::{HostOs, PathStyle};
pub use types::*;
