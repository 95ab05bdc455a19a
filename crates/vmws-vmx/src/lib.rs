//! # vmws – VMX Document
//!
//! The `.vmx` configuration file as an ordered list of `KEY = "VALUE"`
//! lines with one validated setter per feature group.
//!
//! ## Modules
//!
//! - **document**: line list, lookup, prefix removal, rendering
//! - **setters**: name, CPU, memory, disk, floppy, firmware, ISO, USB, NIC,
//!   serial pipe, VNC, clipboard, file share, time sync, time zone
//! - **configure**: new-instance template and `configure`
//! - **boolean**: `TRUE` / `FALSE` codec

pub mod boolean;
pub mod configure;
pub mod document;
pub mod setters;

pub use boolean::{format_vmx_bool, parse_vmx_bool, vmx_bool};
pub use document::VmxDocument;
