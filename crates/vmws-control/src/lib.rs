//! # vmws – Control
//!
//! Operator intents composed over the host shell, the VMX document, the
//! REST API and the host utilities.
//!
//! ## Modules
//!
//! - **controller**: `Controller`, index refresh, power queries, instance records
//! - **lifecycle**: create, modify, start, stop, restart, destroy, wait
//! - **property**: `get` / `set` by property name
//! - **files**: listings, show, upload / download, edit, passthroughs
//! - **keys**: escape decoding, HID keymap, `sendkeys`
//! - **settings**: roots, ISO store, polling, tool names

pub mod controller;
pub mod files;
pub mod keys;
pub mod lifecycle;
pub mod property;
pub mod settings;

#[cfg(test)]
mod testing;

pub use controller::Controller;
pub use settings::Settings;
