//! # vmws – Remote Execution
//!
//! One capability for running commands on the VMware host whether it is
//! the local machine, an ssh peer, or a Windows box behind the typed
//! `winexec` HTTPS RPC.
//!
//! ## Modules
//!
//! - **config**: `ExecConfig`, transport choice, TLS triples
//! - **output**: `ExecOutput` and the check / capture exit policy
//! - **process**: `tokio::process` runner with piped stdio
//! - **tls**: `reqwest` client construction with mutual TLS
//! - **rpc**: `winexec` client (exec, spawn, upload, download, mkdir, remove, iso)
//! - **shell**: `HostShell` trait and host command builders
//! - **executor**: `HostShell` over sh / cmd / ssh / winexec
//! - **transfer**: instance-directory transfers and host-file round-trips

pub mod config;
pub mod executor;
pub mod output;
pub mod process;
pub mod rpc;
pub mod shell;
pub mod tls;
pub mod transfer;

pub use config::{ExecConfig, TlsFiles, Transport, WinexecConfig};
pub use executor::Executor;
pub use output::{ExecOutput, ExitPolicy};
pub use shell::{HostShell, Shell};
