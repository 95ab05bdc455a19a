//! HTTPS client construction with optional mutual TLS.

use crate::config::TlsFiles;
use log::debug;
use reqwest::{Certificate, Client, Identity};
use std::time::Duration;
use vmws_core::{VmwsError, VmwsResult};

fn read_pem(path: &str, what: &str) -> VmwsResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        VmwsError::config(format!("Failed to read {} '{}': {}", what, path, e))
    })
}

/// Build a `reqwest::Client`. When `tls` is complete the client presents
/// the certificate/key pair and trusts only the given CA in addition to the
/// platform roots.
pub fn build_client(tls: &TlsFiles, timeout: Option<Duration>) -> VmwsResult<Client> {
    tls.validate("HTTPS client")?;

    let mut builder = Client::builder().use_rustls_tls();
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }

    if tls.is_complete() {
        debug!("configuring mutual TLS with cert {} and CA {}", tls.cert, tls.ca);
        let mut identity_pem = read_pem(&tls.cert, "client certificate")?;
        identity_pem.push(b'\n');
        identity_pem.extend(read_pem(&tls.key, "client key")?);
        let identity = Identity::from_pem(&identity_pem)
            .map_err(|e| VmwsError::config(format!("Invalid client certificate/key: {e}")))?;
        let ca = Certificate::from_pem(&read_pem(&tls.ca, "CA bundle")?)
            .map_err(|e| VmwsError::config(format!("Invalid CA certificate: {e}")))?;
        builder = builder.identity(identity).add_root_certificate(ca);
    }

    builder
        .build()
        .map_err(|e| VmwsError::transport(format!("Failed to build HTTP client: {e}")))
}
