//! Typed HTTPS remote-exec client (`winexec`).
//!
//! The host runs a small service that accepts JSON requests over mutual
//! TLS and executes commands, moves files and fetches ISO images on the
//! caller's behalf:
//!
//! | Verb | Request | Response |
//! |------|---------|----------|
//! | `POST /exec/` | `{command, args}` | `{success, command, exit_code, stdout, stderr}` |
//! | `POST /spawn/` | `{command, args}` | same as exec |
//! | `POST /upload/` | `{path, data}` (base64) | `{success, message}` |
//! | `POST /download/` | `{path}` | `{success, path, data}` |
//! | `POST /mkdir/` | `{path}` | `{success, message}` |
//! | `POST /remove/` | `{path}` | `{success, message}` |
//! | `POST /iso/` | `{url, dest, ca, client_cert, client_key}` | `{success, message}` |

use crate::config::{TlsFiles, WinexecConfig};
use crate::output::ExecOutput;
use crate::tls::build_client;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, trace};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vmws_core::hexdump::hexdump;
use vmws_core::{VmwsError, VmwsErrorKind, VmwsResult};

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ExecRequest {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

#[derive(Debug, Clone, Serialize)]
struct PathRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct UploadRequest<'a> {
    path: &'a str,
    data: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DownloadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Serialize)]
struct IsoRequest<'a> {
    url: &'a str,
    dest: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    ca: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    client_cert: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    client_key: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
}

// ── Client ──────────────────────────────────────────────────────────

/// Remote-exec RPC client.
pub struct WinexecClient {
    client: Client,
    base_url: String,
}

impl WinexecClient {
    pub fn new(config: &WinexecConfig, timeout: Option<Duration>) -> VmwsResult<Self> {
        if config.url.is_empty() {
            return Err(VmwsError::config("winexec.url is not set"));
        }
        Ok(Self {
            client: build_client(&config.tls, timeout)?,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run `command args…` and wait for it.
    pub async fn exec(&self, command: &str, args: &[String]) -> VmwsResult<ExecOutput> {
        self.run("/exec/", command, args).await
    }

    /// Start `command args…` in the background.
    pub async fn spawn(&self, command: &str, args: &[String]) -> VmwsResult<ExecOutput> {
        self.run("/spawn/", command, args).await
    }

    async fn run(&self, verb: &str, command: &str, args: &[String]) -> VmwsResult<ExecOutput> {
        let req = ExecRequest {
            command: command.to_string(),
            args: args.to_vec(),
        };
        debug!("winexec {} {} {:?}", verb, command, args);
        let resp: ExecResponse = self.post(verb, &req).await?;
        if !resp.success && resp.exit_code == 0 {
            return Err(VmwsError::with_details(
                VmwsErrorKind::RemoteExecFailed,
                format!("winexec could not run '{}'", command),
                resp.stderr,
            ));
        }
        Ok(ExecOutput::from_raw(&resp.stdout, &resp.stderr, resp.exit_code))
    }

    pub async fn upload(&self, path: &str, data: &[u8]) -> VmwsResult<()> {
        trace!("winexec upload {} ({} bytes)\n{}", path, data.len(), hexdump(&data[..data.len().min(256)]));
        let req = UploadRequest {
            path,
            data: STANDARD.encode(data),
        };
        let resp: StatusResponse = self.post("/upload/", &req).await?;
        Self::require_success("upload", path, resp)
    }

    pub async fn download(&self, path: &str) -> VmwsResult<Vec<u8>> {
        let resp: DownloadResponse = self.post("/download/", &PathRequest { path }).await?;
        if !resp.success {
            return Err(VmwsError::with_details(
                VmwsErrorKind::RemoteExecFailed,
                format!("winexec download of '{}' failed", path),
                resp.message,
            ));
        }
        let data = STANDARD
            .decode(resp.data.as_bytes())
            .map_err(|e| VmwsError::parse(format!("Invalid base64 in download of '{}': {}", path, e)))?;
        trace!("winexec download {} ({} bytes)\n{}", path, data.len(), hexdump(&data[..data.len().min(256)]));
        Ok(data)
    }

    pub async fn mkdir_all(&self, path: &str) -> VmwsResult<()> {
        let resp: StatusResponse = self.post("/mkdir/", &PathRequest { path }).await?;
        Self::require_success("mkdir", path, resp)
    }

    pub async fn remove_all(&self, path: &str) -> VmwsResult<()> {
        let resp: StatusResponse = self.post("/remove/", &PathRequest { path }).await?;
        Self::require_success("remove", path, resp)
    }

    /// Ask the host to download `url` into `dest`, optionally presenting
    /// the given client TLS material to the origin.
    pub async fn fetch_iso(&self, url: &str, dest: &str, tls: &TlsFiles) -> VmwsResult<()> {
        let req = IsoRequest {
            url,
            dest,
            ca: &tls.ca,
            client_cert: &tls.cert,
            client_key: &tls.key,
        };
        let resp: StatusResponse = self.post("/iso/", &req).await?;
        Self::require_success("iso fetch", dest, resp)
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> VmwsResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).json(body).send().await?;
        let resp = Self::check_status(resp).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| VmwsError::parse(format!("Failed to read response body: {e}")))?;
        serde_json::from_str(&text).map_err(|e| {
            VmwsError::parse(format!(
                "JSON parse error: {e}; body: {}",
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    async fn check_status(resp: Response) -> VmwsResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(VmwsError::with_details(
                VmwsErrorKind::TransportFailed,
                format!("winexec rejected the client certificate ({})", status),
                body,
            )),
            _ => Err(VmwsError::api(code, format!("winexec error {}: {}", status, body))),
        }
    }

    fn require_success(verb: &str, path: &str, resp: StatusResponse) -> VmwsResult<()> {
        if resp.success {
            Ok(())
        } else {
            Err(VmwsError::with_details(
                VmwsErrorKind::RemoteExecFailed,
                format!("winexec {} of '{}' failed", verb, path),
                resp.message,
            ))
        }
    }
}
