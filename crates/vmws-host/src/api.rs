//! Host REST control API client.
//!
//! Talks to the Workstation REST service under `{url}/api/` with HTTP basic
//! auth and the vendor JSON media type. Single attempt per call.

use crate::types::{ApiParam, ApiPower, ApiVm, ApiVmInfo, Restrictions};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vmws_core::{VmwsError, VmwsErrorKind, VmwsResult};
use vmws_exec::tls::build_client;
use vmws_exec::TlsFiles;

pub const MEDIA_TYPE: &str = "application/vnd.vmware.vmw.rest-v1+json";

/// REST endpoint settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(flatten)]
    pub tls: TlsFiles,
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }

    pub fn validate(&self) -> VmwsResult<()> {
        self.tls.validate("api")
    }
}

/// Inventory and parameter access on the host's REST surface.
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// `GET vms`
    async fn list_vms(&self) -> VmwsResult<Vec<ApiVm>>;
    /// `GET vms/{id}`
    async fn get_vm(&self, id: &str) -> VmwsResult<ApiVmInfo>;
    /// `GET vms/{id}/restrictions`
    async fn get_restrictions(&self, id: &str) -> VmwsResult<Restrictions>;
    /// `GET vms/{id}/params/{name}`
    async fn get_param(&self, id: &str, name: &str) -> VmwsResult<ApiParam>;
    /// `PUT vms/{id}/params`
    async fn set_param(&self, id: &str, name: &str, value: &str) -> VmwsResult<()>;
    /// `GET vms/{id}/power`
    async fn get_power(&self, id: &str) -> VmwsResult<ApiPower>;
}

/// `reqwest` implementation of [`ControlApi`].
pub struct RestClient {
    client: Client,
    base_url: String,
    config: ApiConfig,
}

impl RestClient {
    pub fn new(config: &ApiConfig) -> VmwsResult<Self> {
        config.validate()?;
        if !config.is_configured() {
            return Err(VmwsError::config("api.url is not set"));
        }
        let timeout = match config.timeout_secs {
            0 => None,
            s => Some(Duration::from_secs(s)),
        };
        let client = build_client(&config.tls, timeout)?;
        let trimmed = config.url.trim_end_matches('/');
        let base_url = if trimmed.ends_with("/api") {
            trimmed.to_string()
        } else {
            format!("{}/api", trimmed)
        };
        Ok(Self {
            client,
            base_url,
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static(MEDIA_TYPE));
        h.insert(ACCEPT, HeaderValue::from_static(MEDIA_TYPE));
        h
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    /// GET a JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> VmwsResult<T> {
        let url = self.url(path);
        debug!("api GET {}", url);
        let resp = self
            .client
            .get(&url)
            .headers(Self::headers())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    /// PUT with JSON body.
    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> VmwsResult<()> {
        let url = self.url(path);
        debug!("api PUT {}", url);
        let resp = self
            .client
            .put(&url)
            .headers(Self::headers())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(body)
            .send()
            .await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    async fn check_status(resp: Response) -> VmwsResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();
        let line = format!("{}", status);
        match status {
            StatusCode::UNAUTHORIZED => Err(VmwsError::with_details(
                VmwsErrorKind::ApiError(code),
                format!("API authentication failed: {}", line),
                body,
            )),
            StatusCode::NOT_FOUND => Err(VmwsError::with_details(
                VmwsErrorKind::ApiError(code),
                format!("API resource not found: {}", line),
                body,
            )),
            _ => Err(VmwsError::with_details(
                VmwsErrorKind::ApiError(code),
                format!("API error: {}", line),
                body,
            )),
        }
    }

    async fn parse_response<T: DeserializeOwned>(resp: Response) -> VmwsResult<T> {
        let text = resp
            .text()
            .await
            .map_err(|e| VmwsError::parse(format!("Failed to read response body: {e}")))?;
        serde_json::from_str(&text).map_err(|e| {
            VmwsError::with_details(
                VmwsErrorKind::ParseError,
                format!("JSON parse error: {e}"),
                text.chars().take(500).collect::<String>(),
            )
        })
    }
}

#[async_trait]
impl ControlApi for RestClient {
    async fn list_vms(&self) -> VmwsResult<Vec<ApiVm>> {
        self.get("vms").await
    }

    async fn get_vm(&self, id: &str) -> VmwsResult<ApiVmInfo> {
        self.get(&format!("vms/{}", id)).await
    }

    async fn get_restrictions(&self, id: &str) -> VmwsResult<Restrictions> {
        self.get(&format!("vms/{}/restrictions", id)).await
    }

    async fn get_param(&self, id: &str, name: &str) -> VmwsResult<ApiParam> {
        self.get(&format!("vms/{}/params/{}", id, name)).await
    }

    async fn set_param(&self, id: &str, name: &str, value: &str) -> VmwsResult<()> {
        let body = ApiParam {
            name: name.to_string(),
            value: value.to_string(),
        };
        self.put(&format!("vms/{}/params", id), &body).await
    }

    async fn get_power(&self, id: &str) -> VmwsResult<ApiPower> {
        self.get(&format!("vms/{}/power", id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_api_suffix_once() {
        let cfg = ApiConfig {
            url: "https://vmhost:8697/".into(),
            ..Default::default()
        };
        assert_eq!(RestClient::new(&cfg).unwrap().base_url(), "https://vmhost:8697/api");
        let cfg = ApiConfig {
            url: "https://vmhost:8697/api".into(),
            ..Default::default()
        };
        let client = RestClient::new(&cfg).unwrap();
        assert_eq!(client.url("vms/X/params"), "https://vmhost:8697/api/vms/X/params");
    }

    #[test]
    fn unconfigured_is_config_error() {
        let err = RestClient::new(&ApiConfig::default()).err().unwrap();
        assert!(err.is(&VmwsErrorKind::ConfigError));
    }

    #[test]
    fn partial_tls_is_rejected() {
        let cfg = ApiConfig {
            url: "https://vmhost:8697".into(),
            tls: TlsFiles {
                ca: "/etc/ca.pem".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(RestClient::new(&cfg).is_err());
    }
}
