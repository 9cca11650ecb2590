// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP client for the panel backend.
//!
//! The backend owns the actual Wake-on-LAN plumbing. The panel only needs
//! three endpoints:
//!
//! - `GET /api/ping/{address}` answers `{ "online": bool }`
//! - `POST /api/wol` takes `{ "mac", "ip" }` and answers
//!   `{ "success": bool, "error"?: string }`
//! - `GET /api/machines` lists the machines the backend knows about

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while talking to the panel backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("backend answered with status {0}")]
    Status(StatusCode),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

/// Body of a wake request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeRequest {
    pub mac: String,
    pub ip: String,
}

/// Backend answer to a wake request.
///
/// `details` and `message` are informational only and never shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WakeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Backend answer to a ping lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PingResponse {
    #[serde(default)]
    pub online: bool,
}

/// One entry of the backend machine inventory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InventoryEntry {
    pub name: String,
    pub mac: String,
    pub ip: String,
    #[serde(default)]
    pub online: bool,
}

/// Operations the panel needs from its backend.
///
/// [`HttpApi`] is the production implementation; tests substitute scripted
/// fakes.
pub trait PanelApi: Send + Sync + 'static {
    /// Look up whether `address` currently answers on the network.
    fn ping(&self, address: &str) -> impl Future<Output = Result<PingResponse, ApiError>> + Send;

    /// Ask the backend to send a wake packet.
    fn wake(&self, request: &WakeRequest) -> impl Future<Output = Result<WakeResponse, ApiError>> + Send;

    /// Fetch the machines the backend is configured with, keyed by id.
    fn machines(&self) -> impl Future<Output = Result<BTreeMap<String, InventoryEntry>, ApiError>> + Send;
}

/// [`PanelApi`] over HTTP using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    /// Create a client for the backend at `base_url` (scheme required).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(base_url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn normalize_base_url(base_url: &str) -> Result<String, ApiError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let has_scheme = trimmed.starts_with("http://") || trimmed.starts_with("https://");
    let has_host = trimmed.split("://").nth(1).is_some_and(|rest| !rest.is_empty());

    if has_scheme && has_host {
        Ok(trimmed.to_string())
    } else {
        Err(ApiError::InvalidUrl(base_url.to_string()))
    }
}

impl PanelApi for HttpApi {
    async fn ping(&self, address: &str) -> Result<PingResponse, ApiError> {
        let url = self.endpoint(&format!("/api/ping/{address}"));
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn wake(&self, request: &WakeRequest) -> Result<WakeResponse, ApiError> {
        let url = self.endpoint("/api/wol");
        debug!("POST {} mac={} ip={}", url, request.mac, request.ip);

        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        // Failures come back as 4xx/5xx with a regular JSON body, so the body
        // wins over the status whenever it parses.
        decode_wake_response(status, &body)
    }

    async fn machines(&self) -> Result<BTreeMap<String, InventoryEntry>, ApiError> {
        let url = self.endpoint("/api/machines");
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn decode_wake_response(status: StatusCode, body: &[u8]) -> Result<WakeResponse, ApiError> {
    match serde_json::from_slice::<WakeResponse>(body) {
        Ok(parsed) => Ok(parsed),
        Err(_) if !status.is_success() => Err(ApiError::Status(status)),
        Err(e) => Err(ApiError::Decode(e)),
    }
}
