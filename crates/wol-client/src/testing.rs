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

//! Scripted backend and recording handles shared by the unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::Instant;

use crate::alert::{Notifier, Severity};
use crate::api::{ApiError, InventoryEntry, PanelApi, PingResponse, WakeRequest, WakeResponse};
use crate::status::{ActionControl, MachineHandles, StatusDisplay, StatusIndicator};
use crate::Machine;

pub(crate) fn machine() -> Machine {
    Machine::new("windows-pc", "PC Windows", "00:23:24:F2:63:4D", "192.168.1.100")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PingReply {
    Online,
    Offline,
    /// Transport-level failure.
    Fail,
    /// 2xx with a body that is not JSON.
    Garbled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WakeReply {
    Accepted,
    Rejected(Option<String>),
    /// Verbatim backend body.
    Body(WakeResponse),
    Fail,
}

/// Backend fake. Ping replies come from the script, then from the fallback.
pub(crate) struct FakeApi {
    script: Mutex<VecDeque<PingReply>>,
    fallback_online: AtomicBool,
    wake_reply: WakeReply,
    wake_latency: Duration,
    ping_latency: Duration,
    pings: Mutex<Vec<Instant>>,
    wakes: Mutex<Vec<WakeRequest>>,
}

impl FakeApi {
    pub(crate) fn scripted(replies: impl IntoIterator<Item = PingReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            fallback_online: AtomicBool::new(false),
            wake_reply: WakeReply::Accepted,
            wake_latency: Duration::ZERO,
            ping_latency: Duration::ZERO,
            pings: Mutex::default(),
            wakes: Mutex::default(),
        }
    }

    pub(crate) fn always(reply: PingReply) -> Self {
        let api = Self::scripted([]);
        api.set_online(reply == PingReply::Online);
        api
    }

    pub(crate) fn with_wake(mut self, reply: WakeReply) -> Self {
        self.wake_reply = reply;
        self
    }

    pub(crate) fn with_wake_latency(mut self, latency: Duration) -> Self {
        self.wake_latency = latency;
        self
    }

    pub(crate) fn with_ping_latency(mut self, latency: Duration) -> Self {
        self.ping_latency = latency;
        self
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.fallback_online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn ping_times(&self) -> Vec<Instant> {
        self.pings.lock().unwrap().clone()
    }

    pub(crate) fn ping_count(&self) -> usize {
        self.pings.lock().unwrap().len()
    }

    pub(crate) fn wake_requests(&self) -> Vec<WakeRequest> {
        self.wakes.lock().unwrap().clone()
    }

    fn next_ping(&self) -> PingReply {
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            if self.fallback_online.load(Ordering::SeqCst) {
                PingReply::Online
            } else {
                PingReply::Offline
            }
        })
    }
}

impl PanelApi for FakeApi {
    async fn ping(&self, _address: &str) -> Result<PingResponse, ApiError> {
        self.pings.lock().unwrap().push(Instant::now());
        if !self.ping_latency.is_zero() {
            tokio::time::sleep(self.ping_latency).await;
        }

        match self.next_ping() {
            PingReply::Online => Ok(PingResponse { online: true }),
            PingReply::Offline => Ok(PingResponse { online: false }),
            PingReply::Fail => Err(ApiError::Status(StatusCode::SERVICE_UNAVAILABLE)),
            PingReply::Garbled => Err(ApiError::Decode(
                serde_json::from_str::<PingResponse>("<html>").unwrap_err(),
            )),
        }
    }

    async fn wake(&self, request: &WakeRequest) -> Result<WakeResponse, ApiError> {
        self.wakes.lock().unwrap().push(request.clone());
        if !self.wake_latency.is_zero() {
            tokio::time::sleep(self.wake_latency).await;
        }

        match &self.wake_reply {
            WakeReply::Accepted => Ok(WakeResponse {
                success: true,
                ..Default::default()
            }),
            WakeReply::Rejected(error) => Ok(WakeResponse {
                success: false,
                error: error.clone(),
                ..Default::default()
            }),
            WakeReply::Body(response) => Ok(response.clone()),
            WakeReply::Fail => Err(ApiError::Status(StatusCode::BAD_GATEWAY)),
        }
    }

    async fn machines(&self) -> Result<BTreeMap<String, InventoryEntry>, ApiError> {
        Ok(BTreeMap::new())
    }
}

/// Everything the library did to the UI, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UiEvent {
    Status(StatusDisplay, String),
    Enabled(bool),
    Label(String),
    Alert(String, Severity),
}

/// Status indicator, control and notifier in one, logging every call.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    events: Mutex<Vec<UiEvent>>,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn handles(self: &Arc<Self>) -> MachineHandles {
        MachineHandles {
            status: Some(self.clone()),
            control: self.clone(),
        }
    }

    pub(crate) fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn alerts(&self) -> Vec<(String, Severity)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Alert(message, severity) => Some((message, severity)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn last_status(&self) -> Option<(StatusDisplay, String)> {
        self.events().into_iter().rev().find_map(|event| match event {
            UiEvent::Status(status, label) => Some((status, label)),
            _ => None,
        })
    }

    pub(crate) fn control_enabled(&self) -> Option<bool> {
        self.events().into_iter().rev().find_map(|event| match event {
            UiEvent::Enabled(enabled) => Some(enabled),
            _ => None,
        })
    }

    pub(crate) fn control_label(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|event| match event {
            UiEvent::Label(label) => Some(label),
            _ => None,
        })
    }

    fn push(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl StatusIndicator for Recorder {
    fn set_status(&self, status: StatusDisplay, label: &str) {
        self.push(UiEvent::Status(status, label.to_string()));
    }
}

impl ActionControl for Recorder {
    fn set_enabled(&self, enabled: bool) {
        self.push(UiEvent::Enabled(enabled));
    }

    fn set_label(&self, label: &str) {
        self.push(UiEvent::Label(label.to_string()));
    }
}

impl Notifier for Recorder {
    fn notify(&self, message: &str, severity: Severity) {
        self.push(UiEvent::Alert(message.to_string(), severity));
    }
}
