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

//! Client library for a Wake-on-LAN management panel.
//!
//! The library drives the life of one wake attempt: it asks the panel backend
//! to send the magic packet, waits for the target to boot, then polls its
//! liveness on a fixed interval until it answers or the attempt budget runs
//! out. UI surfaces are reached only through the handle traits in [`status`]
//! and [`alert`], so any frontend (desktop window, terminal, tests) can drive
//! the same sequence.
//!
//! - **API layer** ([`api`]): HTTP client for `/api/ping`, `/api/wol` and
//!   `/api/machines`
//! - **Sequence layer** ([`wake`], [`poller`]): wake trigger and the
//!   online-wait state machine
//! - **Control layer** ([`controller`]): one cancellable sequence per machine
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wol_client::{AlertBoard, HttpApi, Machine, MachineView, WakeController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wol_client::ApiError> {
//!     let api = HttpApi::new("http://localhost:5001", Duration::from_secs(10))?;
//!     let alerts = Arc::new(AlertBoard::new());
//!     let controller = WakeController::new(Arc::new(api), alerts.clone());
//!
//!     let machine = Machine::new("nas", "NAS", "00:11:22:33:44:55", "192.168.1.20");
//!     let view = Arc::new(MachineView::new());
//!
//!     let outcome = controller.wake(&machine, view.handles()).await.ok();
//!     println!("{outcome:?}: {:?}", view.snapshot().status);
//!     Ok(())
//! }
//! ```

pub mod alert;
pub mod api;
pub mod controller;
pub mod liveness;
pub mod poller;
pub mod status;
pub mod wake;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};

pub use alert::{AlertBoard, Notifier, Severity, VisibleAlert};
pub use api::{ApiError, HttpApi, InventoryEntry, PanelApi, PingResponse, WakeRequest, WakeResponse};
pub use controller::WakeController;
pub use liveness::Liveness;
pub use poller::{OnlineWait, PollSettings, PollState};
pub use status::{ActionControl, MachineHandles, MachineSnapshot, MachineView, StatusDisplay, StatusIndicator};
pub use wake::{SequenceOutcome, WakeTrigger};

/// A machine that can be woken from the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    /// Stable key used to address the machine's handles.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Hardware address, only sent with wake requests.
    pub mac: String,
    /// Network address used for liveness checks.
    pub ip: String,
}

impl Machine {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        mac: impl Into<String>,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mac: mac.into(),
            ip: ip.into(),
        }
    }

    /// Body of the wake request for this machine.
    #[must_use]
    pub fn wake_request(&self) -> WakeRequest {
        WakeRequest {
            mac: self.mac.clone(),
            ip: self.ip.clone(),
        }
    }
}
