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

//! Best-effort liveness lookups.

use log::debug;

use crate::api::PanelApi;
use crate::status::{labels, render_status, MachineHandles, StatusDisplay};

/// Result of one liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Online,
    Offline,
}

impl Liveness {
    #[must_use]
    pub fn is_online(self) -> bool {
        self == Liveness::Online
    }
}

/// Ask the backend whether `address` is up.
///
/// Never fails: transport errors, non-2xx answers and malformed bodies all
/// count as [`Liveness::Offline`]. There is no retry here.
pub async fn check<A: PanelApi>(api: &A, address: &str) -> Liveness {
    match api.ping(address).await {
        Ok(response) if response.online => Liveness::Online,
        Ok(_) => Liveness::Offline,
        Err(e) => {
            debug!("Ping of {} failed, treating as offline: {}", address, e);
            Liveness::Offline
        }
    }
}

/// Run one check and render the result on the machine's status indicator.
pub async fn refresh_status<A: PanelApi>(api: &A, address: &str, handles: &MachineHandles) -> Liveness {
    let liveness = check(api, address).await;
    match liveness {
        Liveness::Online => render_status(handles, StatusDisplay::Online, labels::ONLINE),
        Liveness::Offline => render_status(handles, StatusDisplay::Offline, labels::OFFLINE),
    }
    liveness
}
