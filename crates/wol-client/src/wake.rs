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

//! Wake trigger: one wake request followed by the online wait.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::alert::{Notifier, Severity};
use crate::api::PanelApi;
use crate::poller::{OnlineWait, PollSettings, PollState};
use crate::status::{labels, render_status, MachineHandles, StatusDisplay};
use crate::Machine;

/// How a wake sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// The machine answered a liveness check.
    Online,
    /// The attempt budget ran out.
    TimedOut,
    /// The backend refused the wake request.
    Rejected(String),
    /// The wake request itself failed.
    RequestFailed(String),
    /// A newer sequence or an explicit cancel took over.
    Cancelled,
}

impl SequenceOutcome {
    #[must_use]
    pub fn is_online(&self) -> bool {
        matches!(self, SequenceOutcome::Online)
    }
}

/// One complete wake attempt for a machine.
pub struct WakeTrigger<A> {
    api: Arc<A>,
    machine: Machine,
    handles: MachineHandles,
    notifier: Arc<dyn Notifier>,
    settings: PollSettings,
    cancel: CancellationToken,
}

impl<A> std::fmt::Debug for WakeTrigger<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeTrigger")
            .field("machine", &self.machine)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<A: PanelApi> WakeTrigger<A> {
    pub fn new(
        api: Arc<A>,
        machine: Machine,
        handles: MachineHandles,
        notifier: Arc<dyn Notifier>,
        settings: PollSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            machine,
            handles,
            notifier,
            settings,
            cancel,
        }
    }

    /// Send the wake request and, if accepted, wait for the machine.
    ///
    /// The control stays disabled from the moment the request is submitted
    /// until the sequence reaches a terminal outcome.
    pub async fn run(self) -> SequenceOutcome {
        info!("Waking {} (mac {}, ip {})", self.machine.id, self.machine.mac, self.machine.ip);

        self.handles.hold_control(labels::BUTTON_SENDING);
        render_status(&self.handles, StatusDisplay::Checking, labels::SENDING);

        let request = self.machine.wake_request();
        let reply = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return SequenceOutcome::Cancelled,
            reply = self.api.wake(&request) => reply,
        };

        match reply {
            Ok(response) if response.success => {
                if let Some(message) = &response.message {
                    debug!("Backend accepted wake for {}: {}", self.machine.id, message);
                }
            }
            Ok(response) => {
                warn!(
                    "Backend refused wake for {}: {} (details: {}, message: {})",
                    self.machine.id,
                    response.error.as_deref().unwrap_or("no error text"),
                    response.details.as_deref().unwrap_or("none"),
                    response.message.as_deref().unwrap_or("none")
                );
                let reason = response.error.unwrap_or_else(|| labels::ALERT_WAKE_FALLBACK.to_string());
                self.notifier.notify(&format!("Erreur: {reason}"), Severity::Error);
                self.handles.release_control();
                render_status(&self.handles, StatusDisplay::Offline, labels::FAILED);
                return SequenceOutcome::Rejected(reason);
            }
            Err(e) => {
                warn!("Wake request for {} failed: {}", self.machine.id, e);
                self.notifier.notify(&format!("Erreur reseau: {e}"), Severity::Error);
                self.handles.release_control();
                render_status(&self.handles, StatusDisplay::Offline, labels::ERROR);
                return SequenceOutcome::RequestFailed(e.to_string());
            }
        }

        self.notifier.notify(labels::ALERT_WAKE_SENT, Severity::Success);
        render_status(&self.handles, StatusDisplay::Checking, labels::BOOTING);

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => return SequenceOutcome::Cancelled,
            () = tokio::time::sleep(self.settings.settle_delay) => {}
        }

        self.handles.control.set_label(labels::BUTTON_WAITING);

        let wait = OnlineWait::new(
            self.api,
            self.machine,
            self.handles,
            self.notifier,
            self.settings,
            self.cancel,
        );

        match wait.start().await {
            Some(PollState::Succeeded) => SequenceOutcome::Online,
            Some(_) => SequenceOutcome::TimedOut,
            None => SequenceOutcome::Cancelled,
        }
    }
}
