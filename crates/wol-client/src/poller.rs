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

//! Online-wait poller.
//!
//! After a wake packet has gone out, the poller checks the machine's liveness
//! once per interval until it answers or the attempt budget is spent. The
//! decisions live in [`PollState`]; [`OnlineWait`] executes them against the
//! backend and the machine's handles.
//!
//! Failed checks in the middle of a sequence are silent. Only the terminal
//! states produce a notification.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::alert::{Notifier, Severity};
use crate::api::PanelApi;
use crate::liveness::{self, Liveness};
use crate::status::{labels, render_status, MachineHandles, StatusDisplay};
use crate::Machine;

/// Default attempt budget (one minute at the default interval).
pub const MAX_ATTEMPTS: u32 = 60;

/// Default pause between two checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default pause between a successful wake request and the first check.
pub const SETTLE_DELAY: Duration = Duration::from_millis(2000);

/// Timing of a wake sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub settle_delay: Duration,
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            interval: POLL_INTERVAL,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// State of one poll sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling { attempt: u32 },
    Succeeded,
    TimedOut,
}

impl PollState {
    /// Entry state of every sequence.
    #[must_use]
    pub fn start() -> Self {
        PollState::Polling { attempt: 0 }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollState::Polling { .. })
    }

    /// A polling state whose attempt count has reached `max_attempts` times
    /// out without another check.
    #[must_use]
    pub fn enforce_budget(self, max_attempts: u32) -> Self {
        match self {
            PollState::Polling { attempt } if attempt >= max_attempts => PollState::TimedOut,
            other => other,
        }
    }

    /// Apply one liveness result to a polling state.
    #[must_use]
    pub fn apply(self, liveness: Liveness) -> Self {
        match (self, liveness) {
            (PollState::Polling { .. }, Liveness::Online) => PollState::Succeeded,
            (PollState::Polling { attempt }, Liveness::Offline) => PollState::Polling { attempt: attempt + 1 },
            (terminal, _) => terminal,
        }
    }
}

/// Drives the poll sequence for one machine.
pub struct OnlineWait<A> {
    api: Arc<A>,
    machine: Machine,
    handles: MachineHandles,
    notifier: Arc<dyn Notifier>,
    settings: PollSettings,
    cancel: CancellationToken,
}

impl<A> std::fmt::Debug for OnlineWait<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnlineWait")
            .field("machine", &self.machine.id)
            .field("settings", &self.settings)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<A: PanelApi> OnlineWait<A> {
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

    /// Run a fresh sequence from attempt 0.
    ///
    /// Returns the terminal state, or `None` if the sequence was cancelled.
    pub async fn start(&self) -> Option<PollState> {
        self.run_from(0).await
    }

    /// Run the sequence starting at `attempt`.
    pub async fn run_from(&self, attempt: u32) -> Option<PollState> {
        let mut state = PollState::Polling { attempt };

        loop {
            state = state.enforce_budget(self.settings.max_attempts);
            let PollState::Polling { attempt } = state else {
                break;
            };

            let liveness = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                liveness = liveness::check(self.api.as_ref(), &self.machine.ip) => liveness,
            };

            state = state.apply(liveness);
            if state.is_terminal() {
                break;
            }

            debug!(
                "{} still offline after attempt {}/{}",
                self.machine.id,
                attempt + 1,
                self.settings.max_attempts
            );

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                () = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        if self.cancel.is_cancelled() {
            return None;
        }

        self.finish(state);
        Some(state)
    }

    fn finish(&self, state: PollState) {
        match state {
            PollState::Succeeded => {
                info!("{} ({}) is online", self.machine.id, self.machine.ip);
                self.notifier.notify(labels::ALERT_ONLINE, Severity::Success);
                self.handles.release_control();
                render_status(&self.handles, StatusDisplay::Online, labels::ONLINE);
            }
            PollState::TimedOut => {
                info!(
                    "{} ({}) did not come online after {} attempts",
                    self.machine.id, self.machine.ip, self.settings.max_attempts
                );
                self.notifier.notify(labels::ALERT_TIMEOUT, Severity::Warning);
                self.handles.release_control();
                render_status(&self.handles, StatusDisplay::Offline, labels::TIMEOUT);
            }
            PollState::Polling { .. } => {}
        }
    }
}
