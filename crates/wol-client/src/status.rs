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

//! Per-machine UI handles and the status renderer.
//!
//! A frontend hands the library one [`MachineHandles`] bundle per machine:
//! an optional status indicator and the wake control. [`MachineView`] is a
//! ready-made shared implementation of both that frontends can draw from.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};

/// Fixed UI strings.
pub mod labels {
    pub const CHECKING: &str = "Verification...";
    pub const ONLINE: &str = "En ligne";
    pub const OFFLINE: &str = "Hors ligne";
    pub const SENDING: &str = "Envoi WOL...";
    pub const BOOTING: &str = "Demarrage...";
    pub const FAILED: &str = "Echec";
    pub const ERROR: &str = "Erreur";
    pub const TIMEOUT: &str = "Timeout";

    pub const BUTTON_IDLE: &str = "Reveiller";
    pub const BUTTON_SENDING: &str = "Envoi du paquet WOL...";
    pub const BUTTON_WAITING: &str = "Attente du demarrage...";

    pub const ALERT_WAKE_SENT: &str = "Paquet WOL envoye avec succes!";
    pub const ALERT_WAKE_FALLBACK: &str = "Echec de envoi";
    pub const ALERT_ONLINE: &str = "Machine demarree et accessible!";
    pub const ALERT_TIMEOUT: &str = "Timeout: La machine na pas demarre apres 60 secondes";
}

/// Status category shown next to a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDisplay {
    Checking,
    Online,
    Offline,
}

impl StatusDisplay {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusDisplay::Checking => "checking",
            StatusDisplay::Online => "online",
            StatusDisplay::Offline => "offline",
        }
    }
}

/// Something that displays a machine's status.
pub trait StatusIndicator: Send + Sync {
    fn set_status(&self, status: StatusDisplay, label: &str);
}

/// The control that triggers a wake.
pub trait ActionControl: Send + Sync {
    fn set_enabled(&self, enabled: bool);
    fn set_label(&self, label: &str);
}

/// Handles for one machine's UI elements.
#[derive(Clone)]
pub struct MachineHandles {
    pub status: Option<Arc<dyn StatusIndicator>>,
    pub control: Arc<dyn ActionControl>,
}

impl fmt::Debug for MachineHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineHandles")
            .field("has_status", &self.status.is_some())
            .finish_non_exhaustive()
    }
}

impl MachineHandles {
    /// Disable the control and show `label` on it.
    pub fn hold_control(&self, label: &str) {
        self.control.set_enabled(false);
        self.control.set_label(label);
    }

    /// Re-enable the control with its idle label.
    pub fn release_control(&self) {
        self.control.set_enabled(true);
        self.control.set_label(labels::BUTTON_IDLE);
    }
}

/// Update the status indicator, if the machine has one.
pub fn render_status(handles: &MachineHandles, status: StatusDisplay, label: &str) {
    if let Some(indicator) = &handles.status {
        indicator.set_status(status, label);
    }
}

/// Point-in-time copy of a [`MachineView`].
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSnapshot {
    pub status: StatusDisplay,
    pub status_label: String,
    pub control_enabled: bool,
    pub control_label: String,
    pub changed_at: DateTime<Local>,
}

impl Default for MachineSnapshot {
    fn default() -> Self {
        Self {
            status: StatusDisplay::Checking,
            status_label: labels::CHECKING.to_string(),
            control_enabled: true,
            control_label: labels::BUTTON_IDLE.to_string(),
            changed_at: Local::now(),
        }
    }
}

type ChangeObserver = Box<dyn Fn(&MachineSnapshot) + Send + Sync>;

/// Shared status and control state for one machine.
///
/// An optional observer runs after every change, which is how the desktop
/// panel requests a repaint and the command line prints progress.
#[derive(Default)]
pub struct MachineView {
    state: Mutex<MachineSnapshot>,
    observer: Option<ChangeObserver>,
}

impl fmt::Debug for MachineView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineView")
            .field("state", &self.snapshot())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl MachineView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: impl Fn(&MachineSnapshot) + Send + Sync + 'static) -> Self {
        Self {
            state: Mutex::default(),
            observer: Some(Box::new(observer)),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MachineSnapshot {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Handle bundle backed by this view.
    #[must_use]
    pub fn handles(self: &Arc<Self>) -> MachineHandles {
        MachineHandles {
            status: Some(self.clone()),
            control: self.clone(),
        }
    }

    fn update(&self, change: impl FnOnce(&mut MachineSnapshot)) {
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            change(&mut state);
            state.changed_at = Local::now();
            state.clone()
        };

        if let Some(observer) = &self.observer {
            observer(&snapshot);
        }
    }
}

impl StatusIndicator for MachineView {
    fn set_status(&self, status: StatusDisplay, label: &str) {
        self.update(|state| {
            state.status = status;
            state.status_label = label.to_string();
        });
    }
}

impl ActionControl for MachineView {
    fn set_enabled(&self, enabled: bool) {
        self.update(|state| state.control_enabled = enabled);
    }

    fn set_label(&self, label: &str) {
        self.update(|state| state.control_label = label.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_render_without_indicator_is_noop() {
        let view = Arc::new(MachineView::new());
        let handles = MachineHandles {
            status: None,
            control: view.clone(),
        };

        render_status(&handles, StatusDisplay::Online, labels::ONLINE);
        assert_eq!(view.snapshot().status, StatusDisplay::Checking);
        assert_eq!(view.snapshot().status_label, labels::CHECKING);
    }

    #[test]
    fn test_render_updates_view() {
        let view = Arc::new(MachineView::new());
        render_status(&view.handles(), StatusDisplay::Offline, labels::TIMEOUT);

        let snapshot = view.snapshot();
        assert_eq!(snapshot.status, StatusDisplay::Offline);
        assert_eq!(snapshot.status_label, "Timeout");
    }

    #[test]
    fn test_hold_and_release_control() {
        let view = Arc::new(MachineView::new());
        let handles = view.handles();

        handles.hold_control(labels::BUTTON_SENDING);
        let held = view.snapshot();
        assert!(!held.control_enabled);
        assert_eq!(held.control_label, labels::BUTTON_SENDING);

        handles.release_control();
        let released = view.snapshot();
        assert!(released.control_enabled);
        assert_eq!(released.control_label, labels::BUTTON_IDLE);
    }

    #[test]
    fn test_observer_called_on_every_change() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let view = Arc::new(MachineView::with_observer(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let handles = view.handles();
        handles.hold_control(labels::BUTTON_SENDING);
        render_status(&handles, StatusDisplay::Checking, labels::SENDING);

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
