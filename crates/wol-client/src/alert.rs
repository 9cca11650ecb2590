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

//! Transient user notifications.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::time::Instant;

/// How long a notification stays fully visible.
pub const ALERT_DISPLAY: Duration = Duration::from_millis(5000);

/// Fade-out duration after [`ALERT_DISPLAY`] has elapsed.
pub const ALERT_FADE: Duration = Duration::from_millis(500);

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Warning,
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// A notification as it should currently be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleAlert {
    pub message: String,
    pub severity: Severity,
    /// 1.0 while displayed, falling linearly to 0.0 during the fade.
    pub opacity: f32,
}

#[derive(Debug)]
struct PostedAlert {
    message: String,
    severity: Severity,
    posted_at: Instant,
}

/// Single-slot notification board.
///
/// Posting replaces whatever is shown. The slot empties itself once the
/// display and fade periods are over.
#[derive(Debug, Default)]
pub struct AlertBoard {
    slot: Mutex<Option<PostedAlert>>,
}

impl AlertBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current notification.
    pub fn show(&self, message: &str, severity: Severity) {
        debug!("alert [{}] {}", severity.as_str(), message);
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(PostedAlert {
            message: message.to_string(),
            severity,
            posted_at: Instant::now(),
        });
    }

    /// The notification visible right now, if any.
    pub fn current(&self) -> Option<VisibleAlert> {
        self.current_at(Instant::now())
    }

    /// The notification visible at `now`. Expired notifications are dropped.
    pub fn current_at(&self, now: Instant) -> Option<VisibleAlert> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let posted = slot.as_ref()?;

        match opacity_after(now.saturating_duration_since(posted.posted_at)) {
            Some(opacity) => Some(VisibleAlert {
                message: posted.message.clone(),
                severity: posted.severity,
                opacity,
            }),
            None => {
                *slot = None;
                None
            }
        }
    }

    /// Remove the current notification immediately.
    pub fn dismiss(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Notifier for AlertBoard {
    fn notify(&self, message: &str, severity: Severity) {
        self.show(message, severity);
    }
}

fn opacity_after(elapsed: Duration) -> Option<f32> {
    if elapsed < ALERT_DISPLAY {
        return Some(1.0);
    }

    let fading = elapsed - ALERT_DISPLAY;
    if fading < ALERT_FADE {
        Some(1.0 - fading.as_secs_f32() / ALERT_FADE.as_secs_f32())
    } else {
        None
    }
}
