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

//! Per-machine lifecycle of wake sequences.
//!
//! Each machine owns at most one running sequence. Starting a new wake for a
//! machine cancels the previous sequence before the new one touches the UI.
//!
//! Sequences and refreshes never write to the UI directly. They get handles
//! wrapped in a [`Lease`] that checks, under the controller lock, that the
//! writer still owns the machine. A stale sequence or a late refresh therefore
//! cannot overwrite the state of a fresh sequence. Handle callbacks must not
//! call back into the controller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alert::{Notifier, Severity};
use crate::api::PanelApi;
use crate::liveness::{self, Liveness};
use crate::poller::PollSettings;
use crate::status::{labels, render_status, ActionControl, MachineHandles, StatusDisplay, StatusIndicator};
use crate::wake::{SequenceOutcome, WakeTrigger};
use crate::Machine;

struct ActiveSequence {
    cancel_token: CancellationToken,
    handles: MachineHandles,
    address: String,
}

/// Ownership record for one machine.
///
/// `generation` changes on every wake and every cancel, so any lease taken
/// before that point goes stale.
#[derive(Default)]
struct MachineSlot {
    generation: u64,
    active: Option<ActiveSequence>,
}

type SlotMap = Arc<Mutex<HashMap<String, MachineSlot>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeaseKind {
    /// Owns the machine until the generation moves on.
    Sequence,
    /// Only writes while no sequence is running.
    Refresh,
}

/// Right to write one machine's UI, valid while its generation is current.
#[derive(Clone)]
struct Lease {
    slots: SlotMap,
    machine_id: String,
    generation: u64,
    kind: LeaseKind,
}

impl Lease {
    /// Run `write` only if the lease is still current, holding the lock
    /// across the write so ownership cannot change halfway.
    fn write(&self, write: impl FnOnce()) {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let current = slots.get(&self.machine_id).is_some_and(|slot| {
            slot.generation == self.generation
                && (self.kind == LeaseKind::Sequence || slot.active.is_none())
        });

        if current {
            write();
        } else {
            debug!("Dropping stale {:?} update for {}", self.kind, self.machine_id);
        }
    }

    fn guard_handles(&self, handles: &MachineHandles) -> MachineHandles {
        MachineHandles {
            status: handles.status.clone().map(|inner| {
                Arc::new(Leased {
                    lease: self.clone(),
                    inner,
                }) as Arc<dyn StatusIndicator>
            }),
            control: Arc::new(Leased {
                lease: self.clone(),
                inner: handles.control.clone(),
            }),
        }
    }

    fn guard_notifier(&self, notifier: &Arc<dyn Notifier>) -> Arc<dyn Notifier> {
        Arc::new(Leased {
            lease: self.clone(),
            inner: notifier.clone(),
        })
    }
}

/// A UI handle whose writes go through a [`Lease`].
struct Leased<T: ?Sized> {
    lease: Lease,
    inner: Arc<T>,
}

impl StatusIndicator for Leased<dyn StatusIndicator> {
    fn set_status(&self, status: StatusDisplay, label: &str) {
        self.lease.write(|| self.inner.set_status(status, label));
    }
}

impl ActionControl for Leased<dyn ActionControl> {
    fn set_enabled(&self, enabled: bool) {
        self.lease.write(|| self.inner.set_enabled(enabled));
    }

    fn set_label(&self, label: &str) {
        self.lease.write(|| self.inner.set_label(label));
    }
}

impl Notifier for Leased<dyn Notifier> {
    fn notify(&self, message: &str, severity: Severity) {
        self.lease.write(|| self.inner.notify(message, severity));
    }
}

/// Starts, replaces and cancels wake sequences.
///
/// Spawning uses the ambient tokio runtime, so the controller must be used
/// from within a runtime context.
pub struct WakeController<A> {
    api: Arc<A>,
    notifier: Arc<dyn Notifier>,
    settings: PollSettings,
    slots: SlotMap,
    next_generation: AtomicU64,
}

impl<A> std::fmt::Debug for WakeController<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeController")
            .field("settings", &self.settings)
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

impl<A: PanelApi> WakeController<A> {
    pub fn new(api: Arc<A>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_settings(api, notifier, PollSettings::default())
    }

    pub fn with_settings(api: Arc<A>, notifier: Arc<dyn Notifier>, settings: PollSettings) -> Self {
        Self {
            api,
            notifier,
            settings,
            slots: Arc::new(Mutex::new(HashMap::new())),
            // Slots start at generation 0, so every issued generation is newer.
            next_generation: AtomicU64::new(1),
        }
    }

    /// Start a wake sequence for `machine`, replacing any running one.
    pub fn wake(&self, machine: &Machine, handles: MachineHandles) -> JoinHandle<SequenceOutcome> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel_token = CancellationToken::new();

        {
            let mut slots = self.lock_slots();
            let slot = slots.entry(machine.id.clone()).or_default();
            slot.generation = generation;
            let previous = slot.active.replace(ActiveSequence {
                cancel_token: cancel_token.clone(),
                handles: handles.clone(),
                address: machine.ip.clone(),
            });
            if let Some(previous) = previous {
                info!("Replacing running wake sequence for {}", machine.id);
                previous.cancel_token.cancel();
            }
        }

        let lease = Lease {
            slots: self.slots.clone(),
            machine_id: machine.id.clone(),
            generation,
            kind: LeaseKind::Sequence,
        };
        let trigger = WakeTrigger::new(
            self.api.clone(),
            machine.clone(),
            lease.guard_handles(&handles),
            lease.guard_notifier(&self.notifier),
            self.settings,
            cancel_token,
        );
        let slots = self.slots.clone();
        let machine_id = machine.id.clone();

        tokio::spawn(async move {
            let outcome = trigger.run().await;
            debug!("Wake sequence for {} ended: {:?}", machine_id, outcome);

            let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = slots.get_mut(&machine_id) {
                if slot.generation == generation {
                    slot.active = None;
                }
            }
            outcome
        })
    }

    /// Run a single liveness check and render it.
    ///
    /// The result is dropped if a wake starts for the machine before the
    /// check answers.
    pub fn refresh(&self, machine: &Machine, handles: MachineHandles) -> JoinHandle<Liveness> {
        self.spawn_refresh(machine.id.clone(), machine.ip.clone(), handles)
    }

    /// Cancel the running sequence for `machine_id`. Returns whether one existed.
    ///
    /// The control is released right away and the machine is checked again.
    pub fn cancel(&self, machine_id: &str) -> bool {
        let cancelled = {
            let mut slots = self.lock_slots();
            slots.get_mut(machine_id).and_then(|slot| self.release_slot(machine_id, slot))
        };

        match cancelled {
            Some((address, handles)) => {
                self.spawn_refresh(machine_id.to_string(), address, handles);
                true
            }
            None => false,
        }
    }

    /// Cancel every running sequence, releasing each control.
    pub fn cancel_all(&self) {
        let cancelled: Vec<_> = {
            let mut slots = self.lock_slots();
            slots
                .iter_mut()
                .filter_map(|(id, slot)| {
                    self.release_slot(id, slot)
                        .map(|(address, handles)| (id.clone(), address, handles))
                })
                .collect()
        };

        for (machine_id, address, handles) in cancelled {
            self.spawn_refresh(machine_id, address, handles);
        }
    }

    #[must_use]
    pub fn is_active(&self, machine_id: &str) -> bool {
        self.lock_slots()
            .get(machine_id)
            .is_some_and(|slot| slot.active.is_some())
    }

    /// Stop the slot's sequence and reset its UI. Called with the lock held.
    fn release_slot(&self, machine_id: &str, slot: &mut MachineSlot) -> Option<(String, MachineHandles)> {
        let active = slot.active.take()?;
        slot.generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        info!("Cancelling wake sequence for {}", machine_id);
        active.cancel_token.cancel();
        active.handles.release_control();
        render_status(&active.handles, StatusDisplay::Checking, labels::CHECKING);

        Some((active.address, active.handles))
    }

    fn spawn_refresh(&self, machine_id: String, address: String, handles: MachineHandles) -> JoinHandle<Liveness> {
        let generation = self.lock_slots().entry(machine_id.clone()).or_default().generation;
        let lease = Lease {
            slots: self.slots.clone(),
            machine_id,
            generation,
            kind: LeaseKind::Refresh,
        };
        let handles = lease.guard_handles(&handles);
        let api = self.api.clone();

        tokio::spawn(async move { liveness::refresh_status(api.as_ref(), &address, &handles).await })
    }
}

impl<A> WakeController<A> {
    /// Number of running sequences.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock_slots().values().filter(|slot| slot.active.is_some()).count()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, MachineSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A> Drop for WakeController<A> {
    fn drop(&mut self) {
        let slots = self.lock_slots();
        let active: Vec<_> = slots.values().filter_map(|slot| slot.active.as_ref()).collect();
        if !active.is_empty() {
            info!("Shutting down WakeController - cancelling {} sequences", active.len());
        }
        for sequence in active {
            sequence.cancel_token.cancel();
        }
    }
}
