//! Process-wide runtime state shared by the HTTP handlers, the key listener
//! thread and the background initializer.
//!
//! Every mutable field has its own guard; there is no multi-field transaction.

use crate::debounce;
use crate::listener::KeyEvent;
use crate::sound::Playback;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    On,
    Off,
}

impl AppStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::On => "on",
            AppStatus::Off => "off",
        }
    }
}

/// Background initialization progress. `Ready` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitPhase {
    NotStarted,
    Initializing,
    Ready,
    Failed(String),
}

impl InitPhase {
    pub fn name(&self) -> &'static str {
        match self {
            InitPhase::NotStarted => "not_started",
            InitPhase::Initializing => "initializing",
            InitPhase::Ready => "ready",
            InitPhase::Failed(_) => "failed",
        }
    }
}

/// Outcome of one key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Played,
    Disabled,
    NotReady,
    Debounced,
}

pub struct RuntimeState {
    enabled: AtomicBool,
    phase: Mutex<InitPhase>,
    /// Epoch seconds of the last accepted trigger
    last_played: Mutex<f64>,
    /// Cached `f64` bits of the persisted debounce delay
    debounce_delay: AtomicU64,
}

impl RuntimeState {
    pub fn new(debounce_delay: f64) -> Self {
        RuntimeState {
            enabled: AtomicBool::new(true),
            phase: Mutex::new(InitPhase::NotStarted),
            last_played: Mutex::new(0.0),
            debounce_delay: AtomicU64::new(debounce_delay.to_bits()),
        }
    }

    pub fn app_status(&self) -> AppStatus {
        if self.enabled.load(Ordering::SeqCst) {
            AppStatus::On
        } else {
            AppStatus::Off
        }
    }

    /// Flip on/off and return the new status.
    pub fn toggle(&self) -> AppStatus {
        // fetch_xor returns the previous value
        let was_on = self.enabled.fetch_xor(true, Ordering::SeqCst);
        let status = if was_on { AppStatus::Off } else { AppStatus::On };
        info!(app_status = status.as_str(), "app status toggled");
        status
    }

    pub fn debounce_delay(&self) -> f64 {
        f64::from_bits(self.debounce_delay.load(Ordering::SeqCst))
    }

    pub fn set_debounce_delay(&self, delay: f64) {
        self.debounce_delay.store(delay.to_bits(), Ordering::SeqCst);
    }

    pub fn phase(&self) -> InitPhase {
        lock(&self.phase).clone()
    }

    pub fn is_ready(&self) -> bool {
        *lock(&self.phase) == InitPhase::Ready
    }

    /// `NotStarted -> Initializing`. Returns false if initialization already began.
    pub fn begin_init(&self) -> bool {
        let mut phase = lock(&self.phase);
        if *phase != InitPhase::NotStarted {
            return false;
        }
        *phase = InitPhase::Initializing;
        info!("backend initializing");
        true
    }

    pub fn mark_ready(&self) {
        let mut phase = lock(&self.phase);
        if *phase == InitPhase::Initializing {
            *phase = InitPhase::Ready;
            info!("backend ready");
        }
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        let mut phase = lock(&self.phase);
        if *phase == InitPhase::Initializing {
            let reason = reason.into();
            error!(%reason, "backend initialization failed, key presses will not play sound");
            *phase = InitPhase::Failed(reason);
        }
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        RuntimeState::new(crate::constants::settings::DEFAULT_DEBOUNCE_DELAY)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Plain scalars can't be left half-written, so a poisoned lock is still usable
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Decide whether a key press plays the sound, and play it if so.
///
/// `last_played` is checked and updated under a single lock so two events
/// racing each other can't both pass the gate.
pub fn on_key_event(state: &RuntimeState, player: &dyn Playback, event: &KeyEvent, now: f64) -> Trigger {
    debug!(key = %event, "key pressed");

    if state.app_status() == AppStatus::Off {
        return Trigger::Disabled;
    }
    if !state.is_ready() {
        return Trigger::NotReady;
    }

    let delay = state.debounce_delay();
    {
        let mut last = lock(&state.last_played);
        if !debounce::allow(now, *last, delay) {
            debug!(since_last = now - *last, delay, "debounced");
            return Trigger::Debounced;
        }
        *last = now;
    }

    player.play();
    Trigger::Played
}
