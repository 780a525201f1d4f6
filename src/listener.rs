use crate::constants::listener::SUBSCRIBE_GRACE;
use crate::error::ListenerError;
use crossbeam_channel::{bounded, RecvTimeoutError};
use rdev::{listen, Event, EventType, Key};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use tracing::{error, info};

/// A physical key press. Only its name is kept, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    key: String,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        KeyEvent { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl From<Key> for KeyEvent {
    fn from(key: Key) -> Self {
        KeyEvent::new(format!("{:?}", key))
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

pub type KeyCallback = Box<dyn Fn(KeyEvent) + Send + 'static>;

/// Something that delivers key presses to a callback until stopped.
pub trait KeySource: Send {
    fn start(&mut self, callback: KeyCallback) -> Result<(), ListenerError>;

    /// Must be idempotent and a no-op when never started.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerState {
    Idle,
    Running,
    Stopped,
}

/// System-wide keyboard listener backed by `rdev`.
///
/// The hook runs on its own `key-listener` thread and never returns, and the
/// OS offers no way to unsubscribe it. Stopping therefore closes a delivery
/// gate: the thread keeps receiving OS events but nothing reaches the callback.
pub struct InputListener {
    delivering: Arc<AtomicBool>,
    state: ListenerState,
}

impl InputListener {
    pub fn new() -> Self {
        InputListener {
            delivering: Arc::new(AtomicBool::new(false)),
            state: ListenerState::Idle,
        }
    }
}

impl Default for InputListener {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for InputListener {
    fn start(&mut self, callback: KeyCallback) -> Result<(), ListenerError> {
        match self.state {
            ListenerState::Running => return Ok(()),
            ListenerState::Stopped => return Err(ListenerError::Stopped),
            ListenerState::Idle => {}
        }

        let (err_tx, err_rx) = bounded::<String>(1);
        self.delivering.store(true, Ordering::SeqCst);

        let gate = Arc::clone(&self.delivering);
        thread::Builder::new()
            .name("key-listener".into())
            .spawn(move || {
                let result = listen(move |event: Event| {
                    if !gate.load(Ordering::SeqCst) {
                        return;
                    }
                    if let EventType::KeyPress(key) = event.event_type {
                        callback(KeyEvent::from(key));
                    }
                });

                if let Err(e) = result {
                    error!("keyboard hook error: {:?}", e);
                    let _ = err_tx.send(format!("{:?}", e));
                }
            })
            .map_err(|e| {
                self.delivering.store(false, Ordering::SeqCst);
                ListenerError::Spawn(e)
            })?;

        match err_rx.recv_timeout(SUBSCRIBE_GRACE) {
            // Still listening after the grace window
            Err(RecvTimeoutError::Timeout) => {
                self.state = ListenerState::Running;
                info!("keyboard listener started");
                Ok(())
            }
            Ok(reason) => {
                self.delivering.store(false, Ordering::SeqCst);
                Err(ListenerError::Subscribe(reason))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.delivering.store(false, Ordering::SeqCst);
                Err(ListenerError::Subscribe(
                    "keyboard hook exited without reporting an error".to_string(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        if self.state == ListenerState::Running {
            self.delivering.store(false, Ordering::SeqCst);
            self.state = ListenerState::Stopped;
            info!("keyboard listener stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.state == ListenerState::Running
    }
}

impl Drop for InputListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A source shared with the shutdown path. The lock is held for one call at a
/// time, so a `stop` from another thread only ever waits out a `start`.
impl<S: KeySource> KeySource for Arc<Mutex<S>> {
    fn start(&mut self, callback: KeyCallback) -> Result<(), ListenerError> {
        lock_source(self).start(callback)
    }

    fn stop(&mut self) {
        lock_source(self).stop();
    }

    fn is_running(&self) -> bool {
        lock_source(self).is_running()
    }
}

fn lock_source<S>(source: &Mutex<S>) -> MutexGuard<'_, S> {
    source.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_without_start_is_noop() {
        let mut listener = InputListener::new();
        listener.stop();
        assert!(!listener.is_running());
        assert_eq!(listener.state, ListenerState::Idle);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut listener = InputListener::new();
        // Pretend the hook came up
        listener.state = ListenerState::Running;
        listener.delivering.store(true, Ordering::SeqCst);

        listener.stop();
        listener.stop();

        assert!(!listener.is_running());
        assert_eq!(listener.state, ListenerState::Stopped);
        assert!(!listener.delivering.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cannot_restart_after_stop() {
        let mut listener = InputListener::new();
        listener.state = ListenerState::Stopped;

        let result = listener.start(Box::new(|_| {}));
        assert!(matches!(result, Err(ListenerError::Stopped)));
    }

    #[test]
    fn test_shared_listener_delegates_to_inner() {
        let mut shared = Arc::new(Mutex::new(InputListener::new()));
        shared.stop();
        assert!(!shared.is_running());
        assert_eq!(shared.lock().unwrap().state, ListenerState::Idle);

        shared.lock().unwrap().state = ListenerState::Stopped;
        let result = shared.start(Box::new(|_| {}));
        assert!(matches!(result, Err(ListenerError::Stopped)));
    }

    #[test]
    fn test_key_event_name() {
        assert_eq!(KeyEvent::from(Key::KeyK).key(), "KeyK");
        assert_eq!(KeyEvent::new("Space").to_string(), "Space");
    }
}
