// Background initialization driven with fake audio and keyboard backends
use lizard_backend::error::{AudioLoadError, InitError, ListenerError};
use lizard_backend::listener::{KeyCallback, KeyEvent, KeySource};
use lizard_backend::sound::Playback;
use lizard_backend::startup::initialize;
use lizard_backend::state::{InitPhase, RuntimeState};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CountingPlayer {
    plays: AtomicUsize,
}

impl Playback for CountingPlayer {
    fn play(&self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }
}

/// Keeps the callback so tests can inject key presses by hand
#[derive(Default)]
struct FakeKeySource {
    callback: Option<KeyCallback>,
    fail_with: Option<String>,
    stopped: bool,
}

impl FakeKeySource {
    fn failing(reason: &str) -> Self {
        FakeKeySource {
            fail_with: Some(reason.to_string()),
            ..Default::default()
        }
    }

    fn press(&self, key: &str) {
        if self.stopped {
            return;
        }
        if let Some(callback) = &self.callback {
            callback(KeyEvent::new(key));
        }
    }
}

impl KeySource for FakeKeySource {
    fn start(&mut self, callback: KeyCallback) -> Result<(), ListenerError> {
        if let Some(reason) = &self.fail_with {
            return Err(ListenerError::Subscribe(reason.clone()));
        }
        self.callback = Some(callback);
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn is_running(&self) -> bool {
        self.callback.is_some() && !self.stopped
    }
}

#[test]
fn test_ready_after_both_steps() {
    let state = Arc::new(RuntimeState::new(0.0));
    let mut source = FakeKeySource::default();

    let player = initialize(&state, || Ok(CountingPlayer::default()), &mut source).unwrap();

    assert_eq!(state.phase(), InitPhase::Ready);
    assert!(source.is_running());

    source.press("KeyA");
    assert_eq!(player.plays.load(Ordering::SeqCst), 1);
}

#[test]
fn test_audio_failure_leaves_backend_not_ready() {
    let state = Arc::new(RuntimeState::default());
    let mut source = FakeKeySource::default();

    let result = initialize::<CountingPlayer, _, _>(
        &state,
        || Err(AudioLoadError::Empty(PathBuf::from("lizard.wav"))),
        &mut source,
    );

    assert!(matches!(result, Err(InitError::Audio(_))));
    assert!(matches!(state.phase(), InitPhase::Failed(_)));
    assert!(!state.is_ready());
    // Listener is never subscribed when the sound is unavailable
    assert!(!source.is_running());
}

#[test]
fn test_listener_failure_leaves_backend_not_ready() {
    let state = Arc::new(RuntimeState::default());
    let mut source = FakeKeySource::failing("permission denied");

    let result = initialize(&state, || Ok(CountingPlayer::default()), &mut source);

    assert!(matches!(result, Err(InitError::Listener(ListenerError::Subscribe(_)))));
    match state.phase() {
        InitPhase::Failed(reason) => assert!(reason.contains("permission denied")),
        other => panic!("Expected Failed phase, got {:?}", other),
    }
}

#[test]
fn test_initialization_runs_once() {
    let state = Arc::new(RuntimeState::default());
    let mut source = FakeKeySource::default();
    initialize(&state, || Ok(CountingPlayer::default()), &mut source).unwrap();

    let mut second = FakeKeySource::default();
    let result = initialize(&state, || Ok(CountingPlayer::default()), &mut second);

    assert!(matches!(result, Err(InitError::AlreadyStarted)));
    assert_eq!(state.phase(), InitPhase::Ready);
    assert!(!second.is_running());
}

#[test]
fn test_toggle_off_silences_live_listener() {
    let state = Arc::new(RuntimeState::new(0.0));
    let mut source = FakeKeySource::default();
    let player = initialize(&state, || Ok(CountingPlayer::default()), &mut source).unwrap();

    state.toggle();
    source.press("KeyK");
    assert_eq!(player.plays.load(Ordering::SeqCst), 0);

    state.toggle();
    source.press("KeyK");
    assert_eq!(player.plays.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stopped_source_delivers_nothing() {
    let state = Arc::new(RuntimeState::new(0.0));
    let mut source = FakeKeySource::default();
    let player = initialize(&state, || Ok(CountingPlayer::default()), &mut source).unwrap();

    source.stop();
    source.stop();
    source.press("Space");

    assert!(!source.is_running());
    assert_eq!(player.plays.load(Ordering::SeqCst), 0);
}

#[test]
fn test_shared_source_unlocked_while_sound_loads() {
    let state = Arc::new(RuntimeState::new(0.0));
    let mut shared = Arc::new(Mutex::new(FakeKeySource::default()));
    let observer = Arc::clone(&shared);

    let player = initialize(
        &state,
        || {
            // Shutdown must be able to reach the listener during this step
            assert!(observer.try_lock().is_ok());
            Ok(CountingPlayer::default())
        },
        &mut shared,
    )
    .unwrap();

    assert_eq!(state.phase(), InitPhase::Ready);
    assert!(shared.is_running());

    shared.lock().unwrap().press("KeyZ");
    assert_eq!(player.plays.load(Ordering::SeqCst), 1);

    shared.stop();
    shared.lock().unwrap().press("KeyZ");
    assert_eq!(player.plays.load(Ordering::SeqCst), 1);
}
