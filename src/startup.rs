//! Background initialization of the sound player and keyboard listener.
//!
//! The HTTP server is already accepting requests while this runs. Progress is
//! published through [`RuntimeState`]'s phase; a failure is terminal and only
//! a process restart retries.

use crate::error::{AudioLoadError, InitError};
use crate::listener::{InputListener, KeySource};
use crate::sound::{Playback, SoundPlayer};
use crate::state::{now_epoch_secs, on_key_event, RuntimeState};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Load the sound, then subscribe to key presses. `Ready` only once both succeed.
///
/// Returns the loaded player so the caller can keep it alive.
pub fn initialize<P, F, S>(
    state: &Arc<RuntimeState>,
    load_player: F,
    source: &mut S,
) -> Result<Arc<P>, InitError>
where
    P: Playback + 'static,
    F: FnOnce() -> Result<P, AudioLoadError>,
    S: KeySource + ?Sized,
{
    if !state.begin_init() {
        return Err(InitError::AlreadyStarted);
    }

    let result = run_steps(state, load_player, source);
    match &result {
        Ok(_) => state.mark_ready(),
        Err(e) => state.mark_failed(e.to_string()),
    }
    result
}

fn run_steps<P, F, S>(
    state: &Arc<RuntimeState>,
    load_player: F,
    source: &mut S,
) -> Result<Arc<P>, InitError>
where
    P: Playback + 'static,
    F: FnOnce() -> Result<P, AudioLoadError>,
    S: KeySource + ?Sized,
{
    let player = Arc::new(load_player()?);

    let callback_state = Arc::clone(state);
    let callback_player = Arc::clone(&player);
    source.start(Box::new(move |event| {
        on_key_event(&callback_state, &*callback_player, &event, now_epoch_secs());
    }))?;

    Ok(player)
}

/// Run [`initialize`] with the real player and listener on a `backend-init` thread.
///
/// The listener stays shared with the caller so shutdown can stop it. The
/// player is kept alive by the listener's callback.
pub fn spawn_initializer(
    state: Arc<RuntimeState>,
    sound_file: PathBuf,
    mut listener: Arc<Mutex<InputListener>>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("backend-init".into())
        .spawn(move || {
            info!(sound = %sound_file.display(), "starting background initialization");

            // Locked per call, so shutdown isn't held up while the device opens
            if let Err(e) = initialize(&state, || SoundPlayer::load(&sound_file), &mut listener) {
                error!("background initialization failed: {}", e);
            }
        })
}
