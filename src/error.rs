use std::path::PathBuf;
use thiserror::Error;

/// Message returned to the front-end for any unusable debounce value
pub const DEBOUNCE_DELAY_MESSAGE: &str = "Debounce delay must be a non-negative number.";

/// Rejected settings input. Shown to the caller as `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{}", DEBOUNCE_DELAY_MESSAGE)]
    NotANumber,

    #[error("{}", DEBOUNCE_DELAY_MESSAGE)]
    Negative,

    #[error("Settings update must be a JSON object.")]
    NotAnObject,
}

/// The settings file exists but cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("settings file {path} holds an invalid debounce delay: {value}")]
    Invalid { path: PathBuf, value: f64 },
}

/// Writing the settings file failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum AudioLoadError {
    #[error("failed to open sound file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("failed to decode sound file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("sound file {0} contains no samples")]
    Empty(PathBuf),

    #[error("no audio output device available")]
    NoDevice,

    #[error("audio output device error: {0}")]
    Device(String),

    #[error("failed to start audio stream: {0}")]
    Stream(String),
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("keyboard hook subscription failed: {0}")]
    Subscribe(String),

    #[error("listener was stopped and cannot be restarted")]
    Stopped,

    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Why background initialization ended in the failed state.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Audio(#[from] AudioLoadError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("initialization already started")]
    AlreadyStarted,
}
