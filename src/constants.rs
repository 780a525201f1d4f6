/// Application-wide constants for the HTTP surface, settings, audio and keyboard handling

pub mod server {
    /// Fixed port the desktop front-end talks to
    pub const BACKEND_PORT: u16 = 8000;

    pub const BANNER_MESSAGE: &str = "Hello from the lizard backend!";
}

pub mod settings {
    /// Debounce delay used when no settings file exists (seconds)
    pub const DEFAULT_DEBOUNCE_DELAY: f64 = 0.3;

    pub const SETTINGS_FILE_NAME: &str = "settings.json";

    /// Directory name under the platform config dir for bundled builds
    pub const APP_DIR_NAME: &str = "lizard-backend";
}

pub mod sound {
    pub const SOUND_FILE_NAME: &str = "lizard.wav";
    pub const SOUNDS_DIR_NAME: &str = "sounds";
}

pub mod listener {
    use std::time::Duration;

    /// How long `start` waits for the OS hook to report a subscription error.
    /// The hook never signals success, so silence past this window means subscribed.
    pub const SUBSCRIBE_GRACE: Duration = Duration::from_millis(250);
}
