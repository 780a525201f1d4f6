use crate::constants::settings::DEFAULT_DEBOUNCE_DELAY;
use crate::error::{ConfigError, StoreError, UpdateError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Minimum seconds between two accepted key presses
    #[serde(default = "default_debounce_delay")]
    pub debounce_delay: f64,
}

fn default_debounce_delay() -> f64 {
    DEFAULT_DEBOUNCE_DELAY
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            debounce_delay: default_debounce_delay(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.debounce_delay.is_finite() {
            return Err(ValidationError::NotANumber);
        }
        if self.debounce_delay < 0.0 {
            return Err(ValidationError::Negative);
        }
        Ok(())
    }
}

/// Partial settings update as received from the front-end.
///
/// Values are kept raw so coercion errors can be reported precisely;
/// an explicit `null` counts as a provided (and invalid) value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub debounce_delay: Option<Value>,
}

impl SettingsPatch {
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let object = body.as_object().ok_or(ValidationError::NotAnObject)?;
        Ok(SettingsPatch {
            debounce_delay: object.get("debounce_delay").cloned(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.debounce_delay.is_none()
    }

    /// Merge onto `current`, validating every provided field.
    pub fn apply(&self, current: &Settings) -> Result<Settings, ValidationError> {
        let mut next = *current;
        if let Some(raw) = &self.debounce_delay {
            next.debounce_delay = coerce_delay(raw)?;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Numbers and numeric strings are accepted, anything else is not a number.
pub fn coerce_delay(raw: &Value) -> Result<f64, ValidationError> {
    let value = match raw {
        Value::Number(number) => number.as_f64().ok_or(ValidationError::NotANumber)?,
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| ValidationError::NotANumber)?,
        _ => return Err(ValidationError::NotANumber),
    };

    if !value.is_finite() {
        return Err(ValidationError::NotANumber);
    }
    if value < 0.0 {
        return Err(ValidationError::Negative);
    }
    Ok(value)
}

/// File-backed settings. The file is authoritative; callers cache what they need.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SettingsStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Settings, ConfigError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let settings: Settings =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;

        if settings.validate().is_err() {
            return Err(ConfigError::Invalid {
                path: self.path.clone(),
                value: settings.debounce_delay,
            });
        }

        Ok(settings)
    }

    /// Like [`load`](Self::load), but a broken file degrades to defaults.
    pub fn load_or_default(&self) -> Settings {
        match self.load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "using default settings");
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Validate, persist and return the new effective settings.
    /// Nothing is written when validation fails or the patch is empty.
    pub fn update(&self, patch: &SettingsPatch) -> Result<Settings, UpdateError> {
        let current = self.load_or_default();
        if patch.is_empty() {
            return Ok(current);
        }

        let next = patch.apply(&current)?;
        self.save(&next)?;
        info!(debounce_delay = next.debounce_delay, "settings updated");
        Ok(next)
    }
}
