//! Where the sound resource and the settings file live.
//!
//! Development builds read everything from the crate checkout. Bundled builds
//! ship the sound next to the executable and keep settings in the platform
//! config directory, which is writable even when the install location is not.

use crate::constants::settings::{APP_DIR_NAME, SETTINGS_FILE_NAME};
use crate::constants::sound::{SOUNDS_DIR_NAME, SOUND_FILE_NAME};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Development,
    Bundled,
}

impl RunMode {
    pub fn current() -> Self {
        if cfg!(debug_assertions) {
            RunMode::Development
        } else {
            RunMode::Bundled
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Development => "development",
            RunMode::Bundled => "bundled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub mode: RunMode,
    pub sound_file: PathBuf,
    pub settings_file: PathBuf,
}

impl Layout {
    /// Resolve paths for the current build, honoring explicit overrides.
    pub fn resolve(sound_override: Option<PathBuf>, settings_override: Option<PathBuf>) -> Result<Self> {
        let mode = RunMode::current();

        let sound_file = match sound_override {
            Some(path) => path,
            None => match mode {
                RunMode::Development => dev_root().join("assets").join(SOUNDS_DIR_NAME).join(SOUND_FILE_NAME),
                RunMode::Bundled => {
                    let exe_dir = executable_dir()?;
                    find_bundled_sound(&exe_dir)
                        .unwrap_or_else(|| exe_dir.join(SOUNDS_DIR_NAME).join(SOUND_FILE_NAME))
                }
            },
        };

        let settings_file = match settings_override {
            Some(path) => path,
            None => match mode {
                RunMode::Development => dev_root().join("data").join(SETTINGS_FILE_NAME),
                RunMode::Bundled => bundled_config_dir()?.join(SETTINGS_FILE_NAME),
            },
        };

        Ok(Layout {
            mode,
            sound_file,
            settings_file,
        })
    }
}

fn dev_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate current executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("Executable has no parent directory")
}

fn bundled_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Failed to get config directory")?;
    Ok(base.join(APP_DIR_NAME))
}

/// Places an installer may have put the sounds directory, relative to the executable.
pub fn bundled_sound_candidates(exe_dir: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![
        exe_dir.join(SOUNDS_DIR_NAME).join(SOUND_FILE_NAME),
        exe_dir.join("resources").join(SOUNDS_DIR_NAME).join(SOUND_FILE_NAME),
    ];
    // macOS app bundle: Contents/MacOS/<exe> next to Contents/Resources
    if let Some(contents) = exe_dir.parent() {
        candidates.push(contents.join("Resources").join(SOUNDS_DIR_NAME).join(SOUND_FILE_NAME));
    }
    candidates
}

pub fn find_bundled_sound(exe_dir: &Path) -> Option<PathBuf> {
    bundled_sound_candidates(exe_dir)
        .into_iter()
        .find(|path| path.is_file())
}
