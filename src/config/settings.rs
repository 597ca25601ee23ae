//! User preference management with XDG Base Directory compliance.
//!
//! This module provides user settings management with proper XDG directory
//! usage for config and data files.

use std::{
    env::var,
    fs::{create_dir_all, read_to_string, write},
    io::Error as StdError,
    path::PathBuf,
    time::Duration,
};

use {
    parking_lot::{RwLock, RwLockReadGuard},
    serde::{Deserialize, Serialize},
    serde_json::{Error as SerdeJsonError, from_str, to_string_pretty},
    thiserror::Error,
    tracing::debug,
};

use crate::library::sort::{PlaylistSort, SortOrder, TrackSort};

/// Error type for settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read or write settings file.
    #[error("IO error: {0}")]
    IoError(#[from] StdError),
    /// Failed to serialize or deserialize settings.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerdeJsonError),
    /// Invalid settings value.
    #[error("Invalid settings value: {reason}")]
    InvalidValue { reason: String },
}

/// Serializable user settings structure with default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Whether "previous" restarts the current track once past the threshold.
    pub jump_to_beginning: bool,
    /// Position after which "previous" restarts instead of going back.
    pub jump_to_beginning_threshold_ms: u64,
    /// Interval between engine position reads while playing.
    pub position_poll_interval_ms: u64,
    /// Whether the engine should pause for other audio.
    pub handle_audio_focus: bool,
    /// Interval between checks for a bound engine at startup.
    pub engine_ready_poll_interval_ms: u64,
    /// Number of readiness checks before giving up.
    pub engine_ready_max_attempts: u32,
    /// Interval between library snapshot polls.
    pub library_refresh_interval_ms: u64,
    /// Track list sort key.
    pub track_sort: TrackSort,
    /// Track list sort direction.
    pub track_sort_order: SortOrder,
    /// Playlist sort key.
    pub playlist_sort: PlaylistSort,
    /// Playlist sort direction.
    pub playlist_sort_order: SortOrder,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            jump_to_beginning: true,
            jump_to_beginning_threshold_ms: 3000,
            position_poll_interval_ms: 50,
            handle_audio_focus: true,
            engine_ready_poll_interval_ms: 500,
            engine_ready_max_attempts: 120, // one minute at the default interval
            library_refresh_interval_ms: 5000,
            track_sort: TrackSort::default(),
            track_sort_order: SortOrder::default(),
            playlist_sort: PlaylistSort::default(),
            playlist_sort_order: SortOrder::default(),
        }
    }
}

impl UserSettings {
    /// Position polling interval as a `Duration`.
    #[must_use]
    pub fn position_poll_interval(&self) -> Duration {
        Duration::from_millis(self.position_poll_interval_ms)
    }

    /// Engine readiness polling interval as a `Duration`.
    #[must_use]
    pub fn engine_ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.engine_ready_poll_interval_ms)
    }

    /// Library refresh interval as a `Duration`.
    #[must_use]
    pub fn library_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.library_refresh_interval_ms)
    }

    /// Checks that every interval and retry limit is usable.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidValue` naming the first bad field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let checks = [
            ("position_poll_interval_ms", self.position_poll_interval_ms),
            (
                "engine_ready_poll_interval_ms",
                self.engine_ready_poll_interval_ms,
            ),
            ("library_refresh_interval_ms", self.library_refresh_interval_ms),
            (
                "engine_ready_max_attempts",
                u64::from(self.engine_ready_max_attempts),
            ),
        ];

        for (field, value) in checks {
            if value == 0 {
                return Err(SettingsError::InvalidValue {
                    reason: format!("{field} must be greater than zero"),
                });
            }
        }

        Ok(())
    }
}

/// Handles loading, saving, and validation of user preferences.
#[derive(Debug)]
pub struct SettingsManager {
    /// Thread-safe user settings storage.
    settings: RwLock<UserSettings>,
    /// Path to the configuration file on disk.
    config_path: PathBuf,
}

impl SettingsManager {
    /// Creates a new settings manager with default config path.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if settings cannot be loaded from disk.
    pub fn new() -> Result<Self, SettingsError> {
        Self::with_config_path(get_config_path())
    }

    /// Creates a new settings manager with a custom config path.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Custom path for the settings file
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if settings cannot be loaded from disk.
    pub fn with_config_path(config_path: PathBuf) -> Result<Self, SettingsError> {
        if let Some(parent) = config_path.parent() {
            create_dir_all(parent)?;
        }

        let settings = if config_path.exists() {
            debug!("Loading settings from existing file: {:?}", config_path);
            let contents = read_to_string(&config_path)?;
            from_str(&contents)?
        } else {
            debug!("Using default settings, no file at {:?}", config_path);
            UserSettings::default()
        };

        Ok(SettingsManager {
            settings: RwLock::new(settings),
            config_path,
        })
    }

    /// Creates a manager that holds `settings` for the given path without
    /// touching the disk until the next update.
    #[must_use]
    pub fn from_settings(settings: UserSettings, config_path: PathBuf) -> Self {
        Self {
            settings: RwLock::new(settings),
            config_path,
        }
    }

    /// Gets the current settings.
    pub fn get_settings(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.settings.read()
    }

    /// Gets the configuration file path.
    pub fn get_config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Validates, applies and saves new settings.
    ///
    /// # Arguments
    ///
    /// * `new_settings` - New settings to apply.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the settings are invalid or cannot be
    /// saved to disk. Invalid settings are not applied.
    pub fn update_settings(&self, new_settings: UserSettings) -> Result<(), SettingsError> {
        new_settings.validate()?;
        *self.settings.write() = new_settings;
        self.save_settings()
    }

    fn save_settings(&self) -> Result<(), SettingsError> {
        debug!("Saving settings to file: {:?}", self.config_path);
        let contents = to_string_pretty(&*self.settings.read())?;
        write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Path of the settings file.
#[must_use]
pub fn get_config_path() -> PathBuf {
    let mut config_dir = get_xdg_config_home();
    config_dir.push("lotus");
    config_dir.push("settings.json");
    config_dir
}

/// Directory for durable application data (player snapshot, playlists).
#[must_use]
pub fn get_data_dir() -> PathBuf {
    let mut data_dir = get_xdg_data_home();
    data_dir.push("lotus");
    data_dir
}

/// Gets the XDG config home directory following XDG Base Directory specification.
///
/// Uses `XDG_CONFIG_HOME` environment variable if set, otherwise defaults to $HOME/.config
fn get_xdg_config_home() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"])
}

/// Gets the XDG data home directory following XDG Base Directory specification.
///
/// Uses `XDG_DATA_HOME` environment variable if set, otherwise defaults to $HOME/.local/share
fn get_xdg_data_home() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"])
}

fn xdg_dir(env_key: &str, home_fallback: &[&str]) -> PathBuf {
    if let Ok(dir) = var(env_key)
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }

    if let Ok(home) = var("HOME") {
        let mut path = PathBuf::from(home);
        path.extend(home_fallback);
        return path;
    }

    // Fallback to current directory if HOME is not set (shouldn't happen on Unix)
    PathBuf::from(".")
}
