//! Configuration file support for seglabel.
//!
//! Settings are stored as versioned JSON so they can be exported, imported
//! and loaded from the user's config directory at startup.

use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationMode;
use crate::constants::DEFAULT_UPLOAD_BATCH_SIZE;
use crate::input::ModifierKey;
use crate::render::OverlayStyle;
use crate::zoom_math::ZoomLimits;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Viewport and pointer behavior, shared by every annotation mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Modifier that turns a press into a pan drag
    pub pan_modifier: ModifierKey,
    /// Whether the wheel zooms
    pub allow_zoom: bool,
    pub annotation_mode: AnnotationMode,
    /// Keep zoom and pan when switching images or resizing
    pub keep_zoom_pan: bool,
    pub zoom: ZoomLimits,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            pan_modifier: ModifierKey::Shift,
            allow_zoom: true,
            annotation_mode: AnnotationMode::SinglePoint,
            keep_zoom_pan: false,
            zoom: ZoomLimits::default(),
        }
    }
}

/// User preferences section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Files per upload request
    #[serde(default = "default_upload_batch_size")]
    pub upload_batch_size: usize,

    /// Folder opened on startup
    #[serde(default)]
    pub default_folder: String,
}

fn default_upload_batch_size() -> usize {
    DEFAULT_UPLOAD_BATCH_SIZE
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            upload_batch_size: default_upload_batch_size(),
            default_folder: String::new(),
        }
    }
}

/// Application configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Application name (for identification)
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default)]
    pub preferences: UserPreferences,

    #[serde(default)]
    pub viewer: ViewerConfig,

    #[serde(default)]
    pub overlay: OverlayStyle,
}

fn default_app_name() -> String {
    "seglabel".to_string()
}

impl AppConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            app_name: default_app_name(),
            preferences: UserPreferences::default(),
            viewer: ViewerConfig::default(),
            overlay: OverlayStyle::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the viewport cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.viewer.zoom.is_valid() {
            return Err(ConfigError::invalid(format!(
                "zoom limits {:?} are not usable",
                self.viewer.zoom
            )));
        }
        if self.preferences.upload_batch_size == 0 {
            return Err(ConfigError::invalid("upload_batch_size must be at least 1"));
        }
        Ok(())
    }

    /// Get the default filename for config export.
    pub fn default_filename() -> &'static str {
        "seglabel-config.json"
    }

    /// Get the default config file path for auto-load/save.
    pub fn default_path() -> Option<std::path::PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("seglabel").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("seglabel")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from a file.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// A value is out of its allowed range
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    /// Create an invalid configuration error with a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trip() {
        let config = AppConfig::default();
        let json = config.to_json().unwrap();
        let loaded = AppConfig::from_json(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = AppConfig::from_json(r#"{ "version": 1 }"#).unwrap();
        assert_eq!(config.app_name, "seglabel");
        assert_eq!(config.viewer, ViewerConfig::default());
        assert_eq!(config.preferences.upload_batch_size, DEFAULT_UPLOAD_BATCH_SIZE);
    }

    #[test]
    fn test_viewer_section_parses() {
        let json = r#"{
            "version": 1,
            "viewer": {
                "pan_modifier": "control",
                "allow_zoom": false,
                "annotation_mode": "segmentation",
                "keep_zoom_pan": true
            }
        }"#;
        let config = AppConfig::from_json(json).unwrap();
        assert_eq!(config.viewer.pan_modifier, ModifierKey::Control);
        assert!(!config.viewer.allow_zoom);
        assert_eq!(config.viewer.annotation_mode, AnnotationMode::Segmentation);
        assert!(config.viewer.keep_zoom_pan);
        assert_eq!(config.viewer.zoom, ZoomLimits::default());
    }

    #[test]
    fn test_version_too_new() {
        let err = AppConfig::from_json(r#"{ "version": 99 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::VersionTooNew {
                file_version: 99,
                supported_version: CONFIG_VERSION
            }
        ));
    }

    #[test]
    fn test_invalid_zoom_limits_rejected() {
        let json = r#"{
            "version": 1,
            "viewer": { "zoom": { "min": 0.0, "max": 5.0, "in_factor": 1.15, "out_factor": 0.85 } }
        }"#;
        assert!(matches!(
            AppConfig::from_json(json),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(LogLevel::default().to_level_filter(), log::LevelFilter::Info);
        assert_eq!(LogLevel::Trace.to_level_filter(), log::LevelFilter::Trace);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("seglabel-config-test-{}", std::process::id()));
        let path = dir.join(AppConfig::default_filename());

        let mut config = AppConfig::default();
        config.preferences.log_level = LogLevel::Debug;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.preferences.log_level, LogLevel::Debug);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
