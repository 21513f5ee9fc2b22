use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::aggregate::ModelSettings;
use crate::channel::Channel;
use crate::grid::BinWidths;
use crate::import::csv::DEFAULT_RECORDING_INTERVAL;
use crate::logging::LogConfig;
use crate::render::PlotStyle;
use crate::zones::{PowerZoneRange, PowerZoneRanges, ZoneError};

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// Default plot settings
    #[serde(default)]
    pub plot: PlotDefaults,

    /// Power zone history
    #[serde(default)]
    pub zones: ZoneSettings,

    /// Ride import preferences
    #[serde(default)]
    pub import: ImportSettings,

    /// Logging setup
    #[serde(default)]
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Plot settings used when the command line does not override them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotDefaults {
    pub x: Channel,
    pub y: Channel,
    pub z: Channel,
    pub color: Channel,
    pub x_bin: f64,
    pub y_bin: f64,
    pub ignore_zero: bool,
    pub legend: bool,
    pub grid: bool,
    pub frame: bool,
    pub style: PlotStyle,

    /// Treat an interval height of exactly zero as "no interval data"
    pub zero_interval_is_absent: bool,
}

impl Default for PlotDefaults {
    fn default() -> Self {
        let settings = ModelSettings::default();
        Self {
            x: settings.x,
            y: settings.y,
            z: settings.z,
            color: settings.color,
            x_bin: settings.bins.x,
            y_bin: settings.bins.y,
            ignore_zero: settings.ignore_zero,
            legend: settings.legend,
            grid: settings.grid,
            frame: settings.frame,
            style: settings.style,
            zero_interval_is_absent: settings.zero_interval_is_absent,
        }
    }
}

impl PlotDefaults {
    /// Model settings seeded from these defaults, with no intervals
    pub fn to_settings(&self) -> ModelSettings {
        ModelSettings {
            x: self.x,
            y: self.y,
            z: self.z,
            color: self.color,
            bins: BinWidths::new(self.x_bin, self.y_bin),
            ignore_zero: self.ignore_zero,
            intervals: Vec::new(),
            legend: self.legend,
            grid: self.grid,
            frame: self.frame,
            style: self.style,
            zero_interval_is_absent: self.zero_interval_is_absent,
        }
    }
}

/// Power zone settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSettings {
    /// FTP history, each entry applying from its date on
    pub power: Vec<PowerZoneRange>,
}

impl ZoneSettings {
    pub fn power_zones(&self) -> Result<PowerZoneRanges, ZoneError> {
        let ranges = self
            .power
            .iter()
            .map(|range| PowerZoneRange::new(range.from, range.ftp))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PowerZoneRanges::new(ranges))
    }
}

/// Ride import preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Recording interval used when it cannot be inferred from the file
    pub default_recording_interval: f64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        ImportSettings {
            default_recording_interval: DEFAULT_RECORDING_INTERVAL,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();
        AppConfig {
            metadata: ConfigMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                created_at: now,
                updated_at: now,
            },
            plot: PlotDefaults::default(),
            zones: ZoneSettings::default(),
            import: ImportSettings::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ridemodel")
            .join("config.toml")
    }

    /// Load configuration from a path, falling back to defaults when it is missing
    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Unreadable config, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(Self::default_config_path())
    }

    /// Save configuration to default location
    pub fn save_default(&mut self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to_file(config_path)
    }
}
