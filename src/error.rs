//! Unified error hierarchy for ridemodel
//!
//! Only boundary problems surface as errors: bad settings, unreadable ride
//! files and failed exports. Degenerate data (empty grids, flat axes, missing
//! zone configuration) is handled inside the model and never reaches here.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all ridemodel operations
#[derive(Debug, Error)]
pub enum ModelPlotError {
    /// Plot settings rejected before aggregation
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Ride import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Scene export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Invalid plot settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Bin widths must be finite and positive
    #[error("Invalid bin width for {axis} axis: {width}")]
    InvalidBinWidth { axis: char, width: f64 },

    /// Interval stop precedes its start
    #[error("Invalid interval '{label}': start {start} is after stop {stop}")]
    InvalidInterval { label: String, start: f64, stop: f64 },

    /// Channel name not recognised
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// Plot style name not recognised
    #[error("Unknown plot style: {0}")]
    UnknownStyle(String),

    /// Log level or format name not recognised
    #[error("Unknown log {option}: {value}")]
    UnknownLogOption { option: &'static str, value: String },
}

/// Ride import errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// File not found at specified path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Unsupported file format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Row could not be parsed
    #[error("Parse error at record {record}: {reason}")]
    ParseError { record: usize, reason: String },

    /// File contained no samples
    #[error("No samples found in {path}")]
    NoSamples { path: PathBuf },

    /// Underlying CSV reader failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Scene export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[cfg(feature = "charts")]
    #[error("Chart rendering error: {0}")]
    ChartError(String),
}

/// Result type alias for ridemodel operations
pub type Result<T> = std::result::Result<T, ModelPlotError>;

impl ModelPlotError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ModelPlotError::Settings(_) => ErrorSeverity::Warning,
            ModelPlotError::Import(ImportError::FileNotFound { .. }) => ErrorSeverity::Warning,
            ModelPlotError::Import(ImportError::NoSamples { .. }) => ErrorSeverity::Warning,
            ModelPlotError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ModelPlotError::Import(ImportError::FileNotFound { path }) => {
                format!("Could not find ride file: {}", path.display())
            }
            ModelPlotError::Import(ImportError::NoSamples { path }) => {
                format!("Ride file {} has no samples to plot", path.display())
            }
            ModelPlotError::Settings(SettingsError::InvalidBinWidth { axis, .. }) => {
                format!("The {} bin width must be a positive number.", axis)
            }
            ModelPlotError::Settings(SettingsError::UnknownChannel(name)) => {
                format!(
                    "'{}' is not a channel. Run `ridemodel channels` to list them.",
                    name
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}
