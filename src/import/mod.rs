use std::path::Path;
use tracing::info;

use crate::error::ImportError;
use crate::models::Ride;

pub mod csv;

/// Trait for reading rides from different file formats
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Read a ride from the file
    fn import_file(&self, file_path: &Path) -> Result<Ride, ImportError>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Picks the importer for a file by extension
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        Self::with_importers(vec![Box::new(csv::CsvImporter::new())])
    }

    pub fn with_importers(importers: Vec<Box<dyn ImportFormat>>) -> Self {
        Self { importers }
    }

    /// Import a single file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<Ride, ImportError> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound {
                path: file_path.to_path_buf(),
            });
        }

        let importer = self
            .importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| ImportError::UnsupportedFormat {
                format: file_path
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            })?;

        info!(
            file = %file_path.display(),
            format = importer.get_format_name(),
            "Importing ride"
        );
        importer.import_file(file_path)
    }
}
