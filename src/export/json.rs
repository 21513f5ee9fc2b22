use super::{ExportError, SceneExport};
use std::io::Write;
use std::path::Path;

/// Export a plot scene to JSON
pub fn export_scene<P: AsRef<Path>>(scene: &SceneExport, output_path: P) -> Result<(), ExportError> {
    export_json(scene, output_path)
}

/// Export any serializable data structure to JSON
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<(), ExportError>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let json_data = serde_json::to_string_pretty(data)
        .map_err(|e| ExportError::SerializationError(e.to_string()))?;

    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json_data.as_bytes())?;

    Ok(())
}
