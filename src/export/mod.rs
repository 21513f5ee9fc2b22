use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::aggregate::ModelSettings;
use crate::color::Legend;
use crate::error::ExportError;
use crate::grid::ValueRange;
use crate::models::Rgba;
use crate::plot::{Axes, ModelPlot, ViewPoint};
use crate::postprocess::{AxisScale, Domain, Mesh, ModelStatus};
use crate::render::SceneRecorder;

#[cfg(feature = "charts")]
pub mod chart;
pub mod json;
pub mod text;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Text,
    /// Top-down heatmap, needs the `charts` feature
    Png,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            "png" | "chart" => Ok(ExportFormat::Png),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// One occupied cell as exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellExport {
    pub x: f64,
    pub y: f64,
    pub height: f64,
    pub interval_height: Option<f64>,
    pub color: Rgba,
}

/// Everything needed to redraw a plot elsewhere
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneExport {
    pub generated_at: DateTime<Utc>,
    pub source: Option<String>,
    pub settings: ModelSettings,
    pub status: ModelStatus,
    pub title: Option<String>,
    pub mesh: Mesh,
    pub domain: Domain,
    pub scale: AxisScale,
    pub z_range: ValueRange,
    pub diag: f64,
    pub zpane: f64,
    pub notable_level: f64,
    pub view: ViewPoint,
    pub axes: Axes,
    pub legend: Option<Legend>,
    pub cells: Vec<CellExport>,
    pub scene: SceneRecorder,
}

impl SceneExport {
    /// Snapshot a plot, rendering one frame into the export
    pub fn from_plot(plot: &ModelPlot, source: Option<String>) -> Self {
        let model = plot.model();
        let mut scene = SceneRecorder::new();
        plot.render(&mut scene);

        let cells = model
            .heights
            .iter()
            .map(|(key, cell)| {
                let (x, y) = key.coords(&model.bins);
                CellExport {
                    x,
                    y,
                    height: cell.value,
                    interval_height: model.interval_heights.value(key),
                    color: model.color.color_for_key(key),
                }
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            source,
            settings: plot.settings().clone(),
            status: model.status.clone(),
            title: plot.title().map(str::to_string),
            mesh: model.mesh,
            domain: model.domain,
            scale: model.scale,
            z_range: model.z_range,
            diag: model.diag,
            zpane: plot.zpane(),
            notable_level: plot.notable_level(),
            view: *plot.view_point(),
            axes: plot.axes(),
            legend: plot.legend(),
            cells,
            scene,
        }
    }
}

/// Write a scene in the requested format
pub fn export_scene<P: AsRef<Path>>(
    scene: &SceneExport,
    format: ExportFormat,
    output_path: P,
) -> Result<(), ExportError> {
    let output_path = output_path.as_ref();
    match format {
        ExportFormat::Json => json::export_scene(scene, output_path)?,
        ExportFormat::Text => text::export_summary(scene, output_path)?,
        #[cfg(feature = "charts")]
        ExportFormat::Png => chart::export_heatmap(scene, output_path)?,
        #[cfg(not(feature = "charts"))]
        ExportFormat::Png => {
            return Err(ExportError::UnsupportedFormat(
                "png (rebuild with --features charts)".to_string(),
            ))
        }
    }

    info!(file = %output_path.display(), format = ?format, cells = scene.cells.len(), "Exported scene");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert_eq!("png".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(ExportError::UnsupportedFormat(_))
        ));
    }
}
