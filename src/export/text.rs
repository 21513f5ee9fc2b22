use super::{ExportError, SceneExport};
use crate::postprocess::ModelStatus;
use std::io::Write;
use std::path::Path;

/// Export a human-readable summary of a plot scene
pub fn export_summary<P: AsRef<Path>>(scene: &SceneExport, output_path: P) -> Result<(), ExportError> {
    let mut file = std::fs::File::create(output_path)?;
    write_summary(scene, &mut file)
}

/// Write the summary to any writer
pub fn write_summary<W: Write>(scene: &SceneExport, out: &mut W) -> Result<(), ExportError> {
    writeln!(out, "=")?;
    writeln!(out, "RIDE MODEL PLOT")?;
    writeln!(out, "=")?;
    writeln!(out)?;

    if let Some(source) = &scene.source {
        writeln!(out, "Source: {}", source)?;
    }
    writeln!(out, "Generated: {}", scene.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out)?;

    writeln!(out, "AXES")?;
    writeln!(out, "-")?;
    writeln!(out, "X: {} (bin {})", scene.axes.x.label, scene.settings.bins.x)?;
    writeln!(out, "Y: {} (bin {})", scene.axes.y.label, scene.settings.bins.y)?;
    writeln!(out, "Z: {}", scene.axes.z.label)?;
    writeln!(out, "Color: {}", scene.settings.color.long_description())?;
    writeln!(out, "Style: {}", scene.settings.style)?;
    writeln!(out)?;

    match &scene.status {
        ModelStatus::Unconfigured => {
            writeln!(out, "Plot not configured.")?;
            return Ok(());
        }
        ModelStatus::Placeholder { message } => {
            writeln!(out, "{}", message)?;
            return Ok(());
        }
        ModelStatus::Ready => {}
    }

    writeln!(out, "MODEL")?;
    writeln!(out, "-")?;
    writeln!(out, "Cells: {}", scene.cells.len())?;
    writeln!(out, "Mesh: {} x {}", scene.mesh.columns, scene.mesh.rows)?;
    writeln!(
        out,
        "Domain: x {:.1}..{:.1}, y {:.1}..{:.1}",
        scene.domain.min_x, scene.domain.max_x, scene.domain.min_y, scene.domain.max_y
    )?;
    writeln!(out, "Height: {:.2}..{:.2}", scene.z_range.min, scene.z_range.max)?;
    writeln!(
        out,
        "Scale: x {:.3}, y {:.3}, z {:.3}",
        scene.scale.x, scene.scale.y, scene.scale.z
    )?;
    if !scene.settings.intervals.is_empty() {
        let labels: Vec<&str> = scene.settings.intervals.iter().map(|i| i.label.as_str()).collect();
        writeln!(out, "Intervals: {}", labels.join(", "))?;
    }
    writeln!(out)?;

    if let Some(legend) = scene.legend.as_ref().filter(|legend| legend.shown) {
        writeln!(out, "LEGEND")?;
        writeln!(out, "-")?;
        writeln!(out, "{}: {:.2}..{:.2}", legend.title, legend.min, legend.max)?;
        writeln!(out)?;
    }

    writeln!(out, "TALLEST CELLS")?;
    writeln!(out, "-")?;
    let mut cells: Vec<_> = scene.cells.iter().collect();
    cells.sort_by(|a, b| b.height.total_cmp(&a.height));
    for cell in cells.iter().take(10) {
        match cell.interval_height {
            Some(interval) => writeln!(
                out,
                "{:>8.1} {:>8.1}  {:>8.2}  (intervals {:.2})",
                cell.x, cell.y, cell.height, interval
            )?,
            None => writeln!(out, "{:>8.1} {:>8.1}  {:>8.2}", cell.x, cell.y, cell.height)?,
        }
    }

    Ok(())
}
