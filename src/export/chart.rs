use super::{ExportError, SceneExport};
use plotters::prelude::*;
use std::path::Path;

const CHART_SIZE: (u32, u32) = (1024, 768);

/// Render the occupied cells as a top-down heatmap, one rectangle per cell
pub fn export_heatmap<P: AsRef<Path>>(scene: &SceneExport, output_path: P) -> Result<(), ExportError> {
    draw_heatmap(scene, output_path.as_ref()).map_err(|e| ExportError::ChartError(e.to_string()))
}

fn draw_heatmap(scene: &SceneExport, output_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(output_path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let caption = scene
        .title
        .clone()
        .unwrap_or_else(|| format!("{} by {} and {}", scene.axes.z.label, scene.axes.x.label, scene.axes.y.label));

    let bins = scene.settings.bins;
    let x_range = (scene.domain.min_x - bins.x / 2.0)..(scene.domain.max_x + bins.x / 2.0);
    let y_range = (scene.domain.min_y - bins.y / 2.0)..(scene.domain.max_y + bins.y / 2.0);

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(scene.axes.x.label.as_str())
        .y_desc(scene.axes.y.label.as_str())
        .x_labels(scene.axes.x.majors)
        .y_labels(scene.axes.y.majors)
        .draw()?;

    chart.draw_series(scene.cells.iter().map(|cell| {
        let (r, g, b) = cell.color.to_rgb8();
        let fill = RGBColor(r, g, b).mix(cell.color.a.max(0.15));
        Rectangle::new(
            [
                (cell.x - bins.x / 2.0, cell.y - bins.y / 2.0),
                (cell.x + bins.x / 2.0, cell.y + bins.y / 2.0),
            ],
            fill.filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}
