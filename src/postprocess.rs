//! Post-processing of raw aggregates into a renderable model
//!
//! Runs strictly after aggregation: zone conversion, time normalization,
//! height bounds, then the mesh/domain/scale geometry. The result is frozen
//! before any rendering callback sees it.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::{Aggregation, ModelSettings};
use crate::channel::Channel;
use crate::color::ColorProvider;
use crate::grid::{BinWidths, CellMap, GridBounds, GridKey, ValueRange};
use crate::models::RideData;
use crate::zones::ZoneSource;

/// Title shown when no cell received data
pub const EMPTY_DATASET_MESSAGE: &str = "No data or bin size too large";

/// Smallest mesh span, in bins, that renders as a surface
const MIN_MESH_BINS: i64 = 2;

/// Mesh spans below this get one bin of padding on the low side
const PADDED_MESH_BINS: i64 = 4;

/// Bars fill this share of their cell
const BAR_FILL: f64 = 0.8;

/// What the model can show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModelStatus {
    /// Populated and ready to render
    Ready,
    /// Nothing to aggregate; a 2x2 empty plot with a message
    Placeholder { message: String },
    /// No ride or an axis without a channel
    Unconfigured,
}

/// Plot-space extent of the x/y grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Mesh dimensions handed to the surface, one more than the bin span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mesh {
    pub columns: usize,
    pub rows: usize,
}

/// Per-axis scale factors, all at least 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisScale {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for AxisScale {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0, z: 1.0 }
    }
}

/// Fully post-processed model shared by the color provider and renderers
#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    pub status: ModelStatus,

    /// Channels bound to x, y, z and color
    pub x: Channel,
    pub y: Channel,
    pub z: Channel,
    pub color_channel: Channel,

    pub bins: BinWidths,

    /// All-samples heights
    pub heights: CellMap,

    /// Interval-scoped heights
    pub interval_heights: CellMap,

    /// Per-cell colors and the zone table behind them
    pub color: ColorProvider,

    /// Scene height bounds over the all-samples heights
    pub z_range: ValueRange,

    /// Grid bounds after mesh padding, in bin indices
    pub grid: Option<GridBounds>,

    pub domain: Domain,
    pub mesh: Mesh,
    pub scale: AxisScale,

    /// Bar half-width in plot units
    pub diag: f64,

    pub intervals_active: bool,
}

impl ModelData {
    /// Null plot for incomplete settings
    pub fn unconfigured(settings: &ModelSettings) -> Self {
        Self::empty(settings, ModelStatus::Unconfigured)
    }

    /// Degenerate 2x2 plot with a message
    pub fn placeholder(settings: &ModelSettings, message: impl Into<String>) -> Self {
        Self::empty(
            settings,
            ModelStatus::Placeholder {
                message: message.into(),
            },
        )
    }

    fn empty(settings: &ModelSettings, status: ModelStatus) -> Self {
        Self {
            status,
            x: settings.x,
            y: settings.y,
            z: settings.z,
            color_channel: settings.color,
            bins: settings.bins,
            heights: CellMap::new(),
            interval_heights: CellMap::new(),
            color: ColorProvider::new(CellMap::new(), settings.bins),
            z_range: ValueRange::new(0.0),
            grid: None,
            domain: Domain::default(),
            mesh: Mesh { columns: 2, rows: 2 },
            scale: AxisScale::default(),
            diag: 0.0,
            intervals_active: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ModelStatus::Ready
    }

    pub fn min_z(&self) -> f64 {
        self.z_range.min
    }

    pub fn max_z(&self) -> f64 {
        self.z_range.max
    }

    /// All-samples height of the cell at plot coordinates
    pub fn height_at(&self, x: f64, y: f64) -> Option<f64> {
        self.heights.value(&GridKey::from_values(x, y, &self.bins))
    }

    /// Interval height of the cell at plot coordinates
    pub fn interval_height_at(&self, x: f64, y: f64) -> Option<f64> {
        self.interval_heights.value(&GridKey::from_values(x, y, &self.bins))
    }

    /// Every mesh cell in row-major order with its plot coordinates
    pub fn mesh_cells(&self) -> impl Iterator<Item = (GridKey, f64, f64)> + '_ {
        let bins = self.bins;
        self.grid.into_iter().flat_map(move |grid| {
            (grid.min_y..=grid.max_y).flat_map(move |y| {
                (grid.min_x..=grid.max_x).map(move |x| {
                    let key = GridKey::new(x, y);
                    let (px, py) = key.coords(&bins);
                    (key, px, py)
                })
            })
        })
    }
}

/// Turn raw aggregates into a renderable model
pub fn postprocess(
    mut aggregation: Aggregation,
    settings: &ModelSettings,
    ride: &dyn RideData,
    zones: Option<&dyn ZoneSource>,
) -> ModelData {
    let grid = match aggregation.grid {
        Some(grid) if !aggregation.is_empty() => grid,
        _ => {
            warn!(samples = ride.samples().len(), "No cells populated, showing placeholder plot");
            return ModelData::placeholder(settings, EMPTY_DATASET_MESSAGE);
        }
    };

    // COLOR: zones, none, or continuous
    let mut color_range = aggregation.color_range;
    let mut zone_table = Vec::new();

    if settings.color == Channel::PowerZone {
        let zone_setup = zones.and_then(|z| {
            z.current_zone_range(ride)
                .map(|range| (z, range, z.zone_count(range)))
                .filter(|&(_, _, count)| count > 0)
        });

        match zone_setup {
            Some((zones, range, count)) => {
                color_range = Some(ValueRange { min: 1.0, max: count as f64 });
                zone_table = (0..count).map(|i| zones.zone_color(i, count)).collect();
                // zone numbers start at 1 so that 0 never means a zone
                aggregation
                    .colors
                    .map_values(|watts| zones.zone_index_for(range, watts) as f64 + 1.0);
            }
            None => warn!("Power zone coloring requested but no zones configured, using continuous colors"),
        }
    } else if settings.color == Channel::None {
        aggregation.colors.clear();
        color_range = None;
    }

    // TIME: absolute durations become a share of the ride
    let duration = ride.duration_secs();
    if duration > 0.0 {
        let percent = |secs: f64| (secs / duration) * 100.0;
        if settings.z.is_time_at_cell() {
            aggregation.heights.map_values(percent);
            aggregation.interval_heights.map_values(percent);
        }
        if settings.color.is_time_at_cell() {
            aggregation.colors.map_values(percent);
            color_range = aggregation.colors.value_range();
        }
    }

    let z_range = aggregation
        .heights
        .value_range()
        .unwrap_or_else(|| ValueRange::new(0.0));

    let grid = pad_grid(grid);
    let bins = settings.bins;
    let domain = Domain {
        min_x: grid.min_x as f64 * bins.x,
        max_x: grid.max_x as f64 * bins.x,
        min_y: grid.min_y as f64 * bins.y,
        max_y: grid.max_y as f64 * bins.y,
    };
    let mesh = Mesh {
        columns: (grid.width() as usize).saturating_add(1),
        rows: (grid.height() as usize).saturating_add(1),
    };

    let x_range = domain.max_x - domain.min_x;
    let y_range = domain.max_y - domain.min_y;
    let diag = bar_half_width(x_range, y_range, &bins);
    let scale = normalize_scale(x_range, y_range, z_range.span(), &bins);

    let mut color = ColorProvider::new(aggregation.colors, bins);
    if !zone_table.is_empty() {
        color = color.with_zones(zone_table);
    }
    if let Some(range) = color_range {
        color = color.with_range(range);
    }

    info!(
        cells = aggregation.heights.len(),
        columns = mesh.columns,
        rows = mesh.rows,
        min_z = z_range.min,
        max_z = z_range.max,
        scale = ?scale,
        "Model data ready"
    );

    ModelData {
        status: ModelStatus::Ready,
        x: settings.x,
        y: settings.y,
        z: settings.z,
        color_channel: settings.color,
        bins,
        heights: aggregation.heights,
        interval_heights: aggregation.interval_heights,
        color,
        z_range,
        grid: Some(grid),
        domain,
        mesh,
        scale,
        diag,
        intervals_active: aggregation.intervals_active,
    }
}

/// Widen the observed grid so the mesh spans at least two bins per axis,
/// with a bin of padding below when it spans fewer than four
pub fn pad_grid(mut grid: GridBounds) -> GridBounds {
    (grid.min_x, grid.max_x) = pad_axis(grid.min_x, grid.max_x);
    (grid.min_y, grid.max_y) = pad_axis(grid.min_y, grid.max_y);
    grid
}

/// Padding for one axis; at the ends of the index range the span is
/// shifted inwards instead of overflowing
fn pad_axis(mut min: i64, mut max: i64) -> (i64, i64) {
    if max.saturating_sub(min) < MIN_MESH_BINS {
        max = min.saturating_add(MIN_MESH_BINS);
        min = max - MIN_MESH_BINS;
    }
    if max.saturating_sub(min) < PADDED_MESH_BINS {
        min = min.saturating_sub(1);
    }
    (min, max)
}

/// Half-width of a bar: 80% of half a bin, measured against the tighter axis
pub fn bar_half_width(x_range: f64, y_range: f64, bins: &BinWidths) -> f64 {
    let xr = BAR_FILL * ((bins.x / (x_range + bins.x)) / 2.0);
    let yr = BAR_FILL * ((bins.y / (y_range + bins.y)) / 2.0);

    if xr < yr {
        xr * x_range
    } else {
        yr * y_range
    }
}

/// Replace a zero or non-finite axis range with a usable one
fn usable_range(range: f64, fallback: f64, axis: char) -> f64 {
    if range.is_finite() && range > 0.0 {
        range
    } else {
        warn!(axis = %axis, range, fallback, "Degenerate axis range");
        fallback
    }
}

/// Stretch the shorter axes to the longest one; every factor ends up >= 1.
///
/// A flat z range has no unit of its own, so it falls back to the smaller
/// bin width. The z factor of a flat model therefore follows the x/y bin
/// widths rather than the data.
pub fn normalize_scale(x_range: f64, y_range: f64, z_range: f64, bins: &BinWidths) -> AxisScale {
    let x = usable_range(x_range, bins.x, 'x');
    let y = usable_range(y_range, bins.y, 'y');
    let z = usable_range(z_range, bins.x.min(bins.y), 'z');

    let mut scale = if x >= y && x >= z {
        AxisScale { x: 1.0, y: x / y, z: x / z }
    } else if y >= x && y >= z {
        AxisScale { x: y / x, y: 1.0, z: y / z }
    } else {
        AxisScale { x: z / x, y: z / y, z: 1.0 }
    };

    if scale.x < 1.0 {
        let factor = 1.0 / scale.x;
        scale.x = 1.0;
        scale.y *= factor;
        scale.z *= factor;
    }
    if scale.y < 1.0 {
        let factor = 1.0 / scale.y;
        scale.y = 1.0;
        scale.x *= factor;
        scale.z *= factor;
    }
    if scale.z < 1.0 {
        let factor = 1.0 / scale.z;
        scale.z = 1.0;
        scale.x *= factor;
        scale.y *= factor;
    }

    scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::models::{Interval, Ride, Sample};
    use crate::zones::PowerZoneRanges;

    fn sample(secs: f64, watts: f64, cad: f64) -> Sample {
        Sample {
            watts,
            cad,
            ..Sample::at(secs)
        }
    }

    fn settings(z: Channel, color: Channel) -> ModelSettings {
        ModelSettings {
            x: Channel::Power,
            y: Channel::Cadence,
            z,
            color,
            bins: BinWidths::new(50.0, 10.0),
            ignore_zero: false,
            ..Default::default()
        }
    }

    fn build(ride: &Ride, settings: &ModelSettings, zones: Option<&dyn ZoneSource>) -> ModelData {
        let agg = aggregate(ride, settings).unwrap();
        postprocess(agg, settings, ride, zones)
    }

    #[test]
    fn test_time_normalization_to_percent() {
        let ride = Ride::new(
            vec![sample(0.0, 100.0, 80.0), sample(1.0, 120.0, 82.0), sample(2.0, 140.0, 81.0)],
            1.0,
        );
        let s = ModelSettings {
            bins: BinWidths::new(100.0, 10.0),
            ..settings(Channel::TimeAtCell, Channel::Power)
        };
        let model = build(&ride, &s, None);

        assert!(model.is_ready());
        assert_eq!(model.heights.len(), 1);
        assert!((model.max_z() - 100.0).abs() < 1e-9);
        assert!((model.min_z() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_at_cell_color_bounds_recomputed() {
        let ride = Ride::new(
            vec![
                sample(0.0, 100.0, 80.0),
                sample(1.0, 100.0, 80.0),
                sample(2.0, 100.0, 80.0),
                sample(3.0, 200.0, 80.0),
            ],
            1.0,
        );
        let model = build(&ride, &settings(Channel::Power, Channel::TimeAtCell), None);
        let range = model.color.range();
        assert!((range.min - 25.0).abs() < 1e-9);
        assert!((range.max - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_dataset_placeholder() {
        let ride = Ride::new(vec![sample(0.0, 0.0, 0.0)], 1.0);
        let mut s = settings(Channel::Power, Channel::Power);
        s.ignore_zero = true;
        let model = build(&ride, &s, None);

        assert_eq!(
            model.status,
            ModelStatus::Placeholder {
                message: EMPTY_DATASET_MESSAGE.to_string()
            }
        );
        assert_eq!(model.mesh, Mesh { columns: 2, rows: 2 });
        assert_eq!(model.min_z(), 0.0);
        assert_eq!(model.domain, Domain::default());
        assert_eq!(model.mesh_cells().count(), 0);
    }

    #[test]
    fn test_zone_conversion() {
        let ride = Ride::new(
            vec![sample(0.0, 100.0, 80.0), sample(1.0, 250.0, 80.0), sample(2.0, 400.0, 90.0)],
            1.0,
        );
        let zones = PowerZoneRanges::from_ftp(250).unwrap();
        let model = build(&ride, &settings(Channel::Power, Channel::PowerZone), Some(&zones));

        assert!(model.color.is_zones());
        assert_eq!(model.color.zone_table().len(), 7);
        let range = model.color.range();
        assert_eq!((range.min, range.max), (1.0, 7.0));
        for (_, cell) in model.color.values().iter() {
            assert!(cell.value >= 1.0 && cell.value <= 7.0);
        }
        assert_eq!(model.color.values().value(&GridKey::new(2, 8)), Some(1.0));
        assert_eq!(model.color.values().value(&GridKey::new(8, 9)), Some(7.0));
    }

    #[test]
    fn test_missing_zone_configuration_falls_back() {
        let ride = Ride::new(vec![sample(0.0, 100.0, 80.0), sample(1.0, 300.0, 80.0)], 1.0);
        let zones = PowerZoneRanges::default();
        let model = build(&ride, &settings(Channel::Power, Channel::PowerZone), Some(&zones));

        assert!(!model.color.is_zones());
        let range = model.color.range();
        assert_eq!((range.min, range.max), (100.0, 300.0));
    }

    #[test]
    fn test_no_color_channel_clears_colors() {
        let ride = Ride::new(vec![sample(0.0, 100.0, 80.0)], 1.0);
        let model = build(&ride, &settings(Channel::Power, Channel::None), None);
        assert!(model.color.values().is_empty());
    }

    #[test]
    fn test_interval_heights_normalized() {
        let ride = Ride::new(
            vec![sample(0.0, 100.0, 80.0), sample(1.0, 100.0, 80.0), sample(2.0, 100.0, 80.0), sample(3.0, 100.0, 80.0)],
            1.0,
        );
        let mut s = settings(Channel::TimeAtCell, Channel::Power);
        s.intervals = vec![Interval::new(0.0, 0.5, "start")];
        let model = build(&ride, &s, None);

        let key = GridKey::new(2, 8);
        assert_eq!(model.heights.value(&key), Some(100.0));
        assert_eq!(model.interval_heights.value(&key), Some(25.0));
    }

    #[test]
    fn test_pad_grid() {
        let single = pad_grid(GridBounds::new(GridKey::new(5, 8)));
        assert_eq!((single.min_x, single.max_x), (4, 7));
        assert_eq!((single.min_y, single.max_y), (7, 10));

        let mut wide = GridBounds::new(GridKey::new(0, 0));
        wide.include(GridKey::new(10, 3));
        let wide = pad_grid(wide);
        assert_eq!((wide.min_x, wide.max_x), (0, 10));
        assert_eq!((wide.min_y, wide.max_y), (-1, 3));
    }

    #[test]
    fn test_pad_grid_at_index_limits() {
        let top = pad_grid(GridBounds::new(GridKey::new(i64::MAX, i64::MAX)));
        assert_eq!(top.max_x, i64::MAX);
        assert_eq!(top.width(), 3);
        assert_eq!(top.height(), 3);

        let bottom = pad_grid(GridBounds::new(GridKey::new(i64::MIN, 0)));
        assert_eq!(bottom.min_x, i64::MIN);
        assert!(bottom.width() >= MIN_MESH_BINS);
    }

    #[test]
    fn test_extreme_power_values_stay_total() {
        let ride = Ride::new(
            vec![
                sample(0.0, f64::INFINITY, 80.0),
                sample(1.0, 1e300, 80.0),
                sample(2.0, 200.0, 80.0),
            ],
            1.0,
        );
        let model = build(&ride, &settings(Channel::Power, Channel::Power), None);

        assert!(model.is_ready());
        assert_eq!(model.heights.len(), 2);
        assert!(model.mesh.columns >= 3 && model.mesh.rows >= 3);
        assert!(model.scale.x >= 1.0 && model.scale.y >= 1.0 && model.scale.z >= 1.0);

        let only_infinite = Ride::new(vec![sample(0.0, f64::INFINITY, 80.0)], 1.0);
        let model = build(&only_infinite, &settings(Channel::Power, Channel::Power), None);
        assert!(matches!(model.status, ModelStatus::Placeholder { .. }));
    }

    #[test]
    fn test_mesh_and_domain() {
        let ride = Ride::new(vec![sample(0.0, 100.0, 80.0)], 1.0);
        let model = build(&ride, &settings(Channel::Power, Channel::Power), None);

        assert_eq!(model.mesh, Mesh { columns: 4, rows: 4 });
        assert_eq!(model.domain.min_x, 50.0);
        assert_eq!(model.domain.max_x, 200.0);
        assert_eq!(model.domain.min_y, 70.0);
        assert_eq!(model.domain.max_y, 100.0);
        assert_eq!(model.mesh_cells().count(), 16);
    }

    #[test]
    fn test_bar_half_width_uses_tighter_axis() {
        let bins = BinWidths::new(50.0, 10.0);
        // x: 0.8 * (50 / 200) / 2 = 0.1 -> 15; y: 0.8 * (10 / 40) / 2 = 0.1 -> 3
        let diag = bar_half_width(150.0, 30.0, &bins);
        assert!((diag - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_dominant_axis() {
        let bins = BinWidths::new(1.0, 1.0);
        let scale = normalize_scale(100.0, 50.0, 20.0, &bins);
        assert_eq!(scale, AxisScale { x: 1.0, y: 2.0, z: 5.0 });

        let scale = normalize_scale(10.0, 40.0, 20.0, &bins);
        assert_eq!(scale, AxisScale { x: 4.0, y: 1.0, z: 2.0 });

        let scale = normalize_scale(10.0, 20.0, 80.0, &bins);
        assert_eq!(scale, AxisScale { x: 8.0, y: 4.0, z: 1.0 });
    }

    #[test]
    fn test_scale_with_flat_heights() {
        let bins = BinWidths::new(50.0, 10.0);
        let scale = normalize_scale(150.0, 30.0, 0.0, &bins);
        assert!(scale.z.is_finite());
        assert_eq!(scale.x, 1.0);
        assert_eq!(scale.z, 15.0);

        // same data, finer y bins: only the flat z factor moves
        let scale = normalize_scale(150.0, 30.0, 0.0, &BinWidths::new(50.0, 5.0));
        assert_eq!(scale.y, 5.0);
        assert_eq!(scale.z, 30.0);
    }

    #[test]
    fn test_mesh_cells_cover_domain() {
        let ride = Ride::new(vec![sample(0.0, 100.0, 80.0), sample(1.0, 400.0, 120.0)], 1.0);
        let model = build(&ride, &settings(Channel::Power, Channel::Power), None);

        let cells: Vec<_> = model.mesh_cells().collect();
        assert_eq!(cells.len(), model.mesh.columns * model.mesh.rows);
        assert!(cells
            .iter()
            .all(|&(_, x, y)| x >= model.domain.min_x && x <= model.domain.max_x && y >= model.domain.min_y && y <= model.domain.max_y));
        assert_eq!(model.height_at(100.0, 80.0), Some(100.0));
        assert_eq!(model.height_at(150.0, 80.0), None);
    }
}
