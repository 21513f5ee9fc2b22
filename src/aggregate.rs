//! Online binning of a ride's samples into the x/y grid
//!
//! Each sample is binned on the x and y channels and folded into two height
//! aggregates (all samples, and samples inside the selected intervals) and
//! one color aggregate. Color follows the interval selection when there is
//! one, otherwise it covers every sample.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::Channel;
use crate::error::SettingsError;
use crate::grid::{BinWidths, CellMap, GridBounds, GridKey, IntervalIndex, UpdateMode, ValueRange};
use crate::models::{Interval, RideData};
use crate::render::PlotStyle;

/// Axis bindings and display options for one plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Channel binned along x
    pub x: Channel,

    /// Channel binned along y
    pub y: Channel,

    /// Channel averaged (or accumulated) into bar height
    pub z: Channel,

    /// Channel used to color the bars
    pub color: Channel,

    /// Bin widths for x and y
    pub bins: BinWidths,

    /// Skip samples binned onto x == 0 or y == 0
    pub ignore_zero: bool,

    /// Selected intervals, empty for whole-ride aggregation
    pub intervals: Vec<Interval>,

    /// Show the color legend
    pub legend: bool,

    /// Show gridlines on the back, left and floor planes
    pub grid: bool,

    /// Outline the all-samples bars while intervals are selected
    pub frame: bool,

    /// Rendering style
    pub style: PlotStyle,

    /// Treat an interval height of exactly zero as "no interval data"
    pub zero_interval_is_absent: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            x: Channel::Power,
            y: Channel::Cadence,
            z: Channel::TimeAtCell,
            color: Channel::PowerZone,
            bins: BinWidths::new(10.0, 5.0),
            ignore_zero: true,
            intervals: Vec::new(),
            legend: true,
            grid: true,
            frame: true,
            style: PlotStyle::Bar,
            zero_interval_is_absent: true,
        }
    }
}

impl ModelSettings {
    /// Whether every axis has a channel bound
    pub fn is_complete(&self) -> bool {
        self.x != Channel::None && self.y != Channel::None && self.z != Channel::None
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.bins.validate()?;
        for interval in &self.intervals {
            if interval.start > interval.stop {
                return Err(SettingsError::InvalidInterval {
                    label: interval.label.clone(),
                    start: interval.start,
                    stop: interval.stop,
                });
            }
        }
        Ok(())
    }
}

/// Raw per-cell aggregates from one pass over a ride
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Height aggregate over every sample
    pub heights: CellMap,

    /// Height aggregate over samples inside a selected interval
    pub interval_heights: CellMap,

    /// Color aggregate, interval-scoped when intervals are selected
    pub colors: CellMap,

    /// Observed range of bin indices, `None` when nothing was binned
    pub grid: Option<GridBounds>,

    /// Observed range of raw color values over every binned sample
    pub color_range: Option<ValueRange>,

    /// Whether an interval selection was in effect
    pub intervals_active: bool,

    /// Samples that reached a cell
    pub samples_binned: usize,
}

impl Aggregation {
    /// No cell received a contribution
    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }
}

/// Value a sample contributes for a channel, with time-at-cell substituted
/// by the ride's recording interval
fn contribution(channel: Channel, sample: &crate::models::Sample, recording_interval: f64) -> f64 {
    if channel.is_time_at_cell() {
        recording_interval
    } else {
        channel.classify(sample)
    }
}

/// Bin every sample of a ride into the grid
pub fn aggregate(ride: &dyn RideData, settings: &ModelSettings) -> Result<Aggregation, SettingsError> {
    settings.validate()?;

    let recording_interval = ride.recording_interval_secs();
    let z_mode = UpdateMode::for_channel(settings.z);
    let color_mode = UpdateMode::for_channel(settings.color);
    let index = IntervalIndex::new(&settings.intervals);

    let mut result = Aggregation {
        intervals_active: !index.is_empty(),
        ..Default::default()
    };

    let mut non_finite = 0usize;

    for sample in ride.samples() {
        let (x, y) = (settings.x.classify(sample), settings.y.classify(sample));
        if !x.is_finite() || !y.is_finite() {
            non_finite += 1;
            continue;
        }

        let key = GridKey::from_values(x, y, &settings.bins);

        if settings.ignore_zero && key.touches_zero() {
            continue;
        }

        let z = contribution(settings.z, sample, recording_interval);
        let color = contribution(settings.color, sample, recording_interval);

        match result.grid.as_mut() {
            Some(bounds) => bounds.include(key),
            None => result.grid = Some(GridBounds::new(key)),
        }
        match result.color_range.as_mut() {
            Some(range) => range.include(color),
            None => result.color_range = Some(ValueRange::new(color)),
        }

        result.heights.update(key, z, z_mode);
        result.samples_binned += 1;

        if !result.intervals_active {
            result.colors.update(key, color, color_mode);
        } else if index.find(sample.secs).is_some() {
            result.colors.update(key, color, color_mode);
            result.interval_heights.update(key, z, z_mode);
        }
    }

    debug!(
        samples = ride.samples().len(),
        binned = result.samples_binned,
        non_finite,
        cells = result.heights.len(),
        interval_cells = result.interval_heights.len(),
        "Aggregated ride into grid"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ride, Sample};

    fn sample(secs: f64, watts: f64, cad: f64) -> Sample {
        Sample {
            watts,
            cad,
            hr: 140.0 + secs,
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

    #[test]
    fn test_mean_height_per_cell() {
        let ride = Ride::new(
            vec![sample(0.0, 100.0, 80.0), sample(1.0, 120.0, 82.0), sample(2.0, 140.0, 81.0)],
            1.0,
        );
        let agg = aggregate(&ride, &settings(Channel::Power, Channel::HeartRate)).unwrap();

        // 100 -> bin 2, 120 -> bin 2, 140 -> bin 3
        let low = GridKey::new(2, 8);
        let high = GridKey::new(3, 8);
        assert_eq!(agg.heights.len(), 2);
        assert!((agg.heights.value(&low).unwrap() - 110.0).abs() < 1e-9);
        assert_eq!(agg.heights.value(&high), Some(140.0));
        assert_eq!(agg.heights.get(&low).unwrap().count, 2);
        assert_eq!(agg.samples_binned, 3);
    }

    #[test]
    fn test_time_at_cell_accumulates_recording_interval() {
        let samples = (0..4).map(|i| sample(i as f64 * 2.0, 100.0, 80.0)).collect();
        let ride = Ride::new(samples, 2.0);
        let agg = aggregate(&ride, &settings(Channel::TimeAtCell, Channel::Power)).unwrap();

        let key = GridKey::new(2, 8);
        assert_eq!(agg.heights.value(&key), Some(8.0));
        assert_eq!(agg.heights.get(&key).unwrap().count, 4);
    }

    #[test]
    fn test_ignore_zero_bin_skips_samples() {
        let ride = Ride::new(
            vec![sample(0.0, 0.0, 90.0), sample(1.0, 200.0, 0.0), sample(2.0, 200.0, 90.0)],
            1.0,
        );
        let mut s = settings(Channel::Power, Channel::Power);
        s.ignore_zero = true;
        let agg = aggregate(&ride, &s).unwrap();

        assert_eq!(agg.heights.len(), 1);
        assert!(agg.heights.iter().all(|(key, _)| !key.touches_zero()));
        let bounds = agg.grid.unwrap();
        assert_eq!((bounds.min_x, bounds.max_x), (4, 4));
    }

    #[test]
    fn test_non_finite_coordinates_skipped() {
        let ride = Ride::new(
            vec![
                sample(0.0, f64::INFINITY, 80.0),
                sample(1.0, 200.0, f64::NAN),
                sample(2.0, f64::NEG_INFINITY, 90.0),
                sample(3.0, 200.0, 90.0),
            ],
            1.0,
        );
        let agg = aggregate(&ride, &settings(Channel::Power, Channel::Power)).unwrap();

        assert_eq!(agg.samples_binned, 1);
        assert_eq!(agg.heights.len(), 1);
        let bounds = agg.grid.unwrap();
        assert_eq!((bounds.min_x, bounds.max_x), (4, 4));
    }

    #[test]
    fn test_empty_ride_gives_empty_aggregation() {
        let ride = Ride::new(Vec::new(), 1.0);
        let agg = aggregate(&ride, &settings(Channel::Power, Channel::Power)).unwrap();
        assert!(agg.is_empty());
        assert!(agg.grid.is_none());
        assert!(agg.color_range.is_none());
    }

    #[test]
    fn test_color_covers_all_samples_without_intervals() {
        let ride = Ride::new(vec![sample(0.0, 100.0, 80.0), sample(1.0, 300.0, 80.0)], 1.0);
        let agg = aggregate(&ride, &settings(Channel::Power, Channel::HeartRate)).unwrap();

        assert!(!agg.intervals_active);
        assert_eq!(agg.colors.len(), 2);
        assert!(agg.interval_heights.is_empty());
        let range = agg.color_range.unwrap();
        assert_eq!((range.min, range.max), (140.0, 141.0));
    }

    #[test]
    fn test_interval_scoped_aggregates() {
        let ride = Ride::new(
            vec![
                sample(0.0, 100.0, 80.0),
                sample(1.0, 100.0, 80.0),
                sample(1.5, 200.0, 80.0),
                sample(2.0, 300.0, 80.0),
                sample(3.0, 300.0, 80.0),
            ],
            1.0,
        );
        let mut s = settings(Channel::Power, Channel::Power);
        s.intervals = vec![Interval::new(0.0, 1.0, "first"), Interval::new(2.0, 3.0, "second")];
        let agg = aggregate(&ride, &s).unwrap();

        assert!(agg.intervals_active);
        assert_eq!(agg.heights.len(), 3);
        assert!(agg.interval_heights.contains(&GridKey::new(2, 8)));
        assert!(agg.interval_heights.contains(&GridKey::new(6, 8)));
        assert!(!agg.interval_heights.contains(&GridKey::new(4, 8)));
        assert!(!agg.colors.contains(&GridKey::new(4, 8)));
        // raw color bounds still see every sample
        let range = agg.color_range.unwrap();
        assert_eq!((range.min, range.max), (100.0, 300.0));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let ride = Ride::new(vec![sample(0.0, 100.0, 80.0)], 1.0);

        let mut s = settings(Channel::Power, Channel::Power);
        s.bins = BinWidths::new(0.0, 10.0);
        assert!(matches!(
            aggregate(&ride, &s),
            Err(SettingsError::InvalidBinWidth { axis: 'x', .. })
        ));

        let mut s = settings(Channel::Power, Channel::Power);
        s.intervals = vec![Interval::new(5.0, 1.0, "backwards")];
        assert!(matches!(aggregate(&ride, &s), Err(SettingsError::InvalidInterval { .. })));
    }

    #[test]
    fn test_settings_completeness() {
        let mut s = ModelSettings::default();
        assert!(s.is_complete());
        s.z = Channel::None;
        assert!(!s.is_complete());
    }
}
