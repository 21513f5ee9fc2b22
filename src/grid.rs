//! Grid keys, per-cell running aggregates and interval lookup
//!
//! Cells are keyed by bin index rather than by the binned coordinate so that
//! fractional bin widths never collapse neighbouring cells. The binned
//! coordinate of a key is `index * width`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::channel::Channel;
use crate::error::SettingsError;
use crate::models::Interval;

/// Bin widths for the x and y axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinWidths {
    pub x: f64,
    pub y: f64,
}

impl BinWidths {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (axis, width) in [('x', self.x), ('y', self.y)] {
            if !width.is_finite() || width <= 0.0 {
                return Err(SettingsError::InvalidBinWidth { axis, width });
            }
        }
        Ok(())
    }
}

/// Round a value to the nearest bin index (halves away from zero)
pub fn bin_index(value: f64, width: f64) -> i64 {
    (value / width).round() as i64
}

/// Round a value to the nearest binned coordinate
pub fn bin_value(value: f64, width: f64) -> f64 {
    bin_index(value, width) as f64 * width
}

/// One cell of the aggregation grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridKey {
    /// Bin index along x
    pub x: i64,
    /// Bin index along y
    pub y: i64,
}

impl GridKey {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Bin a pair of raw coordinates
    pub fn from_values(x: f64, y: f64, bins: &BinWidths) -> Self {
        Self {
            x: bin_index(x, bins.x),
            y: bin_index(y, bins.y),
        }
    }

    /// Binned plot coordinates of this cell
    pub fn coords(&self, bins: &BinWidths) -> (f64, f64) {
        (self.x as f64 * bins.x, self.y as f64 * bins.y)
    }

    /// Whether either binned coordinate is exactly zero
    pub fn touches_zero(&self) -> bool {
        self.x == 0 || self.y == 0
    }
}

/// How a cell folds in a new sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Running arithmetic mean
    Mean,
    /// Running sum (time-at-cell durations)
    Accumulate,
}

impl UpdateMode {
    pub fn for_channel(channel: Channel) -> Self {
        if channel.is_time_at_cell() {
            UpdateMode::Accumulate
        } else {
            UpdateMode::Mean
        }
    }
}

/// Running value and sample count for a single cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellAggregate {
    pub value: f64,
    pub count: u32,
}

impl CellAggregate {
    pub fn add(&mut self, sample: f64, mode: UpdateMode) {
        match mode {
            UpdateMode::Accumulate => self.value += sample,
            UpdateMode::Mean => {
                if self.count > 0 {
                    let n = self.count as f64;
                    self.value = (self.value * n + sample) / (n + 1.0);
                } else {
                    self.value = sample;
                }
            }
        }
        self.count += 1;
    }
}

/// Grid-keyed aggregates. A key is present only once a sample reached it,
/// so "never aggregated" and "aggregated to zero" stay distinct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMap {
    cells: BTreeMap<GridKey, CellAggregate>,
}

impl CellMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, key: GridKey, sample: f64, mode: UpdateMode) {
        self.cells.entry(key).or_default().add(sample, mode);
    }

    pub fn get(&self, key: &GridKey) -> Option<&CellAggregate> {
        self.cells.get(key)
    }

    pub fn value(&self, key: &GridKey) -> Option<f64> {
        self.cells.get(key).map(|cell| cell.value)
    }

    pub fn contains(&self, key: &GridKey) -> bool {
        self.cells.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Cells in key order
    pub fn iter(&self) -> impl Iterator<Item = (&GridKey, &CellAggregate)> {
        self.cells.iter()
    }

    /// Rewrite every stored value in place
    pub fn map_values<F>(&mut self, mut f: F)
    where
        F: FnMut(f64) -> f64,
    {
        for cell in self.cells.values_mut() {
            cell.value = f(cell.value);
        }
    }

    /// Range of stored values, `None` when empty
    pub fn value_range(&self) -> Option<ValueRange> {
        self.cells.values().fold(None, |range, cell| match range {
            None => Some(ValueRange::new(cell.value)),
            Some(mut range) => {
                range.include(cell.value);
                Some(range)
            }
        })
    }
}

/// Observed min/max of a real-valued quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn include(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Observed range of bin indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
}

impl GridBounds {
    pub fn new(key: GridKey) -> Self {
        Self {
            min_x: key.x,
            max_x: key.x,
            min_y: key.y,
            max_y: key.y,
        }
    }

    pub fn include(&mut self, key: GridKey) {
        self.min_x = self.min_x.min(key.x);
        self.max_x = self.max_x.max(key.x);
        self.min_y = self.min_y.min(key.y);
        self.max_y = self.max_y.max(key.y);
    }

    /// Number of bins between min and max along x
    pub fn width(&self) -> i64 {
        self.max_x.saturating_sub(self.min_x)
    }

    /// Number of bins between min and max along y
    pub fn height(&self) -> i64 {
        self.max_y.saturating_sub(self.min_y)
    }
}

/// Above this many intervals the lookup switches to binary search
pub const LINEAR_SCAN_LIMIT: usize = 16;

/// First-match lookup of the selected interval containing a sample time.
///
/// Intervals are expected not to overlap. When two share a boundary the one
/// listed first by the caller wins, whichever lookup strategy is in use.
#[derive(Debug)]
pub struct IntervalIndex<'a> {
    intervals: &'a [Interval],
    by_start: Vec<usize>,
}

impl<'a> IntervalIndex<'a> {
    pub fn new(intervals: &'a [Interval]) -> Self {
        let mut by_start = Vec::new();
        if intervals.len() > LINEAR_SCAN_LIMIT {
            by_start = (0..intervals.len()).collect();
            by_start.sort_by(|&a, &b| {
                intervals[a]
                    .start
                    .total_cmp(&intervals[b].start)
                    .then(a.cmp(&b))
            });
        }
        Self {
            intervals,
            by_start,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Caller-order index of the first interval containing `secs`
    pub fn find(&self, secs: f64) -> Option<usize> {
        if self.by_start.is_empty() {
            return self.intervals.iter().position(|i| i.contains(secs));
        }

        let end = self
            .by_start
            .partition_point(|&i| self.intervals[i].start <= secs);

        self.by_start[..end]
            .iter()
            .rev()
            .take_while(|&&i| self.intervals[i].contains(secs))
            .copied()
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binning_rounds_to_nearest() {
        assert_eq!(bin_index(120.0, 50.0), 2);
        assert_eq!(bin_index(124.0, 50.0), 2);
        assert_eq!(bin_index(125.0, 50.0), 3);
        assert_eq!(bin_index(-26.0, 50.0), -1);
        assert_eq!(bin_value(81.0, 10.0), 80.0);
        assert_eq!(bin_value(0.74, 0.5), 0.5);
    }

    #[test]
    fn test_grid_key_from_values() {
        let bins = BinWidths::new(50.0, 10.0);
        let key = GridKey::from_values(140.0, 82.0, &bins);
        assert_eq!(key, GridKey::new(3, 8));
        assert_eq!(key.coords(&bins), (150.0, 80.0));
        assert!(!key.touches_zero());
        assert!(GridKey::from_values(10.0, 82.0, &bins).touches_zero());
    }

    #[test]
    fn test_bin_width_validation() {
        assert!(BinWidths::new(50.0, 10.0).validate().is_ok());
        assert!(BinWidths::new(0.0, 10.0).validate().is_err());
        assert!(BinWidths::new(5.0, -1.0).validate().is_err());
        assert!(BinWidths::new(f64::NAN, 1.0).validate().is_err());
    }

    #[test]
    fn test_first_sample_is_assigned_directly() {
        let mut cell = CellAggregate::default();
        cell.add(42.0, UpdateMode::Mean);
        assert_eq!(cell.value, 42.0);
        assert_eq!(cell.count, 1);
    }

    #[test]
    fn test_incremental_mean() {
        let mut cell = CellAggregate::default();
        for v in [100.0, 120.0, 140.0] {
            cell.add(v, UpdateMode::Mean);
        }
        assert!((cell.value - 120.0).abs() < 1e-9);
        assert_eq!(cell.count, 3);
    }

    #[test]
    fn test_accumulate() {
        let mut cell = CellAggregate::default();
        for _ in 0..4 {
            cell.add(0.5, UpdateMode::Accumulate);
        }
        assert_eq!(cell.value, 2.0);
        assert_eq!(cell.count, 4);
    }

    #[test]
    fn test_cell_map_presence() {
        let mut map = CellMap::new();
        let key = GridKey::new(1, 1);
        assert_eq!(map.value(&key), None);

        map.update(key, 0.0, UpdateMode::Mean);
        assert_eq!(map.value(&key), Some(0.0));
        assert!(map.contains(&key));
    }

    #[test]
    fn test_cell_map_value_range() {
        let mut map = CellMap::new();
        assert!(map.value_range().is_none());

        map.update(GridKey::new(0, 1), 5.0, UpdateMode::Mean);
        map.update(GridKey::new(2, 1), -3.0, UpdateMode::Mean);
        map.update(GridKey::new(4, 1), 9.0, UpdateMode::Mean);

        let range = map.value_range().unwrap();
        assert_eq!((range.min, range.max), (-3.0, 9.0));
        assert_eq!(range.span(), 12.0);
    }

    #[test]
    fn test_grid_bounds() {
        let mut bounds = GridBounds::new(GridKey::new(2, 8));
        bounds.include(GridKey::new(5, 7));
        bounds.include(GridKey::new(3, 10));
        assert_eq!(bounds.width(), 3);
        assert_eq!(bounds.height(), 3);
        assert_eq!(bounds.min_y, 7);
    }

    #[test]
    fn test_grid_bounds_at_index_limits() {
        let mut bounds = GridBounds::new(GridKey::new(i64::MAX, 0));
        bounds.include(GridKey::new(i64::MIN, i64::MIN));
        assert_eq!(bounds.width(), i64::MAX);
        assert_eq!(bounds.height(), i64::MAX);
    }

    #[test]
    fn test_interval_index_linear_first_match() {
        let intervals = vec![
            Interval::new(0.0, 1.0, "a"),
            Interval::new(1.0, 2.0, "b"),
            Interval::new(5.0, 6.0, "c"),
        ];
        let index = IntervalIndex::new(&intervals);
        assert_eq!(index.find(0.5), Some(0));
        assert_eq!(index.find(1.0), Some(0));
        assert_eq!(index.find(1.5), Some(1));
        assert_eq!(index.find(3.0), None);
        assert_eq!(index.find(6.0), Some(2));
    }

    #[test]
    fn test_interval_index_sorted_matches_linear() {
        // listed out of order, more than the linear scan limit
        let mut intervals: Vec<Interval> = (0..40)
            .rev()
            .map(|i| Interval::new(i as f64 * 10.0, i as f64 * 10.0 + 5.0, format!("{}", i)))
            .collect();
        intervals.push(Interval::new(5.0, 8.0, "shared-boundary"));

        let index = IntervalIndex::new(&intervals);
        let mut t = -2.0;
        while t < 410.0 {
            let linear = intervals.iter().position(|i| i.contains(t));
            assert_eq!(index.find(t), linear, "mismatch at t={}", t);
            t += 0.5;
        }
    }
}
