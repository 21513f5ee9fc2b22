//! Per-cell bar colors and the legend scale

use serde::{Deserialize, Serialize};

use crate::grid::{BinWidths, CellMap, GridKey, ValueRange};
use crate::models::Rgba;

/// Continuous legends are sampled at this many points
pub const LEGEND_STEPS: usize = 100;

/// Hue sweep used by the continuous color ramp, in degrees
const HUE_SWEEP: f64 = 255.0;

/// Convert HSV (hue in degrees, saturation and value in 0..=1) to opaque RGBA
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgba {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = value * saturation;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = value - c;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgba::opaque(r + m, g + m, b + m)
}

/// Maps grid cells to display colors.
///
/// In zone mode a cell holds a 1-based zone number and is colored from the
/// zone table. Otherwise the value is placed on a red-to-blue hue ramp
/// between the color bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorProvider {
    values: CellMap,
    bins: BinWidths,
    range: ValueRange,
    zone_table: Vec<Rgba>,
}

impl ColorProvider {
    pub fn new(values: CellMap, bins: BinWidths) -> Self {
        let range = values.value_range().unwrap_or_else(|| ValueRange::new(0.0));
        Self {
            values,
            bins,
            range,
            zone_table: Vec::new(),
        }
    }

    /// Switch to zone mode with one color per zone, zone 1 first
    pub fn with_zones(mut self, zone_table: Vec<Rgba>) -> Self {
        self.zone_table = zone_table;
        self
    }

    pub fn with_range(mut self, range: ValueRange) -> Self {
        self.range = range;
        self
    }

    pub fn is_zones(&self) -> bool {
        !self.zone_table.is_empty()
    }

    pub fn zone_table(&self) -> &[Rgba] {
        &self.zone_table
    }

    pub fn range(&self) -> ValueRange {
        self.range
    }

    pub fn values(&self) -> &CellMap {
        &self.values
    }

    /// Color of the cell containing plot coordinates (x, y)
    pub fn color_at(&self, x: f64, y: f64) -> Rgba {
        self.color_for_key(&GridKey::from_values(x, y, &self.bins))
    }

    /// Same as [`color_at`](Self::color_at); colors are per cell so z is ignored
    pub fn color_at_z(&self, x: f64, y: f64, _z: f64) -> Rgba {
        self.color_at(x, y)
    }

    pub fn color_for_key(&self, key: &GridKey) -> Rgba {
        match self.values.value(key) {
            Some(value) => self.color_for_value(value),
            None => Rgba::TRANSPARENT_WHITE,
        }
    }

    /// Color a raw value the way a cell holding it would be colored
    pub fn color_for_value(&self, value: f64) -> Rgba {
        if self.is_zones() {
            return self.zone_color(value);
        }

        let span = self.range.span();
        let position = if span > 0.0 {
            (value - self.range.min) / span
        } else {
            0.0
        };
        hsv_to_rgb(HUE_SWEEP * position, 1.0, 1.0)
    }

    fn zone_color(&self, zone: f64) -> Rgba {
        let index = zone - 1.0;
        if index >= 0.0 && (index as usize) < self.zone_table.len() {
            self.zone_table[index as usize]
        } else {
            Rgba::BLACK
        }
    }

    /// Colors for the legend bar: one per zone, or an evenly sampled ramp
    pub fn legend_colors(&self) -> Vec<Rgba> {
        if self.is_zones() {
            return self.zone_table.clone();
        }

        let step = self.range.span() / LEGEND_STEPS as f64;
        (0..LEGEND_STEPS)
            .map(|i| self.color_for_value(self.range.min + i as f64 * step))
            .collect()
    }
}

/// Legend presentation derived from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    pub shown: bool,
    pub title: String,
    pub min: f64,
    pub max: f64,
    /// Major tick count: one per zone, else ten
    pub majors: usize,
    pub minors: usize,
    pub colors: Vec<Rgba>,
}

impl Legend {
    pub fn new(provider: &ColorProvider, title: impl Into<String>, shown: bool) -> Self {
        let range = provider.range();
        let majors = if provider.is_zones() {
            provider.zone_table().len()
        } else {
            10
        };

        Self {
            shown,
            title: title.into(),
            min: range.min,
            max: range.max,
            majors,
            minors: 0,
            colors: provider.legend_colors(),
        }
    }
}
