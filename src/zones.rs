//! Power zone configuration consumed by zone-based coloring
//!
//! The model only needs four things from a zone configuration: how many
//! zones a range has, which zone a value falls in, the color of a zone and
//! which range applies to a ride. `ZoneSource` captures that contract;
//! `PowerZoneRanges` implements it with FTP-based Coggan zones that change
//! over time as the athlete's FTP is re-tested.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::color::hsv_to_rgb;
use crate::models::{RideData, Rgba};

/// Errors that can occur while configuring zones
#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    #[error("Invalid threshold value: {0}")]
    InvalidThreshold(String),
}

/// Zone configuration source
pub trait ZoneSource {
    /// Number of zones in a range
    fn zone_count(&self, range: usize) -> usize;

    /// 0-based zone index for a value
    fn zone_index_for(&self, range: usize, value: f64) -> usize;

    /// Display color of a zone
    fn zone_color(&self, index: usize, total: usize) -> Rgba;

    /// Range in force for a ride, `None` when no zones are configured for it
    fn current_zone_range(&self, ride: &dyn RideData) -> Option<usize>;
}

/// Upper bounds of zones 1-6 as a fraction of FTP; zone 7 is open ended
///
/// - Z1: < 55% FTP (Active Recovery)
/// - Z2: 55-74% FTP (Endurance)
/// - Z3: 75-89% FTP (Tempo)
/// - Z4: 90-104% FTP (Lactate Threshold)
/// - Z5: 105-120% FTP (VO2 Max)
/// - Z6: 121-150% FTP (Anaerobic Capacity)
/// - Z7: > 150% FTP (Sprint Power)
pub const COGGAN_ZONE_FRACTIONS: [f64; 6] = [0.55, 0.74, 0.89, 1.04, 1.20, 1.50];

/// Default zone colors, zone 1 first
const ZONE_PALETTE: [(u8, u8, u8); 10] = [
    (255, 0, 255),
    (42, 0, 255),
    (0, 170, 255),
    (0, 255, 128),
    (85, 255, 0),
    (255, 213, 0),
    (255, 102, 0),
    (255, 0, 0),
    (10, 10, 10),
    (10, 10, 10),
];

/// A power zone range effective from a given date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerZoneRange {
    /// First day the range applies (None = since forever)
    pub from: Option<NaiveDate>,

    /// Functional Threshold Power in watts
    pub ftp: u16,
}

impl PowerZoneRange {
    pub fn new(from: Option<NaiveDate>, ftp: u16) -> Result<Self, ZoneError> {
        if !(50..=800).contains(&ftp) {
            return Err(ZoneError::InvalidThreshold(format!(
                "FTP must be between 50 and 800 watts, got {}",
                ftp
            )));
        }
        Ok(Self { from, ftp })
    }

    /// Zone upper bounds in watts
    pub fn thresholds(&self) -> Vec<f64> {
        COGGAN_ZONE_FRACTIONS
            .iter()
            .map(|fraction| (self.ftp as f64 * fraction).round())
            .collect()
    }

    /// 0-based zone for a power value, values on a bound belong to the lower zone
    pub fn which_zone(&self, watts: f64) -> usize {
        self.thresholds()
            .iter()
            .take_while(|&&upper| watts > upper)
            .count()
    }
}

/// Date-ordered FTP history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerZoneRanges {
    ranges: Vec<PowerZoneRange>,
}

impl PowerZoneRanges {
    pub fn new(mut ranges: Vec<PowerZoneRange>) -> Self {
        ranges.sort_by_key(|range| range.from);
        Self { ranges }
    }

    /// A single range valid for every ride
    pub fn from_ftp(ftp: u16) -> Result<Self, ZoneError> {
        Ok(Self::new(vec![PowerZoneRange::new(None, ftp)?]))
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn range(&self, index: usize) -> Option<&PowerZoneRange> {
        self.ranges.get(index)
    }

    /// Latest range starting on or before the date
    pub fn range_for_date(&self, date: Option<NaiveDate>) -> Option<usize> {
        match date {
            Some(date) => self
                .ranges
                .iter()
                .rposition(|range| range.from.map_or(true, |from| from <= date)),
            None => self.ranges.len().checked_sub(1),
        }
    }
}

impl ZoneSource for PowerZoneRanges {
    fn zone_count(&self, range: usize) -> usize {
        self.ranges
            .get(range)
            .map(|_| COGGAN_ZONE_FRACTIONS.len() + 1)
            .unwrap_or(0)
    }

    fn zone_index_for(&self, range: usize, value: f64) -> usize {
        self.ranges
            .get(range)
            .map(|r| r.which_zone(value))
            .unwrap_or(0)
    }

    fn zone_color(&self, index: usize, total: usize) -> Rgba {
        zone_color(index, total)
    }

    fn current_zone_range(&self, ride: &dyn RideData) -> Option<usize> {
        self.range_for_date(ride.date())
    }
}

/// Palette color for a zone, falling back to an even hue sweep past the palette
pub fn zone_color(index: usize, total: usize) -> Rgba {
    match ZONE_PALETTE.get(index) {
        Some(&(r, g, b)) => Rgba::from_rgb8(r, g, b),
        None => {
            let position = index as f64 / total.max(index + 1) as f64;
            hsv_to_rgb(255.0 * position, 1.0, 1.0)
        }
    }
}
