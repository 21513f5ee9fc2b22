use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single recorded sample from a ride file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Elapsed time from ride start in seconds
    pub secs: f64,

    /// Power output in watts
    pub watts: f64,

    /// Cadence in revolutions per minute
    pub cad: f64,

    /// Heart rate in beats per minute
    pub hr: f64,

    /// Speed in kilometres per hour
    pub kph: f64,

    /// Altitude in metres
    pub alt: f64,

    /// Pedal force (torque) in newton metres
    pub nm: f64,

    /// Elapsed distance in kilometres
    pub km: f64,

    /// Interval marker recorded by the device (0 means none)
    pub interval: f64,

    /// Latitude in degrees
    pub lat: f64,

    /// Longitude in degrees
    pub lon: f64,
}

impl Sample {
    /// Create a sample at the given time with every channel zeroed
    pub fn at(secs: f64) -> Self {
        Self {
            secs,
            ..Default::default()
        }
    }
}

/// A user- or ride-defined time window of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Window start in seconds (inclusive)
    pub start: f64,

    /// Window stop in seconds (inclusive)
    pub stop: f64,

    /// Display label
    pub label: String,
}

impl Interval {
    pub fn new(start: f64, stop: f64, label: impl Into<String>) -> Self {
        Self {
            start,
            stop,
            label: label.into(),
        }
    }

    /// Whether the window contains the given elapsed time, bounds inclusive
    pub fn contains(&self, secs: f64) -> bool {
        secs >= self.start && secs <= self.stop
    }
}

impl std::str::FromStr for Interval {
    type Err = String;

    /// Parse `start:stop` or `start:stop:label` (seconds)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let start = parts
            .next()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .ok_or_else(|| format!("Invalid interval start in '{}'", s))?;
        let stop = parts
            .next()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .ok_or_else(|| format!("Invalid interval stop in '{}'", s))?;
        let label = parts
            .next()
            .map(|l| l.trim().to_string())
            .unwrap_or_else(|| format!("{}-{}", start, stop));

        Ok(Interval::new(start, stop, label))
    }
}

/// The ride data source consumed by the model
pub trait RideData {
    /// Samples in recording order
    fn samples(&self) -> &[Sample];

    /// Fixed recording interval of the ride in seconds
    fn recording_interval_secs(&self) -> f64;

    /// Total ride duration in seconds
    fn duration_secs(&self) -> f64;

    /// Ride date, used to choose the zone range in force
    fn date(&self) -> Option<NaiveDate>;
}

/// An imported ride
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    /// Original file name or source identifier
    pub source: Option<String>,

    /// Date the ride took place
    pub date: Option<NaiveDate>,

    /// Recording interval in seconds
    pub recording_interval: f64,

    /// Time-series samples
    pub samples: Vec<Sample>,
}

impl Ride {
    pub fn new(samples: Vec<Sample>, recording_interval: f64) -> Self {
        Self {
            source: None,
            date: None,
            recording_interval,
            samples,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Derive intervals from contiguous runs of the same non-zero interval marker
    pub fn intervals_from_markers(&self) -> Vec<Interval> {
        let mut intervals: Vec<Interval> = Vec::new();
        let mut current: Option<(f64, f64, f64)> = None; // (marker, start, stop)

        for sample in &self.samples {
            match current {
                Some((marker, start, _)) if marker == sample.interval => {
                    current = Some((marker, start, sample.secs));
                }
                _ => {
                    if let Some((marker, start, stop)) = current.take() {
                        if marker != 0.0 {
                            intervals.push(Interval::new(start, stop, format!("Interval {}", marker)));
                        }
                    }
                    current = Some((sample.interval, sample.secs, sample.secs));
                }
            }
        }

        if let Some((marker, start, stop)) = current {
            if marker != 0.0 {
                intervals.push(Interval::new(start, stop, format!("Interval {}", marker)));
            }
        }

        intervals
    }
}

impl RideData for Ride {
    fn samples(&self) -> &[Sample] {
        &self.samples
    }

    fn recording_interval_secs(&self) -> f64 {
        self.recording_interval
    }

    /// Last sample time plus one recording interval, 0 for an empty ride
    fn duration_secs(&self) -> f64 {
        self.samples
            .last()
            .map(|last| last.secs + self.recording_interval)
            .unwrap_or(0.0)
    }

    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// RGBA color with channels in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Build from 8-bit channels, fully opaque
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::opaque(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    pub const BLACK: Rgba = Rgba::opaque(0.0, 0.0, 0.0);

    /// Returned for cells that hold no color value
    pub const TRANSPARENT_WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 0.0);

    /// 8-bit channels, alpha dropped
    pub fn to_rgb8(&self) -> (u8, u8, u8) {
        let to8 = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        (to8(self.r), to8(self.g), to8(self.b))
    }
}

/// A point in plot space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// The (x, y, height) triple handed to the per-cell rendering callback
pub type Triple = Point3;
