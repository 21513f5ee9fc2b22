//! Channel selection and per-sample classification
//!
//! A channel names a scalar derived from a ride sample. The plot binds one
//! channel to each of the x, y and z axes and one to the color scale.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SettingsError;
use crate::models::Sample;

/// Scalar channels that can be bound to a plot axis or to color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// No channel selected
    None,
    Power,
    Cadence,
    HeartRate,
    Speed,
    Altitude,
    PedalForce,
    /// Elapsed time
    Time,
    /// Elapsed distance
    Distance,
    Interval,
    Latitude,
    Longitude,
    /// Share of the ride spent in each x/y cell
    TimeAtCell,
    /// Power zone of the cell average
    PowerZone,
}

impl Channel {
    pub const ALL: [Channel; 14] = [
        Channel::None,
        Channel::Power,
        Channel::Cadence,
        Channel::HeartRate,
        Channel::Speed,
        Channel::Altitude,
        Channel::PedalForce,
        Channel::Time,
        Channel::Distance,
        Channel::Interval,
        Channel::Latitude,
        Channel::Longitude,
        Channel::TimeAtCell,
        Channel::PowerZone,
    ];

    /// Classify a sample for this channel.
    ///
    /// Time-at-cell and power-zone depend on aggregation context: the first
    /// classifies to 1 (the aggregator substitutes the recording interval),
    /// the second to raw watts (zone lookup happens after averaging).
    pub fn classify(&self, sample: &Sample) -> f64 {
        match self {
            Channel::Power => sample.watts,
            Channel::Cadence => sample.cad,
            Channel::HeartRate => sample.hr,
            Channel::Speed => sample.kph,
            Channel::Altitude => sample.alt,
            Channel::PedalForce => sample.nm,
            Channel::Time => sample.secs,
            Channel::Distance => sample.km,
            Channel::Interval => sample.interval,
            Channel::Latitude => sample.lat,
            Channel::Longitude => sample.lon,
            Channel::TimeAtCell => 1.0,
            Channel::PowerZone => sample.watts,
            Channel::None => 0.0,
        }
    }

    /// Channels whose values accumulate durations rather than average samples
    pub fn is_time_at_cell(&self) -> bool {
        matches!(self, Channel::TimeAtCell)
    }

    /// Axis label
    pub fn long_description(&self) -> &'static str {
        match self {
            Channel::Power => "Power (watts)",
            Channel::Cadence => "Cadence (rpm)",
            Channel::HeartRate => "Heartrate (bpm)",
            Channel::Speed => "Speed (kph)",
            Channel::Altitude => "Altitude (meters)",
            Channel::PedalForce => "Pedal Force (nm)",
            Channel::Time => "Elapsed Time (secs)",
            Channel::Distance => "Elapsed Distance (km)",
            Channel::Interval => "Interval Number",
            Channel::Latitude => "Latitude (degree offset)",
            Channel::Longitude => "Longitude (degree offset)",
            Channel::TimeAtCell => "Time at X/Y (%)",
            Channel::PowerZone => "Power Zone",
            Channel::None => "Unknown",
        }
    }

    /// Legend title
    pub fn short_description(&self) -> &'static str {
        match self {
            Channel::Power => "Power",
            Channel::Cadence => "Cadence",
            Channel::HeartRate => "Heartrate",
            Channel::Speed => "Speed",
            Channel::Altitude => "Altitude",
            Channel::PedalForce => "Pedal Force",
            Channel::Time => "Time",
            Channel::Distance => "Distance",
            Channel::Interval => "Interval",
            Channel::Latitude => "Latitude",
            Channel::Longitude => "Longitude",
            Channel::TimeAtCell => "Time at X/Y",
            Channel::PowerZone => "Zone",
            Channel::None => "None",
        }
    }

    /// Identifier accepted by `FromStr`
    pub fn name(&self) -> &'static str {
        match self {
            Channel::None => "none",
            Channel::Power => "power",
            Channel::Cadence => "cadence",
            Channel::HeartRate => "heart-rate",
            Channel::Speed => "speed",
            Channel::Altitude => "altitude",
            Channel::PedalForce => "pedal-force",
            Channel::Time => "time",
            Channel::Distance => "distance",
            Channel::Interval => "interval",
            Channel::Latitude => "latitude",
            Channel::Longitude => "longitude",
            Channel::TimeAtCell => "time-at-cell",
            Channel::PowerZone => "power-zone",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Channel {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "none" => Ok(Channel::None),
            "power" | "watts" => Ok(Channel::Power),
            "cadence" | "cad" => Ok(Channel::Cadence),
            "heart-rate" | "heartrate" | "hr" => Ok(Channel::HeartRate),
            "speed" | "kph" => Ok(Channel::Speed),
            "altitude" | "alt" => Ok(Channel::Altitude),
            "pedal-force" | "nm" | "torque" => Ok(Channel::PedalForce),
            "time" | "secs" => Ok(Channel::Time),
            "distance" | "km" => Ok(Channel::Distance),
            "interval" => Ok(Channel::Interval),
            "latitude" | "lat" => Ok(Channel::Latitude),
            "longitude" | "lon" | "long" => Ok(Channel::Longitude),
            "time-at-cell" | "xytime" => Ok(Channel::TimeAtCell),
            "power-zone" | "zone" => Ok(Channel::PowerZone),
            _ => Err(SettingsError::UnknownChannel(s.to_string())),
        }
    }
}
