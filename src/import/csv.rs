use chrono::{DateTime, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ImportError;
use crate::import::ImportFormat;
use crate::models::{Ride, Sample};

/// Recording interval assumed when the file gives no usable time steps
pub const DEFAULT_RECORDING_INTERVAL: f64 = 1.0;

/// Columns a ride CSV can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    Time,
    Power,
    Cadence,
    HeartRate,
    Speed,
    Altitude,
    Torque,
    Distance,
    Interval,
    Latitude,
    Longitude,
}

/// CSV importer with flexible column mapping
pub struct CsvImporter {
    column_mapping: HashMap<String, Column>,
    default_recording_interval: f64,
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        // Common column name variations
        Self::add_mapping(
            &mut column_mapping,
            Column::Time,
            &["secs", "seconds", "time", "timestamp", "elapsed_time", "elapsed"],
        );
        Self::add_mapping(&mut column_mapping, Column::Power, &["watts", "power", "power_watts"]);
        Self::add_mapping(&mut column_mapping, Column::Cadence, &["cad", "cadence", "rpm"]);
        Self::add_mapping(
            &mut column_mapping,
            Column::HeartRate,
            &["hr", "heart_rate", "heartrate", "bpm"],
        );
        Self::add_mapping(&mut column_mapping, Column::Speed, &["kph", "speed", "speed_kmh"]);
        Self::add_mapping(
            &mut column_mapping,
            Column::Altitude,
            &["alt", "altitude", "elevation", "elev"],
        );
        Self::add_mapping(
            &mut column_mapping,
            Column::Torque,
            &["nm", "torque", "pedal_force"],
        );
        Self::add_mapping(&mut column_mapping, Column::Distance, &["km", "distance", "dist"]);
        Self::add_mapping(&mut column_mapping, Column::Interval, &["interval", "lap", "interval_id"]);
        Self::add_mapping(&mut column_mapping, Column::Latitude, &["lat", "latitude", "position_lat"]);
        Self::add_mapping(
            &mut column_mapping,
            Column::Longitude,
            &["lon", "lng", "longitude", "position_long"],
        );

        Self {
            column_mapping,
            default_recording_interval: DEFAULT_RECORDING_INTERVAL,
        }
    }

    /// Recording interval used when it cannot be inferred from the time column
    pub fn with_default_recording_interval(mut self, secs: f64) -> Self {
        self.default_recording_interval = secs;
        self
    }

    fn add_mapping(mapping: &mut HashMap<String, Column>, column: Column, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), column);
        }
    }

    fn column_for(&self, name: &str) -> Option<Column> {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");
        self.column_mapping.get(&normalized).copied()
    }

    fn parse_datetime(date_str: &str) -> Option<DateTime<Utc>> {
        let formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%SZ",
            "%Y-%m-%dT%H:%M:%S%.fZ",
        ];

        formats.iter().find_map(|format| {
            NaiveDateTime::parse_from_str(date_str, format)
                .ok()
                .map(|naive_dt| DateTime::from_naive_utc_and_offset(naive_dt, Utc))
        })
    }

    fn parse_number(value: &str, record: usize, column: &str) -> Result<f64, ImportError> {
        value
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .ok_or_else(|| ImportError::ParseError {
                record,
                reason: format!("'{}' is not a finite number in column '{}'", value, column),
            })
    }

    fn read_rows(&self, file_path: &Path) -> Result<(Vec<Sample>, Option<DateTime<Utc>>), ImportError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(file_path)?;

        let headers = reader.headers()?.clone();
        let columns: Vec<(usize, Column, String)> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, header)| self.column_for(header).map(|column| (i, column, header.to_string())))
            .collect();

        let has_time = columns.iter().any(|(_, column, _)| *column == Column::Time);
        if !has_time {
            debug!(
                file = %file_path.display(),
                interval = self.default_recording_interval,
                "No time column, spacing samples evenly"
            );
        }

        let mut start_time = None;
        let mut samples = Vec::new();

        for (row, result) in reader.records().enumerate() {
            let record = result?;
            let record_number = row + 1;
            let mut sample = Sample::at(row as f64 * self.default_recording_interval);

            for (i, column, header) in &columns {
                let value = match record.get(*i) {
                    Some(value) if !value.is_empty() => value,
                    _ => continue,
                };

                if *column == Column::Time {
                    if let Some(dt) = Self::parse_datetime(value) {
                        let start = *start_time.get_or_insert(dt);
                        sample.secs = (dt - start).num_milliseconds().max(0) as f64 / 1000.0;
                        continue;
                    }
                }

                let number = Self::parse_number(value, record_number, header)?;
                match column {
                    Column::Time => sample.secs = number,
                    Column::Power => sample.watts = number,
                    Column::Cadence => sample.cad = number,
                    Column::HeartRate => sample.hr = number,
                    Column::Speed => sample.kph = number,
                    Column::Altitude => sample.alt = number,
                    Column::Torque => sample.nm = number,
                    Column::Distance => sample.km = number,
                    Column::Interval => sample.interval = number,
                    Column::Latitude => sample.lat = number,
                    Column::Longitude => sample.lon = number,
                }
            }

            samples.push(sample);
        }

        Ok((samples, start_time))
    }

    /// Most frequent positive step between consecutive sample times
    pub fn infer_recording_interval(samples: &[Sample]) -> Option<f64> {
        let mut steps: HashMap<i64, usize> = HashMap::new();
        for pair in samples.windows(2) {
            let step = pair[1].secs - pair[0].secs;
            if step > 0.0 {
                // bucket to the millisecond
                *steps.entry((step * 1000.0).round() as i64).or_default() += 1;
            }
        }

        steps
            .into_iter()
            .max_by(|(a_step, a_count), (b_step, b_count)| a_count.cmp(b_count).then(b_step.cmp(a_step)))
            .map(|(step, _)| step as f64 / 1000.0)
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<Ride, ImportError> {
        let (samples, start_time) = self.read_rows(file_path)?;

        if samples.is_empty() {
            return Err(ImportError::NoSamples {
                path: file_path.to_path_buf(),
            });
        }

        let recording_interval = Self::infer_recording_interval(&samples).unwrap_or_else(|| {
            warn!(
                file = %file_path.display(),
                fallback = self.default_recording_interval,
                "Could not infer recording interval"
            );
            self.default_recording_interval
        });

        let mut ride = Ride::new(samples, recording_interval);
        ride.source = Some(file_path.to_string_lossy().to_string());
        ride.date = start_time.map(|dt| dt.date_naive());

        debug!(
            samples = ride.samples.len(),
            recording_interval,
            "Read ride from CSV"
        );
        Ok(ride)
    }

    fn get_format_name(&self) -> &'static str {
        "CSV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_can_import() {
        let importer = CsvImporter::new();
        assert!(importer.can_import(Path::new("ride.csv")));
        assert!(importer.can_import(Path::new("RIDE.CSV")));
        assert!(!importer.can_import(Path::new("ride.fit")));
    }

    #[test]
    fn test_header_variations() {
        let file = write_csv(
            "Seconds,Power,Cadence,Heart Rate,Speed,Altitude,Torque,Distance,Lap,Lat,Lng\n\
             0,200,90,140,32.5,100,25,0.0,1,45.1,-73.5\n\
             2,210,92,141,33.0,101,26,0.02,1,45.2,-73.6\n",
        );
        let ride = CsvImporter::new().import_file(file.path()).unwrap();

        assert_eq!(ride.samples.len(), 2);
        let s = &ride.samples[1];
        assert_eq!(s.secs, 2.0);
        assert_eq!(s.watts, 210.0);
        assert_eq!(s.cad, 92.0);
        assert_eq!(s.hr, 141.0);
        assert_eq!(s.kph, 33.0);
        assert_eq!(s.alt, 101.0);
        assert_eq!(s.nm, 26.0);
        assert_eq!(s.km, 0.02);
        assert_eq!(s.interval, 1.0);
        assert_eq!(s.lat, 45.2);
        assert_eq!(s.lon, -73.6);
        assert_eq!(ride.recording_interval, 2.0);
    }

    #[test]
    fn test_unknown_columns_ignored_and_blanks_zero() {
        let file = write_csv("secs,watts,notes,hr\n0,150,easy,\n1,,steady,130\n");
        let ride = CsvImporter::new().import_file(file.path()).unwrap();
        assert_eq!(ride.samples[0].hr, 0.0);
        assert_eq!(ride.samples[1].watts, 0.0);
        assert_eq!(ride.samples[1].hr, 130.0);
    }

    #[test]
    fn test_datetime_time_column() {
        let file = write_csv(
            "timestamp,watts\n\
             2024-05-01T08:00:00,100\n\
             2024-05-01T08:00:01,110\n\
             2024-05-01T08:00:02,120\n",
        );
        let ride = CsvImporter::new().import_file(file.path()).unwrap();
        assert_eq!(ride.samples[2].secs, 2.0);
        assert_eq!(ride.date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(ride.recording_interval, 1.0);
    }

    #[test]
    fn test_no_time_column_uses_default_spacing() {
        let file = write_csv("watts,cad\n100,80\n110,81\n120,82\n");
        let ride = CsvImporter::new()
            .with_default_recording_interval(0.5)
            .import_file(file.path())
            .unwrap();
        assert_eq!(ride.samples[2].secs, 1.0);
        assert_eq!(ride.recording_interval, 0.5);
    }

    #[test]
    fn test_single_sample_falls_back_to_default_interval() {
        let file = write_csv("secs,watts\n0,100\n");
        let ride = CsvImporter::new()
            .with_default_recording_interval(4.0)
            .import_file(file.path())
            .unwrap();
        assert_eq!(ride.recording_interval, 4.0);
    }

    #[test]
    fn test_bad_number_reports_record() {
        let file = write_csv("secs,watts\n0,100\n1,lots\n");
        let err = CsvImporter::new().import_file(file.path()).unwrap_err();
        assert!(matches!(err, ImportError::ParseError { record: 2, .. }));
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        for bad in ["inf", "-infinity", "NaN"] {
            let file = write_csv(&format!("secs,watts\n0,100\n1,{}\n", bad));
            let err = CsvImporter::new().import_file(file.path()).unwrap_err();
            assert!(matches!(err, ImportError::ParseError { record: 2, .. }), "accepted {}", bad);
        }
    }

    #[test]
    fn test_empty_file_has_no_samples() {
        let file = write_csv("secs,watts\n");
        let err = CsvImporter::new().import_file(file.path()).unwrap_err();
        assert!(matches!(err, ImportError::NoSamples { .. }));
    }

    #[test]
    fn test_infer_recording_interval_uses_most_common_step() {
        let samples: Vec<Sample> = [0.0, 1.0, 2.0, 3.0, 8.0, 9.0, 9.0]
            .iter()
            .map(|&t| Sample::at(t))
            .collect();
        assert_eq!(CsvImporter::infer_recording_interval(&samples), Some(1.0));
        assert_eq!(CsvImporter::infer_recording_interval(&samples[..1]), None);
    }
}
