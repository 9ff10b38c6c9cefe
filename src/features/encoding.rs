//! Categorical encoding and derived targets
//!
//! Turns imputed observations into fully numeric rows: weather labels become rain flags,
//! the event name is replaced by its track attributes, and the finishing position becomes
//! a relative finish in [0, 1].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::data::dataset::group_by_race;
use crate::features::track::{Environment, TrackCatalog};
use crate::{Observation, PaceError, RaceId, Result, Weather};

/// Model input columns, in `EncodedRow::features` order
pub const FEATURE_NAMES: [&str; 16] = [
    "fp1_long_run",
    "fp2_long_run",
    "fp3_long_run",
    "fp1_rain",
    "fp2_rain",
    "fp3_rain",
    "qualifying_rain",
    "race_rain",
    "qualifying",
    "driver_perf",
    "team_perf",
    "env_street",
    "env_hybrid",
    "env_classic",
    "setup_demand",
    "track_length",
];

/// Fully numeric observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedRow {
    pub race_id: RaceId,
    pub driver: String,
    pub fp1_long_run: f64,
    pub fp2_long_run: f64,
    pub fp3_long_run: f64,
    pub fp1_rain: u8,
    pub fp2_rain: u8,
    pub fp3_rain: u8,
    pub qualifying_rain: u8,
    pub race_rain: u8,
    pub qualifying: u32,
    pub driver_perf: f64,
    pub team_perf: f64,
    pub env_street: u8,
    pub env_hybrid: u8,
    pub env_classic: u8,
    pub setup_demand: u8,
    pub track_length: f64,
    pub race_pace: f64,
    pub relative_finish: f64,
}

impl EncodedRow {
    /// Model inputs in `FEATURE_NAMES` order
    pub fn features(&self) -> Vec<f32> {
        vec![
            self.fp1_long_run as f32,
            self.fp2_long_run as f32,
            self.fp3_long_run as f32,
            self.fp1_rain as f32,
            self.fp2_rain as f32,
            self.fp3_rain as f32,
            self.qualifying_rain as f32,
            self.race_rain as f32,
            self.qualifying as f32,
            self.driver_perf as f32,
            self.team_perf as f32,
            self.env_street as f32,
            self.env_hybrid as f32,
            self.env_classic as f32,
            self.setup_demand as f32,
            self.track_length as f32,
        ]
    }
}

/// Result of encoding a dataset
#[derive(Debug, Clone, Default)]
pub struct Encoded {
    pub rows: Vec<EncodedRow>,
    /// Event names without track metadata; their rows are left out
    pub unknown_tracks: Vec<String>,
}

fn rain(label: Option<Weather>) -> u8 {
    label.map(|w| w.is_rainy() as u8).unwrap_or(0)
}

fn require<T>(value: Option<T>, row: &Observation, column: &str) -> Result<T> {
    value.ok_or_else(|| {
        PaceError::InsufficientData(format!(
            "{} {} has no {} - run the impute stage first",
            row.race_id, row.driver, column
        ))
    })
}

/// Relative finish in [0, 1]: 0 for the winner, 1 for last; 0 in a one-car race
pub fn relative_finish(position: u32, drivers: usize) -> f64 {
    if drivers <= 1 {
        0.0
    } else {
        (position.saturating_sub(1)) as f64 / (drivers - 1) as f64
    }
}

fn encode_row(row: &Observation, catalog: &TrackCatalog, drivers: usize) -> Result<EncodedRow> {
    let track = catalog.lookup(&row.track_type)?;
    let finishing = require(row.finishing_position, row, "finishing_position")?;

    Ok(EncodedRow {
        race_id: row.race_id,
        driver: row.driver.clone(),
        fp1_long_run: require(row.fp1_long_run, row, "fp1_long_run")?,
        fp2_long_run: require(row.fp2_long_run, row, "fp2_long_run")?,
        fp3_long_run: require(row.fp3_long_run, row, "fp3_long_run")?,
        fp1_rain: rain(row.fp1_weather),
        fp2_rain: rain(row.fp2_weather),
        fp3_rain: rain(row.fp3_weather),
        qualifying_rain: rain(row.qualifying_weather),
        race_rain: rain(row.race_weather),
        qualifying: require(row.qualifying, row, "qualifying")?,
        driver_perf: row.driver_perf,
        team_perf: row.team_perf,
        env_street: (track.environment == Environment::Street) as u8,
        env_hybrid: (track.environment == Environment::Hybrid) as u8,
        env_classic: (track.environment == Environment::Classic) as u8,
        setup_demand: track.setup_demand.ordinal(),
        track_length: track.length_km,
        race_pace: require(row.race_pace, row, "race_pace")?,
        relative_finish: relative_finish(finishing, drivers),
    })
}

/// Encode imputed observations
///
/// Rows at events missing from the catalog are skipped and their names reported; any
/// other missing value is an error.
pub fn encode(rows: &[Observation], catalog: &TrackCatalog) -> Result<Encoded> {
    let mut encoded = Encoded::default();
    let mut unknown = BTreeSet::new();

    for (_, members) in group_by_race(rows, |r| r.race_id) {
        let drivers = members.len();
        for &i in &members {
            let row = &rows[i];
            if catalog.get(&row.track_type).is_none() {
                unknown.insert(row.track_type.clone());
                continue;
            }
            encoded.rows.push(encode_row(row, catalog, drivers)?);
        }
    }

    for name in &unknown {
        log::warn!("No track metadata for {}, rows skipped", name);
    }
    encoded.unknown_tracks = unknown.into_iter().collect();
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::observation;

    fn imputed(race: &str, driver: &str, finish: u32) -> Observation {
        let mut row = observation(race, driver);
        row.set_long_runs([Some(92.5), Some(93.0), Some(92.0)]);
        row.fp2_weather = Some(Weather::Dry);
        row.fp3_weather = Some(Weather::Rainy);
        row.finishing_position = Some(finish);
        row
    }

    #[test]
    fn test_relative_finish() {
        assert_eq!(relative_finish(1, 20), 0.0);
        assert_eq!(relative_finish(20, 20), 1.0);
        assert_eq!(relative_finish(1, 1), 0.0);
        assert!((relative_finish(3, 5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_encode_monaco_row() {
        let rows = vec![imputed("24-08", "LEC", 1), imputed("24-08", "PIA", 3), imputed("24-08", "SAI", 2)];
        let encoded = encode(&rows, &TrackCatalog::builtin()).unwrap();
        assert_eq!(encoded.rows.len(), 3);
        assert!(encoded.unknown_tracks.is_empty());

        let lec = &encoded.rows[0];
        assert_eq!(lec.env_street, 1);
        assert_eq!(lec.env_hybrid + lec.env_classic, 0);
        assert_eq!(lec.setup_demand, 2);
        assert_eq!(lec.track_length, 3.337);
        assert_eq!((lec.fp1_rain, lec.fp2_rain, lec.fp3_rain), (0, 0, 1));
        assert_eq!(lec.qualifying_rain, 1);
        assert_eq!(lec.relative_finish, 0.0);
        assert_eq!(encoded.rows[1].relative_finish, 1.0);
        assert_eq!(encoded.rows[2].relative_finish, 0.5);
    }

    #[test]
    fn test_feature_vector_matches_names() {
        let rows = vec![imputed("24-08", "LEC", 1)];
        let encoded = encode(&rows, &TrackCatalog::builtin()).unwrap();
        let features = encoded.rows[0].features();
        assert_eq!(features.len(), FEATURE_NAMES.len());
        let qualifying = FEATURE_NAMES.iter().position(|&n| n == "qualifying").unwrap();
        assert_eq!(features[qualifying], 3.0);
    }

    #[test]
    fn test_unknown_track_skipped() {
        let mut rows = vec![imputed("24-08", "LEC", 1), imputed("24-09", "VER", 1)];
        rows[1].track_type = "Atlantis Grand Prix".to_string();

        let encoded = encode(&rows, &TrackCatalog::builtin()).unwrap();
        assert_eq!(encoded.rows.len(), 1);
        assert_eq!(encoded.unknown_tracks, vec!["Atlantis Grand Prix".to_string()]);
    }

    #[test]
    fn test_missing_value_is_error() {
        let mut rows = vec![imputed("24-08", "LEC", 1)];
        rows[0].fp2_long_run = None;
        assert!(matches!(
            encode(&rows, &TrackCatalog::builtin()),
            Err(PaceError::InsufficientData(_))
        ));
    }
}
