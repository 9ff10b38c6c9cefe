//! Exported timing data for one season
//!
//! A season directory holds four CSV files:
//! - `events.csv`: `round,event_name,event_format`
//! - `laps.csv`: `round,session,driver,lap_time` (seconds, empty for an invalid lap)
//! - `results.csv`: `round,session,driver,team,position,points`
//! - `weather.csv`: `round,session,rainfall`

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::Result;

/// Session of a race weekend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Session {
    #[serde(rename = "FP1")]
    Practice1,
    #[serde(rename = "FP2")]
    Practice2,
    #[serde(rename = "FP3")]
    Practice3,
    #[serde(rename = "Q")]
    Qualifying,
    #[serde(rename = "S")]
    Sprint,
    #[serde(rename = "R")]
    Race,
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Session::Practice1 => "FP1",
            Session::Practice2 => "FP2",
            Session::Practice3 => "FP3",
            Session::Qualifying => "Q",
            Session::Sprint => "S",
            Session::Race => "R",
        };
        write!(f, "{}", code)
    }
}

/// One event of the season calendar
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    #[serde(deserialize_with = "loose_int")]
    pub round: u8,
    pub event_name: String,
    pub event_format: String,
}

impl EventRecord {
    /// Sprint weekends run the sprint in place of the second and third practice
    pub fn is_sprint(&self) -> bool {
        self.event_format.trim() == "sprint"
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LapRecord {
    #[serde(deserialize_with = "loose_int")]
    round: u8,
    session: Session,
    driver: String,
    lap_time: Option<f64>,
}

/// One classified driver of a session
#[derive(Debug, Clone, Deserialize)]
pub struct ResultRecord {
    #[serde(deserialize_with = "loose_int")]
    pub round: u8,
    pub session: Session,
    pub driver: String,
    pub team: String,
    #[serde(default, deserialize_with = "loose_optional_int")]
    pub position: Option<u32>,
    pub points: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct WeatherRecord {
    #[serde(deserialize_with = "loose_int")]
    round: u8,
    session: Session,
    /// Blank samples carry no information and are skipped
    #[serde(default, deserialize_with = "loose_bool")]
    rainfall: Option<bool>,
}

/// Accepts `true`/`false` in any case as well as `1`/`0`; blank is `None`
fn loose_bool<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<bool>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "1.0" => Ok(Some(true)),
        "false" | "0" | "0.0" => Ok(Some(false)),
        "" => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "invalid rainfall flag: {}",
            other
        ))),
    }
}

/// Integer cell that may be written as an integral float (`3.0`)
fn parse_loose_int<T: TryFrom<i64>>(raw: &str) -> std::result::Result<T, String> {
    let raw = raw.trim();
    let whole = match raw.parse::<i64>() {
        Ok(value) => value,
        Err(_) => {
            let value: f64 = raw
                .parse()
                .map_err(|_| format!("invalid integer: {}", raw))?;
            if !value.is_finite() || value.fract() != 0.0 {
                return Err(format!("not a whole number: {}", raw));
            }
            value as i64
        }
    };
    T::try_from(whole).map_err(|_| format!("out of range: {}", raw))
}

fn loose_int<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let raw = String::deserialize(deserializer)?;
    parse_loose_int(&raw).map_err(serde::de::Error::custom)
}

fn loose_optional_int<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let raw = String::deserialize(deserializer)?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_loose_int(&raw).map(Some).map_err(serde::de::Error::custom)
}

/// Everything recorded for one session
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// Valid lap times in seconds per driver, in file order
    pub laps: HashMap<String, Vec<f64>>,
    pub classification: Vec<ResultRecord>,
    pub rainfall: Vec<bool>,
}

impl SessionData {
    /// Lap times of a driver (empty if the driver set none)
    pub fn driver_laps(&self, driver: &str) -> &[f64] {
        self.laps.get(driver).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Classification row of a driver
    pub fn result_for(&self, driver: &str) -> Option<&ResultRecord> {
        self.classification.iter().find(|r| r.driver == driver)
    }
}

/// Timing data of a whole season, indexed by round and session
#[derive(Debug, Default)]
pub struct SeasonTiming {
    pub year: u16,
    pub events: Vec<EventRecord>,
    sessions: HashMap<(u8, Session), SessionData>,
}

impl SeasonTiming {
    /// Load a season directory
    pub fn load<P: AsRef<Path>>(dir: P, year: u16) -> Result<Self> {
        let dir = dir.as_ref();
        let events = File::open(dir.join("events.csv"))?;
        let results = File::open(dir.join("results.csv"))?;

        // Lap and weather exports are optional; without them every long run and weather
        // label of the season is left for the imputation stage.
        let laps = open_optional(&dir.join("laps.csv"))?;
        let weather = open_optional(&dir.join("weather.csv"))?;

        Self::from_readers(year, events, laps, results, weather)
    }

    /// Build from raw CSV readers
    pub fn from_readers<E: Read, L: Read, R: Read, W: Read>(
        year: u16,
        events: E,
        laps: Option<L>,
        results: R,
        weather: Option<W>,
    ) -> Result<Self> {
        let mut events: Vec<EventRecord> = read_records(events)?;
        events.sort_by_key(|e| e.round);

        let mut season = SeasonTiming {
            year,
            events,
            sessions: HashMap::new(),
        };

        if let Some(laps) = laps {
            for lap in read_records::<LapRecord, _>(laps)? {
                let entry = season.session_entry(lap.round, lap.session);
                let driver_laps = entry.laps.entry(lap.driver).or_default();
                if let Some(time) = lap.lap_time.filter(|t| t.is_finite() && *t > 0.0) {
                    driver_laps.push(time);
                }
            }
        }

        for result in read_records::<ResultRecord, _>(results)? {
            season
                .session_entry(result.round, result.session)
                .classification
                .push(result);
        }

        if let Some(weather) = weather {
            for sample in read_records::<WeatherRecord, _>(weather)? {
                if let Some(rainfall) = sample.rainfall {
                    season
                        .session_entry(sample.round, sample.session)
                        .rainfall
                        .push(rainfall);
                }
            }
        }

        for ((round, session), data) in &season.sessions {
            log::debug!(
                "{} round {} {}: {} drivers with laps, {} classified, {} weather samples",
                year,
                round,
                session,
                data.laps.len(),
                data.classification.len(),
                data.rainfall.len()
            );
        }

        Ok(season)
    }

    fn session_entry(&mut self, round: u8, session: Session) -> &mut SessionData {
        self.sessions.entry((round, session)).or_default()
    }

    /// Data of one session, if anything was recorded for it
    pub fn session(&self, round: u8, session: Session) -> Option<&SessionData> {
        self.sessions.get(&(round, session))
    }
}

fn open_optional(path: &Path) -> Result<Option<File>> {
    if path.exists() {
        Ok(Some(File::open(path)?))
    } else {
        log::warn!("{} not found, continuing without it", path.display());
        Ok(None)
    }
}

fn read_records<T: DeserializeOwned, R: Read>(rdr: R) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const EVENTS: &str = "\
round,event_name,event_format
2,Saudi Arabian Grand Prix,conventional
1,Bahrain Grand Prix,conventional
";

    pub const LAPS: &str = "\
round,session,driver,lap_time
1,FP1,VER,90.0
1,FP1,VER,92.0
1,FP1,VER,
1,FP1,HAM,91.0
1,R,VER,95.0
1,R,VER,97.0
";

    pub const RESULTS: &str = "\
round,session,driver,team,position,points
1,R,VER,Red Bull Racing,1,25
1,R,HAM,Mercedes,2,18
1,Q,VER,Red Bull Racing,2,
1,Q,HAM,Mercedes,1,
";

    pub const WEATHER: &str = "\
round,session,rainfall
1,FP1,False
1,FP1,True
1,R,0
1,Q,
";

    pub fn sample_season() -> SeasonTiming {
        SeasonTiming::from_readers(
            2023,
            EVENTS.as_bytes(),
            Some(LAPS.as_bytes()),
            RESULTS.as_bytes(),
            Some(WEATHER.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_events_sorted_by_round() {
        let season = sample_season();
        let rounds: Vec<u8> = season.events.iter().map(|e| e.round).collect();
        assert_eq!(rounds, vec![1, 2]);
    }

    #[test]
    fn test_invalid_laps_skipped() {
        let season = sample_season();
        let fp1 = season.session(1, Session::Practice1).unwrap();
        assert_eq!(fp1.driver_laps("VER"), &[90.0, 92.0]);
        assert_eq!(fp1.driver_laps("HAM"), &[91.0]);
        assert!(fp1.driver_laps("LEC").is_empty());
    }

    #[test]
    fn test_rainfall_flags() {
        let season = sample_season();
        assert_eq!(
            season.session(1, Session::Practice1).unwrap().rainfall,
            vec![false, true]
        );
        assert_eq!(season.session(1, Session::Race).unwrap().rainfall, vec![false]);
    }

    #[test]
    fn test_classification() {
        let season = sample_season();
        let race = season.session(1, Session::Race).unwrap();
        assert_eq!(race.classification.len(), 2);
        assert_eq!(race.result_for("HAM").unwrap().points, Some(18.0));
        assert!(season.session(2, Session::Race).is_none());
    }

    #[test]
    fn test_blank_rainfall_skipped() {
        let season = sample_season();
        assert!(season.session(1, Session::Qualifying).unwrap().rainfall.is_empty());
    }

    #[test]
    fn test_float_formatted_integers() {
        let results = "\
round,session,driver,team,position,points
1.0,R,VER,Red Bull Racing,1.0,25.0
1,R,HAM,Mercedes,,0
";
        let season = SeasonTiming::from_readers(
            2023,
            EVENTS.as_bytes(),
            None::<&[u8]>,
            results.as_bytes(),
            None::<&[u8]>,
        )
        .unwrap();

        let race = season.session(1, Session::Race).unwrap();
        assert_eq!(race.result_for("VER").unwrap().position, Some(1));
        assert_eq!(race.result_for("HAM").unwrap().position, None);
    }

    #[test]
    fn test_fractional_position_rejected() {
        let results = "round,session,driver,team,position,points\n1,R,VER,RBR,1.5,25\n";
        assert!(SeasonTiming::from_readers(
            2023,
            EVENTS.as_bytes(),
            None::<&[u8]>,
            results.as_bytes(),
            None::<&[u8]>,
        )
        .is_err());
        assert_eq!(parse_loose_int::<u8>("300"), Err("out of range: 300".to_string()));
        assert_eq!(parse_loose_int::<u32>(" 7.0 "), Ok(7));
    }

    #[test]
    fn test_missing_optional_exports() {
        let season = SeasonTiming::from_readers(
            2023,
            EVENTS.as_bytes(),
            None::<&[u8]>,
            RESULTS.as_bytes(),
            None::<&[u8]>,
        )
        .unwrap();
        assert!(season.session(1, Session::Practice1).is_none());
        assert!(season.session(1, Session::Race).is_some());
    }
}
