//! Observation datasets on disk
//!
//! Every stage hands its output to the next one as a CSV file; this module reads and
//! writes those files and merges the per-season extracts.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::{Observation, RaceId, Result};

/// Season extract file name
pub fn season_file_name(year: u16) -> String {
    format!("season_{}.csv", year)
}

pub const IMPUTED_FILE: &str = "all_seasons_imputed.csv";
pub const ENCODED_FILE: &str = "encoded_unscaled.csv";
pub const SCALED_FILE: &str = "encoded_scaled.csv";

/// Deserialize all rows of a CSV reader
pub fn read_rows<T: DeserializeOwned, R: Read>(rdr: R) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Serialize rows (with header) to a writer
pub fn write_rows<T: Serialize, W: Write>(wtr: W, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(wtr);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a CSV file of rows
pub fn load<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let path = path.as_ref();
    log::debug!("Reading {}", path.display());
    read_rows(File::open(path)?)
}

/// Write rows to a CSV file, creating parent directories
pub fn save<T: Serialize, P: AsRef<Path>>(path: P, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_rows(File::create(path)?, rows)?;
    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// All season extracts in a directory, sorted by file name
pub fn season_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_season = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("season_") && n.ends_with(".csv"))
            .unwrap_or(false);
        if is_season {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Concatenate every season extract in a directory
pub fn merge_seasons<P: AsRef<Path>>(dir: P) -> Result<Vec<Observation>> {
    let mut merged = Vec::new();
    for path in season_files(dir)? {
        let rows: Vec<Observation> = load(&path)?;
        log::info!("  {}: {} rows", path.display(), rows.len());
        merged.extend(rows);
    }
    Ok(merged)
}

/// Row indices per race, races in order of first appearance
pub fn group_by_race<T>(rows: &[T], race_of: impl Fn(&T) -> RaceId) -> Vec<(RaceId, Vec<usize>)> {
    let mut groups: Vec<(RaceId, Vec<usize>)> = Vec::new();
    let mut position: HashMap<RaceId, usize> = HashMap::new();

    for (idx, row) in rows.iter().enumerate() {
        let race = race_of(row);
        match position.get(&race) {
            Some(&g) => groups[g].1.push(idx),
            None => {
                position.insert(race, groups.len());
                groups.push((race, vec![idx]));
            }
        }
    }

    groups
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Weather;

    pub(crate) fn observation(race: &str, driver: &str) -> Observation {
        Observation {
            race_id: race.parse().unwrap(),
            driver: driver.to_string(),
            fp1_long_run: Some(92.5),
            fp1_weather: Some(Weather::Dry),
            fp2_long_run: None,
            fp2_weather: Some(Weather::Unknown),
            fp3_long_run: None,
            fp3_weather: None,
            qualifying: Some(3),
            qualifying_weather: Some(Weather::Rainy),
            driver_perf: 0.4,
            team_perf: 0.25,
            track_type: "Monaco Grand Prix".to_string(),
            race_weather: Some(Weather::Dry),
            race_pace: Some(95.25),
            finishing_position: None,
        }
    }

    #[test]
    fn test_observation_csv_columns() {
        let mut buf = Vec::new();
        write_rows(&mut buf, &[observation("24-08", "LEC")]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "race_id,driver,fp1_long_run,fp1_weather,fp2_long_run,fp2_weather,fp3_long_run,\
             fp3_weather,qualifying,qualifying_weather,driver_perf,team_perf,track_type,\
             race_weather,race_pace,finishing_position"
        );
        assert_eq!(
            lines.next().unwrap(),
            "24-08,LEC,92.5,dry,,unknown,,,3,rainy,0.4,0.25,Monaco Grand Prix,dry,95.25,"
        );
    }

    #[test]
    fn test_read_missing_cells() {
        let text = "\
race_id,driver,fp1_long_run,fp1_weather,fp2_long_run,fp2_weather,fp3_long_run,fp3_weather,qualifying,qualifying_weather,driver_perf,team_perf,track_type,race_weather,race_pace,finishing_position
19-03,GAS,,,,,,,,,0,0,Chinese Grand Prix,,,
";
        let rows: Vec<Observation> = read_rows(text.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].all_long_runs_missing());
        assert_eq!(rows[0].qualifying, None);
        assert_eq!(rows[0].race_weather, None);
    }

    #[test]
    fn test_merge_seasons_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path().join(season_file_name(2019)), &[observation("19-01", "HAM")]).unwrap();
        save(dir.path().join(season_file_name(2018)), &[observation("18-01", "VET")]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let merged = merge_seasons(dir.path()).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].driver, "VET");
        assert_eq!(merged[1].driver, "HAM");
    }

    #[test]
    fn test_group_by_race_keeps_order() {
        let rows = vec![
            observation("20-02", "A"),
            observation("20-01", "B"),
            observation("20-02", "C"),
        ];
        let groups = group_by_race(&rows, |r| r.race_id);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.to_string(), "20-02");
        assert_eq!(groups[0].1, vec![0, 2]);
        assert_eq!(groups[1].1, vec![1]);
    }
}
