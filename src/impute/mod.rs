//! Missing-value imputation over the merged dataset
//!
//! Steps run in a fixed order: practice long runs, weather labels, finishing and
//! qualifying positions, race pace, then position continuity.

pub mod long_run;
pub mod positions;
pub mod weather;

use crate::{ImputeConfig, Observation, RaceId};

/// Per-step counts of one imputation run
#[derive(Debug, Clone, Default)]
pub struct ImputationReport {
    pub input_rows: usize,
    pub same_row_filled: usize,
    pub teammate_filled: usize,
    pub neighbour_filled: usize,
    pub empty_races: Vec<RaceId>,
    pub empty_race_rows: usize,
    pub incomplete_rows: usize,
    pub weather_fallbacks: usize,
    pub finishing_filled: usize,
    pub qualifying_filled: usize,
    pub missing_pace_rows: usize,
    pub races_renumbered: usize,
    pub output_rows: usize,
}

impl ImputationReport {
    /// Log the report one step per line
    pub fn log(&self) {
        log::info!("Imputation: {} rows in, {} rows out", self.input_rows, self.output_rows);
        log::info!("  long runs: same row {}, teammate {}, neighbours {}",
            self.same_row_filled, self.teammate_filled, self.neighbour_filled);
        if !self.empty_races.is_empty() {
            let races: Vec<String> = self.empty_races.iter().map(|r| r.to_string()).collect();
            log::info!("  dropped races without practice data: {} ({} rows)",
                races.join(", "), self.empty_race_rows);
        }
        log::info!("  dropped incomplete long-run rows: {}", self.incomplete_rows);
        log::info!("  weather labels from race fallback: {}", self.weather_fallbacks);
        log::info!("  positions filled: finishing {}, qualifying {}",
            self.finishing_filled, self.qualifying_filled);
        log::info!("  dropped rows without race pace: {}", self.missing_pace_rows);
        log::info!("  races renumbered: {}", self.races_renumbered);
    }
}

fn log_long_run_gaps(step: &str, rows: &[Observation]) {
    let mut missing = [0usize; 3];
    for row in rows {
        for (count, value) in missing.iter_mut().zip(row.long_runs()) {
            *count += value.is_none() as usize;
        }
    }
    let all_missing = rows.iter().filter(|r| r.all_long_runs_missing()).count();
    log::debug!("{}: missing fp1 {}, fp2 {}, fp3 {}; all three {}",
        step, missing[0], missing[1], missing[2], all_missing);
}

/// Run the full cascade
pub fn impute(mut rows: Vec<Observation>, config: &ImputeConfig) -> (Vec<Observation>, ImputationReport) {
    let mut report = ImputationReport {
        input_rows: rows.len(),
        ..Default::default()
    };

    log_long_run_gaps("initial", &rows);
    report.same_row_filled = long_run::fill_same_row(&mut rows);
    log_long_run_gaps("same row", &rows);
    report.teammate_filled = long_run::fill_from_teammates(&mut rows);
    log_long_run_gaps("teammate", &rows);
    report.neighbour_filled = long_run::fill_from_neighbours(&mut rows, config.neighbours);
    log_long_run_gaps("neighbours", &rows);

    let (mut rows, dropped) = long_run::drop_unfilled(rows);
    report.empty_races = dropped.empty_races;
    report.empty_race_rows = dropped.race_rows;
    report.incomplete_rows = dropped.incomplete_rows;

    log::debug!("weather missing before fill: {:?}", weather::missing_counts(&rows));
    report.weather_fallbacks = weather::fill_weather(&mut rows);

    report.finishing_filled = positions::fill_finishing(&mut rows);
    report.qualifying_filled = positions::fill_qualifying(&mut rows);
    report.missing_pace_rows = positions::drop_missing_pace(&mut rows);
    report.races_renumbered = positions::repair_continuity(&mut rows);

    report.output_rows = rows.len();
    (rows, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::group_by_race;
    use crate::data::dataset::tests::observation;
    use crate::Weather;

    fn weekend() -> Vec<Observation> {
        let mut rows: Vec<Observation> = ["VER", "PER", "HAM", "RUS"]
            .iter()
            .enumerate()
            .map(|(i, driver)| {
                let mut row = observation("23-04", driver);
                row.team_perf = if i < 2 { 0.9 } else { 0.6 };
                row.finishing_position = Some(i as u32 + 1);
                row
            })
            .collect();

        rows[1].set_long_runs([None, None, None]);
        rows[2].finishing_position = None;
        rows[3].qualifying = None;
        rows[3].race_pace = None;
        rows
    }

    #[test]
    fn test_cascade_end_to_end() {
        let config = ImputeConfig { neighbours: 5 };
        let (rows, report) = impute(weekend(), &config);

        assert_eq!(report.input_rows, 4);
        assert_eq!(report.teammate_filled, 1);
        assert_eq!(report.missing_pace_rows, 1);
        assert_eq!(report.output_rows, 3);

        // Teammate PER takes VER's practice mean
        assert_eq!(rows[1].long_runs(), [Some(92.5); 3]);

        for row in &rows {
            assert!(row.long_runs().iter().all(Option::is_some));
            for label in [row.fp1_weather, row.fp2_weather, row.fp3_weather,
                          row.qualifying_weather, row.race_weather] {
                assert!(matches!(label, Some(Weather::Dry) | Some(Weather::Rainy)));
            }
        }
    }

    #[test]
    fn test_positions_contiguous_after_cascade() {
        let config = ImputeConfig { neighbours: 5 };
        let (rows, _) = impute(weekend(), &config);

        for (_, members) in group_by_race(&rows, |r| r.race_id) {
            let n = members.len() as u32;
            let mut finishing: Vec<u32> = members.iter().filter_map(|&i| rows[i].finishing_position).collect();
            let mut qualifying: Vec<u32> = members.iter().filter_map(|&i| rows[i].qualifying).collect();
            finishing.sort();
            qualifying.sort();
            assert_eq!(finishing, (1..=n).collect::<Vec<_>>());
            assert_eq!(qualifying, (1..=n).collect::<Vec<_>>());
        }
    }
}
