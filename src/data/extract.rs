//! Per-season feature extraction
//!
//! Turns one season of timing exports into observation rows, one per classified driver
//! per race.

use crate::data::timing::{SeasonTiming, Session, SessionData};
use crate::features::form::FormTracker;
use crate::{ExtractConfig, Observation, RaceId, Weather};

/// Average of the long-run laps of a stint set
///
/// Long-run laps are those between `fastest + lower` and `fastest + upper` seconds
/// (inclusive). Returns `None` without laps or when no lap falls in the window.
pub fn long_run_average(laps: &[f64], lower: f64, upper: f64) -> Option<f64> {
    let fastest = laps.iter().copied().reduce(f64::min)?;
    let window: Vec<f64> = laps
        .iter()
        .copied()
        .filter(|&t| t >= fastest + lower && t <= fastest + upper)
        .collect();

    if window.is_empty() {
        None
    } else {
        Some(window.iter().sum::<f64>() / window.len() as f64)
    }
}

/// Weather label of a session: rainy if any rainfall sample is set
pub fn session_weather(session: Option<&SessionData>) -> Weather {
    match session {
        Some(data) if !data.rainfall.is_empty() => {
            if data.rainfall.iter().any(|&r| r) {
                Weather::Rainy
            } else {
                Weather::Dry
            }
        }
        _ => Weather::Unknown,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Stateful extractor carrying the rolling form across rounds
pub struct SeasonExtractor<'a> {
    config: &'a ExtractConfig,
    drivers: FormTracker,
    teams: FormTracker,
}

impl<'a> SeasonExtractor<'a> {
    pub fn new(config: &'a ExtractConfig) -> Self {
        SeasonExtractor {
            config,
            drivers: FormTracker::new(config.form_window, config.driver_points_max),
            teams: FormTracker::new(config.form_window, config.team_points_max),
        }
    }

    /// Extract every race of the season in round order
    pub fn extract(mut self, season: &SeasonTiming) -> Vec<Observation> {
        let mut rows = Vec::new();

        for event in &season.events {
            let race_id = RaceId::new(season.year, event.round);

            let race = match season.session(event.round, Session::Race) {
                Some(race) if !race.classification.is_empty() => race,
                _ => {
                    log::warn!("Skipping {} ({}): race not available", race_id, event.event_name);
                    continue;
                }
            };

            log::debug!("Processing {} {}", race_id, event.event_name);

            let practice1 = season.session(event.round, Session::Practice1);
            // On sprint weekends the sprint takes the third practice slot and the second
            // practice stays empty.
            let (practice2, practice3) = if event.is_sprint() {
                (None, season.session(event.round, Session::Sprint))
            } else {
                (
                    season.session(event.round, Session::Practice2),
                    season.session(event.round, Session::Practice3),
                )
            };
            let qualifying = season.session(event.round, Session::Qualifying);

            let fp2_weather = if event.is_sprint() {
                None
            } else {
                Some(session_weather(practice2))
            };

            for entry in &race.classification {
                let driver = entry.driver.as_str();
                let long_run = |session: Option<&SessionData>| {
                    session.and_then(|s| {
                        long_run_average(
                            s.driver_laps(driver),
                            self.config.long_run_lower_offset,
                            self.config.long_run_upper_offset,
                        )
                    })
                };

                rows.push(Observation {
                    race_id,
                    driver: driver.to_string(),
                    fp1_long_run: long_run(practice1),
                    fp1_weather: Some(session_weather(practice1)),
                    fp2_long_run: long_run(practice2),
                    fp2_weather,
                    fp3_long_run: long_run(practice3),
                    fp3_weather: Some(session_weather(practice3)),
                    qualifying: qualifying
                        .and_then(|q| q.result_for(driver))
                        .and_then(|r| r.position),
                    qualifying_weather: Some(session_weather(qualifying)),
                    driver_perf: self.drivers.index(driver),
                    team_perf: self.teams.index(&entry.team),
                    track_type: event.event_name.clone(),
                    race_weather: Some(session_weather(Some(race))),
                    race_pace: mean(race.driver_laps(driver)),
                    finishing_position: entry.position,
                });
            }

            self.record_race(race);
        }

        rows
    }

    /// Roll the form histories forward with a finished race
    fn record_race(&mut self, race: &SessionData) {
        let mut team_totals: Vec<(&str, f64)> = Vec::new();

        for entry in &race.classification {
            let points = entry.points.unwrap_or(0.0);
            self.drivers.record(&entry.driver, points);

            match team_totals.iter_mut().find(|(team, _)| *team == entry.team) {
                Some((_, total)) => *total += points,
                None => team_totals.push((entry.team.as_str(), points)),
            }
        }

        for (team, total) in team_totals {
            self.teams.record(team, total);
        }
    }
}

/// Extract a full season with the given settings
pub fn extract_season(season: &SeasonTiming, config: &ExtractConfig) -> Vec<Observation> {
    SeasonExtractor::new(config).extract(season)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::timing::tests::sample_season;
    use crate::Config;

    #[test]
    fn test_long_run_window() {
        // fastest 90.0 -> window [91.5, 94.0]
        let laps = [90.0, 91.0, 92.0, 94.0, 100.0];
        let avg = long_run_average(&laps, 1.5, 4.0).unwrap();
        assert!((avg - 93.0).abs() < 1e-9);
    }

    #[test]
    fn test_long_run_empty() {
        assert_eq!(long_run_average(&[], 1.5, 4.0), None);
        // Single lap never lands in its own window
        assert_eq!(long_run_average(&[90.0], 1.5, 4.0), None);
    }

    #[test]
    fn test_session_weather() {
        assert_eq!(session_weather(None), Weather::Unknown);
        let mut data = SessionData::default();
        assert_eq!(session_weather(Some(&data)), Weather::Unknown);
        data.rainfall = vec![false, false];
        assert_eq!(session_weather(Some(&data)), Weather::Dry);
        data.rainfall.push(true);
        assert_eq!(session_weather(Some(&data)), Weather::Rainy);
    }

    #[test]
    fn test_extract_sample_season() {
        let config = Config::default();
        let rows = extract_season(&sample_season(), &config.extract);

        // Round 2 has no race classification
        assert_eq!(rows.len(), 2);

        let ver = &rows[0];
        assert_eq!(ver.race_id.to_string(), "23-01");
        assert_eq!(ver.driver, "VER");
        assert_eq!(ver.fp1_long_run, Some(92.0));
        assert_eq!(ver.fp1_weather, Some(Weather::Rainy));
        assert_eq!(ver.fp2_long_run, None);
        assert_eq!(ver.fp2_weather, Some(Weather::Unknown));
        assert_eq!(ver.qualifying, Some(2));
        assert_eq!(ver.race_pace, Some(96.0));
        assert_eq!(ver.finishing_position, Some(1));
        assert_eq!(ver.race_weather, Some(Weather::Dry));
        assert_eq!(ver.track_type, "Bahrain Grand Prix");

        // First race of the season: no form yet
        assert_eq!(ver.driver_perf, 0.0);
        assert_eq!(ver.team_perf, 0.0);

        let ham = &rows[1];
        assert_eq!(ham.fp1_long_run, None);
        assert_eq!(ham.race_pace, None);
    }

    #[test]
    fn test_form_is_causal() {
        use crate::data::timing::SeasonTiming;

        let events = "round,event_name,event_format\n1,A,conventional\n2,B,conventional\n";
        let results = "\
round,session,driver,team,position,points
1,R,VER,RBR,1,25
1,R,PER,RBR,2,18
2,R,VER,RBR,1,25
2,R,PER,RBR,2,18
";
        let season = SeasonTiming::from_readers(
            2023,
            events.as_bytes(),
            None::<&[u8]>,
            results.as_bytes(),
            None::<&[u8]>,
        )
        .unwrap();

        let config = Config::default();
        let rows = extract_season(&season, &config.extract);
        assert_eq!(rows.len(), 4);

        // Both drivers of round 1 see no history, including the second teammate
        assert_eq!(rows[0].team_perf, 0.0);
        assert_eq!(rows[1].team_perf, 0.0);

        // Round 2 sees round 1 only: one team entry of 43 points
        assert!((rows[2].team_perf - 1.0).abs() < 1e-12);
        assert!((rows[3].team_perf - 1.0).abs() < 1e-12);
        assert!((rows[2].driver_perf - 1.0).abs() < 1e-12);
        assert!((rows[3].driver_perf - 18.0 / 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_sprint_weekend_layout() {
        use crate::data::timing::SeasonTiming;

        let events = "round,event_name,event_format\n1,Austrian Grand Prix,sprint\n";
        let laps = "\
round,session,driver,lap_time
1,S,VER,70.0
1,S,VER,72.0
1,FP2,VER,70.0
1,FP2,VER,72.0
";
        let results = "round,session,driver,team,position,points\n1,R,VER,RBR,1,25\n";
        let weather = "round,session,rainfall\n1,S,True\n1,FP2,False\n1,R,False\n";
        let season = SeasonTiming::from_readers(
            2021,
            events.as_bytes(),
            Some(laps.as_bytes()),
            results.as_bytes(),
            Some(weather.as_bytes()),
        )
        .unwrap();

        let config = Config::default();
        let rows = extract_season(&season, &config.extract);
        assert_eq!(rows[0].fp2_long_run, None);
        assert_eq!(rows[0].fp2_weather, None);
        assert_eq!(rows[0].fp3_long_run, Some(72.0));
        // Sprint rainfall labels the third practice slot
        assert_eq!(rows[0].fp3_weather, Some(Weather::Rainy));
        assert_eq!(rows[0].race_weather, Some(Weather::Dry));
    }
}
