//! Practice long-run imputation
//!
//! Missing long-run averages are filled by increasingly broad fallbacks: the driver's own
//! other sessions, the teammate at the same race, and finally the closest cars by team
//! form at the same track in the same conditions. Whatever is still empty is dropped.

use std::collections::HashSet;

use crate::data::dataset::group_by_race;
use crate::{Observation, RaceId};

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Fill missing sessions of a row with the mean of its known sessions
///
/// Returns the number of rows changed.
pub fn fill_same_row(rows: &mut [Observation]) -> usize {
    let mut changed = 0;

    for row in rows.iter_mut() {
        let runs = row.long_runs();
        let known: Vec<f64> = runs.iter().flatten().copied().collect();
        if known.is_empty() || known.len() == runs.len() {
            continue;
        }

        let fill = mean(&known);
        row.set_long_runs(runs.map(|v| v.or(fill)));
        changed += 1;
    }

    changed
}

/// Fill rows with no practice data from teammates at the same race
///
/// Teammates are recognised by an identical team form index. The fill is the mean of every
/// known long run of the teammates and is applied to all three sessions.
pub fn fill_from_teammates(rows: &mut [Observation]) -> usize {
    let snapshot: Vec<[Option<f64>; 3]> = rows.iter().map(|r| r.long_runs()).collect();
    let mut changed = 0;

    for (_, members) in group_by_race(rows, |r| r.race_id) {
        for &idx in &members {
            if !rows[idx].all_long_runs_missing() {
                continue;
            }

            let team_perf = rows[idx].team_perf;
            let donor_values: Vec<f64> = members
                .iter()
                .filter(|&&j| j != idx && rows[j].team_perf == team_perf)
                .flat_map(|&j| snapshot[j].iter().flatten().copied())
                .collect();

            if let Some(fill) = mean(&donor_values) {
                rows[idx].set_long_runs([Some(fill); 3]);
                changed += 1;
            }
        }
    }

    changed
}

/// Fill rows with no practice data from their nearest neighbours
///
/// For each session, donors are rows that had that session's long run before this step,
/// ran at the same track, and share the session's weather label. The `k` donors closest
/// in team form are averaged. Sessions without donors stay empty.
pub fn fill_from_neighbours(rows: &mut [Observation], k: usize) -> usize {
    let snapshot: Vec<Observation> = rows.to_vec();
    let mut changed = 0;

    for (idx, row) in rows.iter_mut().enumerate() {
        if !row.all_long_runs_missing() {
            continue;
        }

        let weather = row.practice_weather();
        let mut filled = row.long_runs();

        for session in 0..3 {
            let label = match weather[session] {
                Some(label) => label,
                None => continue,
            };

            let mut donors: Vec<(f64, f64)> = snapshot
                .iter()
                .enumerate()
                .filter(|(j, d)| {
                    *j != idx && d.track_type == row.track_type && d.practice_weather()[session] == Some(label)
                })
                .filter_map(|(_, d)| {
                    d.long_runs()[session].map(|v| ((d.team_perf - row.team_perf).abs(), v))
                })
                .collect();

            // Stable sort keeps file order among equally close donors
            donors.sort_by(|a, b| a.0.total_cmp(&b.0));
            let nearest: Vec<f64> = donors.iter().take(k).map(|&(_, v)| v).collect();
            filled[session] = mean(&nearest);
        }

        if filled.iter().any(Option::is_some) {
            row.set_long_runs(filled);
            changed += 1;
        }
    }

    changed
}

/// Outcome of the final drop step
#[derive(Debug, Clone, Default)]
pub struct DropSummary {
    /// Races where no row had any practice data
    pub empty_races: Vec<RaceId>,
    /// Rows removed with those races
    pub race_rows: usize,
    /// Remaining rows removed for an incomplete long-run set
    pub incomplete_rows: usize,
}

/// Drop what the cascade could not fill
///
/// Partially filled rows first get another same-row fill. Races where every row is still
/// empty go entirely, then any row with a missing session goes.
pub fn drop_unfilled(mut rows: Vec<Observation>) -> (Vec<Observation>, DropSummary) {
    fill_same_row(&mut rows);

    let mut summary = DropSummary::default();
    let empty: HashSet<RaceId> = group_by_race(&rows, |r| r.race_id)
        .into_iter()
        .filter(|(_, members)| members.iter().all(|&i| rows[i].all_long_runs_missing()))
        .map(|(race, _)| race)
        .collect();

    let before = rows.len();
    rows.retain(|r| !empty.contains(&r.race_id));
    summary.race_rows = before - rows.len();

    let before = rows.len();
    rows.retain(|r| r.long_runs().iter().all(Option::is_some));
    summary.incomplete_rows = before - rows.len();

    summary.empty_races = empty.into_iter().collect();
    summary.empty_races.sort();

    (rows, summary)
}
