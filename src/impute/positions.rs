//! Finishing and qualifying position repair
//!
//! After these steps every race's positions are exactly `1..=n` for its `n` rows.

use std::collections::HashSet;

use crate::data::dataset::group_by_race;
use crate::Observation;

/// Fill missing positions of one race with the unused slots of `1..=n`
///
/// Slots are handed out ascending to the missing entries in order. There are always at
/// least as many free slots as missing entries. Returns the number filled.
fn fill_free_slots(positions: &mut [Option<u32>]) -> usize {
    let n = positions.len() as u32;
    let taken: HashSet<u32> = positions.iter().flatten().copied().collect();
    let free = (1..=n).filter(|p| !taken.contains(p));

    let mut filled = 0;
    for (slot, position) in positions.iter_mut().filter(|p| p.is_none()).zip(free) {
        *slot = Some(position);
        filled += 1;
    }
    filled
}

/// Fill missing finishing positions race by race
pub fn fill_finishing(rows: &mut [Observation]) -> usize {
    let mut filled = 0;

    for (_, members) in group_by_race(rows, |r| r.race_id) {
        let mut positions: Vec<Option<u32>> =
            members.iter().map(|&i| rows[i].finishing_position).collect();
        filled += fill_free_slots(&mut positions);
        for (&i, position) in members.iter().zip(positions) {
            rows[i].finishing_position = position;
        }
    }

    filled
}

/// Fill missing qualifying positions race by race
///
/// A race with no qualifying data at all takes the finishing order as its grid.
pub fn fill_qualifying(rows: &mut [Observation]) -> usize {
    let mut filled = 0;

    for (race, members) in group_by_race(rows, |r| r.race_id) {
        if members.iter().all(|&i| rows[i].qualifying.is_none()) {
            log::debug!("{}: no qualifying, using finishing order", race);
            for &i in &members {
                rows[i].qualifying = rows[i].finishing_position;
            }
            filled += members.len();
            continue;
        }

        let mut positions: Vec<Option<u32>> = members.iter().map(|&i| rows[i].qualifying).collect();
        filled += fill_free_slots(&mut positions);
        for (&i, position) in members.iter().zip(positions) {
            rows[i].qualifying = position;
        }
    }

    filled
}

/// Remove rows without a race pace; returns the number removed
pub fn drop_missing_pace(rows: &mut Vec<Observation>) -> usize {
    let before = rows.len();
    rows.retain(|r| r.race_pace.is_some());
    before - rows.len()
}

/// Renumber positions to `1..=n` when a race's set has gaps or duplicates
///
/// Order is kept by a stable sort on the old position, missing last. Returns whether
/// anything changed.
fn renumber(positions: &mut [Option<u32>]) -> bool {
    let n = positions.len() as u32;
    let seen: HashSet<u32> = positions.iter().flatten().copied().collect();
    let contiguous = seen.len() == positions.len() && (1..=n).all(|p| seen.contains(&p));
    if contiguous {
        return false;
    }

    let mut order: Vec<usize> = (0..positions.len()).collect();
    order.sort_by_key(|&i| positions[i].unwrap_or(u32::MAX));
    for (rank, &i) in order.iter().enumerate() {
        positions[i] = Some(rank as u32 + 1);
    }
    true
}

/// Make finishing and qualifying positions contiguous in every race
///
/// Returns the number of races touched.
pub fn repair_continuity(rows: &mut [Observation]) -> usize {
    let mut repaired = 0;

    for (race, members) in group_by_race(rows, |r| r.race_id) {
        let mut finishing: Vec<Option<u32>> =
            members.iter().map(|&i| rows[i].finishing_position).collect();
        let mut qualifying: Vec<Option<u32>> = members.iter().map(|&i| rows[i].qualifying).collect();

        let finishing_changed = renumber(&mut finishing);
        let qualifying_changed = renumber(&mut qualifying);
        if !(finishing_changed || qualifying_changed) {
            continue;
        }

        log::debug!("{}: renumbering positions", race);
        for (k, &i) in members.iter().enumerate() {
            rows[i].finishing_position = finishing[k];
            rows[i].qualifying = qualifying[k];
        }
        repaired += 1;
    }

    repaired
}
