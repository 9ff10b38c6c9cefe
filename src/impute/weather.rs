//! Weather label imputation
//!
//! Conditions rarely change between neighbouring sessions, so a missing label is copied
//! from the closest session that has one.

use crate::data::dataset::group_by_race;
use crate::{Observation, Weather};

/// Session columns carrying a weather label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherColumn {
    Practice1,
    Practice2,
    Practice3,
    Qualifying,
    Race,
}

impl WeatherColumn {
    pub const ALL: [WeatherColumn; 5] = [
        WeatherColumn::Practice1,
        WeatherColumn::Practice2,
        WeatherColumn::Practice3,
        WeatherColumn::Qualifying,
        WeatherColumn::Race,
    ];

    fn get(self, row: &Observation) -> Option<Weather> {
        match self {
            WeatherColumn::Practice1 => row.fp1_weather,
            WeatherColumn::Practice2 => row.fp2_weather,
            WeatherColumn::Practice3 => row.fp3_weather,
            WeatherColumn::Qualifying => row.qualifying_weather,
            WeatherColumn::Race => row.race_weather,
        }
    }

    fn slot(self, row: &mut Observation) -> &mut Option<Weather> {
        match self {
            WeatherColumn::Practice1 => &mut row.fp1_weather,
            WeatherColumn::Practice2 => &mut row.fp2_weather,
            WeatherColumn::Practice3 => &mut row.fp3_weather,
            WeatherColumn::Qualifying => &mut row.qualifying_weather,
            WeatherColumn::Race => &mut row.race_weather,
        }
    }
}

/// Fill order: (target, source)
const FILL_CHAIN: [(WeatherColumn, WeatherColumn); 7] = [
    (WeatherColumn::Practice1, WeatherColumn::Practice2),
    (WeatherColumn::Practice2, WeatherColumn::Practice1),
    (WeatherColumn::Practice3, WeatherColumn::Qualifying),
    (WeatherColumn::Qualifying, WeatherColumn::Practice3),
    (WeatherColumn::Race, WeatherColumn::Qualifying),
    (WeatherColumn::Practice3, WeatherColumn::Race),
    (WeatherColumn::Qualifying, WeatherColumn::Race),
];

/// Count of absent labels per column, in `WeatherColumn::ALL` order
pub fn missing_counts(rows: &[Observation]) -> [usize; 5] {
    WeatherColumn::ALL.map(|col| rows.iter().filter(|r| col.get(r).is_none()).count())
}

/// Make every weather label binary
///
/// `Unknown` is treated as absent, then the fill chain runs. Labels still absent after the
/// chain take the same column from another row of the race, falling back to dry. Returns the
/// number of labels set by that last fallback.
pub fn fill_weather(rows: &mut [Observation]) -> usize {
    for row in rows.iter_mut() {
        for col in WeatherColumn::ALL {
            let slot = col.slot(row);
            if *slot == Some(Weather::Unknown) {
                *slot = None;
            }
        }
    }

    for (target, source) in FILL_CHAIN {
        for row in rows.iter_mut() {
            if target.get(row).is_none() {
                *target.slot(row) = source.get(row);
            }
        }
    }

    let mut fallbacks = 0;
    for (race, members) in group_by_race(rows, |r| r.race_id) {
        for col in WeatherColumn::ALL {
            let race_label = members.iter().find_map(|&i| col.get(&rows[i]));
            for &i in &members {
                if col.get(&rows[i]).is_none() {
                    log::debug!("{}: no {:?} weather, using {:?}", race, col, race_label);
                    *col.slot(&mut rows[i]) = Some(race_label.unwrap_or(Weather::Dry));
                    fallbacks += 1;
                }
            }
        }
    }

    fallbacks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::observation;

    #[test]
    fn test_unknown_replaced_by_neighbour_session() {
        let mut rows = vec![observation("22-01", "NOR")];
        rows[0].fp1_weather = Some(Weather::Unknown);
        rows[0].fp2_weather = Some(Weather::Rainy);

        fill_weather(&mut rows);
        assert_eq!(rows[0].fp1_weather, Some(Weather::Rainy));
    }

    #[test]
    fn test_chain_order() {
        let mut rows = vec![observation("22-01", "NOR")];
        rows[0].fp3_weather = None;
        rows[0].qualifying_weather = None;
        rows[0].race_weather = Some(Weather::Rainy);

        let fallbacks = fill_weather(&mut rows);
        // fp3 and qualifying both come from the race via the tail of the chain
        assert_eq!(rows[0].fp3_weather, Some(Weather::Rainy));
        assert_eq!(rows[0].qualifying_weather, Some(Weather::Rainy));
        assert_eq!(fallbacks, 0);
    }

    #[test]
    fn test_race_fallback_then_dry() {
        let mut rows = vec![observation("22-01", "NOR"), observation("22-01", "PIA")];
        for row in rows.iter_mut() {
            row.fp1_weather = None;
            row.fp2_weather = None;
        }
        rows[1].fp1_weather = Some(Weather::Rainy);

        let fallbacks = fill_weather(&mut rows);
        // PIA fp2 <- fp1; NOR takes the race's label for both practice sessions
        assert_eq!(rows[1].fp2_weather, Some(Weather::Rainy));
        assert_eq!(rows[0].fp1_weather, Some(Weather::Rainy));
        assert_eq!(rows[0].fp2_weather, Some(Weather::Rainy));
        assert_eq!(fallbacks, 2);
        assert_eq!(missing_counts(&rows), [0; 5]);
    }

    #[test]
    fn test_all_labels_binary() {
        let mut rows = vec![observation("22-01", "NOR")];
        rows[0].fp1_weather = Some(Weather::Unknown);
        rows[0].fp2_weather = Some(Weather::Unknown);
        rows[0].fp3_weather = None;
        rows[0].qualifying_weather = None;
        rows[0].race_weather = None;

        fill_weather(&mut rows);
        for col in WeatherColumn::ALL {
            assert_eq!(col.get(&rows[0]), Some(Weather::Dry));
        }
    }
}
