//! Track metadata
//!
//! Static attributes of each event: circuit environment, aerodynamic setup demand and lap
//! length. Events are looked up by name, case-insensitively.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{PaceError, Result};

/// Circuit environment class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Temporary circuit on public roads
    Street,
    /// Permanent circuit partly on public roads or parkland
    Hybrid,
    /// Purpose-built permanent circuit
    Classic,
}

/// Downforce level the circuit asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupDemand {
    Low,
    Medium,
    High,
}

impl SetupDemand {
    /// Ordinal encoding: low 0, medium 1, high 2
    pub fn ordinal(&self) -> u8 {
        match self {
            SetupDemand::Low => 0,
            SetupDemand::Medium => 1,
            SetupDemand::High => 2,
        }
    }
}

/// Metadata for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Event name as it appears in the timing exports
    pub name: String,
    pub environment: Environment,
    pub setup_demand: SetupDemand,
    pub length_km: f64,
}

use Environment::{Classic, Hybrid, Street};
use SetupDemand::{High, Low, Medium};

const BUILTIN: &[(&str, Environment, SetupDemand, f64)] = &[
    ("Australian Grand Prix", Hybrid, Medium, 5.278),
    ("Bahrain Grand Prix", Classic, Medium, 5.412),
    ("Chinese Grand Prix", Classic, Medium, 5.451),
    ("Azerbaijan Grand Prix", Street, Low, 6.003),
    ("Spanish Grand Prix", Classic, High, 4.657),
    ("Monaco Grand Prix", Street, High, 3.337),
    ("Canadian Grand Prix", Hybrid, Low, 4.361),
    ("French Grand Prix", Classic, Low, 5.842),
    ("Austrian Grand Prix", Classic, Medium, 4.318),
    ("British Grand Prix", Classic, Medium, 5.891),
    ("German Grand Prix", Classic, Medium, 4.574),
    ("Hungarian Grand Prix", Classic, High, 4.381),
    ("Belgian Grand Prix", Classic, Medium, 7.004),
    ("Italian Grand Prix", Classic, Low, 5.793),
    ("Singapore Grand Prix", Street, High, 5.063),
    ("Russian Grand Prix", Hybrid, Medium, 5.848),
    ("Japanese Grand Prix", Classic, High, 5.807),
    ("United States Grand Prix", Classic, Medium, 5.513),
    ("Mexican Grand Prix", Classic, High, 4.304),
    ("Mexico City Grand Prix", Classic, High, 4.304),
    ("Brazilian Grand Prix", Classic, Medium, 4.309),
    ("São Paulo Grand Prix", Classic, Medium, 4.309),
    ("Styrian Grand Prix", Classic, Medium, 4.318),
    ("Abu Dhabi Grand Prix", Classic, Medium, 5.281),
    ("70th Anniversary Grand Prix", Classic, Medium, 5.819),
    ("Tuscan Grand Prix", Classic, High, 5.245),
    ("Eifel Grand Prix", Classic, Medium, 5.148),
    ("Portuguese Grand Prix", Classic, Medium, 4.653),
    ("Emilia Romagna Grand Prix", Classic, High, 4.909),
    ("Turkish Grand Prix", Classic, High, 5.338),
    ("Sakhir Grand Prix", Classic, Low, 3.543),
    ("Dutch Grand Prix", Classic, High, 4.259),
    ("Qatar Grand Prix", Classic, High, 5.419),
    ("Saudi Arabian Grand Prix", Street, Medium, 6.174),
    ("Miami Grand Prix", Street, Medium, 5.412),
    ("Las Vegas Grand Prix", Street, Low, 6.201),
];

/// Lookup table of track metadata
#[derive(Debug, Clone)]
pub struct TrackCatalog {
    tracks: HashMap<String, TrackInfo>,
}

impl Default for TrackCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TrackCatalog {
    /// Every event the series has run since 2018
    pub fn builtin() -> Self {
        let mut catalog = TrackCatalog {
            tracks: HashMap::new(),
        };
        for &(name, environment, setup_demand, length_km) in BUILTIN {
            catalog.insert(TrackInfo {
                name: name.to_string(),
                environment,
                setup_demand,
                length_km,
            });
        }
        catalog
    }

    /// Built-in table extended or overridden by configured entries
    pub fn with_overrides(extra: &[TrackInfo]) -> Self {
        let mut catalog = Self::builtin();
        for track in extra {
            catalog.insert(track.clone());
        }
        catalog
    }

    pub fn insert(&mut self, track: TrackInfo) {
        self.tracks.insert(track.name.to_lowercase(), track);
    }

    pub fn get(&self, name: &str) -> Option<&TrackInfo> {
        self.tracks.get(&name.trim().to_lowercase())
    }

    /// Like `get`, but a missing event is an error
    pub fn lookup(&self, name: &str) -> Result<&TrackInfo> {
        self.get(name)
            .ok_or_else(|| PaceError::UnknownTrack(name.to_string()))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_track_complete() {
        let catalog = TrackCatalog::builtin();
        assert_eq!(catalog.len(), BUILTIN.len());
        for &(name, ..) in BUILTIN {
            let track = catalog.get(name).unwrap();
            assert!(track.length_km > 3.0 && track.length_km < 7.5, "{}", name);
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = TrackCatalog::builtin();
        let monaco = catalog.get("monaco grand prix").unwrap();
        assert_eq!(monaco.environment, Environment::Street);
        assert_eq!(monaco.setup_demand, SetupDemand::High);
        assert_eq!(monaco.setup_demand.ordinal(), 2);
    }

    #[test]
    fn test_street_circuits() {
        let catalog = TrackCatalog::builtin();
        for name in ["Saudi Arabian Grand Prix", "Miami Grand Prix", "Las Vegas Grand Prix"] {
            assert_eq!(catalog.get(name).unwrap().environment, Environment::Street);
        }
    }

    #[test]
    fn test_unknown_track() {
        let catalog = TrackCatalog::builtin();
        assert!(matches!(
            catalog.lookup("Atlantis Grand Prix"),
            Err(PaceError::UnknownTrack(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let extra = vec![
            TrackInfo {
                name: "Madrid Grand Prix".to_string(),
                environment: Environment::Hybrid,
                setup_demand: SetupDemand::Medium,
                length_km: 5.474,
            },
            TrackInfo {
                name: "Monaco Grand Prix".to_string(),
                environment: Environment::Street,
                setup_demand: SetupDemand::High,
                length_km: 3.4,
            },
        ];
        let catalog = TrackCatalog::with_overrides(&extra);
        assert_eq!(catalog.len(), BUILTIN.len() + 1);
        assert_eq!(catalog.get("Madrid Grand Prix").unwrap().environment, Environment::Hybrid);
        assert_eq!(catalog.get("Monaco Grand Prix").unwrap().length_km, 3.4);
    }
}
