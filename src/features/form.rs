//! Rolling driver and team form
//!
//! Form indices are the mean points over the last few races, normalised by the best
//! possible haul. Histories are only updated after a race's rows are built, so an index
//! never sees the race it describes.

use std::collections::HashMap;

/// Rolling points history for a set of competitors (drivers or teams)
#[derive(Debug, Clone)]
pub struct FormTracker {
    /// Window size (number of recent races)
    window: usize,
    /// Points that map to an index of 1.0
    points_max: f64,
    /// Recent per-race points per competitor, oldest first
    recent_points: HashMap<String, Vec<f64>>,
}

impl FormTracker {
    /// Create a tracker with the given window and normalisation
    pub fn new(window: usize, points_max: f64) -> Self {
        FormTracker {
            window: window.max(1),
            points_max,
            recent_points: HashMap::new(),
        }
    }

    /// Form index in [0, 1] from races recorded so far; 0.0 without history
    pub fn index(&self, competitor: &str) -> f64 {
        match self.recent_points.get(competitor) {
            Some(points) if !points.is_empty() && self.points_max > 0.0 => {
                let total: f64 = points.iter().sum();
                total / (points.len() as f64 * self.points_max)
            }
            _ => 0.0,
        }
    }

    /// Record one race result and roll the window
    pub fn record(&mut self, competitor: &str, points: f64) {
        let recent = self
            .recent_points
            .entry(competitor.to_string())
            .or_default();
        recent.push(points);
        if recent.len() > self.window {
            recent.remove(0);
        }
    }

    /// Number of races in the window for a competitor
    #[cfg(test)]
    pub fn race_count(&self, competitor: &str) -> usize {
        self.recent_points.get(competitor).map(|p| p.len()).unwrap_or(0)
    }
}
