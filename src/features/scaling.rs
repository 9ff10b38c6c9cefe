//! Standard scaling of continuous columns
//!
//! z = (x - mean) / std with population statistics. Binary, ordinal and position columns
//! are left as they are.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::features::encoding::EncodedRow;
use crate::{PaceError, Result};

/// Columns the scaler touches
pub const SCALED_COLUMNS: [&str; 7] = [
    "track_length",
    "driver_perf",
    "team_perf",
    "fp1_long_run",
    "fp2_long_run",
    "fp3_long_run",
    "race_pace",
];

pub const SCALER_FILE: &str = "scaler.json";

fn column_mut(row: &mut EncodedRow, column: usize) -> &mut f64 {
    match column {
        0 => &mut row.track_length,
        1 => &mut row.driver_perf,
        2 => &mut row.team_perf,
        3 => &mut row.fp1_long_run,
        4 => &mut row.fp2_long_run,
        5 => &mut row.fp3_long_run,
        _ => &mut row.race_pace,
    }
}

fn column(row: &EncodedRow, column: usize) -> f64 {
    match column {
        0 => row.track_length,
        1 => row.driver_perf,
        2 => row.team_perf,
        3 => row.fp1_long_run,
        4 => row.fp2_long_run,
        5 => row.fp3_long_run,
        _ => row.race_pace,
    }
}

/// Fitted per-column mean and standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl StandardScaler {
    /// Fit on a dataset; a constant column gets a deviation of 1
    pub fn fit(rows: &[EncodedRow]) -> Result<Self> {
        if rows.is_empty() {
            return Err(PaceError::InsufficientData(
                "cannot fit a scaler on an empty dataset".to_string(),
            ));
        }

        let n = rows.len() as f64;
        let mut mean = Vec::with_capacity(SCALED_COLUMNS.len());
        let mut std = Vec::with_capacity(SCALED_COLUMNS.len());

        for c in 0..SCALED_COLUMNS.len() {
            let m = rows.iter().map(|r| column(r, c)).sum::<f64>() / n;
            let var = rows.iter().map(|r| (column(r, c) - m).powi(2)).sum::<f64>() / n;
            let s = var.sqrt();
            mean.push(m);
            std.push(if s > 0.0 { s } else { 1.0 });
        }

        Ok(StandardScaler {
            columns: SCALED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            mean,
            std,
        })
    }

    pub fn transform(&self, rows: &mut [EncodedRow]) {
        for row in rows.iter_mut() {
            for c in 0..self.mean.len() {
                let value = column_mut(row, c);
                *value = (*value - self.mean[c]) / self.std[c];
            }
        }
    }

    pub fn inverse_transform(&self, rows: &mut [EncodedRow]) {
        for row in rows.iter_mut() {
            for c in 0..self.mean.len() {
                let value = column_mut(row, c);
                *value = *value * self.std[c] + self.mean[c];
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::info!("Saved scaler to {}", path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let scaler: StandardScaler = serde_json::from_str(&content)?;
        if scaler.columns.len() != SCALED_COLUMNS.len()
            || scaler.mean.len() != scaler.columns.len()
            || scaler.std.len() != scaler.columns.len()
        {
            return Err(PaceError::Model("scaler columns do not match".to_string()));
        }
        Ok(scaler)
    }
}
