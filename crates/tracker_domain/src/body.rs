use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WeightEntry {
    pub date: NaiveDate,
    pub kilograms: f64,
}

impl WeightEntry {
    pub fn new(date: NaiveDate, kilograms: f64) -> Self {
        Self { date, kilograms }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.kilograms.is_finite() || self.kilograms <= 0.0 {
            return Err(DomainError::invalid(
                "weight",
                &self.date.to_string(),
                format!("weight must be a positive number, got {}", self.kilograms),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightTrend {
    pub latest: WeightEntry,
    /// Mean of the entries inside the window.
    pub average: f64,
    /// Latest minus earliest entry inside the window.
    pub change: f64,
    pub samples: usize,
}

/// Summarises the entries dated within `window_days` days up to and including
/// `today`. Returns `None` when the window holds no entries.
pub fn weight_trend(entries: &[WeightEntry], today: NaiveDate, window_days: u32) -> Option<WeightTrend> {
    let start = today
        .checked_sub_days(Days::new(u64::from(window_days.max(1)) - 1))
        .unwrap_or(NaiveDate::MIN);
    let mut window: Vec<WeightEntry> = entries
        .iter()
        .filter(|entry| entry.date >= start && entry.date <= today)
        .copied()
        .collect();
    window.sort_by_key(|entry| entry.date);

    let first = *window.first()?;
    let latest = *window.last()?;
    let average = window.iter().map(|entry| entry.kilograms).sum::<f64>() / window.len() as f64;
    Some(WeightTrend {
        latest,
        average,
        change: latest.kilograms - first.kilograms,
        samples: window.len(),
    })
}
