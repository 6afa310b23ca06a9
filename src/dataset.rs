use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// One hour of the delivery portfolio: forecast load, reference forward price
/// (HPFC level for that hour) and an optional temperature reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRecord {
    pub timestamp: NaiveDateTime,
    pub load_mwh: f64,
    pub forward_price: f64,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Hourly portfolio series over one or more consecutive delivery years.
///
/// Construction validates the series and derives everything the simulator
/// needs per hour (year bucket, calendar month, hour of day) plus the
/// per-year volume and price-weighted cost aggregates. All fields are
/// read-only after `from_records`.
#[derive(Debug, Clone)]
pub struct PortfolioDataset {
    pub timestamps: Vec<NaiveDateTime>,
    pub load: Vec<f64>,
    pub forward: Vec<f64>,
    pub temperature: Vec<Option<f64>>,
    /// Delivery-year bucket per hour, assigned by first-seen calendar year.
    /// Contiguous: every hour falls in exactly one of `0..years.len()`.
    pub year_index: Vec<usize>,
    /// Calendar years in first-seen order.
    pub years: Vec<i32>,
    /// Calendar month per hour, 0 = January.
    pub month0: Vec<usize>,
    /// Hour of day per hour, 0-23.
    pub hour: Vec<usize>,
    /// `Σ load[t]` per delivery year (MWh).
    pub volume_by_year: Vec<f64>,
    /// `Σ load[t] * forward[t]` per delivery year (€).
    pub cost_by_year: Vec<f64>,
}

impl PortfolioDataset {
    pub fn from_records(records: Vec<HourlyRecord>) -> Result<Self, DatasetError> {
        if records.is_empty() {
            return Err(DatasetError::Empty);
        }

        let n = records.len();
        let mut timestamps = Vec::with_capacity(n);
        let mut load = Vec::with_capacity(n);
        let mut forward = Vec::with_capacity(n);
        let mut temperature = Vec::with_capacity(n);
        let mut year_index = Vec::with_capacity(n);
        let mut month0 = Vec::with_capacity(n);
        let mut hour = Vec::with_capacity(n);
        let mut years: Vec<i32> = Vec::new();
        let mut volume_by_year: Vec<f64> = Vec::new();
        let mut cost_by_year: Vec<f64> = Vec::new();

        for (index, rec) in records.into_iter().enumerate() {
            if let Some(&prev) = timestamps.last()
                && rec.timestamp <= prev
            {
                return Err(DatasetError::NonMonotonicTimestamp { index });
            }
            if rec.load_mwh < 0.0 {
                return Err(DatasetError::NegativeLoad { index, load: rec.load_mwh });
            }

            let y = rec.timestamp.year();
            if years.last() != Some(&y) {
                years.push(y);
                volume_by_year.push(0.0);
                cost_by_year.push(0.0);
            }
            let yi = years.len() - 1;

            volume_by_year[yi] += rec.load_mwh;
            cost_by_year[yi] += rec.load_mwh * rec.forward_price;

            year_index.push(yi);
            month0.push(rec.timestamp.month0() as usize);
            hour.push(rec.timestamp.hour() as usize);
            timestamps.push(rec.timestamp);
            load.push(rec.load_mwh);
            forward.push(rec.forward_price);
            temperature.push(rec.temperature);
        }

        Ok(PortfolioDataset {
            timestamps,
            load,
            forward,
            temperature,
            year_index,
            years,
            month0,
            hour,
            volume_by_year,
            cost_by_year,
        })
    }

    /// Number of hours T.
    pub fn n_hours(&self) -> usize {
        self.load.len()
    }

    /// Number of delivery years Y.
    pub fn n_years(&self) -> usize {
        self.years.len()
    }

    /// Total portfolio volume across all years (MWh).
    pub fn total_volume(&self) -> f64 {
        self.volume_by_year.iter().sum()
    }

    /// Mean hourly load across the whole horizon (MWh).
    pub fn avg_load(&self) -> f64 {
        self.total_volume() / self.n_hours() as f64
    }
}
