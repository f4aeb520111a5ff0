//! Date-indexed non-pharmaceutical intervention (NPI) series and their resampling onto the
//! simulation time grid.
//!
//! An NPI value is the fractional reduction in transmission in force from its date onwards: `0`
//! means no effect and `1` means transmission is stopped entirely.
//!
//! Resampling is a forward fill onto the simulation's time axis. The grid starts at midnight of
//! the simulation start date and steps by `dt` converted to whole seconds (`round(dt * 86400)`,
//! nearest second), so grid point `k` is the instant `t_inter[k]`. Each grid point takes the most
//! recent observation at or before it. Points after the last observation keep the last value;
//! points before the first observation have no intervention in force and get `0`.

use std::path::Path;

use chrono::NaiveDate;
use log::{debug, warn};
use serde::Deserialize;

use crate::error::SetupError;
use crate::setup::parse_date;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Clone, Debug, PartialEq)]
pub struct NpiSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct NpiRow {
    date: String,
    reduction: f64,
}

impl NpiSeries {
    /// # Errors
    /// Returns `SetupError::ConfigError` if `points` is empty, its dates are not strictly
    /// increasing, or a value is not finite.
    pub fn new(points: Vec<(NaiveDate, f64)>) -> Result<Self, SetupError> {
        if points.is_empty() {
            return Err(SetupError::ConfigError(
                "NPI series must have at least one observation".to_string(),
            ));
        }
        if let Some(pair) = points.windows(2).find(|pair| pair[1].0 <= pair[0].0) {
            return Err(SetupError::ConfigError(format!(
                "NPI series dates must be strictly increasing, but {} follows {}",
                pair[1].0, pair[0].0
            )));
        }
        if let Some((date, value)) = points.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SetupError::ConfigError(format!(
                "NPI value on {date} is not a number: {value}"
            )));
        }
        if points.iter().any(|(_, v)| !(0.0..=1.0).contains(v)) {
            warn!("NPI series has reductions outside [0, 1]; beta will be scaled by 1 - value as given");
        }
        let (dates, values) = points.into_iter().unzip();
        Ok(NpiSeries { dates, values })
    }

    /// A series with no intervention at any time from `start` onwards.
    #[must_use]
    pub fn no_intervention(start: NaiveDate) -> Self {
        NpiSeries {
            dates: vec![start],
            values: vec![0.0],
        }
    }

    /// Reads a CSV with `date` and `reduction` columns.
    ///
    /// # Errors
    /// Returns CSV errors, `SetupError::ParseError` for a malformed date, and the validation
    /// errors of [`NpiSeries::new`].
    pub fn from_csv(path: &Path) -> Result<Self, SetupError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut points = Vec::new();
        for result in reader.deserialize() {
            let row: NpiRow = result?;
            points.push((parse_date(&row.date, "NPI series")?, row.reduction));
        }
        debug!("read {} NPI observations from {}", points.len(), path.display());
        Self::new(points)
    }

    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.dates[0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Forward-fills the series onto `npoints` instants spaced `period_seconds` apart, starting
    /// at midnight of `origin`.
    #[must_use]
    pub fn resample_ffill(&self, origin: NaiveDate, period_seconds: i64, npoints: usize) -> Vec<f64> {
        let offsets: Vec<i64> = self
            .dates
            .iter()
            .map(|d| (*d - origin).num_seconds())
            .collect();

        let mut resampled = Vec::with_capacity(npoints);
        // Number of observations at or before `t`.
        let mut seen = 0;
        let mut t: i64 = 0;
        for _ in 0..npoints {
            while seen < offsets.len() && offsets[seen] <= t {
                seen += 1;
            }
            resampled.push(if seen == 0 { 0.0 } else { self.values[seen - 1] });
            t += period_seconds;
        }
        resampled
    }
}

/// The resampling period for a step of `dt` days, rounded to the nearest whole second.
///
/// # Errors
/// Returns `SetupError::RangeError` if the rounded period is shorter than one second.
pub fn resample_period_seconds(dt: f64) -> Result<i64, SetupError> {
    let seconds = (dt * SECONDS_PER_DAY).round();
    if !(seconds >= 1.0 && seconds.is_finite()) {
        return Err(SetupError::RangeError(format!(
            "time step of {dt} days is shorter than one second"
        )));
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(seconds as i64)
}
