//! The simulation grid: calendar range, time step, and the shapes of every per-time array.
//!
//! A [`SimulationSetup`] is built once per experiment and shared read-only by all replicates.
//! Node data is not copied; the setup holds the [`SpatialSetup`] behind an `Arc` and its
//! `nnodes`/`popnodes`/`mobility` accessors read through to it.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use log::info;

use crate::error::SetupError;
use crate::matrix::{self, DenseMatrix};
use crate::spatial::SpatialSetup;

/// Added to the end of the time axis so `t_span` itself survives floating-point truncation.
const T_INTER_EPSILON: f64 = 1e-4;

/// Largest number of points `t_inter` may hold.
pub const MAX_GRID_POINTS: usize = 10_000_000;

/// Value of every cell of the default dynamic filter, meaning "no filter".
pub const NO_FILTER: f64 = -1.0;

/// Default step size, in days.
pub const DEFAULT_DT: f64 = 1.0 / 6.0;

#[derive(Clone, Debug)]
pub struct SetupOptions {
    pub setup_name: String,
    /// Number of replicates.
    pub nsim: usize,
    /// First simulated day (inclusive).
    pub ti: NaiveDate,
    /// Last simulated day.
    pub tf: NaiveDate,
    /// Step size as a fraction of a day.
    pub dt: f64,
    /// Number of distinct beta draws. Defaults to `nsim`.
    pub nbetas: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct SimulationSetup {
    setup_name: String,
    spatset: Arc<SpatialSetup>,
    nsim: usize,
    nbetas: usize,
    ti: NaiveDate,
    tf: NaiveDate,
    dt: f64,
    t_span: usize,
    t_inter: Vec<f64>,
    dynfilter: DenseMatrix,
}

impl SimulationSetup {
    /// # Errors
    /// Returns `SetupError::RangeError` if `tf <= ti`, `dt` is not a positive finite number,
    /// `nsim` is zero, or the grid would exceed [`MAX_GRID_POINTS`] points.
    pub fn new(spatset: Arc<SpatialSetup>, options: SetupOptions) -> Result<Self, SetupError> {
        let SetupOptions {
            setup_name,
            nsim,
            ti,
            tf,
            dt,
            nbetas,
        } = options;
        if tf <= ti {
            return Err(SetupError::RangeError(format!(
                "tf (time to finish, {tf}) is less than or equal to ti (time to start, {ti})"
            )));
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SetupError::RangeError(format!(
                "dt must be a positive number of days, got {dt}"
            )));
        }
        if nsim == 0 {
            return Err(SetupError::RangeError("nsim must be at least 1".to_string()));
        }

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let t_span = (tf - ti).num_days() as usize;
        let t_inter = build_t_inter(t_span, dt)?;
        let dynfilter = DenseMatrix::from_element(t_span, spatset.nnodes(), NO_FILTER);

        info!(
            "simulation setup '{}': {} to {} ({} days, {} steps of {:.4} days), {} replicates",
            setup_name,
            ti,
            tf,
            t_span,
            t_inter.len(),
            dt,
            nsim
        );
        Ok(SimulationSetup {
            setup_name,
            spatset,
            nsim,
            nbetas: nbetas.unwrap_or(nsim),
            ti,
            tf,
            dt,
            t_span,
            t_inter,
            dynfilter,
        })
    }

    #[must_use]
    pub fn setup_name(&self) -> &str {
        &self.setup_name
    }

    #[must_use]
    pub fn spatset(&self) -> &SpatialSetup {
        &self.spatset
    }

    #[must_use]
    pub fn nsim(&self) -> usize {
        self.nsim
    }

    #[must_use]
    pub fn nbetas(&self) -> usize {
        self.nbetas
    }

    #[must_use]
    pub fn ti(&self) -> NaiveDate {
        self.ti
    }

    #[must_use]
    pub fn tf(&self) -> NaiveDate {
        self.tf
    }

    #[must_use]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Whole days between `ti` and `tf`.
    #[must_use]
    pub fn t_span(&self) -> usize {
        self.t_span
    }

    /// Time points `0, dt, 2dt, ...` up to and including `t_span`, in days since `ti`.
    #[must_use]
    pub fn t_inter(&self) -> &[f64] {
        &self.t_inter
    }

    #[must_use]
    pub fn nnodes(&self) -> usize {
        self.spatset.nnodes()
    }

    #[must_use]
    pub fn popnodes(&self) -> &[f64] {
        self.spatset.popnodes()
    }

    #[must_use]
    pub fn mobility(&self) -> &DenseMatrix {
        self.spatset.mobility()
    }

    #[must_use]
    pub fn dynfilter(&self) -> &DenseMatrix {
        &self.dynfilter
    }

    /// Days from `ti` to `date`, if `date` lies in `[ti, ti + t_span]`.
    #[must_use]
    pub fn day_offset(&self, date: NaiveDate) -> Option<usize> {
        let days = (date - self.ti).num_days();
        usize::try_from(days).ok().filter(|d| *d <= self.t_span)
    }

    /// Replaces the dynamic filter.
    ///
    /// # Errors
    /// Returns `SetupError::ShapeError` unless the filter is `(t_span, nnodes)`.
    pub fn set_filter(&mut self, dynfilter: DenseMatrix) -> Result<(), SetupError> {
        let expected = (self.t_span, self.nnodes());
        if dynfilter.shape() != expected {
            return Err(SetupError::shape("Filter", expected, dynfilter.shape()));
        }
        self.dynfilter = dynfilter;
        Ok(())
    }

    /// Reads a whitespace-separated matrix from `path` and installs it with
    /// [`SimulationSetup::set_filter`].
    ///
    /// # Errors
    /// Returns read/parse errors from the file, or `SetupError::ShapeError` as for `set_filter`.
    pub fn load_filter(&mut self, path: &Path) -> Result<(), SetupError> {
        self.set_filter(matrix::load_txt(path)?)
    }
}

/// Parses an ISO `YYYY-MM-DD` date.
///
/// # Errors
/// Returns `SetupError::ParseError` naming `what` if the text is not a date.
pub fn parse_date(text: &str, what: &str) -> Result<NaiveDate, SetupError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|e| SetupError::ParseError(format!("invalid date '{text}' for {what}: {e}")))
}

fn build_t_inter(t_span: usize, dt: f64) -> Result<Vec<f64>, SetupError> {
    #[allow(clippy::cast_precision_loss)]
    let stop = t_span as f64 + T_INTER_EPSILON;
    let npoints = (stop / dt).ceil();
    #[allow(clippy::cast_precision_loss)]
    let max_points = MAX_GRID_POINTS as f64;
    if npoints > max_points {
        return Err(SetupError::RangeError(format!(
            "a step of {dt} days over {t_span} days needs {npoints} time points, more than MAX_GRID_POINTS = {MAX_GRID_POINTS}"
        )));
    }
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let n = npoints as usize;
    #[allow(clippy::cast_precision_loss)]
    Ok((0..n).map(|k| k as f64 * dt).collect())
}
