//! Per-replicate draws of the epidemiological parameters.
//!
//! The configuration section (usually `seir.parameters`) must provide:
//!
//! * `sigma`: incubation-progression rate, a number or expression
//! * `gamma`: per-individual recovery rate, a distribution
//! * `R0s`: basic reproduction number, a distribution
//!
//! and may provide `alpha`, the fraction of the day spent commuting (default `1.0`).
//!
//! `gamma` is returned already multiplied by [`N_INFECTIOUS_COMPARTMENTS`]: with the infectious
//! period split into that many stages, each stage must be left at `n * gamma` for the mean
//! infectious period to stay `1 / gamma`.

use chrono::NaiveDate;
use log::debug;
use rand::Rng;

use crate::compartments::N_INFECTIOUS_COMPARTMENTS;
use crate::config::Config;
use crate::error::SetupError;
use crate::matrix::DenseMatrix;
use crate::npi::{resample_period_seconds, NpiSeries};
use crate::setup::SimulationSetup;

#[allow(clippy::cast_precision_loss)]
const N_ICOMP: f64 = N_INFECTIOUS_COMPARTMENTS as f64;

/// One replicate's parameters. Immutable once drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawnParameters {
    /// Fraction of the day spent commuting.
    pub alpha: f64,
    /// Transmission rate, shape `(nt_inter, nnodes)`: time is the leading axis.
    pub beta: DenseMatrix,
    pub sigma: f64,
    /// Stage exit rate, already scaled by the number of infectious stages.
    pub gamma: f64,
}

/// Draws `alpha`, `beta`, `sigma` and `gamma` for one replicate.
///
/// `beta` starts out as `R0s * gamma / n` on every node and time point and is then scaled by
/// `1 - npi(t)`, with the NPI series forward-filled onto `nt_inter` points spaced `dt` apart
/// from midnight of `ti`, the first day of the simulation.
///
/// # Errors
/// - `SetupError::RangeError` if `nnodes` or `nt_inter` is zero, or `dt` is under a second
/// - `SetupError::ConfigError` if a required key is missing or malformed
pub fn parameters_quick_draw<R: Rng + ?Sized>(
    p_config: &Config,
    nt_inter: usize,
    nnodes: usize,
    dt: f64,
    npi: &NpiSeries,
    ti: NaiveDate,
    rng: &mut R,
) -> Result<DrawnParameters, SetupError> {
    if nnodes == 0 || nt_inter == 0 {
        return Err(SetupError::RangeError(format!(
            "Invalid nt_inter ({nt_inter}) or nnodes ({nnodes})"
        )));
    }

    let alpha = if p_config.has("alpha") {
        p_config.get_expression("alpha")?
    } else {
        1.0
    };
    let sigma = p_config.get_expression("sigma")?;
    let gamma = p_config.get_sampler("gamma")?.sample(rng) * N_ICOMP;
    let r0s = p_config.get_sampler("R0s")?.sample(rng);

    let raw_beta = r0s * gamma / N_ICOMP;
    // Built node-major, returned time-major.
    let mut beta = DenseMatrix::from_element(nnodes, nt_inter, raw_beta);

    let reduction = npi.resample_ffill(ti, resample_period_seconds(dt)?, nt_inter);
    for (t, r) in reduction.iter().enumerate() {
        beta.column_mut(t).apply(|b| *b *= 1.0 - r);
    }

    debug!(
        "drew alpha={alpha}, sigma={sigma}, gamma={gamma}, R0s={r0s} (raw beta={raw_beta})"
    );
    Ok(DrawnParameters {
        alpha,
        beta: beta.transpose(),
        sigma,
        gamma,
    })
}

/// [`parameters_quick_draw`] with the grid length, node count, step and start date taken from
/// `setup`.
///
/// # Errors
/// See [`parameters_quick_draw`].
pub fn parameters_draw<R: Rng + ?Sized>(
    setup: &SimulationSetup,
    p_config: &Config,
    npi: &NpiSeries,
    rng: &mut R,
) -> Result<DrawnParameters, SetupError> {
    parameters_quick_draw(
        p_config,
        setup.t_inter().len(),
        setup.nnodes(),
        setup.dt(),
        npi,
        setup.ti(),
        rng,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::rngs::SmallRng;
    use crate::rand::SeedableRng;
    use crate::setup::tests::{date, setup_with};
    use assert_approx_eq::assert_approx_eq;

    fn config(json: &str) -> Config {
        Config::from_json_str(json).unwrap()
    }

    fn start() -> NaiveDate {
        date("2020-01-01")
    }

    fn fixed_config() -> Config {
        config(
            r#"{
                "alpha": "0.5 + 0.4",
                "sigma": "1/5.2",
                "gamma": { "distribution": "fixed", "value": "1/6" },
                "R0s": { "distribution": "fixed", "value": 3 }
            }"#,
        )
    }

    #[test]
    fn zero_sizes_are_range_errors() {
        let npi = NpiSeries::no_intervention(start());
        let mut rng = SmallRng::seed_from_u64(42);
        for (nt, nn) in [(0, 3), (10, 0), (0, 0)] {
            let err = parameters_quick_draw(&fixed_config(), nt, nn, 1.0, &npi, start(), &mut rng)
                .unwrap_err();
            assert!(matches!(err, SetupError::RangeError(_)));
        }
    }

    #[test]
    fn scalars_and_scaling() {
        let npi = NpiSeries::no_intervention(start());
        let mut rng = SmallRng::seed_from_u64(42);
        let p = parameters_quick_draw(&fixed_config(), 4, 2, 1.0, &npi, start(), &mut rng).unwrap();
        assert_approx_eq!(p.alpha, 0.9);
        assert_approx_eq!(p.sigma, 1.0 / 5.2);
        assert_approx_eq!(p.gamma, 3.0 / 6.0);
        // R0s * gamma / 3 with gamma already scaled by 3
        assert_approx_eq!(p.beta[(0, 0)], 3.0 * (1.0 / 6.0));
    }

    #[test]
    fn alpha_defaults_to_one() {
        let p_config = config(
            r#"{ "sigma": 0.2, "gamma": 0.25, "R0s": 2 }"#,
        );
        let npi = NpiSeries::no_intervention(start());
        let mut rng = SmallRng::seed_from_u64(42);
        let p = parameters_quick_draw(&p_config, 3, 3, 1.0, &npi, start(), &mut rng).unwrap();
        assert_eq!(p.alpha, 1.0);
    }

    #[test]
    fn sigma_is_required() {
        let p_config = config(r#"{ "gamma": 0.25, "R0s": 2 }"#);
        let npi = NpiSeries::no_intervention(start());
        let mut rng = SmallRng::seed_from_u64(42);
        let err = parameters_quick_draw(&p_config, 3, 3, 1.0, &npi, start(), &mut rng).unwrap_err();
        assert!(matches!(err, SetupError::ConfigError(_)));
    }

    #[test]
    fn gamma_is_three_times_the_sampled_rate() {
        let p_config = config(
            r#"{
                "sigma": 0.2,
                "gamma": { "distribution": "uniform", "low": 0.1, "high": 0.5 },
                "R0s": { "distribution": "uniform", "low": 1.5, "high": 3 }
            }"#,
        );
        let npi = NpiSeries::no_intervention(start());
        let sampler = p_config.get_sampler("gamma").unwrap();
        for seed in 0..20 {
            // The per-stage rate is the first value drawn from the generator.
            let raw = sampler.sample(&mut SmallRng::seed_from_u64(seed));
            let mut rng = SmallRng::seed_from_u64(seed);
            let p = parameters_quick_draw(&p_config, 2, 2, 1.0, &npi, start(), &mut rng).unwrap();
            assert_eq!(p.gamma, raw * 3.0);
        }
    }

    #[test]
    fn beta_is_time_major() {
        let npi = NpiSeries::no_intervention(start());
        let mut rng = SmallRng::seed_from_u64(42);
        let p = parameters_quick_draw(&fixed_config(), 7, 3, 1.0, &npi, start(), &mut rng).unwrap();
        assert_eq!(p.beta.shape(), (7, 3));
    }

    #[test]
    fn zero_npi_leaves_beta_unchanged() {
        let npi = NpiSeries::new(vec![(date("2020-01-01"), 0.0), (date("2020-01-05"), 0.0)])
            .unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let p = parameters_quick_draw(&fixed_config(), 61, 3, 1.0 / 6.0, &npi, start(), &mut rng).unwrap();
        let raw = 3.0 * p.gamma / 3.0;
        assert_eq!(p.beta, DenseMatrix::from_element(61, 3, raw));
    }

    #[test]
    fn full_npi_zeroes_beta() {
        let npi = NpiSeries::new(vec![(date("2020-01-01"), 1.0), (date("2020-01-03"), 1.0)])
            .unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let p = parameters_quick_draw(&fixed_config(), 25, 4, 0.25, &npi, start(), &mut rng).unwrap();
        assert!(p.beta.iter().all(|b| *b == 0.0));
    }

    #[test]
    fn npi_reduction_applies_from_its_date_on_every_node() {
        let npi = NpiSeries::new(vec![(date("2020-01-01"), 0.0), (date("2020-01-03"), 0.5)])
            .unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let p = parameters_quick_draw(&fixed_config(), 9, 2, 0.5, &npi, start(), &mut rng).unwrap();
        let raw = 0.5;
        for node in 0..2 {
            assert_approx_eq!(p.beta[(3, node)], raw);
            assert_approx_eq!(p.beta[(4, node)], raw * 0.5);
            assert_approx_eq!(p.beta[(8, node)], raw * 0.5);
        }
    }

    #[test]
    fn npi_starting_after_start_date_applies_from_its_own_date() {
        // Raw beta is 3 * (3 / 6) / 3 = 0.5.
        let npi = NpiSeries::new(vec![(date("2020-01-15"), 0.6)]).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let p = parameters_quick_draw(&fixed_config(), 21, 2, 1.0, &npi, start(), &mut rng).unwrap();
        for node in 0..2 {
            assert_approx_eq!(p.beta[(0, node)], 0.5);
            assert_approx_eq!(p.beta[(13, node)], 0.5);
            assert_approx_eq!(p.beta[(14, node)], 0.5 * 0.4);
            assert_approx_eq!(p.beta[(20, node)], 0.5 * 0.4);
        }
    }

    #[test]
    fn npi_starting_before_start_date_is_read_at_start_date() {
        let npi = NpiSeries::new(vec![
            (date("2019-12-01"), 0.2),
            (date("2019-12-25"), 0.4),
            (date("2020-01-03"), 0.8),
        ])
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        // Quarter-day steps: index 8 is 2020-01-03 00:00.
        let p = parameters_quick_draw(&fixed_config(), 12, 1, 0.25, &npi, start(), &mut rng).unwrap();
        assert_approx_eq!(p.beta[(0, 0)], 0.5 * 0.6);
        assert_approx_eq!(p.beta[(7, 0)], 0.5 * 0.6);
        assert_approx_eq!(p.beta[(8, 0)], 0.5 * 0.2);
        assert_approx_eq!(p.beta[(11, 0)], 0.5 * 0.2);
    }

    #[test]
    fn draw_from_setup_uses_grid_shape() {
        let setup = setup_with("2020-01-01", "2020-01-11", 1.0 / 6.0);
        let npi = NpiSeries::no_intervention(setup.ti());
        let mut rng = SmallRng::seed_from_u64(42);
        let p = parameters_draw(&setup, &fixed_config(), &npi, &mut rng).unwrap();
        assert_eq!(p.beta.shape(), (setup.t_inter().len(), setup.nnodes()));
    }

    #[test]
    fn draw_from_setup_aligns_npi_to_start_date() {
        let setup = setup_with("2020-01-01", "2020-01-11", 0.5);
        let npi = NpiSeries::new(vec![(date("2020-01-04"), 1.0)]).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let p = parameters_draw(&setup, &fixed_config(), &npi, &mut rng).unwrap();
        // t_inter[6] is day 3.
        assert_eq!(setup.t_inter()[6], 3.0);
        assert_approx_eq!(p.beta[(5, 2)], 0.5);
        assert_eq!(p.beta[(6, 2)], 0.0);
    }
}
