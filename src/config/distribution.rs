//! Random-distribution specifications and the samplers built from them.
//!
//! A distribution appears in the configuration as a map with a `distribution` key naming the
//! family and one entry per parameter:
//!
//! ```json
//! { "distribution": "uniform", "low": "1/6", "high": "1/2.6" }
//! ```
//!
//! Parameters may be numbers or expressions. A plain number or expression where a distribution
//! is expected is treated as `fixed`.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use rand::distr::{Distribution, Uniform};
use rand::Rng;
use rand_distr::{Binomial, LogNormal, Normal, Poisson};
use serde::Deserialize;

use crate::config::expression::evaluate;
use crate::error::SetupError;

// Rejection sampling gives up on a truncated normal after this many tries.
const MAX_TRUNCNORM_TRIES: usize = 10_000;

/// A parameter value, either a literal number or an expression to evaluate.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Expression(String),
}

impl ParamValue {
    /// # Errors
    /// Returns `SetupError::ConfigError` if the expression does not evaluate.
    pub fn value(&self) -> Result<f64, SetupError> {
        match self {
            ParamValue::Number(x) => Ok(*x),
            ParamValue::Expression(source) => evaluate(source),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DistributionSpec {
    pub distribution: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, ParamValue>,
}

impl DistributionSpec {
    fn param(&self, key: &str, name: &str) -> Result<f64, SetupError> {
        self.params
            .get(key)
            .ok_or_else(|| {
                SetupError::ConfigError(format!(
                    "{name}: '{}' distribution requires parameter '{key}'",
                    self.distribution
                ))
            })?
            .value()
    }

    /// Validates the parameters and builds a sampler. `name` is the configuration key, used in
    /// error messages.
    ///
    /// # Errors
    /// Returns `SetupError::ConfigError` for an unknown family, a missing parameter, or
    /// parameters the family does not accept.
    pub fn sampler(&self, name: &str) -> Result<Sampler, SetupError> {
        let invalid = |e: &dyn Display| {
            SetupError::ConfigError(format!(
                "{name}: invalid '{}' distribution: {e}",
                self.distribution
            ))
        };
        match self.distribution.as_str() {
            "fixed" => Ok(Sampler::Fixed(self.param("value", name)?)),
            "uniform" => {
                let (low, high) = (self.param("low", name)?, self.param("high", name)?);
                let uniform = Uniform::new_inclusive(low, high).map_err(|e| invalid(&e))?;
                Ok(Sampler::Uniform(uniform))
            }
            "poisson" => {
                let lam = self.param("lam", name)?;
                Ok(Sampler::Poisson(Poisson::new(lam).map_err(|e| invalid(&e))?))
            }
            "binomial" => {
                let n = self.param("n", name)?;
                let p = self.param("p", name)?;
                if n < 0.0 || n.fract() != 0.0 {
                    return Err(invalid(&format!("n must be a non-negative integer, got {n}")));
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let binomial = Binomial::new(n as u64, p).map_err(|e| invalid(&e))?;
                Ok(Sampler::Binomial(binomial))
            }
            "truncnorm" => {
                let normal = Normal::new(self.param("mean", name)?, self.param("sd", name)?)
                    .map_err(|e| invalid(&e))?;
                let (a, b) = (self.param("a", name)?, self.param("b", name)?);
                if a >= b {
                    return Err(invalid(&format!("lower bound {a} is not below upper bound {b}")));
                }
                Ok(Sampler::TruncNormal { normal, a, b })
            }
            "lognorm" => {
                let lognormal = LogNormal::new(self.param("meanlog", name)?, self.param("sdlog", name)?)
                    .map_err(|e| invalid(&e))?;
                Ok(Sampler::LogNormal(lognormal))
            }
            other => Err(SetupError::ConfigError(format!(
                "{name}: unknown distribution '{other}'"
            ))),
        }
    }
}

/// Produces one draw per call from a configured distribution. The generator is always supplied
/// by the caller.
#[derive(Clone, Debug)]
pub enum Sampler {
    Fixed(f64),
    Uniform(Uniform<f64>),
    Poisson(Poisson<f64>),
    Binomial(Binomial),
    TruncNormal { normal: Normal<f64>, a: f64, b: f64 },
    LogNormal(LogNormal<f64>),
}

impl Sampler {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Sampler::Fixed(value) => *value,
            Sampler::Uniform(d) => d.sample(rng),
            Sampler::Poisson(d) => d.sample(rng),
            #[allow(clippy::cast_precision_loss)]
            Sampler::Binomial(d) => d.sample(rng) as f64,
            Sampler::TruncNormal { normal, a, b } => {
                for _ in 0..MAX_TRUNCNORM_TRIES {
                    let x = normal.sample(rng);
                    if (*a..=*b).contains(&x) {
                        return x;
                    }
                }
                // Almost no mass inside [a, b]; the nearest bound is the best answer left.
                normal.mean().clamp(*a, *b)
            }
            Sampler::LogNormal(d) => d.sample(rng),
        }
    }
}

impl Display for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Sampler::Fixed(value) => write!(f, "fixed({value})"),
            Sampler::Uniform(_) => write!(f, "uniform"),
            Sampler::Poisson(_) => write!(f, "poisson"),
            Sampler::Binomial(_) => write!(f, "binomial"),
            Sampler::TruncNormal { normal, a, b } => write!(
                f,
                "truncnorm(mean={}, sd={}, a={a}, b={b})",
                normal.mean(),
                normal.std_dev()
            ),
            Sampler::LogNormal(_) => write!(f, "lognorm"),
        }
    }
}
