//! A small configuration tree with typed accessors.
//!
//! Configuration is loaded from JSON into a tree of [`ConfigValue`] nodes. Consumers never match
//! on the tree directly; they go through [`Config`], which offers five kinds of read:
//!
//! * [`Config::get_string`] for plain strings (file names, method names, column names),
//! * [`Config::get_expression`] for numbers, which may be written as arithmetic expressions
//!   (`"1/5.2"`), see [`expression`],
//! * [`Config::get_sampler`] for random distributions, see [`distribution`],
//! * [`Config::has`] for presence checks,
//! * [`Config::get_bool`] for on/off switches.
//!
//! Keys may be dotted paths into nested maps, e.g. `"seir.parameters.sigma"`. Values are
//! scalars, distributions or nested maps; JSON arrays are not accepted.

pub mod distribution;
pub mod expression;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

pub use distribution::{DistributionSpec, ParamValue, Sampler};
use crate::error::SetupError;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Number(f64),
    String(String),
    /// A map carrying a `distribution` key.
    Distribution(DistributionSpec),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "a boolean",
            ConfigValue::Number(_) => "a number",
            ConfigValue::String(_) => "a string",
            ConfigValue::Distribution(_) => "a distribution",
            ConfigValue::Map(_) => "a map",
        }
    }
}

/// A view of one node of the configuration tree together with its path from the root.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    path: String,
    value: ConfigValue,
}

impl Config {
    #[must_use]
    pub fn new(value: ConfigValue) -> Self {
        Config {
            path: String::new(),
            value,
        }
    }

    /// # Errors
    /// Returns `SetupError::JsonError` if `json` is not a valid configuration.
    pub fn from_json_str(json: &str) -> Result<Self, SetupError> {
        Ok(Config::new(serde_json::from_str(json)?))
    }

    /// # Errors
    /// Returns an I/O error if the file cannot be read and `SetupError::JsonError` if it is not a
    /// valid configuration.
    pub fn from_file(path: &Path) -> Result<Self, SetupError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// The dotted path of this node from the root; empty for the root itself.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn value(&self) -> &ConfigValue {
        &self.value
    }

    fn full_key(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn lookup(&self, key: &str) -> Option<&ConfigValue> {
        key.split('.').try_fold(&self.value, |node, part| match node {
            ConfigValue::Map(map) => map.get(part),
            _ => None,
        })
    }

    fn require(&self, key: &str) -> Result<&ConfigValue, SetupError> {
        self.lookup(key).ok_or_else(|| {
            SetupError::ConfigError(format!("missing configuration key '{}'", self.full_key(key)))
        })
    }

    /// Returns whether `key` is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Returns the subtree at `key`.
    ///
    /// # Errors
    /// Returns `SetupError::ConfigError` if the key is absent.
    pub fn get(&self, key: &str) -> Result<Config, SetupError> {
        Ok(Config {
            path: self.full_key(key),
            value: self.require(key)?.clone(),
        })
    }

    /// # Errors
    /// Returns `SetupError::ConfigError` if the key is absent or not a string.
    pub fn get_string(&self, key: &str) -> Result<String, SetupError> {
        match self.require(key)? {
            ConfigValue::String(s) => Ok(s.clone()),
            other => Err(self.wrong_kind(key, "a string", other)),
        }
    }

    /// Reads a number, evaluating it first if it is written as an expression.
    ///
    /// # Errors
    /// Returns `SetupError::ConfigError` if the key is absent, not a number or string, or the
    /// expression does not evaluate.
    pub fn get_expression(&self, key: &str) -> Result<f64, SetupError> {
        match self.require(key)? {
            ConfigValue::Number(x) => Ok(*x),
            ConfigValue::String(source) => expression::evaluate(source).map_err(|e| match e {
                SetupError::ConfigError(msg) => {
                    SetupError::ConfigError(format!("{}: {msg}", self.full_key(key)))
                }
                other => other,
            }),
            other => Err(self.wrong_kind(key, "a number or expression", other)),
        }
    }

    /// Reads a non-negative whole number.
    ///
    /// # Errors
    /// Returns `SetupError::ConfigError` if the value is negative or fractional, in addition to
    /// the failures of [`Config::get_expression`].
    pub fn get_usize(&self, key: &str) -> Result<usize, SetupError> {
        let value = self.get_expression(key)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(SetupError::ConfigError(format!(
                "'{}' must be a non-negative whole number, got {value}",
                self.full_key(key)
            )));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(value as usize)
    }

    /// # Errors
    /// Returns `SetupError::ConfigError` if the key is absent or not a boolean.
    pub fn get_bool(&self, key: &str) -> Result<bool, SetupError> {
        match self.require(key)? {
            ConfigValue::Bool(b) => Ok(*b),
            other => Err(self.wrong_kind(key, "a boolean", other)),
        }
    }

    /// Builds a sampler for the distribution at `key`. A bare number or expression is read as a
    /// fixed distribution.
    ///
    /// # Errors
    /// Returns `SetupError::ConfigError` if the key is absent or does not describe a valid
    /// distribution.
    pub fn get_sampler(&self, key: &str) -> Result<Sampler, SetupError> {
        match self.require(key)? {
            ConfigValue::Distribution(spec) => spec.sampler(&self.full_key(key)),
            ConfigValue::Number(_) | ConfigValue::String(_) => {
                Ok(Sampler::Fixed(self.get_expression(key)?))
            }
            other => Err(self.wrong_kind(key, "a distribution", other)),
        }
    }

    fn wrong_kind(&self, key: &str, expected: &str, found: &ConfigValue) -> SetupError {
        SetupError::ConfigError(format!(
            "'{}' must be {expected}, found {}",
            self.full_key(key),
            found.kind()
        ))
    }
}
