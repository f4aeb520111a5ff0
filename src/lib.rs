//! Setup and stochastic inputs for metapopulation SEIR simulations
//!
//! This crate prepares everything a compartmental epidemic integrator needs before it starts
//! stepping, for a network of geographic nodes linked by mobility flows:
//!
//! * [`spatial`]: the node table (geoids and populations) and the mobility matrix, with the
//!   consistency checks between them.
//! * [`setup`]: the calendar range and step size turned into a time grid, plus the optional
//!   dynamic filter.
//! * [`seeding`]: per-replicate importation schedules.
//! * [`parameters`]: per-replicate draws of the transmission, incubation, and recovery rates,
//!   with a non-pharmaceutical intervention series ([`npi`]) folded into the transmission rate.
//!
//! The spatial setup and grid are built once per experiment; seeding and parameters are drawn
//! once per replicate. Draws take their random number generator as an argument, and
//! [`random::replicate_rng`] gives every replicate its own, so results depend only on the base
//! seed and the replicate index.
//!
//! [`experiment::Experiment`] wires all of this to a JSON configuration file, and the
//! `seir-setup` binary exposes it on the command line.
pub mod compartments;
pub mod config;
pub mod error;
pub mod experiment;
pub mod log;
pub mod matrix;
pub mod npi;
pub mod parameters;
pub mod random;
pub mod runner;
pub mod seeding;
pub mod setup;
pub mod spatial;

pub use compartments::{Compartment, N_COMPARTMENTS, N_INFECTIOUS_COMPARTMENTS};
pub use config::{Config, ConfigValue, Sampler};
pub use error::SetupError;
pub use experiment::{Experiment, Replicate};
pub use matrix::DenseMatrix;
pub use npi::NpiSeries;
pub use parameters::{parameters_draw, parameters_quick_draw, DrawnParameters};
pub use seeding::{seeding_draw, SeedingMethod};
pub use setup::{SetupOptions, SimulationSetup};
pub use spatial::SpatialSetup;

// Re-export for the `define_rng!` macro and for callers building generators
pub use rand;
pub use nalgebra;
