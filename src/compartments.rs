//! The compartment layout shared with the integrator.
//!
//! The model is SEIR with the infectious period split into [`N_INFECTIOUS_COMPARTMENTS`]
//! sequential stages, plus a cumulative-incidence tally. Splitting the infectious period gives an
//! Erlang-distributed duration instead of an exponential one; the per-stage exit rate must be
//! `n` times the overall recovery rate for the mean duration to be unchanged.

/// Number of compartments in the state vector.
pub const N_COMPARTMENTS: usize = 7;

/// Number of sequential infectious stages.
pub const N_INFECTIOUS_COMPARTMENTS: usize = 3;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Compartment {
    S,
    E,
    I1,
    I2,
    I3,
    R,
    /// Cumulative infections. Never decreases.
    CumI,
}

impl Compartment {
    pub const ALL: [Compartment; N_COMPARTMENTS] = [
        Compartment::S,
        Compartment::E,
        Compartment::I1,
        Compartment::I2,
        Compartment::I3,
        Compartment::R,
        Compartment::CumI,
    ];

    /// Position of the compartment in the state vector.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn is_infectious(self) -> bool {
        matches!(self, Compartment::I1 | Compartment::I2 | Compartment::I3)
    }
}
