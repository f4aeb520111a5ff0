//! Explicit, per-replicate random number generators.
//!
//! Nothing in this crate touches a global generator. A draw takes `&mut impl Rng` and callers
//! obtain one from [`replicate_rng`], which derives the seed from a base seed, the name of the
//! stream (see [`define_rng!`]), and the replicate index. Two replicates therefore never share
//! state and can be drawn in any order, or on different threads, with identical results.
mod macros;

use std::hash::Hasher;

use log::trace;
use rustc_hash::FxHasher;

pub use macros::define_rng;

use crate::rand::SeedableRng;

pub trait RngId: Copy + Clone {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

define_rng!(SeedingRng);
define_rng!(ParametersRng);

/// A convenience method to compute a stable hash of a `&str`.
fn hash_str(data: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_bytes());
    hasher.finish()
}

/// Creates the generator for stream `R` and replicate `replicate_id`.
#[must_use]
pub fn replicate_rng<R: RngId>(_rng_id: R, base_seed: u64, replicate_id: usize) -> R::RngType {
    let stream_offset = hash_str(R::get_name());
    let seed = base_seed
        .wrapping_add(stream_offset)
        .wrapping_add((replicate_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    trace!(
        "creating RNG {} for replicate {} (base seed={})",
        R::get_name(),
        replicate_id,
        base_seed
    );
    R::RngType::seed_from_u64(seed)
}
