//! Internal utilities.
//!
//! These utilities are intentionally minimal so that the lab store and the
//! identifier generator behave identically across runs when seeded.

pub mod det_rng;
pub mod entropy;

pub use det_rng::DetRng;
pub use entropy::{DetEntropy, EntropySource, OsEntropy};
