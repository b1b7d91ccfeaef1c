//! Entropy sources for identifier generation.
//!
//! Production code mints identifiers from OS entropy. Tests and lab
//! simulations use a seeded source so that every run produces the same
//! client, task and object IDs.

use crate::error::{Error, ErrorKind, Result};
use crate::util::DetRng;
use parking_lot::Mutex;
use std::sync::Arc;

/// Core trait for entropy providers.
pub trait EntropySource: Send + Sync + 'static {
    /// Fill a buffer with entropy bytes.
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()>;

    /// Derive an independent source, e.g. one per simulated process.
    fn fork(&self, stream: u64) -> Arc<dyn EntropySource>;

    /// Stable identifier for tracing and diagnostics.
    fn source_id(&self) -> &'static str;
}

/// OS-backed entropy source for production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        getrandom::fill(dest)
            .map_err(|e| Error::new(ErrorKind::Entropy).with_context(e.to_string()))
    }

    fn fork(&self, _stream: u64) -> Arc<dyn EntropySource> {
        Arc::new(Self)
    }

    fn source_id(&self) -> &'static str {
        "os"
    }
}

/// Deterministic entropy source for the lab store and tests.
#[derive(Debug)]
pub struct DetEntropy {
    rng: Mutex<DetRng>,
    seed: u64,
}

impl DetEntropy {
    /// Create a deterministic entropy source from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(DetRng::new(seed)),
            seed,
        }
    }

    /// Returns the seed this source was created from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    fn mix_seed(mut seed: u64) -> u64 {
        seed ^= seed >> 30;
        seed = seed.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        seed ^= seed >> 27;
        seed = seed.wrapping_mul(0x94d0_49bb_1331_11eb);
        seed ^= seed >> 31;
        seed
    }
}

impl EntropySource for DetEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        self.rng.lock().fill_bytes(dest);
        Ok(())
    }

    fn fork(&self, stream: u64) -> Arc<dyn EntropySource> {
        let child_seed = self
            .seed
            .wrapping_add(0x9e37_79b9_7f4a_7c15)
            .wrapping_add(stream.wrapping_mul(0x517c_c1b7_2722_0a95));
        Arc::new(Self::new(Self::mix_seed(child_seed)))
    }

    fn source_id(&self) -> &'static str {
        "deterministic"
    }
}
