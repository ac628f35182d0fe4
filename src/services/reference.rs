//! Reference code generation.
//!
//! Codes are short numeric tokens the payer keys into the USSD menu, so
//! they must be human-enterable and unpredictable. The RNG is injected
//! rather than ambient so tests can pin a seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::validation::REFERENCE_CODE_LEN;

pub struct ReferenceCodeGenerator {
    rng: Mutex<StdRng>,
}

impl ReferenceCodeGenerator {
    /// Seeded from OS entropy; the production constructor.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sequence for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Draw one 8-digit candidate. Uniqueness is the database's job: the
    /// unique index on `reference_code` rejects collisions and the caller
    /// re-draws.
    pub fn draw(&self) -> String {
        let mut rng = self.rng.lock().unwrap();
        (0..REFERENCE_CODE_LEN)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }
}

impl Default for ReferenceCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}
