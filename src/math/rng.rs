//! Process-wide seeded generator used for weight initialization.
//!
//! Every run that starts from the same seed and performs the same sequence of
//! draws produces the same weights. The generator sits behind a mutex, so
//! drawing from several threads is safe, but the interleaving of those draws
//! (and therefore the values each thread sees) is then up to the scheduler.
//! Callers that need determinism under concurrency should seed their own
//! generator with [`seeded`] and use the `*_with` variants on `Matrix`.

use std::sync::{Mutex, MutexGuard, OnceLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_SEED: u64 = 42;

static GLOBAL: OnceLock<Mutex<StdRng>> = OnceLock::new();

fn global() -> MutexGuard<'static, StdRng> {
    GLOBAL
        .get_or_init(|| Mutex::new(StdRng::seed_from_u64(DEFAULT_SEED)))
        .lock()
        // A panic while holding the lock cannot leave a StdRng half-updated.
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Restarts the process-wide generator from `seed`.
pub fn set_seed(seed: u64) {
    *global() = StdRng::seed_from_u64(seed);
}

/// A fresh generator independent of the process-wide one.
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Uniform sample in [-1, 1).
pub fn uniform_signed<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(-1.0..1.0)
}

/// Runs `f` with exclusive access to the process-wide generator.
///
/// `f` must not call back into anything that draws from the global generator.
pub fn with_global<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    let mut rng = global();
    f(&mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_generators_agree() {
        let mut a = seeded(7);
        let mut b = seeded(7);
        for _ in 0..100 {
            assert_eq!(uniform_signed(&mut a), uniform_signed(&mut b));
        }
    }

    #[test]
    fn uniform_signed_stays_in_range() {
        let mut rng = seeded(12345);
        for _ in 0..1000 {
            let v = uniform_signed(&mut rng);
            assert!((-1.0..1.0).contains(&v));
        }
    }
}
