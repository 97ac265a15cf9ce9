pub mod run;
pub mod scan;
pub mod sessions;
pub mod simulate;

use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;

use trialbench_core::{TrialPool, build_balanced_pool, scan_dir};

/// Seeded generator, or OS entropy when no seed is given.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Scan a stimulus directory and build a condition-balanced pool, exiting
/// with a diagnostic when the corpus cannot support the requested size.
pub fn make_pool(stimuli: &str, items: usize, rng: &mut StdRng) -> TrialPool {
    let candidates = match scan_dir(Path::new(stimuli)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to scan {stimuli}: {e}");
            std::process::exit(1);
        }
    };

    match build_balanced_pool(&candidates, items, rng) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Cannot build a {items}-item pool from {stimuli}: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_rng_is_reproducible_with_seed() {
        use rand::Rng;
        let mut a = make_rng(Some(99));
        let mut b = make_rng(Some(99));
        for _ in 0..10 {
            assert_eq!(a.random::<u64>(), b.random::<u64>());
        }
    }
}
