//! Reproducible per-path random streams.
//!
//! Path `i` of a simulation seeded with `base` draws from
//! `StdRng::seed_from_u64(stream_seed(base, i))`. The result never depends on
//! the order in which paths are generated, so serial and rayon runs agree.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// SplitMix64 output function.
#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed of sub-stream `stream_index` derived from `base_seed`.
#[inline]
pub fn stream_seed(base_seed: u64, stream_index: usize) -> u64 {
    splitmix64(base_seed ^ splitmix64(stream_index as u64))
}

/// Generator for sub-stream `stream_index`.
#[inline]
pub fn stream_rng(base_seed: u64, stream_index: usize) -> StdRng {
    StdRng::seed_from_u64(stream_seed(base_seed, stream_index))
}

/// Returns `seed` or, when absent, a fresh entropy-drawn seed (logged so the
/// run can be replayed).
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(s) => s,
        None => {
            let drawn = rand::thread_rng().gen::<u64>();
            tracing::warn!(seed = drawn, "no simulation seed supplied; drew one from entropy");
            drawn
        }
    }
}
