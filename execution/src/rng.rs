//! Deterministic per-round randomness.
//!
//! Each round draws its zones from a ChaCha stream derived from the table
//! seed and the round id, so any party holding the seed can reproduce a
//! round's multiplier sequence exactly.
//!
//! This is house-trusted determinism, not provable fairness: the seed is
//! never committed to players before betting, so outcomes are auditable by
//! the operator but not verifiable by clients.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derive the RNG stream for one round.
///
/// The two ids are mixed with distinct odd multipliers so adjacent round ids
/// (and adjacent seeds) land in unrelated streams.
pub fn round_rng(table_seed: u64, round_id: u64) -> ChaCha8Rng {
    let mixed = table_seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ round_id.wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    ChaCha8Rng::seed_from_u64(mixed)
}
