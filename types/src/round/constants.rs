/// Number of multiplier zones generated per round.
pub const ZONES_PER_ROUND: usize = 6;

/// End of the flight path in position tenths (100.0 units).
pub const PATH_END_TENTHS: u32 = 1_000;

/// Flight advance per tick in position tenths (1.5 units per 100ms tick,
/// so the full path traverses in ~6.7 seconds).
pub const TICK_STEP_TENTHS: u32 = 15;

/// Zone hit tolerance in position tenths (±2.0 units).
pub const HIT_WINDOW_TENTHS: u32 = 20;

/// Tick interval driving the flight, in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 100;

/// Basis points representing a 1.0x multiplier.
pub const ONE_X_BPS: u64 = 10_000;

/// Floor for the cumulative multiplier (0.1x). The compounded multiplier
/// never reaches zero while the stake is positive.
pub const MIN_CUMULATIVE_BPS: u64 = 1_000;

/// Basis points per multiplier tenth (one-decimal multipliers).
pub const BPS_PER_TENTH: u64 = 1_000;

/// Starting practice balance for newly provisioned practice accounts, in cents.
pub const INITIAL_PRACTICE_CENTS: u64 = 100_000;

/// Largest stake accepted by the controller, in cents.
pub const MAX_STAKE_CENTS: u64 = 100_000_000;

/// An active round without tick progress for this long is force-crashed so
/// its debit can be resolved.
pub const STALL_TIMEOUT_MS: u64 = 30_000;

/// Position of a zone along the path, in tenths. Zones are equally spaced at
/// 100/7 units so the sequence is strictly increasing inside (0, 100).
pub fn zone_position_tenths(index: usize) -> u32 {
    ((index as u32) + 1) * PATH_END_TENTHS / (ZONES_PER_ROUND as u32 + 1)
}
