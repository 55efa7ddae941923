use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use super::{MIN_CUMULATIVE_BPS, ONE_X_BPS, PATH_END_TENTHS, ZONES_PER_ROUND};

/// Balance pool a round plays against. The two pools are fully isolated;
/// chips never move between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Practice,
    Real,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Practice => "practice",
            Mode::Real => "real",
        }
    }
}

/// Round lifecycle state.
///
/// `Pending → Active → {CashedOut | CrashedOut} → Settled`. "Crashed" names
/// reaching the end of the path, not necessarily a loss: a crashed round
/// still pays out if its cumulative multiplier ended above 1.0x.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Pending,
    Active,
    CashedOut,
    CrashedOut,
    Settled,
}

impl RoundStatus {
    /// Terminal flight states awaiting (or past) settlement.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RoundStatus::CashedOut | RoundStatus::CrashedOut | RoundStatus::Settled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Pending => "pending",
            RoundStatus::Active => "active",
            RoundStatus::CashedOut => "cashed_out",
            RoundStatus::CrashedOut => "crashed_out",
            RoundStatus::Settled => "settled",
        }
    }
}

/// One multiplier checkpoint on the flight path.
///
/// Positions are tenths of a path unit; multipliers are one-decimal values
/// stored as tenths (15 = 1.5x). `hit` never reverts within a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub position_tenths: u32,
    pub multiplier_tenths: u32,
    pub hit: bool,
}

impl Zone {
    pub fn new(position_tenths: u32, multiplier_tenths: u32) -> Self {
        Self {
            position_tenths,
            multiplier_tenths,
            hit: false,
        }
    }
}

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum RoundInvariantError {
    #[error("expected {expected} zones (got {got})")]
    ZoneCount { got: usize, expected: usize },
    #[error("zone positions must be strictly increasing (index {index})")]
    ZoneOrder { index: usize },
    #[error("zone {index} outside the open path interval")]
    ZoneOutOfPath { index: usize },
    #[error("cumulative multiplier below floor (got {got} bps)")]
    CumulativeBelowFloor { got: u64 },
    #[error("flight position past end of path (got {got} tenths)")]
    PositionPastEnd { got: u32 },
}

/// One flight attempt from stake to settlement.
///
/// Owned exclusively by the bet session controller while live; the flight
/// state machine is the only mutator of position, hits, and the accumulator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub round_id: u64,
    pub user: String,
    pub mode: Mode,
    /// Amount wagered, in cents. Debited before the round goes active.
    pub stake_cents: u64,
    /// Generated once at creation; the set of zones never changes afterward.
    pub zones: Vec<Zone>,
    /// Flight position in tenths of a unit, monotonically non-decreasing.
    pub position_tenths: u32,
    /// Running product of hit multipliers, in basis points (10_000 = 1.0x).
    pub cumulative_bps: u64,
    pub status: RoundStatus,
}

impl Round {
    pub fn new(round_id: u64, user: String, mode: Mode, stake_cents: u64, zones: Vec<Zone>) -> Self {
        Self {
            round_id,
            user,
            mode,
            stake_cents,
            zones,
            position_tenths: 0,
            cumulative_bps: ONE_X_BPS,
            status: RoundStatus::Pending,
        }
    }

    /// Current compounded value of the stake, in cents.
    pub fn live_value_cents(&self) -> u64 {
        ((self.stake_cents as u128 * self.cumulative_bps as u128) / ONE_X_BPS as u128) as u64
    }

    /// Binary settlement amount: the full compounded value on a win
    /// (multiplier strictly above 1.0x), nothing otherwise.
    pub fn payout_cents(&self) -> u64 {
        if self.cumulative_bps > ONE_X_BPS {
            self.live_value_cents()
        } else {
            0
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn validate_invariants(&self) -> Result<(), RoundInvariantError> {
        if self.zones.len() != ZONES_PER_ROUND {
            return Err(RoundInvariantError::ZoneCount {
                got: self.zones.len(),
                expected: ZONES_PER_ROUND,
            });
        }
        for (index, pair) in self.zones.windows(2).enumerate() {
            if pair[0].position_tenths >= pair[1].position_tenths {
                return Err(RoundInvariantError::ZoneOrder { index: index + 1 });
            }
        }
        for (index, zone) in self.zones.iter().enumerate() {
            if zone.position_tenths == 0 || zone.position_tenths >= PATH_END_TENTHS {
                return Err(RoundInvariantError::ZoneOutOfPath { index });
            }
        }
        if self.cumulative_bps < MIN_CUMULATIVE_BPS {
            return Err(RoundInvariantError::CumulativeBelowFloor {
                got: self.cumulative_bps,
            });
        }
        if self.position_tenths > PATH_END_TENTHS {
            return Err(RoundInvariantError::PositionPastEnd {
                got: self.position_tenths,
            });
        }
        Ok(())
    }
}
