//! Flight state machine.
//!
//! Owns the temporal progression of one round: position advance, zone-hit
//! detection, multiplier compounding, and terminal transitions. All
//! functions are pure over the round value; the timer that drives ticking
//! lives with the caller, so a cancelled timer racing a transition costs
//! nothing (ticks on terminal rounds are no-ops, never errors).

use skymultiplier_types::{
    Round, RoundStatus, BPS_PER_TENTH, HIT_WINDOW_TENTHS, MIN_CUMULATIVE_BPS, ONE_X_BPS,
    PATH_END_TENTHS, TICK_STEP_TENTHS,
};
use thiserror::Error as ThisError;
use tracing::debug;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum FlightError {
    #[error("round is not pending (status {status:?})")]
    NotPending { status: RoundStatus },
    /// Cash-out arrived after the round left `Active` (usually a race with
    /// the final tick). Rejected rather than silently accepted so a stale
    /// intent can never trigger a second settlement path.
    #[error("round is not active (status {status:?})")]
    NotActive { status: RoundStatus },
}

/// One zone crossed during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoneHit {
    pub index: usize,
    pub multiplier_tenths: u32,
    /// Accumulator value after this hit was applied.
    pub cumulative_bps: u64,
}

/// Result of advancing the flight by one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub hits: Vec<ZoneHit>,
    pub crashed: bool,
}

/// Apply one multiplier to the accumulator, flooring at 0.1x so the payout
/// can shrink but never collapse to zero against a positive stake.
pub(crate) fn compound(cumulative_bps: u64, multiplier_tenths: u32) -> u64 {
    let multiplier_bps = multiplier_tenths as u128 * BPS_PER_TENTH as u128;
    let raw = (cumulative_bps as u128 * multiplier_bps) / ONE_X_BPS as u128;
    raw.clamp(MIN_CUMULATIVE_BPS as u128, u64::MAX as u128) as u64
}

/// Start a pending round.
pub fn launch(round: &mut Round) -> Result<(), FlightError> {
    if round.status != RoundStatus::Pending {
        return Err(FlightError::NotPending {
            status: round.status,
        });
    }
    round.status = RoundStatus::Active;
    Ok(())
}

/// Advance the flight by one tick.
///
/// Every un-hit zone whose position the flight has entered (within the hit
/// window) is processed in position order — all of them, not just the
/// first, so a large step can never silently skip a zone. Reaching the end
/// of the path clamps the position and transitions to `CrashedOut`.
pub fn advance(round: &mut Round) -> TickOutcome {
    if round.status != RoundStatus::Active {
        return TickOutcome::default();
    }

    round.position_tenths = (round.position_tenths + TICK_STEP_TENTHS).min(PATH_END_TENTHS);
    let reach = round.position_tenths + HIT_WINDOW_TENTHS;

    let mut outcome = TickOutcome::default();
    for index in 0..round.zones.len() {
        let zone = round.zones[index];
        if zone.hit || zone.position_tenths > reach {
            continue;
        }
        round.zones[index].hit = true;
        round.cumulative_bps = compound(round.cumulative_bps, zone.multiplier_tenths);
        debug!(
            round_id = round.round_id,
            zone = index,
            multiplier_tenths = zone.multiplier_tenths,
            cumulative_bps = round.cumulative_bps,
            "zone hit"
        );
        outcome.hits.push(ZoneHit {
            index,
            multiplier_tenths: zone.multiplier_tenths,
            cumulative_bps: round.cumulative_bps,
        });
    }

    if round.position_tenths >= PATH_END_TENTHS {
        round.status = RoundStatus::CrashedOut;
        outcome.crashed = true;
        debug!(
            round_id = round.round_id,
            cumulative_bps = round.cumulative_bps,
            "flight crashed out at end of path"
        );
    }

    outcome
}

/// Lock in the current multiplier and stop the flight.
///
/// Valid only while the round is `Active`; the accumulator is frozen at its
/// last-computed value and no later tick can mutate it.
pub fn cash_out(round: &mut Round) -> Result<(), FlightError> {
    if round.status != RoundStatus::Active {
        return Err(FlightError::NotActive {
            status: round.status,
        });
    }
    round.status = RoundStatus::CashedOut;
    Ok(())
}
