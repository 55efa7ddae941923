use serde::{Deserialize, Serialize};

use super::{Mode, RoundStatus};

/// Append-only record of one settled round.
///
/// Written exactly once per round at settlement; never mutated afterward
/// except by administrative correction tooling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub round_id: u64,
    pub user: String,
    pub mode: Mode,
    pub stake_cents: u64,
    /// Cumulative multiplier at the terminal transition, in basis points.
    pub cashout_bps: u64,
    pub payout_cents: u64,
    /// Terminal flight state the round settled from (cashed or crashed).
    pub outcome: RoundStatus,
    pub settled_at_ms: u64,
}

impl HistoryEntry {
    /// A round wins only when the compounded multiplier cleared 1.0x.
    pub fn is_win(&self) -> bool {
        self.payout_cents > 0
    }

    pub fn net_cents(&self) -> i64 {
        self.payout_cents as i64 - self.stake_cents as i64
    }
}
