//! Bet session controller.
//!
//! Orchestrates one bet lifecycle end to end: stake validation, atomic debit
//! before the round goes active, flight driving, and explicit two-phase
//! settlement against the ledger and history collaborators. Real and
//! practice rounds run through the same code path; only the ledger behind
//! them differs, and the two pools never mix.

use std::collections::HashMap;

use skymultiplier_types::{
    HistoryEntry, HistoryError, LedgerError, Mode, Round, RoundSnapshot, RoundStatus, Zone,
    MAX_STAKE_CENTS,
};
use thiserror::Error as ThisError;
use tracing::{debug, warn};

use crate::flight;
use crate::generator::{GenerationError, GeneratorConfig, RoundGenerator};
use crate::history::HistoryStore;
use crate::ledger::{Ledger, PracticeLedger};
use crate::rng::round_rng;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid stake: {0}")]
    InvalidStake(&'static str),
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("account is suspended")]
    AccountSuspended,
    /// Transient ledger failure. A failed debit left no round behind; a
    /// failed settlement leaves the round terminal and `settle` must be
    /// retried with the same round id until the ledger answers.
    #[error("ledger error: {0}")]
    Ledger(LedgerError),
    #[error("history store error: {0}")]
    History(#[from] HistoryError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("round {0} not found")]
    RoundNotFound(u64),
    /// Cash-out arrived after the round left `Active`; surfaced to the
    /// player as "too late", never applied.
    #[error("round is not active")]
    NotActive,
    #[error("round has not reached a terminal state")]
    NotTerminal,
    /// Benign double-settle; the first settlement already applied.
    #[error("round already settled")]
    AlreadySettled,
}

impl From<LedgerError> for SessionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { .. } => SessionError::InsufficientFunds,
            LedgerError::AccountSuspended => SessionError::AccountSuspended,
            other => SessionError::Ledger(other),
        }
    }
}

/// Outcome of a completed settlement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementResult {
    pub round_id: u64,
    pub outcome: RoundStatus,
    pub cashout_bps: u64,
    pub payout_cents: u64,
    pub new_balance_cents: u64,
}

#[derive(Debug)]
struct TrackedRound {
    round: Round,
    last_progress_ms: u64,
}

/// End-to-end orchestration of bet rounds for one table.
///
/// Rounds are owned exclusively by the controller from debit to settlement;
/// the caller drives time by invoking [`tick_round`](Self::tick_round) from
/// its own timer and passing `now_ms` explicitly (no wall clock in here).
pub struct BetSessionController<L: Ledger, H: HistoryStore> {
    ledger: L,
    practice: PracticeLedger,
    history: H,
    generator: RoundGenerator,
    table_seed: u64,
    next_round_id: u64,
    rounds: HashMap<u64, TrackedRound>,
}

impl<L: Ledger, H: HistoryStore> BetSessionController<L, H> {
    pub fn new(
        ledger: L,
        history: H,
        config: GeneratorConfig,
        table_seed: u64,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            ledger,
            practice: PracticeLedger::new(),
            history,
            generator: RoundGenerator::new(config)?,
            table_seed,
            next_round_id: 1,
            rounds: HashMap::new(),
        })
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn practice_ledger(&self) -> &PracticeLedger {
        &self.practice
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn round(&self, round_id: u64) -> Option<&Round> {
        self.rounds.get(&round_id).map(|tracked| &tracked.round)
    }

    /// Validate the stake, debit it atomically, and start the flight.
    ///
    /// The debit completes (or is confirmed failed) strictly before the
    /// round becomes active; any rejection leaves no round behind.
    pub async fn start_round(
        &mut self,
        user: &str,
        stake_cents: u64,
        mode: Mode,
        now_ms: u64,
    ) -> Result<u64, SessionError> {
        Self::validate_stake(stake_cents)?;
        let round_id = self.mint_round_id();

        // Drawing zones is side-effect free on balances, so a generation
        // failure here can never strand a debit.
        let mut rng = round_rng(self.table_seed, round_id);
        let zones = self.generator.generate(mode, &mut rng)?;

        self.open_round(user, stake_cents, mode, zones, round_id, now_ms)
            .await
    }

    fn validate_stake(stake_cents: u64) -> Result<(), SessionError> {
        if stake_cents == 0 {
            return Err(SessionError::InvalidStake("stake must be positive"));
        }
        if stake_cents > MAX_STAKE_CENTS {
            return Err(SessionError::InvalidStake("stake above table maximum"));
        }
        Ok(())
    }

    fn mint_round_id(&mut self) -> u64 {
        let round_id = self.next_round_id;
        self.next_round_id += 1;
        round_id
    }

    async fn open_round(
        &mut self,
        user: &str,
        stake_cents: u64,
        mode: Mode,
        zones: Vec<Zone>,
        round_id: u64,
        now_ms: u64,
    ) -> Result<u64, SessionError> {
        match mode {
            Mode::Real => self.ledger.debit(user, stake_cents, round_id).await?,
            Mode::Practice => self.practice.debit(user, stake_cents, round_id).await?,
        };

        let mut round = Round::new(round_id, user.to_string(), mode, stake_cents, zones);
        // Freshly constructed rounds are always pending.
        flight::launch(&mut round).expect("new round is pending");
        debug!(round_id, user, stake_cents, mode = mode.as_str(), "round started");

        self.rounds.insert(
            round_id,
            TrackedRound {
                round,
                last_progress_ms: now_ms,
            },
        );
        Ok(round_id)
    }

    /// Advance one round by a single tick. Terminal rounds tick as no-ops.
    pub fn tick_round(
        &mut self,
        round_id: u64,
        now_ms: u64,
    ) -> Result<RoundSnapshot, SessionError> {
        let tracked = self
            .rounds
            .get_mut(&round_id)
            .ok_or(SessionError::RoundNotFound(round_id))?;
        flight::advance(&mut tracked.round);
        tracked.last_progress_ms = now_ms;
        Ok(RoundSnapshot::of(&tracked.round))
    }

    /// Forward a cash-out intent to the flight. No ledger effect; settlement
    /// stays a separate, explicit step.
    pub fn cash_out(&mut self, round_id: u64) -> Result<RoundSnapshot, SessionError> {
        let tracked = self
            .rounds
            .get_mut(&round_id)
            .ok_or(SessionError::RoundNotFound(round_id))?;
        flight::cash_out(&mut tracked.round).map_err(|_| SessionError::NotActive)?;
        debug!(
            round_id,
            cumulative_bps = tracked.round.cumulative_bps,
            "cashed out"
        );
        Ok(RoundSnapshot::of(&tracked.round))
    }

    pub fn snapshot(&self, round_id: u64) -> Result<RoundSnapshot, SessionError> {
        self.rounds
            .get(&round_id)
            .map(|tracked| RoundSnapshot::of(&tracked.round))
            .ok_or(SessionError::RoundNotFound(round_id))
    }

    /// Settle a terminal round: credit the binary payout through the ledger
    /// keyed by the round id, append the history entry, and mark the round
    /// settled.
    ///
    /// On a transient ledger or history failure the round stays terminal and
    /// unsettled; retrying with the same round id is safe because the ledger
    /// applies each round's settlement at most once. A second call after
    /// success fails with [`SessionError::AlreadySettled`].
    pub async fn settle(
        &mut self,
        round_id: u64,
        now_ms: u64,
    ) -> Result<SettlementResult, SessionError> {
        let tracked = self
            .rounds
            .get_mut(&round_id)
            .ok_or(SessionError::RoundNotFound(round_id))?;
        match tracked.round.status {
            RoundStatus::Settled => return Err(SessionError::AlreadySettled),
            RoundStatus::CashedOut | RoundStatus::CrashedOut => {}
            _ => return Err(SessionError::NotTerminal),
        }

        let outcome = tracked.round.status;
        let crashed = outcome == RoundStatus::CrashedOut;
        let payout_cents = tracked.round.payout_cents();
        let cashout_bps = tracked.round.cumulative_bps;
        let mode = tracked.round.mode;
        let user = tracked.round.user.clone();
        let stake_cents = tracked.round.stake_cents;

        let new_balance_cents = match mode {
            Mode::Real => {
                self.ledger
                    .credit_settlement(round_id, payout_cents, crashed)
                    .await?
            }
            Mode::Practice => {
                self.practice
                    .credit_settlement(round_id, payout_cents, crashed)
                    .await?
            }
        };

        // The settled flag only flips after both the credit and the history
        // append succeed; a history failure here retries through the same
        // settle call, and the ledger repeat is an idempotent no-op.
        self.history
            .append(HistoryEntry {
                round_id,
                user,
                mode,
                stake_cents,
                cashout_bps,
                payout_cents,
                outcome,
                settled_at_ms: now_ms,
            })
            .await?;

        let tracked = self
            .rounds
            .get_mut(&round_id)
            .expect("settling round still tracked");
        tracked.round.status = RoundStatus::Settled;
        debug!(round_id, payout_cents, new_balance_cents, "round settled");

        Ok(SettlementResult {
            round_id,
            outcome,
            cashout_bps,
            payout_cents,
            new_balance_cents,
        })
    }

    /// Drop a settled round from working memory once the caller has
    /// acknowledged the result.
    pub fn release(&mut self, round_id: u64) {
        if let Some(tracked) = self.rounds.get(&round_id) {
            if tracked.round.status == RoundStatus::Settled {
                self.rounds.remove(&round_id);
            }
        }
    }

    /// Force-crash active rounds whose timer went away.
    ///
    /// An orphaned round must not hold its debit open forever: anything
    /// without tick progress inside `max_age_ms` transitions to
    /// `CrashedOut` (crash semantics; the binary payout rule still applies)
    /// so normal settlement can resolve it. Returns the affected round ids.
    pub fn reap_stalled(&mut self, now_ms: u64, max_age_ms: u64) -> Vec<u64> {
        let mut reaped = Vec::new();
        for (round_id, tracked) in self.rounds.iter_mut() {
            if tracked.round.status != RoundStatus::Active {
                continue;
            }
            if now_ms.saturating_sub(tracked.last_progress_ms) <= max_age_ms {
                continue;
            }
            tracked.round.status = RoundStatus::CrashedOut;
            warn!(
                round_id,
                idle_ms = now_ms.saturating_sub(tracked.last_progress_ms),
                "force-crashed stalled round"
            );
            reaped.push(*round_id);
        }
        reaped.sort_unstable();
        reaped
    }

    /// Rounds currently in flight.
    pub fn active_round_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .rounds
            .iter()
            .filter(|(_, tracked)| tracked.round.status == RoundStatus::Active)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Terminal rounds still awaiting a successful settlement.
    pub fn unsettled_round_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .rounds
            .iter()
            .filter(|(_, tracked)| {
                matches!(
                    tracked.round.status,
                    RoundStatus::CashedOut | RoundStatus::CrashedOut
                )
            })
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Start a round with a caller-supplied zone sequence instead of drawing
    /// from the generator. Test/mocks entry point.
    #[cfg(any(test, feature = "mocks"))]
    pub async fn start_round_with_zones(
        &mut self,
        user: &str,
        stake_cents: u64,
        mode: Mode,
        zones: Vec<Zone>,
        now_ms: u64,
    ) -> Result<u64, SessionError> {
        Self::validate_stake(stake_cents)?;
        let round_id = self.mint_round_id();
        self.open_round(user, stake_cents, mode, zones, round_id, now_ms)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryHistory;
    use crate::ledger::HouseLedger;
    use crate::mocks::{fixed_zones, FlakyLedger};
    use skymultiplier_types::{INITIAL_PRACTICE_CENTS, ONE_X_BPS};

    type TestController = BetSessionController<HouseLedger, InMemoryHistory>;

    fn controller_with_balance(user: &str, balance_cents: u64) -> TestController {
        BetSessionController::new(
            HouseLedger::new().with_account(user, balance_cents),
            InMemoryHistory::new(),
            GeneratorConfig::default(),
            42,
        )
        .expect("valid default config")
    }

    /// Tick the round until the given zone reports hit.
    fn tick_until_hit<L: Ledger, H: HistoryStore>(
        controller: &mut BetSessionController<L, H>,
        round_id: u64,
        zone_index: usize,
    ) {
        let mut now_ms = 0;
        loop {
            let round = controller.round(round_id).expect("round tracked");
            if round.zones[zone_index].hit {
                break;
            }
            assert_eq!(round.status, RoundStatus::Active, "crashed before hit");
            now_ms += 100;
            controller.tick_round(round_id, now_ms).unwrap();
        }
    }

    fn tick_to_terminal<L: Ledger, H: HistoryStore>(
        controller: &mut BetSessionController<L, H>,
        round_id: u64,
    ) {
        let mut now_ms = 0;
        while controller.round(round_id).unwrap().status == RoundStatus::Active {
            now_ms += 100;
            controller.tick_round(round_id, now_ms).unwrap();
        }
    }

    #[tokio::test]
    async fn test_cash_out_after_third_zone_scenario() {
        // 10.00 staked; 1.5 * 0.8 * 2.0 compounds to 2.4x by the third zone.
        let mut controller = controller_with_balance("alice", 10_000);
        let round_id = controller
            .start_round_with_zones(
                "alice",
                1_000,
                Mode::Real,
                fixed_zones(&[15, 8, 20, 10, 30, 6]),
                0,
            )
            .await
            .unwrap();
        assert_eq!(controller.ledger().balance("alice").await.unwrap(), 9_000);

        tick_until_hit(&mut controller, round_id, 2);
        let snapshot = controller.cash_out(round_id).unwrap();
        assert_eq!(snapshot.cumulative_multiplier, 2.4);
        assert_eq!(snapshot.live_value_cents, 2_400);

        let result = controller.settle(round_id, 1_000).await.unwrap();
        assert_eq!(result.payout_cents, 2_400);
        assert_eq!(result.outcome, RoundStatus::CashedOut);
        assert_eq!(result.new_balance_cents, 11_400);

        // Net gain of 14.00 over the starting balance.
        assert_eq!(controller.ledger().balance("alice").await.unwrap(), 11_400);
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_no_round() {
        let mut controller = controller_with_balance("alice", 2_000);
        let err = controller
            .start_round("alice", 5_000, Mode::Real, 0)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::InsufficientFunds);

        // No debit, no round, no history.
        assert_eq!(controller.ledger().balance("alice").await.unwrap(), 2_000);
        assert!(controller.active_round_ids().is_empty());
        assert!(controller.history().is_empty());
    }

    #[tokio::test]
    async fn test_crash_below_one_forfeits_stake() {
        // Ends at 0.9x: crashed out, binary settlement pays nothing.
        let mut controller = controller_with_balance("alice", 10_000);
        let round_id = controller
            .start_round_with_zones(
                "alice",
                5_000,
                Mode::Real,
                fixed_zones(&[10, 10, 10, 10, 10, 9]),
                0,
            )
            .await
            .unwrap();

        tick_to_terminal(&mut controller, round_id);
        let round = controller.round(round_id).unwrap();
        assert_eq!(round.status, RoundStatus::CrashedOut);
        assert_eq!(round.cumulative_bps, 9_000);

        let result = controller.settle(round_id, 7_000).await.unwrap();
        assert_eq!(result.payout_cents, 0);
        assert_eq!(result.new_balance_cents, 5_000);
        assert!(controller.ledger().settlement(round_id).is_some());
    }

    #[tokio::test]
    async fn test_crash_above_one_still_pays() {
        // "Crashed" names end-of-path; a 1.2x finish is still a win.
        let mut controller = controller_with_balance("alice", 10_000);
        let round_id = controller
            .start_round_with_zones(
                "alice",
                1_000,
                Mode::Real,
                fixed_zones(&[12, 10, 10, 10, 10, 10]),
                0,
            )
            .await
            .unwrap();
        tick_to_terminal(&mut controller, round_id);

        let result = controller.settle(round_id, 7_000).await.unwrap();
        assert_eq!(result.outcome, RoundStatus::CrashedOut);
        assert_eq!(result.payout_cents, 1_200);
    }

    #[tokio::test]
    async fn test_settle_twice_is_benign_and_single_effect() {
        let mut controller = controller_with_balance("alice", 10_000);
        let round_id = controller
            .start_round_with_zones(
                "alice",
                1_000,
                Mode::Real,
                fixed_zones(&[15, 8, 20, 10, 30, 6]),
                0,
            )
            .await
            .unwrap();
        tick_until_hit(&mut controller, round_id, 2);
        controller.cash_out(round_id).unwrap();

        controller.settle(round_id, 1_000).await.unwrap();
        let err = controller.settle(round_id, 1_001).await.unwrap_err();
        assert_eq!(err, SessionError::AlreadySettled);

        // Exactly one ledger credit and one history entry.
        assert_eq!(controller.ledger().balance("alice").await.unwrap(), 11_400);
        assert_eq!(controller.history().len(), 1);
        let entry = &controller.history().entries()[0];
        assert_eq!(entry.round_id, round_id);
        assert_eq!(entry.payout_cents, 2_400);
        assert_eq!(entry.cashout_bps, 24_000);
        assert!(entry.is_win());
    }

    #[tokio::test]
    async fn test_settle_requires_terminal_state() {
        let mut controller = controller_with_balance("alice", 10_000);
        let round_id = controller
            .start_round("alice", 1_000, Mode::Real, 0)
            .await
            .unwrap();
        assert_eq!(
            controller.settle(round_id, 0).await.unwrap_err(),
            SessionError::NotTerminal
        );
    }

    #[tokio::test]
    async fn test_cash_out_race_after_crash_rejected() {
        let mut controller = controller_with_balance("alice", 10_000);
        let round_id = controller
            .start_round_with_zones(
                "alice",
                1_000,
                Mode::Real,
                fixed_zones(&[15, 8, 20, 10, 30, 6]),
                0,
            )
            .await
            .unwrap();
        tick_to_terminal(&mut controller, round_id);
        let frozen = controller.round(round_id).unwrap().cumulative_bps;

        assert_eq!(
            controller.cash_out(round_id).unwrap_err(),
            SessionError::NotActive
        );
        assert_eq!(controller.round(round_id).unwrap().cumulative_bps, frozen);
    }

    #[tokio::test]
    async fn test_ticks_after_terminal_are_noops() {
        let mut controller = controller_with_balance("alice", 10_000);
        let round_id = controller
            .start_round_with_zones(
                "alice",
                1_000,
                Mode::Real,
                fixed_zones(&[15, 8, 20, 10, 30, 6]),
                0,
            )
            .await
            .unwrap();
        tick_until_hit(&mut controller, round_id, 1);
        controller.cash_out(round_id).unwrap();
        let frozen = controller.round(round_id).unwrap().cumulative_bps;

        // A timer that lost the cancellation race keeps firing harmlessly.
        for now_ms in 0..10 {
            controller.tick_round(round_id, now_ms).unwrap();
        }
        assert_eq!(controller.round(round_id).unwrap().cumulative_bps, frozen);
        assert_eq!(
            controller.round(round_id).unwrap().status,
            RoundStatus::CashedOut
        );
    }

    #[tokio::test]
    async fn test_transient_credit_failure_retries_with_same_round_id() {
        let ledger = FlakyLedger::new(HouseLedger::new().with_account("alice", 10_000), 1);
        let mut controller = BetSessionController::new(
            ledger,
            InMemoryHistory::new(),
            GeneratorConfig::default(),
            42,
        )
        .unwrap();
        let round_id = controller
            .start_round_with_zones(
                "alice",
                1_000,
                Mode::Real,
                fixed_zones(&[15, 8, 20, 10, 30, 6]),
                0,
            )
            .await
            .unwrap();
        tick_until_hit(&mut controller, round_id, 2);
        controller.cash_out(round_id).unwrap();

        // First attempt hits the outage; the round stays terminal-unsettled.
        let err = controller.settle(round_id, 1_000).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Ledger(LedgerError::Unavailable(_))
        ));
        assert_eq!(controller.unsettled_round_ids(), vec![round_id]);
        assert_eq!(controller.history().len(), 0);

        // Retry with the same round id lands exactly once.
        let result = controller.settle(round_id, 1_100).await.unwrap();
        assert_eq!(result.payout_cents, 2_400);
        assert_eq!(controller.ledger().credit_attempts, 2);
        assert_eq!(
            controller.ledger().inner().balance("alice").await.unwrap(),
            11_400
        );
        assert_eq!(controller.history().len(), 1);
        assert!(controller.unsettled_round_ids().is_empty());
    }

    #[tokio::test]
    async fn test_practice_and_real_balances_are_isolated() {
        let mut controller = controller_with_balance("alice", 10_000);
        let round_id = controller
            .start_round_with_zones(
                "alice",
                1_000,
                Mode::Practice,
                fixed_zones(&[15, 8, 20, 10, 30, 6]),
                0,
            )
            .await
            .unwrap();

        // The real ledger never saw the practice debit.
        assert_eq!(controller.ledger().balance("alice").await.unwrap(), 10_000);
        assert_eq!(
            controller.practice_ledger().balance("alice").await.unwrap(),
            INITIAL_PRACTICE_CENTS - 1_000
        );

        tick_until_hit(&mut controller, round_id, 2);
        controller.cash_out(round_id).unwrap();
        let result = controller.settle(round_id, 1_000).await.unwrap();
        assert_eq!(result.payout_cents, 2_400);

        assert_eq!(controller.ledger().balance("alice").await.unwrap(), 10_000);
        assert_eq!(
            controller.practice_ledger().balance("alice").await.unwrap(),
            INITIAL_PRACTICE_CENTS - 1_000 + 2_400
        );
        // Practice rounds still land in history.
        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.history().entries()[0].mode, Mode::Practice);
    }

    #[tokio::test]
    async fn test_suspended_account_cannot_start() {
        let mut controller = controller_with_balance("alice", 10_000);
        controller
            .ledger_mut()
            .set_status("alice", true)
            .await
            .unwrap();
        let err = controller
            .start_round("alice", 1_000, Mode::Real, 0)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::AccountSuspended);
        assert!(controller.active_round_ids().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_stakes_rejected_before_any_mutation() {
        let mut controller = controller_with_balance("alice", 10_000);
        assert!(matches!(
            controller
                .start_round("alice", 0, Mode::Real, 0)
                .await
                .unwrap_err(),
            SessionError::InvalidStake(_)
        ));
        assert!(matches!(
            controller
                .start_round("alice", MAX_STAKE_CENTS + 1, Mode::Real, 0)
                .await
                .unwrap_err(),
            SessionError::InvalidStake(_)
        ));
        assert_eq!(controller.ledger().balance("alice").await.unwrap(), 10_000);
    }

    #[tokio::test]
    async fn test_generated_round_starts_active_with_six_zones() {
        let mut controller = controller_with_balance("alice", 10_000);
        let round_id = controller
            .start_round("alice", 1_000, Mode::Real, 0)
            .await
            .unwrap();
        let round = controller.round(round_id).unwrap();
        assert_eq!(round.status, RoundStatus::Active);
        round.validate_invariants().expect("valid generated round");
        assert_eq!(round.cumulative_bps, ONE_X_BPS);
        assert_eq!(controller.active_round_ids(), vec![round_id]);
    }

    #[tokio::test]
    async fn test_stalled_round_is_force_crashed_and_settleable() {
        let mut controller = controller_with_balance("alice", 10_000);
        let round_id = controller
            .start_round_with_zones(
                "alice",
                1_000,
                Mode::Real,
                fixed_zones(&[15, 8, 20, 10, 30, 6]),
                0,
            )
            .await
            .unwrap();
        tick_until_hit(&mut controller, round_id, 0);

        // Healthy rounds survive the sweep.
        assert!(controller.reap_stalled(5_000, 30_000).is_empty());

        // A round whose timer disappeared is forced terminal after the
        // window and settles under crash semantics (1.5x here, so it pays).
        let reaped = controller.reap_stalled(60_000, 30_000);
        assert_eq!(reaped, vec![round_id]);
        assert_eq!(
            controller.round(round_id).unwrap().status,
            RoundStatus::CrashedOut
        );

        let result = controller.settle(round_id, 60_000).await.unwrap();
        assert_eq!(result.outcome, RoundStatus::CrashedOut);
        assert_eq!(result.payout_cents, 1_500);
        assert!(controller.ledger().settlement(round_id).is_some());
    }

    #[tokio::test]
    async fn test_release_drops_only_settled_rounds() {
        let mut controller = controller_with_balance("alice", 10_000);
        let round_id = controller
            .start_round_with_zones(
                "alice",
                1_000,
                Mode::Real,
                fixed_zones(&[15, 8, 20, 10, 30, 6]),
                0,
            )
            .await
            .unwrap();

        // Active rounds are not releasable.
        controller.release(round_id);
        assert!(controller.round(round_id).is_some());

        tick_to_terminal(&mut controller, round_id);
        controller.settle(round_id, 8_000).await.unwrap();
        controller.release(round_id);
        assert!(controller.round(round_id).is_none());
        assert_eq!(
            controller.snapshot(round_id).unwrap_err(),
            SessionError::RoundNotFound(round_id)
        );
    }

    #[tokio::test]
    async fn test_sequential_rounds_get_distinct_ids() {
        let mut controller = controller_with_balance("alice", 100_000);
        let first = controller
            .start_round("alice", 1_000, Mode::Real, 0)
            .await
            .unwrap();
        let second = controller
            .start_round("alice", 1_000, Mode::Real, 0)
            .await
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(controller.active_round_ids(), vec![first, second]);
    }
}
