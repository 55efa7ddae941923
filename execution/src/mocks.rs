//! Test helpers: fixed-zone rounds and fault-injecting collaborators.

use skymultiplier_types::{LedgerError, Mode, Round, Zone, zone_position_tenths};

use crate::ledger::Ledger;

/// Zones at the standard positions with the given one-decimal multipliers
/// (tenths).
pub fn fixed_zones(multipliers_tenths: &[u32]) -> Vec<Zone> {
    multipliers_tenths
        .iter()
        .enumerate()
        .map(|(index, &multiplier)| Zone::new(zone_position_tenths(index), multiplier))
        .collect()
}

/// A pending round with fixed zones, ready to launch.
pub fn pending_round(
    round_id: u64,
    user: &str,
    mode: Mode,
    stake_cents: u64,
    multipliers_tenths: &[u32],
) -> Round {
    Round::new(
        round_id,
        user.to_string(),
        mode,
        stake_cents,
        fixed_zones(multipliers_tenths),
    )
}

/// Ledger wrapper that fails the next `failures` settlement credits with a
/// transient error before delegating. Debits always pass through, so a
/// terminal round can be left waiting on its credit.
#[derive(Debug)]
pub struct FlakyLedger<L> {
    inner: L,
    failures: u32,
    pub credit_attempts: u32,
}

impl<L> FlakyLedger<L> {
    pub fn new(inner: L, failures: u32) -> Self {
        Self {
            inner,
            failures,
            credit_attempts: 0,
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: Ledger> Ledger for FlakyLedger<L> {
    async fn balance(&self, user: &str) -> Result<u64, LedgerError> {
        self.inner.balance(user).await
    }

    async fn debit(
        &mut self,
        user: &str,
        amount_cents: u64,
        round_id: u64,
    ) -> Result<u64, LedgerError> {
        self.inner.debit(user, amount_cents, round_id).await
    }

    async fn credit_settlement(
        &mut self,
        round_id: u64,
        payout_cents: u64,
        crashed: bool,
    ) -> Result<u64, LedgerError> {
        self.credit_attempts += 1;
        if self.failures > 0 {
            self.failures -= 1;
            return Err(LedgerError::Unavailable("injected outage".to_string()));
        }
        self.inner
            .credit_settlement(round_id, payout_cents, crashed)
            .await
    }

    async fn adjust_balance(
        &mut self,
        user: &str,
        delta_cents: i64,
        reason: &str,
    ) -> Result<u64, LedgerError> {
        self.inner.adjust_balance(user, delta_cents, reason).await
    }

    async fn set_status(&mut self, user: &str, suspended: bool) -> Result<(), LedgerError> {
        self.inner.set_status(user, suspended).await
    }
}
