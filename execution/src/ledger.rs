//! Balance ledger contract and in-memory implementations.
//!
//! The ledger is the only durable shared resource in the system: it owns
//! user balances and processes every debit/credit as a single atomic
//! operation. The controller never caches a balance across the
//! debit→tick→credit span; it re-validates by delegating here at each
//! mutation point.

use std::collections::HashMap;

use skymultiplier_types::{LedgerError, INITIAL_PRACTICE_CENTS};
use tracing::debug;

/// Atomic owner of user balances.
///
/// Implementations may be a local map, an RPC client, or a database
/// transaction; the contract only requires atomicity and idempotent
/// settlement per round id.
pub trait Ledger {
    /// Current balance in cents.
    async fn balance(&self, user: &str) -> Result<u64, LedgerError>;

    /// Atomically remove `amount_cents`, tagged with the round it funds.
    /// Rejects without side effect when funds are short or the account is
    /// suspended.
    async fn debit(
        &mut self,
        user: &str,
        amount_cents: u64,
        round_id: u64,
    ) -> Result<u64, LedgerError>;

    /// Settle the round the earlier debit opened. Applied at most once per
    /// round id: retries observe the recorded settlement and return the
    /// current balance without mutating anything.
    async fn credit_settlement(
        &mut self,
        round_id: u64,
        payout_cents: u64,
        crashed: bool,
    ) -> Result<u64, LedgerError>;

    /// Administrative balance override, audit-logged. Outside the normal
    /// bet path; used by operator tooling only.
    async fn adjust_balance(
        &mut self,
        user: &str,
        delta_cents: i64,
        reason: &str,
    ) -> Result<u64, LedgerError>;

    /// Administrative account lock. A suspended account's debits fail.
    async fn set_status(&mut self, user: &str, suspended: bool) -> Result<(), LedgerError>;
}

#[derive(Clone, Debug, Default)]
struct Account {
    balance_cents: u64,
    suspended: bool,
}

/// Debit recorded against a round, so settlement can find its account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebitRecord {
    pub user: String,
    pub amount_cents: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettlementRecord {
    pub payout_cents: u64,
    pub crashed: bool,
}

/// Administrative adjustment entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub user: String,
    pub delta_cents: i64,
    pub reason: String,
    pub balance_after: u64,
}

/// In-memory reference ledger for real-stakes balances.
///
/// Single-owner map semantics give the atomicity the contract requires:
/// each call completes its read-modify-write before the next call observes
/// anything.
#[derive(Debug, Default)]
pub struct HouseLedger {
    accounts: HashMap<String, Account>,
    debits: HashMap<u64, DebitRecord>,
    settlements: HashMap<u64, SettlementRecord>,
    audit_log: Vec<AuditEntry>,
}

impl HouseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by tests and the service bootstrap.
    pub fn with_account(mut self, user: &str, balance_cents: u64) -> Self {
        self.open_account(user, balance_cents);
        self
    }

    pub fn open_account(&mut self, user: &str, balance_cents: u64) {
        self.accounts.insert(
            user.to_string(),
            Account {
                balance_cents,
                suspended: false,
            },
        );
    }

    pub fn debit_record(&self, round_id: u64) -> Option<&DebitRecord> {
        self.debits.get(&round_id)
    }

    pub fn settlement(&self, round_id: u64) -> Option<&SettlementRecord> {
        self.settlements.get(&round_id)
    }

    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit_log
    }

    fn account_mut(&mut self, user: &str) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(user)
            .ok_or(LedgerError::UnknownAccount)
    }
}

impl Ledger for HouseLedger {
    async fn balance(&self, user: &str) -> Result<u64, LedgerError> {
        self.accounts
            .get(user)
            .map(|account| account.balance_cents)
            .ok_or(LedgerError::UnknownAccount)
    }

    async fn debit(
        &mut self,
        user: &str,
        amount_cents: u64,
        round_id: u64,
    ) -> Result<u64, LedgerError> {
        let account = self.account_mut(user)?;
        if account.suspended {
            return Err(LedgerError::AccountSuspended);
        }
        if amount_cents > account.balance_cents {
            return Err(LedgerError::InsufficientFunds {
                requested_cents: amount_cents,
                available_cents: account.balance_cents,
            });
        }
        account.balance_cents -= amount_cents;
        let new_balance = account.balance_cents;
        self.debits.insert(
            round_id,
            DebitRecord {
                user: user.to_string(),
                amount_cents,
            },
        );
        debug!(user, amount_cents, round_id, new_balance, "debit applied");
        Ok(new_balance)
    }

    async fn credit_settlement(
        &mut self,
        round_id: u64,
        payout_cents: u64,
        crashed: bool,
    ) -> Result<u64, LedgerError> {
        let user = self
            .debits
            .get(&round_id)
            .ok_or(LedgerError::UnknownRound(round_id))?
            .user
            .clone();

        // Idempotent repeat: the settlement already applied, report the
        // current balance and mutate nothing.
        if self.settlements.contains_key(&round_id) {
            return self.balance(&user).await;
        }

        let account = self.account_mut(&user)?;
        account.balance_cents = account.balance_cents.saturating_add(payout_cents);
        let new_balance = account.balance_cents;
        self.settlements.insert(
            round_id,
            SettlementRecord {
                payout_cents,
                crashed,
            },
        );
        debug!(
            %user,
            round_id, payout_cents, crashed, new_balance, "settlement applied"
        );
        Ok(new_balance)
    }

    async fn adjust_balance(
        &mut self,
        user: &str,
        delta_cents: i64,
        reason: &str,
    ) -> Result<u64, LedgerError> {
        let account = self.account_mut(user)?;
        account.balance_cents = account.balance_cents.saturating_add_signed(delta_cents);
        let balance_after = account.balance_cents;
        self.audit_log.push(AuditEntry {
            user: user.to_string(),
            delta_cents,
            reason: reason.to_string(),
            balance_after,
        });
        debug!(user, delta_cents, reason, balance_after, "balance adjusted");
        Ok(balance_after)
    }

    async fn set_status(&mut self, user: &str, suspended: bool) -> Result<(), LedgerError> {
        self.account_mut(user)?.suspended = suspended;
        debug!(user, suspended, "account status changed");
        Ok(())
    }
}

/// Local practice-chip pool behind the same contract as the real ledger.
///
/// Accounts are provisioned on first touch with the starting practice
/// balance; practice chips never transfer to or from real balances, and
/// practice pools carry no administrative lock.
#[derive(Debug, Default)]
pub struct PracticeLedger {
    balances: HashMap<String, u64>,
    debits: HashMap<u64, DebitRecord>,
    settlements: HashMap<u64, SettlementRecord>,
}

impl PracticeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn balance_entry(&mut self, user: &str) -> &mut u64 {
        self.balances
            .entry(user.to_string())
            .or_insert(INITIAL_PRACTICE_CENTS)
    }
}

impl Ledger for PracticeLedger {
    async fn balance(&self, user: &str) -> Result<u64, LedgerError> {
        Ok(self
            .balances
            .get(user)
            .copied()
            .unwrap_or(INITIAL_PRACTICE_CENTS))
    }

    async fn debit(
        &mut self,
        user: &str,
        amount_cents: u64,
        round_id: u64,
    ) -> Result<u64, LedgerError> {
        let balance = self.balance_entry(user);
        if amount_cents > *balance {
            return Err(LedgerError::InsufficientFunds {
                requested_cents: amount_cents,
                available_cents: *balance,
            });
        }
        *balance -= amount_cents;
        let new_balance = *balance;
        self.debits.insert(
            round_id,
            DebitRecord {
                user: user.to_string(),
                amount_cents,
            },
        );
        Ok(new_balance)
    }

    async fn credit_settlement(
        &mut self,
        round_id: u64,
        payout_cents: u64,
        crashed: bool,
    ) -> Result<u64, LedgerError> {
        let user = self
            .debits
            .get(&round_id)
            .ok_or(LedgerError::UnknownRound(round_id))?
            .user
            .clone();
        if self.settlements.contains_key(&round_id) {
            return self.balance(&user).await;
        }
        let balance = self.balance_entry(&user);
        *balance = balance.saturating_add(payout_cents);
        let new_balance = *balance;
        self.settlements.insert(
            round_id,
            SettlementRecord {
                payout_cents,
                crashed,
            },
        );
        Ok(new_balance)
    }

    async fn adjust_balance(
        &mut self,
        user: &str,
        delta_cents: i64,
        _reason: &str,
    ) -> Result<u64, LedgerError> {
        let balance = self.balance_entry(user);
        *balance = balance.saturating_add_signed(delta_cents);
        Ok(*balance)
    }

    async fn set_status(&mut self, _user: &str, _suspended: bool) -> Result<(), LedgerError> {
        // Practice pools have no account lock.
        Ok(())
    }
}
