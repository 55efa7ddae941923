use thiserror::Error as ThisError;

/// Errors returned by a balance ledger.
///
/// The ledger is the single atomic owner of user balances: a debit either
/// applies in full or rejects with one of these, and settlement credits are
/// idempotent per round id.
#[derive(Debug, Clone, ThisError, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds (requested {requested_cents}, available {available_cents})")]
    InsufficientFunds {
        requested_cents: u64,
        available_cents: u64,
    },
    #[error("account is suspended")]
    AccountSuspended,
    #[error("no account for user")]
    UnknownAccount,
    #[error("no debit recorded for round {0}")]
    UnknownRound(u64),
    /// Transient infrastructure failure. Safe to retry: debits that failed
    /// never applied, and settlement retries reuse the same round id.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by the history store.
#[derive(Debug, Clone, ThisError, PartialEq, Eq)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}
