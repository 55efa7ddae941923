//! Skymultiplier execution layer.
//!
//! This crate contains the deterministic bet-round engine: the round
//! generator, the flight state machine, and the bet session controller that
//! orchestrates one bet lifecycle against ledger/history collaborators.
//!
//! ## Determinism requirements
//! - Do not use wall-clock time inside execution; callers pass `now_ms`.
//! - Do not use ambient randomness; per-round streams are derived from the
//!   table seed and round id (see [`rng::round_rng`]).
//! - A round's outcome is a pure function of its zone list and tick count.
//!
//! The primary entrypoint is [`BetSessionController`].

pub mod flight;
pub mod generator;
pub mod history;
pub mod ledger;
pub mod rng;
pub mod session;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod house_edge_tests;

pub use flight::{FlightError, TickOutcome, ZoneHit};
pub use generator::{
    GenerationError, GeneratorConfig, JackpotPolicy, OddsTable, RoundGenerator, Tier,
};
pub use history::{HistoryStore, InMemoryHistory};
pub use ledger::{HouseLedger, Ledger, PracticeLedger};
pub use rng::round_rng;
pub use session::{BetSessionController, SessionError, SettlementResult};
