//! Round domain types.
//!
//! Defines the round/zone data model, snapshot projections, history records,
//! and the collaborator error contracts used by the execution layer and
//! services.

mod constants;
mod error;
mod history;
mod model;
mod snapshot;

pub use constants::*;
pub use error::*;
pub use history::*;
pub use model::*;
pub use snapshot::*;
