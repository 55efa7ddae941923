//! Common types for the skymultiplier bet round engine.
//!
//! The engine and services share this crate's data model; all game logic
//! lives in `skymultiplier-execution`.

pub mod round;

pub use round::*;
