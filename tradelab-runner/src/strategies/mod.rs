//! Built-in reference strategies.
//!
//! These exist so sweeps, walk-forward runs, and tests have real signal
//! sources to drive; production strategies plug into the same
//! [`crate::strategy::Strategy`] trait from outside.

mod sequential_reversal;
mod sigma_extreme;

pub use sequential_reversal::SequentialReversal;
pub use sigma_extreme::SigmaExtreme;
