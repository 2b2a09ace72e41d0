//! Matches locally recorded pool-creation transactions to live pools the
//! wallet still has a stake in.

pub mod engine;
mod scheduler;
mod strategy;

pub use engine::{
    fetch_live_pool, CandidateOutcome, PoolView, ReconcileReport, ReconciliationEngine,
};
pub use scheduler::{LatestReport, ReconcileScheduler, Trigger, TriggerHandle};
pub use strategy::ResolutionStrategy;
