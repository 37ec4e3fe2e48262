//! Error types for experiment construction and scheduling.
//!
//! Callers need to tell three situations apart: a malformed configuration
//! (fixable before activation), a pre-registration lock violation (a
//! scientific-integrity rejection, not a validation bug), and a uniform
//! "not found" that deliberately does not reveal whether an experiment
//! exists under another user.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExperimentError {
    /// The experiment does not exist for this user. Ownership failures are
    /// reported identically so existence never leaks across users.
    #[error("experiment not found")]
    NotFound,

    /// The hypothesis was locked at activation and the write would change it.
    #[error("hypothesis is locked by pre-registration and cannot be changed")]
    HypothesisLocked,

    /// Block size must be a positive multiple of the condition count.
    #[error("block size {block_size} is not a multiple of the {conditions} conditions")]
    BlockSizeMismatch { block_size: u32, conditions: usize },

    /// Between 2 and 8 named conditions are required.
    #[error("{0} conditions given; an experiment needs between 2 and 8")]
    ConditionCount(usize),

    /// End date must fall after the start date.
    #[error("end date must be after start date")]
    DateOrder,

    /// Trials shorter than a week cannot produce a balanced comparison.
    #[error("trial runs {days} days; the minimum is 7")]
    TooShort { days: i64 },

    /// Independent and dependent habit must differ.
    #[error("independent and dependent habit are the same")]
    SelfComparison,

    /// Lifecycle transition not allowed from the current state.
    #[error("cannot activate an experiment in the {from} state")]
    InvalidTransition { from: crate::experiment::ExperimentStatus },
}
