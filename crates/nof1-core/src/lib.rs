//! # nof1-core
//!
//! **Your habit log is a dataset. Treat it like one.**
//!
//! `nof1-core` is the statistical engine behind an N-of-1 self-experimentation
//! platform: single-subject experiments where the same person is both the
//! treatment arm and the control, compared across alternating condition
//! blocks.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use nof1_core::{InMemoryEntryStore, InMemoryInsightsCache, ScanEngine};
//!
//! let entries = Arc::new(InMemoryEntryStore::new());
//! let cache = Arc::new(InMemoryInsightsCache::new());
//! let engine = ScanEngine::new(entries, cache);
//!
//! // Scan everything the user has ever logged for cross-variable
//! // correlations (Bonferroni-corrected, strongest first).
//! let report = engine.insights_blocking("user-1");
//! for insight in &report.correlations {
//!     println!("{}", insight.text);
//! }
//! ```
//!
//! ## Architecture
//!
//! Entries → Correlation (Pearson/Spearman + t-test p-values) → Insights
//!
//! Around that core:
//! - **Experiments**: a locked hypothesis, a lifecycle, and validated block
//!   randomization parameters.
//! - **Scheduler**: deterministic daily condition assignments with washout
//!   tracking; assignments are immutable once persisted.
//! - **Rigor score**: a 0–100 methodology grade over five axes, with one
//!   actionable tip per unmet axis.
//! - **Global scan**: every variable pair the user tracks, gated, corrected,
//!   and cached for an hour per user.
//!
//! Storage is behind traits ([`ExperimentStore`], [`EntryStore`],
//! [`AssignmentStore`], [`InsightsCache`]); the in-memory implementations
//! here back tests and single-process deployments.

pub mod error;
pub mod experiment;
pub mod insight;
pub mod model;
pub mod ratelimit;
pub mod rigor;
pub mod scan;
pub mod schedule;
pub mod stats;
pub mod store;

pub use error::ExperimentError;
pub use experiment::{Condition, Experiment, ExperimentStatus, ExperimentType};
pub use insight::{SMALL_SAMPLE_N, Strength, describe};
pub use model::{HabitEntry, Subvariable, SubvariableEntry, SubvariableKind};
pub use ratelimit::RateLimiter;
pub use rigor::{MIN_BALANCE_RATIO, MIN_SAMPLE_DAYS, RigorBreakdown, RigorInput, RigorScore};
pub use scan::{
    BASE_ALPHA, CorrelationInsight, DashboardInsights, InsightReport, MIN_ABS_COEFFICIENT,
    MIN_SHARED_DATES, MIN_TOTAL_ENTRIES, ScanEngine, TOP_K, VariableRef,
};
pub use schedule::{
    CLIENT_DATE_TOLERANCE_DAYS, Scheduler, TodayAssignment, TodayView, block_order,
    resolve_client_date,
};
pub use stats::{Correlation, CorrelationMethod, MIN_PAIRED_POINTS, pearson, spearman};
pub use store::{
    Assignment, AssignmentStore, CachedInsights, EntryStore, ExperimentStore,
    InMemoryAssignmentStore, InMemoryEntryStore, InMemoryExperimentStore, InMemoryInsightsCache,
    InsightsCache,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
