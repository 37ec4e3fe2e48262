//! Block-randomized condition assignment.
//!
//! For an ACTIVE experiment the scheduler answers "which condition is in
//! effect today, and is today a washout day?". Dates are partitioned into
//! consecutive blocks of `block_size` days; within each block every
//! condition appears exactly `block_size / k` times, in an order drawn from
//! an RNG seeded by SHA-256(experiment id ‖ block index). The seed makes a
//! block's ordering a pure function of the experiment, so a partially
//! persisted block can always be continued consistently.
//!
//! Generation is lazy: the first read of a date walks from the experiment's
//! start, persisting each day through [`AssignmentStore::insert_if_absent`].
//! Persisted rows are immutable and always win over recomputation —
//! parameter edits only influence dates that have never been generated.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::ExperimentError;
use crate::experiment::{Experiment, ExperimentStatus};
use crate::store::{Assignment, AssignmentStore, EntryStore, ExperimentStore};

/// Maximum days a client-reported "today" may differ from the server's
/// before it is ignored (clock-skew tolerance, spoofing guard).
pub const CLIENT_DATE_TOLERANCE_DAYS: i64 = 2;

/// What the scheduler knows about "today" for one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayAssignment {
    pub date: NaiveDate,
    pub condition: String,
    pub is_washout: bool,
    /// Whether the independent habit already has an entry on this date.
    pub logged_today: bool,
    /// Echoed from the experiment so delivery layers know to withhold the
    /// condition label from the subject.
    pub is_blind: bool,
}

/// Result of a "today" query. A non-ACTIVE experiment (or a date outside the
/// trial window) is a defined outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum TodayView {
    NoActiveExperiment,
    Assigned(TodayAssignment),
}

/// The condition/day generator.
pub struct Scheduler {
    experiments: Arc<dyn ExperimentStore>,
    assignments: Arc<dyn AssignmentStore>,
    entries: Arc<dyn EntryStore>,
}

impl Scheduler {
    pub fn new(
        experiments: Arc<dyn ExperimentStore>,
        assignments: Arc<dyn AssignmentStore>,
        entries: Arc<dyn EntryStore>,
    ) -> Self {
        Self {
            experiments,
            assignments,
            entries,
        }
    }

    /// Today's assignment for the user's experiment, using the server clock.
    ///
    /// `client_date` is honored only within ±2 days of the server date.
    /// An experiment owned by someone else is indistinguishable from a
    /// missing one ([`ExperimentError::NotFound`]).
    pub fn today(
        &self,
        user_id: &str,
        experiment_id: &str,
        client_date: Option<NaiveDate>,
    ) -> Result<TodayView, ExperimentError> {
        self.today_on(Utc::now().date_naive(), user_id, experiment_id, client_date)
    }

    /// Same as [`Scheduler::today`] with an explicit server date.
    pub fn today_on(
        &self,
        server_date: NaiveDate,
        user_id: &str,
        experiment_id: &str,
        client_date: Option<NaiveDate>,
    ) -> Result<TodayView, ExperimentError> {
        let experiment = self
            .experiments
            .find(user_id, experiment_id)
            .ok_or(ExperimentError::NotFound)?;

        if experiment.status != ExperimentStatus::Active {
            return Ok(TodayView::NoActiveExperiment);
        }

        let date = resolve_client_date(server_date, client_date);
        if date < experiment.start_date || date > experiment.end_date {
            return Ok(TodayView::NoActiveExperiment);
        }

        let assignment = self.ensure_assignment(&experiment, date);
        let logged_today = self
            .entries
            .has_entry(user_id, &experiment.independent_id, date);

        Ok(TodayView::Assigned(TodayAssignment {
            date,
            condition: assignment.condition,
            is_washout: assignment.is_washout,
            logged_today,
            is_blind: experiment.is_blind,
        }))
    }

    /// Non-washout persisted days per condition label, restricted to dates
    /// where the independent habit was actually logged. Feeds the rigor
    /// evaluator's `n_a`/`n_b`.
    pub fn analyzable_day_counts(&self, experiment: &Experiment) -> HashMap<String, u32> {
        let mut counts: HashMap<String, u32> = experiment
            .condition_labels()
            .into_iter()
            .map(|l| (l.to_string(), 0))
            .collect();
        for a in self.assignments.all_for_experiment(&experiment.id) {
            if a.is_washout {
                continue;
            }
            if !self
                .entries
                .has_entry(&experiment.user_id, &experiment.independent_id, a.date)
            {
                continue;
            }
            *counts.entry(a.condition).or_insert(0) += 1;
        }
        counts
    }

    /// Walk from the experiment start through `target`, persisting any dates
    /// not yet generated, and return the row for `target`.
    ///
    /// Persisted rows are taken as-is; the washout chain is re-synchronized
    /// against whatever conditions are actually on record, so a parameter
    /// edit mid-trial never rewrites history.
    fn ensure_assignment(&self, experiment: &Experiment, target: NaiveDate) -> Assignment {
        if let Some(existing) = self.assignments.get(&experiment.id, target) {
            return existing;
        }
        debug!(
            "generating assignments for experiment {} through {target}",
            experiment.id
        );

        let mut prev_condition: Option<String> = None;
        let mut washout_left: u32 = 0;
        let mut result: Option<Assignment> = None;

        let total_days = (target - experiment.start_date).num_days();
        for day_index in 0..=total_days {
            let date = experiment.start_date + Duration::days(day_index);

            let row = match self.assignments.get(&experiment.id, date) {
                Some(existing) => existing,
                None => {
                    let condition = self.condition_for(experiment, day_index as u64);
                    if prev_condition.as_deref().is_some_and(|p| p != condition) {
                        washout_left = experiment.washout_period;
                    }
                    let is_washout = washout_left > 0;
                    self.assignments.insert_if_absent(Assignment {
                        experiment_id: experiment.id.clone(),
                        date,
                        condition,
                        is_washout,
                    })
                }
            };

            // Re-sync the chain from the persisted truth, whether the row
            // was just written or predates this walk.
            if prev_condition.as_deref().is_some_and(|p| p != row.condition) {
                washout_left = experiment.washout_period;
            }
            washout_left = washout_left.saturating_sub(1);
            prev_condition = Some(row.condition.clone());

            if date == target {
                result = Some(row);
            }
        }

        // The loop always reaches `target` (day_index == total_days).
        result.unwrap_or_else(|| unreachable!("walk covers the target date"))
    }

    /// Condition label for the 0-based day index, via the seeded block order.
    fn condition_for(&self, experiment: &Experiment, day_index: u64) -> String {
        let block_size = experiment.block_size as u64;
        let block_index = day_index / block_size;
        let position = (day_index % block_size) as usize;
        block_order(experiment, block_index)[position].clone()
    }
}

/// Balanced, seeded ordering for one block: each condition label appears
/// exactly `block_size / k` times, shuffled by an RNG seeded from
/// SHA-256(experiment id ‖ block index).
pub fn block_order(experiment: &Experiment, block_index: u64) -> Vec<String> {
    let labels = experiment.condition_labels();
    let per_condition = experiment.block_size as usize / labels.len();

    let mut order: Vec<String> = labels
        .iter()
        .flat_map(|&l| std::iter::repeat_n(l.to_string(), per_condition))
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(experiment.id.as_bytes());
    hasher.update(block_index.to_le_bytes());
    let seed: [u8; 32] = hasher.finalize().into();
    let mut rng = StdRng::from_seed(seed);
    order.shuffle(&mut rng);
    order
}

/// Resolve the effective "today": a client-reported date is honored only
/// within [`CLIENT_DATE_TOLERANCE_DAYS`] of the server's date.
pub fn resolve_client_date(server_date: NaiveDate, client_date: Option<NaiveDate>) -> NaiveDate {
    match client_date {
        Some(c) if (c - server_date).num_days().abs() <= CLIENT_DATE_TOLERANCE_DAYS => c,
        _ => server_date,
    }
}
