//! Collaborator seams: the stores the engine reads from and writes to.
//!
//! The engine never talks to a database directly — it sees four narrow,
//! object-safe traits (`ExperimentStore`, `EntryStore`, `AssignmentStore`,
//! `InsightsCache`) injected as `Arc<dyn …>`. Each trait ships with an
//! in-memory `Mutex<HashMap>` implementation suitable for tests and
//! single-process embedding; a relational backend implements the same
//! contracts.
//!
//! Scoping contract: every lookup takes a user id, and a record owned by a
//! different user is indistinguishable from an absent one.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::experiment::Experiment;
use crate::model::{HabitEntry, Subvariable, SubvariableEntry};
use crate::scan::InsightReport;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The condition in effect for one experiment on one calendar date.
///
/// Once persisted, an assignment is immutable: re-querying the same date
/// must return the identical condition and washout flag, whatever has
/// happened to the scheduler's parameters since.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub experiment_id: String,
    pub date: NaiveDate,
    pub condition: String,
    pub is_washout: bool,
}

/// A user's cached top-correlation report with its expiry bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedInsights {
    pub user_id: String,
    pub data: InsightReport,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedInsights {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Experiment lookup and persistence, scoped by owner.
pub trait ExperimentStore: Send + Sync {
    /// Find an experiment owned by `user_id`. Foreign or missing ids both
    /// yield `None`.
    fn find(&self, user_id: &str, experiment_id: &str) -> Option<Experiment>;

    /// Insert or replace an experiment record.
    fn upsert(&self, experiment: Experiment);
}

/// Habit-entry reads plus the sub-variable catalog.
pub trait EntryStore: Send + Sync {
    /// Every entry the user has ever logged, in no particular order.
    fn entries_for_user(&self, user_id: &str) -> Vec<HabitEntry>;

    /// The user's sub-variable catalog (with habit names denormalized).
    fn subvariables_for_user(&self, user_id: &str) -> Vec<Subvariable>;

    /// Whether any entry exists for the habit on the given date. Used by the
    /// scheduler's "logged today" read-contract.
    fn has_entry(&self, user_id: &str, habit_id: &str, date: NaiveDate) -> bool;

    /// Upsert a logging event: one entry per (habit, date); observations for
    /// the same sub-variable on the same date are last-write-wins.
    fn upsert_entry(&self, entry: HabitEntry);
}

/// Persisted condition assignments.
pub trait AssignmentStore: Send + Sync {
    fn get(&self, experiment_id: &str, date: NaiveDate) -> Option<Assignment>;

    /// All assignments for an experiment, sorted by date ascending.
    fn all_for_experiment(&self, experiment_id: &str) -> Vec<Assignment>;

    /// Insert unless a row for (experiment, date) already exists, and return
    /// the persisted row. This is the duplicate-insert guard: of two
    /// concurrent writers for a fresh date, one wins and both observe the
    /// winner.
    fn insert_if_absent(&self, assignment: Assignment) -> Assignment;
}

/// Time-boxed per-user insights cache.
pub trait InsightsCache: Send + Sync {
    fn get(&self, user_id: &str) -> Option<CachedInsights>;
    fn put(&self, user_id: &str, report: InsightReport, ttl: Duration);
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// In-memory [`ExperimentStore`].
#[derive(Default)]
pub struct InMemoryExperimentStore {
    // (user_id, experiment_id) → experiment
    records: Mutex<HashMap<(String, String), Experiment>>,
}

impl InMemoryExperimentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExperimentStore for InMemoryExperimentStore {
    fn find(&self, user_id: &str, experiment_id: &str) -> Option<Experiment> {
        self.records
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), experiment_id.to_string()))
            .cloned()
    }

    fn upsert(&self, experiment: Experiment) {
        self.records.lock().unwrap().insert(
            (experiment.user_id.clone(), experiment.id.clone()),
            experiment,
        );
    }
}

/// In-memory [`EntryStore`].
#[derive(Default)]
pub struct InMemoryEntryStore {
    // (user_id, habit_id, date) → entry
    entries: Mutex<HashMap<(String, String, NaiveDate), HabitEntry>>,
    // user_id → catalog
    subvariables: Mutex<HashMap<String, Vec<Subvariable>>>,
}

impl InMemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sub-variable in the user's catalog.
    pub fn add_subvariable(&self, user_id: &str, subvariable: Subvariable) {
        self.subvariables
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push(subvariable);
    }

    /// Convenience for tests and embedding: log `(subvariable_id, value)`
    /// observations for a habit on a date, minting the entry id.
    pub fn log(&self, user_id: &str, habit_id: &str, date: NaiveDate, values: &[(&str, f64)]) {
        self.upsert_entry(HabitEntry {
            id: Uuid::new_v4().to_string(),
            habit_id: habit_id.to_string(),
            user_id: user_id.to_string(),
            logical_date: date,
            timestamp: Utc::now(),
            note: None,
            subvariable_entries: values
                .iter()
                .map(|(id, v)| SubvariableEntry {
                    subvariable_id: id.to_string(),
                    numeric_value: *v,
                    raw_value: None,
                })
                .collect(),
        });
    }
}

impl EntryStore for InMemoryEntryStore {
    fn entries_for_user(&self, user_id: &str) -> Vec<HabitEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|((uid, _, _), _)| uid == user_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn subvariables_for_user(&self, user_id: &str) -> Vec<Subvariable> {
        self.subvariables
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    fn has_entry(&self, user_id: &str, habit_id: &str, date: NaiveDate) -> bool {
        self.entries.lock().unwrap().contains_key(&(
            user_id.to_string(),
            habit_id.to_string(),
            date,
        ))
    }

    fn upsert_entry(&self, entry: HabitEntry) {
        let key = (
            entry.user_id.clone(),
            entry.habit_id.clone(),
            entry.logical_date,
        );
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&key) {
            Some(existing) => {
                // Merge per sub-variable, last write wins.
                for new_obs in entry.subvariable_entries {
                    match existing
                        .subvariable_entries
                        .iter_mut()
                        .find(|o| o.subvariable_id == new_obs.subvariable_id)
                    {
                        Some(slot) => *slot = new_obs,
                        None => existing.subvariable_entries.push(new_obs),
                    }
                }
                existing.timestamp = entry.timestamp;
                if entry.note.is_some() {
                    existing.note = entry.note;
                }
            }
            None => {
                entries.insert(key, entry);
            }
        }
    }
}

/// In-memory [`AssignmentStore`].
#[derive(Default)]
pub struct InMemoryAssignmentStore {
    // (experiment_id, date) → assignment
    records: Mutex<HashMap<(String, NaiveDate), Assignment>>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssignmentStore for InMemoryAssignmentStore {
    fn get(&self, experiment_id: &str, date: NaiveDate) -> Option<Assignment> {
        self.records
            .lock()
            .unwrap()
            .get(&(experiment_id.to_string(), date))
            .cloned()
    }

    fn all_for_experiment(&self, experiment_id: &str) -> Vec<Assignment> {
        let mut out: Vec<Assignment> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|((eid, _), _)| eid == experiment_id)
            .map(|(_, a)| a.clone())
            .collect();
        out.sort_by_key(|a| a.date);
        out
    }

    fn insert_if_absent(&self, assignment: Assignment) -> Assignment {
        let key = (assignment.experiment_id.clone(), assignment.date);
        self.records
            .lock()
            .unwrap()
            .entry(key)
            .or_insert(assignment)
            .clone()
    }
}

/// In-memory [`InsightsCache`].
#[derive(Default)]
pub struct InMemoryInsightsCache {
    records: Mutex<HashMap<String, CachedInsights>>,
}

impl InMemoryInsightsCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InsightsCache for InMemoryInsightsCache {
    fn get(&self, user_id: &str) -> Option<CachedInsights> {
        self.records.lock().unwrap().get(user_id).cloned()
    }

    fn put(&self, user_id: &str, report: InsightReport, ttl: Duration) {
        let now = Utc::now();
        self.records.lock().unwrap().insert(
            user_id.to_string(),
            CachedInsights {
                user_id: user_id.to_string(),
                data: report,
                created_at: now,
                expires_at: now + ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubvariableKind;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_experiment_store_scoping() {
        let store = InMemoryExperimentStore::new();
        let mut e = crate::experiment::Experiment {
            id: "exp1".into(),
            user_id: "alice".into(),
            independent_id: "h1".into(),
            dependent_id: "h2".into(),
            name: "test".into(),
            hypothesis: None,
            hypothesis_locked_at: None,
            status: crate::experiment::ExperimentStatus::Planning,
            experiment_type: crate::experiment::ExperimentType::Randomized,
            is_blind: false,
            washout_period: 0,
            block_size: 4,
            conditions: vec![
                crate::experiment::Condition::new("a"),
                crate::experiment::Condition::new("b"),
            ],
            start_date: date(1),
            end_date: date(29),
        };
        store.upsert(e.clone());

        assert!(store.find("alice", "exp1").is_some());
        // Wrong user looks exactly like a missing record.
        assert!(store.find("mallory", "exp1").is_none());
        assert!(store.find("alice", "nope").is_none());

        e.name = "renamed".into();
        store.upsert(e);
        assert_eq!(store.find("alice", "exp1").unwrap().name, "renamed");
    }

    #[test]
    fn test_entry_upsert_last_write_wins() {
        let store = InMemoryEntryStore::new();
        store.log("u1", "h1", date(5), &[("sv1", 3.0), ("sv2", 1.0)]);
        store.log("u1", "h1", date(5), &[("sv1", 8.0)]);

        let entries = store.entries_for_user("u1");
        assert_eq!(entries.len(), 1);
        let obs = &entries[0].subvariable_entries;
        assert_eq!(obs.len(), 2);
        let sv1 = obs.iter().find(|o| o.subvariable_id == "sv1").unwrap();
        assert_eq!(sv1.numeric_value, 8.0);
        let sv2 = obs.iter().find(|o| o.subvariable_id == "sv2").unwrap();
        assert_eq!(sv2.numeric_value, 1.0);
    }

    #[test]
    fn test_has_entry() {
        let store = InMemoryEntryStore::new();
        store.log("u1", "h1", date(5), &[("sv1", 3.0)]);
        assert!(store.has_entry("u1", "h1", date(5)));
        assert!(!store.has_entry("u1", "h1", date(6)));
        assert!(!store.has_entry("u2", "h1", date(5)));
    }

    #[test]
    fn test_subvariable_catalog() {
        let store = InMemoryEntryStore::new();
        store.add_subvariable(
            "u1",
            Subvariable {
                id: "sv1".into(),
                habit_id: "h1".into(),
                habit_name: "Sleep".into(),
                name: "Quality".into(),
                kind: SubvariableKind::Scale0To10,
            },
        );
        assert_eq!(store.subvariables_for_user("u1").len(), 1);
        assert!(store.subvariables_for_user("u2").is_empty());
    }

    #[test]
    fn test_assignment_insert_if_absent_first_writer_wins() {
        let store = InMemoryAssignmentStore::new();
        let first = Assignment {
            experiment_id: "exp1".into(),
            date: date(3),
            condition: "a".into(),
            is_washout: false,
        };
        let second = Assignment {
            condition: "b".into(),
            ..first.clone()
        };

        assert_eq!(store.insert_if_absent(first.clone()), first);
        // Losing writer observes the existing row, unchanged.
        assert_eq!(store.insert_if_absent(second), first);
        assert_eq!(store.get("exp1", date(3)).unwrap().condition, "a");
    }

    #[test]
    fn test_assignments_sorted_by_date() {
        let store = InMemoryAssignmentStore::new();
        for d in [7, 3, 5] {
            store.insert_if_absent(Assignment {
                experiment_id: "exp1".into(),
                date: date(d),
                condition: "a".into(),
                is_washout: false,
            });
        }
        let all = store.all_for_experiment("exp1");
        let dates: Vec<NaiveDate> = all.iter().map(|a| a.date).collect();
        assert_eq!(dates, vec![date(3), date(5), date(7)]);
    }

    #[test]
    fn test_cache_expiry() {
        let cache = InMemoryInsightsCache::new();
        assert!(cache.get("u1").is_none());

        cache.put("u1", InsightReport::default(), Duration::hours(1));
        let cached = cache.get("u1").unwrap();
        assert!(!cached.is_expired(Utc::now()));
        assert!(cached.is_expired(Utc::now() + Duration::hours(2)));
    }
}
