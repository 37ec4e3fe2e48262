//! Global correlation scan: mine a user's history for cross-variable
//! associations.
//!
//! All of the user's habit entries are pivoted into a per-calendar-date map
//! of sub-variable values; every unordered pair of sub-variables that
//! co-occurs on enough dates is tested (Spearman when either side is
//! ordinal, Pearson otherwise). Because k variables mean k·(k−1)/2
//! simultaneous hypotheses, the significance threshold is Bonferroni
//! corrected before anything is reported. The strongest survivors become
//! the user's "insights", cached per user with a 1-hour TTL.
//!
//! Two read paths: `insights_blocking` computes synchronously on a cache
//! miss; `insights_for_dashboard` returns a loading placeholder immediately
//! and refreshes the cache from a detached thread. Two concurrent refreshes
//! can both run and both write — last write wins, which the TTL makes
//! acceptable.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::insight;
use crate::model::Subvariable;
use crate::stats::{self, Correlation};
use crate::store::{EntryStore, InsightsCache};

/// Entries required system-wide before any scan runs.
pub const MIN_TOTAL_ENTRIES: usize = 14;

/// Shared dates required before a pair is tested.
pub const MIN_SHARED_DATES: usize = 14;

/// Uncorrected significance threshold.
pub const BASE_ALPHA: f64 = 0.05;

/// Coefficient floor: weaker associations are noise at N-of-1 scale.
pub const MIN_ABS_COEFFICIENT: f64 = 0.3;

/// How many results a report carries.
pub const TOP_K: usize = 10;

/// Cache lifetime for a computed report.
pub fn cache_ttl() -> Duration {
    Duration::hours(1)
}

/// One side of a reported pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableRef {
    pub id: String,
    pub name: String,
    pub habit: String,
}

impl VariableRef {
    fn from_subvariable(sv: &Subvariable) -> Self {
        Self {
            id: sv.id.clone(),
            name: sv.name.clone(),
            habit: sv.habit_name.clone(),
        }
    }

    /// Label used in interpretation text.
    fn label(&self) -> String {
        format!("{}: {}", self.habit, self.name)
    }
}

/// One surviving correlation with its interpretation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationInsight {
    pub variable1: VariableRef,
    pub variable2: VariableRef,
    pub coefficient: f64,
    pub p_value: f64,
    pub n: usize,
    pub text: String,
}

/// The deliverable: the user's top correlations, strongest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightReport {
    pub correlations: Vec<CorrelationInsight>,
}

/// Dashboard read outcome: fresh data, or a placeholder while a detached
/// refresh fills the cache.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum DashboardInsights {
    Ready(InsightReport),
    Loading,
}

/// A pair selected for testing, with its date-aligned value vectors.
struct PairCandidate {
    a: Subvariable,
    b: Subvariable,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

/// The scan orchestrator. Cheap to clone; clones share the same stores.
#[derive(Clone)]
pub struct ScanEngine {
    entries: Arc<dyn EntryStore>,
    cache: Arc<dyn InsightsCache>,
}

impl ScanEngine {
    pub fn new(entries: Arc<dyn EntryStore>, cache: Arc<dyn InsightsCache>) -> Self {
        Self { entries, cache }
    }

    /// Cached report if fresh, otherwise compute synchronously, write the
    /// cache, and return the fresh report.
    pub fn insights_blocking(&self, user_id: &str) -> InsightReport {
        if let Some(cached) = self.cache.get(user_id) {
            if !cached.is_expired(Utc::now()) {
                return cached.data;
            }
        }
        let report = self.compute(user_id);
        self.cache.put(user_id, report.clone(), cache_ttl());
        report
    }

    /// Dashboard path: never blocks. A stale or absent cache triggers a
    /// detached recomputation; the caller gets `Loading` and a later read
    /// will find the refreshed cache. Failures in the detached thread are
    /// logged and swallowed — the cache simply stays stale until the next
    /// successful refresh.
    pub fn insights_for_dashboard(&self, user_id: &str) -> DashboardInsights {
        if let Some(cached) = self.cache.get(user_id) {
            if !cached.is_expired(Utc::now()) {
                return DashboardInsights::Ready(cached.data);
            }
        }

        let engine = self.clone();
        let user = user_id.to_string();
        std::thread::spawn(move || {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let report = engine.compute(&user);
                engine.cache.put(&user, report, cache_ttl());
            }));
            if outcome.is_err() {
                warn!("background insight refresh failed for user {user}");
            }
        });

        DashboardInsights::Loading
    }

    /// Run the full scan for a user. Pure read of the entry store; does not
    /// touch the cache.
    pub fn compute(&self, user_id: &str) -> InsightReport {
        let entries = self.entries.entries_for_user(user_id);
        if entries.len() < MIN_TOTAL_ENTRIES {
            debug!(
                "scan skipped for {user_id}: {} entries, need {MIN_TOTAL_ENTRIES}",
                entries.len()
            );
            return InsightReport::default();
        }

        let catalog: HashMap<String, Subvariable> = self
            .entries
            .subvariables_for_user(user_id)
            .into_iter()
            .map(|sv| (sv.id.clone(), sv))
            .collect();

        // Pivot: date → (subvariable → value). BTreeMaps keep the walk
        // order deterministic.
        let mut by_date: BTreeMap<NaiveDate, BTreeMap<String, f64>> = BTreeMap::new();
        for entry in &entries {
            let day = by_date.entry(entry.logical_date).or_default();
            for obs in &entry.subvariable_entries {
                day.insert(obs.subvariable_id.clone(), obs.numeric_value);
            }
        }

        let candidates = pair_candidates(&by_date, &catalog);
        let tested = evaluate_pairs(candidates);

        // Bonferroni: every tested pair is a simultaneous hypothesis.
        let adjusted_alpha = if tested.is_empty() {
            BASE_ALPHA
        } else {
            BASE_ALPHA / tested.len() as f64
        };
        debug!(
            "scan for {user_id}: {} pairs tested, alpha={adjusted_alpha:.5}",
            tested.len()
        );

        let mut kept: Vec<CorrelationInsight> = tested
            .into_iter()
            .filter(|(_, _, c)| c.p_value < adjusted_alpha && c.coefficient.abs() > MIN_ABS_COEFFICIENT)
            .map(|(a, b, c)| {
                let v1 = VariableRef::from_subvariable(&a);
                let v2 = VariableRef::from_subvariable(&b);
                let text = insight::describe(&v1.label(), &v2.label(), &c);
                CorrelationInsight {
                    variable1: v1,
                    variable2: v2,
                    coefficient: c.coefficient,
                    p_value: c.p_value,
                    n: c.n,
                    text,
                }
            })
            .collect();

        kept.sort_by(|a, b| {
            b.coefficient
                .abs()
                .partial_cmp(&a.coefficient.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.variable1.id.cmp(&b.variable1.id))
        });
        kept.truncate(TOP_K);

        InsightReport { correlations: kept }
    }
}

/// Collect every unordered sub-variable pair with at least
/// [`MIN_SHARED_DATES`] co-occurring dates, with values aligned by date.
fn pair_candidates(
    by_date: &BTreeMap<NaiveDate, BTreeMap<String, f64>>,
    catalog: &HashMap<String, Subvariable>,
) -> Vec<PairCandidate> {
    // Only variables the catalog knows can be labeled in a report.
    let mut ids: Vec<&String> = catalog.keys().collect();
    ids.sort();

    let mut candidates = Vec::new();
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let (id_a, id_b) = (ids[i], ids[j]);
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for day in by_date.values() {
                if let (Some(&x), Some(&y)) = (day.get(id_a), day.get(id_b)) {
                    xs.push(x);
                    ys.push(y);
                }
            }
            if xs.len() < MIN_SHARED_DATES {
                continue;
            }
            candidates.push(PairCandidate {
                a: catalog[id_a].clone(),
                b: catalog[id_b].clone(),
                xs,
                ys,
            });
        }
    }
    candidates
}

/// Evaluate candidates across worker threads. With k tracked variables the
/// pair count grows as k², so the work is fanned out over the available
/// cores; each pair is independent CPU work with no shared state.
fn evaluate_pairs(candidates: Vec<PairCandidate>) -> Vec<(Subvariable, Subvariable, Correlation)> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let n_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(candidates.len());
    let chunk_size = candidates.len().div_ceil(n_threads);

    let results: Mutex<Vec<(Subvariable, Subvariable, Correlation)>> = Mutex::new(Vec::new());
    std::thread::scope(|s| {
        let results = &results;
        for chunk in candidates.chunks(chunk_size) {
            s.spawn(move || {
                let mut local = Vec::new();
                for cand in chunk {
                    let corr = if cand.a.kind.is_ordinal() || cand.b.kind.is_ordinal() {
                        stats::spearman(&cand.xs, &cand.ys)
                    } else {
                        stats::pearson(&cand.xs, &cand.ys)
                    };
                    if let Some(corr) = corr {
                        local.push((cand.a.clone(), cand.b.clone(), corr));
                    }
                }
                results.lock().unwrap().extend(local);
            });
        }
    });
    results.into_inner().unwrap()
}
