//! Statistical validation battery for the nof1 correlation engine.
//!
//! The core crate implements its own t-distribution p-values and rank
//! transforms so it carries no heavyweight numeric dependency. This crate
//! cross-checks those implementations against `statrs` and probes the
//! randomization machinery for bias. Each check returns a [`CheckResult`]
//! with a pass/fail determination and diagnostic details.

use rand::Rng;
use statrs::distribution::{ContinuousCDF, StudentsT};

use nof1_core::experiment::{Condition, Experiment, ExperimentStatus, ExperimentType};
use nof1_core::schedule::block_order;
use nof1_core::stats::{self, CorrelationMethod};

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a single validation check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Largest deviation observed, where the check measures one.
    pub max_error: f64,
    pub details: String,
}

impl CheckResult {
    fn pass(name: &str, max_error: f64, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            max_error,
            details,
        }
    }

    fn fail(name: &str, max_error: f64, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            max_error,
            details,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// 1. P-VALUE CROSS-CHECKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Reference two-tailed p-value via the statrs Student's t CDF.
fn reference_p(r: f64, n: usize) -> f64 {
    let df = (n - 2) as f64;
    let t = r.abs() * (df / (1.0 - r * r)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).unwrap();
    2.0 * (1.0 - dist.cdf(t))
}

/// Check 1: the engine's incomplete-beta p-values agree with statrs across a
/// grid of coefficients and sample sizes.
pub fn p_value_agreement() -> CheckResult {
    let name = "P-value vs statrs Student's t";
    let tolerance = 1e-8;

    let mut max_error: f64 = 0.0;
    let mut worst = String::new();
    for &n in &[4usize, 5, 8, 10, 14, 20, 30, 50, 100, 365] {
        for i in 0..=18 {
            let r = -0.9 + i as f64 * 0.1;
            if r.abs() >= 0.999 {
                continue;
            }
            let got = stats::p_value_from_r(r, n);
            let want = reference_p(r, n);
            let err = (got - want).abs();
            if err > max_error {
                max_error = err;
                worst = format!("r={r:.1}, n={n}: got {got:.12}, want {want:.12}");
            }
        }
    }

    if max_error <= tolerance {
        CheckResult::pass(name, max_error, format!("max |Δp| = {max_error:.2e}"))
    } else {
        CheckResult::fail(name, max_error, worst)
    }
}

/// Check 2: known textbook point — r = 0.632 at n = 10 sits at p ≈ 0.05.
pub fn p_value_critical_point() -> CheckResult {
    let name = "Critical value r=0.632, n=10";
    let p = stats::p_value_from_r(0.632, 10);
    let err = (p - 0.05).abs();
    if err < 0.002 {
        CheckResult::pass(name, err, format!("p = {p:.5}"))
    } else {
        CheckResult::fail(name, err, format!("p = {p:.5}, expected ≈ 0.05"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// 2. COEFFICIENT CROSS-CHECKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Check 3: Pearson on randomly generated linear data recovers the sign and
/// magnitude exactly (up to float noise).
pub fn pearson_linear_recovery() -> CheckResult {
    let name = "Pearson linear recovery";
    let mut rng = rand::rng();

    let mut max_error: f64 = 0.0;
    for trial in 0..50 {
        let n = 10 + trial % 40;
        let slope: f64 = if trial % 2 == 0 { 1.0 } else { -1.0 };
        let xs: Vec<f64> = (0..n).map(|_| rng.random_range(-100.0..100.0)).collect();
        let ys: Vec<f64> = xs.iter().map(|x| slope * x + 7.0).collect();
        match stats::pearson(&xs, &ys) {
            Some(c) => {
                let err = (c.coefficient - slope).abs();
                max_error = max_error.max(err);
            }
            None => {
                return CheckResult::fail(name, 1.0, format!("trial {trial}: degenerate input"));
            }
        }
    }

    if max_error < 1e-9 {
        CheckResult::pass(name, max_error, format!("max |r − slope| = {max_error:.2e}"))
    } else {
        CheckResult::fail(name, max_error, format!("max |r − slope| = {max_error:.2e}"))
    }
}

/// Check 4: Spearman is invariant under strictly monotone transforms of
/// either series, and reports itself as Spearman.
pub fn spearman_monotone_invariance() -> CheckResult {
    let name = "Spearman monotone invariance";
    let mut rng = rand::rng();

    let mut max_error: f64 = 0.0;
    for _ in 0..50 {
        let n = 20;
        let xs: Vec<f64> = (0..n).map(|_| rng.random_range(0.0..50.0)).collect();
        let ys: Vec<f64> = (0..n).map(|_| rng.random_range(0.0..50.0)).collect();

        let base = stats::spearman(&xs, &ys);
        let warped_x: Vec<f64> = xs.iter().map(|x| x.exp().min(1e300)).collect();
        let warped_y: Vec<f64> = ys.iter().map(|y| y.powi(3)).collect();
        let warped = stats::spearman(&warped_x, &warped_y);

        match (base, warped) {
            (Some(a), Some(b)) => {
                if a.method != CorrelationMethod::Spearman {
                    return CheckResult::fail(name, 1.0, "method tag not Spearman".into());
                }
                max_error = max_error.max((a.coefficient - b.coefficient).abs());
            }
            _ => {
                // Random draws collide with probability ~0; a rank tie only
                // changes both sides identically anyway.
                return CheckResult::fail(name, 1.0, "unexpected degenerate draw".into());
            }
        }
    }

    if max_error < 1e-9 {
        CheckResult::pass(name, max_error, format!("max |Δρ| = {max_error:.2e}"))
    } else {
        CheckResult::fail(name, max_error, format!("max |Δρ| = {max_error:.2e}"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// 3. RANDOMIZATION FAIRNESS
// ═══════════════════════════════════════════════════════════════════════════════

fn probe_experiment(id: &str) -> Experiment {
    Experiment {
        id: id.to_string(),
        user_id: "probe".into(),
        independent_id: "h1".into(),
        dependent_id: "h2".into(),
        name: "probe".into(),
        hypothesis: None,
        hypothesis_locked_at: None,
        status: ExperimentStatus::Planning,
        experiment_type: ExperimentType::Randomized,
        is_blind: false,
        washout_period: 0,
        block_size: 4,
        conditions: vec![Condition::new("a"), Condition::new("b")],
        start_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        end_date: chrono::NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
    }
}

/// Check 5: every generated block is exactly balanced.
pub fn block_balance() -> CheckResult {
    let name = "Block balance";
    for e in 0..20 {
        let experiment = probe_experiment(&format!("probe-{e}"));
        for block_index in 0..50 {
            let order = block_order(&experiment, block_index);
            let a = order.iter().filter(|c| *c == "a").count();
            if order.len() != 4 || a != 2 {
                return CheckResult::fail(
                    name,
                    1.0,
                    format!("experiment {e}, block {block_index}: {order:?}"),
                );
            }
        }
    }
    CheckResult::pass(name, 0.0, "20 experiments × 50 blocks, all 2+2".into())
}

/// Check 6: across many independent experiments, each condition lands in each
/// block position at close to uniform frequency. Guards against a biased
/// seed construction that would, say, always open a block with condition "a".
pub fn position_uniformity() -> CheckResult {
    let name = "Block position uniformity";
    let experiments = 2000;
    let positions = 4;

    let mut a_counts = [0u32; 4];
    for e in 0..experiments {
        let experiment = probe_experiment(&format!("uniformity-{e}"));
        let order = block_order(&experiment, 0);
        for (pos, label) in order.iter().enumerate() {
            if label == "a" {
                a_counts[pos] += 1;
            }
        }
    }

    // Each position holds "a" with probability 1/2; 2000 draws put the
    // standard deviation near 22, so ±3.5σ ≈ ±78 is a comfortable band.
    let expected = experiments as f64 / 2.0;
    let mut max_error: f64 = 0.0;
    for pos in 0..positions {
        max_error = max_error.max((a_counts[pos] as f64 - expected).abs());
    }

    if max_error <= 78.0 {
        CheckResult::pass(
            name,
            max_error,
            format!("counts {a_counts:?}, expected ≈ {expected}"),
        )
    } else {
        CheckResult::fail(
            name,
            max_error,
            format!("counts {a_counts:?}, expected ≈ {expected}"),
        )
    }
}

/// Check 7: block orders are reproducible and keyed by experiment identity.
pub fn seed_determinism() -> CheckResult {
    let name = "Seed determinism";
    let a = probe_experiment("det-a");
    let b = probe_experiment("det-b");

    for block_index in 0..100 {
        if block_order(&a, block_index) != block_order(&a, block_index) {
            return CheckResult::fail(name, 1.0, format!("block {block_index} not reproducible"));
        }
    }
    let differs = (0..100).any(|i| block_order(&a, i) != block_order(&b, i));
    if differs {
        CheckResult::pass(name, 0.0, "reproducible per id, distinct across ids".into())
    } else {
        CheckResult::fail(name, 1.0, "two experiment ids drew identical sequences".into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Battery
// ═══════════════════════════════════════════════════════════════════════════════

/// Run every check.
pub fn run_all_checks() -> Vec<CheckResult> {
    vec![
        p_value_agreement(),
        p_value_critical_point(),
        pearson_linear_recovery(),
        spearman_monotone_invariance(),
        block_balance(),
        position_uniformity(),
        seed_determinism(),
    ]
}
