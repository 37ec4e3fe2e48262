//! Rigor Score — a 0–100 methodology-quality grade for an experiment.
//!
//! Five axes worth 20 points each, scored independently from the
//! experiment's metadata plus externally supplied per-condition counts and
//! an autocorrelation flag. Purely derived: nothing here is persisted, the
//! score is recomputed on demand.

use serde::Serialize;

use crate::experiment::ExperimentType;

/// Inputs to the rigor evaluation.
///
/// `n_a`/`n_b` are analyzable (non-washout) day counts for the two arms, and
/// `autocorrelation_is_problematic` comes from an upstream lag-1 check on the
/// dependent series.
#[derive(Debug, Clone)]
pub struct RigorInput {
    pub hypothesis_locked: bool,
    pub is_blind: bool,
    pub autocorrelation_is_problematic: bool,
    pub n_a: u32,
    pub n_b: u32,
    pub experiment_type: ExperimentType,
}

/// Points awarded per axis (each 0 or 20).
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RigorBreakdown {
    pub preregistration: u32,
    pub blinding: u32,
    pub autocorrelation: u32,
    pub sample_size: u32,
    pub balance: u32,
}

/// The evaluated score.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RigorScore {
    /// Sum of the axis points, 0–100.
    pub score: u32,
    /// Letter grade from the fixed step function.
    pub grade: &'static str,
    pub breakdown: RigorBreakdown,
    /// One actionable tip per unmet axis.
    pub tips: Vec<String>,
}

const AXIS_POINTS: u32 = 20;

/// Minimum combined analyzable days for the sample-size axis.
pub const MIN_SAMPLE_DAYS: u32 = 14;

/// Minimum min/max arm ratio for the balance axis.
pub const MIN_BALANCE_RATIO: f64 = 0.7;

/// Evaluate the five axes.
pub fn score(input: &RigorInput) -> RigorScore {
    let mut tips = Vec::new();

    let preregistration = if input.hypothesis_locked {
        AXIS_POINTS
    } else {
        tips.push(
            "Write your hypothesis down and activate the experiment to lock it in before \
             collecting data."
                .to_string(),
        );
        0
    };

    // Observational designs have nothing to blind, so the axis is credited
    // rather than penalized.
    let blinding = if input.is_blind || input.experiment_type == ExperimentType::Observational {
        AXIS_POINTS
    } else {
        tips.push(
            "Consider a blinded setup (e.g. coded capsules) so expectation effects can't steer \
             the outcome."
                .to_string(),
        );
        0
    };

    let autocorrelation = if input.autocorrelation_is_problematic {
        tips.push(
            "Your outcome strongly tracks its own previous day; lengthen the washout period to \
             break the carryover."
                .to_string(),
        );
        0
    } else {
        AXIS_POINTS
    };

    let total = input.n_a + input.n_b;
    let sample_size = if total >= MIN_SAMPLE_DAYS {
        AXIS_POINTS
    } else {
        tips.push(format!(
            "Keep logging: {total} analyzable days so far, at least {MIN_SAMPLE_DAYS} are needed \
             for a meaningful comparison."
        ));
        0
    };

    // Ratio only means something once data exists; an empty experiment
    // leaves the axis unmet.
    let balanced = total > 0 && {
        let lo = input.n_a.min(input.n_b) as f64;
        let hi = input.n_a.max(input.n_b) as f64;
        lo / hi >= MIN_BALANCE_RATIO
    };
    let balance = if balanced {
        AXIS_POINTS
    } else {
        tips.push(
            "Condition days are uneven; let the block schedule run its full course so both arms \
             get comparable coverage."
                .to_string(),
        );
        0
    };

    let breakdown = RigorBreakdown {
        preregistration,
        blinding,
        autocorrelation,
        sample_size,
        balance,
    };
    let score = preregistration + blinding + autocorrelation + sample_size + balance;

    RigorScore {
        score,
        grade: grade_for(score),
        breakdown,
        tips,
    }
}

/// Fixed grade step function. A+ sits exactly at the 100-point maximum: only
/// a perfect score earns it, and 80–99 is an A.
pub fn grade_for(score: u32) -> &'static str {
    match score {
        s if s >= 100 => "A+",
        s if s >= 80 => "A",
        s if s >= 70 => "B+",
        s if s >= 60 => "B",
        s if s >= 50 => "C+",
        s if s >= 40 => "C",
        _ => "D",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perfect() -> RigorInput {
        RigorInput {
            hypothesis_locked: true,
            is_blind: true,
            autocorrelation_is_problematic: false,
            n_a: 10,
            n_b: 10,
            experiment_type: ExperimentType::BlindRct,
        }
    }

    #[test]
    fn test_perfect_score() {
        let s = score(&perfect());
        assert_eq!(s.score, 100);
        assert_eq!(s.grade, "A+");
        assert!(s.tips.is_empty());
    }

    #[test]
    fn test_four_axes_is_a() {
        let mut input = perfect();
        input.hypothesis_locked = false;
        let s = score(&input);
        assert_eq!(s.score, 80);
        assert_eq!(s.grade, "A");
        assert_eq!(s.tips.len(), 1);
        assert_eq!(s.breakdown.preregistration, 0);
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(grade_for(100), "A+");
        assert_eq!(grade_for(99), "A");
        assert_eq!(grade_for(80), "A");
        assert_eq!(grade_for(79), "B+");
        assert_eq!(grade_for(70), "B+");
        assert_eq!(grade_for(60), "B");
        assert_eq!(grade_for(50), "C+");
        assert_eq!(grade_for(40), "C");
        assert_eq!(grade_for(39), "D");
        assert_eq!(grade_for(0), "D");
    }

    #[test]
    fn test_observational_blinding_credited() {
        let mut input = perfect();
        input.is_blind = false;
        input.experiment_type = ExperimentType::Observational;
        let s = score(&input);
        assert_eq!(s.breakdown.blinding, 20);
    }

    #[test]
    fn test_unblinded_randomized_penalized() {
        let mut input = perfect();
        input.is_blind = false;
        input.experiment_type = ExperimentType::Randomized;
        let s = score(&input);
        assert_eq!(s.breakdown.blinding, 0);
    }

    #[test]
    fn test_sample_size_boundary() {
        let mut input = perfect();
        input.n_a = 7;
        input.n_b = 7;
        assert_eq!(score(&input).breakdown.sample_size, 20);
        input.n_b = 6;
        assert_eq!(score(&input).breakdown.sample_size, 0);
    }

    #[test]
    fn test_balance_ratio() {
        let mut input = perfect();
        input.n_a = 7;
        input.n_b = 10;
        assert_eq!(score(&input).breakdown.balance, 20);
        input.n_a = 6;
        assert_eq!(score(&input).breakdown.balance, 0);
    }

    #[test]
    fn test_empty_experiment_balance_unmet() {
        let mut input = perfect();
        input.n_a = 0;
        input.n_b = 0;
        let s = score(&input);
        assert_eq!(s.breakdown.balance, 0);
        assert_eq!(s.breakdown.sample_size, 0);
    }

    #[test]
    fn test_tip_count_matches_unmet_axes() {
        let all_unmet = RigorInput {
            hypothesis_locked: false,
            is_blind: false,
            autocorrelation_is_problematic: true,
            n_a: 0,
            n_b: 0,
            experiment_type: ExperimentType::Randomized,
        };
        let s = score(&all_unmet);
        assert_eq!(s.score, 0);
        assert_eq!(s.grade, "D");
        assert_eq!(s.tips.len(), 5);

        // Tips shrink one-for-one as axes are met.
        let mut partial = all_unmet.clone();
        partial.hypothesis_locked = true;
        partial.is_blind = true;
        assert_eq!(score(&partial).tips.len(), 3);
    }
}
