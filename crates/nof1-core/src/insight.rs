//! Human-readable interpretation of a correlation result.
//!
//! Deterministic English sentences built from the coefficient's sign, a
//! qualitative strength bucket, and the two variable names. Presentation
//! language/locale is a UI concern; this module only fixes the algorithmic
//! mapping from numbers to words.

use crate::stats::Correlation;

/// Qualitative strength bucket by absolute coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    /// |r| < 0.3
    Weak,
    /// 0.3 ≤ |r| < 0.5
    Moderate,
    /// 0.5 ≤ |r| < 0.7
    Strong,
    /// |r| ≥ 0.7
    VeryStrong,
}

impl Strength {
    /// Bucket an absolute coefficient.
    pub fn from_abs(abs_r: f64) -> Self {
        if abs_r >= 0.7 {
            Self::VeryStrong
        } else if abs_r >= 0.5 {
            Self::Strong
        } else if abs_r >= 0.3 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weak => write!(f, "weak"),
            Self::Moderate => write!(f, "moderate"),
            Self::Strong => write!(f, "strong"),
            Self::VeryStrong => write!(f, "very strong"),
        }
    }
}

/// Below this sample size the sentence carries a small-sample caveat.
pub const SMALL_SAMPLE_N: usize = 30;

/// Describe a correlation between two named variables as one sentence.
///
/// Example output:
/// `"Strong positive association between Sleep quality and Mood (r=0.64,
/// n=41): higher Sleep quality tends to go with higher Mood."`
pub fn describe(name_a: &str, name_b: &str, corr: &Correlation) -> String {
    let strength = Strength::from_abs(corr.coefficient.abs());
    let direction = if corr.coefficient >= 0.0 {
        "positive"
    } else {
        "negative"
    };
    let tendency = if corr.coefficient >= 0.0 {
        format!("higher {name_a} tends to go with higher {name_b}")
    } else {
        format!("higher {name_a} tends to go with lower {name_b}")
    };

    let mut text = format!(
        "{} {direction} association between {name_a} and {name_b} (r={:.2}, n={}): {tendency}.",
        capitalize(&strength.to_string()),
        corr.coefficient,
        corr.n,
    );
    if corr.n < SMALL_SAMPLE_N {
        text.push_str(" Based on a small sample; treat as preliminary.");
    }
    text
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
