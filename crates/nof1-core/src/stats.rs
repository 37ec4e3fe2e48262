//! Pairwise correlation statistics for date-aligned observation sequences.
//!
//! Two estimators are provided: Pearson's product-moment coefficient for
//! continuous measurements and Spearman's rank coefficient for ordinal ones
//! (Spearman is Pearson over average-rank transforms). Both attach a
//! two-tailed p-value from the Student-t distribution with n−2 degrees of
//! freedom.
//!
//! Degenerate inputs — fewer than 3 paired points, mismatched lengths, or a
//! zero-variance sequence — are a defined "no correlation" outcome (`None`),
//! never `NaN` and never an error.

use serde::Serialize;
use std::f64::consts::PI;

/// Minimum number of paired observations for a defined coefficient.
pub const MIN_PAIRED_POINTS: usize = 3;

/// Which estimator produced a [`Correlation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
}

impl std::fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pearson => write!(f, "pearson"),
            Self::Spearman => write!(f, "spearman"),
        }
    }
}

/// A computed correlation between two aligned sequences.
#[derive(Debug, Clone, Serialize)]
pub struct Correlation {
    /// Coefficient in [−1, 1].
    pub coefficient: f64,
    /// Two-tailed p-value from the t-distribution with n−2 degrees of freedom.
    pub p_value: f64,
    /// Number of paired observations.
    pub n: usize,
    /// Estimator used.
    pub method: CorrelationMethod,
}

// ---------------------------------------------------------------------------
// Estimators
// ---------------------------------------------------------------------------

/// Pearson product-moment correlation between two positionally paired
/// sequences. Returns `None` for degenerate inputs.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<Correlation> {
    raw_pearson(x, y).map(|(r, n)| Correlation {
        coefficient: r,
        p_value: p_value_from_r(r, n),
        n,
        method: CorrelationMethod::Pearson,
    })
}

/// Spearman rank correlation: Pearson over average-rank transforms of both
/// sequences. Ties receive the mean of the ranks they jointly occupy, so the
/// coefficient is invariant under any strictly increasing transform of either
/// input. Returns `None` for degenerate inputs.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<Correlation> {
    if x.len() != y.len() || x.len() < MIN_PAIRED_POINTS {
        return None;
    }
    let rx = average_ranks(x);
    let ry = average_ranks(y);
    raw_pearson(&rx, &ry).map(|(r, n)| Correlation {
        coefficient: r,
        p_value: p_value_from_r(r, n),
        n,
        method: CorrelationMethod::Spearman,
    })
}

/// Coefficient-only Pearson. `None` when the pairing is degenerate or either
/// sequence has zero variance.
fn raw_pearson(x: &[f64], y: &[f64]) -> Option<(f64, usize)> {
    let n = x.len();
    if n != y.len() || n < MIN_PAIRED_POINTS {
        return None;
    }
    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom < 1e-10 {
        return None;
    }
    // Floating error can push the ratio a hair past ±1.
    Some(((cov / denom).clamp(-1.0, 1.0), n))
}

/// Average-rank transform (1-based). Tied values share the mean of the ranks
/// they would jointly occupy.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Positions i..=j (0-based) hold the same value; their 1-based ranks
        // are i+1..=j+1, whose mean is (i + j) / 2 + 1.
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

// ---------------------------------------------------------------------------
// p-value
// ---------------------------------------------------------------------------

/// Two-tailed p-value for a correlation coefficient with n−2 degrees of
/// freedom: t = r·sqrt((n−2)/(1−r²)), p = I_{ν/(ν+t²)}(ν/2, 1/2) where I is
/// the regularized incomplete beta function.
pub fn p_value_from_r(r: f64, n: usize) -> f64 {
    if n < MIN_PAIRED_POINTS {
        return 1.0;
    }
    let df = (n - 2) as f64;
    let r2 = r * r;
    if r2 >= 1.0 {
        return 0.0;
    }
    let t2 = r2 * df / (1.0 - r2);
    incomplete_beta(df / 2.0, 0.5, df / (df + t2)).clamp(0.0, 1.0)
}

/// Regularized incomplete beta function I_x(a, b) via the continued-fraction
/// expansion (modified Lentz), with the symmetry transform for convergence.
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_cf(a, b, x) / a
    } else {
        1.0 - front * beta_cf(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for the incomplete beta function (modified Lentz).
fn beta_cf(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 1e-14;
    const TINY: f64 = 1e-30;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Log gamma function (Lanczos approximation).
fn ln_gamma(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let g = 7.0;
    let c = [
        0.999_999_999_999_809_9,
        676.5203681218851,
        -1259.1392167224028,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507343278686905,
        -0.13857109526572012,
        9.984_369_578_019_572e-6,
        1.5056327351493116e-7,
    ];

    let x = x - 1.0;
    let mut sum = c[0];
    for (i, &coeff) in c[1..].iter().enumerate() {
        sum += coeff / (x + i as f64 + 1.0);
    }
    let t = x + g + 0.5;
    0.5 * (2.0 * PI).ln() + (t.ln() * (x + 0.5)) - t + sum.ln()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
