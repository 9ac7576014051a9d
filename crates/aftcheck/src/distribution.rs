//! Traffic distribution check across receiving ports or next-hops.

use crate::validate::{ValidationOutcome, Verdict};

/// Name reported in distribution outcomes.
pub const DISTRIBUTION_MODE: &str = "distribution";

/// Scales counts to proportions of their sum.
///
/// All proportions are zero when the sum is zero.
pub fn normalize(counts: &[u64]) -> (Vec<f64>, u64) {
    let sum = counts.iter().fold(0u64, |acc, c| acc.saturating_add(*c));
    let ratios = counts
        .iter()
        .map(|c| if sum == 0 { 0.0 } else { *c as f64 / sum as f64 })
        .collect();
    (ratios, sum)
}

/// Checks observed counts against wanted proportions.
///
/// Passes when both have the same length and every proportion is within
/// `tolerance` (absolute) of the wanted weight.
pub fn check_distribution(want: &[f64], got_counts: &[u64], tolerance: f64) -> ValidationOutcome {
    let (got, sum) = normalize(got_counts);
    if want.len() != got.len() {
        return ValidationOutcome {
            mode: DISTRIBUTION_MODE.to_string(),
            verdict: Verdict::Fail,
            message: format!(
                "distribution: want {} weights, got {} counters",
                want.len(),
                got.len()
            ),
        };
    }

    let worst = want
        .iter()
        .zip(&got)
        .enumerate()
        .map(|(i, (w, g))| (i, (w - g).abs()))
        .max_by(|a, b| a.1.total_cmp(&b.1));

    let (verdict, detail) = match worst {
        Some((i, deviation)) if deviation > tolerance => (
            Verdict::Fail,
            format!(
                "slot {} off by {:.4} (want {:.4}, got {:.4})",
                i, deviation, want[i], got[i]
            ),
        ),
        Some((i, deviation)) => (
            Verdict::Pass,
            format!("largest deviation {:.4} at slot {}", deviation, i),
        ),
        None => (Verdict::Pass, "no slots".to_string()),
    };

    ValidationOutcome {
        mode: DISTRIBUTION_MODE.to_string(),
        verdict,
        message: format!(
            "distribution: {} over {} packets, tolerance {:.4}, got ratios {:?}",
            detail, sum, tolerance, got
        ),
    }
}
