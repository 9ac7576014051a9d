//! Chain delta validation
//!
//! Compares the aggregate forwarding-chain delta against the offered
//! traffic under one of three modes:
//!
//! | Mode | Pass condition |
//! |------|----------------|
//! | `exact` | chain delta equals offered packets, within a percentage tolerance |
//! | `increment` | at least one chain row, and every row incremented |
//! | `transit` | no chain row changed |
//!
//! A failing check is an ordinary [`ValidationOutcome`], not an error.
//! Every message names the mode and the quantities compared.

use crate::error::AftCheckError;
use crate::types::{FlowDetails, MergedChainHit};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// How the chain delta is checked against offered traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationMode {
    Exact,
    Increment,
    Transit,
    /// A mode name nothing implements; only produced by
    /// [`ValidationMode::parse_lenient`]
    Unrecognized(String),
}

impl ValidationMode {
    /// Parses a mode name, keeping unknown names as
    /// [`ValidationMode::Unrecognized`] instead of failing.
    pub fn parse_lenient(name: &str) -> Self {
        name.parse()
            .unwrap_or_else(|_| ValidationMode::Unrecognized(name.to_string()))
    }

    /// The mode's name.
    pub fn name(&self) -> &str {
        match self {
            ValidationMode::Exact => "exact",
            ValidationMode::Increment => "increment",
            ValidationMode::Transit => "transit",
            ValidationMode::Unrecognized(name) => name,
        }
    }
}

impl FromStr for ValidationMode {
    type Err = AftCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(ValidationMode::Exact),
            "increment" => Ok(ValidationMode::Increment),
            "transit" => Ok(ValidationMode::Transit),
            _ => Err(AftCheckError::UnknownValidationMode(s.to_string())),
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ValidationMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Result kind of one validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub mode: String,
    pub verdict: Verdict,
    pub message: String,
}

impl ValidationOutcome {
    fn new(mode: &ValidationMode, verdict: Verdict, message: String) -> Self {
        Self {
            mode: mode.name().to_string(),
            verdict,
            message,
        }
    }

    /// Returns true for a passing outcome.
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Range of chain deltas accepted in exact mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExactRange {
    pub expected: u64,
    pub tolerance: f64,
    pub min: f64,
    pub max: f64,
}

impl ExactRange {
    /// Computes `offered ± offered * tolerance_percent / 100`.
    pub fn new(offered: u64, tolerance_percent: f64) -> Self {
        let tolerance = if tolerance_percent > 0.0 {
            offered as f64 * (tolerance_percent / 100.0)
        } else {
            0.0
        };
        Self {
            expected: offered,
            tolerance,
            min: offered as f64 - tolerance,
            max: offered as f64 + tolerance,
        }
    }
}

/// Describes what a mode expects to see.
pub fn expected_behavior(mode: &ValidationMode) -> &'static str {
    match mode {
        ValidationMode::Exact => "Exact match counts",
        ValidationMode::Increment => "Higher counts due to prefix sharing",
        ValidationMode::Transit => "No change for transit traffic",
        ValidationMode::Unrecognized(_) => "Unknown validation type",
    }
}

/// Sum of the merged rows' deltas.
pub fn total_chain_delta(merged: &[MergedChainHit]) -> u64 {
    merged.iter().fold(0u64, |acc, m| acc.saturating_add(m.delta))
}

/// Sum of the packets carried by the offered flows.
pub fn total_offered<'a>(flows: impl IntoIterator<Item = &'a FlowDetails>) -> u64 {
    flows
        .into_iter()
        .fold(0u64, |acc, f| acc.saturating_add(f.packet_count))
}

/// Validates the chain delta against offered traffic.
pub fn validate(
    mode: &ValidationMode,
    total_chain_delta: u64,
    total_offered: u64,
    merged: &[MergedChainHit],
    tolerance_percent: f64,
) -> ValidationOutcome {
    match mode {
        ValidationMode::Exact => validate_exact(mode, total_chain_delta, total_offered, tolerance_percent),
        ValidationMode::Increment => validate_increment(mode, total_chain_delta, merged),
        ValidationMode::Transit => validate_transit(mode, total_chain_delta, merged),
        ValidationMode::Unrecognized(name) => {
            warn!(mode = %name, "Unrecognized validation mode, skipping validation");
            ValidationOutcome::new(
                mode,
                Verdict::Pass,
                format!(
                    "{}: unrecognized validation mode, no check performed (chain delta {}, offered {})",
                    name, total_chain_delta, total_offered
                ),
            )
        }
    }
}

fn validate_exact(
    mode: &ValidationMode,
    chain_delta: u64,
    offered: u64,
    tolerance_percent: f64,
) -> ValidationOutcome {
    if offered == 0 {
        let verdict = if chain_delta == 0 { Verdict::Pass } else { Verdict::Fail };
        let message = format!(
            "exact: chain delta {} with no offered traffic (want 0)",
            chain_delta
        );
        return ValidationOutcome::new(mode, verdict, message);
    }

    let diff = chain_delta.abs_diff(offered);
    let range = ExactRange::new(offered, tolerance_percent);
    let within = if tolerance_percent <= 0.0 {
        diff == 0
    } else {
        diff as f64 <= range.tolerance
    };

    if within {
        ValidationOutcome::new(
            mode,
            Verdict::Pass,
            format!(
                "exact: chain delta {} within {:.1} of offered {} (diff {})",
                chain_delta, range.tolerance, offered, diff
            ),
        )
    } else {
        ValidationOutcome::new(
            mode,
            Verdict::Fail,
            format!(
                "exact: chain delta {} differs from offered {} by {} packets (tolerance {:.1}, range [{:.1} - {:.1}])",
                chain_delta, offered, diff, range.tolerance, range.min, range.max
            ),
        )
    }
}

fn validate_increment(
    mode: &ValidationMode,
    chain_delta: u64,
    merged: &[MergedChainHit],
) -> ValidationOutcome {
    if merged.is_empty() {
        return ValidationOutcome::new(
            mode,
            Verdict::Fail,
            format!(
                "increment: no changed forwarding chain observed (chain delta {})",
                chain_delta
            ),
        );
    }

    let stalled: Vec<u64> = merged
        .iter()
        .filter(|m| m.delta == 0)
        .map(|m| m.next_hop)
        .collect();
    if stalled.is_empty() {
        ValidationOutcome::new(
            mode,
            Verdict::Pass,
            format!(
                "increment: all {} chain rows incremented (chain delta {})",
                merged.len(),
                chain_delta
            ),
        )
    } else {
        ValidationOutcome::new(
            mode,
            Verdict::Fail,
            format!(
                "increment: {} of {} chain rows did not increment (next-hops {:?}, chain delta {})",
                stalled.len(),
                merged.len(),
                stalled,
                chain_delta
            ),
        )
    }
}

fn validate_transit(
    mode: &ValidationMode,
    chain_delta: u64,
    merged: &[MergedChainHit],
) -> ValidationOutcome {
    let moved: Vec<u64> = merged
        .iter()
        .filter(|m| m.delta != 0)
        .map(|m| m.next_hop)
        .collect();
    if moved.is_empty() {
        ValidationOutcome::new(
            mode,
            Verdict::Pass,
            format!(
                "transit: none of {} chain rows changed (chain delta {}, want 0)",
                merged.len(),
                chain_delta
            ),
        )
    } else {
        ValidationOutcome::new(
            mode,
            Verdict::Fail,
            format!(
                "transit: {} chain rows changed (next-hops {:?}, chain delta {}, want 0)",
                moved.len(),
                moved,
                chain_delta
            ),
        )
    }
}
