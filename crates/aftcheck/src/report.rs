//! End-to-end correlation of two counter snapshots
//!
//! [`correlate`] runs the full pipeline on already collected data:
//! changed indices, chain reconstruction, merge, totals and validation.
//! The resulting [`CorrelationReport`] is plain data with a deterministic
//! row order.

use crate::chain::{build_chains, merge_chains};
use crate::delta::find_changed;
use crate::types::{AftDump, CounterSnapshot, FlowDetails, MergedChainHit};
use crate::validate::{
    expected_behavior, total_chain_delta, total_offered, validate, ExactRange, ValidationMode,
    ValidationOutcome,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Inputs of one correlation pass.
#[derive(Debug, Clone)]
pub struct CorrelationInput<'a> {
    pub pre: &'a CounterSnapshot,
    pub post: &'a CounterSnapshot,
    pub aft: &'a AftDump,
    /// Offered flows by name
    pub flows: &'a BTreeMap<String, FlowDetails>,
    pub mode: ValidationMode,
    pub tolerance_percent: f64,
}

/// Data produced by one correlation pass.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    pub generated_at: DateTime<Utc>,
    pub mode: ValidationMode,
    pub expected_behavior: String,
    /// Changed next-hop indices, numerically sorted
    pub changed_indices: Vec<String>,
    /// Merged chain rows sorted by next-hop, group and VRF
    pub chains: Vec<MergedChainHit>,
    /// Sum of the baseline counts over the changed indices
    pub baseline_total: u64,
    /// Sum of the updated counts over the changed indices
    pub updated_total: u64,
    pub chain_delta: u64,
    pub offered_packets: u64,
    /// Accepted chain delta range, exact mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_range: Option<ExactRange>,
    pub outcome: ValidationOutcome,
}

impl CorrelationReport {
    /// Returns true if validation passed.
    pub fn passed(&self) -> bool {
        self.outcome.passed()
    }
}

/// Correlates two snapshots against the AFT dump and offered traffic.
pub fn correlate(input: CorrelationInput<'_>) -> CorrelationReport {
    let changed_indices = find_changed(input.pre, input.post);
    let hits = build_chains(
        &changed_indices,
        input.pre,
        input.post,
        &input.aft.next_hop_groups,
        &input.aft.ipv4_entries,
        &input.aft.ipv6_entries,
    );

    let mut chains = merge_chains(hits);
    chains.sort_by(|a, b| {
        a.next_hop
            .cmp(&b.next_hop)
            .then(a.next_hop_group.cmp(&b.next_hop_group))
            .then_with(|| a.next_hop_vrf.cmp(&b.next_hop_vrf))
    });

    let chain_delta = total_chain_delta(&chains);
    let offered_packets = total_offered(input.flows.values());
    let outcome = validate(
        &input.mode,
        chain_delta,
        offered_packets,
        &chains,
        input.tolerance_percent,
    );
    let exact_range = (input.mode == ValidationMode::Exact)
        .then(|| ExactRange::new(offered_packets, input.tolerance_percent));

    info!(
        mode = %input.mode,
        changed = changed_indices.len(),
        rows = chains.len(),
        chain_delta,
        offered_packets,
        passed = outcome.passed(),
        "Correlation complete"
    );

    CorrelationReport {
        generated_at: Utc::now(),
        expected_behavior: expected_behavior(&input.mode).to_string(),
        mode: input.mode,
        baseline_total: input.pre.total_over(&changed_indices),
        updated_total: input.post.total_over(&changed_indices),
        changed_indices,
        chains,
        chain_delta,
        offered_packets,
        exact_range,
        outcome,
    }
}
