//! AFT next-hop counter correlation for SONiC
//!
//! Verifies that the forwarding counters a router reports in its Abstract
//! Forwarding Table agree with the traffic offered to it. Two counter
//! snapshots are collected over gNMI around a traffic run, the next-hops
//! whose counters moved are traced back through their next-hop groups to
//! the routes selecting them, and the aggregate delta is validated
//! against the offered packets.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//!
//! | Control | Description | Implementation |
//! |---------|-------------|----------------|
//! | CM-6 | Configuration Settings | TOML configuration with validation |
//! | SI-4 | System Monitoring | Forwarding counter collection |
//! | SI-10 | Input Validation | Typed decode of counters and dumps |
//! | SI-11 | Error Handling | Structured error types |
//!
//! # Data flow
//!
//! ```text
//! collector --> parser --> snapshots (pre, post)
//!                              |
//!                              v
//!                        delta::find_changed
//!                              |
//!   AFT dump (NHGs, routes) -> chain::build_chains -> chain::merge_chains
//!                                                          |
//!   offered flows ----------------------------------> validate::validate
//! ```

pub mod chain;
pub mod collector;
pub mod config;
pub mod delta;
pub mod distribution;
pub mod error;
pub mod inputs;
pub mod parser;
pub mod report;
pub mod types;
pub mod validate;

pub use chain::{build_chains, merge_chains, PREFIX_SEPARATOR};
pub use collector::{collect_counters, CollectMode, Collection, CollectorConfig};
pub use config::AftCheckConfig;
pub use delta::find_changed;
pub use distribution::{check_distribution, normalize};
pub use error::{AftCheckError, Result};
pub use parser::parse_notification;
pub use report::{correlate, CorrelationInput, CorrelationReport};
pub use types::{
    AftDump, ChainHit, CounterSnapshot, FlowDetails, MergedChainHit, NextHopGroupDump,
    NextHopGroupMembership, NextHopGroupToPrefixes, PrefixInfo, RouteDump,
};
pub use validate::{validate, ValidationMode, ValidationOutcome, Verdict};
