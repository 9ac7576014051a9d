//! AFT data types
//!
//! Counter snapshots, the forwarding-chain records reconstructed from
//! them, and the dump formats the caller supplies for next-hop groups and
//! routes. Next-hop indices are kept as strings in snapshots (they are
//! path keys on the wire) and as `u64` once resolved against a dump.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Orders next-hop indices numerically, falling back to text order for
/// keys that are not numbers.
pub fn index_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Cumulative forwarded-packet count per next-hop index.
///
/// A missing index reads as zero. Merging keeps the largest value seen
/// for an index, and an index is retained once observed even at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterSnapshot {
    counters: HashMap<String, u64>,
}

impl CounterSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the count for `index`, zero if never observed.
    pub fn get(&self, index: &str) -> u64 {
        self.counters.get(index).copied().unwrap_or(0)
    }

    /// Returns true if `index` was observed.
    pub fn contains(&self, index: &str) -> bool {
        self.counters.contains_key(index)
    }

    /// Records one observation for `index`.
    ///
    /// Returns true if the stored value grew. A lower value than the one
    /// already stored is discarded.
    pub fn merge(&mut self, index: impl Into<String>, value: u64) -> bool {
        let index = index.into();
        let current = self.counters.entry(index.clone()).or_insert(0);
        if value > *current {
            *current = value;
            true
        } else {
            if value < *current {
                debug!(index = %index, stored = *current, observed = value, "Discarding counter regression");
            }
            false
        }
    }

    /// Merges every entry of a partial map in iteration order.
    pub fn merge_partial(&mut self, partial: HashMap<String, u64>) {
        for (index, value) in partial {
            self.merge(index, value);
        }
    }

    /// Number of observed indices.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Returns true if no index was observed.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Iterates over `(index, count)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counters.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Observed indices sorted numerically.
    pub fn sorted_indices(&self) -> Vec<String> {
        self.counters
            .keys()
            .cloned()
            .sorted_by(|a, b| index_order(a, b))
            .collect()
    }

    /// Sum of the counts for `indices`.
    pub fn total_over<'a>(&self, indices: impl IntoIterator<Item = &'a String>) -> u64 {
        indices
            .into_iter()
            .fold(0u64, |acc, index| acc.saturating_add(self.get(index)))
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for CounterSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (index, value) in iter {
            snapshot.merge(index, value);
        }
        snapshot
    }
}

/// Next-hop index to the groups that reference it.
pub type NextHopGroupMembership = HashMap<u64, BTreeSet<u64>>;

/// Next-hop group to the routes that select it, in dump order.
pub type NextHopGroupToPrefixes = HashMap<u64, Vec<PrefixInfo>>;

/// One route's identity and VRF context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixInfo {
    /// Route prefix, e.g. `10.0.0.0/24`
    pub prefix: String,
    /// VRF the packet is decapsulated from
    pub origin_vrf: String,
    /// VRF the selected next-hop group forwards into
    pub nhg_vrf: String,
}

/// A route's contribution to one observed counter increment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHit {
    pub prefix: String,
    pub next_hop_group: u64,
    pub next_hop: u64,
    pub pre: u64,
    pub post: u64,
    /// `post - pre`, zero when the counter went backwards
    pub delta: u64,
    pub origin_vrf: String,
    pub next_hop_vrf: String,
}

impl ChainHit {
    /// Builds a hit for one (group, prefix) pair of a changed next-hop.
    pub fn new(next_hop: u64, next_hop_group: u64, info: &PrefixInfo, pre: u64, post: u64) -> Self {
        Self {
            prefix: info.prefix.clone(),
            next_hop_group,
            next_hop,
            pre,
            post,
            delta: post.saturating_sub(pre),
            origin_vrf: info.origin_vrf.clone(),
            next_hop_vrf: info.nhg_vrf.clone(),
        }
    }
}

/// Hits sharing `(next_hop, next_hop_group, next_hop_vrf)` collapsed into
/// one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedChainHit {
    /// Contributing prefixes joined in arrival order
    pub prefix: String,
    pub next_hop_group: u64,
    pub next_hop: u64,
    pub pre: u64,
    pub post: u64,
    pub delta: u64,
    pub origin_vrf: String,
    pub next_hop_vrf: String,
    /// Number of hits merged into this row
    pub prefix_count: usize,
}

impl From<ChainHit> for MergedChainHit {
    fn from(hit: ChainHit) -> Self {
        Self {
            prefix: hit.prefix,
            next_hop_group: hit.next_hop_group,
            next_hop: hit.next_hop,
            pre: hit.pre,
            post: hit.post,
            delta: hit.delta,
            origin_vrf: hit.origin_vrf,
            next_hop_vrf: hit.next_hop_vrf,
            prefix_count: 1,
        }
    }
}

/// One offered traffic flow and the packets it carried.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlowDetails {
    /// Outer header protocol (IPv4, IPv6)
    #[serde(default)]
    pub outer_protocol: String,
    /// Inner header protocol for encapsulated flows
    #[serde(default)]
    pub inner_protocol: String,
    #[serde(default)]
    pub outer_src: String,
    #[serde(default)]
    pub outer_dst: String,
    #[serde(default)]
    pub inner_src: String,
    #[serde(default)]
    pub inner_dst: String,
    #[serde(default)]
    pub dscp: u8,
    #[serde(default)]
    pub inner_dscp: u8,
    #[serde(default)]
    pub dest_ports: Vec<String>,
    /// Packets observed for this flow
    #[serde(default)]
    pub packet_count: u64,
}

/// One next-hop group from an AFT dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NextHopGroupDump {
    pub id: u64,
    #[serde(default)]
    pub network_instance: String,
    /// Member next-hop indices
    #[serde(default)]
    pub next_hops: Vec<u64>,
}

/// One IPv4 or IPv6 route entry from an AFT dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouteDump {
    pub prefix: String,
    /// Selected next-hop group; zero means not programmed
    #[serde(default)]
    pub next_hop_group: u64,
    /// Network instance holding the entry
    #[serde(default)]
    pub network_instance: String,
    /// Decapsulation VRF, defaults to `network_instance`
    #[serde(default)]
    pub origin_network_instance: Option<String>,
    /// VRF of the selected group, defaults to `network_instance`
    #[serde(default)]
    pub next_hop_group_network_instance: Option<String>,
}

impl RouteDump {
    /// Returns the route's identity with unset VRFs filled in.
    pub fn prefix_info(&self) -> PrefixInfo {
        PrefixInfo {
            prefix: self.prefix.clone(),
            origin_vrf: self
                .origin_network_instance
                .clone()
                .unwrap_or_else(|| self.network_instance.clone()),
            nhg_vrf: self
                .next_hop_group_network_instance
                .clone()
                .unwrap_or_else(|| self.network_instance.clone()),
        }
    }
}

/// Full AFT dump supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AftDump {
    #[serde(default)]
    pub next_hop_groups: Vec<NextHopGroupDump>,
    #[serde(default)]
    pub ipv4_entries: Vec<RouteDump>,
    #[serde(default)]
    pub ipv6_entries: Vec<RouteDump>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_keeps_maximum() {
        let mut snapshot = CounterSnapshot::new();
        assert!(snapshot.merge("1", 5));
        assert!(!snapshot.merge("1", 3));
        assert_eq!(snapshot.get("1"), 5);
    }

    #[test]
    fn test_merge_zero_retains_index() {
        let mut snapshot = CounterSnapshot::new();
        snapshot.merge("7", 0);
        snapshot.merge("7", 0);
        assert!(snapshot.contains("7"));
        assert_eq!(snapshot.get("7"), 0);
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.contains("8"));
        assert_eq!(snapshot.get("8"), 0);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut snapshot = CounterSnapshot::new();
        snapshot.merge_partial(HashMap::from([("1".to_string(), 10), ("2".to_string(), 4)]));
        let first = snapshot.clone();
        snapshot.merge_partial(HashMap::from([("1".to_string(), 10), ("2".to_string(), 4)]));
        assert_eq!(snapshot, first);
    }

    #[test]
    fn test_sorted_indices_numeric() {
        let snapshot: CounterSnapshot = [("10", 1), ("9", 1), ("100", 1), ("x", 1)].into_iter().collect();
        assert_eq!(snapshot.sorted_indices(), vec!["9", "10", "100", "x"]);
    }

    #[test]
    fn test_total_over() {
        let snapshot: CounterSnapshot = [("1", 100), ("2", 50)].into_iter().collect();
        let indices = vec!["1".to_string(), "3".to_string()];
        assert_eq!(snapshot.total_over(&indices), 100);
    }

    #[test]
    fn test_snapshot_json_is_plain_map() {
        let snapshot: CounterSnapshot = [("1", 100)].into_iter().collect();
        assert_eq!(serde_json::to_string(&snapshot).unwrap(), r#"{"1":100}"#);
        let back: CounterSnapshot = serde_json::from_str(r#"{"1":100,"2":0}"#).unwrap();
        assert!(back.contains("2"));
    }

    #[test]
    fn test_chain_hit_delta_never_underflows() {
        let info = PrefixInfo {
            prefix: "10.0.0.0/24".into(),
            origin_vrf: "DEFAULT".into(),
            nhg_vrf: "VRF-A".into(),
        };
        let hit = ChainHit::new(5, 10, &info, 200, 150);
        assert_eq!(hit.delta, 0);
        assert_eq!(ChainHit::new(5, 10, &info, 100, 150).delta, 50);
    }

    #[test]
    fn test_route_dump_vrf_defaults() {
        let json = r#"{"prefix": "2001:db8::/64", "next-hop-group": 3, "network-instance": "TE"}"#;
        let route: RouteDump = serde_json::from_str(json).unwrap();
        let info = route.prefix_info();
        assert_eq!(info.origin_vrf, "TE");
        assert_eq!(info.nhg_vrf, "TE");

        let json = r#"{"prefix": "10.1.0.0/16", "next-hop-group": 3, "network-instance": "TE",
                       "origin-network-instance": "DECAP", "next-hop-group-network-instance": "ENCAP"}"#;
        let info = serde_json::from_str::<RouteDump>(json).unwrap().prefix_info();
        assert_eq!(info.origin_vrf, "DECAP");
        assert_eq!(info.nhg_vrf, "ENCAP");
    }

    #[test]
    fn test_flow_details_defaults() {
        let flow: FlowDetails = serde_json::from_str(r#"{"packet-count": 1000, "dscp": 10}"#).unwrap();
        assert_eq!(flow.packet_count, 1000);
        assert_eq!(flow.dscp, 10);
        assert!(flow.dest_ports.is_empty());
    }
}
