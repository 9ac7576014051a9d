//! Forwarding chain reconstruction
//!
//! Resolves each changed next-hop back through the next-hop groups that
//! contain it to the routes selecting those groups, producing one
//! [`ChainHit`] per (group, prefix) pair. Hits are then collapsed per
//! `(next_hop, next_hop_group, next_hop_vrf)` by [`merge_chains`].
//!
//! Gaps in the dumps (an index no group references, a group no route
//! selects) are logged and skipped; they never abort a pass.

use crate::types::{
    ChainHit, CounterSnapshot, MergedChainHit, NextHopGroupDump, NextHopGroupMembership,
    NextHopGroupToPrefixes, RouteDump,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Separator between prefixes of a merged row.
pub const PREFIX_SEPARATOR: &str = "   /   ";

/// Builds next-hop to group membership from a group dump.
pub fn build_membership(groups: &[NextHopGroupDump]) -> NextHopGroupMembership {
    let mut membership = NextHopGroupMembership::new();
    for group in groups {
        for next_hop in &group.next_hops {
            membership.entry(*next_hop).or_default().insert(group.id);
        }
    }
    membership
}

/// Builds group to selecting routes from the IPv4 and IPv6 route dumps.
///
/// Routes with group zero are not programmed and are left out.
pub fn build_prefix_index(ipv4: &[RouteDump], ipv6: &[RouteDump]) -> NextHopGroupToPrefixes {
    let mut index = NextHopGroupToPrefixes::new();
    for route in ipv4.iter().chain(ipv6) {
        if route.next_hop_group == 0 {
            continue;
        }
        index
            .entry(route.next_hop_group)
            .or_default()
            .push(route.prefix_info());
    }
    index
}

/// Reconstructs the chain hits for every changed next-hop index.
pub fn build_chains(
    changed: &[String],
    pre: &CounterSnapshot,
    post: &CounterSnapshot,
    groups: &[NextHopGroupDump],
    ipv4: &[RouteDump],
    ipv6: &[RouteDump],
) -> Vec<ChainHit> {
    let membership = build_membership(groups);
    let prefixes = build_prefix_index(ipv4, ipv6);
    let mut hits = Vec::new();

    for index in changed {
        let next_hop = match index.parse::<u64>() {
            Ok(nh) => nh,
            Err(e) => {
                warn!(index = %index, error = %e, "Skipping malformed next-hop index");
                continue;
            }
        };
        let pre_count = pre.get(index);
        let post_count = post.get(index);

        let Some(nhgs) = membership.get(&next_hop) else {
            info!(next_hop, "Next-hop is not a member of any group");
            continue;
        };

        for nhg in nhgs {
            let Some(routes) = prefixes.get(nhg) else {
                debug!(next_hop, nhg, "No route selects next-hop group");
                continue;
            };
            hits.extend(
                routes
                    .iter()
                    .map(|info| ChainHit::new(next_hop, *nhg, info, pre_count, post_count)),
            );
        }
    }

    debug!(changed = changed.len(), hits = hits.len(), "Built forwarding chains");
    hits
}

/// Collapses hits sharing `(next_hop, next_hop_group, next_hop_vrf)`.
///
/// Prefixes are joined with [`PREFIX_SEPARATOR`] in arrival order. The
/// counts of the hit with the largest `post` are kept; they are not
/// summed. Rows come out in first-seen order.
pub fn merge_chains(hits: Vec<ChainHit>) -> Vec<MergedChainHit> {
    let mut merged: Vec<MergedChainHit> = Vec::new();
    let mut slots: HashMap<(u64, u64, String), usize> = HashMap::new();

    for hit in hits {
        let key = (hit.next_hop, hit.next_hop_group, hit.next_hop_vrf.clone());
        match slots.get(&key) {
            Some(&slot) => {
                let row = &mut merged[slot];
                row.prefix.push_str(PREFIX_SEPARATOR);
                row.prefix.push_str(&hit.prefix);
                row.prefix_count += 1;
                if hit.post > row.post {
                    row.pre = hit.pre;
                    row.post = hit.post;
                    row.delta = hit.delta;
                }
            }
            None => {
                slots.insert(key, merged.len());
                merged.push(MergedChainHit::from(hit));
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn group(id: u64, next_hops: &[u64]) -> NextHopGroupDump {
        NextHopGroupDump {
            id,
            network_instance: "DEFAULT".into(),
            next_hops: next_hops.to_vec(),
        }
    }

    fn route(prefix: &str, nhg: u64) -> RouteDump {
        RouteDump {
            prefix: prefix.into(),
            next_hop_group: nhg,
            network_instance: "DEFAULT".into(),
            origin_network_instance: None,
            next_hop_group_network_instance: None,
        }
    }

    fn hit(prefix: &str, nh: u64, nhg: u64, vrf: &str, pre: u64, post: u64) -> ChainHit {
        ChainHit {
            prefix: prefix.into(),
            next_hop_group: nhg,
            next_hop: nh,
            pre,
            post,
            delta: post - pre,
            origin_vrf: "DEFAULT".into(),
            next_hop_vrf: vrf.into(),
        }
    }

    #[test]
    fn test_membership_shared_next_hop() {
        let membership = build_membership(&[group(10, &[1, 2]), group(20, &[2])]);
        assert_eq!(membership[&1].iter().copied().collect::<Vec<_>>(), vec![10]);
        assert_eq!(membership[&2].iter().copied().collect::<Vec<_>>(), vec![10, 20]);
    }

    #[test]
    fn test_prefix_index_skips_unprogrammed_routes() {
        let index = build_prefix_index(
            &[route("10.0.0.0/24", 10), route("10.0.9.0/24", 0)],
            &[route("2001:db8::/64", 10)],
        );
        assert_eq!(index.len(), 1);
        let prefixes: Vec<_> = index[&10].iter().map(|p| p.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["10.0.0.0/24", "2001:db8::/64"]);
    }

    #[test]
    fn test_fan_out_two_groups_two_prefixes() {
        let pre: CounterSnapshot = [("5", 100)].into_iter().collect();
        let post: CounterSnapshot = [("5", 160)].into_iter().collect();
        let hits = build_chains(
            &["5".to_string()],
            &pre,
            &post,
            &[group(10, &[5]), group(20, &[5, 6])],
            &[route("10.0.0.0/24", 10), route("10.0.1.0/24", 20)],
            &[route("2001:db8:1::/64", 10), route("2001:db8:2::/64", 20)],
        );
        assert_eq!(hits.len(), 4);
        assert!(hits
            .iter()
            .all(|h| h.next_hop == 5 && h.pre == 100 && h.post == 160 && h.delta == 60));
    }

    #[test]
    fn test_gaps_are_skipped() {
        let pre = CounterSnapshot::new();
        let post: CounterSnapshot = [("1", 10), ("2", 10), ("bogus", 10)].into_iter().collect();
        let hits = build_chains(
            &["bogus".to_string(), "1".to_string(), "2".to_string()],
            &pre,
            &post,
            // 1 has no group; 2's group has no route
            &[group(30, &[2])],
            &[route("10.0.0.0/24", 40)],
            &[],
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn test_new_index_uses_zero_baseline() {
        let pre = CounterSnapshot::new();
        let post: CounterSnapshot = [("3", 10)].into_iter().collect();
        let hits = build_chains(
            &["3".to_string()],
            &pre,
            &post,
            &[group(10, &[3])],
            &[route("10.0.0.0/24", 10)],
            &[],
        );
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].pre, hits[0].post, hits[0].delta), (0, 10, 10));
    }

    #[test]
    fn test_merge_keeps_larger_post() {
        let merged = merge_chains(vec![
            hit("10.0.0.0/24", 5, 10, "A", 0, 100),
            hit("10.0.1.0/24", 5, 10, "A", 20, 150),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].prefix, "10.0.0.0/24   /   10.0.1.0/24");
        assert_eq!((merged[0].pre, merged[0].post, merged[0].delta), (20, 150, 130));
        assert_eq!(merged[0].prefix_count, 2);
    }

    #[test]
    fn test_merge_does_not_replace_with_smaller_post() {
        let merged = merge_chains(vec![
            hit("10.0.1.0/24", 5, 10, "A", 20, 150),
            hit("10.0.0.0/24", 5, 10, "A", 0, 100),
        ]);
        assert_eq!(merged[0].prefix, "10.0.1.0/24   /   10.0.0.0/24");
        assert_eq!(merged[0].post, 150);
        assert_eq!(merged[0].delta, 130);
    }

    #[test]
    fn test_merge_distinct_keys() {
        let merged = merge_chains(vec![
            hit("10.0.0.0/24", 5, 10, "A", 0, 100),
            hit("10.0.0.0/24", 5, 10, "B", 0, 100),
            hit("10.0.0.0/24", 5, 11, "A", 0, 100),
            hit("10.0.0.0/24", 6, 10, "A", 0, 100),
        ]);
        assert_eq!(merged.len(), 4);
        assert!(merged.iter().all(|m| m.prefix_count == 1));
    }
}
