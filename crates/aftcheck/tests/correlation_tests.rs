//! End-to-end correlation: two collections, an AFT dump and offered flows

use pretty_assertions::assert_eq;
use sonic_aftcheck::{
    collect_counters, correlate, AftDump, CollectMode, CollectorConfig, CorrelationInput,
    CounterSnapshot, FlowDetails, ValidationMode, Verdict,
};
use sonic_gnmi::proto::Update;
use sonic_gnmi::testing::{MockSession, MockSubscriber, SessionEnd};
use sonic_gnmi::{parse_path, Notification, TypedValue};
use std::collections::BTreeMap;
use std::time::Duration;

const AFT: &str = r#"{
    "next-hop-groups": [
        {"id": 10, "network-instance": "DEFAULT", "next-hops": [1, 2]},
        {"id": 20, "network-instance": "DEFAULT", "next-hops": [2, 3]}
    ],
    "ipv4-entries": [
        {"prefix": "198.51.100.0/24", "next-hop-group": 10, "network-instance": "DEFAULT",
         "origin-network-instance": "DECAP_TE_VRF", "next-hop-group-network-instance": "DEFAULT"},
        {"prefix": "198.51.101.0/24", "next-hop-group": 10, "network-instance": "DEFAULT",
         "origin-network-instance": "DECAP_TE_VRF", "next-hop-group-network-instance": "DEFAULT"},
        {"prefix": "203.0.113.0/24", "next-hop-group": 0, "network-instance": "DEFAULT"}
    ],
    "ipv6-entries": [
        {"prefix": "2001:db8:1::/64", "next-hop-group": 20, "network-instance": "DEFAULT"}
    ]
}"#;

fn next_hop_doc(index: u64, packets: u64) -> Notification {
    let prefix = "/network-instances/network-instance[name=DEFAULT]/afts/next-hops";
    Notification {
        prefix: Some(parse_path(prefix).unwrap()),
        update: vec![Update {
            path: Some(parse_path(&format!("/next-hop[index={}]", index)).unwrap()),
            val: Some(TypedValue::json_ietf(&serde_json::json!({
                "state": {"counters": {"packets-forwarded": packets.to_string()}}
            }))),
            duplicates: 0,
        }],
        ..Default::default()
    }
}

fn flows(packets: &[u64]) -> BTreeMap<String, FlowDetails> {
    packets
        .iter()
        .enumerate()
        .map(|(i, p)| {
            (
                format!("flow-{}", i),
                FlowDetails {
                    outer_protocol: "IPv4".into(),
                    packet_count: *p,
                    ..Default::default()
                },
            )
        })
        .collect()
}

fn collector() -> CollectorConfig {
    CollectorConfig {
        mode: CollectMode::Sample,
        collect_duration: Duration::from_secs(3),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_collect_and_correlate_exact() {
    let mock = MockSubscriber::new();
    mock.push_session(
        MockSession::new(SessionEnd::OnHalfClose)
            .notify(next_hop_doc(1, 100))
            .notify(next_hop_doc(2, 50)),
    );
    mock.push_session(
        MockSession::new(SessionEnd::OnHalfClose)
            .notify(next_hop_doc(1, 150))
            .notify(next_hop_doc(2, 50))
            .notify(next_hop_doc(3, 10)),
    );

    let pre = collect_counters(&mock, &collector()).await.unwrap();
    let post = collect_counters(&mock, &collector()).await.unwrap();
    let aft: AftDump = serde_json::from_str(AFT).unwrap();
    let flows = flows(&[40, 20]);

    let report = correlate(CorrelationInput {
        pre: &pre.snapshot,
        post: &post.snapshot,
        aft: &aft,
        flows: &flows,
        mode: ValidationMode::Exact,
        tolerance_percent: 0.0,
    });

    assert_eq!(report.changed_indices, vec!["1", "3"]);
    assert_eq!(report.chains.len(), 2);

    let first = &report.chains[0];
    assert_eq!(first.next_hop, 1);
    assert_eq!(first.next_hop_group, 10);
    assert_eq!(first.prefix, "198.51.100.0/24   /   198.51.101.0/24");
    assert_eq!(first.prefix_count, 2);
    assert_eq!(first.origin_vrf, "DECAP_TE_VRF");
    assert_eq!((first.pre, first.post, first.delta), (100, 150, 50));

    let second = &report.chains[1];
    assert_eq!((second.next_hop, second.next_hop_group), (3, 20));
    assert_eq!(second.prefix, "2001:db8:1::/64");
    assert_eq!(second.delta, 10);

    assert_eq!(report.chain_delta, 60);
    assert_eq!(report.offered_packets, 60);
    assert_eq!(report.outcome.verdict, Verdict::Pass);
}

#[test]
fn test_exact_mode_tolerance_window() {
    let pre: CounterSnapshot = [("1", 0u64)].into_iter().collect();
    let post: CounterSnapshot = [("1", 990u64)].into_iter().collect();
    let aft: AftDump = serde_json::from_str(AFT).unwrap();
    let flows = flows(&[1000]);

    let strict = correlate(CorrelationInput {
        pre: &pre,
        post: &post,
        aft: &aft,
        flows: &flows,
        mode: ValidationMode::Exact,
        tolerance_percent: 0.0,
    });
    assert!(!strict.passed());
    assert!(strict.outcome.message.contains("990"));

    let tolerant = correlate(CorrelationInput {
        pre: &pre,
        post: &post,
        aft: &aft,
        flows: &flows,
        mode: ValidationMode::Exact,
        tolerance_percent: 2.0,
    });
    assert!(tolerant.passed());
    let range = tolerant.exact_range.unwrap();
    assert_eq!((range.min, range.max), (980.0, 1020.0));
}

#[test]
fn test_shared_next_hop_fans_out_per_group() {
    // Next-hop 2 belongs to both groups
    let pre: CounterSnapshot = [("2", 10u64)].into_iter().collect();
    let post: CounterSnapshot = [("2", 30u64)].into_iter().collect();
    let aft: AftDump = serde_json::from_str(AFT).unwrap();
    let flows = flows(&[20]);

    let report = correlate(CorrelationInput {
        pre: &pre,
        post: &post,
        aft: &aft,
        flows: &flows,
        mode: ValidationMode::Increment,
        tolerance_percent: 0.0,
    });

    let groups: Vec<u64> = report.chains.iter().map(|c| c.next_hop_group).collect();
    assert_eq!(groups, vec![10, 20]);
    assert!(report.chains.iter().all(|c| c.delta == 20));
    assert_eq!(report.chain_delta, 40);
    assert!(report.passed());
    assert_eq!(report.expected_behavior, "Higher counts due to prefix sharing");
}

#[test]
fn test_increment_without_changes_fails() {
    let pre: CounterSnapshot = [("1", 10u64)].into_iter().collect();
    let post: CounterSnapshot = [("1", 10u64)].into_iter().collect();
    let aft: AftDump = serde_json::from_str(AFT).unwrap();
    let flows = flows(&[100]);

    let report = correlate(CorrelationInput {
        pre: &pre,
        post: &post,
        aft: &aft,
        flows: &flows,
        mode: ValidationMode::Increment,
        tolerance_percent: 0.0,
    });
    assert!(report.chains.is_empty());
    assert_eq!(report.outcome.verdict, Verdict::Fail);
    assert!(report.outcome.message.starts_with("increment"));
}

#[test]
fn test_transit_passes_when_probed_counters_are_flat() {
    let pre: CounterSnapshot = [("1", 10u64), ("3", 5u64)].into_iter().collect();
    let post: CounterSnapshot = [("1", 10u64), ("3", 5u64)].into_iter().collect();
    let aft: AftDump = serde_json::from_str(AFT).unwrap();
    let flows = flows(&[500]);

    let report = correlate(CorrelationInput {
        pre: &pre,
        post: &post,
        aft: &aft,
        flows: &flows,
        mode: ValidationMode::Transit,
        tolerance_percent: 0.0,
    });
    assert!(report.passed());
    assert_eq!(report.chain_delta, 0);
}
