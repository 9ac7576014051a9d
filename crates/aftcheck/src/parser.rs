//! Next-hop counter notification parser
//!
//! Turns one telemetry notification into a partial `index -> packets`
//! map. The counter may arrive as the `packets-forwarded` leaf itself or
//! inside a JSON subtree rooted anywhere between the `next-hop` element
//! and the leaf; the document is decoded into the schema matching where
//! the update path stops.
//!
//! Every update that names a next-hop index produces an entry. When the
//! value cannot be decoded the entry is zero, so an index that carried no
//! traffic is still distinguishable from one that was never reported.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-10: Information Input Validation - Typed decode of device payloads

use serde::Deserialize;
use sonic_gnmi::proto::{typed_value::Value, Update};
use sonic_gnmi::{Notification, Path, TypedValue};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, trace};

/// Path element carrying the next-hop index.
pub const NEXT_HOP_ELEM: &str = "next-hop";
/// Key of [`NEXT_HOP_ELEM`] holding the index.
pub const NEXT_HOP_KEY: &str = "index";

/// Why one update's counter could not be decoded.
#[derive(Debug, Error)]
pub enum CounterDecodeError {
    #[error("update has no value")]
    MissingValue,

    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("document has no {0} field")]
    MissingField(&'static str),

    #[error("{0:?} is not a base-10 u64")]
    NotANumber(String),

    #[error("path continues past the counter: /{0}")]
    UnexpectedPath(String),

    #[error("unsupported value encoding")]
    UnsupportedEncoding,
}

type DecodeResult<T> = std::result::Result<T, CounterDecodeError>;

#[derive(Debug, Deserialize)]
struct NextHopDoc {
    #[serde(default, alias = "openconfig-network-instance:state")]
    state: Option<StateDoc>,
}

#[derive(Debug, Deserialize)]
struct StateDoc {
    #[serde(default)]
    counters: Option<CountersDoc>,
}

#[derive(Debug, Deserialize)]
struct CountersDoc {
    #[serde(default, rename = "packets-forwarded")]
    packets_forwarded: Option<CounterValue>,
}

/// JSON_IETF carries uint64 as a string; some targets send a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CounterValue {
    Text(String),
    Number(u64),
}

impl CounterValue {
    fn to_u64(&self) -> DecodeResult<u64> {
        match self {
            CounterValue::Number(n) => Ok(*n),
            CounterValue::Text(s) => parse_decimal(s),
        }
    }
}

fn parse_decimal(s: &str) -> DecodeResult<u64> {
    s.trim()
        .parse::<u64>()
        .map_err(|_| CounterDecodeError::NotANumber(s.to_string()))
}

/// Where the update path stops below the `next-hop` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    NextHop,
    State,
    Counters,
    Leaf,
}

impl Depth {
    fn of(below: &[&str]) -> DecodeResult<Self> {
        match below {
            [] => Ok(Depth::NextHop),
            ["state"] => Ok(Depth::State),
            ["state", "counters"] => Ok(Depth::Counters),
            ["state", "counters", "packets-forwarded"] => Ok(Depth::Leaf),
            other => Err(CounterDecodeError::UnexpectedPath(other.join("/"))),
        }
    }
}

fn decode_document(bytes: &[u8], depth: Depth) -> DecodeResult<u64> {
    let counters = match depth {
        Depth::NextHop => {
            let doc: NextHopDoc = serde_json::from_slice(bytes)?;
            doc.state
                .ok_or(CounterDecodeError::MissingField("state"))?
                .counters
                .ok_or(CounterDecodeError::MissingField("counters"))?
        }
        Depth::State => {
            let doc: StateDoc = serde_json::from_slice(bytes)?;
            doc.counters
                .ok_or(CounterDecodeError::MissingField("counters"))?
        }
        Depth::Counters => serde_json::from_slice(bytes)?,
        Depth::Leaf => {
            let value: CounterValue = serde_json::from_slice(bytes)?;
            return value.to_u64();
        }
    };
    counters
        .packets_forwarded
        .ok_or(CounterDecodeError::MissingField("packets-forwarded"))?
        .to_u64()
}

/// Decodes the forwarded-packet count of one update.
pub fn decode_counter(value: Option<&TypedValue>, below: &[&str]) -> DecodeResult<u64> {
    let depth = Depth::of(below)?;
    let value = value
        .and_then(|v| v.value.as_ref())
        .ok_or(CounterDecodeError::MissingValue)?;
    match value {
        Value::JsonIetfVal(bytes) | Value::JsonVal(bytes) => decode_document(bytes, depth),
        Value::UintVal(n) if depth == Depth::Leaf => Ok(*n),
        Value::StringVal(s) | Value::AsciiVal(s) if depth == Depth::Leaf => parse_decimal(s),
        _ => Err(CounterDecodeError::UnsupportedEncoding),
    }
}

/// Extracts the next-hop index and the path elements below it.
fn locate_index(path: &Path) -> Option<(String, Vec<&str>)> {
    let (pos, elem) = path.find_elem(NEXT_HOP_ELEM)?;
    let index = elem.key.get(NEXT_HOP_KEY)?.clone();
    let below = path.elem[pos + 1..].iter().map(|e| e.name.as_str()).collect();
    Some((index, below))
}

fn parse_update(prefix: Option<&Path>, update: &Update) -> Option<(String, u64)> {
    let path = Path::join(prefix, update.path.as_ref());
    let Some((index, below)) = locate_index(&path) else {
        trace!(path = %path.display(), "Skipping update without next-hop index");
        return None;
    };
    let count = match decode_counter(update.val.as_ref(), &below) {
        Ok(count) => count,
        Err(e) => {
            debug!(index = %index, reason = %e, "Recording zero for undecodable counter");
            0
        }
    };
    Some((index, count))
}

/// Decodes every update of a notification into `index -> packets`.
///
/// Updates without a next-hop index are skipped. When an index appears
/// more than once the largest value wins.
pub fn parse_notification(notification: &Notification) -> HashMap<String, u64> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for update in &notification.update {
        if let Some((index, count)) = parse_update(notification.prefix.as_ref(), update) {
            let entry = counts.entry(index).or_insert(0);
            *entry = (*entry).max(count);
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sonic_gnmi::parse_path;

    fn update(path: &str, val: Option<TypedValue>) -> Update {
        Update {
            path: Some(parse_path(path).unwrap()),
            val,
            duplicates: 0,
        }
    }

    fn notification(prefix: Option<&str>, updates: Vec<Update>) -> Notification {
        Notification {
            prefix: prefix.map(|p| parse_path(p).unwrap()),
            update: updates,
            ..Default::default()
        }
    }

    const NH: &str = "/network-instances/network-instance[name=DEFAULT]/afts/next-hops/next-hop";

    #[test]
    fn test_next_hop_subtree() {
        let n = notification(
            None,
            vec![update(
                &format!("{}[index=5]", NH),
                Some(TypedValue::json_ietf(&json!({
                    "state": {"counters": {"packets-forwarded": "1234"}}
                }))),
            )],
        );
        assert_eq!(parse_notification(&n), HashMap::from([("5".to_string(), 1234)]));
    }

    #[test]
    fn test_leaf_with_prefix() {
        let n = notification(
            Some("/network-instances/network-instance[name=VRF-A]/afts"),
            vec![update(
                "/next-hops/next-hop[index=9]/state/counters/packets-forwarded",
                Some(TypedValue::json_ietf(&json!("18446744073709551615"))),
            )],
        );
        assert_eq!(parse_notification(&n).get("9"), Some(&u64::MAX));
    }

    #[test]
    fn test_intermediate_depths_and_native_values() {
        let n = notification(
            None,
            vec![
                update(
                    &format!("{}[index=1]/state", NH),
                    Some(TypedValue::json_ietf(&json!({"counters": {"packets-forwarded": 10}}))),
                ),
                update(
                    &format!("{}[index=2]/state/counters", NH),
                    Some(TypedValue::json_ietf(&json!({"packets-forwarded": "20"}))),
                ),
                update(
                    &format!("{}[index=3]/state/counters/packets-forwarded", NH),
                    Some(TypedValue::uint(30)),
                ),
            ],
        );
        let counts = parse_notification(&n);
        assert_eq!(counts.get("1"), Some(&10));
        assert_eq!(counts.get("2"), Some(&20));
        assert_eq!(counts.get("3"), Some(&30));
    }

    #[test]
    fn test_failures_record_zero() {
        let n = notification(
            None,
            vec![
                update(&format!("{}[index=1]", NH), None),
                update(
                    &format!("{}[index=2]", NH),
                    Some(TypedValue::json_ietf(&json!({"state": {}}))),
                ),
                update(
                    &format!("{}[index=3]", NH),
                    Some(TypedValue::json_ietf(&json!({"state": {"counters": {"packets-forwarded": "-4"}}}))),
                ),
                update(
                    &format!("{}[index=4]", NH),
                    Some(TypedValue {
                        value: Some(Value::JsonIetfVal(b"{not json".to_vec())),
                    }),
                ),
                update(&format!("{}[index=5]", NH), Some(TypedValue::uint(7))),
            ],
        );
        let counts = parse_notification(&n);
        assert_eq!(counts.len(), 5);
        assert!(counts.values().all(|v| *v == 0));
    }

    #[test]
    fn test_update_without_index_is_skipped() {
        let n = notification(
            None,
            vec![
                update("/network-instances/network-instance[name=DEFAULT]/state", Some(TypedValue::uint(1))),
                update(&format!("{}/state", NH), Some(TypedValue::uint(1))),
            ],
        );
        assert!(parse_notification(&n).is_empty());
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode_counter(None, &[]),
            Err(CounterDecodeError::MissingValue)
        ));
        assert!(matches!(
            decode_counter(Some(&TypedValue::uint(1)), &["state", "weight"]),
            Err(CounterDecodeError::UnexpectedPath(_))
        ));
        assert!(matches!(
            decode_counter(Some(&TypedValue::json_ietf(&json!({"state": {}}))), &[]),
            Err(CounterDecodeError::MissingField("counters"))
        ));
    }
}
