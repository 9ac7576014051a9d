//! JSON inputs and outputs of the offline commands.

use crate::error::Result;
use crate::types::{AftDump, CounterSnapshot, FlowDetails};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    let value = serde_json::from_str(&content)?;
    debug!(path = %path.display(), "Loaded input");
    Ok(value)
}

/// Reads a counter snapshot (`{"index": count, ...}`).
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<CounterSnapshot> {
    read_json(path.as_ref())
}

/// Reads an AFT dump.
pub fn load_aft(path: impl AsRef<Path>) -> Result<AftDump> {
    read_json(path.as_ref())
}

/// Reads offered flows keyed by flow name.
pub fn load_flows(path: impl AsRef<Path>) -> Result<BTreeMap<String, FlowDetails>> {
    read_json(path.as_ref())
}

/// Writes `value` as pretty JSON to `path`, or to stdout when `None`.
pub fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => fs::write(path, json + "\n")?,
        None => {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", json)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AftCheckError;

    #[test]
    fn test_snapshot_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pre.json");
        let snapshot: CounterSnapshot = [("1", 100), ("2", 0)].into_iter().collect();
        write_json(&snapshot, Some(path.as_path())).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_load_aft_and_flows() {
        let dir = tempfile::tempdir().unwrap();
        let aft_path = dir.path().join("aft.json");
        std::fs::write(
            &aft_path,
            r#"{"next-hop-groups": [{"id": 10, "next-hops": [1, 2]}],
                "ipv4-entries": [{"prefix": "10.0.0.0/24", "next-hop-group": 10}]}"#,
        )
        .unwrap();
        let aft = load_aft(&aft_path).unwrap();
        assert_eq!(aft.next_hop_groups[0].next_hops, vec![1, 2]);
        assert!(aft.ipv6_entries.is_empty());

        let flows_path = dir.path().join("flows.json");
        std::fs::write(&flows_path, r#"{"v4": {"packet-count": 10}, "v6": {"packet-count": 5}}"#)
            .unwrap();
        let flows = load_flows(&flows_path).unwrap();
        assert_eq!(flows.len(), 2);
        assert_eq!(flows["v6"].packet_count, 5);
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            load_snapshot("/nonexistent/pre.json"),
            Err(AftCheckError::Io(_))
        ));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"1\": -5}").unwrap();
        assert!(matches!(load_snapshot(&path), Err(AftCheckError::Json(_))));
    }
}
