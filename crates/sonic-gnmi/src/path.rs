//! Textual gNMI paths.
//!
//! Converts between the `/elem/elem[key=value]/elem` form used in configs
//! and logs and the structured [`Path`] message. Key values may contain `/`
//! (route prefixes do), so splitting tracks bracket nesting.

use crate::error::{GnmiError, Result};
use crate::proto::{Path, PathElem};
use std::fmt;

/// Wildcard matching any key value or element.
pub const WILDCARD: &str = "*";

/// Parses a textual path into a structured path.
///
/// An optional `origin:` prefix before the first `/` sets [`Path::origin`].
pub fn parse_path(text: &str) -> Result<Path> {
    let trimmed = text.trim();
    let (origin, body) = match trimmed.split_once(":/") {
        Some((origin, rest)) if !origin.contains('/') && !origin.contains('[') => {
            (origin.to_string(), rest)
        }
        _ => (String::new(), trimmed.trim_start_matches('/')),
    };

    let mut elem = Vec::new();
    for segment in split_segments(text, body)? {
        if segment.is_empty() {
            continue;
        }
        elem.push(parse_elem(text, &segment)?);
    }

    Ok(Path {
        origin,
        elem,
        target: String::new(),
    })
}

/// Splits on `/` outside of brackets.
fn split_segments(full: &str, body: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_key = false;

    for c in body.chars() {
        match c {
            '[' if !in_key => {
                in_key = true;
                current.push(c);
            }
            ']' if in_key => {
                in_key = false;
                current.push(c);
            }
            '/' if !in_key => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_key {
        return Err(GnmiError::invalid_path(full, "unterminated key"));
    }
    segments.push(current);
    Ok(segments)
}

fn parse_elem(full: &str, segment: &str) -> Result<PathElem> {
    let (name, mut rest) = match segment.find('[') {
        Some(pos) => (&segment[..pos], &segment[pos..]),
        None => (segment, ""),
    };
    if name.is_empty() {
        return Err(GnmiError::invalid_path(full, "empty element name"));
    }

    let mut elem = PathElem::new(name);
    while !rest.is_empty() {
        let Some(inner) = rest.strip_prefix('[') else {
            return Err(GnmiError::invalid_path(full, "text after key"));
        };
        let Some(end) = inner.find(']') else {
            return Err(GnmiError::invalid_path(full, "unterminated key"));
        };
        let Some((k, v)) = inner[..end].split_once('=') else {
            return Err(GnmiError::invalid_path(full, "key without '='"));
        };
        if k.is_empty() {
            return Err(GnmiError::invalid_path(full, "empty key name"));
        }
        elem = elem.with_key(k, v);
        rest = &inner[end + 1..];
    }
    Ok(elem)
}

/// Display adapter printing a path in textual form with sorted keys.
pub struct PathDisplay<'a>(pub &'a Path);

impl fmt::Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.0.origin.is_empty() {
            write!(f, "{}:", self.0.origin)?;
        }
        if self.0.elem.is_empty() {
            return write!(f, "/");
        }
        for elem in &self.0.elem {
            write!(f, "/{}", elem.name)?;
            let mut keys: Vec<_> = elem.key.iter().collect();
            keys.sort();
            for (k, v) in keys {
                write!(f, "[{}={}]", k, v)?;
            }
        }
        Ok(())
    }
}

impl Path {
    /// Returns a display adapter for this path.
    pub fn display(&self) -> PathDisplay<'_> {
        PathDisplay(self)
    }

    /// Concatenates a notification prefix and an update path.
    pub fn join(prefix: Option<&Path>, path: Option<&Path>) -> Path {
        let mut joined = prefix.cloned().unwrap_or_default();
        if let Some(path) = path {
            joined.elem.extend(path.elem.iter().cloned());
            if joined.origin.is_empty() {
                joined.origin = path.origin.clone();
            }
        }
        joined
    }

    /// Finds the first element with the given name.
    pub fn find_elem(&self, name: &str) -> Option<(usize, &PathElem)> {
        self.elem.iter().enumerate().find(|(_, e)| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_simple_path() {
        let path = parse_path("/interfaces/interface[name=Ethernet0]/state").unwrap();
        assert_eq!(path.elem.len(), 3);
        assert_eq!(path.elem[1].name, "interface");
        assert_eq!(path.elem[1].key.get("name").map(String::as_str), Some("Ethernet0"));
        assert!(path.origin.is_empty());
    }

    #[test]
    fn test_parse_key_with_slash() {
        let path = parse_path(
            "/network-instances/network-instance[name=DEFAULT]/afts/ipv4-unicast/ipv4-entry[prefix=10.0.0.0/24]",
        )
        .unwrap();
        assert_eq!(path.elem.len(), 5);
        assert_eq!(
            path.elem[4].key.get("prefix").map(String::as_str),
            Some("10.0.0.0/24")
        );
    }

    #[test]
    fn test_parse_origin_and_multiple_keys() {
        let path = parse_path("openconfig:/a[x=1][y=2]/b").unwrap();
        assert_eq!(path.origin, "openconfig");
        assert_eq!(path.elem[0].key.len(), 2);
        assert_eq!(path.display().to_string(), "openconfig:/a[x=1][y=2]/b");
    }

    #[test]
    fn test_display_round_trip() {
        let text = "/network-instances/network-instance[name=*]/afts/next-hops/next-hop[index=*]/state/counters/packets-forwarded";
        assert_eq!(parse_path(text).unwrap().display().to_string(), text);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_path("/a[b=1").is_err());
        assert!(parse_path("/a[b]").is_err());
        assert!(parse_path("/[b=1]").is_err());
        assert!(parse_path("/a[b=1]x").is_err());
    }

    #[test]
    fn test_join_prefix_and_path() {
        let prefix = parse_path("/network-instances/network-instance[name=DEFAULT]").unwrap();
        let path = parse_path("/afts/next-hops/next-hop[index=5]").unwrap();
        let joined = Path::join(Some(&prefix), Some(&path));
        assert_eq!(joined.elem.len(), 5);
        let (pos, elem) = joined.find_elem("next-hop").unwrap();
        assert_eq!(pos, 4);
        assert_eq!(elem.key.get("index").map(String::as_str), Some("5"));
    }
}
