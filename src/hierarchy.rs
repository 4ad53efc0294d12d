//! Dotted hierarchy-number addressing for the task outline.
//!
//! A hierarchy number is a dot-separated path of positive integers
//! (`"3"`, `"3.2"`, `"3.2.1"`) encoding both depth and sibling order.
//! Comparison is numeric per segment, never lexicographic, so `"10"`
//! sorts after `"9"` and a parent sorts before its children.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Parse failure for a hierarchy-number string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a dotted sequence of positive integers: {0:?}")]
pub struct ParseHierarchyError(pub String);

/// Outline address such as `2.3.1`.
///
/// Derived ordering compares the segment vectors element-wise, which is
/// exactly the outline display order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HierarchyNumber {
    segments: Vec<u32>,
}

impl HierarchyNumber {
    /// Build from raw segments. Every segment must be >= 1.
    pub fn new(segments: Vec<u32>) -> Result<Self, ParseHierarchyError> {
        if segments.is_empty() || segments.iter().any(|s| *s == 0) {
            let joined = segments
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(".");
            return Err(ParseHierarchyError(joined));
        }
        Ok(Self { segments })
    }

    /// A depth-1 (root) number.
    pub fn root(n: u32) -> Self {
        Self { segments: vec![n.max(1)] }
    }

    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Zero-based nesting level: root numbers are level 0.
    pub fn level(&self) -> usize {
        self.segments.len() - 1
    }

    /// One-based depth: root numbers are depth 1.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The sibling-order segment (last in the path).
    pub fn last(&self) -> u32 {
        *self.segments.last().expect("segments are nonempty")
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// The owning number, or `None` for root numbers.
    pub fn parent(&self) -> Option<HierarchyNumber> {
        if self.is_root() {
            return None;
        }
        Some(HierarchyNumber {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Ancestor chain, nearest first, excluding `self`.
    pub fn ancestors(&self) -> Vec<HierarchyNumber> {
        let mut chain = Vec::with_capacity(self.level());
        let mut current = self.parent();
        while let Some(number) = current {
            current = number.parent();
            chain.push(number);
        }
        chain
    }

    /// The `n`-th child of this number.
    pub fn child(&self, n: u32) -> HierarchyNumber {
        let mut segments = self.segments.clone();
        segments.push(n.max(1));
        HierarchyNumber { segments }
    }

    /// Same parent, different sibling-order segment.
    pub fn with_last(&self, n: u32) -> HierarchyNumber {
        let mut segments = self.segments.clone();
        *segments.last_mut().expect("segments are nonempty") = n.max(1);
        HierarchyNumber { segments }
    }

    /// True iff `self` sits strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &HierarchyNumber) -> bool {
        self.segments.len() > ancestor.segments.len()
            && self.segments[..ancestor.segments.len()] == ancestor.segments[..]
    }

    /// Same depth and same parent. A number is its own sibling.
    pub fn is_sibling_of(&self, other: &HierarchyNumber) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments[..self.segments.len() - 1]
                == other.segments[..other.segments.len() - 1]
    }

    /// Rewrite the `old` ancestor prefix to `new`.
    ///
    /// Caller guarantees `self` equals `old` or descends from it; any
    /// other input is returned unchanged.
    pub fn reprefixed(&self, old: &HierarchyNumber, new: &HierarchyNumber) -> HierarchyNumber {
        if self == old {
            return new.clone();
        }
        if !self.is_descendant_of(old) {
            return self.clone();
        }
        let mut segments = new.segments.clone();
        segments.extend_from_slice(&self.segments[old.segments.len()..]);
        HierarchyNumber { segments }
    }
}

impl fmt::Display for HierarchyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for HierarchyNumber {
    type Err = ParseHierarchyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        for part in raw.split('.') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseHierarchyError(raw.to_string()));
            }
            let value: u32 = part
                .parse()
                .map_err(|_| ParseHierarchyError(raw.to_string()))?;
            if value == 0 {
                return Err(ParseHierarchyError(raw.to_string()));
            }
            segments.push(value);
        }
        if segments.is_empty() {
            return Err(ParseHierarchyError(raw.to_string()));
        }
        Ok(Self { segments })
    }
}

impl Serialize for HierarchyNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HierarchyNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(raw: &str) -> HierarchyNumber {
        raw.parse().expect("valid number")
    }

    #[test]
    fn parses_and_displays_round_trip() {
        for raw in ["1", "3.2", "2.3.1", "10.11.12"] {
            assert_eq!(h(raw).to_string(), raw);
        }
    }

    #[test]
    fn rejects_malformed_input() {
        for raw in ["", ".", "1.", ".2", "0", "1.0", "a.b", "1.-2", "+3", "1..2"] {
            assert!(raw.parse::<HierarchyNumber>().is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn ordering_is_numeric_not_lexicographic() {
        assert!(h("9") < h("10"));
        assert!(h("2.9") < h("2.10"));
        assert!(h("1.2") < h("1.2.1"));
        assert!(h("1.2.1") < h("1.3"));
    }

    #[test]
    fn levels_and_parents() {
        assert_eq!(h("3").level(), 0);
        assert_eq!(h("3.2.1").level(), 2);
        assert_eq!(h("3").parent(), None);
        assert_eq!(h("3.2.1").parent(), Some(h("3.2")));
        assert_eq!(h("3.2.1").ancestors(), vec![h("3.2"), h("3")]);
    }

    #[test]
    fn descendant_and_sibling_relations() {
        assert!(h("1.2.3").is_descendant_of(&h("1.2")));
        assert!(h("1.2.3").is_descendant_of(&h("1")));
        assert!(!h("1.2").is_descendant_of(&h("1.2")));
        assert!(!h("12.1").is_descendant_of(&h("1")));
        assert!(h("1.2").is_sibling_of(&h("1.5")));
        assert!(!h("1.2").is_sibling_of(&h("2.2")));
        assert!(!h("1").is_sibling_of(&h("1.1")));
        assert!(h("4").is_sibling_of(&h("7")));
    }

    #[test]
    fn reprefix_rewrites_subtree_numbers() {
        assert_eq!(h("1.2").reprefixed(&h("1.2"), &h("3")), h("3"));
        assert_eq!(h("1.2.4.1").reprefixed(&h("1.2"), &h("2.1")), h("2.1.4.1"));
        // unrelated numbers are untouched
        assert_eq!(h("5.1").reprefixed(&h("1.2"), &h("3")), h("5.1"));
    }

    #[test]
    fn serde_uses_the_dotted_string_form() {
        let number = h("2.3.1");
        let json = serde_json::to_string(&number).unwrap();
        assert_eq!(json, "\"2.3.1\"");
        let back: HierarchyNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, number);
    }
}
