use thiserror::Error;

use crate::host::{HostHandle, HostSceneRef};

/// Errors produced while parsing or resolving a node path.
///
/// Resolution errors are expected during normal operation: they signal that
/// the addressed structure changed between encode and decode (drift), and the
/// caller should treat the reference as stale and skip or queue it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path string does not follow the `n[<name>]i[<index>]` format.
    #[error("malformed path token at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },

    /// A sibling index points past the current child count.
    #[error("sibling index {index} out of range (node has {child_count} children)")]
    IndexOutOfRange { index: usize, child_count: usize },

    /// The node found at the encoded index no longer carries the encoded
    /// name, i.e. the structure drifted since the path was captured.
    #[error("expected child '{expected}' at index {index}, found '{found}'")]
    NameMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    /// The target is not a descendant of the given ancestor.
    #[error("node is not below the given ancestor")]
    NotADescendant,
}

/// One level of a [`NodePath`]: the child's name and its sibling index at
/// capture time. The name is redundant with the index on purpose; resolution
/// cross-checks it to detect drift.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathStep {
    pub name: String,
    pub index: usize,
}

/// A host-relative address of a node below a bound ancestor, used only while
/// the node has no assigned id (e.g. children inside a not-yet-expanded
/// library-asset instance).
///
/// Wire format: `/n[<escaped-name>]i[<sibling-index>]` repeated per level,
/// top-down. Name escaping is reversible so that
/// `NodePath::parse(p.encode())` round-trips for any name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodePath {
    steps: Vec<PathStep>,
}

impl NodePath {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Encode the chain of `(name, sibling-index)` pairs from `ancestor`
    /// (exclusive) down to `target` (inclusive) by walking the host tree
    /// upwards.
    ///
    /// # Panics
    /// Panics if `target` is not below `ancestor`; callers obtain the
    /// ancestor from a bound-ancestor walk, so a miss is a contract
    /// violation.
    pub fn from_host(
        host: &dyn HostSceneRef,
        ancestor: &HostHandle,
        target: &HostHandle,
    ) -> Self {
        let mut steps = Vec::new();
        let mut current = *target;
        while current != *ancestor {
            steps.push(PathStep {
                name: host.name(&current),
                index: host.sibling_index(&current),
            });
            let Some(parent) = host.parent(&current) else {
                panic!("cannot create path: node is not below the given ancestor");
            };
            current = parent;
        }
        steps.reverse();
        Self { steps }
    }

    /// Re-walk the host tree from `ancestor` by sibling index, cross-checking
    /// each encoded name. Any mismatch means the structure drifted since the
    /// path was captured; the caller must treat the reference as stale.
    pub fn resolve(
        &self,
        host: &dyn HostSceneRef,
        ancestor: &HostHandle,
    ) -> Result<HostHandle, PathError> {
        let mut node = *ancestor;
        for step in &self.steps {
            let children = host.children(&node);
            if step.index >= children.len() {
                return Err(PathError::IndexOutOfRange {
                    index: step.index,
                    child_count: children.len(),
                });
            }
            let child = children[step.index];
            let found = host.name(&child);
            if found != step.name {
                return Err(PathError::NameMismatch {
                    index: step.index,
                    expected: step.name.clone(),
                    found,
                });
            }
            node = child;
        }
        Ok(node)
    }

    pub fn encode(&self) -> String {
        let mut result = String::new();
        for step in &self.steps {
            result.push_str("/n[");
            result.push_str(&escape_name(&step.name));
            result.push_str("]i[");
            result.push_str(&step.index.to_string());
            result.push(']');
        }
        result
    }

    pub fn parse(input: &str) -> Result<Self, PathError> {
        let mut steps = Vec::new();
        let mut rest = input;
        let mut offset = 0;

        while !rest.is_empty() {
            // Tolerate a missing leading slash on the first token.
            if let Some(stripped) = rest.strip_prefix('/') {
                rest = stripped;
                offset += 1;
            }
            let Some(stripped) = rest.strip_prefix("n[") else {
                return Err(PathError::Malformed {
                    offset,
                    reason: "expected 'n[' token",
                });
            };
            rest = stripped;
            offset += 2;

            let Some(name_end) = rest.find("]i[") else {
                return Err(PathError::Malformed {
                    offset,
                    reason: "missing ']i[' separator",
                });
            };
            let name = unescape_name(&rest[..name_end]).ok_or(PathError::Malformed {
                offset,
                reason: "invalid name escape sequence",
            })?;
            offset += name_end + 3;
            rest = &rest[name_end + 3..];

            let Some(index_end) = rest.find(']') else {
                return Err(PathError::Malformed {
                    offset,
                    reason: "missing index terminator",
                });
            };
            let index: usize = rest[..index_end].parse().map_err(|_| PathError::Malformed {
                offset,
                reason: "sibling index is not a number",
            })?;
            offset += index_end + 1;
            rest = &rest[index_end + 1..];

            steps.push(PathStep { name, index });
        }

        Ok(Self { steps })
    }
}

// Percent-style escaping; only the characters that collide with the token
// syntax need encoding.
fn escape_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' => result.push_str("%25"),
            '[' => result.push_str("%5b"),
            ']' => result.push_str("%5d"),
            '/' => result.push_str("%2f"),
            other => result.push(other),
        }
    }
    result
}

fn unescape_name(escaped: &str) -> Option<String> {
    let mut result = String::with_capacity(escaped.len());
    let bytes = escaped.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 3 > bytes.len() {
                return None;
            }
            let code = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            let value = u8::from_str_radix(code, 16).ok()?;
            result.push(value as char);
            i += 3;
        } else {
            let c = escaped[i..].chars().next()?;
            result.push(c);
            i += c.len_utf8();
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(steps: &[(&str, usize)]) -> NodePath {
        NodePath::new(
            steps
                .iter()
                .map(|(name, index)| PathStep {
                    name: name.to_string(),
                    index: *index,
                })
                .collect(),
        )
    }

    #[test]
    fn encode_produces_token_per_level() {
        let p = path(&[("Torso", 0), ("Arm", 2)]);
        assert_eq!(p.encode(), "/n[Torso]i[0]/n[Arm]i[2]");
    }

    #[test]
    fn parse_round_trips_plain_names() {
        let p = path(&[("Torso", 0), ("Arm", 2), ("Hand", 1)]);
        assert_eq!(NodePath::parse(&p.encode()).unwrap(), p);
    }

    #[test]
    fn parse_round_trips_hostile_names() {
        let p = path(&[("a]i[0]", 3), ("50% gray / dark", 0), ("n[x]", 7)]);
        assert_eq!(NodePath::parse(&p.encode()).unwrap(), p);
    }

    #[test]
    fn parse_empty_is_empty_path() {
        let p = NodePath::parse("").unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            NodePath::parse("bogus"),
            Err(PathError::Malformed { .. })
        ));
        assert!(matches!(
            NodePath::parse("/n[Leg]i[zero]"),
            Err(PathError::Malformed { .. })
        ));
        assert!(matches!(
            NodePath::parse("/n[Leg"),
            Err(PathError::Malformed { .. })
        ));
    }

    #[test]
    fn unescape_rejects_truncated_escape() {
        assert!(NodePath::parse("/n[half%2]i[0]").is_err());
    }
}
