use log::debug;
use serde::{Deserialize, Serialize};

/// Heuristic narrowing of which dictionary entries are candidates for a
/// given asset path. The `key` names the pack-specific helper that produced
/// the hint; the `path` is the directory fragment the helper recognizes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginHint {
    pub key: String,
    pub path: String,
}

/// One shared dictionary entry mapping an opaque id to a library-asset
/// location. Entries are produced by the identification resolver and shared
/// between all participants of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryItem {
    pub id: String,
    pub path: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginHint>,
}

/// The session-wide asset dictionary. Append-only while a session runs; a
/// full-sync replaces it wholesale.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDictionary {
    pub items: Vec<DictionaryItem>,
}

impl AssetDictionary {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Resolve an asset reference to a dictionary entry.
    ///
    /// Two passes in priority order: first any entry whose origin-hint path
    /// is contained in the queried path, then any entry with an exact path
    /// match. The first hit wins; ambiguity is resolved by item order, not
    /// uniqueness. (Known sharp edge: overlapping hints can select an
    /// unintended entry; the priority order is kept as-is.)
    pub fn resolve(&self, path: &str, name: &str) -> Option<&DictionaryItem> {
        debug!("resolving dictionary entry for path={path}, name={name}");

        for item in &self.items {
            if let Some(origin) = &item.origin {
                if path.contains(&origin.path) {
                    return Some(item);
                }
            }
        }

        for item in &self.items {
            if item.path == path {
                return Some(item);
            }
        }

        None
    }

    pub fn get(&self, id: &str) -> Option<&DictionaryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn add(&mut self, item: DictionaryItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, path: &str, origin_path: Option<&str>) -> DictionaryItem {
        DictionaryItem {
            id: id.to_string(),
            path: path.to_string(),
            name: "name".to_string(),
            origin: origin_path.map(|p| OriginHint {
                key: "packs/example".to_string(),
                path: p.to_string(),
            }),
        }
    }

    #[test]
    fn resolve_prefers_origin_hint_over_exact_path() {
        let mut dict = AssetDictionary::new();
        dict.add(item("exact", "Assets/Packs/Town/House.fbx", None));
        dict.add(item("hinted", "other", Some("Packs/Town")));

        let found = dict.resolve("Assets/Packs/Town/House.fbx", "House").unwrap();
        assert_eq!(found.id, "hinted");
    }

    #[test]
    fn resolve_falls_back_to_exact_path() {
        let mut dict = AssetDictionary::new();
        dict.add(item("a", "Assets/A.fbx", Some("Packs/Elsewhere")));
        dict.add(item("b", "Assets/B.fbx", None));

        let found = dict.resolve("Assets/B.fbx", "B").unwrap();
        assert_eq!(found.id, "b");
    }

    #[test]
    fn resolve_returns_first_match_in_item_order() {
        let mut dict = AssetDictionary::new();
        dict.add(item("first", "x", Some("Packs/Town")));
        dict.add(item("second", "y", Some("Packs/Town/Houses")));

        let found = dict
            .resolve("Assets/Packs/Town/Houses/House.fbx", "House")
            .unwrap();
        assert_eq!(found.id, "first");
    }

    #[test]
    fn resolve_misses_unknown_path() {
        let dict = AssetDictionary::new();
        assert!(dict.resolve("Assets/Unknown.fbx", "Unknown").is_none());
    }
}
