use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Whether a resource (or a rule evaluation) concerns a whole study or one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Study,
    Instance,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Study => write!(f, "study"),
            Self::Instance => write!(f, "instance"),
        }
    }
}

/// Opaque archive identifier plus its granularity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: String,
    pub granularity: Granularity,
}

impl ResourceRef {
    pub fn study(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            granularity: Granularity::Study,
        }
    }

    pub fn instance(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            granularity: Granularity::Instance,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.granularity, self.id)
    }
}

/// Flattened metadata of one resource
///
/// Keys and values are kept exactly as received. Lookups try the exact key
/// first and fall back to a case-insensitive match; a missing field reads as
/// the empty string. When several keys differ only in case, the fallback
/// resolves to the lexicographically smallest of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct TagMap {
    fields: BTreeMap<String, String>,
    /// Lowercased key to the stored key the fallback resolves to
    folded: HashMap<String, String>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        self.folded
            .entry(field.to_ascii_lowercase())
            .and_modify(|stored| {
                if field < *stored {
                    *stored = field.clone();
                }
            })
            .or_insert_with(|| field.clone());
        self.fields.insert(field, value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    /// Value of `field`, or `None` when absent
    pub fn lookup(&self, field: &str) -> Option<&str> {
        if let Some(value) = self.fields.get(field) {
            return Some(value.as_str());
        }
        self.folded
            .get(&field.to_ascii_lowercase())
            .and_then(|stored| self.fields.get(stored))
            .map(String::as_str)
    }

    /// Value of `field`, or `""` when absent
    pub fn get(&self, field: &str) -> &str {
        self.lookup(field).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for TagMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Self::new();
        for (field, value) in iter {
            tags.insert(field, value);
        }
        tags
    }
}

impl From<BTreeMap<String, String>> for TagMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<HashMap<String, String>> for TagMap {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<TagMap> for BTreeMap<String, String> {
    fn from(tags: TagMap) -> Self {
        tags.fields
    }
}

/// Handle returned by the transport for a queued send
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_lookup_preserves_case_and_falls_back() {
        let tags = TagMap::new().with("StudyDescription", "Bone Length Study");

        assert_eq!(tags.get("StudyDescription"), "Bone Length Study");
        assert_eq!(tags.get("studydescription"), "Bone Length Study");
        assert_eq!(tags.get("SeriesDescription"), "");
        assert!(tags.lookup("SeriesDescription").is_none());
    }

    #[test]
    fn test_case_colliding_keys_resolve_deterministically() {
        let forward = TagMap::new().with("ROWS", "1024").with("Rows", "512");
        let reverse = TagMap::new().with("Rows", "512").with("ROWS", "1024");

        // "ROWS" sorts before "Rows"
        assert_eq!(forward.get("rows"), "1024");
        assert_eq!(reverse.get("rows"), "1024");
        assert_eq!(forward, reverse);

        // exact matches still win
        assert_eq!(forward.get("Rows"), "512");

        let parsed: TagMap =
            serde_json::from_str(r#"{"Rows": "512", "ROWS": "1024"}"#).unwrap();
        assert_eq!(parsed.get("rows"), "1024");
    }

    #[test]
    fn test_tag_map_serializes_as_flat_object() {
        let tags = TagMap::new().with("Rows", "512").with("Columns", "256");
        assert_eq!(
            serde_json::to_string(&tags).unwrap(),
            r#"{"Columns":"256","Rows":"512"}"#
        );
    }

    #[test]
    fn test_tag_map_deserializes_from_flat_json() {
        let tags: TagMap =
            serde_json::from_str(r#"{"Rows": "512", "Columns": "512"}"#).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get("Rows"), "512");
    }

    #[test]
    fn test_resource_ref_display() {
        assert_eq!(ResourceRef::study("abc").to_string(), "study:abc");
        assert_eq!(ResourceRef::instance("x1").to_string(), "instance:x1");
    }
}
