use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque id token issued by the catalog API.
///
/// The API hands ids out either as JSON strings or as integers, so both are
/// accepted and kept in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CatalogId(String);

impl CatalogId {
    pub fn new(id: impl Into<String>) -> Self {
        CatalogId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

// Numeric ids sort numerically and before any non-numeric id.
impl Ord for CatalogId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for CatalogId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CatalogId {
    fn from(id: &str) -> Self {
        CatalogId(id.to_string())
    }
}

impl From<u64> for CatalogId {
    fn from(id: u64) -> Self {
        CatalogId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for CatalogId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => CatalogId(s),
            RawId::Number(n) => CatalogId(n.to_string()),
        })
    }
}

/// Language tag passed through to the API (`en`, `de`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(String);

impl Language {
    pub fn new(tag: impl Into<String>) -> Self {
        Language(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `name` with this language appended, e.g. `leafCategoryName_de`.
    pub fn suffixed(&self, name: &str) -> String {
        format!("{}_{}", name, self.0)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Language {
    fn from(tag: &str) -> Self {
        Language(tag.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCategory {
    pub category_id: CatalogId,
    #[serde(default)]
    pub category_name: String,
}

/// One child returned by `listSubCategories`.
///
/// The id/name paths are only populated on leaves. A missing key stays
/// `None` so it can be told apart from an empty path.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    pub category_id: CatalogId,
    pub category_name: String,
    pub leaf_category: bool,
    #[serde(default)]
    pub category_id_path: Option<Vec<CatalogId>>,
    #[serde(default)]
    pub category_name_path: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDef {
    pub property_id: CatalogId,
    #[serde(default)]
    pub property_text: String,
    #[serde(default)]
    pub show_type: Option<String>,
    #[serde(default)]
    pub sale_prop: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub input_prop: bool,
    #[serde(default)]
    pub has_unit: bool,
    #[serde(default)]
    pub enum_prop: bool,
    #[serde(default)]
    pub property_values: Option<Vec<PropertyValue>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValue {
    pub value_id: CatalogId,
    #[serde(default)]
    pub value_text: Option<String>,
    #[serde(default)]
    pub category_id: Option<CatalogId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_strings_and_numbers() {
        let ids: Vec<CatalogId> = serde_json::from_str(r#"["100003", 201, "abc"]"#).unwrap();
        assert_eq!(ids, vec!["100003".into(), "201".into(), "abc".into()]);
    }

    #[test]
    fn numeric_ids_sort_numerically_before_text() {
        let mut ids: Vec<CatalogId> = vec!["10".into(), "b".into(), "9".into(), "a1".into(), "100".into()];
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(CatalogId::as_str).collect();
        assert_eq!(sorted, vec!["9", "10", "100", "a1", "b"]);
    }

    #[test]
    fn leading_zeros_do_not_collapse_ids() {
        let a = CatalogId::from("7");
        let b = CatalogId::from("07");
        assert_ne!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn missing_node_paths_are_none() {
        let node: CategoryNode = serde_json::from_str(
            r#"{"categoryId": 5, "categoryName": "Tools", "leafCategory": false}"#,
        )
        .unwrap();
        assert!(node.category_id_path.is_none());
        assert!(node.category_name_path.is_none());
        assert!(!node.leaf_category);
    }

    #[test]
    fn one_missing_path_key_is_kept_apart() {
        let node: CategoryNode = serde_json::from_str(
            r#"{"categoryId": 200, "categoryName": "Saws", "leafCategory": true, "categoryIdPath": [1, 10, 200]}"#,
        )
        .unwrap();
        assert_eq!(node.category_id_path.as_ref().map(Vec::len), Some(3));
        assert!(node.category_name_path.is_none());
    }
}
