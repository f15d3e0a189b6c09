//! Turns a variable-depth root-to-leaf path into a fixed-width row.
//!
//! Column naming is positional: index 0 of the path is the top category,
//! index `i` (for `0 < i < N-1`) is `subCategoryLevel{i}`, and the leaf
//! columns always carry the explicit leaf handed in by the caller.

use crate::error::MalformedPathError;
use crate::model::CatalogId;

pub const TOP_ID: &str = "topCategoryId";
pub const TOP_NAME: &str = "topCategoryName";
pub const LEAF_ID: &str = "leafCategoryId";
pub const LEAF_NAME: &str = "leafCategoryName";

pub fn sub_level_id_column(level: usize) -> String {
    format!("subCategoryLevel{level}Id")
}

pub fn sub_level_name_column(level: usize) -> String {
    format!("subCategoryLevel{level}Name")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub id: CatalogId,
    pub name: String,
}

impl Level {
    pub fn new(id: impl Into<CatalogId>, name: impl Into<String>) -> Self {
        Level {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One flattened leaf. `sub_levels[0]` is level 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRow {
    pub top: Level,
    pub sub_levels: Vec<Level>,
    pub leaf: Level,
}

/// Row identity across languages: every id on the path, top to leaf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HierarchyKey {
    pub top: CatalogId,
    pub sub_levels: Vec<CatalogId>,
    pub leaf: CatalogId,
}

impl CategoryRow {
    pub fn key(&self) -> HierarchyKey {
        HierarchyKey {
            top: self.top.id.clone(),
            sub_levels: self.sub_levels.iter().map(|l| l.id.clone()).collect(),
            leaf: self.leaf.id.clone(),
        }
    }

    pub fn depth(&self) -> usize {
        self.sub_levels.len()
    }

    /// The row as positional `(column, value)` pairs in output order.
    pub fn to_columns(&self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(4 + self.sub_levels.len() * 2);
        out.push((TOP_ID.to_string(), self.top.id.to_string()));
        out.push((TOP_NAME.to_string(), self.top.name.clone()));
        for (i, level) in self.sub_levels.iter().enumerate() {
            out.push((sub_level_id_column(i + 1), level.id.to_string()));
            out.push((sub_level_name_column(i + 1), level.name.clone()));
        }
        out.push((LEAF_ID.to_string(), self.leaf.id.to_string()));
        out.push((LEAF_NAME.to_string(), self.leaf.name.clone()));
        out
    }
}

/// Zips `id_path`/`name_path` into a [`CategoryRow`].
///
/// The last path entry occupies the leaf position and is replaced by
/// `leaf_id`/`leaf_name`; callers whose path stops at the parent must append
/// the leaf first.
pub fn format_path(
    id_path: &[CatalogId],
    name_path: &[String],
    leaf_id: &CatalogId,
    leaf_name: &str,
) -> Result<CategoryRow, MalformedPathError> {
    if id_path.len() != name_path.len() {
        return Err(MalformedPathError::LengthMismatch {
            ids: id_path.len(),
            names: name_path.len(),
        });
    }
    let n = id_path.len();
    if n == 0 {
        return Err(MalformedPathError::Empty);
    }

    let sub_levels = (1..n.saturating_sub(1))
        .map(|i| Level {
            id: id_path[i].clone(),
            name: name_path[i].clone(),
        })
        .collect();

    Ok(CategoryRow {
        top: Level {
            id: id_path[0].clone(),
            name: name_path[0].clone(),
        },
        sub_levels,
        leaf: Level {
            id: leaf_id.clone(),
            name: leaf_name.to_string(),
        },
    })
}
