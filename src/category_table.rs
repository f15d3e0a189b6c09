//! Per-language category tables and their outer join.
//!
//! Id columns are language-invariant and form the join key; name columns
//! are language-variant and get one column per language.

use std::collections::BTreeMap;

use ahash::AHashMap;
use tracing::debug;

use crate::model::{CatalogId, Language};
use crate::path_format::{
    sub_level_id_column, sub_level_name_column, CategoryRow, HierarchyKey, LEAF_ID, LEAF_NAME,
    TOP_ID, TOP_NAME,
};

/// The language-variant half of a [`CategoryRow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNames {
    pub top: String,
    pub sub_levels: Vec<String>,
    pub leaf: String,
}

impl From<&CategoryRow> for CategoryNames {
    fn from(row: &CategoryRow) -> Self {
        CategoryNames {
            top: row.top.name.clone(),
            sub_levels: row.sub_levels.iter().map(|l| l.name.clone()).collect(),
            leaf: row.leaf.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LanguageTable {
    language: Language,
    rows: AHashMap<HierarchyKey, CategoryNames>,
    duplicates: usize,
}

impl LanguageTable {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            rows: AHashMap::new(),
            duplicates: 0,
        }
    }

    /// Builds the table, keeping the first row seen for each hierarchy key.
    pub fn from_rows(language: Language, rows: impl IntoIterator<Item = CategoryRow>) -> Self {
        let mut table = Self::new(language);
        for row in rows {
            table.insert(&row);
        }
        if table.duplicates > 0 {
            debug!(
                language = %table.language,
                duplicates = table.duplicates,
                "collapsed duplicate hierarchy keys"
            );
        }
        table
    }

    pub fn insert(&mut self, row: &CategoryRow) {
        let key = row.key();
        if self.rows.contains_key(&key) {
            self.duplicates += 1;
            return;
        }
        self.rows.insert(key, CategoryNames::from(row));
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn get(&self, key: &HierarchyKey) -> Option<&CategoryNames> {
        self.rows.get(key)
    }

    pub fn max_sub_levels(&self) -> usize {
        self.rows.keys().map(|k| k.sub_levels.len()).max().unwrap_or(0)
    }

    /// Rows in key order.
    pub fn sorted(&self) -> Vec<(&HierarchyKey, &CategoryNames)> {
        let mut rows: Vec<_> = self.rows.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    /// Header of the single-language export: names suffixed, leaf columns last.
    pub fn header(&self) -> Vec<String> {
        let lang = &self.language;
        let mut header = vec![TOP_ID.to_string(), lang.suffixed(TOP_NAME)];
        for level in 1..=self.max_sub_levels() {
            header.push(sub_level_id_column(level));
            header.push(lang.suffixed(&sub_level_name_column(level)));
        }
        header.push(LEAF_ID.to_string());
        header.push(lang.suffixed(LEAF_NAME));
        header
    }

    pub fn records(&self) -> Vec<Vec<Option<String>>> {
        let width = self.max_sub_levels();
        self.sorted()
            .into_iter()
            .map(|(key, names)| {
                let mut record = vec![Some(key.top.to_string()), Some(names.top.clone())];
                for level in 0..width {
                    record.push(key.sub_levels.get(level).map(CatalogId::to_string));
                    record.push(names.sub_levels.get(level).cloned());
                }
                record.push(Some(key.leaf.to_string()));
                record.push(Some(names.leaf.clone()));
                record
            })
            .collect()
    }
}

/// Outer join of any number of [`LanguageTable`]s on the hierarchy key.
///
/// `names[i]` belongs to `languages[i]`; `None` means that language never
/// produced a leaf with this exact id path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnifiedCategoryTable {
    languages: Vec<Language>,
    rows: BTreeMap<HierarchyKey, Vec<Option<CategoryNames>>>,
}

impl UnifiedCategoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty table that already carries a column group for every language.
    pub fn with_languages(languages: impl IntoIterator<Item = Language>) -> Self {
        let mut table = Self::new();
        for language in languages {
            table.language_slot(&language);
        }
        table
    }

    pub fn from_language_tables(tables: impl IntoIterator<Item = LanguageTable>) -> Self {
        let mut unified = Self::new();
        for table in tables {
            unified.outer_join(table);
        }
        unified
    }

    fn language_slot(&mut self, language: &Language) -> usize {
        if let Some(slot) = self.languages.iter().position(|l| l == language) {
            return slot;
        }
        self.languages.push(language.clone());
        for names in self.rows.values_mut() {
            names.push(None);
        }
        self.languages.len() - 1
    }

    /// Folds one language into the table.
    ///
    /// Joining a language that is already present fills its empty cells
    /// instead of adding a second column group.
    pub fn outer_join(&mut self, table: LanguageTable) {
        let slot = self.language_slot(&table.language);
        let width = self.languages.len();
        for (key, names) in table.rows {
            let cells = self.rows.entry(key).or_insert_with(|| vec![None; width]);
            if cells[slot].is_none() {
                cells[slot] = Some(names);
            }
        }
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn names(&self, key: &HierarchyKey, language: &Language) -> Option<&CategoryNames> {
        let slot = self.languages.iter().position(|l| l == language)?;
        self.rows.get(key)?.get(slot)?.as_ref()
    }

    pub fn keys(&self) -> impl Iterator<Item = &HierarchyKey> {
        self.rows.keys()
    }

    pub fn max_sub_levels(&self) -> usize {
        self.rows.keys().map(|k| k.sub_levels.len()).max().unwrap_or(0)
    }

    /// Unique leaf ids in ascending order.
    pub fn leaf_ids(&self) -> Vec<CatalogId> {
        let mut ids: Vec<CatalogId> = self.rows.keys().map(|k| k.leaf.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Top id, top names; each sub-level id, its names; leaf id, leaf names.
    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::new();
        self.push_group(&mut header, TOP_ID.to_string(), TOP_NAME);
        for level in 1..=self.max_sub_levels() {
            self.push_group(&mut header, sub_level_id_column(level), &sub_level_name_column(level));
        }
        self.push_group(&mut header, LEAF_ID.to_string(), LEAF_NAME);
        header
    }

    fn push_group(&self, header: &mut Vec<String>, id_column: String, name_column: &str) {
        header.push(id_column);
        header.extend(self.languages.iter().map(|l| l.suffixed(name_column)));
    }

    pub fn records(&self) -> Vec<Vec<Option<String>>> {
        let width = self.max_sub_levels();
        self.rows
            .iter()
            .map(|(key, cells)| {
                let mut record = Vec::with_capacity((width + 2) * (self.languages.len() + 1));
                record.push(Some(key.top.to_string()));
                record.extend(cells.iter().map(|c| c.as_ref().map(|n| n.top.clone())));
                for level in 0..width {
                    record.push(key.sub_levels.get(level).map(CatalogId::to_string));
                    record.extend(
                        cells
                            .iter()
                            .map(|c| c.as_ref().and_then(|n| n.sub_levels.get(level).cloned())),
                    );
                }
                record.push(Some(key.leaf.to_string()));
                record.extend(cells.iter().map(|c| c.as_ref().map(|n| n.leaf.clone())));
                record
            })
            .collect()
    }
}
