//! Property/value schema flattening and its cross-language reconciliation.

use std::collections::BTreeMap;
use std::fmt;

use ahash::AHashMap;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::api::CatalogApi;
use crate::error::FetchError;
use crate::model::{CatalogId, Language, PropertyDef};

pub const PROPERTY_COLUMNS: [&str; 9] = [
    "categoryId",
    "valueId",
    "propertyId",
    "saleProp",
    "required",
    "inputProp",
    "enumProp",
    "hasUnit",
    "showType",
];
pub const PROPERTY_TEXT: &str = "propertyText";
pub const VALUE_TEXT: &str = "valueText";
pub const VALUE_ID: &str = "valueId";

/// Language-invariant attributes of a property.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertyFlags {
    pub sale_prop: bool,
    pub required: bool,
    pub input_prop: bool,
    pub enum_prop: bool,
    pub has_unit: bool,
    pub show_type: Option<String>,
}

impl From<&PropertyDef> for PropertyFlags {
    fn from(def: &PropertyDef) -> Self {
        PropertyFlags {
            sale_prop: def.sale_prop,
            required: def.required,
            input_prop: def.input_prop,
            enum_prop: def.enum_prop,
            has_unit: def.has_unit,
            show_type: def.show_type.clone(),
        }
    }
}

impl PropertyFlags {
    /// `(field, ours, theirs)` for every field where `other` disagrees.
    fn diff(&self, other: &PropertyFlags) -> Vec<(&'static str, String, String)> {
        let mut out = Vec::new();
        let bools = [
            ("saleProp", self.sale_prop, other.sale_prop),
            ("required", self.required, other.required),
            ("inputProp", self.input_prop, other.input_prop),
            ("enumProp", self.enum_prop, other.enum_prop),
            ("hasUnit", self.has_unit, other.has_unit),
        ];
        for (field, a, b) in bools {
            if a != b {
                out.push((field, a.to_string(), b.to_string()));
            }
        }
        if self.show_type != other.show_type {
            out.push((
                "showType",
                self.show_type.clone().unwrap_or_default(),
                other.show_type.clone().unwrap_or_default(),
            ));
        }
        out
    }
}

/// One (category, property, value) tuple; `value_*` are `None` for
/// properties without enumerated values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    pub category_id: CatalogId,
    pub property_id: CatalogId,
    pub value_id: Option<CatalogId>,
    pub property_text: String,
    pub value_text: Option<String>,
    pub flags: PropertyFlags,
}

impl PropertyRecord {
    pub fn key(&self) -> PropertyKey {
        PropertyKey {
            category_id: self.category_id.clone(),
            value_id: self.value_id.clone(),
            property_id: self.property_id.clone(),
        }
    }
}

/// Join key of the property table, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyKey {
    pub category_id: CatalogId,
    pub value_id: Option<CatalogId>,
    pub property_id: CatalogId,
}

/// Flattens the schema of one category: one record per enumerated value,
/// or a single value-less record when the property enumerates nothing.
pub fn flatten_properties(category_id: &CatalogId, defs: &[PropertyDef]) -> Vec<PropertyRecord> {
    let mut out = Vec::new();
    for def in defs {
        let flags = PropertyFlags::from(def);
        match def.property_values.as_deref() {
            Some(values) if !values.is_empty() => {
                for value in values {
                    out.push(PropertyRecord {
                        category_id: category_id.clone(),
                        property_id: def.property_id.clone(),
                        value_id: Some(value.value_id.clone()),
                        property_text: def.property_text.clone(),
                        value_text: value.value_text.clone(),
                        flags: flags.clone(),
                    });
                }
            }
            _ => out.push(PropertyRecord {
                category_id: category_id.clone(),
                property_id: def.property_id.clone(),
                value_id: None,
                property_text: def.property_text.clone(),
                value_text: None,
                flags,
            }),
        }
    }
    out
}

/// Fetches and flattens the property schema of every category in one language.
///
/// A non-success status skips that category. Transport and decode errors
/// abort the whole attempt so the caller can retry the language.
pub fn fetch_language_properties<A: CatalogApi + ?Sized>(
    api: &A,
    language: &Language,
    category_ids: &[CatalogId],
) -> Result<Vec<PropertyRecord>, FetchError> {
    let per_category: Vec<Vec<PropertyRecord>> = category_ids
        .par_iter()
        .map(|category_id| {
            debug!(%language, %category_id, "fetching properties");
            match api.list_properties(language, category_id) {
                Ok(defs) => Ok(flatten_properties(category_id, &defs)),
                Err(err) if err.aborts_attempt() => Err(err),
                Err(err) => {
                    warn!(%language, %category_id, error = %err, "failed to fetch properties");
                    Ok(Vec::new())
                }
            }
        })
        .collect::<Result<_, _>>()?;
    Ok(per_category.into_iter().flatten().collect())
}

/// Synthetic rows standing in for a language that returned nothing.
pub fn placeholder_records(language: &Language, category_ids: &[CatalogId]) -> Vec<PropertyRecord> {
    category_ids
        .iter()
        .map(|category_id| PropertyRecord {
            category_id: category_id.clone(),
            property_id: CatalogId::new(""),
            value_id: None,
            property_text: format!("Placeholder for Category {category_id} in {language}"),
            value_text: None,
            flags: PropertyFlags::default(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTexts {
    pub property_text: String,
    pub value_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LanguagePropertyTable {
    language: Language,
    rows: AHashMap<PropertyKey, (PropertyFlags, PropertyTexts)>,
}

impl LanguagePropertyTable {
    pub fn from_records(language: Language, records: impl IntoIterator<Item = PropertyRecord>) -> Self {
        let mut rows = AHashMap::new();
        for record in records {
            rows.entry(record.key()).or_insert_with(|| {
                (
                    record.flags,
                    PropertyTexts {
                        property_text: record.property_text,
                        value_text: record.value_text,
                    },
                )
            });
        }
        Self { language, rows }
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
}

/// Flag disagreement between two languages for the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagConflict {
    pub key: PropertyKey,
    pub field: &'static str,
    pub first: String,
    pub first_language: Language,
    pub other: String,
    pub other_language: Language,
}

impl fmt::Display for FlagConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "category {} property {} value {}: {} is {} in {} but {} in {}",
            self.key.category_id,
            self.key.property_id,
            self.key.value_id.as_ref().map(CatalogId::as_str).unwrap_or("-"),
            self.field,
            self.first,
            self.first_language,
            self.other,
            self.other_language
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedPropertyRow {
    pub flags: PropertyFlags,
    /// Language that supplied `flags`.
    pub flags_from: Language,
    pub texts: Vec<Option<PropertyTexts>>,
}

/// Outer join of per-language property tables on (categoryId, valueId, propertyId).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnifiedPropertyTable {
    languages: Vec<Language>,
    rows: BTreeMap<PropertyKey, UnifiedPropertyRow>,
    conflicts: Vec<FlagConflict>,
}

impl UnifiedPropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_languages(languages: impl IntoIterator<Item = Language>) -> Self {
        let mut table = Self::new();
        for language in languages {
            table.language_slot(&language);
        }
        table
    }

    pub fn from_language_tables(tables: impl IntoIterator<Item = LanguagePropertyTable>) -> Self {
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
        for row in self.rows.values_mut() {
            row.texts.push(None);
        }
        self.languages.len() - 1
    }

    /// Folds one language in. Flags keep their first-seen value; any
    /// disagreement is recorded as a [`FlagConflict`].
    pub fn outer_join(&mut self, table: LanguagePropertyTable) {
        let slot = self.language_slot(&table.language);
        let width = self.languages.len();
        let language = table.language;

        let mut entries: Vec<_> = table.rows.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, (flags, texts)) in entries {
            match self.rows.get_mut(&key) {
                Some(row) => {
                    for (field, first, other) in row.flags.diff(&flags) {
                        let conflict = FlagConflict {
                            key: key.clone(),
                            field,
                            first,
                            first_language: row.flags_from.clone(),
                            other,
                            other_language: language.clone(),
                        };
                        warn!(%conflict, "property flag conflict");
                        self.conflicts.push(conflict);
                    }
                    if row.texts[slot].is_none() {
                        row.texts[slot] = Some(texts);
                    }
                }
                None => {
                    let mut cells = vec![None; width];
                    cells[slot] = Some(texts);
                    self.rows.insert(
                        key,
                        UnifiedPropertyRow {
                            flags,
                            flags_from: language.clone(),
                            texts: cells,
                        },
                    );
                }
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

    pub fn conflicts(&self) -> &[FlagConflict] {
        &self.conflicts
    }

    pub fn get(&self, key: &PropertyKey) -> Option<&UnifiedPropertyRow> {
        self.rows.get(key)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&PropertyKey, &UnifiedPropertyRow)> {
        self.rows.iter()
    }

    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = PROPERTY_COLUMNS.iter().map(|c| c.to_string()).collect();
        for language in &self.languages {
            header.push(language.suffixed(PROPERTY_TEXT));
            header.push(language.suffixed(VALUE_TEXT));
        }
        header
    }

    pub fn records(&self) -> Vec<Vec<Option<String>>> {
        self.rows
            .iter()
            .map(|(key, row)| {
                let flags = &row.flags;
                let mut record = vec![
                    Some(key.category_id.to_string()),
                    key.value_id.as_ref().map(CatalogId::to_string),
                    Some(key.property_id.to_string()),
                    Some(flags.sale_prop.to_string()),
                    Some(flags.required.to_string()),
                    Some(flags.input_prop.to_string()),
                    Some(flags.enum_prop.to_string()),
                    Some(flags.has_unit.to_string()),
                    flags.show_type.clone(),
                ];
                for texts in &row.texts {
                    record.push(texts.as_ref().map(|t| t.property_text.clone()));
                    record.push(texts.as_ref().and_then(|t| t.value_text.clone()));
                }
                record
            })
            .collect()
    }
}

/// Distinct value ids with their text in every language.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueGlossary {
    languages: Vec<Language>,
    values: BTreeMap<CatalogId, Vec<Option<String>>>,
}

impl ValueGlossary {
    /// The first non-null text per language wins when a value id appears
    /// under several properties.
    pub fn from_properties(table: &UnifiedPropertyTable) -> Self {
        let width = table.languages.len();
        let mut values: BTreeMap<CatalogId, Vec<Option<String>>> = BTreeMap::new();
        for (key, row) in &table.rows {
            let Some(value_id) = &key.value_id else {
                continue;
            };
            let cells = values.entry(value_id.clone()).or_insert_with(|| vec![None; width]);
            for (cell, texts) in cells.iter_mut().zip(&row.texts) {
                if cell.is_none() {
                    *cell = texts.as_ref().and_then(|t| t.value_text.clone());
                }
            }
        }
        Self {
            languages: table.languages.clone(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn text(&self, value_id: &CatalogId, language: &Language) -> Option<&str> {
        let slot = self.languages.iter().position(|l| l == language)?;
        self.values.get(value_id)?.get(slot)?.as_deref()
    }

    pub fn header(&self) -> Vec<String> {
        let mut header = vec![VALUE_ID.to_string()];
        header.extend(self.languages.iter().map(|l| l.suffixed(VALUE_TEXT)));
        header
    }

    pub fn records(&self) -> Vec<Vec<Option<String>>> {
        self.values
            .iter()
            .map(|(id, texts)| {
                let mut record = vec![Some(id.to_string())];
                record.extend(texts.iter().cloned());
                record
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyValue;

    fn def(id: &str, text: &str, values: Option<Vec<(&str, &str)>>) -> PropertyDef {
        PropertyDef {
            property_id: id.into(),
            property_text: text.to_string(),
            show_type: Some("list_box".to_string()),
            sale_prop: false,
            required: true,
            input_prop: false,
            has_unit: false,
            enum_prop: values.is_some(),
            property_values: values.map(|vs| {
                vs.into_iter()
                    .map(|(vid, vtext)| PropertyValue {
                        value_id: vid.into(),
                        value_text: Some(vtext.to_string()),
                        category_id: None,
                    })
                    .collect()
            }),
        }
    }

    #[test]
    fn one_plain_and_one_enumerated_property_yield_three_rows() {
        let defs = vec![
            def("p1", "Brand", None),
            def("p2", "Color", Some(vec![("v1", "Red"), ("v2", "Blue")])),
        ];
        let records = flatten_properties(&"500".into(), &defs);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].value_id, None);
        assert_eq!(records[0].value_text, None);
        assert_eq!(records[0].property_text, "Brand");
        assert_eq!(records[1].value_id, Some("v1".into()));
        assert_eq!(records[2].value_text.as_deref(), Some("Blue"));
        assert!(records[1..].iter().all(|r| r.flags.enum_prop && r.flags.required));
        assert!(records.iter().all(|r| r.category_id == CatalogId::from("500")));
    }

    #[test]
    fn empty_value_list_counts_as_no_values() {
        let records = flatten_properties(&"1".into(), &[def("p1", "Size", Some(Vec::new()))]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value_id, None);
    }

    #[test]
    fn category_without_properties_contributes_nothing() {
        assert!(flatten_properties(&"1".into(), &[]).is_empty());
    }

    fn language_table(lang: &str, defs: &[PropertyDef]) -> LanguagePropertyTable {
        let records = flatten_properties(&"500".into(), defs);
        LanguagePropertyTable::from_records(lang.into(), records)
    }

    #[test]
    fn joins_texts_side_by_side() {
        let en = language_table("en", &[def("p2", "Color", Some(vec![("v1", "Red")]))]);
        let de = language_table("de", &[def("p2", "Farbe", Some(vec![("v1", "Rot")]))]);
        let unified = UnifiedPropertyTable::from_language_tables(vec![en, de]);

        assert_eq!(unified.len(), 1);
        assert!(unified.conflicts().is_empty());
        assert_eq!(
            unified.header(),
            vec![
                "categoryId",
                "valueId",
                "propertyId",
                "saleProp",
                "required",
                "inputProp",
                "enumProp",
                "hasUnit",
                "showType",
                "propertyText_en",
                "valueText_en",
                "propertyText_de",
                "valueText_de",
            ]
        );
        let record = &unified.records()[0];
        assert_eq!(record[1].as_deref(), Some("v1"));
        assert_eq!(record[9].as_deref(), Some("Color"));
        assert_eq!(record[12].as_deref(), Some("Rot"));
    }

    #[test]
    fn flag_disagreement_is_surfaced_and_first_value_kept() {
        let en = language_table("en", &[def("p1", "Brand", None)]);
        let mut fr_def = def("p1", "Marque", None);
        fr_def.required = false;
        let fr = language_table("fr", &[fr_def]);
        let unified = UnifiedPropertyTable::from_language_tables(vec![en, fr]);

        assert_eq!(unified.conflicts().len(), 1);
        let conflict = &unified.conflicts()[0];
        assert_eq!(conflict.field, "required");
        assert_eq!(conflict.first, "true");
        assert_eq!(conflict.first_language, Language::from("en"));
        assert_eq!(conflict.other_language, Language::from("fr"));
        let row = unified.rows().next().unwrap().1;
        assert!(row.flags.required);
    }

    #[test]
    fn glossary_collects_distinct_values() {
        let en = language_table(
            "en",
            &[
                def("p1", "Color", Some(vec![("v1", "Red")])),
                def("p2", "Trim", Some(vec![("v1", "Red")])),
            ],
        );
        let de = language_table("de", &[def("p2", "Besatz", Some(vec![("v1", "Rot")]))]);
        let unified = UnifiedPropertyTable::from_language_tables(vec![en, de]);
        let glossary = ValueGlossary::from_properties(&unified);

        assert_eq!(glossary.len(), 1);
        assert_eq!(glossary.text(&"v1".into(), &"de".into()), Some("Rot"));
        assert_eq!(glossary.header(), vec!["valueId", "valueText_en", "valueText_de"]);
    }

    #[test]
    fn placeholder_rows_name_category_and_language() {
        let rows = placeholder_records(&"fr".into(), &["7".into(), "8".into()]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].property_text, "Placeholder for Category 7 in fr");
        assert_eq!(rows[1].value_id, None);
    }
}
