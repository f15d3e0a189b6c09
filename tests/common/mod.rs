#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use cpv_extract::{CatalogApi, CatalogId, CategoryNode, FetchError, Language, PropertyDef, TopCategory};

#[derive(Clone, Copy)]
enum Breakage {
    Status(u16),
    Decode,
}

impl Breakage {
    fn to_error(self) -> FetchError {
        match self {
            Breakage::Status(status) => FetchError::Status(status),
            Breakage::Decode => FetchError::Decode("missing key `data`".to_string()),
        }
    }
}

/// In-memory catalog keyed by language, with injectable failures.
#[derive(Default)]
pub struct FakeCatalog {
    tops: HashMap<String, Vec<TopCategory>>,
    children: HashMap<(String, String), Vec<CategoryNode>>,
    broken_nodes: HashMap<(String, String), Breakage>,
    properties: HashMap<(String, String), Vec<PropertyDef>>,
    broken_properties: HashMap<(String, String), u16>,
    property_outages: Mutex<HashMap<String, usize>>,
    property_calls: AtomicUsize,
    property_call_log: Mutex<Vec<(String, Instant)>>,
    sub_category_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top(&mut self, lang: &str, id: &str, name: &str) -> &mut Self {
        let tops = self.tops.entry(lang.to_string()).or_default();
        if !tops.iter().any(|t| t.category_id.as_str() == id) {
            tops.push(TopCategory {
                category_id: id.into(),
                category_name: name.to_string(),
            });
        }
        self
    }

    /// Registers every node on `path`; the last entry becomes a leaf that
    /// reports the full path including itself.
    pub fn path(&mut self, lang: &str, path: &[(&str, &str)]) -> &mut Self {
        let (top_id, top_name) = path[0];
        self.top(lang, top_id, top_name);
        for i in 1..path.len() - 1 {
            let (id, name) = path[i];
            self.branch(lang, path[i - 1].0, id, name);
        }
        let (leaf_id, leaf_name) = path[path.len() - 1];
        let ids: Vec<CatalogId> = path.iter().map(|(id, _)| CatalogId::from(*id)).collect();
        let names: Vec<String> = path.iter().map(|(_, n)| n.to_string()).collect();
        self.leaf(lang, path[path.len() - 2].0, leaf_id, leaf_name, ids, names)
    }

    pub fn branch(&mut self, lang: &str, parent: &str, id: &str, name: &str) -> &mut Self {
        let children = self.children.entry((lang.to_string(), parent.to_string())).or_default();
        if !children.iter().any(|c| c.category_id.as_str() == id) {
            children.push(CategoryNode {
                category_id: id.into(),
                category_name: name.to_string(),
                leaf_category: false,
                category_id_path: None,
                category_name_path: None,
            });
        }
        self
    }

    /// An empty path is registered as an absent key.
    pub fn leaf(
        &mut self,
        lang: &str,
        parent: &str,
        id: &str,
        name: &str,
        id_path: Vec<CatalogId>,
        name_path: Vec<String>,
    ) -> &mut Self {
        self.node(
            lang,
            parent,
            CategoryNode {
                category_id: id.into(),
                category_name: name.to_string(),
                leaf_category: true,
                category_id_path: Some(id_path).filter(|p| !p.is_empty()),
                category_name_path: Some(name_path).filter(|p| !p.is_empty()),
            },
        )
    }

    /// Registers a node exactly as given, e.g. decoded from a raw payload.
    pub fn node(&mut self, lang: &str, parent: &str, node: CategoryNode) -> &mut Self {
        self.children
            .entry((lang.to_string(), parent.to_string()))
            .or_default()
            .push(node);
        self
    }

    pub fn break_node(&mut self, lang: &str, id: &str) -> &mut Self {
        self.broken_nodes
            .insert((lang.to_string(), id.to_string()), Breakage::Status(500));
        self
    }

    /// Sub-category fetches of `id` answer with an undecodable payload.
    pub fn garble_node(&mut self, lang: &str, id: &str) -> &mut Self {
        self.broken_nodes
            .insert((lang.to_string(), id.to_string()), Breakage::Decode);
        self
    }

    pub fn props(&mut self, lang: &str, category: &str, defs: Vec<PropertyDef>) -> &mut Self {
        self.properties.insert((lang.to_string(), category.to_string()), defs);
        self
    }

    pub fn break_props(&mut self, lang: &str, category: &str) -> &mut Self {
        self.broken_properties.insert((lang.to_string(), category.to_string()), 404);
        self
    }

    /// The next `calls` property requests in `lang` fail with a transport error.
    pub fn property_outage(&mut self, lang: &str, calls: usize) -> &mut Self {
        self.property_outages
            .get_mut()
            .unwrap()
            .insert(lang.to_string(), calls);
        self
    }

    pub fn property_calls(&self) -> usize {
        self.property_calls.load(Ordering::SeqCst)
    }

    /// Time of every property request made in `lang`.
    pub fn property_call_times(&self, lang: &str) -> Vec<Instant> {
        self.property_call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == lang)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn sub_category_calls(&self) -> usize {
        self.sub_category_calls.load(Ordering::SeqCst)
    }
}

impl CatalogApi for FakeCatalog {
    fn list_top_categories(&self, language: &Language) -> Result<Vec<TopCategory>, FetchError> {
        self.tops
            .get(language.as_str())
            .cloned()
            .ok_or(FetchError::Status(503))
    }

    fn list_sub_categories(
        &self,
        language: &Language,
        category_id: &CatalogId,
    ) -> Result<Vec<CategoryNode>, FetchError> {
        self.sub_category_calls.fetch_add(1, Ordering::SeqCst);
        let key = (language.to_string(), category_id.to_string());
        if let Some(breakage) = self.broken_nodes.get(&key) {
            return Err(breakage.to_error());
        }
        Ok(self.children.get(&key).cloned().unwrap_or_default())
    }

    fn list_properties(
        &self,
        language: &Language,
        category_id: &CatalogId,
    ) -> Result<Vec<PropertyDef>, FetchError> {
        self.property_calls.fetch_add(1, Ordering::SeqCst);
        self.property_call_log
            .lock()
            .unwrap()
            .push((language.to_string(), Instant::now()));
        {
            let mut outages = self.property_outages.lock().unwrap();
            if let Some(remaining) = outages.get_mut(language.as_str()) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Transport("connection reset".to_string()));
                }
            }
        }
        let key = (language.to_string(), category_id.to_string());
        if let Some(status) = self.broken_properties.get(&key) {
            return Err(FetchError::Status(*status));
        }
        Ok(self.properties.get(&key).cloned().unwrap_or_default())
    }
}

pub fn prop(id: &str, text: &str, values: &[(&str, &str)]) -> PropertyDef {
    let json = serde_json::json!({
        "propertyId": id,
        "propertyText": text,
        "showType": if values.is_empty() { "input" } else { "list_box" },
        "saleProp": false,
        "required": values.is_empty(),
        "inputProp": values.is_empty(),
        "hasUnit": false,
        "enumProp": !values.is_empty(),
        "propertyValues": if values.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::Value::Array(
                values
                    .iter()
                    .map(|(vid, vtext)| serde_json::json!({"valueId": vid, "valueText": vtext}))
                    .collect(),
            )
        },
    });
    serde_json::from_value(json).unwrap()
}
