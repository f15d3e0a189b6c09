use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::EtlConfig;
use crate::error::FetchError;
use crate::model::{CatalogId, CategoryNode, Language, PropertyDef, TopCategory};

/// The three upstream operations the pipeline consumes.
///
/// Implementations are shared across worker threads.
pub trait CatalogApi: Send + Sync {
    fn list_top_categories(&self, language: &Language) -> Result<Vec<TopCategory>, FetchError>;

    fn list_sub_categories(
        &self,
        language: &Language,
        category_id: &CatalogId,
    ) -> Result<Vec<CategoryNode>, FetchError>;

    fn list_properties(
        &self,
        language: &Language,
        category_id: &CatalogId,
    ) -> Result<Vec<PropertyDef>, FetchError>;
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<Vec<T>>,
}

/// Decodes the `{"data": [...]}` envelope. A missing `data` key is an error
/// only when `required` is set.
fn decode_envelope<T: DeserializeOwned>(body: &str, required: bool) -> Result<Vec<T>, FetchError> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    match envelope.data {
        Some(items) => Ok(items),
        None if required => Err(FetchError::Decode("missing key `data`".to_string())),
        None => Ok(Vec::new()),
    }
}

pub struct HttpCatalogApi {
    client: Client,
    base_url: String,
    app_key: String,
    site_id: String,
}

impl HttpCatalogApi {
    pub fn new(config: &EtlConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            app_key: config.app_key.clone(),
            site_id: config.site_id.clone(),
        })
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/category.info.{}/{}", self.base_url, operation, self.app_key)
    }

    fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        language: &Language,
        category_id: Option<&CatalogId>,
        require_data: bool,
    ) -> Result<Vec<T>, FetchError> {
        let mut query = vec![("siteId", self.site_id.as_str()), ("language", language.as_str())];
        if let Some(id) = category_id {
            query.push(("categoryId", id.as_str()));
        }

        debug!(operation, %language, category_id = ?category_id.map(CatalogId::as_str), "GET");
        let response = self.client.get(self.endpoint(operation)).query(&query).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.text()?;
        decode_envelope(&body, require_data)
    }
}

impl CatalogApi for HttpCatalogApi {
    fn list_top_categories(&self, language: &Language) -> Result<Vec<TopCategory>, FetchError> {
        self.get("listTopCategories", language, None, false)
    }

    fn list_sub_categories(
        &self,
        language: &Language,
        category_id: &CatalogId,
    ) -> Result<Vec<CategoryNode>, FetchError> {
        self.get("listSubCategories", language, Some(category_id), true)
    }

    fn list_properties(
        &self,
        language: &Language,
        category_id: &CatalogId,
    ) -> Result<Vec<PropertyDef>, FetchError> {
        self.get("listProp", language, Some(category_id), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_category_envelope_requires_data() {
        let err = decode_envelope::<CategoryNode>(r#"{"success": true}"#, true).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn property_envelope_defaults_to_empty() {
        let props = decode_envelope::<PropertyDef>(r#"{"success": true}"#, false).unwrap();
        assert!(props.is_empty());
    }

    #[test]
    fn decodes_leaf_nodes_with_paths() {
        let body = r#"{"data": [{
            "categoryId": 3, "categoryName": "Drills", "leafCategory": true,
            "categoryIdPath": [1, 2, 3], "categoryNamePath": ["Tools", "Power", "Drills"]
        }]}"#;
        let nodes = decode_envelope::<CategoryNode>(body, true).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].category_id_path.as_ref().map(Vec::len), Some(3));
        assert!(nodes[0].leaf_category);
    }

    #[test]
    fn garbage_body_is_a_decode_error() {
        let err = decode_envelope::<TopCategory>("<html>", false).unwrap_err();
        assert!(err.aborts_attempt());
        assert!(!FetchError::Status(503).aborts_attempt());
    }

    #[test]
    fn endpoint_includes_operation_and_app_key() {
        let api = HttpCatalogApi::new(&EtlConfig::default()).unwrap();
        assert_eq!(
            api.endpoint("listProp"),
            "https://deapi.alibaba.com/openapi/param2/1/com.alibaba.v.business/category.info.listProp/195284"
        );
    }
}
