use std::path::Path;
use std::sync::Arc;

use ::object_store::aws::AmazonS3Builder;
use ::object_store::path::Path as ObjectPath;
use ::object_store::ObjectStore;
use tracing::info;

use crate::config::ObjectStoreConfig;
use crate::error::ExportError;

/// Builds an S3 (or S3-compatible) store for the configured bucket.
///
/// Credentials fall back to the usual `AWS_*` environment variables when
/// they are not set in the config.
pub fn build_store(config: &ObjectStoreConfig) -> Result<Arc<dyn ObjectStore>, ExportError> {
    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(&config.bucket)
        .with_region(&config.region);

    if let Some(endpoint) = &config.endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }
    if let Some(key) = &config.access_key_id {
        builder = builder.with_access_key_id(key);
    }
    if let Some(secret) = &config.secret_access_key {
        builder = builder.with_secret_access_key(secret);
    }

    Ok(Arc::new(builder.build()?))
}

/// `prefix` joined with the file name of `local`.
pub fn object_key(prefix: &str, local: &Path) -> String {
    let file_name = local
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if prefix.is_empty() || prefix.ends_with('/') {
        format!("{prefix}{file_name}")
    } else {
        format!("{prefix}/{file_name}")
    }
}

/// Uploads a finished export file under `prefix`.
pub async fn upload_file(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    local: &Path,
) -> Result<String, ExportError> {
    let key = object_key(prefix, local);
    let bytes = tokio::fs::read(local).await?;
    let size = bytes.len();

    store.put(&ObjectPath::from(key.as_str()), bytes.into()).await?;

    info!(bucket, key = %key, size, "uploaded to s3://{}/{}", bucket, key);
    Ok(key)
}
