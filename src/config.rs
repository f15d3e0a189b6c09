use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::model::Language;

pub const DEFAULT_CONFIG_FILE: &str = "cpv_extract.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

/// What a language contributes when its property fetch yields no rows at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyLanguagePolicy {
    /// Zero rows; that language's text columns stay null.
    Absent,
    /// One synthetic row per leaf category.
    Placeholder,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub category_prefix: String,
    pub property_prefix: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            endpoint: None,
            region: "eu-central-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            category_prefix: "cpv_data/category/".to_string(),
            property_prefix: "cpv_data/property/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub api_base_url: String,
    pub app_key: String,
    pub site_id: String,
    pub languages: Vec<Language>,
    pub worker_threads: Option<usize>,
    pub request_timeout_secs: u64,
    pub max_depth: usize,
    pub property_retry_count: u32,
    pub property_retry_delay_secs: u64,
    pub empty_language_policy: EmptyLanguagePolicy,
    pub delimiter: String,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub category_file: String,
    pub property_file: String,
    pub value_file: String,
    pub write_language_tables: bool,
    pub object_store: Option<ObjectStoreConfig>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://deapi.alibaba.com/openapi/param2/1/com.alibaba.v.business".to_string(),
            app_key: "195284".to_string(),
            site_id: "wlw".to_string(),
            languages: vec!["en".into(), "de".into(), "fr".into()],
            worker_threads: None,
            request_timeout_secs: 30,
            max_depth: 16,
            property_retry_count: 3,
            property_retry_delay_secs: 5,
            empty_language_policy: EmptyLanguagePolicy::Absent,
            delimiter: ";".to_string(),
            output_dir: PathBuf::from("./output"),
            format: OutputFormat::Csv,
            category_file: "categories_data.csv".to_string(),
            property_file: "category_properties_data.csv".to_string(),
            value_file: "category_values_data.csv".to_string(),
            write_language_tables: false,
            object_store: None,
        }
    }
}

impl EtlConfig {
    pub fn property_retry_delay(&self) -> Duration {
        Duration::from_secs(self.property_retry_delay_secs)
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b';')
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.languages.is_empty() {
            bail!("at least one language must be configured");
        }
        if self.max_depth == 0 {
            bail!("max_depth must be at least 1");
        }
        if self.delimiter.len() != 1 || !self.delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character, got {:?}", self.delimiter);
        }
        if let Some(store) = &self.object_store {
            if store.bucket.is_empty() {
                bail!("object_store.bucket must not be empty");
            }
        }
        Ok(())
    }
}

/// Loads defaults, then the TOML file, then `CPV_*` environment variables.
///
/// Without an explicit `path` the default file is optional.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EtlConfig> {
    dotenvy::dotenv().ok();

    let file = match path {
        Some(p) => File::from(p.to_path_buf()).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let cfg = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("CPV")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("languages"),
        )
        .build()
        .context("failed to read configuration")?;

    let cfg: EtlConfig = cfg.try_deserialize().context("invalid configuration")?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = EtlConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.languages, vec![Language::from("en"), "de".into(), "fr".into()]);
        assert_eq!(cfg.delimiter_byte(), b';');
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
languages = ["en", "es"]
max_depth = 4
format = "parquet"
empty_language_policy = "placeholder"

[object_store]
bucket = "bi-exports"
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.languages, vec![Language::from("en"), "es".into()]);
        assert_eq!(cfg.max_depth, 4);
        assert_eq!(cfg.format, OutputFormat::Parquet);
        assert_eq!(cfg.empty_language_policy, EmptyLanguagePolicy::Placeholder);
        let store = cfg.object_store.unwrap();
        assert_eq!(store.bucket, "bi-exports");
        assert_eq!(store.category_prefix, "cpv_data/category/");
        assert_eq!(cfg.property_retry_count, 3);
    }

    #[test]
    fn rejects_bad_settings() {
        let cfg = EtlConfig {
            languages: Vec::new(),
            ..EtlConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = EtlConfig {
            delimiter: ";;".to_string(),
            ..EtlConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = EtlConfig {
            max_depth: 0,
            ..EtlConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
