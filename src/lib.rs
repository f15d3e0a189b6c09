//! Category / property / value extraction from the catalog API.
//!
//! The pipeline walks the category tree of every configured language,
//! flattens each leaf into a fixed-width row, outer-joins the per-language
//! tables on the id hierarchy and then does the same for the property
//! schema of every leaf category.

pub mod api;
pub mod category_table;
pub mod config;
pub mod error;
pub mod export;
pub mod fanout;
pub mod log;
pub mod model;
pub mod object_store;
pub mod path_format;
pub mod property;
pub mod reconcile;
pub mod walker;

pub use api::{CatalogApi, HttpCatalogApi};
pub use category_table::{LanguageTable, UnifiedCategoryTable};
pub use config::EtlConfig;
pub use error::{ExportError, FetchError, MalformedPathError, WalkError};
pub use model::{CatalogId, CategoryNode, Language, PropertyDef, PropertyValue, TopCategory};
pub use path_format::{format_path, CategoryRow, HierarchyKey, Level};
pub use property::{PropertyRecord, UnifiedPropertyTable, ValueGlossary};
pub use reconcile::Reconciler;
