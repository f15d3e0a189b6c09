//! Runs the per-language pipelines concurrently and joins their results.

use std::thread;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{error, info, warn};

use crate::api::CatalogApi;
use crate::category_table::{LanguageTable, UnifiedCategoryTable};
use crate::config::{EmptyLanguagePolicy, EtlConfig};
use crate::error::WalkError;
use crate::fanout;
use crate::model::{CatalogId, Language};
use crate::property::{
    fetch_language_properties, placeholder_records, LanguagePropertyTable, PropertyRecord,
    UnifiedPropertyTable,
};

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub languages: Vec<Language>,
    pub max_depth: usize,
    pub property_retry_count: u32,
    pub property_retry_delay: Duration,
    pub empty_language_policy: EmptyLanguagePolicy,
}

impl From<&EtlConfig> for ReconcileSettings {
    fn from(config: &EtlConfig) -> Self {
        ReconcileSettings {
            languages: config.languages.clone(),
            max_depth: config.max_depth,
            property_retry_count: config.property_retry_count,
            property_retry_delay: config.property_retry_delay(),
            empty_language_policy: config.empty_language_policy,
        }
    }
}

pub struct Reconciler<'a, A: CatalogApi + ?Sized> {
    api: &'a A,
    pool: ThreadPool,
    settings: ReconcileSettings,
}

impl<'a, A: CatalogApi + ?Sized> Reconciler<'a, A> {
    /// `worker_threads = None` leaves the pool size to rayon.
    pub fn new(
        api: &'a A,
        settings: ReconcileSettings,
        worker_threads: Option<usize>,
    ) -> Result<Self, WalkError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("cpv-worker-{i}"));
        if let Some(threads) = worker_threads {
            builder = builder.num_threads(threads);
        }
        Ok(Self {
            api,
            pool: builder.build()?,
            settings,
        })
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// One category table per configured language, in configured order.
    ///
    /// Returns only after every language has finished.
    pub fn language_tables(&self) -> Result<Vec<LanguageTable>, WalkError> {
        let start = Instant::now();
        let finished: DashMap<Language, LanguageTable> = DashMap::new();

        self.pool.install(|| {
            self.settings.languages.par_iter().try_for_each(|language| {
                let table = self.language_table(language)?;
                finished.insert(language.clone(), table);
                Ok::<(), WalkError>(())
            })
        })?;

        let tables = self
            .settings
            .languages
            .iter()
            .filter_map(|language| finished.remove(language).map(|(_, table)| table))
            .collect();
        info!(elapsed_ms = start.elapsed().as_millis() as u64, "category fetch complete");
        Ok(tables)
    }

    fn language_table(&self, language: &Language) -> Result<LanguageTable, WalkError> {
        let roots = match self.api.list_top_categories(language) {
            Ok(roots) => roots,
            Err(err) => {
                error!(%language, error = %err, "failed to fetch top categories");
                Vec::new()
            }
        };
        info!(%language, roots = roots.len(), "walking category tree");
        let outcome = fanout::walk_roots(self.api, language, &roots, self.settings.max_depth)?;
        Ok(LanguageTable::from_rows(language.clone(), outcome.rows))
    }

    /// Every configured language has a column group, even one that produced no rows.
    pub fn join_categories(&self, tables: Vec<LanguageTable>) -> UnifiedCategoryTable {
        let mut unified = UnifiedCategoryTable::with_languages(self.settings.languages.iter().cloned());
        for table in tables {
            unified.outer_join(table);
        }
        info!(rows = unified.len(), levels = unified.max_sub_levels(), "category tables joined");
        unified
    }

    pub fn categories(&self) -> Result<UnifiedCategoryTable, WalkError> {
        let tables = self.language_tables()?;
        Ok(self.join_categories(tables))
    }

    /// Property table for `leaf_ids` across every configured language.
    ///
    /// Languages are fetched in rounds. A language whose attempt aborts is
    /// retried in the next round, after a delay spent on the calling thread
    /// so no pool worker is parked. A language whose retries are exhausted
    /// is left out of the join; its text columns stay null.
    pub fn properties(&self, leaf_ids: &[CatalogId]) -> UnifiedPropertyTable {
        let start = Instant::now();
        let finished: DashMap<Language, LanguagePropertyTable> = DashMap::new();
        let attempts = self.settings.property_retry_count + 1;
        let mut pending = self.settings.languages.clone();

        for attempt in 1..=attempts {
            pending = self.pool.install(|| {
                pending
                    .par_iter()
                    .filter_map(|language| match fetch_language_properties(self.api, language, leaf_ids) {
                        Ok(records) => {
                            info!(%language, rows = records.len(), attempt, "properties fetched");
                            let records = self.apply_empty_policy(language, leaf_ids, records);
                            finished.insert(
                                language.clone(),
                                LanguagePropertyTable::from_records(language.clone(), records),
                            );
                            None
                        }
                        Err(err) if attempt < attempts => {
                            warn!(%language, attempt, error = %err, "property fetch failed, retrying");
                            Some(language.clone())
                        }
                        Err(err) => {
                            error!(%language, attempt, error = %err, "property retry limit exceeded");
                            None
                        }
                    })
                    .collect()
            });
            if pending.is_empty() {
                break;
            }
            info!(
                languages = ?pending,
                delay_secs = self.settings.property_retry_delay.as_secs_f64(),
                "waiting before property retry"
            );
            thread::sleep(self.settings.property_retry_delay);
        }

        let mut unified = UnifiedPropertyTable::with_languages(self.settings.languages.iter().cloned());
        for language in &self.settings.languages {
            if let Some((_, table)) = finished.remove(language) {
                unified.outer_join(table);
            }
        }
        if !unified.conflicts().is_empty() {
            warn!(conflicts = unified.conflicts().len(), "property flags disagree across languages");
        }
        info!(
            rows = unified.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "property tables joined"
        );
        unified
    }

    fn apply_empty_policy(
        &self,
        language: &Language,
        leaf_ids: &[CatalogId],
        records: Vec<PropertyRecord>,
    ) -> Vec<PropertyRecord> {
        if !records.is_empty() || self.settings.empty_language_policy == EmptyLanguagePolicy::Absent {
            return records;
        }
        warn!(%language, "no properties returned, emitting placeholder rows");
        placeholder_records(language, leaf_ids)
    }
}
