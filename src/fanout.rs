use std::time::Instant;

use crossbeam::channel;
use tracing::{info, warn};

use crate::api::CatalogApi;
use crate::error::WalkError;
use crate::model::{CatalogId, Language, TopCategory};
use crate::walker::{TreeWalker, WalkOutcome};

/// Walks every root concurrently on the current rayon pool.
///
/// Each root reports back over a channel; the channel is drained only after
/// every walk has finished. Row order in the result is unspecified. The
/// first malformed path aborts the whole fan-out.
pub fn walk_roots<A: CatalogApi + ?Sized>(
    api: &A,
    language: &Language,
    roots: &[TopCategory],
    max_depth: usize,
) -> Result<WalkOutcome, WalkError> {
    let start = Instant::now();
    let walker = TreeWalker::new(api, language, max_depth);
    let walker = &walker;
    let (tx, rx) = channel::unbounded::<(CatalogId, Result<WalkOutcome, WalkError>)>();

    rayon::scope(|s| {
        for root in roots {
            let tx = tx.clone();
            s.spawn(move |_| {
                let result = walker.walk(root);
                let _ = tx.send((root.category_id.clone(), result));
            });
        }
    });
    drop(tx);

    let mut merged = WalkOutcome::default();
    let mut first_error = None;
    for (root_id, result) in rx {
        match result {
            Ok(outcome) => merged.absorb(outcome),
            Err(err) => {
                warn!(%language, category_id = %root_id, error = %err, "walk aborted");
                first_error.get_or_insert(err);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    info!(
        %language,
        roots = roots.len(),
        leaves = merged.rows.len(),
        failed_nodes = merged.failed_nodes,
        truncated = merged.truncated_branches,
        incomplete_leaves = merged.incomplete_leaves,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "category fan-out complete"
    );
    Ok(merged)
}
