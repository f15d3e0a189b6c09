//! Depth-first traversal of one top category down to its leaves.
//!
//! The walk is iterative: an explicit stack of frames, each carrying the
//! trail of (id, name) pairs from the top category to the node being
//! expanded. Fetch failures only prune the branch they happened on.

use tracing::{debug, warn};

use crate::api::CatalogApi;
use crate::error::WalkError;
use crate::model::{CatalogId, CategoryNode, Language, TopCategory};
use crate::path_format::{format_path, CategoryRow, Level};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct WalkOutcome {
    pub rows: Vec<CategoryRow>,
    /// Nodes whose children could not be fetched.
    pub failed_nodes: usize,
    /// Nodes left unexpanded because they sit at the depth ceiling.
    pub truncated_branches: usize,
    /// Leaves skipped because only one of the two path keys was present.
    pub incomplete_leaves: usize,
}

impl WalkOutcome {
    pub fn absorb(&mut self, other: WalkOutcome) {
        self.rows.extend(other.rows);
        self.failed_nodes += other.failed_nodes;
        self.truncated_branches += other.truncated_branches;
        self.incomplete_leaves += other.incomplete_leaves;
    }
}

struct Frame {
    node_id: CatalogId,
    trail: Vec<Level>,
    depth: usize,
}

pub struct TreeWalker<'a, A: CatalogApi + ?Sized> {
    api: &'a A,
    language: &'a Language,
    max_depth: usize,
}

impl<'a, A: CatalogApi + ?Sized> TreeWalker<'a, A> {
    pub fn new(api: &'a A, language: &'a Language, max_depth: usize) -> Self {
        Self {
            api,
            language,
            max_depth,
        }
    }

    /// Collects one row per leaf reachable from `root`.
    ///
    /// Only a malformed leaf path is fatal; everything else is logged and
    /// counted in the outcome.
    pub fn walk(&self, root: &TopCategory) -> Result<WalkOutcome, WalkError> {
        let mut outcome = WalkOutcome::default();
        let mut stack = vec![Frame {
            node_id: root.category_id.clone(),
            trail: vec![Level {
                id: root.category_id.clone(),
                name: root.category_name.clone(),
            }],
            depth: 0,
        }];

        while let Some(frame) = stack.pop() {
            if frame.depth >= self.max_depth {
                warn!(
                    language = %self.language,
                    category_id = %frame.node_id,
                    depth = frame.depth,
                    "depth ceiling reached, branch skipped"
                );
                outcome.truncated_branches += 1;
                continue;
            }

            let children = match self.api.list_sub_categories(self.language, &frame.node_id) {
                Ok(children) => children,
                Err(err) => {
                    warn!(
                        language = %self.language,
                        category_id = %frame.node_id,
                        error = %err,
                        "failed to fetch sub-categories"
                    );
                    outcome.failed_nodes += 1;
                    continue;
                }
            };

            let mut branches = Vec::new();
            for child in children {
                if child.leaf_category {
                    match self.leaf_row(&child, &frame.trail)? {
                        Some(row) => outcome.rows.push(row),
                        None => outcome.incomplete_leaves += 1,
                    }
                } else {
                    let mut trail = frame.trail.clone();
                    trail.push(Level {
                        id: child.category_id.clone(),
                        name: child.category_name.clone(),
                    });
                    branches.push(Frame {
                        node_id: child.category_id,
                        trail,
                        depth: frame.depth + 1,
                    });
                }
            }
            // Reversed so siblings are expanded in the order the API listed them.
            stack.extend(branches.into_iter().rev());
        }

        debug!(
            language = %self.language,
            category_id = %root.category_id,
            leaves = outcome.rows.len(),
            "walk finished"
        );
        Ok(outcome)
    }

    /// `Ok(None)` when the payload carries only one of the two path keys.
    fn leaf_row(&self, leaf: &CategoryNode, trail: &[Level]) -> Result<Option<CategoryRow>, WalkError> {
        let (mut ids, mut names) = match (&leaf.category_id_path, &leaf.category_name_path) {
            (Some(ids), Some(names)) if !(ids.is_empty() && names.is_empty()) => {
                (ids.clone(), names.clone())
            }
            (Some(_), Some(_)) | (None, None) => (
                trail.iter().map(|l| l.id.clone()).collect::<Vec<_>>(),
                trail.iter().map(|l| l.name.clone()).collect::<Vec<_>>(),
            ),
            (ids, _) => {
                let missing = if ids.is_none() { "categoryIdPath" } else { "categoryNamePath" };
                warn!(
                    language = %self.language,
                    category_id = %leaf.category_id,
                    missing,
                    "leaf payload is missing a path key, leaf skipped"
                );
                return Ok(None);
            }
        };

        // The reported path may stop at the parent; the leaf slot must hold the leaf itself.
        if ids.len() == names.len() && ids.last() != Some(&leaf.category_id) {
            ids.push(leaf.category_id.clone());
            names.push(leaf.category_name.clone());
        }

        format_path(&ids, &names, &leaf.category_id, &leaf.category_name)
            .map(Some)
            .map_err(|source| WalkError::MalformedPath {
                language: self.language.clone(),
                leaf: leaf.category_id.clone(),
                source,
            })
    }
}
