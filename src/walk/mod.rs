//! Tree walker over one top-level file's nested-component tree.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  open / facts  ┌────────────┐  collect  ┌─────────────────┐
//! │ HostSession │◀──────────────▶│ TreeWalker │──────────▶│ FacetRegistry   │
//! └─────────────┘                │ (worklist) │           │ (one per facet) │
//!                                └────────────┘           └─────────────────┘
//!                                      │
//!                                      ▼
//!                                flat Vec<Record>
//! ```
//!
//! The walker takes the session by value, so the one non-reentrant host
//! handle is owned by the single loop that drives it. Traversal uses an
//! explicit stack; depth is not bounded by the call stack.

pub mod manifest;

pub use manifest::{ComponentLibrary, ComponentSpec, ManifestSession};

use std::collections::HashSet;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{DescendError, ExtractionError};
use crate::facet::{FacetRegistry, NodeContext, RawFacts};
use crate::outcome::Outcome;
use crate::record::{FacetType, Record, RootPath};

/// A reference from a component to a nested component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestedRef {
    pub name: String,
    pub category: String,
}

/// An opened component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentNode {
    pub name: String,
    pub category: String,
    pub file_path: String,
    pub nested: Vec<NestedRef>,
}

/// Boundary to the host application holding one top-level document.
///
/// Implementations are not required to be reentrant or thread safe.
pub trait HostSession {
    /// Open the top-level component of this session.
    fn open_root(&mut self) -> Result<ComponentNode, DescendError>;

    /// Open a component nested in `parent`.
    fn open_nested(
        &mut self,
        parent: &ComponentNode,
        nested: &NestedRef,
    ) -> Result<ComponentNode, DescendError>;

    /// Raw facts of one category for an opened component.
    fn facts(&mut self, node: &ComponentNode, facet: FacetType) -> Result<RawFacts, ExtractionError>;
}

/// Records produced by walking one top-level file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileWalk {
    /// Identifier of the top-level file (its path, or its name if unsaved).
    pub file_id: String,
    pub records: Vec<Record>,
    pub nodes_visited: usize,
    pub branches_skipped: usize,
}

/// A pending visit on the worklist.
struct Pending {
    parent: Rc<ComponentNode>,
    nested: NestedRef,
    path: RootPath,
    categories: Vec<String>,
}

/// Walks a component tree and runs every registered facet at each node.
pub struct TreeWalker<'r> {
    registry: &'r FacetRegistry,
}

impl<'r> TreeWalker<'r> {
    pub fn new(registry: &'r FacetRegistry) -> Self {
        Self { registry }
    }

    /// Walk the session's top-level component and all nested components.
    ///
    /// Never fails as a whole: extraction failures degrade to placeholder
    /// rows, descend failures skip their branch, and only a top-level open
    /// failure yields a failed outcome with no rows.
    pub fn walk<S: HostSession>(&self, mut session: S) -> Outcome<FileWalk> {
        let root = match session.open_root() {
            Ok(root) => root,
            Err(e) => {
                warn!(error = %e, "walk aborted at top-level component");
                return Outcome::failure(FileWalk::default(), e.to_string());
            }
        };

        let file_id = if root.file_path.is_empty() || root.file_path == "-" {
            root.name.clone()
        } else {
            root.file_path.clone()
        };

        let mut outcome = Outcome::success(FileWalk {
            file_id,
            ..FileWalk::default()
        });

        let root_path = RootPath::root(root.name.clone());
        let root_categories = vec![root.category.clone()];
        let root = Rc::new(root);
        let mut stack = Vec::new();

        self.visit(&mut session, &root, &root_path, &root_categories, &mut outcome);
        self.schedule(&root, &root_path, &root_categories, &mut stack);

        while let Some(pending) = stack.pop() {
            if let Some(e) = circular(&pending) {
                warn!(error = %e, "skipping branch");
                outcome.data.branches_skipped += 1;
                outcome.warn(e.to_string());
                continue;
            }

            let node = match session.open_nested(&pending.parent, &pending.nested) {
                Ok(node) => Rc::new(node),
                Err(e) => {
                    warn!(error = %e, "skipping branch");
                    outcome.data.branches_skipped += 1;
                    outcome.warn(e.to_string());
                    continue;
                }
            };

            self.visit(&mut session, &node, &pending.path, &pending.categories, &mut outcome);
            self.schedule(&node, &pending.path, &pending.categories, &mut stack);
        }

        outcome.info(format!(
            "Walked {}: {} nodes, {} records, {} branches skipped.",
            outcome.data.file_id,
            outcome.data.nodes_visited,
            outcome.data.records.len(),
            outcome.data.branches_skipped
        ));
        outcome
    }

    /// Run every facet at one node.
    fn visit<S: HostSession>(
        &self,
        session: &mut S,
        node: &ComponentNode,
        path: &RootPath,
        categories: &[String],
        outcome: &mut Outcome<FileWalk>,
    ) {
        debug!(path = %path, "visiting node");
        let ctx = NodeContext {
            root_path: path.clone(),
            category_path: categories.to_vec(),
            node_name: node.name.clone(),
            node_file_path: if node.file_path.is_empty() {
                "-".to_string()
            } else {
                node.file_path.clone()
            },
        };

        for collector in self.registry.iter() {
            let facet = collector.facet_type();
            let collected = session
                .facts(node, facet)
                .map_err(|e| ctx.extraction_error(facet, e.reason))
                .and_then(|facts| collector.collect(&ctx, &facts));

            match collected {
                Ok(collected) => {
                    for e in collected.skipped {
                        warn!(error = %e, "item skipped");
                        outcome.warn(e.to_string());
                    }
                    if collected.records.is_empty() {
                        outcome.data.records.push(collector.placeholder(&ctx));
                    } else {
                        outcome.data.records.extend(collected.records);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "facet degraded to placeholder");
                    outcome.warn(e.to_string());
                    outcome.data.records.push(collector.placeholder(&ctx));
                }
            }
        }
        outcome.data.nodes_visited += 1;
    }

    /// Push the distinct nested components of `node`, preserving their
    /// declared order when popped.
    fn schedule(
        &self,
        node: &Rc<ComponentNode>,
        path: &RootPath,
        categories: &[String],
        stack: &mut Vec<Pending>,
    ) {
        let mut seen = HashSet::new();
        let distinct: Vec<&NestedRef> = node
            .nested
            .iter()
            .filter(|n| seen.insert((n.name.as_str(), n.category.as_str())))
            .collect();

        for nested in distinct.into_iter().rev() {
            let mut child_categories = categories.to_vec();
            child_categories.push(nested.category.clone());
            stack.push(Pending {
                parent: Rc::clone(node),
                nested: nested.clone(),
                path: path.child(nested.name.clone()),
                categories: child_categories,
            });
        }
    }
}

/// A nested ref that already appears on its own path.
fn circular(pending: &Pending) -> Option<DescendError> {
    let segments = pending.path.segments();
    let ancestors = segments.len().saturating_sub(1);
    let repeats = segments[..ancestors]
        .iter()
        .zip(pending.categories.iter())
        .any(|(name, category)| *name == pending.nested.name && *category == pending.nested.category);

    repeats.then(|| DescendError::Circular {
        parent: RootPath::from_segments(segments[..ancestors].iter().cloned()).to_string(),
        name: pending.nested.name.clone(),
        category: pending.nested.category.clone(),
    })
}
