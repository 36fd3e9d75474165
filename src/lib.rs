//! Nestsweep - nested component dependency aggregation.
//!
//! Nestsweep walks the nesting tree of every top-level component in a
//! library, records which shared resources (shared parameters, line
//! patterns, warnings) each nested component carries, and then decides
//! which of those resources are safe to purge from the top-level files.
//!
//! # Architecture
//!
//! - `walk`: Depth-first traversal over a [`walk::HostSession`]
//! - `facet`: Collectors that turn raw node facts into records
//! - `record`: The shared row model and its CSV codec
//! - `merge`: Combines per-file reports into one namespaced table
//! - `propagate`: Pushes usage from nested members up to their roots
//! - `chunk`: Worker-count policy and chunked parallel execution
//! - `scan`: Post-walk statistics and consistency checks
//! - `purge`: Purge candidates plus retain-one guards
//! - `policy`: YAML policy schema
//! - `report`: Output formatting (CSV, JSON, pretty)
//!
//! # Adding a New Facet
//!
//! See `src/facet/` for examples. Implement `FacetCollector` and register
//! it in `FacetRegistry::with_defaults`.

pub mod analysis;
pub mod chunk;
pub mod cli;
pub mod error;
pub mod facet;
pub mod logger;
pub mod merge;
pub mod outcome;
pub mod pipeline;
pub mod policy;
pub mod propagate;
pub mod purge;
pub mod record;
pub mod report;
pub mod scan;
pub mod walk;

pub use chunk::{worker_count, CancellationToken, WorkChunker};
pub use facet::{FacetCollector, FacetRegistry};
pub use merge::{combine_with_previous, merge, FileReport};
pub use outcome::{Message, Outcome, Severity, Status};
pub use pipeline::{walk_library, Pipeline, PipelineOutput};
pub use policy::PurgePolicy;
pub use propagate::{PropagationScope, UsagePropagator};
pub use purge::{PurgeDecision, PurgeDecisionEngine};
pub use record::{FacetType, Record, RootPath, UsedBy};
pub use walk::{ComponentLibrary, HostSession, TreeWalker};
