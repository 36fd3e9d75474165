//! Pipeline that orchestrates every post-walk stage.
//!
//! ```text
//! FileReport* ─▶ merge ─▶ propagate ─▶ scan (chunked) ─▶ purge (per facet)
//! ```
//!
//! Walks happen before this, one top-level file at a time; see
//! [`walk_library`].

use serde::Serialize;
use tracing::info;

use crate::analysis::{missing_families, MissingFamily};
use crate::chunk::WorkChunker;
use crate::error::PipelineError;
use crate::facet::FacetRegistry;
use crate::merge::{merge, FileReport};
use crate::outcome::Outcome;
use crate::policy::PurgePolicy;
use crate::propagate::UsagePropagator;
use crate::purge::{PurgeDecision, PurgeDecisionEngine};
use crate::record::Record;
use crate::scan::{scan_records, ScanReport};
use crate::walk::{ComponentLibrary, FileWalk, TreeWalker};

/// Everything a pipeline run produces.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOutput {
    /// The merged, propagated table.
    pub records: Vec<Record>,
    pub scan: ScanReport,
    pub decisions: Vec<PurgeDecision>,
    pub missing: Vec<MissingFamily>,
}

impl PipelineOutput {
    pub fn candidate_count(&self) -> usize {
        self.decisions.iter().map(|d| d.candidates.len()).sum()
    }
}

/// Runs merge, propagation, scan and purge decisions.
pub struct Pipeline<'a> {
    registry: &'a FacetRegistry,
    policy: &'a PurgePolicy,
    chunker: WorkChunker,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline. The policy's worker count wins over
    /// `default_workers`, which the caller resolves once at startup.
    pub fn new(registry: &'a FacetRegistry, policy: &'a PurgePolicy, default_workers: usize) -> Self {
        let workers = policy.workers.unwrap_or(default_workers);
        Self {
            registry,
            policy,
            chunker: WorkChunker::new(workers),
        }
    }

    /// Replace the chunker (worker count or cancellation token).
    pub fn with_chunker(mut self, chunker: WorkChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn chunker(&self) -> &WorkChunker {
        &self.chunker
    }

    /// Merge per-file reports and run every later stage.
    pub fn run(&self, reports: Vec<FileReport>) -> Outcome<PipelineOutput> {
        let mut merged = merge(reports);
        if merged.data.is_empty() {
            return merged.map(|_| PipelineOutput::default());
        }
        let records = std::mem::take(&mut merged.data);
        let stages = self.run_merged(records);
        merged.combine(stages, |_, output| output)
    }

    /// Run propagation, scan and purge over an already merged table.
    pub fn run_merged(&self, records: Vec<Record>) -> Outcome<PipelineOutput> {
        if records.is_empty() {
            return Outcome::failure(PipelineOutput::default(), PipelineError::EmptyInput.to_string());
        }

        let propagator = UsagePropagator::new(self.policy.scope);
        let mut outcome = propagator.propagate(records).map(|records| PipelineOutput {
            records,
            ..PipelineOutput::default()
        });

        let scan = scan_records(&outcome.data.records, &self.chunker);
        let scan = outcome.absorb(scan);
        outcome.data.scan = scan;

        outcome.data.missing = missing_families(&outcome.data.records);
        if !outcome.data.missing.is_empty() {
            let text = format!(
                "{} nested families are never walked as top-level files.",
                outcome.data.missing.len()
            );
            outcome.info(text);
        }

        let engine = match PurgeDecisionEngine::new(self.registry, self.policy) {
            Ok(engine) => engine,
            Err(e) => {
                outcome.error(format!("invalid purge policy: {}", e));
                return outcome;
            }
        };
        for facet in self.policy.facets_or_default(self.registry) {
            let decision = engine.decide(facet, &outcome.data.records);
            let decision = outcome.absorb(decision);
            outcome.data.decisions.push(decision);
        }

        info!(
            records = outcome.data.records.len(),
            candidates = outcome.data.candidate_count(),
            status = %outcome.status,
            "pipeline complete"
        );
        outcome
    }
}

/// Walk every top-level component of a library, one at a time.
///
/// `on_file` is called after each walk. A top-level component that cannot be
/// opened contributes no report.
pub fn walk_library<F>(
    library: &ComponentLibrary,
    registry: &FacetRegistry,
    mut on_file: F,
) -> Outcome<Vec<FileReport>>
where
    F: FnMut(&FileWalk),
{
    let walker = TreeWalker::new(registry);
    let mut outcome = Outcome::success(Vec::new());

    for root in library.top_level() {
        let walk = walker.walk(library.session(root));
        let failed = !walk.is_success();
        let walk = outcome.absorb(walk);
        on_file(&walk);
        if !failed {
            outcome.data.push(FileReport::from(walk));
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FacetType, RootPath};

    fn shared(path: &str, counter: u32) -> Record {
        let root_path = RootPath::parse(path);
        let mut record = Record {
            facet_type: FacetType::SharedParameter,
            node_name: root_path.leaf().unwrap_or("").to_string(),
            root_category_path: vec!["Generic Models".to_string(); root_path.segments().len()],
            root_path,
            node_file_path: "-".to_string(),
            identity_key: "guid-1".to_string(),
            usage_counter: counter,
            used_by: Vec::new(),
            resource_name: "P".to_string(),
        };
        if counter > 0 {
            let entry = record.as_used_by();
            record.used_by.push(entry);
        }
        record
    }

    #[test]
    fn test_run_two_files() {
        let registry = FacetRegistry::with_defaults();
        let policy = PurgePolicy::default();
        let pipeline = Pipeline::new(&registry, &policy, 2);
        let outcome = pipeline.run(vec![
            FileReport::new("A", vec![shared("A", 0), shared("A::Nested1", 1)]),
            FileReport::new("B", vec![shared("B", 0)]),
        ]);

        assert!(outcome.is_success());
        assert_eq!(outcome.data.records.len(), 3);
        assert_eq!(outcome.data.decisions.len(), 2);
        let shared_decision = &outcome.data.decisions[0];
        assert_eq!(shared_decision.facet_type, FacetType::SharedParameter);
        assert_eq!(shared_decision.candidates.len(), 1);
        assert_eq!(shared_decision.candidates[0].file_id, "B");
        assert_eq!(outcome.data.scan.files.len(), 2);
    }

    #[test]
    fn test_policy_workers_override_default() {
        let registry = FacetRegistry::with_defaults();
        let mut policy = PurgePolicy::default();
        assert_eq!(Pipeline::new(&registry, &policy, 3).chunker().workers(), 3);

        policy.workers = Some(5);
        assert_eq!(Pipeline::new(&registry, &policy, 3).chunker().workers(), 5);
    }

    #[test]
    fn test_run_empty() {
        let registry = FacetRegistry::with_defaults();
        let policy = PurgePolicy::default();
        let outcome = Pipeline::new(&registry, &policy, 1).run(Vec::new());
        assert!(!outcome.is_success());
        assert_eq!(outcome.message_log(), "No loadable data found");
        assert_eq!(outcome.data.candidate_count(), 0);
    }
}
