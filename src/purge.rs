//! Purge decisions over propagated root records.
//!
//! A root record that is still unused after propagation is a candidate for
//! deletion from its top-level file. Retain-one guards then put back one
//! member of any protected family that would otherwise lose every member.

use std::collections::{BTreeSet, HashSet};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::facet::FacetRegistry;
use crate::outcome::Outcome;
use crate::policy::{PurgePolicy, RetainOneGuard};
use crate::record::{FacetType, Record};

/// A resource considered safe to delete from one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeCandidate {
    pub file_id: String,
    pub root_path: String,
    pub facet_type: FacetType,
    pub identity_key: String,
    pub resource_name: String,
    pub justification: String,
}

/// A candidate kept back by a guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetainedCandidate {
    pub candidate: PurgeCandidate,
    pub family: String,
    pub reason: String,
}

/// Decision for one facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeDecision {
    pub facet_type: FacetType,
    pub candidates: Vec<PurgeCandidate>,
    pub retained: Vec<RetainedCandidate>,
}

impl PurgeDecision {
    pub fn empty(facet_type: FacetType) -> Self {
        Self {
            facet_type,
            candidates: Vec::new(),
            retained: Vec::new(),
        }
    }

    /// Identities to delete, in decision order.
    pub fn ids(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.identity_key.as_str()).collect()
    }
}

struct CompiledGuard<'p> {
    guard: &'p RetainOneGuard,
    files: Option<GlobSet>,
}

impl CompiledGuard<'_> {
    fn covers(&self, facet: FacetType, file_id: &str) -> bool {
        self.guard.applies_to(facet)
            && self
                .files
                .as_ref()
                .map(|set| set.is_match(file_id))
                .unwrap_or(true)
    }
}

/// Decides which unused root records may be deleted.
pub struct PurgeDecisionEngine<'r> {
    registry: &'r FacetRegistry,
    guards: Vec<CompiledGuard<'r>>,
    excluded: Option<GlobSet>,
}

impl<'r> PurgeDecisionEngine<'r> {
    /// Build an engine for a policy. Fails on invalid glob patterns.
    pub fn new(registry: &'r FacetRegistry, policy: &'r PurgePolicy) -> anyhow::Result<Self> {
        let guards = policy
            .guards
            .iter()
            .map(|guard| {
                Ok(CompiledGuard {
                    guard,
                    files: build_globset(&guard.files)?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            registry,
            guards,
            excluded: build_globset(&policy.excluded_files)?,
        })
    }

    /// Decide for one facet over the propagated table.
    pub fn decide(&self, facet: FacetType, records: &[Record]) -> Outcome<PurgeDecision> {
        let collector = match self.registry.get(facet) {
            Some(c) if c.is_purgeable() => c,
            _ => {
                return Outcome::failure(
                    PurgeDecision::empty(facet),
                    PipelineError::NotPurgeable(facet).to_string(),
                )
            }
        };
        if records.is_empty() {
            return Outcome::failure(PurgeDecision::empty(facet), PipelineError::EmptyInput.to_string());
        }

        let mut outcome = Outcome::success(PurgeDecision::empty(facet));
        let roots: Vec<&Record> = records
            .iter()
            .filter(|r| r.facet_type == facet && r.is_root() && !r.is_placeholder())
            .collect();

        let mut seen = HashSet::new();
        let mut excluded_files = BTreeSet::new();
        for record in roots.iter().filter(|r| !r.is_used()) {
            if self.is_excluded(record.file_id()) {
                excluded_files.insert(record.file_id().to_string());
                continue;
            }
            if !seen.insert((record.file_id(), record.identity_key.as_str())) {
                continue;
            }
            outcome.data.candidates.push(PurgeCandidate {
                file_id: record.file_id().to_string(),
                root_path: record.root_path.to_string(),
                facet_type: facet,
                identity_key: record.identity_key.clone(),
                resource_name: record.display_name().to_string(),
                justification: format!(
                    "{} {:?} is not used by {} or any family nested in it",
                    collector.resource_noun(),
                    record.display_name(),
                    record.root_path.path_string()
                ),
            });
        }
        outcome.data.candidates.sort_by(|a, b| {
            (&a.file_id, &a.root_path, &a.identity_key).cmp(&(&b.file_id, &b.root_path, &b.identity_key))
        });

        self.apply_guards(facet, &roots, &mut outcome.data);

        if !excluded_files.is_empty() {
            outcome.info(format!(
                "{} files excluded from {} purge by policy.",
                excluded_files.len(),
                facet
            ));
        }
        for retained in &outcome.data.retained {
            debug!(family = %retained.family, identity = %retained.candidate.identity_key, "candidate retained");
        }
        let summary = format!(
            "{}: {} purge candidates, {} retained by guards.",
            facet,
            outcome.data.candidates.len(),
            outcome.data.retained.len()
        );
        info!(facet = %facet, candidates = outcome.data.candidates.len(), "purge decided");
        outcome.info(summary);
        outcome
    }

    fn apply_guards(&self, facet: FacetType, roots: &[&Record], decision: &mut PurgeDecision) {
        let files: BTreeSet<&str> = roots.iter().map(|r| r.file_id()).collect();

        for compiled in &self.guards {
            let guard = compiled.guard;
            for &file_id in &files {
                if !compiled.covers(facet, file_id) {
                    continue;
                }

                // Members of the family present in this file, in guard order.
                let present: Vec<&str> = guard
                    .members
                    .iter()
                    .map(String::as_str)
                    .filter(|member| {
                        roots
                            .iter()
                            .filter(|r| r.file_id() == file_id)
                            .any(|r| guard.member_of(r) == Some(*member))
                    })
                    .collect();
                let Some(&first) = present.first() else {
                    continue;
                };

                let is_candidate = |member: &str| {
                    decision
                        .candidates
                        .iter()
                        .any(|c| c.file_id == file_id && candidate_is(guard, c) == Some(member))
                };
                if !present.iter().all(|m| is_candidate(*m)) {
                    continue;
                }

                let position = decision
                    .candidates
                    .iter()
                    .position(|c| c.file_id == file_id && candidate_is(guard, c) == Some(first));
                if let Some(position) = position {
                    let candidate = decision.candidates.remove(position);
                    decision.retained.push(RetainedCandidate {
                        reason: format!(
                            "kept so that {} retains at least one member in {}",
                            guard.family, file_id
                        ),
                        family: guard.family.clone(),
                        candidate,
                    });
                }
            }
        }
    }

    fn is_excluded(&self, file_id: &str) -> bool {
        self.excluded
            .as_ref()
            .map(|set| set.is_match(file_id))
            .unwrap_or(false)
    }
}

/// Guard member a candidate stands for, matched the same way as records.
fn candidate_is<'g>(guard: &'g RetainOneGuard, candidate: &PurgeCandidate) -> Option<&'g str> {
    guard
        .members
        .iter()
        .find(|m| {
            m.eq_ignore_ascii_case(&candidate.identity_key) || m.as_str() == candidate.resource_name
        })
        .map(String::as_str)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}
