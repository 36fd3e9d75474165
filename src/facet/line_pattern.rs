//! Line pattern usage facet.
//!
//! Patterns are correlated across components by name; element ids differ
//! from one document to the next, so the id only appears in the resource
//! name.

use super::{Collected, FacetCollector, NodeContext, RawFacts};
use crate::error::ExtractionError;
use crate::record::{FacetType, UsedBy};

pub struct LinePatternCollector;

impl FacetCollector for LinePatternCollector {
    fn facet_type(&self) -> FacetType {
        FacetType::LinePattern
    }

    fn placeholder_label(&self) -> &'static str {
        "No line pattern present in family."
    }

    fn resource_noun(&self) -> &'static str {
        "line pattern"
    }

    fn is_purgeable(&self) -> bool {
        true
    }

    fn collect(&self, node: &NodeContext, facts: &RawFacts) -> Result<Collected, ExtractionError> {
        let patterns = match facts {
            RawFacts::LinePatterns(patterns) => patterns,
            RawFacts::Absent => return Ok(Collected::default()),
            other => {
                return Err(node.extraction_error(
                    self.facet_type(),
                    format!("expected line_patterns facts, got {}", other.kind()),
                ))
            }
        };

        let mut collected = Collected::default();
        for pattern in patterns {
            let name = pattern.name.trim();
            if name.is_empty() {
                collected.skipped.push(node.extraction_error(
                    self.facet_type(),
                    format!("line pattern {} has no name", pattern.id),
                ));
                continue;
            }

            let resource_name = format!("{} [{}]", name, pattern.id);
            let mut record = node.record(self.facet_type(), name, resource_name);
            for user in &pattern.used_by {
                record.add_used_by(UsedBy {
                    identity: name.to_string(),
                    name: user.clone(),
                    root_path: node.root_path.clone(),
                });
            }
            if !record.used_by.is_empty() {
                record.usage_counter = 1;
            }
            collected.records.push(record);
        }
        Ok(collected)
    }
}
