//! Host warnings facet. Informational; never purged.

use super::{Collected, FacetCollector, NodeContext, RawFacts};
use crate::error::ExtractionError;
use crate::record::FacetType;

pub struct WarningCollector;

impl FacetCollector for WarningCollector {
    fn facet_type(&self) -> FacetType {
        FacetType::Warning
    }

    fn placeholder_label(&self) -> &'static str {
        "No warnings present in family."
    }

    fn resource_noun(&self) -> &'static str {
        "warning"
    }

    fn collect(&self, node: &NodeContext, facts: &RawFacts) -> Result<Collected, ExtractionError> {
        let warnings = match facts {
            RawFacts::Warnings(warnings) => warnings,
            RawFacts::Absent => return Ok(Collected::default()),
            other => {
                return Err(node.extraction_error(
                    self.facet_type(),
                    format!("expected warnings facts, got {}", other.kind()),
                ))
            }
        };

        let records: Vec<_> = warnings
            .iter()
            .map(|w| {
                let identity = w.guid.trim().to_lowercase();
                // A reported warning is present by definition.
                node.used_record(self.facet_type(), identity, w.description.clone())
            })
            .collect();
        Ok(records.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::tests::node;
    use crate::facet::WarningFact;

    #[test]
    fn test_warnings_are_used_records() {
        let facts = RawFacts::Warnings(vec![WarningFact {
            guid: "B4176CEF-6086-45A8-A066-C3FD424C9412".to_string(),
            description: "Elements have duplicate 'Type Mark' values.".to_string(),
            element_ids: vec![311, 312],
        }]);
        let records = WarningCollector.collect(&node("A", &["Doors"]), &facts).unwrap().records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identity_key, "b4176cef-6086-45a8-a066-c3fd424c9412");
        assert!(records[0].is_used());
        assert!(!WarningCollector.is_purgeable());
    }
}
