//! Base metadata facet: one row per tree position describing the component
//! itself. Identity is `category/name`.

use super::{Collected, FacetCollector, NodeContext, RawFacts};
use crate::error::ExtractionError;
use crate::record::FacetType;

pub struct FamilyBaseCollector;

impl FamilyBaseCollector {
    pub fn identity(name: &str, category: &str) -> String {
        format!("{}/{}", category.trim(), name.trim())
    }
}

impl FacetCollector for FamilyBaseCollector {
    fn facet_type(&self) -> FacetType {
        FacetType::FamilyBase
    }

    fn placeholder_label(&self) -> &'static str {
        "No base data present in family."
    }

    fn resource_noun(&self) -> &'static str {
        "family"
    }

    fn collect(&self, node: &NodeContext, _facts: &RawFacts) -> Result<Collected, ExtractionError> {
        if node.node_name.trim().is_empty() {
            return Err(node.extraction_error(self.facet_type(), "component has no name"));
        }
        let identity = Self::identity(&node.node_name, node.category());
        // The component exists at this position, which is its usage.
        Ok(vec![node.used_record(self.facet_type(), identity, node.node_name.clone())].into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::tests::node;

    #[test]
    fn test_one_row_per_node() {
        let records = FamilyBaseCollector
            .collect(&node("A::Nested1", &["Doors", "Generic Models"]), &RawFacts::Absent)
            .unwrap()
            .records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identity_key, "Generic Models/Nested1");
        assert_eq!(records[0].usage_counter, 1);
    }
}
