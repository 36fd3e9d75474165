//! Shared parameter usage facet. Identity is the parameter GUID.

use lazy_static::lazy_static;
use regex::Regex;

use super::{Collected, FacetCollector, NodeContext, RawFacts};
use crate::error::ExtractionError;
use crate::record::FacetType;

lazy_static! {
    static ref GUID: Regex =
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .unwrap();
}

pub struct SharedParameterCollector;

impl SharedParameterCollector {
    /// Normalized identity for a parameter GUID, or `None` if it is not a
    /// GUID.
    pub fn identity(guid: &str) -> Option<String> {
        let guid = guid.trim().trim_matches(|c| c == '{' || c == '}');
        GUID.is_match(guid).then(|| guid.to_lowercase())
    }
}

impl FacetCollector for SharedParameterCollector {
    fn facet_type(&self) -> FacetType {
        FacetType::SharedParameter
    }

    fn placeholder_label(&self) -> &'static str {
        "No shared parameter present in family."
    }

    fn resource_noun(&self) -> &'static str {
        "shared parameter"
    }

    fn is_purgeable(&self) -> bool {
        true
    }

    fn collect(&self, node: &NodeContext, facts: &RawFacts) -> Result<Collected, ExtractionError> {
        let parameters = match facts {
            RawFacts::SharedParameters(parameters) => parameters,
            RawFacts::Absent => return Ok(Collected::default()),
            other => {
                return Err(node.extraction_error(
                    self.facet_type(),
                    format!("expected shared_parameters facts, got {}", other.kind()),
                ))
            }
        };

        let mut collected = Collected::default();
        for parameter in parameters {
            let Some(identity) = Self::identity(&parameter.guid) else {
                collected.skipped.push(node.extraction_error(
                    self.facet_type(),
                    format!("parameter {:?} has invalid GUID {:?}", parameter.name, parameter.guid),
                ));
                continue;
            };

            let record = if parameter.used {
                node.used_record(self.facet_type(), identity, parameter.name.clone())
            } else {
                node.record(self.facet_type(), identity, parameter.name.clone())
            };
            collected.records.push(record);
        }
        Ok(collected)
    }
}
