//! Cross-file analysis over the merged forest.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::record::{FacetType, Record};

/// A nested component that is never walked as a top-level file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingFamily {
    pub name: String,
    pub category: String,
    /// Paths at which the component is nested, sorted.
    pub referenced_from: Vec<String>,
}

/// Nested components whose `(name, category)` never occurs as the root of a
/// top-level file. Only base metadata rows are considered.
pub fn missing_families(records: &[Record]) -> Vec<MissingFamily> {
    let base = records
        .iter()
        .filter(|r| r.facet_type == FacetType::FamilyBase && !r.is_placeholder());

    let roots: HashSet<(&str, &str)> = base
        .clone()
        .filter(|r| r.is_root())
        .map(|r| (r.node_name.as_str(), category_of(r)))
        .collect();

    let mut missing: BTreeMap<(&str, &str), Vec<String>> = BTreeMap::new();
    for record in base.filter(|r| !r.is_root()) {
        let key = (record.node_name.as_str(), category_of(record));
        if !roots.contains(&key) {
            missing
                .entry(key)
                .or_default()
                .push(record.root_path.to_string());
        }
    }

    missing
        .into_iter()
        .map(|((name, category), mut referenced_from)| {
            referenced_from.sort();
            referenced_from.dedup();
            MissingFamily {
                name: name.to_string(),
                category: category.to_string(),
                referenced_from,
            }
        })
        .collect()
}

fn category_of(record: &Record) -> &str {
    record
        .root_category_path
        .last()
        .map(String::as_str)
        .unwrap_or("")
}
