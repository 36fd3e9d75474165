//! Bottom-up usage propagation over the merged table.
//!
//! Records are grouped by facet and identity. If any member of a group is
//! used, every unused root record in the group is marked used and cites the
//! used nested members. Roots are never cited as contributors. This is a fold over groups: the result does not depend on
//! input order and a second pass changes nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::outcome::Outcome;
use crate::record::{FacetType, Record, UsedBy};

/// Which records share a propagation group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationScope {
    /// Group by identity within each top-level file.
    #[default]
    PerFile,
    /// Group by identity across the whole merged forest.
    Global,
}

impl std::fmt::Display for PropagationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropagationScope::PerFile => write!(f, "per_file"),
            PropagationScope::Global => write!(f, "global"),
        }
    }
}

/// Counts from one propagation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PropagationSummary {
    pub groups: usize,
    pub used_groups: usize,
    pub roots_updated: usize,
    pub entries_added: usize,
}

type GroupKey = (FacetType, Option<String>, String);

/// Folds usage from any group member onto the group's root records.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsagePropagator {
    scope: PropagationScope,
}

impl UsagePropagator {
    pub fn new(scope: PropagationScope) -> Self {
        Self { scope }
    }

    /// Propagate usage and report the pass as an outcome.
    pub fn propagate(&self, mut records: Vec<Record>) -> Outcome<Vec<Record>> {
        let summary = self.propagate_in_place(&mut records);
        let mut outcome = Outcome::success(records);
        outcome.info(format!(
            "Propagated {} identity groups ({} used, scope {}): {} root records marked used.",
            summary.groups, summary.used_groups, self.scope, summary.roots_updated
        ));
        outcome
    }

    /// Propagate usage in place. Placeholder rows are ignored.
    pub fn propagate_in_place(&self, records: &mut [Record]) -> PropagationSummary {
        let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
        for (index, record) in records.iter().enumerate() {
            if record.is_placeholder() {
                continue;
            }
            groups.entry(self.key(record)).or_default().push(index);
        }

        let mut summary = PropagationSummary {
            groups: groups.len(),
            ..PropagationSummary::default()
        };

        for (key, members) in &groups {
            if !members.iter().any(|&i| records[i].is_used()) {
                continue;
            }
            let mut contributions: Vec<UsedBy> = members
                .iter()
                .map(|&i| &records[i])
                .filter(|r| r.is_used() && !r.is_root())
                .map(Record::as_used_by)
                .collect();
            contributions.sort();
            contributions.dedup();
            summary.used_groups += 1;

            for &i in members {
                let target = &mut records[i];
                if !target.is_root() || target.is_used() {
                    continue;
                }
                let added = contributions
                    .iter()
                    .filter(|entry| target.add_used_by((*entry).clone()))
                    .count();
                target.usage_counter += added.max(1) as u32;
                summary.roots_updated += 1;
                summary.entries_added += added;
                debug!(
                    facet = %key.0,
                    identity = %key.2,
                    root = %target.root_path,
                    "root marked used"
                );
            }
        }

        info!(
            groups = summary.groups,
            used = summary.used_groups,
            roots_updated = summary.roots_updated,
            "propagation complete"
        );
        summary
    }

    fn key(&self, record: &Record) -> GroupKey {
        let namespace = match self.scope {
            PropagationScope::PerFile => Some(record.file_id().to_string()),
            PropagationScope::Global => None,
        };
        (record.facet_type, namespace, record.identity_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{merge, FileReport};
    use crate::record::RootPath;

    fn record(path: &str, identity: &str, counter: u32) -> Record {
        let root_path = RootPath::parse(path);
        let mut record = Record {
            facet_type: FacetType::SharedParameter,
            node_name: root_path.leaf().unwrap_or("").to_string(),
            root_category_path: vec!["Generic Models".to_string(); root_path.segments().len()],
            root_path,
            node_file_path: "-".to_string(),
            identity_key: identity.to_string(),
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

    fn two_file_table() -> Vec<Record> {
        merge(vec![
            FileReport::new("A", vec![record("A", "GUID-1", 0), record("A::Nested1", "GUID-1", 1)]),
            FileReport::new("B", vec![record("B", "GUID-1", 0)]),
        ])
        .data
    }

    #[test]
    fn test_two_file_scenario() {
        let outcome = UsagePropagator::default().propagate(two_file_table());
        let a = &outcome.data[0];
        let b = &outcome.data[2];

        assert_eq!(a.usage_counter, 1);
        assert_eq!(a.used_by.len(), 1);
        assert_eq!(a.used_by[0].root_path.path_string(), "A::Nested1");
        assert_eq!(b.usage_counter, 0);
        assert!(b.used_by.is_empty());
    }

    #[test]
    fn test_global_scope_crosses_files() {
        let outcome = UsagePropagator::new(PropagationScope::Global).propagate(two_file_table());
        assert_eq!(outcome.data[2].usage_counter, 1);
        assert_eq!(outcome.data[2].used_by[0].root_path.to_string(), "A|A::Nested1");
    }

    #[test]
    fn test_used_root_is_not_cited() {
        let table = merge(vec![
            FileReport::new("A", vec![record("A", "GUID-1", 1), record("A::N", "GUID-1", 1)]),
            FileReport::new("B", vec![record("B", "GUID-1", 0)]),
        ])
        .data;
        let outcome = UsagePropagator::new(PropagationScope::Global).propagate(table);
        let b = &outcome.data[2];

        let cited: Vec<String> = b.used_by.iter().map(|u| u.root_path.to_string()).collect();
        assert_eq!(cited, vec!["A|A::N"]);
        assert_eq!(b.usage_counter, 1);
    }

    #[test]
    fn test_used_root_alone_still_marks_group() {
        let table = merge(vec![
            FileReport::new("A", vec![record("A", "GUID-1", 1)]),
            FileReport::new("B", vec![record("B", "GUID-1", 0)]),
        ])
        .data;
        let outcome = UsagePropagator::new(PropagationScope::Global).propagate(table);
        assert_eq!(outcome.data[1].usage_counter, 1);
        assert!(outcome.data[1].used_by.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let propagator = UsagePropagator::default();
        let once = propagator.propagate(two_file_table()).data;
        let twice = propagator.propagate(once.clone()).data;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_used_root_untouched() {
        let mut table = two_file_table();
        table[0].usage_counter = 3;
        let before = table[0].clone();
        UsagePropagator::default().propagate_in_place(&mut table);
        assert_eq!(table[0], before);
    }

    #[test]
    fn test_facets_do_not_mix() {
        let mut pattern = record("A::Nested1", "GUID-1", 1);
        pattern.facet_type = FacetType::LinePattern;
        let mut table = merge(vec![FileReport::new("A", vec![record("A", "GUID-1", 0), pattern])]).data;
        let summary = UsagePropagator::default().propagate_in_place(&mut table);
        assert_eq!(summary.groups, 2);
        assert_eq!(table[0].usage_counter, 0);
    }

    #[test]
    fn test_placeholders_ignored() {
        let mut table = merge(vec![FileReport::new(
            "A",
            vec![record("A", "", 0), record("A::N", "", 1)],
        )])
        .data;
        let summary = UsagePropagator::default().propagate_in_place(&mut table);
        assert_eq!(summary.groups, 0);
        assert_eq!(table[0].usage_counter, 0);
    }

    #[test]
    fn test_counter_grows_by_contributors() {
        let mut table = merge(vec![FileReport::new(
            "A",
            vec![
                record("A", "GUID-1", 0),
                record("A::N1", "GUID-1", 1),
                record("A::N2", "GUID-1", 1),
            ],
        )])
        .data;
        UsagePropagator::default().propagate_in_place(&mut table);
        assert_eq!(table[0].usage_counter, 2);
        let cited: Vec<String> = table[0].used_by.iter().map(|u| u.root_path.path_string()).collect();
        assert_eq!(cited, vec!["A::N1", "A::N2"]);
    }
}
