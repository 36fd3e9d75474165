//! Merging of per-file reports into one namespaced table.
//!
//! Each walk produces a table whose paths are only unique within that file.
//! Merging attaches the originating file identifier to every path as a
//! namespace. Rows are never dropped or deduplicated here.

use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::PipelineError;
use crate::outcome::Outcome;
use crate::record::{read_records, Record};
use crate::walk::FileWalk;

/// Flat records produced for one top-level file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub file_id: String,
    pub records: Vec<Record>,
}

impl FileReport {
    pub fn new(file_id: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            file_id: file_id.into(),
            records,
        }
    }
}

impl From<FileWalk> for FileReport {
    fn from(walk: FileWalk) -> Self {
        Self::new(walk.file_id, walk.records)
    }
}

/// Concatenate per-file reports, namespacing every path by its file.
///
/// Records that already carry a namespace (a previously merged table read
/// back in) keep it. Fails with "No loadable data found" if no report
/// contributed a row.
pub fn merge(reports: Vec<FileReport>) -> Outcome<Vec<Record>> {
    let file_count = reports.len();
    let mut merged = Vec::with_capacity(reports.iter().map(|r| r.records.len()).sum());

    for report in reports {
        if report.records.is_empty() {
            debug!(file = %report.file_id, "report has no rows");
        }
        for mut record in report.records {
            if record.namespace().is_none() {
                record.root_path = record.root_path.with_namespace(report.file_id.clone());
            }
            for entry in &mut record.used_by {
                if entry.root_path.namespace().is_none() {
                    entry.root_path = entry.root_path.clone().with_namespace(report.file_id.clone());
                }
            }
            merged.push(record);
        }
    }

    if merged.is_empty() {
        warn!("merge produced no rows");
        return Outcome::failure(merged, PipelineError::EmptyInput.to_string());
    }

    info!(records = merged.len(), files = file_count, "merged reports");
    let mut outcome = Outcome::success(merged);
    outcome.info(format!(
        "Merged {} records from {} files.",
        outcome.data.len(),
        file_count
    ));
    outcome
}

/// Read one per-file CSV report. The file stem is the file identifier.
///
/// Malformed rows are skipped with a warning.
pub fn read_report(path: &Path) -> anyhow::Result<Outcome<FileReport>> {
    let file_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let source_name = path.display().to_string();

    let file = File::open(path)?;
    let read = read_records(file, &source_name)?;

    let mut outcome = Outcome::success(FileReport::new(file_id, read.records));
    for skipped in read.skipped {
        warn!(error = %skipped, "skipping row");
        outcome.warn(skipped.to_string());
    }
    Ok(outcome)
}

/// Collect report files from the given inputs. Directories are searched
/// recursively for `*.csv` files; the result is sorted and deduplicated.
pub fn collect_report_paths(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = BTreeSet::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let is_csv = entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false);
                if is_csv {
                    paths.insert(entry.into_path());
                }
            }
        } else {
            paths.insert(input.clone());
        }
    }
    paths.into_iter().collect()
}

/// Read every report under `inputs`. A file that cannot be read contributes
/// no rows and a warning.
pub fn read_reports(inputs: &[PathBuf]) -> Outcome<Vec<FileReport>> {
    let mut outcome = Outcome::success(Vec::new());
    for path in collect_report_paths(inputs) {
        match read_report(&path) {
            Ok(report) => {
                let report = outcome.absorb(report);
                outcome.data.push(report);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read report");
                outcome.warn(format!("{}: {}", path.display(), e));
            }
        }
    }
    outcome
}

/// Combine a previously merged table with a new one.
///
/// Files present in the new table replace their previous rows; files only
/// present in the previous table are kept.
pub fn combine_with_previous(previous: Vec<Record>, new: Vec<Record>) -> Outcome<Vec<Record>> {
    let new_files: HashSet<String> = new.iter().map(|r| r.file_id().to_string()).collect();

    let mut replaced = HashSet::new();
    let mut retained = HashSet::new();
    let mut combined: Vec<Record> = Vec::with_capacity(previous.len() + new.len());
    for record in previous {
        if new_files.contains(record.file_id()) {
            replaced.insert(record.file_id().to_string());
        } else {
            retained.insert(record.file_id().to_string());
            combined.push(record);
        }
    }
    let added = new_files.len() - replaced.len();
    combined.extend(new);

    let mut outcome = Outcome::success(combined);
    outcome.info(format!(
        "Combined reports: {} files retained from previous, {} replaced, {} added.",
        retained.len(),
        replaced.len(),
        added
    ));
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FacetType, RootPath, UsedBy};
    use tempfile::TempDir;

    fn record(path: &str, identity: &str, counter: u32) -> Record {
        let root_path = RootPath::parse(path);
        Record {
            facet_type: FacetType::SharedParameter,
            node_name: root_path.leaf().unwrap_or("").to_string(),
            root_category_path: vec!["Doors".to_string(); root_path.segments().len()],
            root_path,
            node_file_path: "-".to_string(),
            identity_key: identity.to_string(),
            usage_counter: counter,
            used_by: Vec::new(),
            resource_name: String::new(),
        }
    }

    #[test]
    fn test_merge_namespaces_by_file() {
        let mut nested = record("A::Nested1", "guid-1", 1);
        nested.used_by.push(UsedBy {
            identity: "guid-1".to_string(),
            name: "P".to_string(),
            root_path: RootPath::parse("A::Nested1"),
        });
        let outcome = merge(vec![
            FileReport::new("A", vec![record("A", "guid-1", 0), nested]),
            FileReport::new("B", vec![record("B", "guid-1", 0)]),
        ]);

        assert!(outcome.is_success());
        let paths: Vec<String> = outcome.data.iter().map(|r| r.root_path.to_string()).collect();
        assert_eq!(paths, vec!["A|A", "A|A::Nested1", "B|B"]);
        assert_eq!(outcome.data[1].used_by[0].root_path.to_string(), "A|A::Nested1");
        // Namespace does not change which rows are roots.
        assert!(outcome.data[0].is_root());
    }

    #[test]
    fn test_merge_keeps_duplicates() {
        let outcome = merge(vec![FileReport::new(
            "A",
            vec![record("A", "guid-1", 0), record("A", "guid-1", 0)],
        )]);
        assert_eq!(outcome.data.len(), 2);
    }

    #[test]
    fn test_merge_empty_input() {
        let outcome = merge(Vec::new());
        assert!(!outcome.is_success());
        assert_eq!(outcome.message_log(), "No loadable data found");
        assert!(outcome.data.is_empty());

        let outcome = merge(vec![FileReport::new("A", Vec::new())]);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_merge_keeps_existing_namespace() {
        let mut already = record("A", "guid-1", 0);
        already.root_path = already.root_path.with_namespace("lib/A.rfa");
        let outcome = merge(vec![FileReport::new("merged", vec![already])]);
        assert_eq!(outcome.data[0].root_path.to_string(), "lib/A.rfa|A");
    }

    #[test]
    fn test_read_reports_skips_bad_rows() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("A.csv"),
            "facet_type,root_path,root_category_path,node_name,node_file_path,identity_key,usage_counter,used_by\n\
             SharedParameter,A,Doors,A,-,guid-1,0,\n\
             SharedParameter,A,Doors\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let outcome = read_reports(&[temp.path().to_path_buf()]);
        assert!(outcome.is_success());
        assert_eq!(outcome.data.len(), 1);
        assert_eq!(outcome.data[0].file_id, "A");
        assert_eq!(outcome.data[0].records.len(), 1);
        assert_eq!(outcome.count(crate::outcome::Severity::Warning), 1);
    }

    #[test]
    fn test_combine_with_previous() {
        let previous = merge(vec![
            FileReport::new("A", vec![record("A", "old", 0)]),
            FileReport::new("B", vec![record("B", "old", 0)]),
        ])
        .data;
        let new = merge(vec![
            FileReport::new("A", vec![record("A", "new", 1)]),
            FileReport::new("C", vec![record("C", "new", 0)]),
        ])
        .data;

        let outcome = combine_with_previous(previous, new);
        let rows: Vec<(String, String)> = outcome
            .data
            .iter()
            .map(|r| (r.root_path.to_string(), r.identity_key.clone()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("B|B".to_string(), "old".to_string()),
                ("A|A".to_string(), "new".to_string()),
                ("C|C".to_string(), "new".to_string()),
            ]
        );
        assert!(outcome
            .message_log()
            .contains("1 files retained from previous, 1 replaced, 1 added"));
    }
}
