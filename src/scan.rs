//! Post-walk scan of the merged table.
//!
//! Each chunk is scanned independently into its own [`ScanReport`]; the
//! reports are folded together by the coordinating thread. The scan
//! re-validates rows, gathers per-file statistics and finds components that
//! nest themselves.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::info;

use crate::chunk::{ChunkOutcome, WorkChunker};
use crate::outcome::Outcome;
use crate::record::{FacetType, Record};

/// Counts for one top-level file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileStatistics {
    pub records: usize,
    pub per_facet: BTreeMap<String, usize>,
    pub root_records: usize,
    pub used_roots: usize,
    pub unused_roots: usize,
    pub placeholders: usize,
    pub max_depth: usize,
}

impl FileStatistics {
    fn add(&mut self, record: &Record) {
        self.records += 1;
        *self
            .per_facet
            .entry(record.facet_type.as_str().to_string())
            .or_default() += 1;
        if record.is_placeholder() {
            self.placeholders += 1;
        } else if record.is_root() {
            self.root_records += 1;
            if record.is_used() {
                self.used_roots += 1;
            } else {
                self.unused_roots += 1;
            }
        }
        self.max_depth = self.max_depth.max(record.root_path.depth());
    }

    fn merge(&mut self, other: FileStatistics) {
        self.records += other.records;
        for (facet, count) in other.per_facet {
            *self.per_facet.entry(facet).or_default() += count;
        }
        self.root_records += other.root_records;
        self.used_roots += other.used_roots;
        self.unused_roots += other.unused_roots;
        self.placeholders += other.placeholders;
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}

/// An inconsistent row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    pub root_path: String,
    pub facet_type: FacetType,
    pub issue: String,
}

impl std::fmt::Display for RowIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} row at {}: {}", self.facet_type, self.root_path, self.issue)
    }
}

/// A component that appears inside its own nesting chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircularNesting {
    pub file_id: String,
    pub root_path: String,
    pub name: String,
    pub category: String,
}

impl std::fmt::Display for CircularNesting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "circular nesting in {}: {} ({}) repeats along {}",
            self.file_id, self.name, self.category, self.root_path
        )
    }
}

/// Result of scanning some or all of the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub files: BTreeMap<String, FileStatistics>,
    pub issues: Vec<RowIssue>,
    pub circular: Vec<CircularNesting>,
}

impl ScanReport {
    /// Fold another chunk's report into this one. Chunks must be merged in
    /// table order to keep issue order stable.
    pub fn merge(&mut self, other: ScanReport) {
        for (file_id, stats) in other.files {
            self.files.entry(file_id).or_default().merge(stats);
        }
        self.issues.extend(other.issues);
        self.circular.extend(other.circular);
    }
}

/// Scan one chunk of records.
pub fn scan_chunk(records: &[Record]) -> ScanReport {
    let mut report = ScanReport::default();
    for record in records {
        report
            .files
            .entry(record.file_id().to_string())
            .or_default()
            .add(record);

        report.issues.extend(validate(record));

        if record.facet_type == FacetType::FamilyBase {
            if let Some(circular) = find_circular(record) {
                report.circular.push(circular);
            }
        }
    }
    report
}

fn validate(record: &Record) -> Vec<RowIssue> {
    let mut issues = Vec::new();
    let mut issue = |text: String| {
        issues.push(RowIssue {
            root_path: record.root_path.to_string(),
            facet_type: record.facet_type,
            issue: text,
        })
    };

    let segments = record.root_path.segments().len();
    if record.root_category_path.len() != segments {
        issue(format!(
            "category path has {} entries for a path of {} segments",
            record.root_category_path.len(),
            segments
        ));
    }
    if record.root_path.segments().iter().any(|s| s.is_empty()) {
        issue("path has an empty segment".to_string());
    }
    if record.usage_counter == 0 && !record.used_by.is_empty() {
        issue(format!("unused row cites {} users", record.used_by.len()));
    }
    issues
}

/// The first `(name, category)` pair that repeats along a record's path.
fn find_circular(record: &Record) -> Option<CircularNesting> {
    let mut seen = HashSet::new();
    record
        .root_path
        .segments()
        .iter()
        .zip(record.root_category_path.iter())
        .find(|(name, category)| !seen.insert((name.as_str(), category.as_str())))
        .map(|(name, category)| CircularNesting {
            file_id: record.file_id().to_string(),
            root_path: record.root_path.to_string(),
            name: name.clone(),
            category: category.clone(),
        })
}

/// Scan the whole table over the chunker's workers.
///
/// A failed chunk is an error; its rows are missing from the report. A
/// cancelled chunk is a warning.
pub fn scan_records(records: &[Record], chunker: &WorkChunker) -> Outcome<ScanReport> {
    scan_with(records, chunker, scan_chunk)
}

fn scan_with<F>(records: &[Record], chunker: &WorkChunker, job: F) -> Outcome<ScanReport>
where
    F: Fn(&[Record]) -> ScanReport + Sync,
{
    let mut outcome = Outcome::success(ScanReport::default());

    for chunk in chunker.run(records, job) {
        match chunk.outcome {
            ChunkOutcome::Completed(report) => outcome.data.merge(report),
            ChunkOutcome::Failed(e) => outcome.error(e.to_string()),
            ChunkOutcome::Cancelled => outcome.warn(format!(
                "chunk {} (rows {}..{}) cancelled",
                chunk.index, chunk.range.start, chunk.range.end
            )),
        }
    }

    let issue_messages: Vec<String> = outcome.data.issues.iter().map(|i| i.to_string()).collect();
    let circular_messages: Vec<String> = outcome.data.circular.iter().map(|c| c.to_string()).collect();
    for text in issue_messages.into_iter().chain(circular_messages) {
        outcome.warn(text);
    }

    info!(
        files = outcome.data.files.len(),
        issues = outcome.data.issues.len(),
        circular = outcome.data.circular.len(),
        workers = chunker.workers(),
        "scan complete"
    );
    outcome.info(format!(
        "Scanned {} records in {} files with {} workers.",
        records.len(),
        outcome.data.files.len(),
        chunker.workers()
    ));
    outcome
}
