//! Flat CSV row codec for records.
//!
//! Column order: `facet_type, root_path, root_category_path, node_name,
//! node_file_path, identity_key, usage_counter, used_by, resource_name`.
//! The trailing `resource_name` column is optional on input.

use std::io::{Read, Write};

use crate::error::ParseError;
use crate::record::{FacetType, Record, RootPath, UsedBy, NESTING_SEPARATOR};

/// Header row written by [`write_records`].
pub const HEADER: [&str; 9] = [
    "facet_type",
    "root_path",
    "root_category_path",
    "node_name",
    "node_file_path",
    "identity_key",
    "usage_counter",
    "used_by",
    "resource_name",
];

const REQUIRED_COLUMNS: usize = 8;

/// Header cells accepted in the first column of a skippable first row.
const HEADER_MARKERS: &[&str] = &["facet_type", "data type"];

/// Records read from one source plus the rows that were skipped.
#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub records: Vec<Record>,
    pub skipped: Vec<ParseError>,
}

/// Read records from CSV. Malformed rows are skipped and reported; only an
/// I/O failure of the underlying reader is an error.
pub fn read_records<R: Read>(reader: R, source_name: &str) -> csv::Result<ReadOutcome> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut outcome = ReadOutcome::default();

    for (index, row) in csv_reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => {
                outcome.skipped.push(ParseError {
                    source_name: source_name.to_string(),
                    line: index as u64 + 1,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(index as u64 + 1);

        if index == 0 && is_header(&row) {
            continue;
        }
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        match parse_row(&row) {
            Ok(record) => outcome.records.push(record),
            Err(reason) => outcome.skipped.push(ParseError {
                source_name: source_name.to_string(),
                line,
                reason,
            }),
        }
    }

    Ok(outcome)
}

fn is_header(row: &csv::StringRecord) -> bool {
    row.get(0)
        .map(|cell| {
            let cell = cell.trim().to_lowercase();
            HEADER_MARKERS.contains(&cell.as_str())
        })
        .unwrap_or(false)
}

fn parse_row(row: &csv::StringRecord) -> Result<Record, String> {
    if row.len() < REQUIRED_COLUMNS {
        return Err(format!(
            "expected at least {} columns, found {}",
            REQUIRED_COLUMNS,
            row.len()
        ));
    }
    let cell = |i: usize| row.get(i).unwrap_or("").trim();

    let facet_type = FacetType::parse(cell(0))
        .ok_or_else(|| format!("unknown facet type {:?}", cell(0)))?;

    let root_path = RootPath::parse(cell(1));
    if root_path.segments().is_empty() {
        return Err("empty root path".to_string());
    }

    let root_category_path = split_chain(cell(2));

    let usage_counter = cell(6)
        .parse::<u32>()
        .map_err(|_| format!("invalid usage counter {:?}", cell(6)))?;

    let used_by = parse_used_by(cell(7))?;

    Ok(Record {
        facet_type,
        root_path,
        root_category_path,
        node_name: cell(3).to_string(),
        node_file_path: cell(4).to_string(),
        identity_key: cell(5).to_string(),
        usage_counter,
        used_by,
        resource_name: cell(8).to_string(),
    })
}

fn split_chain(s: &str) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(NESTING_SEPARATOR)
        .map(|seg| seg.trim().to_string())
        .collect()
}

fn parse_used_by(s: &str) -> Result<Vec<UsedBy>, String> {
    match s {
        "" | "None" | "[]" => Ok(Vec::new()),
        json => serde_json::from_str(json).map_err(|e| format!("invalid used_by json: {}", e)),
    }
}

/// Write records as CSV with a header row.
pub fn write_records<W: Write>(writer: W, records: &[Record]) -> anyhow::Result<()> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    csv_writer.write_record(HEADER)?;

    for record in records {
        let root_path = record.root_path.to_string();
        let category_path = record.root_category_path.join(NESTING_SEPARATOR);
        let usage_counter = record.usage_counter.to_string();
        let used_by = serde_json::to_string(&record.used_by)?;
        csv_writer.write_record([
            record.facet_type.as_str(),
            root_path.as_str(),
            category_path.as_str(),
            record.node_name.as_str(),
            record.node_file_path.as_str(),
            record.identity_key.as_str(),
            usage_counter.as_str(),
            used_by.as_str(),
            record.resource_name.as_str(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}
