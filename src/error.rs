//! Error kinds raised at component boundaries.
//!
//! None of these escape the pipeline as hard failures. Each stage converts
//! them into [`Outcome`](crate::outcome::Outcome) messages at the severity
//! the stage defines.

use thiserror::Error;

use crate::record::FacetType;

/// A facet collector could not produce records for one node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{facet} extraction failed at {path}: {reason}")]
pub struct ExtractionError {
    pub facet: FacetType,
    pub path: String,
    pub reason: String,
}

impl ExtractionError {
    pub fn new(facet: FacetType, path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            facet,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A nested component could not be opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescendError {
    #[error("component {name} ({category}) not found below {parent}")]
    NotFound {
        parent: String,
        name: String,
        category: String,
    },
    #[error("component {name} ({category}) below {parent} cannot be opened: {reason}")]
    Unreadable {
        parent: String,
        name: String,
        category: String,
        reason: String,
    },
    #[error("circular nesting: {name} ({category}) already appears in {parent}")]
    Circular {
        parent: String,
        name: String,
        category: String,
    },
    #[error("top-level component {name} cannot be opened: {reason}")]
    Root { name: String, reason: String },
}

/// A malformed input row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source_name} row {line}: {reason}")]
pub struct ParseError {
    pub source_name: String,
    pub line: u64,
    pub reason: String,
}

/// A worker chunk that did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("chunk {index} (rows {start}..{end}) failed: {reason}")]
pub struct WorkerError {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub reason: String,
}

/// Pipeline-level failures.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No loadable data found")]
    EmptyInput,
    #[error("facet {0} is not purgeable")]
    NotPurgeable(FacetType),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_message() {
        assert_eq!(PipelineError::EmptyInput.to_string(), "No loadable data found");
    }

    #[test]
    fn test_descend_error_display() {
        let err = DescendError::Circular {
            parent: "A::B".to_string(),
            name: "A".to_string(),
            category: "Doors".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "circular nesting: A (Doors) already appears in A::B"
        );
    }
}
