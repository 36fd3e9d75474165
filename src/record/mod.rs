//! Path-addressed record model.
//!
//! A [`Record`] is one fact about one node of a component tree. Its position
//! is a [`RootPath`]: the chain of component names from the top-level file
//! down to the node, optionally namespaced by the top-level file identifier
//! once reports from several walks are merged.

mod row;

pub use row::{read_records, write_records, ReadOutcome, HEADER};

use serde::{Deserialize, Serialize};

/// Separator between nesting levels in a rendered path.
pub const NESTING_SEPARATOR: &str = "::";

/// Separator between the namespace and the path in a rendered path.
pub const NAMESPACE_SEPARATOR: char = '|';

/// Fact categories produced by facet collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FacetType {
    SharedParameter,
    LinePattern,
    Warning,
    FamilyBase,
}

impl FacetType {
    pub const ALL: [FacetType; 4] = [
        FacetType::SharedParameter,
        FacetType::LinePattern,
        FacetType::Warning,
        FacetType::FamilyBase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FacetType::SharedParameter => "SharedParameter",
            FacetType::LinePattern => "LinePattern",
            FacetType::Warning => "Warning",
            FacetType::FamilyBase => "FamilyBase",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "SharedParameter" => Some(FacetType::SharedParameter),
            "LinePattern" => Some(FacetType::LinePattern),
            "Warning" | "Warnings" => Some(FacetType::Warning),
            "FamilyBase" => Some(FacetType::FamilyBase),
            _ => None,
        }
    }
}

impl std::fmt::Display for FacetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FacetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FacetType::parse(s).ok_or_else(|| format!("unknown facet type: {}", s))
    }
}

/// Position of a node within a top-level file's component tree.
///
/// Rendered as `segment::segment`, or `namespace|segment::segment` once a
/// namespace is attached. The namespace does not count towards depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RootPath {
    namespace: Option<String>,
    segments: Vec<String>,
}

impl RootPath {
    /// Path of a top-level node.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            segments: vec![name.into()],
        }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespace: None,
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a rendered path. Whitespace around separators is ignored.
    pub fn parse(s: &str) -> Self {
        let (namespace, path) = match s.split_once(NAMESPACE_SEPARATOR) {
            Some((ns, rest)) if !ns.trim().is_empty() => (Some(ns.trim().to_string()), rest),
            Some((_, rest)) => (None, rest),
            None => (None, s),
        };
        let segments = if path.trim().is_empty() {
            Vec::new()
        } else {
            path.split(NESTING_SEPARATOR)
                .map(|seg| seg.trim().to_string())
                .collect()
        };
        Self {
            namespace,
            segments,
        }
    }

    /// Path of a nested component below this one.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self {
            namespace: self.namespace.clone(),
            segments,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Name of the top-level component.
    pub fn top(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Name of the node this path points at.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Nesting depth; the top-level node is depth 0.
    pub fn depth(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// The path without its namespace, `::`-joined.
    pub fn path_string(&self) -> String {
        self.segments.join(NESTING_SEPARATOR)
    }
}

impl std::fmt::Display for RootPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}{}{}", ns, NAMESPACE_SEPARATOR, self.path_string()),
            None => write!(f, "{}", self.path_string()),
        }
    }
}

impl From<String> for RootPath {
    fn from(s: String) -> Self {
        RootPath::parse(&s)
    }
}

impl From<RootPath> for String {
    fn from(path: RootPath) -> Self {
        path.to_string()
    }
}

/// Why a resource was marked used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UsedBy {
    pub identity: String,
    pub name: String,
    pub root_path: RootPath,
}

/// One fact about one node in a component tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub facet_type: FacetType,
    pub root_path: RootPath,
    pub root_category_path: Vec<String>,
    pub node_name: String,
    pub node_file_path: String,
    /// Facet-specific identity correlating the same logical resource across
    /// tree positions. Empty for placeholder rows.
    pub identity_key: String,
    pub usage_counter: u32,
    #[serde(default)]
    pub used_by: Vec<UsedBy>,
    /// Human readable resource name (parameter, pattern, warning text).
    #[serde(default)]
    pub resource_name: String,
}

impl Record {
    pub fn is_root(&self) -> bool {
        self.root_path.is_root()
    }

    pub fn is_used(&self) -> bool {
        self.usage_counter > 0
    }

    /// Placeholder rows stand in for a facet with no data at a node.
    pub fn is_placeholder(&self) -> bool {
        self.identity_key.is_empty()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.root_path.namespace()
    }

    /// The file this record belongs to: its namespace, or the top-level
    /// component name before merge.
    pub fn file_id(&self) -> &str {
        self.root_path
            .namespace()
            .or_else(|| self.root_path.top())
            .unwrap_or("-")
    }

    /// Name used when this record is cited in another record's `used_by`.
    pub fn display_name(&self) -> &str {
        if self.resource_name.is_empty() {
            &self.node_name
        } else {
            &self.resource_name
        }
    }

    /// The entry this record contributes to another record's `used_by`.
    pub fn as_used_by(&self) -> UsedBy {
        UsedBy {
            identity: self.identity_key.clone(),
            name: self.display_name().to_string(),
            root_path: self.root_path.clone(),
        }
    }

    /// Append a `used_by` entry unless an identical one is present.
    /// Returns whether the entry was added.
    pub fn add_used_by(&mut self, entry: UsedBy) -> bool {
        if self.used_by.contains(&entry) {
            return false;
        }
        self.used_by.push(entry);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_path_parse_and_depth() {
        let path = RootPath::parse("Sample_Family_Eight :: Sample_Family_Thirteen");
        assert_eq!(path.segments(), &["Sample_Family_Eight", "Sample_Family_Thirteen"]);
        assert_eq!(path.depth(), 1);
        assert!(!path.is_root());
        assert_eq!(path.to_string(), "Sample_Family_Eight::Sample_Family_Thirteen");
    }

    #[test]
    fn test_namespace_does_not_add_depth() {
        let path = RootPath::root("A").with_namespace("lib/A.rfa");
        assert!(path.is_root());
        assert_eq!(path.to_string(), "lib/A.rfa|A");

        let reparsed = RootPath::parse(&path.to_string());
        assert_eq!(reparsed, path);
        assert_eq!(reparsed.namespace(), Some("lib/A.rfa"));
    }

    #[test]
    fn test_child_keeps_namespace() {
        let path = RootPath::root("A").with_namespace("ns").child("Nested1");
        assert_eq!(path.to_string(), "ns|A::Nested1");
        assert_eq!(path.leaf(), Some("Nested1"));
        assert_eq!(path.top(), Some("A"));
    }

    #[test]
    fn test_facet_type_parse() {
        assert_eq!(FacetType::parse("LinePattern"), Some(FacetType::LinePattern));
        assert_eq!(FacetType::parse("Warnings"), Some(FacetType::Warning));
        assert_eq!(FacetType::parse("Category"), None);
        assert!("nope".parse::<FacetType>().is_err());
    }

    #[test]
    fn test_add_used_by_deduplicates() {
        let mut record = Record {
            facet_type: FacetType::SharedParameter,
            root_path: RootPath::root("A"),
            root_category_path: vec!["Doors".to_string()],
            node_name: "A".to_string(),
            node_file_path: "-".to_string(),
            identity_key: "guid".to_string(),
            usage_counter: 0,
            used_by: Vec::new(),
            resource_name: String::new(),
        };
        let entry = UsedBy {
            identity: "guid".to_string(),
            name: "Width".to_string(),
            root_path: RootPath::parse("A::B"),
        };
        assert!(record.add_used_by(entry.clone()));
        assert!(!record.add_used_by(entry));
        assert_eq!(record.used_by.len(), 1);
        assert_eq!(record.display_name(), "A");
    }
}
