//! Facet collectors: one per fact category.
//!
//! A [`FacetCollector`] turns the raw facts a host reports for one node into
//! [`Record`]s. Collectors are held by a [`FacetRegistry`] that is built once
//! at start-up and passed by reference to the tree walker and the purge
//! engine; it is read-only after construction.
//!
//! # Adding a New Facet
//!
//! 1. Add a variant to [`FacetType`] and to [`RawFacts`]
//! 2. Implement [`FacetCollector`] in a new module here
//! 3. Register it in [`FacetRegistry::with_defaults`]

mod family_base;
mod line_pattern;
mod shared_parameter;
mod warning;

pub use family_base::FamilyBaseCollector;
pub use line_pattern::LinePatternCollector;
pub use shared_parameter::SharedParameterCollector;
pub use warning::WarningCollector;

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::record::{FacetType, Record, RootPath, UsedBy};

/// A shared parameter defined in a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedParameterFact {
    pub guid: String,
    pub name: String,
    /// Whether anything in this component references the parameter.
    #[serde(default)]
    pub used: bool,
}

/// A line pattern defined in a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePatternFact {
    pub name: String,
    #[serde(default)]
    pub id: i64,
    /// Categories or levels whose graphics use the pattern.
    #[serde(default)]
    pub used_by: Vec<String>,
}

/// A warning reported by the host for a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningFact {
    pub guid: String,
    pub description: String,
    #[serde(default)]
    pub element_ids: Vec<i64>,
}

/// Raw per-node facts for one facet category, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum RawFacts {
    SharedParameters(Vec<SharedParameterFact>),
    LinePatterns(Vec<LinePatternFact>),
    Warnings(Vec<WarningFact>),
    /// The host has nothing for this category at this node.
    Absent,
}

impl RawFacts {
    pub fn kind(&self) -> &'static str {
        match self {
            RawFacts::SharedParameters(_) => "shared_parameters",
            RawFacts::LinePatterns(_) => "line_patterns",
            RawFacts::Warnings(_) => "warnings",
            RawFacts::Absent => "absent",
        }
    }
}

/// Records produced at one node plus the items that could not be read.
///
/// A malformed item is dropped on its own; its siblings are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    pub records: Vec<Record>,
    pub skipped: Vec<ExtractionError>,
}

impl From<Vec<Record>> for Collected {
    fn from(records: Vec<Record>) -> Self {
        Self {
            records,
            skipped: Vec::new(),
        }
    }
}

/// The tree position a collector is producing records for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContext {
    pub root_path: RootPath,
    pub category_path: Vec<String>,
    pub node_name: String,
    pub node_file_path: String,
}

impl NodeContext {
    pub fn category(&self) -> &str {
        self.category_path.last().map(String::as_str).unwrap_or("")
    }

    /// A record at this node with no usage.
    pub fn record(
        &self,
        facet_type: FacetType,
        identity_key: impl Into<String>,
        resource_name: impl Into<String>,
    ) -> Record {
        Record {
            facet_type,
            root_path: self.root_path.clone(),
            root_category_path: self.category_path.clone(),
            node_name: self.node_name.clone(),
            node_file_path: self.node_file_path.clone(),
            identity_key: identity_key.into(),
            usage_counter: 0,
            used_by: Vec::new(),
            resource_name: resource_name.into(),
        }
    }

    /// A record at this node that is used locally.
    pub fn used_record(
        &self,
        facet_type: FacetType,
        identity_key: impl Into<String>,
        resource_name: impl Into<String>,
    ) -> Record {
        let mut record = self.record(facet_type, identity_key, resource_name);
        record.usage_counter = 1;
        let entry = UsedBy {
            identity: record.identity_key.clone(),
            name: record.resource_name.clone(),
            root_path: self.root_path.clone(),
        };
        record.used_by.push(entry);
        record
    }

    pub fn extraction_error(&self, facet: FacetType, reason: impl Into<String>) -> ExtractionError {
        ExtractionError::new(facet, self.root_path.to_string(), reason)
    }
}

/// Produces records for one fact category.
///
/// # Thread Safety
///
/// Collectors are shared by reference between the walker and the purge
/// engine and must be `Send + Sync`. They hold no per-walk state.
pub trait FacetCollector: Send + Sync {
    /// The facet this collector produces.
    fn facet_type(&self) -> FacetType;

    /// Text carried by the placeholder row when the node has no data.
    fn placeholder_label(&self) -> &'static str;

    /// Human readable noun for justifications (e.g. "shared parameter").
    fn resource_noun(&self) -> &'static str;

    /// Whether unused root records of this facet may be purged.
    fn is_purgeable(&self) -> bool {
        false
    }

    /// Convert raw facts for one node into records.
    ///
    /// Returning no records is allowed; the walker replaces them with a
    /// placeholder row. `Err` means the facts as a whole were unusable.
    fn collect(&self, node: &NodeContext, facts: &RawFacts) -> Result<Collected, ExtractionError>;

    /// The "no data" row for this node.
    fn placeholder(&self, node: &NodeContext) -> Record {
        node.record(self.facet_type(), "", self.placeholder_label())
    }
}

/// Read-only set of collectors, built once.
pub struct FacetRegistry {
    collectors: Vec<Box<dyn FacetCollector>>,
}

impl FacetRegistry {
    /// Registry with every built-in facet.
    pub fn with_defaults() -> Self {
        FacetRegistryBuilder::new()
            .register(SharedParameterCollector)
            .register(LinePatternCollector)
            .register(WarningCollector)
            .register(FamilyBaseCollector)
            .build()
    }

    pub fn builder() -> FacetRegistryBuilder {
        FacetRegistryBuilder::new()
    }

    /// Get the collector for a facet.
    pub fn get(&self, facet: FacetType) -> Option<&dyn FacetCollector> {
        self.collectors
            .iter()
            .find(|c| c.facet_type() == facet)
            .map(|c| c.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn FacetCollector> {
        self.collectors.iter().map(|c| c.as_ref())
    }

    pub fn purgeable_facets(&self) -> Vec<FacetType> {
        self.collectors
            .iter()
            .filter(|c| c.is_purgeable())
            .map(|c| c.facet_type())
            .collect()
    }

    pub fn is_purgeable(&self, facet: FacetType) -> bool {
        self.get(facet).map(|c| c.is_purgeable()).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

/// Builder for [`FacetRegistry`]. Later registrations replace earlier ones
/// for the same facet.
#[derive(Default)]
pub struct FacetRegistryBuilder {
    collectors: Vec<Box<dyn FacetCollector>>,
}

impl FacetRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: FacetCollector + 'static>(mut self, collector: C) -> Self {
        self.collectors
            .retain(|c| c.facet_type() != collector.facet_type());
        self.collectors.push(Box::new(collector));
        self
    }

    pub fn build(self) -> FacetRegistry {
        FacetRegistry {
            collectors: self.collectors,
        }
    }
}
