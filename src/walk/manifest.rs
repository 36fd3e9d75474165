//! Component library manifest: a file-backed [`HostSession`].
//!
//! A manifest lists every component of a library with its nested references
//! and the raw facts a live host would report for it. It is parsed from YAML
//! (or JSON, which is a YAML subset) and drives the `walk` command.
//!
//! ```yaml
//! components:
//!   - name: Sample_Family_Eight
//!     category: Furniture Systems
//!     file_path: lib/Sample_Family_Eight.rfa
//!     top_level: true
//!     nested:
//!       - { name: Sample_Family_Thirteen, category: Generic Models }
//!     shared_parameters:
//!       - { guid: f074bc9a-c650-42f4-aeb1-29de0255343f, name: MOUNTING_HEIGHT, used: true }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::{ComponentNode, HostSession, NestedRef};
use crate::error::{DescendError, ExtractionError};
use crate::facet::{LinePatternFact, RawFacts, SharedParameterFact, WarningFact};
use crate::record::FacetType;

/// A nested reference as written in a manifest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NestedSpec {
    pub name: String,
    pub category: String,
}

/// One component of the library.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(default)]
    pub category: String,
    /// Document path on disk; empty for components only loaded in-memory.
    #[serde(default)]
    pub file_path: String,
    /// Whether this component is a top-level file of the library.
    #[serde(default)]
    pub top_level: bool,
    #[serde(default)]
    pub nested: Vec<NestedSpec>,
    #[serde(default)]
    pub shared_parameters: Option<Vec<SharedParameterFact>>,
    #[serde(default)]
    pub line_patterns: Option<Vec<LinePatternFact>>,
    #[serde(default)]
    pub warnings: Option<Vec<WarningFact>>,
    /// The component exists but cannot be opened.
    #[serde(default)]
    pub unreadable: bool,
    /// Facets whose extraction fails for this component.
    #[serde(default)]
    pub failing_facets: Vec<FacetType>,
}

impl ComponentSpec {
    fn node(&self) -> ComponentNode {
        ComponentNode {
            name: self.name.clone(),
            category: self.category.clone(),
            file_path: self.file_path.clone(),
            nested: self
                .nested
                .iter()
                .map(|n| NestedRef {
                    name: n.name.clone(),
                    category: n.category.clone(),
                })
                .collect(),
        }
    }

    fn facts(&self, facet: FacetType) -> RawFacts {
        let facts = match facet {
            FacetType::SharedParameter => self
                .shared_parameters
                .clone()
                .map(RawFacts::SharedParameters),
            FacetType::LinePattern => self.line_patterns.clone().map(RawFacts::LinePatterns),
            FacetType::Warning => self.warnings.clone().map(RawFacts::Warnings),
            FacetType::FamilyBase => None,
        };
        facts.unwrap_or(RawFacts::Absent)
    }
}

/// A parsed manifest.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ComponentLibrary {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
}

impl ComponentLibrary {
    /// Parse a manifest from a YAML or JSON file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        let library: ComponentLibrary = serde_yaml::from_str(content)?;
        Ok(library)
    }

    /// Look up a component by name and category.
    pub fn find(&self, name: &str, category: &str) -> Option<&ComponentSpec> {
        self.components
            .iter()
            .find(|c| c.name == name && c.category == category)
    }

    /// The top-level files to walk, in manifest order.
    ///
    /// If no component is flagged `top_level`, every component that is not
    /// nested in another one is treated as top-level.
    pub fn top_level(&self) -> Vec<&ComponentSpec> {
        let flagged: Vec<&ComponentSpec> = self.components.iter().filter(|c| c.top_level).collect();
        if !flagged.is_empty() {
            return flagged;
        }
        self.components
            .iter()
            .filter(|c| {
                !self.components.iter().any(|parent| {
                    parent
                        .nested
                        .iter()
                        .any(|n| n.name == c.name && n.category == c.category)
                })
            })
            .collect()
    }

    /// A session over one top-level component.
    pub fn session<'a>(&'a self, root: &'a ComponentSpec) -> ManifestSession<'a> {
        ManifestSession {
            library: self,
            root,
        }
    }
}

/// Host session over one top-level component of a [`ComponentLibrary`].
pub struct ManifestSession<'a> {
    library: &'a ComponentLibrary,
    root: &'a ComponentSpec,
}

impl<'a> HostSession for ManifestSession<'a> {
    fn open_root(&mut self) -> Result<ComponentNode, DescendError> {
        if self.root.unreadable {
            return Err(DescendError::Root {
                name: self.root.name.clone(),
                reason: "document is unreadable".to_string(),
            });
        }
        Ok(self.root.node())
    }

    fn open_nested(
        &mut self,
        parent: &ComponentNode,
        nested: &NestedRef,
    ) -> Result<ComponentNode, DescendError> {
        let spec = self
            .library
            .find(&nested.name, &nested.category)
            .ok_or_else(|| DescendError::NotFound {
                parent: parent.name.clone(),
                name: nested.name.clone(),
                category: nested.category.clone(),
            })?;

        if spec.unreadable {
            return Err(DescendError::Unreadable {
                parent: parent.name.clone(),
                name: nested.name.clone(),
                category: nested.category.clone(),
                reason: "document is unreadable".to_string(),
            });
        }
        Ok(spec.node())
    }

    fn facts(&mut self, node: &ComponentNode, facet: FacetType) -> Result<RawFacts, ExtractionError> {
        let spec = self
            .library
            .find(&node.name, &node.category)
            .ok_or_else(|| ExtractionError::new(facet, node.name.clone(), "component not in manifest"))?;

        if spec.failing_facets.contains(&facet) {
            return Err(ExtractionError::new(
                facet,
                node.name.clone(),
                "host reported an extraction failure",
            ));
        }
        Ok(spec.facts(facet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::FacetRegistry;
    use crate::walk::TreeWalker;

    const MANIFEST: &str = r#"
components:
  - name: A
    category: Doors
    file_path: lib/A.rfa
    nested:
      - { name: B, category: Generic Models }
    shared_parameters:
      - { guid: 11111111-1111-1111-1111-111111111111, name: P, used: false }
  - name: B
    category: Generic Models
    shared_parameters:
      - { guid: 11111111-1111-1111-1111-111111111111, name: P, used: true }
    failing_facets: [LinePattern]
  - name: C
    category: Windows
    unreadable: true
"#;

    #[test]
    fn test_top_level_inferred_from_nesting() {
        let library = ComponentLibrary::parse_str(MANIFEST).unwrap();
        let names: Vec<_> = library.top_level().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[test]
    fn test_walk_manifest_component() {
        let library = ComponentLibrary::parse_str(MANIFEST).unwrap();
        let registry = FacetRegistry::with_defaults();
        let root = library.find("A", "Doors").unwrap();
        let outcome = TreeWalker::new(&registry).walk(library.session(root));

        assert!(outcome.is_success());
        assert_eq!(outcome.data.file_id, "lib/A.rfa");
        // Four facets at two nodes.
        assert_eq!(outcome.data.records.len(), 8);
        // B's line pattern extraction failed and degraded to a placeholder.
        assert!(outcome.message_log().contains("LinePattern extraction failed at A::B"));
    }

    #[test]
    fn test_unreadable_root_fails_walk() {
        let library = ComponentLibrary::parse_str(MANIFEST).unwrap();
        let registry = FacetRegistry::with_defaults();
        let root = library.find("C", "Windows").unwrap();
        let outcome = TreeWalker::new(&registry).walk(library.session(root));
        assert!(!outcome.is_success());
        assert!(outcome.data.records.is_empty());
    }

    #[test]
    fn test_json_manifest() {
        let library = ComponentLibrary::parse_str(
            r#"{"components": [{"name": "A", "category": "Doors", "top_level": true}]}"#,
        )
        .unwrap();
        assert_eq!(library.top_level().len(), 1);
    }
}
