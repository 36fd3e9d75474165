//! Purge policy schema.
//!
//! A policy selects which facets are purged, how usage is grouped, and which
//! families must always keep at least one member.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::facet::FacetRegistry;
use crate::propagate::PropagationScope;
use crate::record::{FacetType, Record};

/// Policy file names searched for when none is given.
pub const DEFAULT_POLICY_NAMES: &[&str] = &["nestsweep.yaml", "purge-policy.yaml", ".nestsweep.yaml"];

/// Top-level policy definition.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PurgePolicy {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Facets to decide on (default: every purgeable facet)
    #[serde(default)]
    pub facets: Vec<FacetType>,
    #[serde(default)]
    pub scope: PropagationScope,
    /// Worker count override for the post-walk scan
    #[serde(default)]
    pub workers: Option<usize>,
    /// Glob patterns over file identifiers never proposed for purge
    #[serde(default)]
    pub excluded_files: Vec<String>,
    #[serde(default)]
    pub guards: Vec<RetainOneGuard>,
}

impl PurgePolicy {
    /// Parse a policy from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let policy: PurgePolicy = serde_yaml::from_str(&content)?;
        Ok(policy)
    }

    /// The facets to decide on, falling back to every purgeable facet.
    pub fn facets_or_default(&self, registry: &FacetRegistry) -> Vec<FacetType> {
        if self.facets.is_empty() {
            registry.purgeable_facets()
        } else {
            self.facets.clone()
        }
    }
}

/// Keep at least one member of a family even when all of them are unused.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetainOneGuard {
    /// Name of the protected family, used in justifications
    pub family: String,
    /// Facet the guard applies to (default: any)
    #[serde(default)]
    pub facet: Option<FacetType>,
    /// Glob patterns over file identifiers (default: every file)
    #[serde(default)]
    pub files: Vec<String>,
    /// Members in priority order: the first present member is the one kept
    pub members: Vec<String>,
}

impl RetainOneGuard {
    pub fn applies_to(&self, facet: FacetType) -> bool {
        self.facet.map(|f| f == facet).unwrap_or(true)
    }

    /// Whether a record is one of this guard's members: by identity key
    /// (case-insensitive) or by resource name.
    pub fn member_of<'g>(&'g self, record: &Record) -> Option<&'g str> {
        self.members
            .iter()
            .find(|m| m.eq_ignore_ascii_case(&record.identity_key) || m.as_str() == record.display_name())
            .map(String::as_str)
    }
}

/// Find a policy file in `dir`.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    DEFAULT_POLICY_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Validate a policy against the registry.
pub fn validate(policy: &PurgePolicy, registry: &FacetRegistry) -> anyhow::Result<()> {
    for facet in &policy.facets {
        if registry.get(*facet).is_none() {
            anyhow::bail!("facet {} is not registered", facet);
        }
        if !registry.is_purgeable(*facet) {
            anyhow::bail!("facet {} is informational and cannot be purged", facet);
        }
    }

    if policy.workers == Some(0) {
        anyhow::bail!("workers must be at least 1");
    }

    for pattern in &policy.excluded_files {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_files pattern {:?}: {}", pattern, e))?;
    }

    for guard in &policy.guards {
        if guard.family.trim().is_empty() {
            anyhow::bail!("guard has no family name");
        }
        if guard.members.is_empty() {
            anyhow::bail!("guard for {:?} lists no members", guard.family);
        }
        if let Some(facet) = guard.facet {
            if !registry.is_purgeable(facet) {
                anyhow::bail!("guard for {:?} targets non-purgeable facet {}", guard.family, facet);
            }
        }
        for pattern in &guard.files {
            globset::Glob::new(pattern).map_err(|e| {
                anyhow::anyhow!("invalid files pattern {:?} in guard {:?}: {}", pattern, guard.family, e)
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy() {
        let yaml = r#"
version: "1.0"
name: "Library purge"
facets: [LinePattern]
scope: global
workers: 3
excluded_files: ["Archive/*"]
guards:
  - family: "Basic Ceiling"
    facet: LinePattern
    members: ["Compound Ceiling", "Generic"]
"#;
        let policy: PurgePolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.facets, vec![FacetType::LinePattern]);
        assert_eq!(policy.scope, PropagationScope::Global);
        assert_eq!(policy.workers, Some(3));
        assert_eq!(policy.guards[0].members.len(), 2);
        assert_eq!(policy.excluded_files, vec!["Archive/*".to_string()]);
        assert!(validate(&policy, &FacetRegistry::with_defaults()).is_ok());
    }

    #[test]
    fn test_defaults() {
        let policy: PurgePolicy = serde_yaml::from_str("name: empty").unwrap();
        assert_eq!(policy.scope, PropagationScope::PerFile);
        assert_eq!(
            policy.facets_or_default(&FacetRegistry::with_defaults()),
            vec![FacetType::SharedParameter, FacetType::LinePattern]
        );
    }

    #[test]
    fn test_validate_rejects_informational_facet() {
        let policy = PurgePolicy {
            facets: vec![FacetType::Warning],
            ..Default::default()
        };
        let err = validate(&policy, &FacetRegistry::with_defaults()).unwrap_err();
        assert!(err.to_string().contains("cannot be purged"));
    }

    #[test]
    fn test_validate_rejects_empty_guard() {
        let policy = PurgePolicy {
            guards: vec![RetainOneGuard {
                family: "Basic Ceiling".to_string(),
                facet: None,
                files: vec![],
                members: vec![],
            }],
            ..Default::default()
        };
        assert!(validate(&policy, &FacetRegistry::with_defaults()).is_err());
    }

    #[test]
    fn test_bundled_templates_parse() {
        for content in [
            include_str!("templates/minimal.yaml"),
            include_str!("templates/shared-parameters.yaml"),
            include_str!("templates/ceiling-guards.yaml"),
        ] {
            let policy: PurgePolicy = serde_yaml::from_str(content).unwrap();
            assert!(validate(&policy, &FacetRegistry::with_defaults()).is_ok());
        }
    }
}
