//! Profile configuration.
//!
//! A [`ProfileConfig`] describes a profile declaratively and can be loaded
//! from YAML or JSON:
//!
//! ```yaml
//! debug: false
//! target:
//!   name: ion-trap-20
//!   max-qubits: 20
//! allocation:
//!   qubits: reuse
//!   results: no-reuse
//! extension-points:
//!   pipeline-start: qubit-allocation,result-allocation
//!   optimizer-last: resource-annotation
//! rules:
//!   - no-dynamic-qubit-management
//!   - static-resource-operands
//! ```
//!
//! Values from a file can be overridden with the `QPROFILE_DEBUG`
//! environment variable.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::allocation::AllocationPolicy;
use crate::error::{ProfileError, ProfileResult};
use crate::manager::ExtensionPoint;
use crate::profile::{Profile, ProfileBuilder, TargetDescriptor};
use crate::validator::rules::BUILTIN_RULES;

/// Reuse policy per resource pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AllocationConfig {
    /// Policy of the qubit manager.
    pub qubits: AllocationPolicy,
    /// Policy of the result manager.
    pub results: AllocationPolicy,
}

/// Declarative description of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ProfileConfig {
    /// Verify the module after every pass.
    pub debug: bool,
    /// Target limits.
    pub target: Option<TargetDescriptor>,
    /// Allocation policies.
    pub allocation: AllocationConfig,
    /// Pipeline text per extension point.
    pub extension_points: BTreeMap<ExtensionPoint, String>,
    /// Built-in compliance rules to install, by name.
    pub rules: Vec<String>,
}

impl ProfileConfig {
    /// The base profile: static allocation at pipeline start, resource
    /// annotation at the end, and every built-in rule.
    pub fn base() -> Self {
        Self {
            extension_points: BTreeMap::from([
                (
                    ExtensionPoint::PipelineStart,
                    "qubit-allocation,result-allocation".to_string(),
                ),
                (ExtensionPoint::OptimizerLast, "resource-annotation".to_string()),
            ]),
            rules: BUILTIN_RULES.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(text: &str) -> ProfileResult<Self> {
        serde_yaml_ng::from_str(text).map_err(|e| ProfileError::Config(e.to_string()))
    }

    /// Parse a JSON document.
    pub fn from_json_str(text: &str) -> ProfileResult<Self> {
        serde_json::from_str(text).map_err(|e| ProfileError::Config(e.to_string()))
    }

    /// Load from a file; `.json` files are read as JSON, anything else as
    /// YAML.
    pub fn from_path(path: impl AsRef<Path>) -> ProfileResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext.to_lowercase().as_str() {
            "json" => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    /// Load from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> ProfileResult<Self> {
        let config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::base(),
        };
        Ok(config.merge_env())
    }

    fn merge_env(mut self) -> Self {
        if let Ok(v) = std::env::var("QPROFILE_DEBUG") {
            if let Some(debug) = parse_bool(&v) {
                self.debug = debug;
            }
        }
        self
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> ProfileResult<String> {
        serde_yaml_ng::to_string(self).map_err(|e| ProfileError::Config(e.to_string()))
    }

    /// A builder preloaded with this configuration.
    pub fn builder(&self) -> ProfileResult<ProfileBuilder> {
        ProfileBuilder::from_config(self)
    }

    /// Build the configured profile.
    pub fn build(&self) -> ProfileResult<Profile> {
        Ok(self.builder()?.build())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r"
debug: true
target:
  name: trap
  max-qubits: 4
allocation:
  qubits: reuse
extension-points:
  peephole: verify
  cgscc-optimizer-late: module(print)
rules:
  - single-entry-point
";

    #[test]
    fn test_yaml() {
        let config = ProfileConfig::from_yaml_str(YAML).unwrap();
        assert!(config.debug);
        assert_eq!(config.target.as_ref().and_then(|t| t.max_qubits), Some(4));
        assert_eq!(config.allocation.qubits, AllocationPolicy::Reuse);
        assert_eq!(config.allocation.results, AllocationPolicy::NoReuse);
        assert_eq!(
            config.extension_points.get(&ExtensionPoint::CGSCCOptimizerLate).map(String::as_str),
            Some("module(print)")
        );
        assert_eq!(config.rules, vec!["single-entry-point"]);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = ProfileConfig::base();
        let restored = ProfileConfig::from_yaml_str(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_json() {
        let config = ProfileConfig::from_json_str(
            r#"{"allocation": {"results": "reuse"}, "extension-points": {"optimizer-last": "verify"}}"#,
        )
        .unwrap();
        assert_eq!(config.allocation.results, AllocationPolicy::Reuse);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_unknown_extension_point() {
        assert!(matches!(
            ProfileConfig::from_yaml_str("extension-points:\n  loop-vectorize: verify\n"),
            Err(ProfileError::Config(_))
        ));
    }

    #[test]
    fn test_build_from_config() {
        let profile = ProfileConfig::from_yaml_str(YAML).unwrap().build().unwrap();
        assert!(profile.is_debug());
        assert!(profile.qubit_allocation_manager().reuses_handles());
        assert_eq!(profile.validator().len(), 1);
        assert_eq!(profile.pass_manager().len(), 2);
        assert_eq!(profile.target().map(|t| t.name.as_str()), Some("trap"));
    }

    #[test]
    fn test_duplicate_rules_are_skipped_unknown_rules_fail() {
        let mut config = ProfileConfig::base();
        config.rules.push("module-flags".into());
        assert_eq!(config.build().unwrap().validator().len(), BUILTIN_RULES.len());

        config.rules.push("no-loops".into());
        assert!(matches!(config.build(), Err(ProfileError::UnknownRule(name)) if name == "no-loops"));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool(" Yes "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
