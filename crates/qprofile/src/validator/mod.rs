//! Profile compliance validation.
//!
//! A [`Validator`] is an ordered set of named rules. Running it evaluates
//! every rule, never stopping at the first failure, and collects the
//! outcomes in a [`ValidationReport`].
//!
//! ```
//! use qprofile::{RuleOutcome, Validator};
//! use qprofile_ir::Module;
//!
//! let mut validator = Validator::new();
//! validator
//!     .register_rule("has-name", |m: &Module| RuleOutcome::from(!m.name.is_empty()))
//!     .unwrap();
//! assert!(validator.register_rule("has-name", |_: &Module| RuleOutcome::pass()).is_err());
//!
//! let report = validator.run(&Module::new(""));
//! assert!(!report.passed());
//! assert_eq!(report.failures().count(), 1);
//! ```

pub mod rules;

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use qprofile_ir::Module;

use crate::error::{ProfileError, ProfileResult};

/// A compliance predicate.
pub type RulePredicate = Box<dyn Fn(&Module) -> RuleOutcome + Send + Sync>;

/// What a rule concluded about a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    /// Whether the module complies.
    pub passed: bool,
    /// Explanation, usually present on failure.
    pub message: Option<String>,
}

impl RuleOutcome {
    /// The module complies.
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: None,
        }
    }

    /// The module does not comply.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: Some(message.into()),
        }
    }
}

impl From<bool> for RuleOutcome {
    fn from(passed: bool) -> Self {
        Self {
            passed,
            message: None,
        }
    }
}

/// Outcome of one named rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleResult {
    /// Rule name.
    pub name: String,
    /// Whether the rule passed.
    pub passed: bool,
    /// Message produced by the rule.
    pub message: Option<String>,
}

/// Outcomes of every rule of a validator, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Per-rule results.
    pub results: Vec<RuleResult>,
}

impl ValidationReport {
    /// Whether every rule passed. An empty report passes.
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// The rules that failed.
    pub fn failures(&self) -> impl Iterator<Item = &RuleResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Result of the rule called `name`.
    pub fn get(&self, name: &str) -> Option<&RuleResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Number of rules evaluated.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if no rule was evaluated.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.results {
            write!(f, "[{}] {}", if r.passed { "PASS" } else { "FAIL" }, r.name)?;
            if let Some(message) = &r.message {
                write!(f, ": {message}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Registry of named compliance rules.
#[derive(Default)]
pub struct Validator {
    rules: Vec<(String, RulePredicate)>,
}

impl Validator {
    /// A validator without rules; it accepts every module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a validator from built-in rule names.
    ///
    /// An unknown name fails with [`ProfileError::UnknownRule`], a repeated
    /// one with [`ProfileError::DuplicateRule`].
    pub fn from_rule_names<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> ProfileResult<Self> {
        let mut validator = Self::new();
        for name in names {
            let name = name.as_ref();
            let rule = rules::builtin(name).ok_or_else(|| ProfileError::UnknownRule(name.to_string()))?;
            validator.register_rule(name, rule)?;
        }
        Ok(validator)
    }

    /// Every built-in rule of the base profile.
    pub fn base_profile() -> Self {
        let mut validator = Self::new();
        for name in rules::BUILTIN_RULES {
            if let Some(rule) = rules::builtin(name) {
                validator.rules.push((name.to_string(), Box::new(rule)));
            }
        }
        validator
    }

    /// Add a rule. Fails if a rule of that name exists.
    pub fn register_rule(
        &mut self,
        name: impl Into<String>,
        predicate: impl Fn(&Module) -> RuleOutcome + Send + Sync + 'static,
    ) -> ProfileResult<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(ProfileError::DuplicateRule(name));
        }
        self.rules.push((name, Box::new(predicate)));
        Ok(())
    }

    /// Check whether a rule of this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|(n, _)| n == name)
    }

    /// Rule names in registration order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(n, _)| n.as_str())
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule against `module`.
    pub fn run(&self, module: &Module) -> ValidationReport {
        let results: Vec<RuleResult> = self
            .rules
            .iter()
            .map(|(name, predicate)| {
                let outcome = predicate(module);
                debug!(
                    "Rule {}: {}",
                    name,
                    if outcome.passed { "passed" } else { "failed" }
                );
                RuleResult {
                    name: name.clone(),
                    passed: outcome.passed,
                    message: outcome.message,
                }
            })
            .collect();
        let report = ValidationReport { results };
        info!(
            "Validated module {}: {}/{} rules passed",
            module.name,
            report.len() - report.failures().count(),
            report.len()
        );
        report
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("rules", &self.rule_names().collect::<Vec<_>>())
            .finish()
    }
}
