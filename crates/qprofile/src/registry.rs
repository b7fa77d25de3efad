//! Pass registry: turns pipeline text into passes.
//!
//! ```
//! use qprofile::PassRegistry;
//!
//! let registry = PassRegistry::with_builtins();
//! let passes = registry
//!     .parse_and_resolve("module(qubit-allocation,result-allocation),verify")
//!     .unwrap();
//! let names: Vec<&str> = passes.iter().map(|p| p.name()).collect();
//! assert_eq!(names, ["qubit-allocation", "result-allocation", "verify"]);
//!
//! assert!(registry.parse_and_resolve("inline").is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use qprofile_ir::PipelineElement;
use qprofile_ir::pipeline;

use crate::error::{ProfileError, ProfileResult};
use crate::pass::Pass;
use crate::passes::{PrintModule, QubitAllocation, ResourceAnnotation, ResultAllocation, VerifyModule};

/// Builds a pass from the parameters of its pipeline element.
pub type PassFactory = Arc<dyn Fn(&[String]) -> ProfileResult<Box<dyn Pass>> + Send + Sync>;

/// Element names whose nested pipeline is spliced in place.
pub const ADAPTORS: [&str; 2] = ["module", "function"];

/// Maps pass names to factories.
#[derive(Clone, Default)]
pub struct PassRegistry {
    factories: BTreeMap<String, PassFactory>,
}

impl PassRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in passes.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_simple("qubit-allocation", || Box::new(QubitAllocation));
        registry.register_simple("result-allocation", || Box::new(ResultAllocation));
        registry.register_simple("resource-annotation", || Box::new(ResourceAnnotation));
        registry.register_simple("verify", || Box::new(VerifyModule));
        registry.register_simple("print", || Box::new(PrintModule));
        registry
    }

    /// Register a factory, replacing any previous one of that name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&[String]) -> ProfileResult<Box<dyn Pass>> + Send + Sync + 'static,
    ) {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Register a pass that takes no parameters.
    pub fn register_simple(
        &mut self,
        name: &str,
        make: impl Fn() -> Box<dyn Pass> + Send + Sync + 'static,
    ) {
        let owned = name.to_string();
        self.register(name, move |params: &[String]| {
            if params.is_empty() {
                Ok(make())
            } else {
                Err(ProfileError::Config(format!(
                    "pass '{owned}' takes no parameters, got <{}>",
                    params.join(";")
                )))
            }
        });
    }

    /// Check whether a pass of this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered pass names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate the passes of parsed pipeline elements.
    ///
    /// Adaptors are flattened; any unknown name fails the whole pipeline.
    pub fn resolve(&self, elements: &[PipelineElement]) -> ProfileResult<Vec<Box<dyn Pass>>> {
        let mut passes = vec![];
        self.resolve_into(elements, &mut passes)?;
        Ok(passes)
    }

    fn resolve_into(&self, elements: &[PipelineElement], out: &mut Vec<Box<dyn Pass>>) -> ProfileResult<()> {
        for element in elements {
            if ADAPTORS.contains(&element.name.as_str()) {
                self.resolve_into(&element.nested, out)?;
                continue;
            }
            if !element.nested.is_empty() {
                return Err(ProfileError::Config(format!(
                    "pass '{}' cannot contain a nested pipeline",
                    element.name
                )));
            }
            let factory = self
                .factories
                .get(&element.name)
                .ok_or_else(|| ProfileError::UnknownPass(element.name.clone()))?;
            out.push(factory(&element.params)?);
        }
        Ok(())
    }

    /// Parse pipeline text and instantiate its passes.
    pub fn parse_and_resolve(&self, text: &str) -> ProfileResult<Vec<Box<dyn Pass>>> {
        let elements = pipeline::parse(text)?;
        self.resolve(&elements)
    }
}

impl fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
