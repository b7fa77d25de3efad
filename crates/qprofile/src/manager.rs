//! Pass manager for orchestrating a profile pipeline.
//!
//! Passes are grouped by [`ExtensionPoint`]. Within a slot passes run in
//! insertion order; slots run in the fixed order of
//! [`ExtensionPoint::ALL`], regardless of the order in which they were
//! filled.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use qprofile_ir::Module;

use crate::allocation::ResourceKind;
use crate::context::PassContext;
use crate::error::{ProfileError, ProfileResult};
use crate::pass::Pass;
use crate::passes::{QubitAllocation, ResourceAnnotation, ResultAllocation};

/// A named insertion hook of the pipeline.
///
/// The declaration order is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionPoint {
    /// Very start of the pipeline.
    PipelineStart,
    /// Peephole cleanups.
    Peephole,
    /// Late loop optimizations.
    LateLoopOptimizations,
    /// End of the loop optimizer.
    LoopOptimizerEnd,
    /// Late scalar optimizations.
    ScalarOptimizerLate,
    /// Late call-graph SCC optimizations.
    #[serde(rename = "cgscc-optimizer-late")]
    CGSCCOptimizerLate,
    /// Before vectorization.
    VectorizerStart,
    /// Very end of the pipeline.
    OptimizerLast,
}

impl ExtensionPoint {
    /// Every extension point, in execution order.
    pub const ALL: [ExtensionPoint; 8] = [
        ExtensionPoint::PipelineStart,
        ExtensionPoint::Peephole,
        ExtensionPoint::LateLoopOptimizations,
        ExtensionPoint::LoopOptimizerEnd,
        ExtensionPoint::ScalarOptimizerLate,
        ExtensionPoint::CGSCCOptimizerLate,
        ExtensionPoint::VectorizerStart,
        ExtensionPoint::OptimizerLast,
    ];

    /// Configuration name of the hook.
    pub fn name(self) -> &'static str {
        match self {
            ExtensionPoint::PipelineStart => "pipeline-start",
            ExtensionPoint::Peephole => "peephole",
            ExtensionPoint::LateLoopOptimizations => "late-loop-optimizations",
            ExtensionPoint::LoopOptimizerEnd => "loop-optimizer-end",
            ExtensionPoint::ScalarOptimizerLate => "scalar-optimizer-late",
            ExtensionPoint::CGSCCOptimizerLate => "cgscc-optimizer-late",
            ExtensionPoint::VectorizerStart => "vectorizer-start",
            ExtensionPoint::OptimizerLast => "optimizer-last",
        }
    }
}

impl fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExtensionPoint {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ep| ep.name() == s)
            .ok_or_else(|| ProfileError::Config(format!("unknown extension point '{s}'")))
    }
}

/// Manages and executes the passes of a profile pipeline.
pub struct PassManager {
    slots: BTreeMap<ExtensionPoint, Vec<Box<dyn Pass>>>,
    verify_each: bool,
}

impl PassManager {
    /// Create a new empty pass manager.
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            verify_each: false,
        }
    }

    /// Verify the module structurally after every pass.
    #[must_use]
    pub fn with_verify_each(mut self, verify_each: bool) -> Self {
        self.verify_each = verify_each;
        self
    }

    /// Change whether the module is verified after every pass.
    pub fn set_verify_each(&mut self, verify_each: bool) {
        self.verify_each = verify_each;
    }

    /// Whether the module is verified after every pass.
    pub fn verify_each(&self) -> bool {
        self.verify_each
    }

    /// Add a pass to the end of an extension point.
    pub fn add_pass(&mut self, ep: ExtensionPoint, pass: impl Pass + 'static) {
        self.add_boxed(ep, Box::new(pass));
    }

    /// Add a boxed pass to the end of an extension point.
    pub fn add_boxed(&mut self, ep: ExtensionPoint, pass: Box<dyn Pass>) {
        self.slots.entry(ep).or_default().push(pass);
    }

    /// Append several passes to an extension point.
    pub fn extend(&mut self, ep: ExtensionPoint, passes: impl IntoIterator<Item = Box<dyn Pass>>) {
        self.slots.entry(ep).or_default().extend(passes);
    }

    /// Names of the passes in one slot.
    pub fn pass_names(&self, ep: ExtensionPoint) -> Vec<&str> {
        self.slots
            .get(&ep)
            .map(|passes| passes.iter().map(|p| p.name()).collect())
            .unwrap_or_default()
    }

    /// Names of every pass in execution order.
    pub fn pipeline(&self) -> Vec<(ExtensionPoint, &str)> {
        self.slots
            .iter()
            .flat_map(|(ep, passes)| passes.iter().map(move |p| (*ep, p.name())))
            .collect()
    }

    /// Run all passes on the given module.
    #[instrument(skip(self, module, ctx), fields(module = %module.name))]
    pub fn run(&self, module: &mut Module, ctx: &mut PassContext) -> ProfileResult<()> {
        info!(
            "Running pass manager with {} passes on module with {} instructions",
            self.len(),
            module.num_instructions()
        );

        for (ep, passes) in &self.slots {
            for pass in passes {
                if !pass.should_run(module, ctx) {
                    debug!("Skipping pass: {} ({})", pass.name(), ep);
                    continue;
                }
                debug!("Running pass: {} ({})", pass.name(), ep);
                pass.run(module, ctx)?;
                if self.verify_each {
                    module.verify().map_err(|source| ProfileError::Verification {
                        pass: pass.name().to_string(),
                        source,
                    })?;
                }
                debug!(
                    "Pass {} completed, instructions: {}",
                    pass.name(),
                    module.num_instructions()
                );
            }
        }

        info!(
            "Pass manager completed, qubits used: {}, results used: {}",
            ctx.manager(ResourceKind::Qubit).max_used(),
            ctx.manager(ResourceKind::Result).max_used()
        );

        Ok(())
    }

    /// Get the number of passes.
    pub fn len(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }

    /// Check if the manager has no passes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The standard static-allocation pipeline: qubit and result allocation
    /// at [`ExtensionPoint::PipelineStart`], resource annotation at
    /// [`ExtensionPoint::OptimizerLast`].
    pub fn allocation_pipeline() -> Self {
        let mut pm = Self::new();
        pm.add_pass(ExtensionPoint::PipelineStart, QubitAllocation);
        pm.add_pass(ExtensionPoint::PipelineStart, ResultAllocation);
        pm.add_pass(ExtensionPoint::OptimizerLast, ResourceAnnotation);
        pm
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PassManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassManager")
            .field("pipeline", &self.pipeline())
            .field("verify_each", &self.verify_each)
            .finish()
    }
}
