//! Pass trait and types for profile transformation passes.

use qprofile_ir::Module;

use crate::context::PassContext;
use crate::error::ProfileResult;

/// The kind of pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Analysis pass that reads but does not modify the module.
    Analysis,
    /// Transformation pass that modifies the module.
    Transformation,
}

/// A pass that operates on a module.
///
/// Passes are the unit of work of a profile pipeline. They receive the
/// module and the [`PassContext`] holding the allocation managers and the
/// value tracker of the profile being applied.
pub trait Pass: Send + Sync {
    /// Get the name of this pass.
    fn name(&self) -> &str;

    /// Get the kind of this pass.
    fn kind(&self) -> PassKind;

    /// Run the pass on the given module.
    ///
    /// Analysis passes must leave the module unchanged but may update the
    /// context.
    fn run(&self, module: &mut Module, ctx: &mut PassContext) -> ProfileResult<()>;

    /// Check if this pass should run based on current state.
    fn should_run(&self, _module: &Module, _ctx: &PassContext) -> bool {
        true
    }
}
