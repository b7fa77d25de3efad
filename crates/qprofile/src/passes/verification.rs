//! Verification and inspection passes.

use tracing::{debug, error, info};

use qprofile_ir::Module;

use crate::context::PassContext;
use crate::error::ProfileResult;
use crate::pass::{Pass, PassKind};

/// Analysis pass that runs the structural verifier.
///
/// Fails the pipeline with [`ProfileError::Ir`](crate::ProfileError::Ir)
/// when the module is malformed.
pub struct VerifyModule;

impl Pass for VerifyModule {
    fn name(&self) -> &str {
        "verify"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, module: &mut Module, _ctx: &mut PassContext) -> ProfileResult<()> {
        match module.verify() {
            Ok(()) => {
                debug!("Module {} verified", module.name);
                Ok(())
            }
            Err(e) => {
                error!("Module {} failed verification: {}", module.name, e);
                Err(e.into())
            }
        }
    }
}

/// Analysis pass that logs the textual form of the module.
pub struct PrintModule;

impl Pass for PrintModule {
    fn name(&self) -> &str {
        "print"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    #[allow(clippy::unnecessary_wraps)]
    fn run(&self, module: &mut Module, _ctx: &mut PassContext) -> ProfileResult<()> {
        info!("\n{}", module);
        Ok(())
    }
}
