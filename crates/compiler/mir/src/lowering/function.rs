//! # Function-level MIR Lowering
//!
//! This module contains the main entry point for MIR generation and the
//! orchestration logic for lowering entire functions from the bound tree.

use cinder_compiler_diagnostics::{Diagnostic, DiagnosticCollection};
use cinder_compiler_semantic::{BoundFunction, TypeCatalog};

use crate::passes::{MirPass, Validation};
use crate::{LoweringConfig, MirFunction, MirModule, Terminator};

use super::builder::MirBuilder;

/// The main entry point for MIR generation.
///
/// Lowers every function into one module.
///
/// # Error Handling
///
/// Lowering recovers per statement: a statement that fails is dropped and reported,
/// and the rest of its function is still lowered.
/// - Returns `Err` with every diagnostic, errors first, if any of them is an error
/// - Warnings alone do not fail the module
pub fn generate_mir(
    catalog: &TypeCatalog,
    functions: &[BoundFunction],
    config: &LoweringConfig,
) -> Result<MirModule, DiagnosticCollection> {
    let mut mir_module = MirModule::new();
    let mut diagnostics = DiagnosticCollection::new();

    for bound in functions {
        let (mir_function, function_diagnostics) = lower_function(catalog, bound, config);
        diagnostics.extend(function_diagnostics);
        mir_module.add_function(mir_function);
    }

    if diagnostics.has_errors() {
        diagnostics.sort();
        return Err(diagnostics);
    }
    for warning in diagnostics.all() {
        log::warn!("{}", warning.message);
    }
    Ok(mir_module)
}

/// Lowers a single bound function into a `MirFunction`
///
/// ## Returns
/// The lowered function, complete even when some statements failed, together with
/// the diagnostics reported while lowering it
pub fn lower_function(
    catalog: &TypeCatalog,
    bound: &BoundFunction,
    config: &LoweringConfig,
) -> (MirFunction, Vec<Diagnostic>) {
    let mut builder = MirBuilder::new(catalog, bound, config);
    builder.lower_block(&bound.body);

    // Falling off the end of the body
    if !builder.is_terminated() {
        if builder.is_void(bound.return_type) {
            builder.cfg().terminate_with_return(None);
        } else {
            builder.cfg().terminate(Terminator::unreachable());
        }
    }

    let (mut mir_function, diagnostics) = builder.finish();
    if config.run_validation {
        Validation::new().run(&mut mir_function);
    }
    log::debug!(
        "lowered '{}' into {} blocks and {} regions",
        mir_function.name,
        mir_function.basic_blocks.len(),
        mir_function.regions.len()
    );
    (mir_function, diagnostics)
}
