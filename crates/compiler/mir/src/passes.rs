//! # MIR Passes
//!
//! Passes that run over lowered functions. Lowering emits its final form directly,
//! so the only pass the pipeline needs is `Validation`, which checks the structural
//! rules protected regions depend on.

use rustc_hash::FxHashSet;

use crate::{BasicBlock, BasicBlockId, InstructionKind, MirFunction, Terminator};

/// A trait for MIR passes
pub trait MirPass {
    /// Apply this pass to a MIR function
    /// Returns true if the function was modified
    fn run(&mut self, function: &mut MirFunction) -> bool;

    /// Get the name of this pass for debugging
    fn name(&self) -> &'static str;
}

/// MIR Validation Pass
///
/// This pass validates the MIR function to ensure it meets all invariants.
/// It never modifies the function; failures are logged.
///
/// Checks, beyond `MirFunction::validate`:
/// - `jump` and `if` stay inside the current region
/// - `return` only happens outside every region
/// - `enter` targets the entry of a region nested directly in the current one
/// - `leave` targets a block in a strictly enclosing region
/// - each region has a handler in its parent region ending in `endhandler`
/// - each handler disposes exactly once, through the method its obligation records
/// - no disposal happens outside a handler
#[derive(Debug, Default)]
pub struct Validation;

impl Validation {
    /// Create a new validation pass
    pub const fn new() -> Self {
        Self
    }

    /// Runs every check, stopping at the first violation
    pub fn validate(&self, function: &MirFunction) -> Result<(), String> {
        function.validate()?;
        for (block_id, block) in function.basic_blocks() {
            self.validate_terminator(function, block_id, block)
                .map_err(|err| format!("Block {block_id:?}: {err}"))?;
        }
        self.validate_handlers(function)?;
        self.validate_dispose_placement(function)
    }

    fn validate_terminator(
        &self,
        function: &MirFunction,
        block_id: BasicBlockId,
        block: &BasicBlock,
    ) -> Result<(), String> {
        let region_of = |target: BasicBlockId| function.basic_blocks[target].region;

        match &block.terminator {
            Terminator::Jump { target } => {
                if region_of(*target) != block.region {
                    return Err(format!("jump to {target:?} crosses a region boundary"));
                }
            }
            Terminator::If {
                then_target,
                else_target,
                ..
            } => {
                for target in [then_target, else_target] {
                    if region_of(*target) != block.region {
                        return Err(format!("branch to {target:?} crosses a region boundary"));
                    }
                }
            }
            Terminator::Return { .. } => {
                if let Some(region) = block.region {
                    return Err(format!("return from inside {region:?}"));
                }
            }
            Terminator::Enter { region, target } => {
                let def = &function.regions[*region];
                if def.entry != *target {
                    return Err(format!(
                        "enter {region:?} targets {target:?} instead of its entry {:?}",
                        def.entry
                    ));
                }
                if def.parent != block.region {
                    return Err(format!("enter {region:?} from outside its parent region"));
                }
            }
            Terminator::Leave { target } => {
                let target_region = region_of(*target);
                if target_region == block.region
                    || !function.region_contains(target_region, block.region)
                {
                    return Err(format!("leave to {target:?} exits no region"));
                }
            }
            Terminator::EndHandler { region } => {
                let def = &function.regions[*region];
                if block.region != def.parent || !def.handler_blocks.contains(&block_id) {
                    return Err(format!("endhandler {region:?} outside its handler"));
                }
            }
            Terminator::Unreachable => {}
        }
        Ok(())
    }

    fn validate_handlers(&self, function: &MirFunction) -> Result<(), String> {
        for (region_id, region) in function.regions.iter_enumerated() {
            let Some(&last) = region.handler_blocks.last() else {
                return Err(format!("Region {region_id:?} has no handler"));
            };
            if function.basic_blocks[last].terminator != Terminator::end_handler(region_id) {
                return Err(format!(
                    "Handler of {region_id:?} does not end in endhandler"
                ));
            }

            let mut disposals = Vec::new();
            for &handler_block in &region.handler_blocks {
                let block = &function.basic_blocks[handler_block];
                if block.region != region.parent {
                    return Err(format!(
                        "Handler block {handler_block:?} of {region_id:?} is not in the parent region"
                    ));
                }
                disposals.extend(block.instructions.iter().filter_map(|instruction| {
                    match &instruction.kind {
                        InstructionKind::Dispose { method, .. } => Some(*method),
                        _ => None,
                    }
                }));
            }
            match disposals.as_slice() {
                [method] if *method == region.obligation.method => {}
                [_] => {
                    return Err(format!(
                        "Handler of {region_id:?} disposes through the wrong method"
                    ))
                }
                _ => {
                    return Err(format!(
                        "Handler of {region_id:?} disposes {} times",
                        disposals.len()
                    ))
                }
            }
        }
        Ok(())
    }

    fn validate_dispose_placement(&self, function: &MirFunction) -> Result<(), String> {
        let handler_blocks: FxHashSet<BasicBlockId> = function
            .regions
            .iter()
            .flat_map(|region| region.handler_blocks.iter().copied())
            .collect();
        for (block_id, block) in function.basic_blocks() {
            if block.dispose_count() > 0 && !handler_blocks.contains(&block_id) {
                return Err(format!("Block {block_id:?} disposes outside a handler"));
            }
        }
        Ok(())
    }
}

impl MirPass for Validation {
    fn run(&mut self, function: &mut MirFunction) -> bool {
        if let Err(err) = self.validate(function) {
            log::error!(
                "MIR validation failed for function '{}': {}",
                function.name,
                err
            );
        }
        false // Validation doesn't modify the function
    }

    fn name(&self) -> &'static str {
        "Validation"
    }
}

/// A pass manager that runs a sequence of passes
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn MirPass>>,
}

impl PassManager {
    /// Create a new pass manager
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Add a pass to the manager
    pub fn add_pass<P: MirPass + 'static>(mut self, pass: P) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Run all passes on the function
    /// Returns true if any pass modified the function
    pub fn run(&mut self, function: &mut MirFunction) -> bool {
        let mut modified = false;

        for pass in &mut self.passes {
            if pass.run(function) {
                modified = true;
                log::debug!(
                    "Pass '{}' modified function '{}'",
                    pass.name(),
                    function.name
                );
            }
        }

        modified
    }

    /// The passes every lowered function goes through
    pub fn standard_pipeline() -> Self {
        Self::new().add_pass(Validation::new())
    }
}

#[cfg(test)]
#[path = "passes_tests.rs"]
mod tests;
