//! # Control Flow Graph Builder
//!
//! This module provides specialized operations for constructing and manipulating
//! the control flow graph of MIR functions. It centralizes block creation,
//! termination, region entry/exit and navigation logic.

use crate::{BasicBlock, BasicBlockId, MirFunction, RegionId, Terminator, Value};

/// A builder for control flow graph operations
///
/// New blocks are created inside `region`, the innermost protected region open at
/// the point of construction. Exits toward blocks of an enclosing region are emitted
/// as `leave` rather than `jump`.
pub struct CfgBuilder<'f> {
    function: &'f mut MirFunction,
    current_block_id: BasicBlockId,
    region: Option<RegionId>,
}

impl<'f> CfgBuilder<'f> {
    /// Creates a new CFG builder for the given function
    ///
    /// ## Arguments
    /// * `function` - The MIR function to build the CFG for
    /// * `current_block_id` - The initially active block
    /// * `region` - The innermost open protected region
    pub const fn new(
        function: &'f mut MirFunction,
        current_block_id: BasicBlockId,
        region: Option<RegionId>,
    ) -> Self {
        Self {
            function,
            current_block_id,
            region,
        }
    }

    /// Creates a new named basic block in the current region
    pub fn new_block(&mut self, name: &str) -> BasicBlockId {
        self.function
            .add_basic_block_with_name(name.to_string(), self.region)
    }

    /// Creates a new named basic block in an explicit region
    pub fn new_block_in(&mut self, name: &str, region: Option<RegionId>) -> BasicBlockId {
        self.function.add_basic_block_with_name(name.to_string(), region)
    }

    /// Returns a reference to the current block
    pub fn current_block(&self) -> &BasicBlock {
        &self.function.basic_blocks[self.current_block_id]
    }

    /// Returns a mutable reference to the current block
    pub fn current_block_mut(&mut self) -> &mut BasicBlock {
        &mut self.function.basic_blocks[self.current_block_id]
    }

    /// Checks if the current block is terminated
    pub fn is_terminated(&self) -> bool {
        self.current_block().is_terminated()
    }

    /// Terminates the current block with the given terminator
    ///
    /// A block that is already terminated keeps its terminator; the code following
    /// an abrupt exit is unreachable and is dropped.
    pub fn terminate(&mut self, terminator: Terminator) {
        if self.is_terminated() {
            log::debug!(
                "dropping {terminator:?}: {:?} is already terminated",
                self.current_block_id
            );
            return;
        }
        self.current_block_mut().set_terminator(terminator);
    }

    /// Terminates the current block with a jump to the target block
    pub fn terminate_with_jump(&mut self, target: BasicBlockId) {
        self.terminate(Terminator::jump(target));
    }

    /// Terminates the current block with a conditional branch
    ///
    /// ## Arguments
    /// * `condition` - The condition value to test
    /// * `then_target` - The block to jump to if condition is true
    /// * `else_target` - The block to jump to if condition is false
    pub fn terminate_with_branch(
        &mut self,
        condition: Value,
        then_target: BasicBlockId,
        else_target: BasicBlockId,
    ) {
        self.terminate(Terminator::branch(condition, then_target, else_target));
    }

    /// Terminates the current block with a return
    pub fn terminate_with_return(&mut self, value: Option<Value>) {
        self.terminate(Terminator::Return { value });
    }

    /// Transfers control to `target`, as a `jump` within the current region or a
    /// `leave` when `target` lies in an enclosing one
    pub fn branch_to(&mut self, target: BasicBlockId) {
        let target_region = self.function.basic_blocks[target].region;
        if target_region == self.region {
            self.terminate_with_jump(target);
        } else {
            self.terminate(Terminator::leave(target));
        }
    }

    /// Terminates the current block by entering `region` at `target`
    pub fn terminate_with_enter(&mut self, region: RegionId, target: BasicBlockId) {
        self.terminate(Terminator::enter(region, target));
    }

    /// Closes the current block toward `target` unless an abrupt exit already did
    pub fn jump_to(&mut self, target: BasicBlockId) {
        if !self.is_terminated() {
            self.branch_to(target);
        }
    }

    /// Sets the terminator for a specific block
    pub fn set_block_terminator(&mut self, block_id: BasicBlockId, terminator: Terminator) {
        self.function.basic_blocks[block_id].set_terminator(terminator);
    }

    /// Creates blocks for an if-then-else pattern
    ///
    /// ## Returns
    /// A tuple of (then_block_id, else_block_id, merge_block_id)
    pub fn create_if_blocks(&mut self) -> (BasicBlockId, BasicBlockId, BasicBlockId) {
        let then_block = self.new_block("then");
        let else_block = self.new_block("else");
        let merge_block = self.new_block("merge");
        (then_block, else_block, merge_block)
    }

    /// Creates blocks for a counted loop
    ///
    /// ## Returns
    /// A tuple of (header_block_id, body_block_id, step_block_id)
    pub fn create_loop_blocks(&mut self, prefix: &str) -> (BasicBlockId, BasicBlockId, BasicBlockId) {
        let header = self.new_block(&format!("{prefix}_header"));
        let body = self.new_block(&format!("{prefix}_body"));
        let step = self.new_block(&format!("{prefix}_step"));
        (header, body, step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CleanupObligation, DisposeMode, NullGuard, ProtectedRegion, RegionKind, TempKind};
    use cinder_compiler_semantic::{MethodId, TypeId};

    fn function() -> MirFunction {
        MirFunction::new("f".to_string(), TypeId::new(0))
    }

    #[test]
    fn test_branch_to_same_region_jumps() {
        let mut function = function();
        let entry = function.entry_block;
        let mut cfg = CfgBuilder::new(&mut function, entry, None);
        let target = cfg.new_block("next");
        cfg.branch_to(target);
        assert_eq!(function.basic_blocks[entry].terminator, Terminator::jump(target));
    }

    #[test]
    fn test_branch_to_outer_region_leaves() {
        let mut function = function();
        let entry = function.entry_block;
        let resource = function.new_temp(TempKind::Resource, TypeId::new(0));
        let body = function.add_basic_block(None);
        let region = function.regions.push(ProtectedRegion::new(
            RegionKind::Using,
            None,
            body,
            CleanupObligation {
                resource,
                resource_type: TypeId::new(0),
                method: MethodId::new(0),
                mode: DisposeMode::Interface,
                guard: NullGuard::None,
                args: Vec::new(),
                is_async: false,
            },
        ));
        function.basic_blocks[body].region = Some(region);

        let mut cfg = CfgBuilder::new(&mut function, body, Some(region));
        cfg.branch_to(entry);
        assert_eq!(function.basic_blocks[body].terminator, Terminator::leave(entry));
    }

    #[test]
    fn test_jump_to_after_return_keeps_the_return() {
        let mut function = function();
        let entry = function.entry_block;
        let mut cfg = CfgBuilder::new(&mut function, entry, None);
        let next = cfg.new_block("next");
        cfg.terminate_with_return(None);
        cfg.jump_to(next);
        assert_eq!(function.basic_blocks[entry].terminator, Terminator::return_void());
        assert!(!function.basic_blocks[next].is_terminated());
    }

    #[test]
    fn test_set_block_terminator_targets_named_block() {
        let mut function = function();
        let entry = function.entry_block;
        let mut cfg = CfgBuilder::new(&mut function, entry, None);
        let other = cfg.new_block("other");
        cfg.set_block_terminator(other, Terminator::jump(entry));
        assert!(!cfg.is_terminated());
        assert_eq!(function.basic_blocks[other].terminator, Terminator::jump(entry));
    }

    #[test]
    fn test_terminate_keeps_first_terminator() {
        let mut function = function();
        let entry = function.entry_block;
        let mut cfg = CfgBuilder::new(&mut function, entry, None);
        cfg.terminate_with_return(None);
        cfg.terminate_with_jump(entry);
        assert!(cfg.is_terminated());
        assert_eq!(function.basic_blocks[entry].terminator, Terminator::return_void());
    }
}
