//! # MirBuilder
//!
//! This module contains the main builder struct for constructing MIR functions
//! from the bound tree. The MirBuilder maintains state during the lowering
//! process and provides core infrastructure for instruction generation.

use cinder_compiler_diagnostics::Diagnostic;
use cinder_compiler_semantic::{
    BoundFunction, Conversion, ConversionInserter, Expr, LocalId, ParamKind, PrimitiveType,
    ProtocolCandidate, ProtocolResolver, TypeCatalog, TypeId,
};
use cinder_compiler_semantic::types::TypeData;

use crate::{
    BasicBlockId, CfgBuilder, InstrBuilder, LoweringConfig, LoweringError, MirFunction,
    RegionId, TempKind, Terminator, Value, ValueId, ValueOrigin,
};
use crate::value::Literal;

/// Targets of `break` and `continue` for the innermost loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopScope {
    pub continue_target: BasicBlockId,
    pub break_target: BasicBlockId,
}

/// The shared block that `return` statements inside protected regions leave to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnSlot {
    pub block: BasicBlockId,
    /// Holds the pending return value of a non-void function
    pub value: Option<ValueId>,
}

/// Builder state before a statement, restored when the statement fails to lower
#[derive(Debug, Clone)]
pub(super) struct Checkpoint {
    blocks: usize,
    regions: usize,
    values: usize,
    block: BasicBlockId,
    instructions: usize,
    terminator: Terminator,
    region_depth: usize,
    loop_depth: usize,
    return_slot: Option<ReturnSlot>,
}

/// A builder that constructs a `MirFunction` from a bound function
///
/// The `MirBuilder` maintains state for the function currently being built and provides
/// methods for lowering statements into MIR instructions and terminators.
pub struct MirBuilder<'a> {
    pub(super) catalog: &'a TypeCatalog,
    pub(super) resolver: ProtocolResolver<'a>,
    pub(super) conversions: ConversionInserter<'a>,
    pub(super) bound: &'a BoundFunction,

    // State for the function currently being built
    pub(super) mir_function: MirFunction,
    pub(super) current_block_id: BasicBlockId,
    /// Open protected regions, innermost last
    pub(super) region_stack: Vec<RegionId>,
    /// Stack of loop contexts for break/continue handling
    pub(super) loop_stack: Vec<LoopScope>,
    pub(super) return_slot: Option<ReturnSlot>,
    pub(super) diagnostics: Vec<Diagnostic>,
}

impl<'a> MirBuilder<'a> {
    pub fn new(catalog: &'a TypeCatalog, bound: &'a BoundFunction, config: &'a LoweringConfig) -> Self {
        let mut mir_function = MirFunction::new(bound.name.to_string(), bound.return_type);
        let entry_block = mir_function.entry_block;

        for (local, def) in bound.locals.iter_enumerated() {
            let origin = if bound.params.contains(&local) {
                ValueOrigin::Parameter(local)
            } else {
                ValueOrigin::Local(local)
            };
            let value = mir_function.new_typed_value_id(origin, def.ty);
            mir_function.locals.insert(local, value);
        }
        mir_function.parameters = bound
            .params
            .iter()
            .filter_map(|param| mir_function.lookup_local(*param))
            .collect();

        Self {
            catalog,
            resolver: ProtocolResolver::new(catalog, bound.call_site, config.resolver_options()),
            conversions: ConversionInserter::new(catalog),
            bound,
            mir_function,
            current_block_id: entry_block,
            region_stack: Vec::new(),
            loop_stack: Vec::new(),
            return_slot: None,
            diagnostics: Vec::new(),
        }
    }

    /// Finishes lowering and hands back the function with its diagnostics
    pub fn finish(self) -> (MirFunction, Vec<Diagnostic>) {
        (self.mir_function, self.diagnostics)
    }

    // --- Sub-builders ---

    /// Returns a CFG builder positioned at the current block and region
    pub fn cfg(&mut self) -> CfgBuilder<'_> {
        let region = self.current_region();
        CfgBuilder::new(&mut self.mir_function, self.current_block_id, region)
    }

    /// Returns an instruction builder appending to the current block
    pub fn instr(&mut self) -> InstrBuilder<'_> {
        InstrBuilder::new(&mut self.mir_function, self.current_block_id)
    }

    // --- Control flow helpers ---

    pub fn current_region(&self) -> Option<RegionId> {
        self.region_stack.last().copied()
    }

    pub fn new_block(&mut self, name: &str) -> BasicBlockId {
        self.cfg().new_block(name)
    }

    pub fn switch_to(&mut self, block: BasicBlockId) {
        self.current_block_id = block;
    }

    pub fn is_terminated(&self) -> bool {
        self.mir_function.basic_blocks[self.current_block_id].is_terminated()
    }

    /// Closes the current block toward `target` with a jump or a leave
    pub fn branch_to(&mut self, target: BasicBlockId) {
        self.cfg().branch_to(target);
    }

    /// Closes the current block toward `target` unless it already ends, then
    /// continues lowering there
    pub fn jump_to(&mut self, target: BasicBlockId) {
        self.cfg().jump_to(target);
        self.current_block_id = target;
    }

    pub fn terminate_with_branch(
        &mut self,
        condition: Value,
        then_target: BasicBlockId,
        else_target: BasicBlockId,
    ) {
        self.cfg()
            .terminate_with_branch(condition, then_target, else_target);
    }

    /// The block `return` leaves to from inside a region, created on first use
    pub(super) fn return_slot(&mut self) -> ReturnSlot {
        if let Some(slot) = self.return_slot {
            return slot;
        }
        let return_type = self.bound.return_type;
        let block = self.cfg().new_block_in("return", None);
        let value = (!self.is_void(return_type))
            .then(|| self.mir_function.new_temp(TempKind::Return, return_type));
        self.cfg().set_block_terminator(
            block,
            Terminator::Return {
                value: value.map(Value::operand),
            },
        );
        let slot = ReturnSlot { block, value };
        self.return_slot = Some(slot);
        slot
    }

    // --- Values ---

    /// The value owned by a user local
    pub fn local_value(&mut self, local: LocalId) -> ValueId {
        if let Some(value) = self.mir_function.lookup_local(local) {
            return value;
        }
        let ty = self.bound.locals[local].ty;
        let value = self
            .mir_function
            .new_typed_value_id(ValueOrigin::Local(local), ty);
        self.mir_function.locals.insert(local, value);
        value
    }

    pub fn is_local_mutable(&self, local: LocalId) -> bool {
        self.bound.locals[local].mutable
    }

    /// Evaluates `expr` once into a temporary, reusing a temporary that already holds it
    pub fn capture(&mut self, expr: &Expr, kind: TempKind) -> Result<ValueId, LoweringError> {
        let value = self.lower_expression(expr)?;
        Ok(self.capture_value(value, kind, expr.ty))
    }

    /// Binds `value` to a fresh temporary unless it already is one
    pub fn capture_value(&mut self, value: Value, kind: TempKind, ty: TypeId) -> ValueId {
        match value {
            Value::Operand(id) if self.mir_function.is_temp(id) => id,
            other => self.instr().bind(kind, ty, other),
        }
    }

    /// Emits `conversion` of `value` unless it leaves the value untouched
    pub fn apply_conversion(&mut self, value: Value, conversion: Conversion, target: TypeId) -> Value {
        if conversion.is_no_op() {
            return value;
        }
        log::debug!(
            "inserting {conversion} conversion to {}",
            self.catalog.format_type(target)
        );
        Value::operand(self.instr().convert(value, conversion, target))
    }

    /// Lowers `expr` and converts it implicitly into a slot of type `target`
    pub fn lower_converted(&mut self, expr: &Expr, target: TypeId) -> Result<Value, LoweringError> {
        let conversion = self.conversions.convert(expr, target)?;
        let value = self.lower_expression(expr)?;
        Ok(self.apply_conversion(value, conversion, target))
    }

    /// Arguments a protocol call supplies for omitted optional and `params` parameters
    pub fn synthesized_arguments(&self, candidate: &ProtocolCandidate) -> Vec<Value> {
        let def = self.catalog.method(candidate.method);
        def.call_params()
            .iter()
            .zip(&candidate.param_types)
            .filter_map(|(param, ty)| match param.kind {
                ParamKind::Params => Some(Value::Literal(Literal::EmptyArray(*ty))),
                _ if param.optional => Some(Value::Literal(Literal::Default(*ty))),
                _ => None,
            })
            .collect()
    }

    // --- Types ---

    pub fn bool_type(&self) -> TypeId {
        self.catalog.primitive(PrimitiveType::Bool)
    }

    pub fn int_type(&self) -> TypeId {
        self.catalog.primitive(PrimitiveType::Int)
    }

    pub fn is_void(&self, ty: TypeId) -> bool {
        matches!(self.catalog.ty(ty), TypeData::Void)
    }

    /// The result type of awaiting `ty`, or `ty` itself when it is not awaitable
    pub fn awaited_type(&self, ty: TypeId) -> TypeId {
        match self.catalog.ty(ty) {
            TypeData::Awaitable(inner) => *inner,
            _ => ty,
        }
    }

    // --- Rollback ---

    pub(super) fn checkpoint(&self) -> Checkpoint {
        let block = &self.mir_function.basic_blocks[self.current_block_id];
        Checkpoint {
            blocks: self.mir_function.basic_blocks.len(),
            regions: self.mir_function.regions.len(),
            values: self.mir_function.value_count(),
            block: self.current_block_id,
            instructions: block.instructions.len(),
            terminator: block.terminator.clone(),
            region_depth: self.region_stack.len(),
            loop_depth: self.loop_stack.len(),
            return_slot: self.return_slot,
        }
    }

    /// Discards everything emitted since `checkpoint`
    pub(super) fn rollback(&mut self, checkpoint: Checkpoint) {
        let function = &mut self.mir_function;
        function.basic_blocks.truncate(checkpoint.blocks);
        function.regions.truncate(checkpoint.regions);
        function.value_origins.truncate(checkpoint.values);
        function
            .value_types
            .retain(|value, _| value.index() < checkpoint.values);

        let block = &mut function.basic_blocks[checkpoint.block];
        block.instructions.truncate(checkpoint.instructions);
        block.terminator = checkpoint.terminator;

        self.current_block_id = checkpoint.block;
        self.region_stack.truncate(checkpoint.region_depth);
        self.loop_stack.truncate(checkpoint.loop_depth);
        self.return_slot = checkpoint.return_slot;
    }
}
