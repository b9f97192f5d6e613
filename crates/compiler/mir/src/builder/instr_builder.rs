//! # Instruction Builder
//!
//! This module provides a fluent API for creating MIR instructions.
//! Methods ending in `_to` write an explicit destination; the others allocate a
//! fresh temporary of the given kind and type and return it.

use cinder_compiler_semantic::{Conversion, MethodId, TypeId};

use crate::{
    Argument, BasicBlockId, BinaryOp, BoundKind, Instruction, MirFunction, Place, Receiver,
    TempKind, Value, ValueId,
};

/// A builder for creating MIR instructions with a fluent API
pub struct InstrBuilder<'f> {
    function: &'f mut MirFunction,
    current_block: BasicBlockId,
}

impl<'f> InstrBuilder<'f> {
    /// Creates a new instruction builder for the given function and current block
    pub const fn new(function: &'f mut MirFunction, current_block: BasicBlockId) -> Self {
        Self {
            function,
            current_block,
        }
    }

    /// Add an instruction to the current block
    pub fn add_instruction(&mut self, instruction: Instruction) {
        if let Some(block) = self.function.basic_blocks.get_mut(self.current_block) {
            block.push_instruction(instruction);
        }
    }

    fn temp(&mut self, kind: TempKind, ty: TypeId) -> ValueId {
        self.function.new_temp(kind, ty)
    }

    /// Create and add an assignment with explicit destination
    pub fn assign_to(&mut self, dest: ValueId, value: Value) -> &mut Self {
        self.add_instruction(Instruction::assign(dest, value));
        self
    }

    /// Binds `value` to a fresh temporary
    pub fn bind(&mut self, kind: TempKind, ty: TypeId, value: Value) -> ValueId {
        let dest = self.temp(kind, ty);
        self.assign_to(dest, value);
        dest
    }

    /// Create and add a call instruction
    ///
    /// ## Returns
    /// The result temporary, or `None` for a void call
    pub fn call(
        &mut self,
        result: Option<(TempKind, TypeId)>,
        method: MethodId,
        receiver: Option<Receiver>,
        args: Vec<Argument>,
    ) -> Option<ValueId> {
        let dest = result.map(|(kind, ty)| self.temp(kind, ty));
        self.add_instruction(Instruction::call(dest, method, receiver, args));
        dest
    }

    pub fn new_object(&mut self, ty: TypeId, args: Vec<Value>) -> ValueId {
        let dest = self.temp(TempKind::Scratch, ty);
        self.add_instruction(Instruction::new_object(dest, ty, args));
        dest
    }

    /// Create and add a conversion into a fresh `Converted` temporary
    pub fn convert(&mut self, source: Value, conversion: Conversion, target: TypeId) -> ValueId {
        let dest = self.temp(TempKind::Converted, target);
        self.add_instruction(Instruction::convert(dest, source, conversion, target));
        dest
    }

    pub fn tuple_element(
        &mut self,
        kind: TempKind,
        tuple: Value,
        index: usize,
        ty: TypeId,
    ) -> ValueId {
        let dest = self.temp(kind, ty);
        self.add_instruction(Instruction::tuple_element(dest, tuple, index));
        dest
    }

    pub fn make_tuple(&mut self, kind: TempKind, elements: Vec<Value>, ty: TypeId) -> ValueId {
        let dest = self.temp(kind, ty);
        self.add_instruction(Instruction::make_tuple(dest, elements));
        dest
    }

    pub fn load(&mut self, kind: TempKind, place: Place, ty: TypeId) -> ValueId {
        let dest = self.temp(kind, ty);
        self.add_instruction(Instruction::load(dest, place));
        dest
    }

    /// Create and add a store instruction
    pub fn store(&mut self, place: Place, value: Value) -> &mut Self {
        self.add_instruction(Instruction::store(place, value));
        self
    }

    pub fn array_length(&mut self, array: Value, ty: TypeId) -> ValueId {
        let dest = self.temp(TempKind::Bound, ty);
        self.add_instruction(Instruction::array_length(dest, array));
        dest
    }

    pub fn array_bound(
        &mut self,
        array: Value,
        dimension: usize,
        kind: BoundKind,
        ty: TypeId,
    ) -> ValueId {
        let dest = self.temp(TempKind::Bound, ty);
        self.add_instruction(Instruction::array_bound(dest, array, dimension, kind));
        dest
    }

    pub fn string_length(&mut self, string: Value, ty: TypeId) -> ValueId {
        let dest = self.temp(TempKind::Bound, ty);
        self.add_instruction(Instruction::string_length(dest, string));
        dest
    }

    pub fn string_char(&mut self, string: Value, index: Value, ty: TypeId) -> ValueId {
        let dest = self.temp(TempKind::Current, ty);
        self.add_instruction(Instruction::string_char(dest, string, index));
        dest
    }

    /// Create and add a binary operation instruction with explicit destination
    pub fn binary_op_to(
        &mut self,
        op: BinaryOp,
        dest: ValueId,
        left: Value,
        right: Value,
    ) -> &mut Self {
        self.add_instruction(Instruction::binary_op(op, dest, left, right));
        self
    }

    /// Create and add a binary operation into a fresh condition temporary
    pub fn compare(&mut self, op: BinaryOp, left: Value, right: Value, bool_ty: TypeId) -> ValueId {
        let dest = self.temp(TempKind::Condition, bool_ty);
        self.binary_op_to(op, dest, left, right);
        dest
    }

    pub fn null_check(&mut self, value: Value, bool_ty: TypeId) -> ValueId {
        let dest = self.temp(TempKind::Condition, bool_ty);
        self.add_instruction(Instruction::null_check(dest, value));
        dest
    }

    pub fn is_instance(&mut self, value: Value, ty: TypeId) -> ValueId {
        let dest = self.temp(TempKind::Scratch, ty);
        self.add_instruction(Instruction::is_instance(dest, value, ty));
        dest
    }

    /// Awaits `awaitable`, binding its result when `result` is given
    pub fn await_value(
        &mut self,
        result: Option<(TempKind, TypeId)>,
        awaitable: Value,
    ) -> Option<ValueId> {
        let dest = result.map(|(kind, ty)| self.temp(kind, ty));
        self.add_instruction(Instruction::await_value(dest, awaitable));
        dest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InstructionKind, PrettyPrint};

    #[test]
    fn test_bind_allocates_typed_temp() {
        let mut function = MirFunction::new("f".to_string(), TypeId::new(0));
        let entry = function.entry_block;
        let ty = TypeId::new(3);

        let mut instrs = InstrBuilder::new(&mut function, entry);
        let temp = instrs.bind(TempKind::Component, ty, Value::integer(7));
        let converted = instrs.convert(Value::operand(temp), Conversion::ImplicitNumeric, ty);

        assert_eq!(function.get_value_type(temp), Some(ty));
        assert!(function.is_temp(converted));
        let block = &function.basic_blocks[entry];
        assert_eq!(block.instructions.len(), 2);
        assert!(matches!(
            block.instructions[1].kind,
            InstructionKind::Convert { dest, .. } if dest == converted
        ));
        assert_eq!(block.instructions[0].pretty_print(0), "%0 = 7");
    }
}
