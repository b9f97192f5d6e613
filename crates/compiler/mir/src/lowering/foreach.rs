//! # Iteration Lowering
//!
//! `foreach` takes one of three shapes:
//!
//! - **Arrays** (non-async): an index loop over the captured array, one nested loop per
//!   dimension for multi-dimensional arrays. Nothing to dispose.
//! - **Strings** (non-async): an index loop over the characters.
//! - **Everything else**: the enumerator protocol.
//!
//! ```text
//! e = collection.GetEnumerator()
//! enter r0
//! header: c = e.MoveNext(); if c -> body else end
//! body:   x = (T)e.Current; <body>; jump header
//! end:    leave
//! handler: dispose e
//! ```
//!
//! The region is only emitted when the enumerator has something to release.

use cinder_compiler_semantic::types::TypeData;
use cinder_compiler_semantic::{
    DisposeContext, EnumerableInfo, EnumerableRoute, ForEachStatement, ForEachVariable, Expr,
    PrimitiveType, ProtocolCandidate, TypeId,
};

use crate::{
    Argument, BinaryOp, BoundKind, Instruction, LoweringError, Place, Receiver, RegionKind,
    StructuralError, TempKind, Value, ValueId,
};

use super::builder::{LoopScope, MirBuilder};

impl<'a> MirBuilder<'a> {
    /// Lowers a `foreach` or `await foreach` statement
    pub fn lower_foreach(&mut self, foreach: &ForEachStatement) -> Result<(), LoweringError> {
        if let ForEachVariable::Deconstruct(target) = &foreach.variable {
            if target.leaves().iter().any(|binding| binding.is_assignment()) {
                return Err(StructuralError::IterationVariableNotDeclared.into());
            }
        }

        if !foreach.is_async {
            let catalog = self.catalog;
            match catalog.ty(foreach.collection.ty) {
                TypeData::Array { element, rank: 1 } => {
                    return self.lower_array_foreach(foreach, *element);
                }
                TypeData::Array { element, rank } => {
                    return self.lower_multi_dimensional_foreach(foreach, *element, *rank);
                }
                TypeData::String => return self.lower_string_foreach(foreach),
                _ => {}
            }
        }

        self.lower_enumerator_foreach(foreach)
    }

    /// Assigns the current element to the iteration variable
    ///
    /// The element is converted explicitly, as a cast would.
    fn bind_iteration_variable(
        &mut self,
        variable: &ForEachVariable,
        current: ValueId,
        element_ty: TypeId,
    ) -> Result<(), LoweringError> {
        match variable {
            ForEachVariable::Single { local, ty } => {
                let local_ty = ty.unwrap_or(self.bound.locals[*local].ty);
                let conversion = self.conversions.convert_explicit(element_ty, local_ty)?;
                let value = self.apply_conversion(Value::operand(current), conversion, local_ty);
                let dest = self.local_value(*local);
                self.instr().assign_to(dest, value);
                Ok(())
            }
            ForEachVariable::Deconstruct(target) => {
                self.lower_iteration_deconstruction(target, current, element_ty)
            }
        }
    }

    // --- Arrays and strings ---

    fn lower_array_foreach(
        &mut self,
        foreach: &ForEachStatement,
        element: TypeId,
    ) -> Result<(), LoweringError> {
        let int_ty = self.int_type();
        let array = self.capture(&foreach.collection, TempKind::Collection)?;
        let length = self.instr().array_length(Value::operand(array), int_ty);
        self.lower_indexed_foreach(foreach, length, element, |builder, index| {
            let place = Place::new(array).with_index(vec![Value::operand(index)]);
            builder.instr().load(TempKind::Current, place, element)
        })
    }

    fn lower_string_foreach(&mut self, foreach: &ForEachStatement) -> Result<(), LoweringError> {
        let int_ty = self.int_type();
        let char_ty = self.catalog.primitive(PrimitiveType::Char);
        let string = self.capture(&foreach.collection, TempKind::Collection)?;
        let length = self.instr().string_length(Value::operand(string), int_ty);
        self.lower_indexed_foreach(foreach, length, char_ty, |builder, index| {
            builder
                .instr()
                .string_char(Value::operand(string), Value::operand(index), char_ty)
        })
    }

    /// `for (i = 0; i < length; i++) { x = fetch(i); body }`
    fn lower_indexed_foreach<F>(
        &mut self,
        foreach: &ForEachStatement,
        length: ValueId,
        element: TypeId,
        fetch: F,
    ) -> Result<(), LoweringError>
    where
        F: FnOnce(&mut Self, ValueId) -> ValueId,
    {
        let int_ty = self.int_type();
        let bool_ty = self.bool_type();
        let index = self.mir_function.new_temp(TempKind::Index, int_ty);
        self.instr().assign_to(index, Value::integer(0));

        let (header, body, step) = self.cfg().create_loop_blocks("foreach");
        let exit = self.new_block("foreach_exit");

        self.jump_to(header);
        let condition = self.instr().compare(
            BinaryOp::Less,
            Value::operand(index),
            Value::operand(length),
            bool_ty,
        );
        self.terminate_with_branch(Value::operand(condition), body, exit);

        self.switch_to(body);
        let current = fetch(self, index);
        self.bind_iteration_variable(&foreach.variable, current, element)?;
        self.lower_loop_body(
            &foreach.body,
            LoopScope {
                continue_target: step,
                break_target: exit,
            },
        );

        self.switch_to(step);
        self.instr()
            .binary_op_to(BinaryOp::Add, index, Value::operand(index), Value::integer(1));
        self.cfg().terminate_with_jump(header);

        self.switch_to(exit);
        Ok(())
    }

    /// One loop per dimension, outermost first, each running from the dimension's
    /// lower bound to its upper bound inclusive
    fn lower_multi_dimensional_foreach(
        &mut self,
        foreach: &ForEachStatement,
        element: TypeId,
        rank: usize,
    ) -> Result<(), LoweringError> {
        let int_ty = self.int_type();
        let bool_ty = self.bool_type();
        let array = self.capture(&foreach.collection, TempKind::Collection)?;
        let upper_bounds: Vec<ValueId> = (0..rank)
            .map(|dimension| {
                self.instr()
                    .array_bound(Value::operand(array), dimension, BoundKind::Upper, int_ty)
            })
            .collect();
        let exit = self.new_block("foreach_exit");

        // (header, step, index) per dimension
        let mut loops = Vec::with_capacity(rank);
        let mut done = exit;
        for (dimension, upper) in upper_bounds.iter().enumerate() {
            let lower = self.instr().array_bound(
                Value::operand(array),
                dimension,
                BoundKind::Lower,
                int_ty,
            );
            let index = self
                .instr()
                .bind(TempKind::Index, int_ty, Value::operand(lower));

            let (header, body, step) = self
                .cfg()
                .create_loop_blocks(&format!("foreach_dim{dimension}"));
            self.jump_to(header);
            let condition = self.instr().compare(
                BinaryOp::LessEqual,
                Value::operand(index),
                Value::operand(*upper),
                bool_ty,
            );
            self.terminate_with_branch(Value::operand(condition), body, done);
            self.switch_to(body);

            loops.push((header, step, index));
            done = step;
        }

        let indices = loops
            .iter()
            .map(|(_, _, index)| Value::operand(*index))
            .collect();
        let current = self
            .instr()
            .load(TempKind::Current, Place::new(array).with_index(indices), element);
        self.bind_iteration_variable(&foreach.variable, current, element)?;
        self.lower_loop_body(
            &foreach.body,
            LoopScope {
                continue_target: done,
                break_target: exit,
            },
        );

        for (header, step, index) in loops.into_iter().rev() {
            self.switch_to(step);
            self.instr()
                .binary_op_to(BinaryOp::Add, index, Value::operand(index), Value::integer(1));
            self.cfg().terminate_with_jump(header);
        }

        self.switch_to(exit);
        Ok(())
    }

    // --- Enumerator protocol ---

    fn lower_enumerator_foreach(&mut self, foreach: &ForEachStatement) -> Result<(), LoweringError> {
        let info = self
            .resolver
            .resolve_enumerable(foreach.collection.ty, foreach.is_async)?;
        log::debug!(
            "enumerating {} through {:?} GetEnumerator",
            self.catalog.format_type(foreach.collection.ty),
            info.route
        );

        let enumerator = self.acquire_enumerator(&foreach.collection, &info)?;
        let route = self.resolver.resolve_dispose(
            info.enumerator_type,
            foreach.is_async,
            DisposeContext::Enumerator,
        )?;

        match self.plan_disposal(enumerator, info.enumerator_type, route, foreach.is_async) {
            Some(obligation) => self.with_guard(RegionKind::ForEach, obligation, |builder| {
                builder.lower_enumerator_loop(foreach, &info, enumerator)
            }),
            None => self.lower_enumerator_loop(foreach, &info, enumerator),
        }
    }

    /// Evaluates the collection once and calls `GetEnumerator` on it
    fn acquire_enumerator(
        &mut self,
        collection: &Expr,
        info: &EnumerableInfo,
    ) -> Result<ValueId, LoweringError> {
        let candidate = &info.get_enumerator;
        let (receiver, mut args) = match info.route {
            EnumerableRoute::Pattern => (Some(self.lower_receiver(collection)?), Vec::new()),
            EnumerableRoute::Interface => {
                let value = self.lower_expression(collection)?;
                let value = self.apply_conversion(
                    value,
                    candidate.receiver_conversion.clone(),
                    candidate.receiver_type,
                );
                (Some(Receiver::Value(value)), Vec::new())
            }
            EnumerableRoute::Extension => {
                let value = self.lower_expression(collection)?;
                let this = self.apply_conversion(
                    value,
                    candidate.receiver_conversion.clone(),
                    candidate.receiver_type,
                );
                (None, vec![Argument::Value(this)])
            }
        };
        args.extend(
            self.synthesized_arguments(candidate)
                .into_iter()
                .map(Argument::Value),
        );

        let enumerator = self
            .mir_function
            .new_temp(TempKind::Enumerator, info.enumerator_type);
        self.instr().add_instruction(Instruction::call(
            Some(enumerator),
            candidate.method,
            receiver,
            args,
        ));
        Ok(enumerator)
    }

    fn lower_enumerator_loop(
        &mut self,
        foreach: &ForEachStatement,
        info: &EnumerableInfo,
        enumerator: ValueId,
    ) -> Result<(), LoweringError> {
        let header = self.new_block("foreach_header");
        let body = self.new_block("foreach_body");
        let end = self.new_block("foreach_end");

        self.jump_to(header);
        let move_next = &info.members.move_next;
        let moved = if info.is_async {
            let pending = self.call_enumerator_member(
                move_next,
                enumerator,
                info.enumerator_type,
                (TempKind::Scratch, move_next.return_type),
            );
            let bool_ty = self.awaited_type(move_next.return_type);
            self.instr()
                .await_value(Some((TempKind::Condition, bool_ty)), Value::operand(pending))
        } else {
            Some(self.call_enumerator_member(
                move_next,
                enumerator,
                info.enumerator_type,
                (TempKind::Condition, move_next.return_type),
            ))
        };
        let moved = moved.map_or_else(Value::error, Value::operand);
        self.terminate_with_branch(moved, body, end);

        self.switch_to(body);
        let current = self.call_enumerator_member(
            &info.members.current,
            enumerator,
            info.enumerator_type,
            (TempKind::Current, info.element_type),
        );
        self.bind_iteration_variable(&foreach.variable, current, info.element_type)?;
        self.lower_loop_body(
            &foreach.body,
            LoopScope {
                continue_target: header,
                break_target: end,
            },
        );

        self.switch_to(end);
        Ok(())
    }

    /// Calls `MoveNext` or the `Current` getter
    ///
    /// A value-type enumerator is passed by address so that advancing it mutates the
    /// captured enumerator rather than a copy.
    fn call_enumerator_member(
        &mut self,
        candidate: &ProtocolCandidate,
        enumerator: ValueId,
        enumerator_ty: TypeId,
        (kind, ty): (TempKind, TypeId),
    ) -> ValueId {
        let (receiver, mut args) = if candidate.is_extension {
            let this = self.apply_conversion(
                Value::operand(enumerator),
                candidate.receiver_conversion.clone(),
                candidate.receiver_type,
            );
            (None, vec![Argument::Value(this)])
        } else if self.catalog.is_value_type(enumerator_ty) {
            (Some(Receiver::Address(Place::new(enumerator))), Vec::new())
        } else {
            (Some(Receiver::Value(Value::operand(enumerator))), Vec::new())
        };
        args.extend(
            self.synthesized_arguments(candidate)
                .into_iter()
                .map(Argument::Value),
        );

        let dest = self.mir_function.new_temp(kind, ty);
        self.instr().add_instruction(Instruction::call(
            Some(dest),
            candidate.method,
            receiver,
            args,
        ));
        dest
    }
}
