//! # Deconstruction Lowering
//!
//! Lowers `(a, (b, c)) = e` and single assignments in four phases:
//!
//! 1. Every target receiver (object, array, index, indexer argument) is evaluated
//!    left to right, depth first, into a temporary, before the right-hand side.
//! 2. The right-hand side is evaluated once. Tuple literals are split element by
//!    element with no protocol call; tuple-typed values are split with
//!    `tupleelement`; anything else goes through `Deconstruct` with one `out`
//!    temporary per component. Nested groups recurse on the produced component,
//!    so calls happen outermost first.
//! 3. Each component is converted to its target's type.
//! 4. Components are stored in source order into the receivers captured in phase 1.
//!    Discards are type-checked but never stored.

use cinder_compiler_semantic::types::TypeData;
use cinder_compiler_semantic::{
    Binding, BindingKind, DeconstructionTarget, Expr, ExprKind, MethodId, TypeId,
};

use crate::{
    Argument, LoweringError, Place, Receiver, StructuralError, TempKind, Value, ValueId,
};

use super::builder::MirBuilder;

/// Storage a leaf is written to, with its receivers already evaluated
#[derive(Debug, Clone)]
enum LeafTarget {
    Discard,
    Local(ValueId),
    Place(Place),
    Setter {
        method: MethodId,
        receiver: Option<Receiver>,
        args: Vec<Argument>,
    },
}

/// A value produced for one leaf
struct Component<'e> {
    value: Value,
    ty: TypeId,
    /// The literal element it came from, so `null`/`default`/tuple literals
    /// convert by their literal rules
    expr: Option<&'e Expr>,
}

#[derive(Clone, Copy)]
enum Source<'e> {
    Expr(&'e Expr),
    Value(ValueId, TypeId),
}

impl<'a> MirBuilder<'a> {
    /// Lowers a deconstruction statement
    pub fn lower_deconstruction(
        &mut self,
        target: &DeconstructionTarget,
        value: &Expr,
    ) -> Result<(), LoweringError> {
        self.check_targets(target)?;
        let targets = self.prepare_targets(target)?;
        let mut components = Vec::new();
        self.deconstruct(target, Source::Expr(value), &mut components)?;
        self.assign_components(target, targets, components)
    }

    /// Lowers `target = value` through the same receiver-first ordering
    pub fn lower_assignment(&mut self, target: &Binding, value: &Expr) -> Result<(), LoweringError> {
        let target = DeconstructionTarget::Leaf(target.clone());
        self.lower_deconstruction(&target, value)
    }

    /// Binds a `foreach` deconstruction variable from the current element
    pub fn lower_iteration_deconstruction(
        &mut self,
        target: &DeconstructionTarget,
        element: ValueId,
        element_ty: TypeId,
    ) -> Result<(), LoweringError> {
        if target
            .leaves()
            .iter()
            .any(|binding| binding.is_assignment())
        {
            return Err(StructuralError::IterationVariableNotDeclared.into());
        }
        let targets = self.prepare_targets(target)?;
        let mut components = Vec::new();
        self.deconstruct(target, Source::Value(element, element_ty), &mut components)?;
        self.assign_components(target, targets, components)
    }

    /// Rejects ill-formed targets before anything is emitted
    fn check_targets(&self, target: &DeconstructionTarget) -> Result<(), StructuralError> {
        let leaves = target.leaves();
        let declares = leaves.iter().any(|binding| binding.is_declaration());
        let assigns = leaves.iter().any(|binding| binding.is_assignment());
        if declares && assigns {
            return Err(StructuralError::MixedDeclarationAndAssignment);
        }

        for binding in leaves {
            match &binding.kind {
                BindingKind::Local(local) if !self.is_local_mutable(*local) => {
                    return Err(StructuralError::ReadOnlyTarget {
                        name: self.bound.locals[*local].name.to_string(),
                    });
                }
                BindingKind::Property { property, .. } => {
                    let def = self.catalog.property(*property);
                    if def.setter.is_none() {
                        return Err(StructuralError::ReadOnlyTarget {
                            name: def.name.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    // --- Phase 1: receivers ---

    fn prepare_targets(
        &mut self,
        target: &DeconstructionTarget,
    ) -> Result<Vec<LeafTarget>, LoweringError> {
        let mut targets = Vec::new();
        for binding in target.leaves() {
            targets.push(self.prepare_target(binding)?);
        }
        Ok(targets)
    }

    fn prepare_target(&mut self, binding: &Binding) -> Result<LeafTarget, LoweringError> {
        let catalog = self.catalog;
        let target = match &binding.kind {
            BindingKind::Local(local) | BindingKind::Declaration(local) => {
                LeafTarget::Local(self.local_value(*local))
            }
            BindingKind::Discard => LeafTarget::Discard,
            BindingKind::Field {
                receiver: None,
                field,
            } => LeafTarget::Place(Place::static_field(*field)),
            BindingKind::Field {
                receiver: Some(receiver),
                field,
            } => {
                // A value-type receiver is written in place
                let in_place = if catalog.is_value_type(receiver.ty) {
                    self.capture_place(receiver)?
                } else {
                    None
                };
                let base = match in_place {
                    Some(place) => place,
                    None => Place::new(self.capture_receiver(receiver)?),
                };
                LeafTarget::Place(base.with_field(*field))
            }
            BindingKind::ArrayElement { array, indices } => {
                LeafTarget::Place(self.capture_element_place(array, indices)?)
            }
            BindingKind::Property {
                receiver,
                property,
                args,
            } => {
                let def = catalog.property(*property);
                let method = def.setter.ok_or_else(|| StructuralError::ReadOnlyTarget {
                    name: def.name.to_string(),
                })?;
                let receiver = match receiver {
                    Some(receiver) if receiver.addressable && catalog.is_value_type(receiver.ty) => {
                        match self.capture_place(receiver)? {
                            Some(place) => Some(Receiver::Address(place)),
                            None => Some(Receiver::Value(Value::operand(
                                self.capture_receiver(receiver)?,
                            ))),
                        }
                    }
                    Some(receiver) => Some(Receiver::Value(Value::operand(
                        self.capture_receiver(receiver)?,
                    ))),
                    None => None,
                };

                let params = catalog.method(method).call_params();
                let mut lowered = Vec::with_capacity(args.len());
                for (index, arg) in args.iter().enumerate() {
                    let ty = params.get(index).map_or(arg.ty, |param| param.ty);
                    let value = self.lower_converted(arg, ty)?;
                    let captured = self.capture_value(value, TempKind::Receiver, ty);
                    lowered.push(Argument::Value(Value::operand(captured)));
                }
                LeafTarget::Setter {
                    method,
                    receiver,
                    args: lowered,
                }
            }
        };
        Ok(target)
    }

    /// The storage an addressable value-type receiver denotes, with every array and
    /// index along the path captured in a temporary
    ///
    /// ## Returns
    /// `None` when the expression is not addressable
    fn capture_place(&mut self, expr: &Expr) -> Result<Option<Place>, LoweringError> {
        if !expr.addressable {
            return Ok(None);
        }
        let place = match &expr.kind {
            ExprKind::Local(local) => Place::new(self.local_value(*local)),
            ExprKind::Field {
                receiver: None,
                field,
            } => Place::static_field(*field),
            ExprKind::Field {
                receiver: Some(receiver),
                field,
            } => {
                let in_place = if self.catalog.is_value_type(receiver.ty) {
                    self.capture_place(receiver)?
                } else {
                    None
                };
                let base = match in_place {
                    Some(place) => place,
                    None => Place::new(self.capture_receiver(receiver)?),
                };
                base.with_field(*field)
            }
            ExprKind::ArrayElement { array, indices } => {
                self.capture_element_place(array, indices)?
            }
            _ => return Ok(None),
        };
        Ok(Some(place))
    }

    fn capture_element_place(&mut self, array: &Expr, indices: &[Expr]) -> Result<Place, LoweringError> {
        let array = self.capture_receiver(array)?;
        let mut index_values = Vec::with_capacity(indices.len());
        for index in indices {
            index_values.push(Value::operand(self.capture_receiver(index)?));
        }
        Ok(Place::new(array).with_index(index_values))
    }

    /// Evaluates a receiver into its own temporary; locals are copied too, since the
    /// right-hand side may reassign them
    fn capture_receiver(&mut self, expr: &Expr) -> Result<ValueId, LoweringError> {
        let value = self.lower_expression(expr)?;
        Ok(match value {
            Value::Operand(id) if self.mir_function.is_temp(id) => id,
            other => self.instr().bind(TempKind::Receiver, expr.ty, other),
        })
    }

    // --- Phase 2: components ---

    fn deconstruct<'e>(
        &mut self,
        target: &DeconstructionTarget,
        source: Source<'e>,
        out: &mut Vec<Component<'e>>,
    ) -> Result<(), LoweringError> {
        let elements = match target {
            DeconstructionTarget::Leaf(_) => {
                let component = match source {
                    Source::Expr(expr) => Component {
                        value: self.lower_expression(expr)?,
                        ty: expr.ty,
                        expr: Some(expr),
                    },
                    Source::Value(value, ty) => Component {
                        value: Value::operand(value),
                        ty,
                        expr: None,
                    },
                };
                out.push(component);
                return Ok(());
            }
            DeconstructionTarget::Group { elements, .. } => elements,
        };

        let (source, source_ty) = match source {
            Source::Expr(Expr {
                kind: ExprKind::Tuple(items),
                ..
            }) => return self.deconstruct_tuple_literal(elements, items, out),
            Source::Expr(expr) => {
                let value = self.lower_expression(expr)?;
                (self.capture_value(value, TempKind::Source, expr.ty), expr.ty)
            }
            Source::Value(value, ty) => (value, ty),
        };

        let produced = self.split(elements.len(), source, source_ty)?;
        for (element, (value, ty)) in elements.iter().zip(produced) {
            self.deconstruct(element, Source::Value(value, ty), out)?;
        }
        Ok(())
    }

    /// Splits a tuple literal element-wise; no protocol call is involved
    fn deconstruct_tuple_literal<'e>(
        &mut self,
        elements: &[DeconstructionTarget],
        items: &'e [Expr],
        out: &mut Vec<Component<'e>>,
    ) -> Result<(), LoweringError> {
        if items.len() != elements.len() {
            return Err(StructuralError::ArityMismatch {
                expected: elements.len(),
                found: items.len(),
            }
            .into());
        }

        for (element, item) in elements.iter().zip(items) {
            match element {
                DeconstructionTarget::Leaf(_) => {
                    let value = self.lower_expression(item)?;
                    let captured = self.capture_value(value, TempKind::Component, item.ty);
                    out.push(Component {
                        value: Value::operand(captured),
                        ty: item.ty,
                        expr: Some(item),
                    });
                }
                DeconstructionTarget::Group { .. } => {
                    self.deconstruct(element, Source::Expr(item), out)?;
                }
            }
        }
        Ok(())
    }

    /// Produces the `arity` components of a non-literal value
    fn split(
        &mut self,
        arity: usize,
        source: ValueId,
        source_ty: TypeId,
    ) -> Result<Vec<(ValueId, TypeId)>, LoweringError> {
        let catalog = self.catalog;
        if let TypeData::Tuple(element_types) = catalog.ty(source_ty) {
            if element_types.len() != arity {
                return Err(StructuralError::ArityMismatch {
                    expected: arity,
                    found: element_types.len(),
                }
                .into());
            }
            return Ok(element_types
                .iter()
                .enumerate()
                .map(|(index, ty)| {
                    let element = self.instr().tuple_element(
                        TempKind::Component,
                        Value::operand(source),
                        index,
                        *ty,
                    );
                    (element, *ty)
                })
                .collect());
        }

        let candidate = self.resolver.resolve_deconstruct(source_ty, arity)?;
        log::debug!(
            "deconstructing {} with {}Deconstruct",
            catalog.format_type(source_ty),
            if candidate.is_extension { "extension " } else { "" }
        );

        let outs: Vec<(ValueId, TypeId)> = candidate
            .param_types
            .iter()
            .map(|ty| (self.mir_function.new_temp(TempKind::Component, *ty), *ty))
            .collect();

        let (receiver, mut args) = if candidate.is_extension {
            let this = self.apply_conversion(
                Value::operand(source),
                candidate.receiver_conversion.clone(),
                candidate.receiver_type,
            );
            (None, vec![Argument::Value(this)])
        } else if catalog.is_value_type(source_ty) {
            (Some(Receiver::Address(Place::new(source))), Vec::new())
        } else {
            (Some(Receiver::Value(Value::operand(source))), Vec::new())
        };
        args.extend(outs.iter().map(|(out, _)| Argument::Out(*out)));

        self.instr().call(None, candidate.method, receiver, args);
        Ok(outs)
    }

    // --- Phases 3 and 4: conversions, then stores ---

    fn assign_components(
        &mut self,
        target: &DeconstructionTarget,
        targets: Vec<LeafTarget>,
        components: Vec<Component<'_>>,
    ) -> Result<(), LoweringError> {
        let leaves = target.leaves();
        let mut converted = Vec::with_capacity(leaves.len());
        for ((binding, leaf), component) in leaves.into_iter().zip(targets).zip(components) {
            let target_ty = binding.ty.unwrap_or(component.ty);
            let conversion = match component.expr {
                Some(expr) => self.conversions.convert(expr, target_ty)?,
                None => self.conversions.convert_type(component.ty, target_ty)?,
            };
            if matches!(leaf, LeafTarget::Discard) {
                continue;
            }
            let value = self.apply_conversion(component.value, conversion, target_ty);
            converted.push((leaf, value));
        }

        for (leaf, value) in converted {
            self.store_leaf(leaf, value);
        }
        Ok(())
    }

    fn store_leaf(&mut self, leaf: LeafTarget, value: Value) {
        match leaf {
            LeafTarget::Discard => {}
            LeafTarget::Local(dest) => {
                self.instr().assign_to(dest, value);
            }
            LeafTarget::Place(place) => {
                self.instr().store(place, value);
            }
            LeafTarget::Setter {
                method,
                receiver,
                mut args,
            } => {
                args.push(Argument::Value(value));
                self.instr().call(None, method, receiver, args);
            }
        }
    }
}
