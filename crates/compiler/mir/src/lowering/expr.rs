//! # Expression Lowering
//!
//! Expressions are lowered left to right into three-address instructions. Each
//! call returns the `Value` holding the result; storage expressions can also be
//! lowered to a `Place` so that value-type receivers are reached by address.

use cinder_compiler_semantic::{Constant, Expr, ExprKind, MethodId, ParamKind};

use crate::value::Literal;
use crate::{Argument, LoweringError, Place, Receiver, TempKind, Value};

use super::builder::MirBuilder;

impl<'a> MirBuilder<'a> {
    /// Lowers an expression to the value it produces
    pub fn lower_expression(&mut self, expr: &Expr) -> Result<Value, LoweringError> {
        match &expr.kind {
            ExprKind::Literal(constant) => Ok(Value::Literal(match constant {
                Constant::Int(value) => Literal::Integer(*value),
                Constant::Bool(value) => Literal::Boolean(*value),
                Constant::Char(value) => Literal::Char(*value),
                Constant::Str(value) => Literal::String(value.clone()),
            })),
            ExprKind::Null => Ok(Value::null()),
            ExprKind::Default => Ok(Value::Literal(Literal::Default(expr.ty))),
            ExprKind::Local(local) => Ok(Value::operand(self.local_value(*local))),
            ExprKind::Tuple(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.lower_expression(element)?);
                }
                let tuple = self.instr().make_tuple(TempKind::Scratch, values, expr.ty);
                Ok(Value::operand(tuple))
            }
            ExprKind::Field { receiver, field } => {
                let place = match receiver {
                    Some(receiver) => self.lower_projection_base(receiver)?.with_field(*field),
                    None => Place::static_field(*field),
                };
                Ok(Value::operand(
                    self.instr().load(TempKind::Scratch, place, expr.ty),
                ))
            }
            ExprKind::ArrayElement { array, indices } => {
                let place = self.lower_element_place(array, indices)?;
                Ok(Value::operand(
                    self.instr().load(TempKind::Scratch, place, expr.ty),
                ))
            }
            ExprKind::Property {
                receiver,
                property,
                args,
            } => {
                let def = self.catalog.property(*property);
                let Some(getter) = def.getter else {
                    log::warn!("property '{}' has no getter", def.name);
                    return Ok(Value::error());
                };
                let receiver = match receiver {
                    Some(receiver) => Some(self.lower_receiver(receiver)?),
                    None => None,
                };
                let args = self.lower_arguments(getter, args)?;
                let result = self
                    .instr()
                    .call(Some((TempKind::Scratch, expr.ty)), getter, receiver, args);
                Ok(result.map_or_else(Value::error, Value::operand))
            }
            ExprKind::Call {
                receiver,
                method,
                args,
            } => {
                let def = self.catalog.method(*method);
                let is_extension = def.is_extension;
                let returns = (!self.is_void(expr.ty)).then_some((TempKind::Scratch, expr.ty));

                let (receiver, args) = match receiver {
                    Some(receiver) if is_extension => {
                        let this = def.params.first().map_or(receiver.ty, |param| param.ty);
                        let this = self.lower_converted(receiver, this)?;
                        let mut lowered = vec![Argument::Value(this)];
                        lowered.extend(self.lower_arguments(*method, args)?);
                        (None, lowered)
                    }
                    Some(receiver) => {
                        let receiver = self.lower_receiver(receiver)?;
                        (Some(receiver), self.lower_arguments(*method, args)?)
                    }
                    None => (None, self.lower_arguments(*method, args)?),
                };

                let result = self.instr().call(returns, *method, receiver, args);
                Ok(result.map_or_else(Value::unit, Value::operand))
            }
            ExprKind::New { args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.lower_expression(arg)?);
                }
                Ok(Value::operand(self.instr().new_object(expr.ty, values)))
            }
        }
    }

    /// Lowers call arguments against the method's declared parameters
    ///
    /// By-value arguments are converted to the parameter type; `out`, `ref` and `in`
    /// arguments pass their storage.
    pub(super) fn lower_arguments(
        &mut self,
        method: MethodId,
        args: &[Expr],
    ) -> Result<Vec<Argument>, LoweringError> {
        let params = self.catalog.method(method).call_params();
        let mut lowered = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let param = params.get(index);
            let by_reference = param.is_some_and(|param| {
                matches!(param.kind, ParamKind::Out | ParamKind::Ref | ParamKind::In)
            });
            if by_reference {
                if let Some(place) = self.lower_place(arg)? {
                    lowered.push(Argument::Ref(place));
                    continue;
                }
            }
            let value = match param {
                Some(param) if param.kind == ParamKind::Value => {
                    self.lower_converted(arg, param.ty)?
                }
                _ => self.lower_expression(arg)?,
            };
            lowered.push(Argument::Value(value));
        }
        Ok(lowered)
    }

    /// Lowers the receiver of an instance call
    ///
    /// Addressable value-type receivers are passed by address so that the callee
    /// mutates the original storage rather than a copy.
    pub fn lower_receiver(&mut self, receiver: &Expr) -> Result<Receiver, LoweringError> {
        if receiver.addressable && self.catalog.is_value_type(receiver.ty) {
            if let Some(place) = self.lower_place(receiver)? {
                return Ok(Receiver::Address(place));
            }
        }
        Ok(Receiver::Value(self.lower_expression(receiver)?))
    }

    /// Lowers an addressable expression to the storage it denotes
    ///
    /// ## Returns
    /// `None` when the expression is not addressable
    pub fn lower_place(&mut self, expr: &Expr) -> Result<Option<Place>, LoweringError> {
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
            } => self.lower_projection_base(receiver)?.with_field(*field),
            ExprKind::ArrayElement { array, indices } => {
                self.lower_element_place(array, indices)?
            }
            _ => return Ok(None),
        };
        Ok(Some(place))
    }

    /// The place a field projection starts from
    ///
    /// Reference receivers are evaluated to a value; addressable value-type
    /// receivers are projected in place; other value-type receivers are copied
    /// into a temporary first.
    fn lower_projection_base(&mut self, receiver: &Expr) -> Result<Place, LoweringError> {
        if self.catalog.is_value_type(receiver.ty) {
            if let Some(place) = self.lower_place(receiver)? {
                return Ok(place);
            }
        }
        let value = self.lower_expression(receiver)?;
        Ok(Place::new(self.capture_value(
            value,
            TempKind::Scratch,
            receiver.ty,
        )))
    }

    fn lower_element_place(&mut self, array: &Expr, indices: &[Expr]) -> Result<Place, LoweringError> {
        let array_value = self.lower_expression(array)?;
        let base = self.capture_value(array_value, TempKind::Scratch, array.ty);
        let mut index_values = Vec::with_capacity(indices.len());
        for index in indices {
            index_values.push(self.lower_expression(index)?);
        }
        Ok(Place::new(base).with_index(index_values))
    }
}
