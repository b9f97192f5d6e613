//! # Trace Interpreter
//!
//! Executes a lowered function against a [`Host`] that supplies member behaviour,
//! recording every observable step as a [`TraceEvent`]. The trace shows the order in
//! which receivers, calls, conversions and stores happen, and whether each protected
//! region's handler ran exactly once however control left it.
//!
//! Exceptions raised by the host unwind through the regions that are still active,
//! running their handlers innermost first. A handler that throws replaces the
//! exception in flight.

use std::collections::BTreeMap;

use cinder_compiler_semantic::{Conversion, FieldId, LocalId, MethodId, TypeId};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use thiserror::Error;

use crate::{
    Argument, BasicBlockId, BinaryOp, BoundKind, DisposeMode, Instruction, InstructionKind,
    Literal, MirFunction, Place, PlaceBase, PrettyPrint, Projection, Receiver, RegionId,
    Terminator, Value, ValueId, ValueOrigin,
};

/// A heap-allocated object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub index: usize,
    pub ty: TypeId,
}

/// A runtime value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceValue {
    Unit,
    Int(i64),
    Bool(bool),
    Char(char),
    Str(SmolStr),
    Null,
    Object(ObjectRef),
    /// Index of an array on the heap
    Array(usize),
    /// A value-type instance, copied on assignment
    Struct {
        ty: TypeId,
        fields: BTreeMap<FieldId, TraceValue>,
    },
    Tuple(Vec<TraceValue>),
}

/// An exception thrown by host code or by a failed runtime check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub message: SmolStr,
}

impl Exception {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn null_reference() -> Self {
        Self::new("NullReferenceException")
    }

    fn index_out_of_range() -> Self {
        Self::new("IndexOutOfRangeException")
    }
}

/// What a host call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    pub value: TraceValue,
    /// Values for the call's `out` arguments, in order
    pub outs: Vec<TraceValue>,
}

impl CallResult {
    pub const fn unit() -> Self {
        Self {
            value: TraceValue::Unit,
            outs: Vec::new(),
        }
    }

    pub const fn value(value: TraceValue) -> Self {
        Self {
            value,
            outs: Vec::new(),
        }
    }

    pub const fn outs(outs: Vec<TraceValue>) -> Self {
        Self {
            value: TraceValue::Unit,
            outs,
        }
    }
}

/// Behaviour of the members a lowered function calls
pub trait Host {
    /// Invokes `method`. `this` is `None` for static and extension calls; changes a
    /// method makes to a by-address receiver are written back to its storage.
    fn call(
        &mut self,
        method: MethodId,
        this: Option<&mut TraceValue>,
        args: &[TraceValue],
    ) -> Result<CallResult, Exception>;

    /// Runs the constructor of a freshly allocated object
    fn construct(
        &mut self,
        _ty: TypeId,
        _object: ObjectRef,
        _args: &[TraceValue],
    ) -> Result<(), Exception> {
        Ok(())
    }

    /// Runtime type test
    fn is_instance(&mut self, _value: &TraceValue, _ty: TypeId) -> bool {
        false
    }

    fn default_value(&mut self, _ty: TypeId) -> TraceValue {
        TraceValue::Null
    }
}

/// One observable step of an execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Call {
        method: MethodId,
        this: Option<TraceValue>,
        args: Vec<TraceValue>,
    },
    New {
        ty: TypeId,
        object: ObjectRef,
    },
    Dispose {
        method: MethodId,
        mode: DisposeMode,
        resource: TraceValue,
    },
    /// A user local or parameter was assigned
    Assign {
        local: LocalId,
        value: TraceValue,
    },
    /// A field or array element was written
    Store {
        place: String,
        value: TraceValue,
    },
    Await,
    Throw(Exception),
}

impl TraceEvent {
    pub const fn is_dispose(&self) -> bool {
        matches!(self, Self::Dispose { .. })
    }
}

/// How an execution ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Returned(Option<TraceValue>),
    Threw(Exception),
}

/// The function could not be executed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("read of {0:?} before it was assigned")]
    UndefinedValue(ValueId),
    #[error("reached unreachable block {0:?}")]
    Unreachable(BasicBlockId),
    #[error("gave up after {0} blocks")]
    StepLimit(usize),
    #[error("malformed MIR: {0}")]
    Malformed(String),
}

/// Why an instruction stopped
enum Fault {
    Error(TraceError),
    Exception(Exception),
}

impl From<TraceError> for Fault {
    fn from(error: TraceError) -> Self {
        Self::Error(error)
    }
}

impl From<Exception> for Fault {
    fn from(exception: Exception) -> Self {
        Self::Exception(exception)
    }
}

fn malformed(message: impl Into<String>) -> Fault {
    Fault::Error(TraceError::Malformed(message.into()))
}

#[derive(Debug, Clone)]
enum HeapEntry {
    Object {
        fields: BTreeMap<FieldId, TraceValue>,
    },
    Array {
        /// (lower bound, length) per dimension
        dims: Vec<(i64, i64)>,
        elements: Vec<TraceValue>,
    },
}

/// A projection with its indices evaluated
enum Step {
    Field(FieldId),
    Index(Vec<i64>),
}

#[derive(Debug, Default)]
struct Heap {
    entries: Vec<HeapEntry>,
}

impl Heap {
    fn alloc(&mut self, entry: HeapEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    fn fields_mut(&mut self, index: usize) -> Result<&mut BTreeMap<FieldId, TraceValue>, Fault> {
        match self.entries.get_mut(index) {
            Some(HeapEntry::Object { fields }) => Ok(fields),
            _ => Err(malformed(format!("heap entry {index} is not an object"))),
        }
    }

    fn dims(&self, index: usize) -> Result<&[(i64, i64)], Fault> {
        match self.entries.get(index) {
            Some(HeapEntry::Array { dims, .. }) => Ok(dims),
            _ => Err(malformed(format!("heap entry {index} is not an array"))),
        }
    }

    /// Row-major offset of an element; out-of-range indices throw
    fn offset(&self, index: usize, indices: &[i64]) -> Result<usize, Fault> {
        let dims = self.dims(index)?;
        if dims.len() != indices.len() {
            return Err(malformed(format!(
                "{} indices into a rank {} array",
                indices.len(),
                dims.len()
            )));
        }
        let mut offset = 0i64;
        for (&(lower, length), &i) in dims.iter().zip(indices) {
            let relative = i - lower;
            if relative < 0 || relative >= length {
                return Err(Exception::index_out_of_range().into());
            }
            offset = offset * length + relative;
        }
        usize::try_from(offset).map_err(|_| Exception::index_out_of_range().into())
    }

    fn elements_mut(&mut self, index: usize) -> Result<&mut Vec<TraceValue>, Fault> {
        match self.entries.get_mut(index) {
            Some(HeapEntry::Array { elements, .. }) => Ok(elements),
            _ => Err(malformed(format!("heap entry {index} is not an array"))),
        }
    }

    fn element(&mut self, index: usize, indices: &[i64]) -> Result<TraceValue, Fault> {
        let offset = self.offset(index, indices)?;
        Ok(self
            .elements_mut(index)?
            .get(offset)
            .cloned()
            .unwrap_or(TraceValue::Null))
    }

    fn set_element(&mut self, index: usize, indices: &[i64], value: TraceValue) -> Result<(), Fault> {
        let offset = self.offset(index, indices)?;
        let elements = self.elements_mut(index)?;
        if elements.len() <= offset {
            elements.resize(offset + 1, TraceValue::Null);
        }
        elements[offset] = value;
        Ok(())
    }

    /// Writes `value` at the end of `steps` below `target`
    fn store(&mut self, target: &mut TraceValue, steps: &[Step], value: TraceValue) -> Result<(), Fault> {
        let Some((step, rest)) = steps.split_first() else {
            *target = value;
            return Ok(());
        };
        match (step, target) {
            (_, TraceValue::Null) => Err(Exception::null_reference().into()),
            (Step::Field(field), TraceValue::Struct { fields, .. }) => {
                let slot = fields.entry(*field).or_insert(TraceValue::Null);
                self.store(slot, rest, value)
            }
            (Step::Field(field), TraceValue::Object(object)) => {
                let index = object.index;
                let mut slot = self
                    .fields_mut(index)?
                    .get(field)
                    .cloned()
                    .unwrap_or(TraceValue::Null);
                self.store(&mut slot, rest, value)?;
                self.fields_mut(index)?.insert(*field, slot);
                Ok(())
            }
            (Step::Index(indices), TraceValue::Array(array)) => {
                let array = *array;
                let mut slot = self.element(array, indices)?;
                self.store(&mut slot, rest, value)?;
                self.set_element(array, indices, slot)
            }
            (_, other) => Err(malformed(format!("cannot project into {other:?}"))),
        }
    }
}

/// Executes one lowered function
pub struct TraceInterpreter<'f, H> {
    function: &'f MirFunction,
    host: H,
    values: FxHashMap<ValueId, TraceValue>,
    statics: FxHashMap<FieldId, TraceValue>,
    heap: Heap,
    events: Vec<TraceEvent>,
    steps: usize,
    max_steps: usize,
}

impl<'f, H: Host> TraceInterpreter<'f, H> {
    pub fn new(function: &'f MirFunction, host: H) -> Self {
        Self {
            function,
            host,
            values: FxHashMap::default(),
            statics: FxHashMap::default(),
            heap: Heap::default(),
            events: Vec::new(),
            steps: 0,
            max_steps: 10_000,
        }
    }

    /// Bounds the number of blocks executed before giving up
    pub const fn with_step_limit(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Allocates an object without running a constructor
    pub fn alloc_object(&mut self, ty: TypeId) -> TraceValue {
        let index = self.heap.alloc(HeapEntry::Object {
            fields: BTreeMap::new(),
        });
        TraceValue::Object(ObjectRef { index, ty })
    }

    /// Allocates an array with the given (lower bound, length) per dimension
    pub fn alloc_array(&mut self, dims: Vec<(i64, i64)>, elements: Vec<TraceValue>) -> TraceValue {
        TraceValue::Array(self.heap.alloc(HeapEntry::Array { dims, elements }))
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub const fn host(&self) -> &H {
        &self.host
    }

    pub fn into_parts(self) -> (H, Vec<TraceEvent>) {
        (self.host, self.events)
    }

    /// Current value of a user local
    pub fn local(&self, local: LocalId) -> Option<&TraceValue> {
        self.function
            .lookup_local(local)
            .and_then(|value| self.values.get(&value))
    }

    /// Elements of a heap array in row-major order
    pub fn array_elements(&self, array: &TraceValue) -> Option<&[TraceValue]> {
        match array {
            TraceValue::Array(index) => match self.heap.entries.get(*index) {
                Some(HeapEntry::Array { elements, .. }) => Some(elements),
                _ => None,
            },
            _ => None,
        }
    }

    /// Runs the function from its entry block with `args` bound to its parameters
    pub fn run(&mut self, args: Vec<TraceValue>) -> Result<Outcome, TraceError> {
        let function = self.function;
        for (param, arg) in function.parameters.iter().zip(args) {
            self.values.insert(*param, arg);
        }

        let mut active: Vec<RegionId> = Vec::new();
        let mut block = function.entry_block;
        loop {
            self.step()?;
            match self.run_block(block) {
                Ok(()) => {}
                Err(Fault::Error(error)) => return Err(error),
                Err(Fault::Exception(exception)) => return self.unwind(&mut active, exception),
            }

            let current = &function.basic_blocks[block];
            block = match &current.terminator {
                Terminator::Jump { target } => *target,
                Terminator::If {
                    condition,
                    then_target,
                    else_target,
                } => match self.condition(condition) {
                    Ok(true) => *then_target,
                    Ok(false) => *else_target,
                    Err(Fault::Error(error)) => return Err(error),
                    Err(Fault::Exception(exception)) => {
                        return self.unwind(&mut active, exception)
                    }
                },
                Terminator::Return { value } => {
                    let value = match value {
                        Some(value) => match self.eval(value) {
                            Ok(value) => Some(value),
                            Err(Fault::Error(error)) => return Err(error),
                            Err(Fault::Exception(exception)) => {
                                return self.unwind(&mut active, exception)
                            }
                        },
                        None => None,
                    };
                    return Ok(Outcome::Returned(value));
                }
                Terminator::Enter { region, target } => {
                    active.push(*region);
                    *target
                }
                Terminator::Leave { target } => {
                    let target_region = function.basic_blocks[*target].region;
                    while let Some(&innermost) = active.last() {
                        if function.region_contains(Some(innermost), target_region) {
                            break;
                        }
                        active.pop();
                        match self.run_handler(innermost) {
                            Ok(()) => {}
                            Err(Fault::Error(error)) => return Err(error),
                            Err(Fault::Exception(exception)) => {
                                return self.unwind(&mut active, exception)
                            }
                        }
                    }
                    *target
                }
                Terminator::EndHandler { region } => {
                    return Err(TraceError::Malformed(format!(
                        "endhandler {region:?} reached outside its handler"
                    )))
                }
                Terminator::Unreachable => return Err(TraceError::Unreachable(block)),
            };
        }
    }

    fn step(&mut self) -> Result<(), TraceError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(TraceError::StepLimit(self.max_steps));
        }
        Ok(())
    }

    /// Runs the handlers of every active region, innermost first
    fn unwind(
        &mut self,
        active: &mut Vec<RegionId>,
        exception: Exception,
    ) -> Result<Outcome, TraceError> {
        self.events.push(TraceEvent::Throw(exception.clone()));
        let mut in_flight = exception;
        while let Some(region) = active.pop() {
            match self.run_handler(region) {
                Ok(()) => {}
                Err(Fault::Error(error)) => return Err(error),
                Err(Fault::Exception(replacement)) => {
                    self.events.push(TraceEvent::Throw(replacement.clone()));
                    in_flight = replacement;
                }
            }
        }
        Ok(Outcome::Threw(in_flight))
    }

    fn run_handler(&mut self, region: RegionId) -> Result<(), Fault> {
        let function = self.function;
        let mut block = function
            .regions
            .get(region)
            .and_then(|def| def.handler())
            .ok_or_else(|| malformed(format!("{region:?} has no handler")))?;
        loop {
            self.step()?;
            self.run_block(block)?;
            block = match &function.basic_blocks[block].terminator {
                Terminator::Jump { target } => *target,
                Terminator::If {
                    condition,
                    then_target,
                    else_target,
                } => {
                    if self.condition(condition)? {
                        *then_target
                    } else {
                        *else_target
                    }
                }
                Terminator::EndHandler { region: ended } if *ended == region => return Ok(()),
                other => {
                    return Err(malformed(format!(
                        "handler of {region:?} ends in {}",
                        other.pretty_print(0)
                    )))
                }
            };
        }
    }

    fn run_block(&mut self, block: BasicBlockId) -> Result<(), Fault> {
        let function = self.function;
        for instruction in &function.basic_blocks[block].instructions {
            self.execute(instruction)?;
        }
        Ok(())
    }

    fn condition(&mut self, condition: &Value) -> Result<bool, Fault> {
        match self.eval(condition)? {
            TraceValue::Bool(value) => Ok(value),
            other => Err(malformed(format!("branch on {other:?}"))),
        }
    }

    fn execute(&mut self, instruction: &Instruction) -> Result<(), Fault> {
        match &instruction.kind {
            InstructionKind::Assign { dest, source } => {
                let value = self.eval(source)?;
                self.assign(*dest, value);
            }
            InstructionKind::Call {
                dest,
                method,
                receiver,
                args,
            } => {
                let (mut this, address) = match receiver {
                    None => (None, None),
                    Some(Receiver::Value(value)) => (Some(self.eval(value)?), None),
                    Some(Receiver::Address(place) | Receiver::Constrained(place)) => {
                        (Some(self.read_place(place)?), Some(place))
                    }
                };
                if this == Some(TraceValue::Null) {
                    return Err(Exception::null_reference().into());
                }

                let mut values = Vec::with_capacity(args.len());
                let mut outs = Vec::new();
                for arg in args {
                    match arg {
                        Argument::Value(value) => values.push(self.eval(value)?),
                        Argument::Ref(place) => values.push(self.read_place(place)?),
                        Argument::Out(id) => outs.push(*id),
                    }
                }

                self.events.push(TraceEvent::Call {
                    method: *method,
                    this: this.clone(),
                    args: values.clone(),
                });
                let result = self.host.call(*method, this.as_mut(), &values)?;
                if let (Some(place), Some(this)) = (address, this) {
                    self.write_place(place, this)?;
                }

                if result.outs.len() < outs.len() {
                    return Err(malformed(format!(
                        "{} produced {} of {} out values",
                        method.pretty_print(0),
                        result.outs.len(),
                        outs.len()
                    )));
                }
                for (id, value) in outs.into_iter().zip(result.outs) {
                    self.assign(id, value);
                }
                if let Some(dest) = dest {
                    self.assign(*dest, result.value);
                }
            }
            InstructionKind::NewObject { dest, ty, args } => {
                let values = self.eval_all(args)?;
                let TraceValue::Object(object) = self.alloc_object(*ty) else {
                    return Err(malformed("allocation did not produce an object"));
                };
                self.events.push(TraceEvent::New { ty: *ty, object });
                self.host.construct(*ty, object, &values)?;
                self.assign(*dest, TraceValue::Object(object));
            }
            InstructionKind::Convert {
                dest,
                source,
                conversion,
                ..
            } => {
                let value = self.eval(source)?;
                let value = self.convert(conversion, value)?;
                self.assign(*dest, value);
            }
            InstructionKind::TupleElement { dest, tuple, index } => {
                let element = match self.eval(tuple)? {
                    TraceValue::Tuple(mut items) if *index < items.len() => items.swap_remove(*index),
                    other => return Err(malformed(format!("tupleelement {index} of {other:?}"))),
                };
                self.assign(*dest, element);
            }
            InstructionKind::MakeTuple { dest, elements } => {
                let values = self.eval_all(elements)?;
                self.assign(*dest, TraceValue::Tuple(values));
            }
            InstructionKind::Load { dest, place } => {
                let value = self.read_place(place)?;
                self.assign(*dest, value);
            }
            InstructionKind::Store { place, value } => {
                let value = self.eval(value)?;
                self.write_place(place, value.clone())?;
                self.events.push(TraceEvent::Store {
                    place: place.pretty_print(0),
                    value,
                });
            }
            InstructionKind::ArrayLength { dest, array } => {
                let array = self.array(array)?;
                let length = self.heap.dims(array)?.iter().map(|(_, length)| length).product();
                self.assign(*dest, TraceValue::Int(length));
            }
            InstructionKind::ArrayBound {
                dest,
                array,
                dimension,
                kind,
            } => {
                let array = self.array(array)?;
                let &(lower, length) = self
                    .heap
                    .dims(array)?
                    .get(*dimension)
                    .ok_or_else(|| malformed(format!("no dimension {dimension}")))?;
                let bound = match kind {
                    BoundKind::Lower => lower,
                    BoundKind::Upper => lower + length - 1,
                };
                self.assign(*dest, TraceValue::Int(bound));
            }
            InstructionKind::StringLength { dest, string } => {
                let string = self.string(string)?;
                let length = i64::try_from(string.chars().count())
                    .map_err(|_| malformed("string too long"))?;
                self.assign(*dest, TraceValue::Int(length));
            }
            InstructionKind::StringChar {
                dest,
                string,
                index,
            } => {
                let string = self.string(string)?;
                let index = self.int(index)?;
                let character = usize::try_from(index)
                    .ok()
                    .and_then(|index| string.chars().nth(index))
                    .ok_or_else(Exception::index_out_of_range)?;
                self.assign(*dest, TraceValue::Char(character));
            }
            InstructionKind::BinaryOp {
                op,
                dest,
                left,
                right,
            } => {
                let left = self.int(left)?;
                let right = self.int(right)?;
                let result = match op {
                    BinaryOp::Add => TraceValue::Int(left + right),
                    BinaryOp::Less => TraceValue::Bool(left < right),
                    BinaryOp::LessEqual => TraceValue::Bool(left <= right),
                };
                self.assign(*dest, result);
            }
            InstructionKind::NullCheck { dest, value } => {
                let present = self.eval(value)? != TraceValue::Null;
                self.assign(*dest, TraceValue::Bool(present));
            }
            InstructionKind::IsInstance { dest, value, ty } => {
                let value = self.eval(value)?;
                let result = if value != TraceValue::Null && self.host.is_instance(&value, *ty) {
                    value
                } else {
                    TraceValue::Null
                };
                self.assign(*dest, result);
            }
            InstructionKind::Await { dest, awaitable } => {
                let value = self.eval(awaitable)?;
                self.events.push(TraceEvent::Await);
                if let Some(dest) = dest {
                    self.assign(*dest, value);
                }
            }
            InstructionKind::Dispose {
                dest,
                resource,
                method,
                mode,
                args,
            } => {
                let mut target = self.read_place(resource)?;
                let mut values = self.eval_all(args)?;
                self.events.push(TraceEvent::Dispose {
                    method: *method,
                    mode: *mode,
                    resource: target.clone(),
                });
                let result = if *mode == DisposeMode::Extension {
                    values.insert(0, target);
                    self.host.call(*method, None, &values)?
                } else {
                    if target == TraceValue::Null {
                        return Err(Exception::null_reference().into());
                    }
                    let result = self.host.call(*method, Some(&mut target), &values)?;
                    self.write_place(resource, target)?;
                    result
                };
                if let Some(dest) = dest {
                    self.assign(*dest, result.value);
                }
            }
        }
        Ok(())
    }

    /// Applies a conversion; only user-defined operators and nullable unwraps act
    fn convert(&mut self, conversion: &Conversion, value: TraceValue) -> Result<TraceValue, Fault> {
        match (conversion, value) {
            (Conversion::UserDefined { operator, argument }, value) => {
                let value = self.convert(argument, value)?;
                self.events.push(TraceEvent::Call {
                    method: *operator,
                    this: None,
                    args: vec![value.clone()],
                });
                Ok(self.host.call(*operator, None, &[value])?.value)
            }
            (Conversion::ExplicitNullable(_), TraceValue::Null) => {
                Err(Exception::new("InvalidOperationException").into())
            }
            (
                Conversion::ImplicitNullable(inner) | Conversion::ExplicitNullable(inner),
                value,
            ) if value != TraceValue::Null => self.convert(inner, value),
            (
                Conversion::ImplicitTuple(elements) | Conversion::TupleLiteral(elements),
                TraceValue::Tuple(items),
            ) => {
                let mut converted = Vec::with_capacity(items.len());
                for (element, item) in elements.iter().zip(items) {
                    converted.push(self.convert(element, item)?);
                }
                Ok(TraceValue::Tuple(converted))
            }
            // Representation-preserving at this level
            (_, value) => Ok(value),
        }
    }

    fn assign(&mut self, dest: ValueId, value: TraceValue) {
        if let Some(ValueOrigin::Local(local) | ValueOrigin::Parameter(local)) =
            self.function.value_origin(dest)
        {
            self.events.push(TraceEvent::Assign {
                local,
                value: value.clone(),
            });
        }
        self.values.insert(dest, value);
    }

    fn eval(&mut self, value: &Value) -> Result<TraceValue, Fault> {
        match value {
            Value::Literal(literal) => Ok(match literal {
                Literal::Integer(value) => TraceValue::Int(*value),
                Literal::Boolean(value) => TraceValue::Bool(*value),
                Literal::Char(value) => TraceValue::Char(*value),
                Literal::String(value) => TraceValue::Str(value.clone()),
                Literal::Null => TraceValue::Null,
                Literal::Default(ty) => self.host.default_value(*ty),
                Literal::EmptyArray(_) => self.alloc_array(vec![(0, 0)], Vec::new()),
                Literal::Unit => TraceValue::Unit,
            }),
            Value::Operand(id) => self
                .values
                .get(id)
                .cloned()
                .ok_or_else(|| TraceError::UndefinedValue(*id).into()),
            Value::Error => Err(malformed("error value reached execution")),
        }
    }

    fn eval_all(&mut self, values: &[Value]) -> Result<Vec<TraceValue>, Fault> {
        values.iter().map(|value| self.eval(value)).collect()
    }

    fn int(&mut self, value: &Value) -> Result<i64, Fault> {
        match self.eval(value)? {
            TraceValue::Int(value) => Ok(value),
            other => Err(malformed(format!("expected an integer, found {other:?}"))),
        }
    }

    fn array(&mut self, value: &Value) -> Result<usize, Fault> {
        match self.eval(value)? {
            TraceValue::Array(index) => Ok(index),
            TraceValue::Null => Err(Exception::null_reference().into()),
            other => Err(malformed(format!("expected an array, found {other:?}"))),
        }
    }

    fn string(&mut self, value: &Value) -> Result<SmolStr, Fault> {
        match self.eval(value)? {
            TraceValue::Str(value) => Ok(value),
            TraceValue::Null => Err(Exception::null_reference().into()),
            other => Err(malformed(format!("expected a string, found {other:?}"))),
        }
    }

    fn steps_of(&mut self, place: &Place) -> Result<Vec<Step>, Fault> {
        let mut steps = Vec::with_capacity(place.projections.len());
        for projection in &place.projections {
            steps.push(match projection {
                Projection::Field(field) => Step::Field(*field),
                Projection::Index(indices) => {
                    let mut evaluated = Vec::with_capacity(indices.len());
                    for index in indices {
                        evaluated.push(self.int(index)?);
                    }
                    Step::Index(evaluated)
                }
            });
        }
        Ok(steps)
    }

    fn read_base(&self, base: PlaceBase) -> Result<TraceValue, Fault> {
        match base {
            PlaceBase::Value(id) => self
                .values
                .get(&id)
                .cloned()
                .ok_or_else(|| TraceError::UndefinedValue(id).into()),
            PlaceBase::Static(field) => Ok(self
                .statics
                .get(&field)
                .cloned()
                .unwrap_or(TraceValue::Null)),
        }
    }

    fn read_place(&mut self, place: &Place) -> Result<TraceValue, Fault> {
        let steps = self.steps_of(place)?;
        let mut current = self.read_base(place.base)?;
        for step in &steps {
            current = match (step, current) {
                (_, TraceValue::Null) => return Err(Exception::null_reference().into()),
                (Step::Field(field), TraceValue::Object(object)) => self
                    .heap
                    .fields_mut(object.index)?
                    .get(field)
                    .cloned()
                    .unwrap_or(TraceValue::Null),
                (Step::Field(field), TraceValue::Struct { fields, .. }) => {
                    fields.get(field).cloned().unwrap_or(TraceValue::Null)
                }
                (Step::Index(indices), TraceValue::Array(array)) => {
                    self.heap.element(array, indices)?
                }
                (_, other) => return Err(malformed(format!("cannot project into {other:?}"))),
            };
        }
        Ok(current)
    }

    fn write_place(&mut self, place: &Place, value: TraceValue) -> Result<(), Fault> {
        let steps = self.steps_of(place)?;
        let mut root = if steps.is_empty() {
            TraceValue::Null
        } else {
            self.read_base(place.base)?
        };
        self.heap.store(&mut root, &steps, value)?;
        match place.base {
            PlaceBase::Value(id) => {
                self.values.insert(id, root);
            }
            PlaceBase::Static(field) => {
                self.statics.insert(field, root);
            }
        }
        Ok(())
    }
}
