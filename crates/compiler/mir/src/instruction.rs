//! # MIR Instructions
//!
//! This module defines the instruction types for MIR.
//! Instructions perform computations but do not transfer control flow.

use chumsky::span::SimpleSpan;
use cinder_compiler_semantic::{Conversion, MethodId, TypeId};

use crate::{Place, PrettyPrint, Value, ValueId};

/// An instruction performs an operation but does NOT transfer control
///
/// Instructions always fall through to the next instruction in the block.
/// Control flow changes are handled exclusively by terminators.
///
/// # Design Notes
///
/// - All instructions follow three-address code (TAC) format
/// - Each instruction has at most one operation
/// - Instructions define at most one value, plus the `out` destinations of a call
/// - Source location is preserved for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// The kind of instruction and its operands
    pub kind: InstructionKind,

    /// Source location for diagnostics and debugging
    pub source_span: Option<SimpleSpan<usize>>,

    /// Optional comment for debugging
    pub comment: Option<String>,
}

/// How a call reaches its `this` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// A copy of the value (references, and non-addressable values)
    Value(Value),
    /// The storage itself, so mutations of a value-type receiver persist
    Address(Place),
    /// Constrained call on a type-parameter typed storage; no boxing for value types
    Constrained(Place),
}

/// One argument slot of a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Value(Value),
    /// `out` parameter written by the callee into a fresh temporary
    Out(ValueId),
    /// `ref`/`in` parameter aliasing existing storage
    Ref(Place),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Less,
    LessEqual,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Less => write!(f, "<"),
            Self::LessEqual => write!(f, "<="),
        }
    }
}

/// Which end of an array dimension an `ArrayBound` queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundKind {
    Lower,
    Upper,
}

/// Dispatch used by a cleanup-invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisposeMode {
    /// Virtual call through the disposal interface
    Interface,
    /// Interface method called on value-type or type-parameter storage without boxing
    ConstrainedInterface,
    /// Instance pattern method found on the type itself
    Pattern,
    /// Extension method taking the resource as its first argument
    Extension,
}

impl DisposeMode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Interface => "interface",
            Self::ConstrainedInterface => "constrained",
            Self::Pattern => "pattern",
            Self::Extension => "extension",
        }
    }
}

/// The different kinds of instructions available in MIR
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionKind {
    /// Simple assignment: `dest = source`
    /// Binds temporaries and stores into user locals
    Assign { dest: ValueId, source: Value },

    /// Member call: `dest = call receiver.method(args)`
    Call {
        dest: Option<ValueId>,
        method: MethodId,
        receiver: Option<Receiver>,
        args: Vec<Argument>,
    },

    /// Object creation: `dest = new ty(args)`
    NewObject {
        dest: ValueId,
        ty: TypeId,
        args: Vec<Value>,
    },

    /// Conversion of a value into a target type
    Convert {
        dest: ValueId,
        source: Value,
        conversion: Conversion,
        target: TypeId,
    },

    /// Tuple element extraction: `dest = tupleelement tuple, index`
    TupleElement {
        dest: ValueId,
        tuple: Value,
        index: usize,
    },

    /// Tuple construction: `dest = maketuple elements...`
    MakeTuple { dest: ValueId, elements: Vec<Value> },

    /// Read from a field or array element: `dest = load place`
    Load { dest: ValueId, place: Place },

    /// Write to a field or array element: `store place, value`
    Store { place: Place, value: Value },

    /// Total element count of a single-rank array
    ArrayLength { dest: ValueId, array: Value },

    /// Lower or upper bound of one dimension of an array
    ArrayBound {
        dest: ValueId,
        array: Value,
        dimension: usize,
        kind: BoundKind,
    },

    StringLength { dest: ValueId, string: Value },

    StringChar {
        dest: ValueId,
        string: Value,
        index: Value,
    },

    BinaryOp {
        op: BinaryOp,
        dest: ValueId,
        left: Value,
        right: Value,
    },

    /// `dest = value != null`; for nullable values, whether a value is present
    NullCheck { dest: ValueId, value: Value },

    /// Runtime type test: `dest = value as ty`, null when the test fails
    IsInstance {
        dest: ValueId,
        value: Value,
        ty: TypeId,
    },

    /// Suspends until the awaitable completes: `dest = await awaitable`
    Await {
        dest: Option<ValueId>,
        awaitable: Value,
    },

    /// Cleanup-invoke: releases the resource held in `resource`
    ///
    /// `dest` receives the awaitable of an async disposal.
    Dispose {
        dest: Option<ValueId>,
        resource: Place,
        method: MethodId,
        mode: DisposeMode,
        args: Vec<Value>,
    },
}

impl Instruction {
    const fn new(kind: InstructionKind) -> Self {
        Self {
            kind,
            source_span: None,
            comment: None,
        }
    }

    /// Creates a new assignment instruction
    pub const fn assign(dest: ValueId, source: Value) -> Self {
        Self::new(InstructionKind::Assign { dest, source })
    }

    /// Creates a new call instruction
    pub const fn call(
        dest: Option<ValueId>,
        method: MethodId,
        receiver: Option<Receiver>,
        args: Vec<Argument>,
    ) -> Self {
        Self::new(InstructionKind::Call {
            dest,
            method,
            receiver,
            args,
        })
    }

    pub const fn new_object(dest: ValueId, ty: TypeId, args: Vec<Value>) -> Self {
        Self::new(InstructionKind::NewObject { dest, ty, args })
    }

    pub const fn convert(
        dest: ValueId,
        source: Value,
        conversion: Conversion,
        target: TypeId,
    ) -> Self {
        Self::new(InstructionKind::Convert {
            dest,
            source,
            conversion,
            target,
        })
    }

    pub const fn tuple_element(dest: ValueId, tuple: Value, index: usize) -> Self {
        Self::new(InstructionKind::TupleElement { dest, tuple, index })
    }

    pub const fn make_tuple(dest: ValueId, elements: Vec<Value>) -> Self {
        Self::new(InstructionKind::MakeTuple { dest, elements })
    }

    pub const fn load(dest: ValueId, place: Place) -> Self {
        Self::new(InstructionKind::Load { dest, place })
    }

    pub const fn store(place: Place, value: Value) -> Self {
        Self::new(InstructionKind::Store { place, value })
    }

    pub const fn array_length(dest: ValueId, array: Value) -> Self {
        Self::new(InstructionKind::ArrayLength { dest, array })
    }

    pub const fn array_bound(
        dest: ValueId,
        array: Value,
        dimension: usize,
        kind: BoundKind,
    ) -> Self {
        Self::new(InstructionKind::ArrayBound {
            dest,
            array,
            dimension,
            kind,
        })
    }

    pub const fn string_length(dest: ValueId, string: Value) -> Self {
        Self::new(InstructionKind::StringLength { dest, string })
    }

    pub const fn string_char(dest: ValueId, string: Value, index: Value) -> Self {
        Self::new(InstructionKind::StringChar {
            dest,
            string,
            index,
        })
    }

    /// Creates a new binary operation instruction
    pub const fn binary_op(op: BinaryOp, dest: ValueId, left: Value, right: Value) -> Self {
        Self::new(InstructionKind::BinaryOp {
            op,
            dest,
            left,
            right,
        })
    }

    pub const fn null_check(dest: ValueId, value: Value) -> Self {
        Self::new(InstructionKind::NullCheck { dest, value })
    }

    pub const fn is_instance(dest: ValueId, value: Value, ty: TypeId) -> Self {
        Self::new(InstructionKind::IsInstance { dest, value, ty })
    }

    pub const fn await_value(dest: Option<ValueId>, awaitable: Value) -> Self {
        Self::new(InstructionKind::Await { dest, awaitable })
    }

    pub const fn dispose(
        dest: Option<ValueId>,
        resource: Place,
        method: MethodId,
        mode: DisposeMode,
        args: Vec<Value>,
    ) -> Self {
        Self::new(InstructionKind::Dispose {
            dest,
            resource,
            method,
            mode,
            args,
        })
    }

    /// Attaches a source span
    pub const fn with_span(mut self, span: SimpleSpan<usize>) -> Self {
        self.source_span = Some(span);
        self
    }

    /// Sets a comment for this instruction
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Returns every value this instruction defines
    ///
    /// A call defines its result and each of its `out` temporaries.
    pub fn destinations(&self) -> Vec<ValueId> {
        match &self.kind {
            InstructionKind::Call { dest, args, .. } => dest
                .iter()
                .copied()
                .chain(args.iter().filter_map(|arg| match arg {
                    Argument::Out(id) => Some(*id),
                    _ => None,
                }))
                .collect(),
            InstructionKind::Await { dest, .. } | InstructionKind::Dispose { dest, .. } => {
                dest.iter().copied().collect()
            }
            InstructionKind::Store { .. } => Vec::new(),
            InstructionKind::Assign { dest, .. }
            | InstructionKind::NewObject { dest, .. }
            | InstructionKind::Convert { dest, .. }
            | InstructionKind::TupleElement { dest, .. }
            | InstructionKind::MakeTuple { dest, .. }
            | InstructionKind::Load { dest, .. }
            | InstructionKind::ArrayLength { dest, .. }
            | InstructionKind::ArrayBound { dest, .. }
            | InstructionKind::StringLength { dest, .. }
            | InstructionKind::StringChar { dest, .. }
            | InstructionKind::BinaryOp { dest, .. }
            | InstructionKind::NullCheck { dest, .. }
            | InstructionKind::IsInstance { dest, .. } => vec![*dest],
        }
    }

    /// Returns the primary destination, if any
    pub fn destination(&self) -> Option<ValueId> {
        match &self.kind {
            InstructionKind::Call { dest, .. }
            | InstructionKind::Await { dest, .. }
            | InstructionKind::Dispose { dest, .. } => *dest,
            InstructionKind::Store { .. } => None,
            _ => self.destinations().first().copied(),
        }
    }

    /// Returns all values used by this instruction
    pub fn used_values(&self) -> Vec<ValueId> {
        fn operands<'v>(values: impl IntoIterator<Item = &'v Value>) -> Vec<ValueId> {
            values.into_iter().filter_map(Value::as_operand).collect()
        }

        match &self.kind {
            InstructionKind::Assign { source, .. } | InstructionKind::Convert { source, .. } => {
                operands([source])
            }
            InstructionKind::Call { receiver, args, .. } => {
                let mut used = match receiver {
                    Some(Receiver::Value(value)) => operands([value]),
                    Some(Receiver::Address(place) | Receiver::Constrained(place)) => {
                        place.used_values()
                    }
                    None => Vec::new(),
                };
                for arg in args {
                    match arg {
                        Argument::Value(value) => used.extend(value.as_operand()),
                        Argument::Ref(place) => used.extend(place.used_values()),
                        Argument::Out(_) => {}
                    }
                }
                used
            }
            InstructionKind::NewObject { args, .. } => operands(args),
            InstructionKind::TupleElement { tuple, .. } => operands([tuple]),
            InstructionKind::MakeTuple { elements, .. } => operands(elements),
            InstructionKind::Load { place, .. } => place.used_values(),
            InstructionKind::Store { place, value } => {
                let mut used = place.used_values();
                used.extend(value.as_operand());
                used
            }
            InstructionKind::ArrayLength { array, .. }
            | InstructionKind::ArrayBound { array, .. } => operands([array]),
            InstructionKind::StringLength { string, .. } => operands([string]),
            InstructionKind::StringChar { string, index, .. } => operands([string, index]),
            InstructionKind::BinaryOp { left, right, .. } => operands([left, right]),
            InstructionKind::NullCheck { value, .. }
            | InstructionKind::IsInstance { value, .. } => operands([value]),
            InstructionKind::Await { awaitable, .. } => operands([awaitable]),
            InstructionKind::Dispose { resource, args, .. } => {
                let mut used = resource.used_values();
                used.extend(operands(args));
                used
            }
        }
    }

    /// Returns true for the cleanup-invoke instruction
    pub const fn is_dispose(&self) -> bool {
        matches!(self.kind, InstructionKind::Dispose { .. })
    }

    /// Validates the instruction
    pub fn validate(&self) -> Result<(), String> {
        match &self.kind {
            InstructionKind::MakeTuple { elements, .. } if elements.is_empty() => {
                Err("maketuple needs at least one element".to_string())
            }
            InstructionKind::Call { dest, args, .. } => {
                let outs = args
                    .iter()
                    .filter_map(|arg| match arg {
                        Argument::Out(id) => Some(*id),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                let mut unique = outs.clone();
                unique.sort();
                unique.dedup();
                if unique.len() != outs.len() || dest.is_some_and(|d| outs.contains(&d)) {
                    return Err("call writes the same temporary twice".to_string());
                }
                Ok(())
            }
            InstructionKind::Load { place, .. } | InstructionKind::Store { place, .. }
                if place.is_base() && place.value_id().is_some() =>
            {
                Err(format!("{} has no projection; use assign", place.pretty_print(0)))
            }
            _ => Ok(()),
        }
    }
}

fn join<T: PrettyPrint>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.pretty_print(0))
        .collect::<Vec<_>>()
        .join(", ")
}

impl PrettyPrint for Receiver {
    fn pretty_print(&self, _indent: usize) -> String {
        match self {
            Self::Value(value) => value.pretty_print(0),
            Self::Address(place) => format!("&{}", place.pretty_print(0)),
            Self::Constrained(place) => format!("constrained &{}", place.pretty_print(0)),
        }
    }
}

impl PrettyPrint for Argument {
    fn pretty_print(&self, _indent: usize) -> String {
        match self {
            Self::Value(value) => value.pretty_print(0),
            Self::Out(id) => format!("out {}", id.pretty_print(0)),
            Self::Ref(place) => format!("ref {}", place.pretty_print(0)),
        }
    }
}

impl PrettyPrint for Instruction {
    fn pretty_print(&self, indent: usize) -> String {
        let mut result = String::new();

        if let Some(comment) = &self.comment {
            result.push_str(&format!("// {comment}\n{}", crate::indent_str(indent)));
        }

        let dest_prefix = |dest: &Option<ValueId>| {
            dest.map(|d| format!("{} = ", d.pretty_print(0)))
                .unwrap_or_default()
        };

        match &self.kind {
            InstructionKind::Assign { dest, source } => {
                result.push_str(&format!(
                    "{} = {}",
                    dest.pretty_print(0),
                    source.pretty_print(0)
                ));
            }
            InstructionKind::Call {
                dest,
                method,
                receiver,
                args,
            } => {
                let callee = match receiver {
                    Some(receiver) => {
                        format!("{}.{}", receiver.pretty_print(0), method.pretty_print(0))
                    }
                    None => method.pretty_print(0),
                };
                result.push_str(&format!(
                    "{}call {callee}({})",
                    dest_prefix(dest),
                    join(args)
                ));
            }
            InstructionKind::NewObject { dest, ty, args } => {
                result.push_str(&format!(
                    "{} = new {}({})",
                    dest.pretty_print(0),
                    ty.pretty_print(0),
                    join(args)
                ));
            }
            InstructionKind::Convert {
                dest,
                source,
                conversion,
                target,
            } => {
                result.push_str(&format!(
                    "{} = convert {} to {} ({conversion})",
                    dest.pretty_print(0),
                    source.pretty_print(0),
                    target.pretty_print(0)
                ));
            }
            InstructionKind::TupleElement { dest, tuple, index } => {
                result.push_str(&format!(
                    "{} = tupleelement {}, {index}",
                    dest.pretty_print(0),
                    tuple.pretty_print(0)
                ));
            }
            InstructionKind::MakeTuple { dest, elements } => {
                result.push_str(&format!(
                    "{} = maketuple {}",
                    dest.pretty_print(0),
                    join(elements)
                ));
            }
            InstructionKind::Load { dest, place } => {
                result.push_str(&format!(
                    "{} = load {}",
                    dest.pretty_print(0),
                    place.pretty_print(0)
                ));
            }
            InstructionKind::Store { place, value } => {
                result.push_str(&format!(
                    "store {}, {}",
                    place.pretty_print(0),
                    value.pretty_print(0)
                ));
            }
            InstructionKind::ArrayLength { dest, array } => {
                result.push_str(&format!(
                    "{} = arraylen {}",
                    dest.pretty_print(0),
                    array.pretty_print(0)
                ));
            }
            InstructionKind::ArrayBound {
                dest,
                array,
                dimension,
                kind,
            } => {
                let kind = match kind {
                    BoundKind::Lower => "lower",
                    BoundKind::Upper => "upper",
                };
                result.push_str(&format!(
                    "{} = arraybound {}, {dimension}, {kind}",
                    dest.pretty_print(0),
                    array.pretty_print(0)
                ));
            }
            InstructionKind::StringLength { dest, string } => {
                result.push_str(&format!(
                    "{} = strlen {}",
                    dest.pretty_print(0),
                    string.pretty_print(0)
                ));
            }
            InstructionKind::StringChar {
                dest,
                string,
                index,
            } => {
                result.push_str(&format!(
                    "{} = strchar {}, {}",
                    dest.pretty_print(0),
                    string.pretty_print(0),
                    index.pretty_print(0)
                ));
            }
            InstructionKind::BinaryOp {
                op,
                dest,
                left,
                right,
            } => {
                result.push_str(&format!(
                    "{} = {} {op} {}",
                    dest.pretty_print(0),
                    left.pretty_print(0),
                    right.pretty_print(0)
                ));
            }
            InstructionKind::NullCheck { dest, value } => {
                result.push_str(&format!(
                    "{} = notnull {}",
                    dest.pretty_print(0),
                    value.pretty_print(0)
                ));
            }
            InstructionKind::IsInstance { dest, value, ty } => {
                result.push_str(&format!(
                    "{} = isinst {}, {}",
                    dest.pretty_print(0),
                    value.pretty_print(0),
                    ty.pretty_print(0)
                ));
            }
            InstructionKind::Await { dest, awaitable } => {
                result.push_str(&format!(
                    "{}await {}",
                    dest_prefix(dest),
                    awaitable.pretty_print(0)
                ));
            }
            InstructionKind::Dispose {
                dest,
                resource,
                method,
                mode,
                args,
            } => {
                result.push_str(&format!(
                    "{}dispose {} {}.{}({})",
                    dest_prefix(dest),
                    mode.name(),
                    resource.pretty_print(0),
                    method.pretty_print(0),
                    join(args)
                ));
            }
        }

        result
    }
}

#[cfg(test)]
#[path = "instruction_tests.rs"]
mod tests;
