//! # MIR Values
//!
//! This module defines values, operands and storage places in the MIR system.
//! Values represent data that flows through the program; places name storage that
//! can be loaded from, stored into, or passed by address.

use cinder_compiler_semantic::{FieldId, TypeId};
use smol_str::SmolStr;

use crate::{PrettyPrint, ValueId};

/// Represents any value in the program: literals, locals and temporaries
///
/// # Design Notes
///
/// - Literals are embedded directly
/// - Operands reference values computed by instructions or bound to locals
/// - Error values support graceful error recovery
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// A constant literal value
    Literal(Literal),

    /// An operand that references a local or a temporary
    Operand(ValueId),

    /// A placeholder for unresolved or error values
    Error,
}

/// Literal constant values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Integer(i64),
    Boolean(bool),
    Char(char),
    String(SmolStr),
    /// The null reference, or an empty nullable value
    Null,
    /// The default value of a type, used for omitted optional arguments
    Default(TypeId),
    /// An empty `params` array of the given array type
    EmptyArray(TypeId),
    /// Unit value (void)
    Unit,
}

impl Value {
    /// Creates a new integer literal value
    pub const fn integer(value: i64) -> Self {
        Self::Literal(Literal::Integer(value))
    }

    /// Creates a new boolean literal value
    pub const fn boolean(value: bool) -> Self {
        Self::Literal(Literal::Boolean(value))
    }

    pub const fn null() -> Self {
        Self::Literal(Literal::Null)
    }

    /// Creates the unit value
    pub const fn unit() -> Self {
        Self::Literal(Literal::Unit)
    }

    /// Creates a new operand value
    pub const fn operand(id: ValueId) -> Self {
        Self::Operand(id)
    }

    /// Creates an error value for error recovery
    pub const fn error() -> Self {
        Self::Error
    }

    /// Returns true if this is a literal value
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Returns true if this is an operand reference
    pub const fn is_operand(&self) -> bool {
        matches!(self, Self::Operand(_))
    }

    /// Returns true if this is an error value
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Returns the operand ID if this is an operand
    pub const fn as_operand(&self) -> Option<ValueId> {
        match self {
            Self::Operand(id) => Some(*id),
            _ => None,
        }
    }
}

impl PrettyPrint for Value {
    fn pretty_print(&self, _indent: usize) -> String {
        match self {
            Self::Literal(lit) => lit.pretty_print(0),
            Self::Operand(id) => id.pretty_print(0),
            Self::Error => "<error>".to_string(),
        }
    }
}

impl PrettyPrint for Literal {
    fn pretty_print(&self, _indent: usize) -> String {
        match self {
            Self::Integer(value) => value.to_string(),
            Self::Boolean(value) => value.to_string(),
            Self::Char(value) => format!("{value:?}"),
            Self::String(value) => format!("{value:?}"),
            Self::Null => "null".to_string(),
            Self::Default(ty) => format!("default({})", ty.pretty_print(0)),
            Self::EmptyArray(ty) => format!("empty({})", ty.pretty_print(0)),
            Self::Unit => "()".to_string(),
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl From<ValueId> for Value {
    fn from(id: ValueId) -> Self {
        Self::Operand(id)
    }
}

/// Root of a place: a local or temporary, or static storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceBase {
    Value(ValueId),
    Static(FieldId),
}

/// A projection step applied to a base to reach a sub-location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    /// Field of the object or struct the place holds
    Field(FieldId),
    /// Element of the array the place holds, one index per dimension
    Index(Vec<Value>),
}

/// A storage location: a base followed by field and element projections
///
/// Projection operands are always evaluated temporaries or literals, so naming a
/// place never has side effects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Place {
    pub base: PlaceBase,
    pub projections: Vec<Projection>,
}

impl Place {
    /// Creates a new place from a ValueId
    pub const fn new(id: ValueId) -> Self {
        Self {
            base: PlaceBase::Value(id),
            projections: Vec::new(),
        }
    }

    /// Static field storage
    pub const fn static_field(field: FieldId) -> Self {
        Self {
            base: PlaceBase::Static(field),
            projections: Vec::new(),
        }
    }

    /// Returns the base ValueId, if the place is rooted at one
    pub const fn value_id(&self) -> Option<ValueId> {
        match self.base {
            PlaceBase::Value(id) => Some(id),
            PlaceBase::Static(_) => None,
        }
    }

    /// Returns true if the place has no projections beyond the base
    pub const fn is_base(&self) -> bool {
        self.projections.is_empty()
    }

    /// Append an index projection, returning the updated place
    pub fn with_index(mut self, indices: Vec<Value>) -> Self {
        self.projections.push(Projection::Index(indices));
        self
    }

    /// Append a field projection, returning the updated place
    pub fn with_field(mut self, field: FieldId) -> Self {
        self.projections.push(Projection::Field(field));
        self
    }

    /// Every value read while addressing the place
    pub fn used_values(&self) -> Vec<ValueId> {
        let mut used = Vec::new();
        if let PlaceBase::Value(id) = self.base {
            used.push(id);
        }
        for projection in &self.projections {
            if let Projection::Index(indices) = projection {
                used.extend(indices.iter().filter_map(Value::as_operand));
            }
        }
        used
    }
}

impl From<ValueId> for Place {
    fn from(id: ValueId) -> Self {
        Self::new(id)
    }
}

impl PrettyPrint for Place {
    fn pretty_print(&self, _indent: usize) -> String {
        let mut result = match self.base {
            PlaceBase::Value(id) => id.pretty_print(0),
            PlaceBase::Static(field) => format!("static {}", field.pretty_print(0)),
        };
        for projection in &self.projections {
            match projection {
                Projection::Field(field) => {
                    result.push('.');
                    result.push_str(&field.pretty_print(0));
                }
                Projection::Index(indices) => {
                    let indices = indices
                        .iter()
                        .map(|index| index.pretty_print(0))
                        .collect::<Vec<_>>()
                        .join(", ");
                    result.push('[');
                    result.push_str(&indices);
                    result.push(']');
                }
            }
        }
        result
    }
}

impl std::fmt::Display for Place {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pretty_print(0))
    }
}
