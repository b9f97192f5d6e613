//! # Type Model
//!
//! Types are stored in the [`TypeCatalog`](crate::TypeCatalog) arena and referred to by
//! [`TypeId`]. Structural types (arrays, tuples, nullables, awaitables) are interned so
//! that two structurally identical types always share the same id; named types are
//! nominal and get a fresh id per declaration.

use bitflags::bitflags;
use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::definition::MemberId;
use crate::NamespaceId;

index_vec::define_index_type! {
    /// Identifier of a type in the catalog
    pub struct TypeId = usize;

    MAX_INDEX = usize::MAX;
}

/// Built-in value types with a fixed representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Bool,
    Char,
    SByte,
    Byte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    Decimal,
}

impl PrimitiveType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::SByte => "sbyte",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Long => "long",
            Self::ULong => "ulong",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
        }
    }

    /// Returns true for every primitive taking part in numeric conversions
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Bool)
    }

    /// The implicit numeric conversion table
    pub fn widens_to(self, target: Self) -> bool {
        use PrimitiveType::*;

        let targets: &[PrimitiveType] = match self {
            SByte => &[Short, Int, Long, Float, Double, Decimal],
            Byte => &[Short, UShort, Int, UInt, Long, ULong, Float, Double, Decimal],
            Short => &[Int, Long, Float, Double, Decimal],
            UShort => &[Int, UInt, Long, ULong, Float, Double, Decimal],
            Int => &[Long, Float, Double, Decimal],
            UInt => &[Long, ULong, Float, Double, Decimal],
            Long | ULong => &[Float, Double, Decimal],
            Char => &[UShort, Int, UInt, Long, ULong, Float, Double, Decimal],
            Float => &[Double],
            Double | Decimal | Bool => &[],
        };
        targets.contains(&target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
}

bitflags! {
    /// Declaration modifiers relevant to lowering
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u8 {
        /// No type can derive from this one
        const SEALED = 1 << 0;
        /// Stack-only value type; can never be boxed
        const REF_LIKE = 1 << 1;
        /// Static class (extension method containers)
        const STATIC = 1 << 2;
        const ABSTRACT = 1 << 3;
    }
}

/// Tags for the library types the lowering engine knows by identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialType {
    Disposable,
    AsyncDisposable,
    Enumerable,
    Enumerator,
    GenericEnumerable(TypeId),
    GenericEnumerator(TypeId),
    AsyncEnumerable(TypeId),
    AsyncEnumerator(TypeId),
}

impl SpecialType {
    /// Element type of an instantiated generic interface
    pub const fn element(self) -> Option<TypeId> {
        match self {
            Self::GenericEnumerable(element)
            | Self::GenericEnumerator(element)
            | Self::AsyncEnumerable(element)
            | Self::AsyncEnumerator(element) => Some(element),
            _ => None,
        }
    }

    /// The same generic interface instantiated with another element type
    pub const fn with_element(self, element: TypeId) -> Self {
        match self {
            Self::GenericEnumerable(_) => Self::GenericEnumerable(element),
            Self::GenericEnumerator(_) => Self::GenericEnumerator(element),
            Self::AsyncEnumerable(_) => Self::AsyncEnumerable(element),
            Self::AsyncEnumerator(_) => Self::AsyncEnumerator(element),
            other => other,
        }
    }
}

/// A class, struct or interface declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedType {
    pub name: SmolStr,
    pub kind: TypeKind,
    pub flags: TypeFlags,
    pub base: Option<TypeId>,
    /// Directly implemented interfaces, in declaration order
    pub interfaces: Vec<TypeId>,
    /// Members grouped by name in declaration order
    pub members: IndexMap<SmolStr, Vec<MemberId>>,
    pub namespace: Option<NamespaceId>,
    pub special: Option<SpecialType>,
}

/// Constraints declared on a generic type parameter
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeParamConstraints {
    pub reference_type: bool,
    pub value_type: bool,
    pub interfaces: Vec<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeParameter {
    pub name: SmolStr,
    pub constraints: TypeParamConstraints,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeData {
    Primitive(PrimitiveType),
    String,
    Object,
    /// Single (`rank == 1`) or multi-dimensional array
    Array { element: TypeId, rank: usize },
    Tuple(Vec<TypeId>),
    /// Nullable value type `T?`
    Nullable(TypeId),
    /// Result of an async protocol member; awaiting it yields the inner type
    Awaitable(TypeId),
    Named(NamedType),
    TypeParameter(TypeParameter),
    /// Type of an untyped `null` literal
    Null,
    /// Type of an untyped `default` literal
    Default,
    Void,
    Error,
}

/// Key used to intern structural types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum StructuralKey {
    Primitive(PrimitiveType),
    Array(TypeId, usize),
    Tuple(Vec<TypeId>),
    Nullable(TypeId),
    Awaitable(TypeId),
}
