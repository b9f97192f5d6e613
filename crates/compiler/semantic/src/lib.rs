#![allow(clippy::option_if_let_else)]

//! # Cinder Semantic Model
//!
//! The resolved program model consumed by the MIR lowering engine: the type and member
//! catalog, the bound (type-checked) statement tree, and the two semantic services the
//! lowering passes query while expanding sugared statements.
//!
//! ## Architecture
//!
//! 1. **Catalog**: arenas of types, members and namespaces with structural queries
//! 2. **Bound tree**: typed expressions and the sugared statements to be lowered
//! 3. **Protocol resolution**: pattern-based lookup of `Deconstruct`, `GetEnumerator`,
//!    `MoveNext`, `Current` and `Dispose`, with caching per (type, protocol, arity)
//! 4. **Conversions**: implicit/explicit conversion classification for values flowing
//!    into declared targets

pub mod bound;
pub mod catalog;
pub mod conversions;
pub mod definition;
pub mod protocol;
pub mod types;

pub use bound::{
    Binding, BindingKind, BoundFunction, Constant, DeconstructionTarget, Expr, ExprKind,
    ForEachStatement, ForEachVariable, LocalDef, LocalId, Statement, StatementKind,
    UsingDeclaration, UsingResource, UsingStatement,
};
pub use catalog::{TypeCatalog, WellKnownTypes};
pub use conversions::{Conversion, ConversionError, ConversionInserter};
pub use definition::{
    Accessibility, CallSite, FieldId, MemberId, MethodDef, MethodId, NamespaceId, ParamKind,
    Parameter, PropertyId,
};
pub use protocol::{
    AmbiguityWarning, DisposeContext, DisposeRoute, EnumerableInfo, EnumerableRoute,
    EnumeratorMembers, LookupLevels, Protocol, ProtocolCandidate, ProtocolResolver, Resolution,
    ResolutionError, ResolverOptions,
};
pub use types::{
    PrimitiveType, SpecialType, TypeData, TypeFlags, TypeId, TypeKind, TypeParamConstraints,
};
