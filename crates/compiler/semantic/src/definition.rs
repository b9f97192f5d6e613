//! # Member Definitions
//!
//! Methods, fields, properties and namespaces as the binder hands them to the
//! lowering engine.

use smol_str::SmolStr;

use crate::TypeId;

index_vec::define_index_type! {
    /// Identifier of a method (instance, static or extension)
    pub struct MethodId = usize;

    MAX_INDEX = usize::MAX;
}

index_vec::define_index_type! {
    pub struct FieldId = usize;

    MAX_INDEX = usize::MAX;
}

index_vec::define_index_type! {
    pub struct PropertyId = usize;

    MAX_INDEX = usize::MAX;
}

index_vec::define_index_type! {
    pub struct NamespaceId = usize;

    MAX_INDEX = usize::MAX;
}

/// A member entry in a type's member table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberId {
    Method(MethodId),
    Field(FieldId),
    Property(PropertyId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Accessibility {
    Private,
    Protected,
    Internal,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Value,
    In,
    Ref,
    Out,
    /// `params T[]` trailing parameter
    Params,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: SmolStr,
    pub ty: TypeId,
    pub kind: ParamKind,
    /// Has a default value and may be omitted at the call site
    pub optional: bool,
}

impl Parameter {
    pub fn value(name: &str, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: ParamKind::Value,
            optional: false,
        }
    }

    pub fn out(name: &str, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: ParamKind::Out,
            optional: false,
        }
    }

    pub fn optional(name: &str, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: ParamKind::Value,
            optional: true,
        }
    }

    /// `params` array parameter; `ty` is the array type
    pub fn params(name: &str, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: ParamKind::Params,
            optional: false,
        }
    }

    /// Returns true if a call may leave this parameter out
    pub const fn can_omit(&self) -> bool {
        self.optional || matches!(self.kind, ParamKind::Params)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub name: SmolStr,
    /// Declaring type; for extension methods this is the static container class
    pub owner: TypeId,
    pub params: Vec<Parameter>,
    pub return_type: TypeId,
    /// Method type parameters, each a `TypeData::TypeParameter`
    pub type_params: Vec<TypeId>,
    pub is_static: bool,
    /// First parameter is the `this` receiver
    pub is_extension: bool,
    pub accessibility: Accessibility,
}

impl MethodDef {
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    /// Parameters the caller supplies, skipping the extension receiver
    pub fn call_params(&self) -> &[Parameter] {
        if self.is_extension {
            &self.params[1..]
        } else {
            &self.params
        }
    }

    /// Type of the extension receiver parameter
    pub fn receiver_param(&self) -> Option<&Parameter> {
        if self.is_extension {
            self.params.first()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: SmolStr,
    pub owner: TypeId,
    pub ty: TypeId,
    pub is_static: bool,
    pub is_readonly: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: SmolStr,
    pub owner: TypeId,
    pub ty: TypeId,
    pub getter: Option<MethodId>,
    pub setter: Option<MethodId>,
    pub is_static: bool,
}

/// A namespace and the extension methods visible through it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDef {
    pub name: SmolStr,
    pub parent: Option<NamespaceId>,
    /// Extension methods declared directly in this namespace
    pub extension_methods: Vec<MethodId>,
    /// Namespaces imported by `using` directives at this level
    pub imports: Vec<NamespaceId>,
}

/// Where a protocol member is being looked up from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub namespace: NamespaceId,
    pub containing_type: Option<TypeId>,
}
