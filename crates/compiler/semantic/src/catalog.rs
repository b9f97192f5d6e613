//! # Type Catalog
//!
//! The symbol/member catalog the lowering engine queries. It owns every type, member
//! and namespace handed over by the binder and answers the structural questions the
//! protocol resolver and conversion classifier need: value vs. reference types,
//! sealedness, base chains and implemented interfaces.

use index_vec::IndexVec;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::definition::{
    Accessibility, FieldDef, FieldId, MemberId, MethodDef, MethodId, NamespaceDef, NamespaceId,
    Parameter, PropertyDef, PropertyId,
};
use crate::types::{
    NamedType, PrimitiveType, SpecialType, StructuralKey, TypeData, TypeFlags, TypeKind,
    TypeParamConstraints, TypeParameter,
};
use crate::TypeId;

const PRIMITIVES: [PrimitiveType; 13] = [
    PrimitiveType::Bool,
    PrimitiveType::Char,
    PrimitiveType::SByte,
    PrimitiveType::Byte,
    PrimitiveType::Short,
    PrimitiveType::UShort,
    PrimitiveType::Int,
    PrimitiveType::UInt,
    PrimitiveType::Long,
    PrimitiveType::ULong,
    PrimitiveType::Float,
    PrimitiveType::Double,
    PrimitiveType::Decimal,
];

/// Types registered in every catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellKnownTypes {
    pub object: TypeId,
    pub string: TypeId,
    pub void: TypeId,
    pub null: TypeId,
    pub default: TypeId,
    pub error: TypeId,
    pub disposable: TypeId,
    pub async_disposable: TypeId,
    pub enumerable: TypeId,
    pub enumerator: TypeId,
    pub global_namespace: NamespaceId,
}

#[derive(Debug, Clone)]
pub struct TypeCatalog {
    types: IndexVec<TypeId, TypeData>,
    methods: IndexVec<MethodId, MethodDef>,
    fields: IndexVec<FieldId, FieldDef>,
    properties: IndexVec<PropertyId, PropertyDef>,
    namespaces: IndexVec<NamespaceId, NamespaceDef>,
    interned: FxHashMap<StructuralKey, TypeId>,
    special: FxHashMap<SpecialType, TypeId>,
    well_known: WellKnownTypes,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCatalog {
    /// Creates a catalog pre-populated with primitives and the library interfaces
    pub fn new() -> Self {
        let mut types = IndexVec::new();
        let mut interned = FxHashMap::default();
        for primitive in PRIMITIVES {
            let id = types.push(TypeData::Primitive(primitive));
            interned.insert(StructuralKey::Primitive(primitive), id);
        }
        let object = types.push(TypeData::Object);
        let string = types.push(TypeData::String);
        let void = types.push(TypeData::Void);
        let null = types.push(TypeData::Null);
        let default = types.push(TypeData::Default);
        let error = types.push(TypeData::Error);

        let mut namespaces = IndexVec::new();
        let global_namespace = namespaces.push(NamespaceDef {
            name: SmolStr::new_static("<global>"),
            parent: None,
            extension_methods: Vec::new(),
            imports: Vec::new(),
        });

        let placeholder = WellKnownTypes {
            object,
            string,
            void,
            null,
            default,
            error,
            disposable: error,
            async_disposable: error,
            enumerable: error,
            enumerator: error,
            global_namespace,
        };

        let mut catalog = Self {
            types,
            methods: IndexVec::new(),
            fields: IndexVec::new(),
            properties: IndexVec::new(),
            namespaces,
            interned,
            special: FxHashMap::default(),
            well_known: placeholder,
        };
        catalog.register_library_interfaces();
        catalog
    }

    fn register_library_interfaces(&mut self) {
        let bool_ty = self.primitive(PrimitiveType::Bool);
        let object = self.well_known.object;
        let void = self.well_known.void;

        let disposable = self.declare_interface("IDisposable");
        self.set_special(disposable, SpecialType::Disposable);
        self.add_instance_method(disposable, "Dispose", vec![], void);

        let awaitable_void = self.awaitable_of(void);
        let async_disposable = self.declare_interface("IAsyncDisposable");
        self.set_special(async_disposable, SpecialType::AsyncDisposable);
        self.add_instance_method(async_disposable, "DisposeAsync", vec![], awaitable_void);

        let enumerator = self.declare_interface("IEnumerator");
        self.set_special(enumerator, SpecialType::Enumerator);
        self.add_instance_method(enumerator, "MoveNext", vec![], bool_ty);
        self.add_property(enumerator, "Current", object, true, false);
        self.add_instance_method(enumerator, "Reset", vec![], void);

        let enumerable = self.declare_interface("IEnumerable");
        self.set_special(enumerable, SpecialType::Enumerable);
        self.add_instance_method(enumerable, "GetEnumerator", vec![], enumerator);

        self.well_known.disposable = disposable;
        self.well_known.async_disposable = async_disposable;
        self.well_known.enumerator = enumerator;
        self.well_known.enumerable = enumerable;
    }

    // ==================== Declarations ====================

    pub fn add_namespace(&mut self, name: &str, parent: NamespaceId) -> NamespaceId {
        self.namespaces.push(NamespaceDef {
            name: name.into(),
            parent: Some(parent),
            extension_methods: Vec::new(),
            imports: Vec::new(),
        })
    }

    /// Records a `using` directive importing `imported` into `namespace`
    pub fn add_import(&mut self, namespace: NamespaceId, imported: NamespaceId) {
        self.namespaces[namespace].imports.push(imported);
    }

    fn declare_type(&mut self, name: &str, kind: TypeKind, flags: TypeFlags) -> TypeId {
        self.types.push(TypeData::Named(NamedType {
            name: name.into(),
            kind,
            flags,
            base: None,
            interfaces: Vec::new(),
            members: IndexMap::new(),
            namespace: None,
            special: None,
        }))
    }

    pub fn declare_class(&mut self, name: &str) -> TypeId {
        self.declare_type(name, TypeKind::Class, TypeFlags::empty())
    }

    pub fn declare_sealed_class(&mut self, name: &str) -> TypeId {
        self.declare_type(name, TypeKind::Class, TypeFlags::SEALED)
    }

    /// Declares a static class holding extension methods
    pub fn declare_static_class(&mut self, name: &str, namespace: NamespaceId) -> TypeId {
        let id = self.declare_type(
            name,
            TypeKind::Class,
            TypeFlags::STATIC | TypeFlags::SEALED | TypeFlags::ABSTRACT,
        );
        if let Some(named) = self.named_mut(id) {
            named.namespace = Some(namespace);
        }
        id
    }

    pub fn declare_struct(&mut self, name: &str) -> TypeId {
        self.declare_type(name, TypeKind::Struct, TypeFlags::SEALED)
    }

    /// Declares a stack-only struct
    pub fn declare_ref_struct(&mut self, name: &str) -> TypeId {
        self.declare_type(name, TypeKind::Struct, TypeFlags::SEALED | TypeFlags::REF_LIKE)
    }

    pub fn declare_interface(&mut self, name: &str) -> TypeId {
        self.declare_type(name, TypeKind::Interface, TypeFlags::ABSTRACT)
    }

    pub fn declare_type_parameter(&mut self, name: &str, constraints: TypeParamConstraints) -> TypeId {
        self.types.push(TypeData::TypeParameter(TypeParameter {
            name: name.into(),
            constraints,
        }))
    }

    pub fn set_base(&mut self, ty: TypeId, base: TypeId) {
        if let Some(named) = self.named_mut(ty) {
            named.base = Some(base);
        }
    }

    pub fn add_interface(&mut self, ty: TypeId, interface: TypeId) {
        if let Some(named) = self.named_mut(ty) {
            named.interfaces.push(interface);
        }
    }

    fn set_special(&mut self, ty: TypeId, special: SpecialType) {
        if let Some(named) = self.named_mut(ty) {
            named.special = Some(special);
            self.special.insert(special, ty);
        }
    }

    /// Declaration data of a named type; builder calls on any other type are ignored
    fn named_mut(&mut self, ty: TypeId) -> Option<&mut NamedType> {
        match &mut self.types[ty] {
            TypeData::Named(named) => Some(named),
            other => {
                tracing::warn!("expected a named type, found {other:?}");
                None
            }
        }
    }

    fn add_member(&mut self, owner: TypeId, name: SmolStr, member: MemberId) {
        if let Some(named) = self.named_mut(owner) {
            named.members.entry(name).or_default().push(member);
        }
    }

    /// Adds a method; instance and static methods join their owner's member table,
    /// extension methods join the namespace of their static container.
    pub fn add_method(&mut self, def: MethodDef) -> MethodId {
        let owner = def.owner;
        let name = def.name.clone();
        let is_extension = def.is_extension;
        let id = self.methods.push(def);
        if is_extension {
            let namespace = self
                .named(owner)
                .and_then(|named| named.namespace)
                .unwrap_or(self.well_known.global_namespace);
            self.namespaces[namespace].extension_methods.push(id);
        }
        self.add_member(owner, name, MemberId::Method(id));
        id
    }

    pub fn add_instance_method(
        &mut self,
        owner: TypeId,
        name: &str,
        params: Vec<Parameter>,
        return_type: TypeId,
    ) -> MethodId {
        self.add_method(MethodDef {
            name: name.into(),
            owner,
            params,
            return_type,
            type_params: Vec::new(),
            is_static: false,
            is_extension: false,
            accessibility: Accessibility::Public,
        })
    }

    /// Adds an extension method; `params[0]` is the receiver
    pub fn add_extension_method(
        &mut self,
        container: TypeId,
        name: &str,
        params: Vec<Parameter>,
        return_type: TypeId,
    ) -> MethodId {
        self.add_method(MethodDef {
            name: name.into(),
            owner: container,
            params,
            return_type,
            type_params: Vec::new(),
            is_static: true,
            is_extension: true,
            accessibility: Accessibility::Public,
        })
    }

    pub fn add_field(&mut self, owner: TypeId, name: &str, ty: TypeId) -> FieldId {
        let id = self.fields.push(FieldDef {
            name: name.into(),
            owner,
            ty,
            is_static: false,
            is_readonly: false,
        });
        self.add_member(owner, name.into(), MemberId::Field(id));
        id
    }

    /// Adds a property together with its `get_`/`set_` accessor methods
    pub fn add_property(
        &mut self,
        owner: TypeId,
        name: &str,
        ty: TypeId,
        has_getter: bool,
        has_setter: bool,
    ) -> PropertyId {
        let void = self.well_known.void;
        let accessor = |name: String, params: Vec<Parameter>, return_type: TypeId| MethodDef {
            name: name.into(),
            owner,
            params,
            return_type,
            type_params: Vec::new(),
            is_static: false,
            is_extension: false,
            accessibility: Accessibility::Public,
        };
        let getter = has_getter.then(|| {
            self.methods
                .push(accessor(format!("get_{name}"), Vec::new(), ty))
        });
        let setter = has_setter.then(|| {
            self.methods.push(accessor(
                format!("set_{name}"),
                vec![Parameter::value("value", ty)],
                void,
            ))
        });
        let id = self.properties.push(PropertyDef {
            name: name.into(),
            owner,
            ty,
            getter,
            setter,
            is_static: false,
        });
        self.add_member(owner, name.into(), MemberId::Property(id));
        id
    }

    // ==================== Structural types ====================

    fn intern(&mut self, key: StructuralKey, data: TypeData) -> TypeId {
        if let Some(id) = self.interned.get(&key) {
            return *id;
        }
        let id = self.types.push(data);
        self.interned.insert(key, id);
        id
    }

    pub fn primitive(&self, primitive: PrimitiveType) -> TypeId {
        self.interned[&StructuralKey::Primitive(primitive)]
    }

    pub fn array_of(&mut self, element: TypeId, rank: usize) -> TypeId {
        self.intern(
            StructuralKey::Array(element, rank),
            TypeData::Array { element, rank },
        )
    }

    pub fn tuple_of(&mut self, elements: Vec<TypeId>) -> TypeId {
        self.intern(
            StructuralKey::Tuple(elements.clone()),
            TypeData::Tuple(elements),
        )
    }

    pub fn nullable_of(&mut self, underlying: TypeId) -> TypeId {
        self.intern(
            StructuralKey::Nullable(underlying),
            TypeData::Nullable(underlying),
        )
    }

    pub fn awaitable_of(&mut self, result: TypeId) -> TypeId {
        self.intern(
            StructuralKey::Awaitable(result),
            TypeData::Awaitable(result),
        )
    }

    /// Looks up a structural type without creating it
    pub(crate) fn find_interned(&self, key: &StructuralKey) -> Option<TypeId> {
        self.interned.get(key).copied()
    }

    /// Looks up an instantiated library interface without creating it
    pub fn find_special(&self, special: SpecialType) -> Option<TypeId> {
        self.special.get(&special).copied()
    }

    /// `IEnumerator<T>`, created on first use
    pub fn generic_enumerator(&mut self, element: TypeId) -> TypeId {
        if let Some(id) = self.special.get(&SpecialType::GenericEnumerator(element)) {
            return *id;
        }
        let name = format!("IEnumerator<{}>", self.format_type(element));
        let id = self.declare_interface(&name);
        self.set_special(id, SpecialType::GenericEnumerator(element));
        let (enumerator, disposable) = (self.well_known.enumerator, self.well_known.disposable);
        self.add_interface(id, enumerator);
        self.add_interface(id, disposable);
        self.add_property(id, "Current", element, true, false);
        id
    }

    /// `IEnumerable<T>`, created on first use
    pub fn generic_enumerable(&mut self, element: TypeId) -> TypeId {
        if let Some(id) = self.special.get(&SpecialType::GenericEnumerable(element)) {
            return *id;
        }
        let enumerator = self.generic_enumerator(element);
        let name = format!("IEnumerable<{}>", self.format_type(element));
        let id = self.declare_interface(&name);
        self.set_special(id, SpecialType::GenericEnumerable(element));
        let enumerable = self.well_known.enumerable;
        self.add_interface(id, enumerable);
        self.add_instance_method(id, "GetEnumerator", vec![], enumerator);
        id
    }

    /// `IAsyncEnumerator<T>`, created on first use
    pub fn async_enumerator(&mut self, element: TypeId) -> TypeId {
        if let Some(id) = self.special.get(&SpecialType::AsyncEnumerator(element)) {
            return *id;
        }
        let bool_ty = self.primitive(PrimitiveType::Bool);
        let awaitable_bool = self.awaitable_of(bool_ty);
        let name = format!("IAsyncEnumerator<{}>", self.format_type(element));
        let id = self.declare_interface(&name);
        self.set_special(id, SpecialType::AsyncEnumerator(element));
        let async_disposable = self.well_known.async_disposable;
        self.add_interface(id, async_disposable);
        self.add_instance_method(id, "MoveNextAsync", vec![], awaitable_bool);
        self.add_property(id, "Current", element, true, false);
        id
    }

    /// `IAsyncEnumerable<T>`, created on first use
    pub fn async_enumerable(&mut self, element: TypeId) -> TypeId {
        if let Some(id) = self.special.get(&SpecialType::AsyncEnumerable(element)) {
            return *id;
        }
        let enumerator = self.async_enumerator(element);
        let name = format!("IAsyncEnumerable<{}>", self.format_type(element));
        let id = self.declare_interface(&name);
        self.set_special(id, SpecialType::AsyncEnumerable(element));
        self.add_instance_method(id, "GetAsyncEnumerator", vec![], enumerator);
        id
    }

    // ==================== Queries ====================

    pub const fn well_known(&self) -> &WellKnownTypes {
        &self.well_known
    }

    pub fn ty(&self, id: TypeId) -> &TypeData {
        &self.types[id]
    }

    pub fn method(&self, id: MethodId) -> &MethodDef {
        &self.methods[id]
    }

    pub fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id]
    }

    pub fn property(&self, id: PropertyId) -> &PropertyDef {
        &self.properties[id]
    }

    pub fn namespace(&self, id: NamespaceId) -> &NamespaceDef {
        &self.namespaces[id]
    }

    pub fn named(&self, id: TypeId) -> Option<&NamedType> {
        match &self.types[id] {
            TypeData::Named(named) => Some(named),
            _ => None,
        }
    }

    pub fn special(&self, id: TypeId) -> Option<SpecialType> {
        self.named(id).and_then(|named| named.special)
    }

    pub fn as_primitive(&self, id: TypeId) -> Option<PrimitiveType> {
        match self.types[id] {
            TypeData::Primitive(primitive) => Some(primitive),
            _ => None,
        }
    }

    /// Members declared directly on `ty` under `name`
    pub fn members_named(&self, ty: TypeId, name: &str) -> &[MemberId] {
        self.named(ty)
            .and_then(|named| named.members.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_value_type(&self, id: TypeId) -> bool {
        match &self.types[id] {
            TypeData::Primitive(_)
            | TypeData::Tuple(_)
            | TypeData::Nullable(_)
            | TypeData::Awaitable(_) => true,
            TypeData::Named(named) => named.kind == TypeKind::Struct,
            TypeData::TypeParameter(param) => param.constraints.value_type,
            _ => false,
        }
    }

    pub fn is_reference_type(&self, id: TypeId) -> bool {
        match &self.types[id] {
            TypeData::String | TypeData::Object | TypeData::Array { .. } => true,
            TypeData::Named(named) => named.kind != TypeKind::Struct,
            TypeData::TypeParameter(param) => param.constraints.reference_type,
            _ => false,
        }
    }

    pub fn is_nullable(&self, id: TypeId) -> bool {
        matches!(self.types[id], TypeData::Nullable(_))
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        self.named(id)
            .is_some_and(|named| named.kind == TypeKind::Interface)
    }

    pub fn is_ref_like(&self, id: TypeId) -> bool {
        self.named(id)
            .is_some_and(|named| named.flags.contains(TypeFlags::REF_LIKE))
    }

    /// Returns true when no subtype of `id` can exist at runtime
    pub fn is_sealed(&self, id: TypeId) -> bool {
        match &self.types[id] {
            TypeData::Named(named) => {
                named.kind == TypeKind::Struct || named.flags.contains(TypeFlags::SEALED)
            }
            TypeData::Object | TypeData::TypeParameter(_) => false,
            _ => true,
        }
    }

    /// The direct base class of a type
    pub fn base_type(&self, id: TypeId) -> Option<TypeId> {
        match &self.types[id] {
            TypeData::Named(named) => match named.kind {
                TypeKind::Interface => None,
                _ => Some(named.base.unwrap_or(self.well_known.object)),
            },
            TypeData::String
            | TypeData::Array { .. }
            | TypeData::Primitive(_)
            | TypeData::Tuple(_)
            | TypeData::Nullable(_) => Some(self.well_known.object),
            _ => None,
        }
    }

    /// `id` followed by each of its base classes, most-derived first
    pub fn base_chain(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(base) = self.base_type(current) {
            if chain.contains(&base) {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
    }

    /// Every interface implemented by `id`, breadth-first in declaration order
    pub fn all_interfaces(&self, id: TypeId) -> Vec<TypeId> {
        let mut roots: Vec<TypeId> = Vec::new();
        match &self.types[id] {
            TypeData::TypeParameter(param) => roots.extend(&param.constraints.interfaces),
            _ => {
                for ty in self.base_chain(id) {
                    if let Some(named) = self.named(ty) {
                        roots.extend(&named.interfaces);
                    }
                }
            }
        }

        let mut seen = FxHashSet::default();
        let mut result = Vec::new();
        let mut queue = std::collections::VecDeque::from(roots);
        while let Some(interface) = queue.pop_front() {
            if !seen.insert(interface) {
                continue;
            }
            result.push(interface);
            if let Some(named) = self.named(interface) {
                queue.extend(&named.interfaces);
            }
        }
        result
    }

    /// Returns true if `id` is `interface` or implements it
    pub fn implements(&self, id: TypeId, interface: TypeId) -> bool {
        id == interface || self.all_interfaces(id).contains(&interface)
    }

    /// Returns true if `base` appears in the base chain of `derived`
    pub fn derives_from(&self, derived: TypeId, base: TypeId) -> bool {
        self.base_chain(derived).contains(&base)
    }

    /// Returns true if a value of `id` may be the `null` reference
    pub fn admits_null(&self, id: TypeId) -> bool {
        if self.is_nullable(id) {
            return true;
        }
        match &self.types[id] {
            TypeData::TypeParameter(param) => !param.constraints.value_type,
            _ => self.is_reference_type(id),
        }
    }

    pub fn format_type(&self, id: TypeId) -> String {
        match &self.types[id] {
            TypeData::Primitive(primitive) => primitive.name().to_string(),
            TypeData::String => "string".to_string(),
            TypeData::Object => "object".to_string(),
            TypeData::Array { element, rank } => {
                format!("{}[{}]", self.format_type(*element), ",".repeat(rank.saturating_sub(1)))
            }
            TypeData::Tuple(elements) => {
                let formatted: Vec<String> =
                    elements.iter().map(|t| self.format_type(*t)).collect();
                format!("({})", formatted.join(", "))
            }
            TypeData::Nullable(inner) => format!("{}?", self.format_type(*inner)),
            TypeData::Awaitable(inner) => format!("ValueTask<{}>", self.format_type(*inner)),
            TypeData::Named(named) => named.name.to_string(),
            TypeData::TypeParameter(param) => param.name.to_string(),
            TypeData::Null => "<null>".to_string(),
            TypeData::Default => "<default>".to_string(),
            TypeData::Void => "void".to_string(),
            TypeData::Error => "?".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_types_are_interned() {
        let mut catalog = TypeCatalog::new();
        let int = catalog.primitive(PrimitiveType::Int);
        let a = catalog.array_of(int, 1);
        let b = catalog.array_of(int, 1);
        let c = catalog.array_of(int, 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(catalog.format_type(c), "int[,]");

        let long = catalog.primitive(PrimitiveType::Long);
        let t1 = catalog.tuple_of(vec![int, long]);
        let t2 = catalog.tuple_of(vec![int, long]);
        assert_eq!(t1, t2);
        assert_eq!(catalog.format_type(t1), "(int, long)");
    }

    #[test]
    fn test_builder_calls_on_unnamed_types_are_ignored() {
        let mut catalog = TypeCatalog::new();
        let int = catalog.primitive(PrimitiveType::Int);
        let array = catalog.array_of(int, 1);
        let disposable = catalog.well_known().disposable;
        let object = catalog.well_known().object;

        catalog.add_interface(array, disposable);
        catalog.set_base(array, object);
        assert!(!catalog.implements(array, disposable));
        assert_eq!(catalog.ty(array), &TypeData::Array { element: int, rank: 1 });
    }

    #[test]
    fn test_generic_interfaces_are_memoized() {
        let mut catalog = TypeCatalog::new();
        let int = catalog.primitive(PrimitiveType::Int);
        let e1 = catalog.generic_enumerable(int);
        let e2 = catalog.generic_enumerable(int);
        assert_eq!(e1, e2);
        assert_eq!(catalog.format_type(e1), "IEnumerable<int>");

        let enumerator = catalog.generic_enumerator(int);
        let disposable = catalog.well_known().disposable;
        assert!(catalog.implements(enumerator, disposable));
        assert!(catalog.implements(enumerator, catalog.well_known().enumerator));
    }

    #[test]
    fn test_value_and_reference_classification() {
        let mut catalog = TypeCatalog::new();
        let class = catalog.declare_class("C");
        let sealed = catalog.declare_sealed_class("S");
        let value = catalog.declare_struct("V");
        let ref_struct = catalog.declare_ref_struct("R");

        assert!(catalog.is_reference_type(class));
        assert!(!catalog.is_sealed(class));
        assert!(catalog.is_sealed(sealed));
        assert!(catalog.is_value_type(value));
        assert!(catalog.is_sealed(value));
        assert!(catalog.is_ref_like(ref_struct));
        assert!(!catalog.is_ref_like(value));

        let unconstrained = catalog.declare_type_parameter("T", TypeParamConstraints::default());
        assert!(!catalog.is_value_type(unconstrained));
        assert!(!catalog.is_reference_type(unconstrained));
        assert!(catalog.admits_null(unconstrained));
    }

    #[test]
    fn test_interfaces_include_bases_transitively() {
        let mut catalog = TypeCatalog::new();
        let int = catalog.primitive(PrimitiveType::Int);
        let enumerable = catalog.generic_enumerable(int);
        let base = catalog.declare_class("Base");
        catalog.add_interface(base, enumerable);
        let derived = catalog.declare_class("Derived");
        catalog.set_base(derived, base);

        let interfaces = catalog.all_interfaces(derived);
        assert_eq!(interfaces[0], enumerable);
        assert!(interfaces.contains(&catalog.well_known().enumerable));
        assert_eq!(
            catalog.base_chain(derived),
            vec![derived, base, catalog.well_known().object]
        );
    }
}
