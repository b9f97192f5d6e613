use cinder_compiler_semantic::{
    Accessibility, BoundFunction, CallSite, Constant, Expr, FieldId, MemberId, MethodDef,
    MethodId, Parameter, PrimitiveType, PropertyId, TypeCatalog, TypeId, WellKnownTypes,
};

/// A class with a `Deconstruct(out ...)` method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deconstructible {
    pub ty: TypeId,
    pub deconstruct: MethodId,
}

/// A class with one field and one read-write property over it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Holder {
    pub ty: TypeId,
    pub field: FieldId,
    pub property: PropertyId,
    pub setter: MethodId,
}

/// A type implementing `IDisposable`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub ty: TypeId,
    pub dispose: MethodId,
}

/// How a collection's enumerator is declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumeratorShape {
    /// Struct with nothing to release
    Struct,
    /// Struct implementing `IDisposable`
    DisposableStruct,
    /// Struct with its own `Dispose()` but no interface
    PatternDisposeStruct,
    /// Sealed class with nothing to release
    SealedClass,
    /// Unsealed class; a subclass might still be disposable
    Class,
    DisposableClass,
}

/// A collection and the members `foreach` calls on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub ty: TypeId,
    pub enumerator: TypeId,
    pub element: TypeId,
    pub get_enumerator: MethodId,
    pub move_next: MethodId,
    /// Getter of `Current`
    pub current: MethodId,
    /// What the loop's cleanup calls, if it may call anything
    pub dispose: Option<MethodId>,
}

/// A type catalog with the primitive types at hand and a `Program` class for
/// static helper methods
pub struct Fixture {
    pub catalog: TypeCatalog,
    pub int: TypeId,
    pub long: TypeId,
    pub bool: TypeId,
    pub char: TypeId,
    pub string: TypeId,
    pub object: TypeId,
    pub void: TypeId,
    pub program: TypeId,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        let mut catalog = TypeCatalog::new();
        let well_known = *catalog.well_known();
        let program = catalog.declare_static_class("Program", well_known.global_namespace);
        Self {
            int: catalog.primitive(PrimitiveType::Int),
            long: catalog.primitive(PrimitiveType::Long),
            bool: catalog.primitive(PrimitiveType::Bool),
            char: catalog.primitive(PrimitiveType::Char),
            string: well_known.string,
            object: well_known.object,
            void: well_known.void,
            program,
            catalog,
        }
    }

    pub const fn well_known(&self) -> &WellKnownTypes {
        self.catalog.well_known()
    }

    /// Bodies are declared inside `Program` in the global namespace
    pub const fn call_site(&self) -> CallSite {
        CallSite {
            namespace: self.catalog.well_known().global_namespace,
            containing_type: Some(self.program),
        }
    }

    pub fn function(&self, name: &str, return_type: TypeId) -> BoundFunction {
        BoundFunction::new(name, return_type, self.call_site())
    }

    /// Declares `static return_type Program.name(params...)`
    pub fn static_method(&mut self, name: &str, params: &[TypeId], return_type: TypeId) -> MethodId {
        let params = params
            .iter()
            .enumerate()
            .map(|(index, ty)| Parameter::value(&format!("arg{index}"), *ty))
            .collect();
        self.catalog.add_method(MethodDef {
            name: name.into(),
            owner: self.program,
            params,
            return_type,
            type_params: Vec::new(),
            is_static: true,
            is_extension: false,
            accessibility: Accessibility::Public,
        })
    }

    /// The first method called `name` declared directly on `ty`
    pub fn method_named(&self, ty: TypeId, name: &str) -> MethodId {
        self.catalog
            .members_named(ty, name)
            .iter()
            .find_map(|member| match member {
                MemberId::Method(method) => Some(*method),
                _ => None,
            })
            .unwrap_or_else(|| {
                panic!("{} has no method '{name}'", self.catalog.format_type(ty))
            })
    }

    /// The getter of property `name` declared directly on `ty`
    pub fn getter_named(&self, ty: TypeId, name: &str) -> MethodId {
        self.catalog
            .members_named(ty, name)
            .iter()
            .find_map(|member| match member {
                MemberId::Property(property) => self.catalog.property(*property).getter,
                _ => None,
            })
            .unwrap_or_else(|| {
                panic!("{} has no readable '{name}'", self.catalog.format_type(ty))
            })
    }

    /// `IDisposable.Dispose`
    pub fn dispose_method(&self) -> MethodId {
        self.method_named(self.well_known().disposable, "Dispose")
    }

    /// `IAsyncDisposable.DisposeAsync`
    pub fn dispose_async_method(&self) -> MethodId {
        self.method_named(self.well_known().async_disposable, "DisposeAsync")
    }

    // ==================== Expressions ====================

    pub fn int_literal(&self, value: i64) -> Expr {
        Expr::literal(Constant::Int(value), self.int)
    }

    pub fn bool_literal(&self, value: bool) -> Expr {
        Expr::literal(Constant::Bool(value), self.bool)
    }

    pub fn string_literal(&self, value: &str) -> Expr {
        Expr::literal(Constant::Str(value.into()), self.string)
    }

    /// Static call `method(args...)`
    pub fn call(&self, method: MethodId, args: Vec<Expr>) -> Expr {
        Expr::call(None, method, args, &self.catalog)
    }

    // ==================== Declarations ====================

    /// A class whose `Deconstruct` produces `components`
    pub fn deconstructible(&mut self, name: &str, components: &[TypeId]) -> Deconstructible {
        let ty = self.catalog.declare_class(name);
        let params = components
            .iter()
            .enumerate()
            .map(|(index, component)| Parameter::out(&format!("item{index}"), *component))
            .collect();
        let deconstruct = self
            .catalog
            .add_instance_method(ty, "Deconstruct", params, self.void);
        Deconstructible { ty, deconstruct }
    }

    pub fn holder(&mut self, name: &str, value_ty: TypeId) -> Holder {
        let ty = self.catalog.declare_class(name);
        let field = self.catalog.add_field(ty, "value", value_ty);
        let property = self.catalog.add_property(ty, "Value", value_ty, true, true);
        let setter = self
            .catalog
            .property(property)
            .setter
            .unwrap_or_else(|| panic!("{name}.Value has no setter"));
        Holder {
            ty,
            field,
            property,
            setter,
        }
    }

    /// A sealed class, or a struct, implementing `IDisposable`
    pub fn resource(&mut self, name: &str, value_type: bool) -> Resource {
        let ty = if value_type {
            self.catalog.declare_struct(name)
        } else {
            self.catalog.declare_sealed_class(name)
        };
        let disposable = self.well_known().disposable;
        self.catalog.add_interface(ty, disposable);
        Resource {
            ty,
            dispose: self.dispose_method(),
        }
    }

    /// A class enumerated through an instance `GetEnumerator` returning an
    /// enumerator of the given shape
    pub fn collection(&mut self, name: &str, element: TypeId, shape: EnumeratorShape) -> Collection {
        let enumerator_name = format!("{name}.Enumerator");
        let enumerator = match shape {
            EnumeratorShape::Struct
            | EnumeratorShape::DisposableStruct
            | EnumeratorShape::PatternDisposeStruct => self.catalog.declare_struct(&enumerator_name),
            EnumeratorShape::SealedClass => self.catalog.declare_sealed_class(&enumerator_name),
            EnumeratorShape::Class | EnumeratorShape::DisposableClass => {
                self.catalog.declare_class(&enumerator_name)
            }
        };
        let move_next = self
            .catalog
            .add_instance_method(enumerator, "MoveNext", Vec::new(), self.bool);
        self.catalog
            .add_property(enumerator, "Current", element, true, false);
        let current = self.getter_named(enumerator, "Current");

        let disposable = self.well_known().disposable;
        let dispose = match shape {
            EnumeratorShape::DisposableStruct | EnumeratorShape::DisposableClass => {
                self.catalog.add_interface(enumerator, disposable);
                Some(self.dispose_method())
            }
            EnumeratorShape::PatternDisposeStruct => Some(self.catalog.add_instance_method(
                enumerator,
                "Dispose",
                Vec::new(),
                self.void,
            )),
            EnumeratorShape::Class => Some(self.dispose_method()),
            EnumeratorShape::Struct | EnumeratorShape::SealedClass => None,
        };

        let ty = self.catalog.declare_class(name);
        let get_enumerator = self
            .catalog
            .add_instance_method(ty, "GetEnumerator", Vec::new(), enumerator);
        Collection {
            ty,
            enumerator,
            element,
            get_enumerator,
            move_next,
            current,
            dispose,
        }
    }

    /// A class implementing `IEnumerable<element>` and nothing else
    pub fn generic_collection(&mut self, name: &str, element: TypeId) -> Collection {
        let enumerable = self.catalog.generic_enumerable(element);
        let enumerator = self.catalog.generic_enumerator(element);
        let ty = self.catalog.declare_class(name);
        self.catalog.add_interface(ty, enumerable);
        Collection {
            ty,
            enumerator,
            element,
            get_enumerator: self.method_named(enumerable, "GetEnumerator"),
            move_next: self.method_named(self.well_known().enumerator, "MoveNext"),
            current: self.getter_named(enumerator, "Current"),
            dispose: Some(self.dispose_method()),
        }
    }

    /// A class implementing only the non-generic `IEnumerable`
    pub fn legacy_collection(&mut self, name: &str) -> Collection {
        let well_known = *self.well_known();
        let ty = self.catalog.declare_class(name);
        self.catalog.add_interface(ty, well_known.enumerable);
        Collection {
            ty,
            enumerator: well_known.enumerator,
            element: well_known.object,
            get_enumerator: self.method_named(well_known.enumerable, "GetEnumerator"),
            move_next: self.method_named(well_known.enumerator, "MoveNext"),
            current: self.getter_named(well_known.enumerator, "Current"),
            dispose: Some(self.dispose_method()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_members_are_distinct() {
        let mut fixture = Fixture::new();
        let int = fixture.int;
        let bag = fixture.collection("Bag", int, EnumeratorShape::PatternDisposeStruct);
        assert_ne!(bag.move_next, bag.current);
        assert_ne!(bag.dispose, Some(fixture.dispose_method()));
        assert!(fixture.catalog.is_value_type(bag.enumerator));
    }

    #[test]
    fn test_generic_collection_shares_library_members() {
        let mut fixture = Fixture::new();
        let (int, string) = (fixture.int, fixture.string);
        let ints = fixture.generic_collection("Ints", int);
        let strings = fixture.generic_collection("Strings", string);
        assert_eq!(ints.move_next, strings.move_next);
        assert_ne!(ints.current, strings.current);
        assert_ne!(ints.get_enumerator, strings.get_enumerator);
    }
}
