use super::*;
use crate::definition::{MethodDef, Parameter};
use crate::types::{PrimitiveType, TypeParamConstraints};

fn global_site(catalog: &TypeCatalog) -> CallSite {
    CallSite {
        namespace: catalog.well_known().global_namespace,
        containing_type: None,
    }
}

fn resolver(catalog: &TypeCatalog) -> ProtocolResolver<'_> {
    ProtocolResolver::new(catalog, global_site(catalog), ResolverOptions::default())
}

fn primitive(catalog: &TypeCatalog, primitive: PrimitiveType) -> TypeId {
    catalog.primitive(primitive)
}

fn add_deconstruct(catalog: &mut TypeCatalog, owner: TypeId, outputs: &[TypeId]) -> MethodId {
    let void = catalog.well_known().void;
    let params = outputs
        .iter()
        .enumerate()
        .map(|(i, ty)| Parameter::out(&format!("item{i}"), *ty))
        .collect();
    catalog.add_instance_method(owner, "Deconstruct", params, void)
}

fn add_extension_deconstruct(
    catalog: &mut TypeCatalog,
    container: TypeId,
    receiver: TypeId,
    outputs: &[TypeId],
) -> MethodId {
    let void = catalog.well_known().void;
    let mut params = vec![Parameter::value("self", receiver)];
    params.extend(
        outputs
            .iter()
            .enumerate()
            .map(|(i, ty)| Parameter::out(&format!("item{i}"), *ty)),
    );
    catalog.add_extension_method(container, "Deconstruct", params, void)
}

/// A struct enumerator with `MoveNext(): bool` and `Current: element`
fn add_enumerator(catalog: &mut TypeCatalog, name: &str, element: TypeId) -> TypeId {
    let bool_ty = primitive(catalog, PrimitiveType::Bool);
    let enumerator = catalog.declare_struct(name);
    catalog.add_instance_method(enumerator, "MoveNext", vec![], bool_ty);
    catalog.add_property(enumerator, "Current", element, true, false);
    enumerator
}

fn interface_method(catalog: &TypeCatalog, interface: TypeId, name: &str) -> MethodId {
    match catalog.members_named(interface, name)[0] {
        MemberId::Method(method) => method,
        other => panic!("expected a method, found {other:?}"),
    }
}

#[test]
fn test_deconstruct_found_by_arity() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let string = catalog.well_known().string;
    let class = catalog.declare_class("C");
    let method = add_deconstruct(&mut catalog, class, &[int, string]);

    let mut resolver = resolver(&catalog);
    let candidate = resolver.resolve_deconstruct(class, 2).unwrap();
    assert_eq!(candidate.method, method);
    assert_eq!(candidate.param_types, vec![int, string]);
    assert!(!candidate.is_extension);
    assert_eq!(
        resolver.resolve(class, Protocol::Deconstruct, 3),
        Resolution::NotFound
    );
    assert_eq!(
        resolver.resolve_deconstruct(class, 3),
        Err(ResolutionError::DeconstructNotFound {
            receiver: class,
            arity: 3
        })
    );
}

#[test]
fn test_derived_level_shadows_base_even_when_unusable() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let base = catalog.declare_class("Base");
    let derived = catalog.declare_class("Derived");
    catalog.set_base(derived, base);
    add_deconstruct(&mut catalog, base, &[int, int]);
    add_deconstruct(&mut catalog, derived, &[int]);

    let global = catalog.well_known().global_namespace;
    let extensions = catalog.declare_static_class("Extensions", global);
    add_extension_deconstruct(&mut catalog, extensions, derived, &[int, int]);

    let mut resolver = resolver(&catalog);
    assert_eq!(
        resolver.resolve(derived, Protocol::Deconstruct, 2),
        Resolution::NotFound
    );
    assert!(resolver.resolve(base, Protocol::Deconstruct, 2).found().is_some());
}

#[test]
fn test_inaccessible_members_do_not_shadow() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let void = catalog.well_known().void;
    let base = catalog.declare_class("Base");
    let derived = catalog.declare_class("Derived");
    catalog.set_base(derived, base);
    let visible = add_deconstruct(&mut catalog, base, &[int, int]);
    catalog.add_method(MethodDef {
        name: "Deconstruct".into(),
        owner: derived,
        params: vec![Parameter::out("a", int)],
        return_type: void,
        type_params: Vec::new(),
        is_static: false,
        is_extension: false,
        accessibility: Accessibility::Private,
    });

    let mut resolver = resolver(&catalog);
    let candidate = resolver.resolve_deconstruct(derived, 2).unwrap();
    assert_eq!(candidate.method, visible);
    assert_eq!(candidate.origin, base);
}

#[test]
fn test_extensions_searched_innermost_namespace_first() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let object = catalog.well_known().object;
    let global = catalog.well_known().global_namespace;
    let outer = catalog.add_namespace("Outer", global);
    let inner = catalog.add_namespace("Inner", outer);
    let class = catalog.declare_class("C");

    let outer_ext = catalog.declare_static_class("OuterExtensions", outer);
    add_extension_deconstruct(&mut catalog, outer_ext, class, &[int, int]);
    let inner_ext = catalog.declare_static_class("InnerExtensions", inner);
    let inner_method = add_extension_deconstruct(&mut catalog, inner_ext, object, &[int, int]);

    let site = CallSite {
        namespace: inner,
        containing_type: None,
    };
    let mut resolver = ProtocolResolver::new(&catalog, site, ResolverOptions::default());
    let candidate = resolver.resolve_deconstruct(class, 2).unwrap();
    assert_eq!(candidate.method, inner_method);
    assert!(candidate.is_extension);
    assert_eq!(candidate.receiver_conversion, Conversion::ImplicitReference);
}

#[test]
fn test_imported_extensions_join_their_level() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let global = catalog.well_known().global_namespace;
    let library = catalog.add_namespace("Library", global);
    let app = catalog.add_namespace("App", global);
    catalog.add_import(app, library);
    let class = catalog.declare_class("C");
    let ext = catalog.declare_static_class("LibraryExtensions", library);
    let method = add_extension_deconstruct(&mut catalog, ext, class, &[int, int]);

    let site = CallSite {
        namespace: app,
        containing_type: None,
    };
    let mut resolver = ProtocolResolver::new(&catalog, site, ResolverOptions::default());
    assert_eq!(resolver.resolve_deconstruct(class, 2).unwrap().method, method);

    // Not visible from the global namespace, which does not import Library
    let mut resolver = ProtocolResolver::new(&catalog, global_site(&catalog), ResolverOptions::default());
    assert!(resolver.resolve_deconstruct(class, 2).is_err());
}

#[test]
fn test_more_specific_extension_receiver_wins() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let object = catalog.well_known().object;
    let global = catalog.well_known().global_namespace;
    let class = catalog.declare_class("C");
    let ext = catalog.declare_static_class("Extensions", global);
    add_extension_deconstruct(&mut catalog, ext, object, &[int, int]);
    let specific = add_extension_deconstruct(&mut catalog, ext, class, &[int, int]);

    let mut resolver = resolver(&catalog);
    let candidate = resolver.resolve_deconstruct(class, 2).unwrap();
    assert_eq!(candidate.method, specific);
    assert_eq!(candidate.receiver_conversion, Conversion::Identity);
}

#[test]
fn test_tied_deconstruct_overloads_are_ambiguous() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let long = primitive(&catalog, PrimitiveType::Long);
    let string = catalog.well_known().string;
    let class = catalog.declare_class("C");
    let first = add_deconstruct(&mut catalog, class, &[int, string]);
    let second = add_deconstruct(&mut catalog, class, &[long, string]);

    let mut resolver = resolver(&catalog);
    assert_eq!(
        resolver.resolve(class, Protocol::Deconstruct, 2),
        Resolution::Ambiguous(vec![first, second])
    );
    let error = resolver.resolve_deconstruct(class, 2).unwrap_err();
    assert_eq!(error.code(), DiagnosticCode::AmbiguousProtocolMember);
}

#[test]
fn test_generic_extension_infers_from_receiver() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let void = catalog.well_known().void;
    let global = catalog.well_known().global_namespace;
    let int_array = catalog.array_of(int, 1);
    let t = catalog.declare_type_parameter("T", TypeParamConstraints::default());
    let t_array = catalog.array_of(t, 1);
    let ext = catalog.declare_static_class("ArrayExtensions", global);
    let method = catalog.add_method(MethodDef {
        name: "Deconstruct".into(),
        owner: ext,
        params: vec![
            Parameter::value("items", t_array),
            Parameter::out("first", t),
            Parameter::out("second", t),
        ],
        return_type: void,
        type_params: vec![t],
        is_static: true,
        is_extension: true,
        accessibility: Accessibility::Public,
    });

    let mut resolver = resolver(&catalog);
    let candidate = resolver.resolve_deconstruct(int_array, 2).unwrap();
    assert_eq!(candidate.method, method);
    assert_eq!(candidate.type_arguments, vec![int]);
    assert_eq!(candidate.param_types, vec![int, int]);
    assert_eq!(candidate.receiver_type, int_array);
}

#[test]
fn test_uninferable_generic_candidate_is_dropped() {
    let mut catalog = TypeCatalog::new();
    let void = catalog.well_known().void;
    let global = catalog.well_known().global_namespace;
    let class = catalog.declare_class("C");
    let u = catalog.declare_type_parameter("U", TypeParamConstraints::default());
    let ext = catalog.declare_static_class("Extensions", global);
    catalog.add_method(MethodDef {
        name: "Deconstruct".into(),
        owner: ext,
        params: vec![
            Parameter::value("self", class),
            Parameter::out("a", u),
            Parameter::out("b", u),
        ],
        return_type: void,
        type_params: vec![u],
        is_static: true,
        is_extension: true,
        accessibility: Accessibility::Public,
    });

    let mut resolver = resolver(&catalog);
    assert_eq!(
        resolver.resolve(class, Protocol::Deconstruct, 2),
        Resolution::NotFound
    );
}

#[test]
fn test_results_are_cached() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let class = catalog.declare_class("C");
    add_deconstruct(&mut catalog, class, &[int, int]);

    let mut resolver = resolver(&catalog);
    let first = resolver.resolve_deconstruct(class, 2).unwrap();
    let second = resolver.resolve_deconstruct(class, 2).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn test_pattern_enumerable() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let enumerator = add_enumerator(&mut catalog, "Bag.Enumerator", int);
    let bag = catalog.declare_class("Bag");
    let get_enumerator = catalog.add_instance_method(bag, "GetEnumerator", vec![], enumerator);

    let mut resolver = resolver(&catalog);
    let info = resolver.resolve_enumerable(bag, false).unwrap();
    assert_eq!(info.route, EnumerableRoute::Pattern);
    assert_eq!(info.get_enumerator.method, get_enumerator);
    assert_eq!(info.enumerator_type, enumerator);
    assert_eq!(info.element_type, int);
}

#[test]
fn test_generic_interface_route() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let enumerable = catalog.generic_enumerable(int);
    let list = catalog.declare_class("List");
    catalog.add_interface(list, enumerable);

    let mut resolver = resolver(&catalog);
    let info = resolver.resolve_enumerable(list, false).unwrap();
    assert_eq!(info.route, EnumerableRoute::Interface);
    assert_eq!(
        catalog.special(info.enumerator_type),
        Some(SpecialType::GenericEnumerator(int))
    );
    assert_eq!(info.element_type, int);
    let move_next = interface_method(&catalog, catalog.well_known().enumerator, "MoveNext");
    assert_eq!(info.members.move_next.method, move_next);
}

#[test]
fn test_non_generic_interface_yields_object() {
    let mut catalog = TypeCatalog::new();
    let enumerable = catalog.well_known().enumerable;
    let legacy = catalog.declare_class("Legacy");
    catalog.add_interface(legacy, enumerable);

    let mut resolver = resolver(&catalog);
    let info = resolver.resolve_enumerable(legacy, false).unwrap();
    assert_eq!(info.route, EnumerableRoute::Interface);
    assert_eq!(info.element_type, catalog.well_known().object);
}

#[test]
fn test_multiple_enumerable_instantiations_are_an_error() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let string = catalog.well_known().string;
    let ints = catalog.generic_enumerable(int);
    let strings = catalog.generic_enumerable(string);
    let both = catalog.declare_class("Both");
    catalog.add_interface(both, ints);
    catalog.add_interface(both, strings);

    let mut resolver = resolver(&catalog);
    assert_eq!(
        resolver.resolve_enumerable(both, false),
        Err(ResolutionError::AmbiguousEnumerableInterface {
            collection: both,
            interfaces: vec![ints, strings],
        })
    );
}

#[test]
fn test_extension_get_enumerator_is_configurable() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let global = catalog.well_known().global_namespace;
    let enumerator = add_enumerator(&mut catalog, "RangeEnumerator", int);
    let range = catalog.declare_struct("Range");
    let ext = catalog.declare_static_class("RangeExtensions", global);
    catalog.add_extension_method(
        ext,
        "GetEnumerator",
        vec![Parameter::value("range", range)],
        enumerator,
    );

    let mut resolver = resolver(&catalog);
    let info = resolver.resolve_enumerable(range, false).unwrap();
    assert_eq!(info.route, EnumerableRoute::Extension);

    let options = ResolverOptions {
        extension_get_enumerator: false,
        ..ResolverOptions::default()
    };
    let mut resolver = ProtocolResolver::new(&catalog, global_site(&catalog), options);
    assert_eq!(
        resolver.resolve_enumerable(range, false),
        Err(ResolutionError::NotEnumerable {
            collection: range,
            is_async: false
        })
    );
}

#[test]
fn test_ambiguous_pattern_falls_back_to_interface_with_warning() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let long = primitive(&catalog, PrimitiveType::Long);
    let enumerator = add_enumerator(&mut catalog, "WeirdEnumerator", int);
    let enumerable = catalog.generic_enumerable(int);
    let weird = catalog.declare_class("Weird");
    catalog.add_interface(weird, enumerable);
    catalog.add_instance_method(
        weird,
        "GetEnumerator",
        vec![Parameter::optional("a", int)],
        enumerator,
    );
    catalog.add_instance_method(
        weird,
        "GetEnumerator",
        vec![Parameter::optional("b", long)],
        enumerator,
    );

    let mut resolver = resolver(&catalog);
    let info = resolver.resolve_enumerable(weird, false).unwrap();
    assert_eq!(info.route, EnumerableRoute::Interface);
    let warnings = resolver.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].protocol, Protocol::GetEnumerator);
    assert!(resolver.take_warnings().is_empty());
}

#[test]
fn test_enumerator_missing_move_next_is_an_error() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let broken = catalog.declare_class("Broken");
    catalog.add_property(broken, "Current", int, true, false);
    let bag = catalog.declare_class("Bag");
    catalog.add_instance_method(bag, "GetEnumerator", vec![], broken);

    let mut resolver = resolver(&catalog);
    assert_eq!(
        resolver.resolve_enumerable(bag, false),
        Err(ResolutionError::EnumeratorMemberNotFound {
            enumerator: broken,
            member: Protocol::MoveNext
        })
    );
}

#[test]
fn test_async_enumerable_interface_route() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let stream = catalog.async_enumerable(int);
    let feed = catalog.declare_class("Feed");
    catalog.add_interface(feed, stream);

    let mut resolver = resolver(&catalog);
    let info = resolver.resolve_enumerable(feed, true).unwrap();
    assert!(info.is_async);
    assert_eq!(info.element_type, int);
    assert!(resolver.resolve_enumerable(feed, false).is_err());
}

#[test]
fn test_interface_disposal_preferred() {
    let mut catalog = TypeCatalog::new();
    let disposable = catalog.well_known().disposable;
    let void = catalog.well_known().void;
    let resource = catalog.declare_struct("Resource");
    catalog.add_interface(resource, disposable);
    catalog.add_instance_method(resource, "Dispose", vec![], void);
    let dispose = interface_method(&catalog, disposable, "Dispose");

    let mut resolver = resolver(&catalog);
    assert_eq!(
        resolver.resolve_dispose(resource, false, DisposeContext::Using),
        Ok(DisposeRoute::Interface { method: dispose })
    );
}

#[test]
fn test_value_type_pattern_disposal_prefers_fewer_defaults() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let void = catalog.well_known().void;
    let object = catalog.well_known().object;
    let object_array = catalog.array_of(object, 1);
    let handle = catalog.declare_struct("Handle");
    let plain = catalog.add_instance_method(handle, "Dispose", vec![], void);
    catalog.add_instance_method(
        handle,
        "Dispose",
        vec![Parameter::optional("flags", int)],
        void,
    );
    let variadic = catalog.declare_struct("Variadic");
    catalog.add_instance_method(
        variadic,
        "Dispose",
        vec![Parameter::params("args", object_array)],
        void,
    );

    let mut resolver = resolver(&catalog);
    match resolver.resolve_dispose(handle, false, DisposeContext::Using) {
        Ok(DisposeRoute::Pattern(candidate)) => assert_eq!(candidate.method, plain),
        other => panic!("expected a pattern route, found {other:?}"),
    }
    match resolver.resolve_dispose(variadic, false, DisposeContext::Using) {
        Ok(DisposeRoute::Pattern(candidate)) => {
            assert!(candidate.expanded);
            assert_eq!(candidate.synthesized_arguments(), 1);
        }
        other => panic!("expected a pattern route, found {other:?}"),
    }
}

#[test]
fn test_ref_like_extension_disposal() {
    let mut catalog = TypeCatalog::new();
    let void = catalog.well_known().void;
    let global = catalog.well_known().global_namespace;
    let span = catalog.declare_ref_struct("SpanOwner");
    let ext = catalog.declare_static_class("SpanExtensions", global);
    let dispose = catalog.add_extension_method(
        ext,
        "Dispose",
        vec![Parameter::value("owner", span)],
        void,
    );

    let mut resolver = resolver(&catalog);
    match resolver.resolve_dispose(span, false, DisposeContext::Using) {
        Ok(DisposeRoute::Extension(candidate)) => assert_eq!(candidate.method, dispose),
        other => panic!("expected an extension route, found {other:?}"),
    }

    let options = ResolverOptions {
        pattern_dispose_for_ref_like: false,
        ..ResolverOptions::default()
    };
    let mut resolver = ProtocolResolver::new(&catalog, global_site(&catalog), options);
    assert_eq!(
        resolver.resolve_dispose(span, false, DisposeContext::Using),
        Err(ResolutionError::NotDisposable {
            resource: span,
            is_async: false
        })
    );
}

#[test]
fn test_enumerator_disposal_stratification() {
    let mut catalog = TypeCatalog::new();
    let void = catalog.well_known().void;
    let disposable = catalog.well_known().disposable;
    let dispose = interface_method(&catalog, disposable, "Dispose");
    let open = catalog.declare_class("OpenEnumerator");
    let sealed = catalog.declare_sealed_class("SealedEnumerator");
    let sealed_with_pattern = catalog.declare_sealed_class("SealedPatternEnumerator");
    let pattern = catalog.add_instance_method(sealed_with_pattern, "Dispose", vec![], void);

    let mut resolver = resolver(&catalog);
    assert_eq!(
        resolver.resolve_dispose(open, false, DisposeContext::Enumerator),
        Ok(DisposeRoute::RuntimeCheck {
            interface: disposable,
            method: dispose
        })
    );
    assert_eq!(
        resolver.resolve_dispose(sealed, false, DisposeContext::Enumerator),
        Ok(DisposeRoute::None)
    );
    match resolver.resolve_dispose(sealed_with_pattern, false, DisposeContext::Enumerator) {
        Ok(DisposeRoute::Pattern(candidate)) => assert_eq!(candidate.method, pattern),
        other => panic!("expected a pattern route, found {other:?}"),
    }
    // Reference types in a using statement need the interface
    assert!(resolver
        .resolve_dispose(sealed_with_pattern, false, DisposeContext::Using)
        .is_err());
    assert!(resolver
        .resolve_dispose(open, false, DisposeContext::Using)
        .is_err());
}

#[test]
fn test_constrained_type_parameter_uses_interface() {
    let mut catalog = TypeCatalog::new();
    let disposable = catalog.well_known().disposable;
    let dispose = interface_method(&catalog, disposable, "Dispose");
    let t = catalog.declare_type_parameter(
        "T",
        TypeParamConstraints {
            value_type: true,
            interfaces: vec![disposable],
            ..TypeParamConstraints::default()
        },
    );

    let mut resolver = resolver(&catalog);
    assert_eq!(
        resolver.resolve_dispose(t, false, DisposeContext::Using),
        Ok(DisposeRoute::Interface { method: dispose })
    );
}

#[test]
fn test_async_disposal_uses_dispose_async() {
    let mut catalog = TypeCatalog::new();
    let async_disposable = catalog.well_known().async_disposable;
    let dispose_async = interface_method(&catalog, async_disposable, "DisposeAsync");
    let connection = catalog.declare_class("Connection");
    catalog.add_interface(connection, async_disposable);

    let mut resolver = resolver(&catalog);
    assert_eq!(
        resolver.resolve_dispose(connection, true, DisposeContext::Using),
        Ok(DisposeRoute::Interface {
            method: dispose_async
        })
    );
    assert!(resolver
        .resolve_dispose(connection, false, DisposeContext::Using)
        .is_err());
}

#[test]
fn test_lookup_levels_for_interfaces() {
    let mut catalog = TypeCatalog::new();
    let int = primitive(&catalog, PrimitiveType::Int);
    let enumerator = catalog.generic_enumerator(int);
    let levels = LookupLevels::compute(&catalog, enumerator);
    assert_eq!(
        levels.as_slice(),
        &[
            enumerator,
            catalog.well_known().enumerator,
            catalog.well_known().disposable
        ]
    );
}
