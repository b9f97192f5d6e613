use super::*;
use crate::{CleanupObligation, DisposeMode, NullGuard, RegionKind, Value};
use cinder_compiler_semantic::MethodId;

fn obligation(resource: ValueId) -> CleanupObligation {
    CleanupObligation {
        resource,
        resource_type: TypeId::new(1),
        method: MethodId::new(0),
        mode: DisposeMode::Interface,
        guard: NullGuard::NotNull,
        args: Vec::new(),
        is_async: false,
    }
}

#[test]
fn test_locals_and_temps_are_distinguished() {
    let mut function = MirFunction::new("f".to_string(), TypeId::new(0));
    let local = function.new_typed_value_id(ValueOrigin::Local(LocalId::new(0)), TypeId::new(2));
    function.locals.insert(LocalId::new(0), local);
    let temp = function.new_temp(TempKind::Component, TypeId::new(3));

    assert!(!function.is_temp(local));
    assert!(function.is_temp(temp));
    assert_eq!(function.lookup_local(LocalId::new(0)), Some(local));
    assert_eq!(function.get_value_type(temp), Some(TypeId::new(3)));
    assert_eq!(function.value_count(), 2);
}

#[test]
fn test_region_chain_runs_innermost_first() {
    let mut function = MirFunction::new("f".to_string(), TypeId::new(0));
    let resource = function.new_temp(TempKind::Resource, TypeId::new(1));
    let outer_entry = function.add_basic_block(None);
    let outer = function.regions.push(ProtectedRegion::new(
        RegionKind::Using,
        None,
        outer_entry,
        obligation(resource),
    ));
    let inner_entry = function.add_basic_block(Some(outer));
    let inner = function.regions.push(ProtectedRegion::new(
        RegionKind::ForEach,
        Some(outer),
        inner_entry,
        obligation(resource),
    ));

    assert_eq!(function.region_chain(Some(inner)), vec![inner, outer]);
    assert!(function.region_contains(Some(outer), Some(inner)));
    assert!(!function.region_contains(Some(inner), Some(outer)));
    assert!(function.region_contains(None, Some(inner)));
}

#[test]
fn test_handlers_count_as_reachable() {
    let mut function = MirFunction::new("f".to_string(), TypeId::new(0));
    let entry = function.entry_block;
    let resource = function.new_temp(TempKind::Resource, TypeId::new(1));
    let body = function.add_basic_block(None);
    let region = function.regions.push(ProtectedRegion::new(
        RegionKind::Using,
        None,
        body,
        obligation(resource),
    ));
    function.basic_blocks[body].region = Some(region);
    let exit = function.add_basic_block(None);
    let handler = function.add_basic_block(None);
    let orphan = function.add_basic_block(None);

    function.basic_blocks[entry].set_terminator(Terminator::enter(region, body));
    function.basic_blocks[body].set_terminator(Terminator::leave(exit));
    function.basic_blocks[exit].set_terminator(Terminator::return_value(Value::unit()));
    function.basic_blocks[handler].set_terminator(Terminator::end_handler(region));
    function.regions[region].handler_blocks = vec![handler];

    assert!(function.is_block_reachable(handler));
    assert_eq!(function.unreachable_blocks(), vec![orphan]);
    assert!(function.validate().is_ok());
}

#[test]
fn test_entry_inside_region_is_invalid() {
    let mut function = MirFunction::new("f".to_string(), TypeId::new(0));
    let resource = function.new_temp(TempKind::Resource, TypeId::new(1));
    let entry = function.entry_block;
    let region = function.regions.push(ProtectedRegion::new(
        RegionKind::Using,
        None,
        entry,
        obligation(resource),
    ));
    function.basic_blocks[entry].region = Some(region);

    let err = function.validate().unwrap_err();
    assert!(err.contains("lies inside a region"), "{err}");
}
