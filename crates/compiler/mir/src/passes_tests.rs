use super::*;
use crate::{
    CleanupObligation, DisposeMode, Instruction, NullGuard, Place, PrettyPrint, ProtectedRegion,
    RegionId, RegionKind, TempKind,
};
use cinder_compiler_semantic::{MethodId, TypeId};

fn dispose_method() -> MethodId {
    MethodId::new(4)
}

/// `enter r0 -> body; body: leave -> exit; handler: dispose; endhandler r0`
fn guarded_function() -> (MirFunction, RegionId) {
    let mut function = MirFunction::new("guarded".to_string(), TypeId::new(0));
    let entry = function.entry_block;
    let resource = function.new_temp(TempKind::Resource, TypeId::new(1));

    let body = function.add_basic_block(None);
    let region = function.regions.push(ProtectedRegion::new(
        RegionKind::Using,
        None,
        body,
        CleanupObligation {
            resource,
            resource_type: TypeId::new(1),
            method: dispose_method(),
            mode: DisposeMode::Interface,
            guard: NullGuard::None,
            args: Vec::new(),
            is_async: false,
        },
    ));
    function.basic_blocks[body].region = Some(region);
    let exit = function.add_basic_block(None);
    let handler = function.add_basic_block(None);

    function.basic_blocks[entry].set_terminator(Terminator::enter(region, body));
    function.basic_blocks[body].set_terminator(Terminator::leave(exit));
    function.basic_blocks[exit].set_terminator(Terminator::return_void());
    function.basic_blocks[handler].push_instruction(Instruction::dispose(
        None,
        Place::new(resource),
        dispose_method(),
        DisposeMode::Interface,
        Vec::new(),
    ));
    function.basic_blocks[handler].set_terminator(Terminator::end_handler(region));
    function.regions[region].handler_blocks = vec![handler];

    (function, region)
}

#[test]
fn test_guarded_function_is_valid() {
    let (function, _) = guarded_function();
    assert_eq!(Validation::new().validate(&function), Ok(()));
}

#[test]
fn test_guarded_function_pretty_print() {
    let (function, _) = guarded_function();
    insta::assert_snapshot!(function.pretty_print(0), @r"
    fn guarded {
      entry: bb0
      r0 using: entry bb1, handler bb3, disposes %0

      bb0 (entry):
        enter r0 -> bb1

      bb1 in r0:
        leave -> bb2

      bb2:
        return

      bb3:
        dispose interface %0.m4()
        endhandler r0

    }
    ");
}

#[test]
fn test_jump_out_of_region_is_rejected() {
    let (mut function, region) = guarded_function();
    let body = function.regions[region].entry;
    let exit = BasicBlockId::new(2);
    function.basic_blocks[body].set_terminator(Terminator::jump(exit));

    let err = Validation::new().validate(&function).unwrap_err();
    assert!(err.contains("crosses a region boundary"), "{err}");
}

#[test]
fn test_return_inside_region_is_rejected() {
    let (mut function, region) = guarded_function();
    let body = function.regions[region].entry;
    function.basic_blocks[body].set_terminator(Terminator::return_void());

    let err = Validation::new().validate(&function).unwrap_err();
    assert!(err.contains("return from inside"), "{err}");
}

#[test]
fn test_leave_within_the_same_region_is_rejected() {
    let (mut function, region) = guarded_function();
    let body = function.regions[region].entry;
    let inner = function.add_basic_block(Some(region));
    function.basic_blocks[inner].set_terminator(Terminator::leave(BasicBlockId::new(2)));
    function.basic_blocks[body].set_terminator(Terminator::leave(inner));

    let err = Validation::new().validate(&function).unwrap_err();
    assert!(err.contains("exits no region"), "{err}");
}

#[test]
fn test_handler_disposing_twice_is_rejected() {
    let (mut function, region) = guarded_function();
    let handler = function.regions[region].handler_blocks[0];
    let duplicate = function.basic_blocks[handler].instructions[0].clone();
    function.basic_blocks[handler].push_instruction(duplicate);

    let err = Validation::new().validate(&function).unwrap_err();
    assert!(err.contains("disposes 2 times"), "{err}");
}

#[test]
fn test_handler_with_wrong_method_is_rejected() {
    let (mut function, region) = guarded_function();
    function.regions[region].obligation.method = MethodId::new(9);

    let err = Validation::new().validate(&function).unwrap_err();
    assert!(err.contains("wrong method"), "{err}");
}

#[test]
fn test_dispose_outside_handler_is_rejected() {
    let (mut function, _) = guarded_function();
    let entry = function.entry_block;
    let resource = function.new_temp(TempKind::Resource, TypeId::new(1));
    function.basic_blocks[entry].push_instruction(Instruction::dispose(
        None,
        Place::new(resource),
        dispose_method(),
        DisposeMode::Pattern,
        Vec::new(),
    ));

    let err = Validation::new().validate(&function).unwrap_err();
    assert!(err.contains("outside a handler"), "{err}");
}

#[test]
fn test_region_without_handler_is_rejected() {
    let (mut function, region) = guarded_function();
    let handler = function.regions[region].handler_blocks[0];
    function.basic_blocks[handler].set_terminator(Terminator::return_void());
    function.regions[region].handler_blocks.clear();

    let err = Validation::new().validate(&function).unwrap_err();
    assert!(err.contains("has no handler"), "{err}");
}

#[test]
fn test_pass_manager_never_modifies_through_validation() {
    let (mut function, _) = guarded_function();
    let before = function.clone();
    let modified = PassManager::standard_pipeline().run(&mut function);
    assert!(!modified);
    assert_eq!(function, before);
}
