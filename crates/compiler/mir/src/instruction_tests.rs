use super::*;
use cinder_compiler_semantic::FieldId;

#[test]
fn test_call_destinations_include_out_arguments() {
    let instr = Instruction::call(
        None,
        MethodId::new(0),
        Some(Receiver::Address(Place::new(ValueId::new(0)))),
        vec![Argument::Out(ValueId::new(1)), Argument::Out(ValueId::new(2))],
    );

    assert_eq!(instr.destinations(), vec![ValueId::new(1), ValueId::new(2)]);
    assert_eq!(instr.destination(), None);
    assert_eq!(instr.used_values(), vec![ValueId::new(0)]);
    assert!(instr.validate().is_ok());
}

#[test]
fn test_call_writing_one_temp_twice_is_invalid() {
    let instr = Instruction::call(
        Some(ValueId::new(1)),
        MethodId::new(0),
        None,
        vec![Argument::Out(ValueId::new(1))],
    );
    assert!(instr.validate().is_err());
}

#[test]
fn test_store_uses_place_indices_and_value() {
    let place = Place::new(ValueId::new(0)).with_index(vec![Value::operand(ValueId::new(1))]);
    let instr = Instruction::store(place, Value::operand(ValueId::new(2)));

    assert!(instr.destinations().is_empty());
    assert_eq!(
        instr.used_values(),
        vec![ValueId::new(0), ValueId::new(1), ValueId::new(2)]
    );
    assert_eq!(instr.pretty_print(0), "store %0[%1], %2");
}

#[test]
fn test_store_without_projection_must_be_an_assign() {
    let local = Instruction::store(Place::new(ValueId::new(0)), Value::integer(1));
    assert!(local.validate().is_err());

    let static_field = Instruction::store(Place::static_field(FieldId::new(3)), Value::integer(1));
    assert!(static_field.validate().is_ok());
    assert_eq!(static_field.pretty_print(0), "store static f3, 1");
}

#[test]
fn test_dispose_is_the_only_cleanup_invoke() {
    let dispose = Instruction::dispose(
        None,
        Place::new(ValueId::new(4)),
        MethodId::new(7),
        DisposeMode::ConstrainedInterface,
        Vec::new(),
    );
    assert!(dispose.is_dispose());
    assert_eq!(dispose.pretty_print(0), "dispose constrained %4.m7()");

    let call = Instruction::call(None, MethodId::new(7), None, Vec::new());
    assert!(!call.is_dispose());
}

#[test]
fn test_pretty_print_call_forms() {
    let by_address = Instruction::call(
        None,
        MethodId::new(2),
        Some(Receiver::Address(Place::new(ValueId::new(0)))),
        vec![Argument::Out(ValueId::new(1))],
    );
    assert_eq!(by_address.pretty_print(0), "call &%0.m2(out %1)");

    let extension = Instruction::call(
        Some(ValueId::new(3)),
        MethodId::new(5),
        None,
        vec![Argument::Value(Value::operand(ValueId::new(0)))],
    );
    assert_eq!(extension.pretty_print(0), "%3 = call m5(%0)");
}

#[test]
fn test_pretty_print_loop_helpers() {
    let length = Instruction::array_length(ValueId::new(1), Value::operand(ValueId::new(0)));
    assert_eq!(length.pretty_print(0), "%1 = arraylen %0");

    let bound = Instruction::array_bound(
        ValueId::new(2),
        Value::operand(ValueId::new(0)),
        1,
        BoundKind::Upper,
    );
    assert_eq!(bound.pretty_print(0), "%2 = arraybound %0, 1, upper");

    let step = Instruction::binary_op(
        BinaryOp::Add,
        ValueId::new(3),
        Value::operand(ValueId::new(3)),
        Value::integer(1),
    );
    assert_eq!(step.pretty_print(0), "%3 = %3 + 1");
}

#[test]
fn test_comment_is_printed_above_instruction() {
    let instr = Instruction::assign(ValueId::new(0), Value::integer(1)).with_comment("seed");
    assert_eq!(instr.pretty_print(1), "// seed\n  %0 = 1");
}
