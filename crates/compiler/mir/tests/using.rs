//! Scoped resource lowering: acquisition order, release order, guards and the
//! resources that never get a region.

mod common;

use std::collections::BTreeMap;

use cinder_compiler_diagnostics::DiagnosticCode;
use cinder_compiler_mir::trace::{Exception, Outcome, TraceEvent, TraceValue};
use cinder_compiler_mir::{DisposeMode, InstructionKind, NullGuard, RegionId, RegionKind};
use cinder_compiler_semantic::{
    Binding, BoundFunction, Expr, Statement, StatementKind, TypeId, TypeParamConstraints, UsingDeclaration,
    UsingResource, UsingStatement,
};
use cinder_test_utils::Fixture;
use common::*;

fn using(resources: Vec<UsingResource>, body: Statement) -> Statement {
    Statement::using(UsingStatement {
        resources,
        body,
        is_async: false,
    })
}

#[test]
fn test_pattern_dispose_on_struct_without_interface() {
    let mut fixture = Fixture::new();
    let void = fixture.void;
    let handle = fixture.catalog.declare_struct("Handle");
    let dispose = fixture
        .catalog
        .add_instance_method(handle, "Dispose", Vec::new(), void);
    let sink = fixture.static_method("Sink", &[], void);

    let mut function = fixture.function("main", void);
    let h = function.declare_readonly_local("h", handle);
    function.body = vec![using(
        vec![UsingResource::Declared {
            local: h,
            init: Expr::new_object(handle, Vec::new()),
        }],
        Statement::expression(fixture.call(sink, Vec::new())),
    )];

    let mir = lower(&fixture, &function);
    assert_eq!(mir.regions.len(), 1);
    let region = &mir.regions[RegionId::new(0)];
    assert_eq!(region.kind, RegionKind::Using);
    assert_eq!(region.obligation.method, dispose);
    assert_eq!(region.obligation.mode, DisposeMode::Pattern);
    assert_eq!(region.obligation.guard, NullGuard::None);

    // No null test guards the call
    let handler = handler_blocks(&mir);
    assert_eq!(handler.len(), 1);
    assert!(matches!(
        handler[0].instructions.as_slice(),
        [instruction] if matches!(instruction.kind, InstructionKind::Dispose { .. })
    ));

    let (outcome, events) = run(&mir, ScriptedHost::new(), Vec::new());
    assert_eq!(outcome, Outcome::Returned(None));
    assert_eq!(disposed(&events).len(), 1);
    let sunk = position(&events, |event| {
        matches!(event, TraceEvent::Call { method, .. } if *method == sink)
    });
    assert!(sunk < position(&events, TraceEvent::is_dispose));
}

#[test]
fn test_failed_second_acquisition_releases_only_the_first() {
    let mut fixture = Fixture::new();
    let void = fixture.void;
    let a_ty = fixture.resource("A", false).ty;
    let b_ty = fixture.resource("B", false).ty;
    let open_a = fixture.static_method("OpenA", &[], a_ty);
    let open_b = fixture.static_method("OpenB", &[], b_ty);
    let sink = fixture.static_method("Sink", &[], void);

    let mut function = fixture.function("main", void);
    let a = function.declare_readonly_local("a", a_ty);
    let b = function.declare_readonly_local("b", b_ty);
    function.body = vec![using(
        vec![
            UsingResource::Declared {
                local: a,
                init: fixture.call(open_a, Vec::new()),
            },
            UsingResource::Declared {
                local: b,
                init: fixture.call(open_b, Vec::new()),
            },
        ],
        Statement::expression(fixture.call(sink, Vec::new())),
    )];

    let mir = lower(&fixture, &function);
    assert_eq!(mir.regions.len(), 2);
    let inner = &mir.regions[RegionId::new(1)];
    assert_eq!(inner.parent, Some(RegionId::new(0)));

    let host = ScriptedHost::new()
        .on(open_a, Behavior::Returns(TraceValue::Int(10)))
        .on(open_b, Behavior::Throws("boom"));
    let (outcome, events) = run(&mir, host, Vec::new());
    assert_eq!(outcome, Outcome::Threw(Exception::new("boom")));
    assert!(calls_to(&events, sink).is_empty());
    assert_eq!(disposed(&events), vec![TraceValue::Int(10)]);
}

#[test]
fn test_resources_are_released_in_reverse_order() {
    let mut fixture = Fixture::new();
    let (int, void) = (fixture.int, fixture.void);
    let ty = fixture.resource("File", false).ty;
    let open = fixture.static_method("Open", &[int], ty);
    let sink = fixture.static_method("Sink", &[], void);

    let mut function = fixture.function("main", void);
    let locals: Vec<_> = ["first", "second", "third"]
        .into_iter()
        .map(|name| function.declare_readonly_local(name, ty))
        .collect();
    let resources = locals
        .iter()
        .zip(1..)
        .map(|(local, n)| UsingResource::Declared {
            local: *local,
            init: fixture.call(open, vec![fixture.int_literal(n)]),
        })
        .collect();
    function.body = vec![using(
        resources,
        Statement::expression(fixture.call(sink, Vec::new())),
    )];

    let mir = lower(&fixture, &function);
    assert_eq!(mir.regions.len(), 3);

    let host = ScriptedHost::new().on(open, Behavior::Echo);
    let (outcome, events) = run(&mir, host, Vec::new());
    assert_eq!(outcome, Outcome::Returned(None));
    assert_eq!(
        disposed(&events),
        vec![TraceValue::Int(3), TraceValue::Int(2), TraceValue::Int(1)]
    );
    assert!(position(&events, TraceEvent::is_dispose) > position(&events, |event| {
        matches!(event, TraceEvent::Call { method, .. } if *method == sink)
    }));
}

#[test]
fn test_null_literal_resource_gets_no_region() {
    let mut fixture = Fixture::new();
    let void = fixture.void;
    let sink = fixture.static_method("Sink", &[], void);

    let mut function = fixture.function("main", void);
    function.body = vec![using(
        vec![UsingResource::Expression(Expr::null(&fixture.catalog))],
        Statement::expression(fixture.call(sink, Vec::new())),
    )];

    let mir = lower(&fixture, &function);
    assert!(mir.regions.is_empty());
    assert!(dispose_modes(&mir).is_empty());

    let (_, events) = run(&mir, ScriptedHost::new(), Vec::new());
    assert_eq!(calls_to(&events, sink).len(), 1);
}

#[test]
fn test_nullable_struct_resource_is_released_only_when_present() {
    let mut fixture = Fixture::new();
    let void = fixture.void;
    let resource = fixture.resource("Lease", true);
    let nullable = fixture.catalog.nullable_of(resource.ty);

    let mut function = fixture.function("main", void);
    let lease = function.declare_param("lease", nullable);
    function.body = vec![using(
        vec![UsingResource::Expression(function.local_expr(lease))],
        Statement::block(Vec::new()),
    )];

    let mir = lower(&fixture, &function);
    let region = &mir.regions[RegionId::new(0)];
    assert_eq!(region.obligation.guard, NullGuard::HasValue);
    assert_eq!(region.obligation.mode, DisposeMode::ConstrainedInterface);

    let (_, events) = run(&mir, ScriptedHost::new(), vec![TraceValue::Null]);
    assert!(disposed(&events).is_empty());

    let present = TraceValue::Struct {
        ty: resource.ty,
        fields: BTreeMap::new(),
    };
    let (_, events) = run(&mir, ScriptedHost::new(), vec![present.clone()]);
    assert_eq!(disposed(&events), vec![present]);
}

#[test]
fn test_using_declaration_is_released_on_return() {
    let mut fixture = Fixture::new();
    let (int, void) = (fixture.int, fixture.void);
    let ty = fixture.resource("Scope", false).ty;
    let open = fixture.static_method("Open", &[], ty);
    let sink = fixture.static_method("Sink", &[], void);

    let mut function = fixture.function("main", int);
    let scope = function.declare_readonly_local("scope", ty);
    function.body = vec![
        Statement::new(StatementKind::UsingDeclaration(UsingDeclaration {
            resources: vec![(scope, fixture.call(open, Vec::new()))],
            is_async: false,
        })),
        Statement::expression(fixture.call(sink, Vec::new())),
        Statement::new(StatementKind::Return(Some(fixture.int_literal(7)))),
    ];

    let mir = lower(&fixture, &function);
    assert_eq!(mir.regions.len(), 1);

    let host = ScriptedHost::new().on(open, Behavior::Returns(TraceValue::Int(1)));
    let (outcome, events) = run(&mir, host, Vec::new());
    assert_eq!(outcome, Outcome::Returned(Some(TraceValue::Int(7))));
    assert_eq!(disposed(&events), vec![TraceValue::Int(1)]);
}

#[test]
fn test_await_using_awaits_the_disposal() {
    let mut fixture = Fixture::new();
    let void = fixture.void;
    let connection = fixture.catalog.declare_sealed_class("Connection");
    let async_disposable = fixture.well_known().async_disposable;
    fixture.catalog.add_interface(connection, async_disposable);
    let open = fixture.static_method("Open", &[], connection);

    let mut function = fixture.function("main", void);
    let c = function.declare_readonly_local("c", connection);
    function.body = vec![Statement::using(UsingStatement {
        resources: vec![UsingResource::Declared {
            local: c,
            init: fixture.call(open, Vec::new()),
        }],
        body: Statement::block(Vec::new()),
        is_async: true,
    })];

    let mir = lower(&fixture, &function);
    let region = &mir.regions[RegionId::new(0)];
    assert!(region.obligation.is_async);
    assert_eq!(region.obligation.method, fixture.dispose_async_method());

    let host = ScriptedHost::new().on(open, Behavior::Returns(TraceValue::Int(5)));
    let (_, events) = run(&mir, host, Vec::new());
    let dispose = position(&events, TraceEvent::is_dispose);
    assert_eq!(events.get(dispose + 1), Some(&TraceEvent::Await));
}

/// `T : IDisposable` with the given extra constraints
fn disposable_type_parameter(fixture: &mut Fixture, value_type: bool, reference_type: bool) -> TypeId {
    let disposable = fixture.well_known().disposable;
    fixture.catalog.declare_type_parameter(
        "T",
        TypeParamConstraints {
            value_type,
            reference_type,
            interfaces: vec![disposable],
        },
    )
}

/// `using (resource) { }` over a parameter of type `ty`
fn using_parameter(fixture: &Fixture, ty: TypeId) -> BoundFunction {
    let mut function = fixture.function("main", fixture.void);
    let resource = function.declare_param("resource", ty);
    function.body = vec![using(
        vec![UsingResource::Expression(function.local_expr(resource))],
        Statement::block(Vec::new()),
    )];
    function
}

#[test]
fn test_value_constrained_type_parameter_is_released_without_null_check() {
    let mut fixture = Fixture::new();
    let t = disposable_type_parameter(&mut fixture, true, false);
    let function = using_parameter(&fixture, t);

    let mir = lower(&fixture, &function);
    let region = &mir.regions[RegionId::new(0)];
    assert_eq!(region.obligation.method, fixture.dispose_method());
    assert_eq!(region.obligation.mode, DisposeMode::ConstrainedInterface);
    assert_eq!(region.obligation.guard, NullGuard::None);
    for block in handler_blocks(&mir) {
        assert!(block
            .instructions
            .iter()
            .all(|instruction| !matches!(instruction.kind, InstructionKind::NullCheck { .. })));
    }

    let (_, events) = run(&mir, ScriptedHost::new(), vec![TraceValue::Int(3)]);
    assert_eq!(disposed(&events), vec![TraceValue::Int(3)]);
}

#[test]
fn test_unconstrained_and_reference_type_parameters_are_null_checked() {
    for reference_type in [false, true] {
        let mut fixture = Fixture::new();
        let t = disposable_type_parameter(&mut fixture, false, reference_type);
        let function = using_parameter(&fixture, t);

        let mir = lower(&fixture, &function);
        let region = &mir.regions[RegionId::new(0)];
        assert_eq!(region.obligation.mode, DisposeMode::ConstrainedInterface);
        assert_eq!(region.obligation.guard, NullGuard::NotNull);

        let (outcome, events) = run(&mir, ScriptedHost::new(), vec![TraceValue::Null]);
        assert_eq!(outcome, Outcome::Returned(None));
        assert!(disposed(&events).is_empty());

        let (_, events) = run(&mir, ScriptedHost::new(), vec![TraceValue::Int(4)]);
        assert_eq!(disposed(&events), vec![TraceValue::Int(4)]);
    }
}

#[test]
fn test_resource_without_dispose_is_rejected() {
    let mut fixture = Fixture::new();
    let void = fixture.void;
    let plain = fixture.catalog.declare_class("Plain");

    let mut function = fixture.function("main", void);
    let p = function.declare_param("p", plain);
    function.body = vec![using(
        vec![UsingResource::Expression(function.local_expr(p))],
        Statement::block(Vec::new()),
    )];

    let mir = lower_expecting(&fixture, &function, DiagnosticCode::NotDisposable);
    assert!(mir.regions.is_empty());
    assert!(instructions(&mir).is_empty());
}

#[test]
fn test_reassigned_local_still_releases_the_acquired_value() {
    let mut fixture = Fixture::new();
    let (int, void) = (fixture.int, fixture.void);
    let ty = fixture.resource("File", false).ty;
    let open = fixture.static_method("Open", &[int], ty);

    let mut function = fixture.function("main", void);
    let file = function.declare_local("file", ty);
    let reassign = Statement::new(StatementKind::Assign {
        target: Binding::local(file, ty),
        value: fixture.call(open, vec![fixture.int_literal(2)]),
    });
    function.body = vec![
        Statement::new(StatementKind::Local {
            local: file,
            init: Some(fixture.call(open, vec![fixture.int_literal(1)])),
        }),
        using(
            vec![UsingResource::Expression(function.local_expr(file))],
            reassign,
        ),
    ];

    let mir = lower(&fixture, &function);
    let host = ScriptedHost::new().on(open, Behavior::Echo);
    let (_, events) = run(&mir, host, Vec::new());
    assert_eq!(calls_to(&events, open).len(), 2);
    assert_eq!(disposed(&events), vec![TraceValue::Int(1)]);
}

#[test]
fn test_using_over_existing_local_pretty_print() {
    let mut fixture = Fixture::new();
    let void = fixture.void;
    let resource = fixture.resource("Res", false);

    let mut function = fixture.function("main", void);
    let r = function.declare_readonly_local("r", resource.ty);
    function.body = vec![using(
        vec![UsingResource::Expression(function.local_expr(r))],
        Statement::block(Vec::new()),
    )];

    let mir = lower(&fixture, &function);
    let text = pretty(&mir).replace(
        &format!(".m{}(", resource.dispose.index()),
        ".Dispose(",
    );
    insta::assert_snapshot!(text, @r"
    fn main {
      entry: bb0
      r0 using: entry bb1, handler bb3, disposes %0

      bb0 (entry):
        enter r0 -> bb1

      bb1 (using_body) in r0:
        leave -> bb2

      bb2 (using_exit):
        return

      bb3 (using_handler):
        %1 = notnull %0
        if %1 then jump bb4 else jump bb5

      bb4 (using_dispose):
        dispose interface %0.Dispose()
        jump bb5

      bb5 (using_done):
        endhandler r0

    }
    ");
}
