//! Module-level lowering: every function is lowered, and any error fails the module.

use cinder_compiler_diagnostics::DiagnosticCode;
use cinder_compiler_mir::{generate_mir, LoweringConfig};
use cinder_compiler_semantic::{BoundFunction, Statement, StatementKind};
use cinder_test_utils::Fixture;

fn empty(fixture: &Fixture, name: &str) -> BoundFunction {
    fixture.function(name, fixture.void)
}

#[test]
fn test_clean_functions_form_one_module() {
    cinder_test_utils::init_logging();
    let fixture = Fixture::new();
    let functions = vec![empty(&fixture, "first"), empty(&fixture, "second")];

    let module = generate_mir(&fixture.catalog, &functions, &LoweringConfig::default())
        .unwrap_or_else(|diagnostics| panic!("unexpected diagnostics: {diagnostics:?}"));
    assert_eq!(module.function_count(), 2);
    assert!(module.function_named("second").is_some());
    assert_eq!(module.validate(), Ok(()));
}

#[test]
fn test_error_in_one_function_fails_the_module() {
    cinder_test_utils::init_logging();
    let fixture = Fixture::new();
    let mut broken = empty(&fixture, "broken");
    broken.body = vec![Statement::new(StatementKind::Break)];
    let functions = vec![empty(&fixture, "clean"), broken];

    let Err(diagnostics) = generate_mir(&fixture.catalog, &functions, &LoweringConfig::default())
    else {
        panic!("a break outside a loop must fail the module");
    };
    assert!(diagnostics.has_errors());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.errors()[0].code, DiagnosticCode::BreakOutsideLoop);
    assert_eq!(diagnostics.summary(), "1 errors, 0 warnings");
}
