//! Common test utilities for MIR lowering tests
//!
//! Functions are lowered from bound trees built with [`Fixture`], checked with the
//! `Validation` pass, and executed by the trace interpreter against a
//! [`ScriptedHost`] whose members behave as each test scripts them.

#![allow(dead_code)]

use std::collections::BTreeMap;

use cinder_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use cinder_compiler_mir::trace::{
    CallResult, Exception, Host, Outcome, TraceEvent, TraceInterpreter, TraceValue,
};
use cinder_compiler_mir::{
    lower_function, BasicBlock, DisposeMode, InstructionKind, LoweringConfig, MirFunction,
    Validation,
};
use cinder_compiler_semantic::{BoundFunction, FieldId, MethodId, TypeId};
use cinder_test_utils::Fixture;
use rustc_hash::FxHashMap;

/// What a scripted member does when called
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    Returns(TraceValue),
    /// Fills the `out` arguments in order
    Outs(Vec<TraceValue>),
    /// `GetEnumerator`: a fresh enumerator over the items
    Enumerate(Vec<TraceValue>),
    MoveNext,
    /// Getter of `Current`
    Current,
    Throws(&'static str),
    /// Returns `true` when the first argument equals the value
    Equals(TraceValue),
    /// Returns the first argument
    Echo,
}

#[derive(Debug, Clone, Default)]
struct Cursor {
    items: Vec<TraceValue>,
    position: usize,
}

/// Field of a value-type enumerator holding its cursor handle
pub fn handle_field() -> FieldId {
    FieldId::new(0)
}

/// Field of a value-type enumerator holding how far it has advanced
pub fn position_field() -> FieldId {
    FieldId::new(1)
}

/// A host whose members follow per-method scripts; unscripted members return unit
#[derive(Debug, Default)]
pub struct ScriptedHost {
    behaviors: FxHashMap<MethodId, Behavior>,
    cursors: Vec<Cursor>,
    /// Enumerators are handed out as values of this struct type instead of handles
    value_enumerator: Option<TypeId>,
    /// Answer to every runtime type test
    pub runtime_type_matches: bool,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, method: MethodId, behavior: Behavior) -> Self {
        self.behaviors.insert(method, behavior);
        self
    }

    pub const fn with_value_enumerator(mut self, ty: TypeId) -> Self {
        self.value_enumerator = Some(ty);
        self
    }

    pub const fn with_runtime_type(mut self, matches: bool) -> Self {
        self.runtime_type_matches = matches;
        self
    }

    /// Resolves the cursor behind an enumerator value, and where its position lives
    fn cursor_of(&self, this: &TraceValue) -> Result<(usize, Option<usize>), Exception> {
        match this {
            TraceValue::Int(handle) => Ok((as_index(*handle)?, None)),
            TraceValue::Struct { fields, .. } => {
                let handle = match fields.get(&handle_field()) {
                    Some(TraceValue::Int(handle)) => as_index(*handle)?,
                    _ => return Err(Exception::new("enumerator without a handle")),
                };
                let position = match fields.get(&position_field()) {
                    Some(TraceValue::Int(position)) => as_index(*position)?,
                    _ => 0,
                };
                Ok((handle, Some(position)))
            }
            _ => Err(Exception::new("not an enumerator")),
        }
    }

    fn enumerate(&mut self, items: Vec<TraceValue>) -> TraceValue {
        self.cursors.push(Cursor { items, position: 0 });
        let handle = to_int(self.cursors.len() - 1);
        match self.value_enumerator {
            Some(ty) => TraceValue::Struct {
                ty,
                fields: BTreeMap::from([
                    (handle_field(), TraceValue::Int(handle)),
                    (position_field(), TraceValue::Int(0)),
                ]),
            },
            None => TraceValue::Int(handle),
        }
    }

    fn move_next(&mut self, this: &mut TraceValue) -> Result<TraceValue, Exception> {
        let (handle, in_value) = self.cursor_of(this)?;
        let cursor = self
            .cursors
            .get_mut(handle)
            .ok_or_else(|| Exception::new("unknown enumerator"))?;
        let position = in_value.unwrap_or(cursor.position);
        if position >= cursor.items.len() {
            return Ok(TraceValue::Bool(false));
        }
        match this {
            TraceValue::Struct { fields, .. } => {
                fields.insert(position_field(), TraceValue::Int(to_int(position + 1)));
            }
            _ => cursor.position = position + 1,
        }
        Ok(TraceValue::Bool(true))
    }

    fn current(&self, this: &TraceValue) -> Result<TraceValue, Exception> {
        let (handle, in_value) = self.cursor_of(this)?;
        let cursor = self
            .cursors
            .get(handle)
            .ok_or_else(|| Exception::new("unknown enumerator"))?;
        let position = in_value.unwrap_or(cursor.position);
        position
            .checked_sub(1)
            .and_then(|index| cursor.items.get(index))
            .cloned()
            .ok_or_else(|| Exception::new("InvalidOperationException"))
    }
}

fn as_index(value: i64) -> Result<usize, Exception> {
    usize::try_from(value).map_err(|_| Exception::new("negative handle"))
}

fn to_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl Host for ScriptedHost {
    fn call(
        &mut self,
        method: MethodId,
        this: Option<&mut TraceValue>,
        args: &[TraceValue],
    ) -> Result<CallResult, Exception> {
        let Some(behavior) = self.behaviors.get(&method).cloned() else {
            return Ok(CallResult::unit());
        };
        match behavior {
            Behavior::Returns(value) => Ok(CallResult::value(value)),
            Behavior::Outs(values) => Ok(CallResult::outs(values)),
            Behavior::Enumerate(items) => Ok(CallResult::value(self.enumerate(items))),
            Behavior::MoveNext => {
                let this = this.ok_or_else(|| Exception::new("MoveNext without receiver"))?;
                Ok(CallResult::value(self.move_next(this)?))
            }
            Behavior::Current => {
                let this = this.ok_or_else(|| Exception::new("Current without receiver"))?;
                Ok(CallResult::value(self.current(this)?))
            }
            Behavior::Throws(message) => Err(Exception::new(message)),
            Behavior::Equals(expected) => Ok(CallResult::value(TraceValue::Bool(
                args.first() == Some(&expected),
            ))),
            Behavior::Echo => Ok(CallResult::value(
                args.first().cloned().unwrap_or(TraceValue::Unit),
            )),
        }
    }

    fn is_instance(&mut self, _value: &TraceValue, _ty: TypeId) -> bool {
        self.runtime_type_matches
    }
}

// ==================== Lowering ====================

/// Lowers `function`, returning the result with every diagnostic
pub fn lower_with_diagnostics(
    fixture: &Fixture,
    function: &BoundFunction,
) -> (MirFunction, Vec<Diagnostic>) {
    cinder_test_utils::init_logging();
    lower_function(&fixture.catalog, function, &LoweringConfig::default())
}

/// Lowers `function`, which must lower cleanly into valid MIR
pub fn lower(fixture: &Fixture, function: &BoundFunction) -> MirFunction {
    let (mir, diagnostics) = lower_with_diagnostics(fixture, function);
    assert!(
        diagnostics.is_empty(),
        "unexpected diagnostics: {diagnostics:?}"
    );
    if let Err(err) = Validation::new().validate(&mir) {
        panic!("invalid MIR: {err}\n{}", pretty(&mir));
    }
    mir
}

/// Lowers `function` expecting exactly one diagnostic, with `code`
pub fn lower_expecting(
    fixture: &Fixture,
    function: &BoundFunction,
    code: DiagnosticCode,
) -> MirFunction {
    let (mir, diagnostics) = lower_with_diagnostics(fixture, function);
    assert_eq!(
        diagnostics.iter().map(|d| d.code).collect::<Vec<_>>(),
        vec![code],
        "{diagnostics:?}"
    );
    mir
}

pub fn pretty(function: &MirFunction) -> String {
    use cinder_compiler_mir::PrettyPrint;
    function.pretty_print(0)
}

// ==================== Inspection ====================

/// Every instruction of the function, block by block
pub fn instructions(function: &MirFunction) -> Vec<&InstructionKind> {
    function
        .basic_blocks()
        .flat_map(|(_, block)| block.instructions.iter().map(|instruction| &instruction.kind))
        .collect()
}

pub fn entry_instructions(function: &MirFunction) -> Vec<&InstructionKind> {
    function.basic_blocks[function.entry_block]
        .instructions
        .iter()
        .map(|instruction| &instruction.kind)
        .collect()
}

/// The blocks of every region handler
pub fn handler_blocks(function: &MirFunction) -> Vec<&BasicBlock> {
    function
        .regions
        .iter()
        .flat_map(|region| region.handler_blocks.iter())
        .map(|block| &function.basic_blocks[*block])
        .collect()
}

/// Disposal instructions anywhere in the function, with their modes
pub fn dispose_modes(function: &MirFunction) -> Vec<DisposeMode> {
    instructions(function)
        .into_iter()
        .filter_map(|kind| match kind {
            InstructionKind::Dispose { mode, .. } => Some(*mode),
            _ => None,
        })
        .collect()
}

pub fn count_instructions<F>(function: &MirFunction, predicate: F) -> usize
where
    F: Fn(&InstructionKind) -> bool,
{
    instructions(function)
        .into_iter()
        .filter(|kind| predicate(kind))
        .count()
}

// ==================== Execution ====================

/// Runs `function` with `args` and returns how it ended with its trace
pub fn run(
    function: &MirFunction,
    host: ScriptedHost,
    args: Vec<TraceValue>,
) -> (Outcome, Vec<TraceEvent>) {
    let mut interpreter = TraceInterpreter::new(function, host);
    let outcome = interpreter
        .run(args)
        .unwrap_or_else(|err| panic!("trace failed: {err}\n{}", pretty(function)));
    let (_, events) = interpreter.into_parts();
    (outcome, events)
}

/// The resources of every disposal, in order
pub fn disposed(events: &[TraceEvent]) -> Vec<TraceValue> {
    events
        .iter()
        .filter_map(|event| match event {
            TraceEvent::Dispose { resource, .. } => Some(resource.clone()),
            _ => None,
        })
        .collect()
}

/// The arguments of every call to `method`, in order
pub fn calls_to(events: &[TraceEvent], method: MethodId) -> Vec<Vec<TraceValue>> {
    events
        .iter()
        .filter_map(|event| match event {
            TraceEvent::Call {
                method: called,
                args,
                ..
            } if *called == method => Some(args.clone()),
            _ => None,
        })
        .collect()
}

/// Position of the first event matching `predicate`
pub fn position<F>(events: &[TraceEvent], predicate: F) -> usize
where
    F: Fn(&TraceEvent) -> bool,
{
    events
        .iter()
        .position(predicate)
        .unwrap_or_else(|| panic!("no matching event in {events:#?}"))
}
