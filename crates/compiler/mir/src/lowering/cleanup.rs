//! # Guaranteed Cleanup
//!
//! The primitive shared by `using` and `foreach`: a protected region whose handler
//! performs one disposal. The body is entered with `enter`; every exit from it
//! (fallthrough, `break`, `continue`, `return`) is a `leave`, so the handler runs
//! exactly once whichever way control goes. Nested guards release innermost first.
//!
//! ```text
//! bb0: enter r0 -> bb1
//! bb1 in r0: ... leave -> bb2
//! bb3 (handler): notnull? dispose; endhandler r0
//! bb2: ...
//! ```

use cinder_compiler_semantic::types::TypeData;
use cinder_compiler_semantic::{Conversion, DisposeRoute, TypeId};

use crate::{
    CleanupObligation, DisposeMode, Instruction, LoweringError, NullGuard, Place,
    ProtectedRegion, RegionId, RegionKind, TempKind, Terminator, Value, ValueId,
};

use super::builder::MirBuilder;

const fn region_prefix(kind: RegionKind) -> &'static str {
    match kind {
        RegionKind::Using => "using",
        RegionKind::ForEach => "foreach",
    }
}

impl<'a> MirBuilder<'a> {
    /// Lowers `body` inside a protected region discharging `obligation` on exit
    ///
    /// The resource must already be captured; the region starts after acquisition,
    /// so a failing acquisition never runs this handler.
    pub fn with_guard<F>(
        &mut self,
        kind: RegionKind,
        obligation: CleanupObligation,
        body: F,
    ) -> Result<(), LoweringError>
    where
        F: FnOnce(&mut Self) -> Result<(), LoweringError>,
    {
        let prefix = region_prefix(kind);
        let parent = self.current_region();
        let entry = self
            .mir_function
            .add_basic_block_with_name(format!("{prefix}_body"), None);
        let region = self
            .mir_function
            .regions
            .push(ProtectedRegion::new(kind, parent, entry, obligation));
        self.mir_function.basic_blocks[entry].region = Some(region);
        let exit = self.new_block(&format!("{prefix}_exit"));
        log::debug!("opened {region:?} ({prefix}) under {parent:?}");

        self.cfg().terminate_with_enter(region, entry);
        self.switch_to(entry);
        self.region_stack.push(region);
        let result = body(self);
        if result.is_ok() && !self.is_terminated() {
            self.branch_to(exit);
        }
        self.region_stack.pop();
        result?;

        self.emit_handler(region);
        self.switch_to(exit);
        Ok(())
    }

    /// Builds the handler of a closed region in its parent region
    fn emit_handler(&mut self, region: RegionId) {
        let Some(def) = self.mir_function.region(region) else {
            return;
        };
        let parent = def.parent;
        let prefix = region_prefix(def.kind);
        let obligation = def.obligation.clone();
        let resource = obligation.resource;

        let handler = self
            .cfg()
            .new_block_in(&format!("{prefix}_handler"), parent);
        let mut blocks = vec![handler];
        self.switch_to(handler);

        let bool_ty = self.bool_type();
        let guarded = match obligation.guard {
            NullGuard::None => {
                self.emit_dispose(&obligation, Place::new(resource), obligation.mode);
                None
            }
            NullGuard::NotNull | NullGuard::HasValue => {
                let present = self.instr().null_check(Value::operand(resource), bool_ty);
                Some((present, resource))
            }
            NullGuard::RuntimeCheck { interface } => {
                let cast = self.instr().is_instance(Value::operand(resource), interface);
                let present = self.instr().null_check(Value::operand(cast), bool_ty);
                Some((present, cast))
            }
        };

        if let Some((present, target)) = guarded {
            let dispose = self.cfg().new_block_in(&format!("{prefix}_dispose"), parent);
            let done = self.cfg().new_block_in(&format!("{prefix}_done"), parent);
            self.terminate_with_branch(Value::operand(present), dispose, done);

            self.switch_to(dispose);
            let target = match obligation.guard {
                NullGuard::HasValue => self.unwrap_nullable(target, obligation.resource_type),
                _ => target,
            };
            self.emit_dispose(&obligation, Place::new(target), obligation.mode);
            self.cfg().terminate_with_jump(done);

            self.switch_to(done);
            blocks.extend([dispose, done]);
        }

        self.cfg().terminate(Terminator::end_handler(region));
        self.mir_function.regions[region].handler_blocks = blocks;
    }

    fn unwrap_nullable(&mut self, value: ValueId, nullable: TypeId) -> ValueId {
        let underlying = match self.catalog.ty(nullable) {
            TypeData::Nullable(underlying) => *underlying,
            _ => nullable,
        };
        self.instr().convert(
            Value::operand(value),
            Conversion::ExplicitNullable(Box::new(Conversion::Identity)),
            underlying,
        )
    }

    /// Emits the cleanup-invoke, awaiting it for async disposal
    fn emit_dispose(&mut self, obligation: &CleanupObligation, place: Place, mode: DisposeMode) {
        let dest = obligation.is_async.then(|| {
            let awaitable = self.catalog.method(obligation.method).return_type;
            self.mir_function.new_temp(TempKind::Scratch, awaitable)
        });
        self.instr().add_instruction(Instruction::dispose(
            dest,
            place,
            obligation.method,
            mode,
            obligation.args.clone(),
        ));
        if let Some(dest) = dest {
            self.instr().await_value(None, Value::operand(dest));
        }
    }

    /// Turns a disposal route into the obligation a region's handler discharges
    ///
    /// ## Returns
    /// `None` when there is nothing to release
    pub fn plan_disposal(
        &self,
        resource: ValueId,
        resource_type: TypeId,
        route: DisposeRoute,
        is_async: bool,
    ) -> Option<CleanupObligation> {
        let catalog = self.catalog;
        let nullable = catalog.is_nullable(resource_type);
        let pattern_guard = if nullable {
            NullGuard::HasValue
        } else if catalog.admits_null(resource_type) {
            NullGuard::NotNull
        } else {
            NullGuard::None
        };

        let (method, mode, guard, args) = match route {
            DisposeRoute::Interface { method } => {
                let constrained = nullable
                    || catalog.is_value_type(resource_type)
                    || matches!(catalog.ty(resource_type), TypeData::TypeParameter(_));
                let mode = if constrained {
                    DisposeMode::ConstrainedInterface
                } else {
                    DisposeMode::Interface
                };
                (method, mode, pattern_guard, Vec::new())
            }
            DisposeRoute::Pattern(candidate) => (
                candidate.method,
                DisposeMode::Pattern,
                pattern_guard,
                self.synthesized_arguments(&candidate),
            ),
            DisposeRoute::Extension(candidate) => (
                candidate.method,
                DisposeMode::Extension,
                pattern_guard,
                self.synthesized_arguments(&candidate),
            ),
            DisposeRoute::RuntimeCheck { interface, method } => (
                method,
                DisposeMode::Interface,
                NullGuard::RuntimeCheck { interface },
                Vec::new(),
            ),
            DisposeRoute::None => {
                log::debug!(
                    "{} needs no disposal",
                    catalog.format_type(resource_type)
                );
                return None;
            }
        };

        log::debug!(
            "disposing {} through {} ({guard:?})",
            catalog.format_type(resource_type),
            mode.name()
        );
        Some(CleanupObligation {
            resource,
            resource_type,
            method,
            mode,
            guard,
            args,
            is_async,
        })
    }
}
