//! # Scoped Resource Lowering
//!
//! `using (a = x, b = y) body` acquires `a`, opens a guard for it, acquires `b` inside
//! that guard, opens a second guard, then lowers the body. Handlers therefore run
//! in reverse acquisition order, and a resource whose acquisition throws is never
//! released. `using var` declarations do the same for the rest of their block.

use cinder_compiler_semantic::types::TypeData;
use cinder_compiler_semantic::{
    DisposeContext, Expr, LocalId, Statement, UsingDeclaration, UsingResource, UsingStatement,
    TypeId,
};

use crate::{CleanupObligation, LoweringError, RegionKind, TempKind, Value, ValueId};

use super::builder::MirBuilder;

/// One resource of a `using`, in acquisition order
#[derive(Debug, Clone, Copy)]
enum Acquisition<'e> {
    Declared { local: LocalId, init: &'e Expr },
    Expression(&'e Expr),
}

impl<'a> MirBuilder<'a> {
    /// Lowers a `using` or `await using` statement
    pub fn lower_using(&mut self, using: &UsingStatement) -> Result<(), LoweringError> {
        let resources: Vec<Acquisition<'_>> = using
            .resources
            .iter()
            .map(|resource| match resource {
                UsingResource::Declared { local, init } => Acquisition::Declared {
                    local: *local,
                    init,
                },
                UsingResource::Expression(expr) => Acquisition::Expression(expr),
            })
            .collect();

        self.guard_resources(&resources, using.is_async, |builder| {
            builder.lower_statement_checked(&using.body);
            Ok(())
        })
    }

    /// Lowers `using var` declarations guarding `rest`, the remainder of their block
    pub fn lower_using_declaration(
        &mut self,
        declaration: &UsingDeclaration,
        rest: &[Statement],
    ) -> Result<(), LoweringError> {
        let resources: Vec<Acquisition<'_>> = declaration
            .resources
            .iter()
            .map(|(local, init)| Acquisition::Declared {
                local: *local,
                init,
            })
            .collect();

        self.guard_resources(&resources, declaration.is_async, |builder| {
            builder.lower_block(rest);
            Ok(())
        })
    }

    /// Acquires the first resource, then lowers the others and `body` inside its guard
    fn guard_resources<F>(
        &mut self,
        resources: &[Acquisition<'_>],
        is_async: bool,
        body: F,
    ) -> Result<(), LoweringError>
    where
        F: FnOnce(&mut Self) -> Result<(), LoweringError>,
    {
        let Some((first, rest)) = resources.split_first() else {
            return body(self);
        };

        let (resource, ty) = self.acquire(*first)?;
        match self.plan_resource(resource, ty, is_async)? {
            Some(obligation) => self.with_guard(RegionKind::Using, obligation, |builder| {
                builder.guard_resources(rest, is_async, body)
            }),
            None => self.guard_resources(rest, is_async, body),
        }
    }

    /// Evaluates a resource into the value its handler will release
    ///
    /// The handler releases the value as acquired, so a mutable local is copied: a
    /// later assignment to it must not change what gets disposed.
    fn acquire(&mut self, acquisition: Acquisition<'_>) -> Result<(ValueId, TypeId), LoweringError> {
        match acquisition {
            Acquisition::Declared { local, init } => {
                let ty = self.bound.locals[local].ty;
                let value = self.lower_converted(init, ty)?;
                let dest = self.local_value(local);
                self.instr().assign_to(dest, value);
                if self.is_local_mutable(local) {
                    let copy = self
                        .instr()
                        .bind(TempKind::Resource, ty, Value::operand(dest));
                    return Ok((copy, ty));
                }
                Ok((dest, ty))
            }
            Acquisition::Expression(expr) => {
                if let Some(local) = expr.as_local() {
                    if !self.is_local_mutable(local) {
                        return Ok((self.local_value(local), expr.ty));
                    }
                }
                let value = self.lower_expression(expr)?;
                Ok((self.capture_value(value, TempKind::Resource, expr.ty), expr.ty))
            }
        }
    }

    /// Nullable resources are released through their underlying type
    fn plan_resource(
        &mut self,
        resource: ValueId,
        ty: TypeId,
        is_async: bool,
    ) -> Result<Option<CleanupObligation>, LoweringError> {
        let lookup = match self.catalog.ty(ty) {
            TypeData::Null => return Ok(None),
            TypeData::Nullable(underlying) => *underlying,
            _ => ty,
        };
        let route = self
            .resolver
            .resolve_dispose(lookup, is_async, DisposeContext::Using)?;
        Ok(self.plan_disposal(resource, ty, route, is_async))
    }
}
