//! # Statement Lowering
//!
//! This module contains the trait and implementations for lowering statements
//! from the bound tree to MIR instructions.
//!
//! Each statement is lowered against a checkpoint. A statement that fails is
//! rolled back completely, reported once at its span, and lowering resumes with
//! the next statement.

use cinder_compiler_semantic::{Expr, LocalId, Statement, StatementKind};

use crate::{LoweringError, StructuralError};

use super::builder::{LoopScope, MirBuilder};

/// Trait for lowering statements to MIR
pub trait LowerStmt {
    fn lower_statement(&mut self, stmt: &Statement) -> Result<(), LoweringError>;
}

impl<'a> LowerStmt for MirBuilder<'a> {
    /// Lowers a single statement into MIR instructions by dispatching to a helper for each statement
    /// type.
    fn lower_statement(&mut self, stmt: &Statement) -> Result<(), LoweringError> {
        match &stmt.kind {
            StatementKind::Expression(expr) => {
                self.lower_expression(expr)?;
                Ok(())
            }
            StatementKind::Local { local, init } => self.lower_local_statement(*local, init.as_ref()),
            StatementKind::Assign { target, value } => self.lower_assignment(target, value),
            StatementKind::Deconstruction { target, value } => {
                self.lower_deconstruction(target, value)
            }
            StatementKind::ForEach(foreach) => self.lower_foreach(foreach),
            StatementKind::Using(using) => self.lower_using(using),
            StatementKind::UsingDeclaration(declaration) => {
                self.lower_using_declaration(declaration, &[])
            }
            StatementKind::Block(statements) => {
                self.lower_block(statements);
                Ok(())
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.lower_if_statement(condition, then_branch, else_branch.as_deref()),
            StatementKind::Break => self.lower_break_statement(),
            StatementKind::Continue => self.lower_continue_statement(),
            StatementKind::Return(value) => self.lower_return_statement(value.as_ref()),
        }
    }
}

impl<'a> MirBuilder<'a> {
    /// Lowers a statement, turning a failure into a diagnostic
    ///
    /// ## Returns
    /// `true` if the statement lowered without error
    pub fn lower_statement_checked(&mut self, stmt: &Statement) -> bool {
        let checkpoint = self.checkpoint();
        let result = self.lower_statement(stmt);
        let warnings = self.resolver.take_warnings();
        for warning in warnings {
            log::warn!(
                "ambiguous '{}' on {}, using fallback",
                warning.protocol.member_name(),
                self.catalog.format_type(warning.receiver)
            );
            self.diagnostics
                .push(warning.to_diagnostic(self.catalog, stmt.span));
        }
        match result {
            Ok(()) => true,
            Err(error) => {
                log::debug!("rolling back statement at {:?}: {error}", stmt.span);
                self.rollback(checkpoint);
                self.diagnostics
                    .push(error.to_diagnostic(self.catalog, stmt.span));
                false
            }
        }
    }

    /// Lowers a statement list; a using declaration guards everything after it
    pub fn lower_block(&mut self, statements: &[Statement]) {
        for (index, stmt) in statements.iter().enumerate() {
            if self.is_terminated() {
                log::debug!("skipping {} unreachable statements", statements.len() - index);
                return;
            }
            if let StatementKind::UsingDeclaration(declaration) = &stmt.kind {
                let rest = &statements[index + 1..];
                let checkpoint = self.checkpoint();
                let result = self.lower_using_declaration(declaration, rest);
                if let Err(error) = result {
                    self.rollback(checkpoint);
                    self.diagnostics
                        .push(error.to_diagnostic(self.catalog, stmt.span));
                    self.lower_block(rest);
                }
                return;
            }
            self.lower_statement_checked(stmt);
        }
    }

    fn lower_local_statement(
        &mut self,
        local: LocalId,
        init: Option<&Expr>,
    ) -> Result<(), LoweringError> {
        let Some(init) = init else {
            return Ok(());
        };
        let ty = self.bound.locals[local].ty;
        let value = self.lower_converted(init, ty)?;
        let dest = self.local_value(local);
        self.instr().assign_to(dest, value);
        Ok(())
    }

    fn lower_if_statement(
        &mut self,
        condition: &Expr,
        then_branch: &Statement,
        else_branch: Option<&Statement>,
    ) -> Result<(), LoweringError> {
        let bool_ty = self.bool_type();
        let condition = self.lower_converted(condition, bool_ty)?;

        let (then_block, else_block, merge_block) = self.cfg().create_if_blocks();
        let else_target = if else_branch.is_some() {
            else_block
        } else {
            merge_block
        };
        self.terminate_with_branch(condition, then_block, else_target);

        self.switch_to(then_block);
        self.lower_statement_checked(then_branch);
        if !self.is_terminated() {
            self.branch_to(merge_block);
        }

        // Without an else branch the else block stays unreachable
        if let Some(else_branch) = else_branch {
            self.switch_to(else_block);
            self.lower_statement_checked(else_branch);
            if !self.is_terminated() {
                self.branch_to(merge_block);
            }
        }

        self.switch_to(merge_block);
        Ok(())
    }

    /// Lowers the body of a loop with `scope` as its `break`/`continue` targets
    pub(super) fn lower_loop_body(&mut self, body: &Statement, scope: LoopScope) {
        self.loop_stack.push(scope);
        self.lower_statement_checked(body);
        self.loop_stack.pop();
        if !self.is_terminated() {
            self.branch_to(scope.continue_target);
        }
    }

    fn lower_break_statement(&mut self) -> Result<(), LoweringError> {
        let scope = self
            .loop_stack
            .last()
            .copied()
            .ok_or(StructuralError::BreakOutsideLoop)?;
        // A leave when the loop lies outside the current region
        self.branch_to(scope.break_target);
        Ok(())
    }

    fn lower_continue_statement(&mut self) -> Result<(), LoweringError> {
        let scope = self
            .loop_stack
            .last()
            .copied()
            .ok_or(StructuralError::BreakOutsideLoop)?;
        self.branch_to(scope.continue_target);
        Ok(())
    }

    /// Lowers `return`
    ///
    /// Outside every region this is a plain return. Inside a region the value is
    /// stored in the return slot and control leaves to the shared return block, so
    /// the handlers of all enclosing regions run first.
    fn lower_return_statement(&mut self, value: Option<&Expr>) -> Result<(), LoweringError> {
        let return_type = self.bound.return_type;
        let value = match value {
            Some(expr) => Some(self.lower_converted(expr, return_type)?),
            None => None,
        };

        if self.current_region().is_none() {
            self.cfg().terminate_with_return(value);
            return Ok(());
        }

        let slot = self.return_slot();
        if let (Some(dest), Some(value)) = (slot.value, value) {
            self.instr().assign_to(dest, value);
        }
        self.branch_to(slot.block);
        Ok(())
    }
}
