//! # MIR Terminators
//!
//! This module defines terminators, which end basic blocks and transfer control flow.
//! Every basic block must end with exactly one terminator.

use crate::{BasicBlockId, PrettyPrint, RegionId, Value, ValueId};

/// A terminator ends a basic block and transfers control
///
/// Every basic block MUST end with exactly one terminator.
/// Terminators are the only instructions that can change control flow.
///
/// # Design Notes
///
/// - `Jump`, `If` and `Return` never leave a protected region; `Leave` does
/// - `Enter` is the only way into a protected region
/// - A region's handler ends in `EndHandler`, which resumes whatever exit
///   (leave, exception) caused the handler to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional jump: `jump target`
    Jump { target: BasicBlockId },

    /// Conditional branch: `if condition then jump then_target else jump else_target`
    If {
        condition: Value,
        then_target: BasicBlockId,
        else_target: BasicBlockId,
    },

    /// Function return: `return value?`
    Return { value: Option<Value> },

    /// Protected-region-enter: starts `region` at its entry block `target`
    Enter {
        region: RegionId,
        target: BasicBlockId,
    },

    /// Protected-region-exit: leaves every region that does not contain `target`,
    /// running their handlers innermost first, then continues at `target`
    Leave { target: BasicBlockId },

    /// Ends the handler of `region`
    EndHandler { region: RegionId },

    /// Unreachable code: indicates this point should never be reached
    /// Used as a placeholder during construction
    Unreachable,
}

impl Terminator {
    /// Creates a new jump terminator
    pub const fn jump(target: BasicBlockId) -> Self {
        Self::Jump { target }
    }

    /// Creates a new conditional branch terminator
    pub const fn branch(
        condition: Value,
        then_target: BasicBlockId,
        else_target: BasicBlockId,
    ) -> Self {
        Self::If {
            condition,
            then_target,
            else_target,
        }
    }

    /// Creates a new return terminator with a value
    pub const fn return_value(value: Value) -> Self {
        Self::Return { value: Some(value) }
    }

    /// Creates a new void return terminator
    pub const fn return_void() -> Self {
        Self::Return { value: None }
    }

    pub const fn enter(region: RegionId, target: BasicBlockId) -> Self {
        Self::Enter { region, target }
    }

    pub const fn leave(target: BasicBlockId) -> Self {
        Self::Leave { target }
    }

    pub const fn end_handler(region: RegionId) -> Self {
        Self::EndHandler { region }
    }

    /// Creates an unreachable terminator
    pub const fn unreachable() -> Self {
        Self::Unreachable
    }

    /// Returns all basic block targets of this terminator
    ///
    /// Handler blocks reached by `Leave` and by unwinding are not listed; they are
    /// recorded on the region.
    pub fn target_blocks(&self) -> Vec<BasicBlockId> {
        match self {
            Self::Jump { target } | Self::Enter { target, .. } | Self::Leave { target } => {
                vec![*target]
            }
            Self::If {
                then_target,
                else_target,
                ..
            } => {
                if then_target == else_target {
                    vec![*then_target]
                } else {
                    vec![*then_target, *else_target]
                }
            }
            Self::Return { .. } | Self::EndHandler { .. } | Self::Unreachable => vec![],
        }
    }

    /// Returns all values used by this terminator
    pub fn used_values(&self) -> Vec<ValueId> {
        match self {
            Self::If { condition, .. } => condition.as_operand().into_iter().collect(),
            Self::Return { value: Some(value) } => value.as_operand().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Replaces all occurrences of `from` with `to` in the target blocks
    pub fn replace_target(&mut self, from: BasicBlockId, to: BasicBlockId) {
        match self {
            Self::Jump { target } | Self::Enter { target, .. } | Self::Leave { target } => {
                if *target == from {
                    *target = to;
                }
            }
            Self::If {
                then_target,
                else_target,
                ..
            } => {
                if *then_target == from {
                    *then_target = to;
                }
                if *else_target == from {
                    *else_target = to;
                }
            }
            Self::Return { .. } | Self::EndHandler { .. } | Self::Unreachable => {}
        }
    }

    /// Returns true if this terminator may exit a protected region
    pub const fn exits_region(&self) -> bool {
        matches!(self, Self::Leave { .. } | Self::EndHandler { .. })
    }
}

impl PrettyPrint for Terminator {
    fn pretty_print(&self, _indent: usize) -> String {
        match self {
            Self::Jump { target } => format!("jump {target:?}"),
            Self::If {
                condition,
                then_target,
                else_target,
            } => format!(
                "if {} then jump {then_target:?} else jump {else_target:?}",
                condition.pretty_print(0)
            ),
            Self::Return { value: Some(value) } => format!("return {}", value.pretty_print(0)),
            Self::Return { value: None } => "return".to_string(),
            Self::Enter { region, target } => format!("enter {region:?} -> {target:?}"),
            Self::Leave { target } => format!("leave -> {target:?}"),
            Self::EndHandler { region } => format!("endhandler {region:?}"),
            Self::Unreachable => "unreachable".to_string(),
        }
    }
}
