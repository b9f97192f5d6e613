//! # MIR Basic Blocks
//!
//! This module defines basic blocks, the fundamental units of the control flow graph.
//! A basic block is a straight-line sequence of instructions with a single entry
//! and single exit point.

use rustc_hash::FxHashSet;

use crate::{indent_str, Instruction, PrettyPrint, RegionId, Terminator, ValueId};

/// A basic block in the control flow graph
///
/// # Invariants
///
/// - Every basic block must end with exactly one terminator
/// - Instructions within a block execute sequentially
/// - `region` is the innermost protected region whose body contains the block;
///   handler blocks belong to the region enclosing the one they clean up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Optional name for debugging
    pub name: Option<String>,

    /// The instructions in this block, executed in order
    pub instructions: Vec<Instruction>,

    /// The terminator that ends this block
    pub terminator: Terminator,

    /// Innermost protected region containing this block
    pub region: Option<RegionId>,
}

impl Default for BasicBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicBlock {
    /// Creates a new empty basic block outside any region
    pub const fn new() -> Self {
        Self {
            name: None,
            instructions: Vec::new(),
            terminator: Terminator::Unreachable,
            region: None,
        }
    }

    pub fn with_name(name: impl Into<String>, region: Option<RegionId>) -> Self {
        Self {
            name: Some(name.into()),
            region,
            ..Self::new()
        }
    }

    /// Adds an instruction to the end of this block
    pub fn push_instruction(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Sets the terminator for this block
    pub fn set_terminator(&mut self, terminator: Terminator) {
        self.terminator = terminator;
    }

    /// Returns true if the block has a real terminator
    pub const fn is_terminated(&self) -> bool {
        !matches!(self.terminator, Terminator::Unreachable)
    }

    /// Returns the number of instructions in this block
    pub const fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if this block has no instructions
    pub const fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Number of cleanup-invoke instructions in this block
    pub fn dispose_count(&self) -> usize {
        self.instructions.iter().filter(|i| i.is_dispose()).count()
    }

    /// Validates the block structure
    pub fn validate(&self) -> Result<(), String> {
        for (index, instruction) in self.instructions.iter().enumerate() {
            instruction
                .validate()
                .map_err(|err| format!("instruction {index}: {err}"))?;
        }
        Ok(())
    }

    /// Returns all values used in this block
    pub fn used_values(&self) -> FxHashSet<ValueId> {
        let mut used = FxHashSet::default();
        for instruction in &self.instructions {
            used.extend(instruction.used_values());
        }
        used.extend(self.terminator.used_values());
        used
    }

    /// Returns all values defined in this block
    pub fn defined_values(&self) -> FxHashSet<ValueId> {
        self.instructions
            .iter()
            .flat_map(Instruction::destinations)
            .collect()
    }
}

impl PrettyPrint for BasicBlock {
    fn pretty_print(&self, indent: usize) -> String {
        let mut result = String::new();
        let base_indent = indent_str(indent);

        // Print instructions
        for instruction in &self.instructions {
            result.push_str(&format!(
                "{}{}\n",
                base_indent,
                instruction.pretty_print(indent)
            ));
        }

        // Print terminator
        result.push_str(&format!(
            "{}{}\n",
            base_indent,
            self.terminator.pretty_print(0)
        ));

        result
    }
}
