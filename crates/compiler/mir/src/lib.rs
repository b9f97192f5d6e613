//! # Cinder Intermediate Representation (MIR)
//!
//! This crate defines the lowered step form produced from the bound tree, and the
//! lowering engine that expands deconstruction, `foreach` and `using` statements into
//! it. The MIR is a control flow graph of basic blocks whose instructions bind
//! temporaries, call members and store into targets, with protected regions carrying
//! the cleanup obligations of scoped resources and enumerators.
//!
//! ## Design Principles
//!
//! 1. **Control Flow Graph (CFG)**: Functions are directed graphs of basic blocks
//! 2. **Three-Address Code (TAC)**: Each instruction performs at most one operation
//! 3. **Explicit evaluation order**: Receivers, right-hand sides, conversions and stores
//!    appear in the exact order the source language prescribes
//! 4. **Structured cleanup**: Every protected region is entered with `enter`, exited with
//!    `leave`, and owns one handler that runs the region's disposal exactly once
//!
//! ## Architecture
//!
//! ```text
//! MirModule
//! functions: IndexVec<FunctionId, MirFunction>
//!
//! MirFunction
//! basic_blocks: IndexVec<BasicBlockId, BasicBlock>
//! regions: IndexVec<RegionId, ProtectedRegion>
//! locals: Map<LocalId, ValueId>
//!
//! BasicBlock
//! instructions: Vec<Instruction>
//! terminator: Terminator
//! region: Option<RegionId>
//! ```
//!
//! Values are not in SSA form: a user local owns one `ValueId` that is assigned as
//! often as the source assigns it, while temporaries are assigned once.

#![allow(clippy::option_if_let_else)]

pub use basic_block::BasicBlock;
pub use builder::{CfgBuilder, InstrBuilder};
pub use config::LoweringConfig;
pub use error::{ConversionFailure, LoweringError, ResolutionFailure, StructuralError};
pub use function::{MirFunction, TempKind, ValueOrigin};
pub use instruction::{
    Argument, BinaryOp, BoundKind, DisposeMode, Instruction, InstructionKind, Receiver,
};
pub use module::MirModule;
pub use passes::{MirPass, PassManager, Validation};
pub use region::{CleanupObligation, NullGuard, ProtectedRegion, RegionKind};
pub use terminator::Terminator;
pub use value::{Literal, Place, PlaceBase, Projection, Value};

pub mod basic_block;
pub mod builder;
pub mod config;
pub mod error;
pub mod function;
pub mod instruction;
pub mod lowering;
pub mod module;
pub mod passes;
pub mod region;
pub mod terminator;
pub mod trace;
pub mod value;

pub use lowering::{generate_mir, lower_function};

// --- Core Identifiers ---

index_vec::define_index_type! {
    /// Unique identifier for a function within a MIR module
    pub struct FunctionId = usize;

    MAX_INDEX = usize::MAX;
}

index_vec::define_index_type! {
    /// Unique identifier for a basic block within a function
    pub struct BasicBlockId = usize;

    MAX_INDEX = usize::MAX;
    DEBUG_FORMAT = "bb{}";
}

index_vec::define_index_type! {
    /// Unique identifier for a value (virtual register) within a function
    pub struct ValueId = usize;

    MAX_INDEX = usize::MAX;
    DEBUG_FORMAT = "%{}";
}

index_vec::define_index_type! {
    /// Unique identifier for a protected region within a function
    pub struct RegionId = usize;

    MAX_INDEX = usize::MAX;
    DEBUG_FORMAT = "r{}";
}

// --- Pretty Printing Support ---

/// Trait for pretty-printing MIR constructs
pub trait PrettyPrint {
    fn pretty_print(&self, indent: usize) -> String;
}

/// Helper function to create indentation
pub(crate) fn indent_str(level: usize) -> String {
    "  ".repeat(level)
}

impl PrettyPrint for ValueId {
    fn pretty_print(&self, _indent: usize) -> String {
        format!("%{}", self.index())
    }
}

impl PrettyPrint for cinder_compiler_semantic::MethodId {
    fn pretty_print(&self, _indent: usize) -> String {
        format!("m{}", self.index())
    }
}

impl PrettyPrint for cinder_compiler_semantic::TypeId {
    fn pretty_print(&self, _indent: usize) -> String {
        format!("t{}", self.index())
    }
}

impl PrettyPrint for cinder_compiler_semantic::FieldId {
    fn pretty_print(&self, _indent: usize) -> String {
        format!("f{}", self.index())
    }
}
