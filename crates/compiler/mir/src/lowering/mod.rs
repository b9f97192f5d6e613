//! # MIR Lowering Module
//!
//! This module contains the infrastructure for lowering bound functions to MIR.
//! It's organized into focused submodules that each handle a specific aspect of
//! the lowering process.

pub mod builder;
pub mod cleanup;
pub mod deconstruct;
pub mod expr;
pub mod foreach;
pub mod function;
pub mod stmt;
pub mod using;

// Re-export the main entry points
pub use function::{generate_mir, lower_function};

// Re-export commonly used items
pub use builder::MirBuilder;
pub use stmt::LowerStmt;
