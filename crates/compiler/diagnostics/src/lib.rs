//! # Cinder Compiler Diagnostics
//!
//! Diagnostic types shared by the semantic model and the lowering engine,
//! plus ariadne-based rendering for drivers.

mod diagnostics;
pub mod reporting;

pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticCollection, DiagnosticSeverity};
pub use reporting::build_diagnostic_message;
