//! # Lowering Errors
//!
//! Three failure families abort lowering of the enclosing statement: structural
//! errors detected before any step is emitted, protocol resolution failures, and
//! conversion failures. The statement driver turns each into one diagnostic at the
//! statement's span.

use chumsky::span::SimpleSpan;
use cinder_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use cinder_compiler_semantic::{ConversionError, ResolutionError, TypeCatalog};
use thiserror::Error;

/// Ill-formed statement shapes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("Cannot deconstruct {found} elements into {expected} variables")]
    ArityMismatch { expected: usize, found: usize },

    #[error("A deconstruction cannot mix declarations and assignments to existing variables")]
    MixedDeclarationAndAssignment,

    #[error("The deconstruction of a foreach iteration variable must declare every element")]
    IterationVariableNotDeclared,

    #[error("Cannot assign to '{name}' because it is read-only")]
    ReadOnlyTarget { name: String },

    #[error("No enclosing loop out of which to break or continue")]
    BreakOutsideLoop,
}

impl StructuralError {
    pub const fn code(&self) -> DiagnosticCode {
        match self {
            Self::ArityMismatch { .. } => DiagnosticCode::DeconstructionArityMismatch,
            Self::MixedDeclarationAndAssignment => DiagnosticCode::MixedDeclarationAndAssignment,
            Self::IterationVariableNotDeclared => DiagnosticCode::IterationVariableNotDeclared,
            Self::ReadOnlyTarget { .. } => DiagnosticCode::InvalidAssignmentTarget,
            Self::BreakOutsideLoop => DiagnosticCode::BreakOutsideLoop,
        }
    }
}

/// A protocol member that is missing, or ambiguous with no fallback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("protocol resolution failed: {0:?}")]
pub struct ResolutionFailure(pub ResolutionError);

/// A produced value its target slot cannot accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("conversion failed: {0:?}")]
pub struct ConversionFailure(pub ConversionError);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoweringError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),

    #[error(transparent)]
    Conversion(#[from] ConversionFailure),
}

impl From<ResolutionError> for LoweringError {
    fn from(error: ResolutionError) -> Self {
        Self::Resolution(ResolutionFailure(error))
    }
}

impl From<ConversionError> for LoweringError {
    fn from(error: ConversionError) -> Self {
        Self::Conversion(ConversionFailure(error))
    }
}

impl LoweringError {
    pub const fn code(&self) -> DiagnosticCode {
        match self {
            Self::Structural(error) => error.code(),
            Self::Resolution(ResolutionFailure(error)) => error.code(),
            Self::Conversion(ConversionFailure(error)) => {
                if error.explicit {
                    DiagnosticCode::NoExplicitConversion
                } else {
                    DiagnosticCode::NoImplicitConversion
                }
            }
        }
    }

    /// Renders the error at the span of the statement that failed to lower
    pub fn to_diagnostic(&self, catalog: &TypeCatalog, span: SimpleSpan<usize>) -> Diagnostic {
        match self {
            Self::Structural(StructuralError::ArityMismatch { expected, found }) => {
                Diagnostic::arity_mismatch(*expected, *found, span)
            }
            Self::Structural(error) => {
                Diagnostic::error(error.code(), error.to_string()).with_location(span)
            }
            Self::Resolution(ResolutionFailure(error)) => error.to_diagnostic(catalog, span),
            Self::Conversion(ConversionFailure(error)) => error.to_diagnostic(catalog, span),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_compiler_semantic::PrimitiveType;

    #[test]
    fn test_error_families_map_to_codes() {
        let catalog = TypeCatalog::new();
        let int = catalog.primitive(PrimitiveType::Int);
        let string = catalog.well_known().string;

        let structural = LoweringError::from(StructuralError::ArityMismatch {
            expected: 2,
            found: 3,
        });
        let diagnostic = structural.to_diagnostic(&catalog, SimpleSpan::from(4..9));
        assert_eq!(diagnostic.code, DiagnosticCode::DeconstructionArityMismatch);
        assert_eq!(diagnostic.span, SimpleSpan::from(4..9));
        assert_eq!(
            diagnostic.message,
            "Cannot deconstruct 3 elements into 2 variables"
        );

        let resolution = LoweringError::from(ResolutionError::NotDisposable {
            resource: int,
            is_async: false,
        });
        assert_eq!(resolution.code(), DiagnosticCode::NotDisposable);

        let conversion = LoweringError::from(ConversionError {
            source: string,
            target: int,
            explicit: false,
        });
        let diagnostic = conversion.to_diagnostic(&catalog, SimpleSpan::from(0..1));
        assert_eq!(diagnostic.code, DiagnosticCode::NoImplicitConversion);
        assert_eq!(diagnostic.message, "Cannot implicitly convert type 'string' to 'int'");
    }
}
