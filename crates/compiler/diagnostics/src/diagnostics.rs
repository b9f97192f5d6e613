//! # Diagnostic System for Lowering
//!
//! This module provides the diagnostic infrastructure for reporting errors and
//! warnings produced while lowering deconstruction, iteration and scoped-resource
//! statements.

use ariadne::ReportKind;
use chumsky::span::SimpleSpan;
use std::fmt;

/// A diagnostic message produced during lowering
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub code: DiagnosticCode,
    pub message: String,
    /// Source span where this diagnostic applies
    pub span: SimpleSpan<usize>,
    /// Optional related spans for additional context
    pub related_spans: Vec<(SimpleSpan<usize>, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
    Hint,
}

impl From<ReportKind<'static>> for DiagnosticSeverity {
    fn from(kind: ReportKind<'static>) -> Self {
        match kind {
            ReportKind::Error => Self::Error,
            ReportKind::Warning => Self::Warning,
            ReportKind::Advice => Self::Info,
            ReportKind::Custom(_, _) => Self::Info,
        }
    }
}

impl From<DiagnosticSeverity> for ReportKind<'static> {
    fn from(severity: DiagnosticSeverity) -> Self {
        match severity {
            DiagnosticSeverity::Error => ReportKind::Error,
            DiagnosticSeverity::Warning => ReportKind::Warning,
            DiagnosticSeverity::Info => ReportKind::Advice,
            DiagnosticSeverity::Hint => ReportKind::Advice,
        }
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
            Self::Hint => write!(f, "hint"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    // Structural errors (1000-1999)
    DeconstructionArityMismatch,
    MixedDeclarationAndAssignment,
    IterationVariableNotDeclared,
    InvalidAssignmentTarget,
    BreakOutsideLoop,

    // Resolution failures (2000-2999)
    DeconstructNotFound,
    AmbiguousProtocolMember,
    EnumeratorPatternNotFound,
    EnumeratorMemberNotFound,
    AmbiguousEnumerableInterface,
    NotDisposable,

    // Conversion failures (3000-3999)
    NoImplicitConversion,
    NoExplicitConversion,
}

impl From<DiagnosticCode> for u32 {
    fn from(code: DiagnosticCode) -> Self {
        match code {
            DiagnosticCode::DeconstructionArityMismatch => 1001,
            DiagnosticCode::MixedDeclarationAndAssignment => 1002,
            DiagnosticCode::IterationVariableNotDeclared => 1003,
            DiagnosticCode::InvalidAssignmentTarget => 1004,
            DiagnosticCode::BreakOutsideLoop => 1005,
            DiagnosticCode::DeconstructNotFound => 2001,
            DiagnosticCode::AmbiguousProtocolMember => 2002,
            DiagnosticCode::EnumeratorPatternNotFound => 2003,
            DiagnosticCode::EnumeratorMemberNotFound => 2004,
            DiagnosticCode::AmbiguousEnumerableInterface => 2005,
            DiagnosticCode::NotDisposable => 2006,
            DiagnosticCode::NoImplicitConversion => 3001,
            DiagnosticCode::NoExplicitConversion => 3002,
        }
    }
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(code: DiagnosticCode, message: String) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            code,
            message,
            span: SimpleSpan::from(0..0),
            related_spans: Vec::new(),
        }
    }

    /// Create a warning diagnostic
    pub fn warning(code: DiagnosticCode, message: String) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            code,
            message,
            span: SimpleSpan::from(0..0),
            related_spans: Vec::new(),
        }
    }

    /// Add location information to this diagnostic
    pub const fn with_location(mut self, span: SimpleSpan<usize>) -> Self {
        self.span = span;
        self
    }

    /// Add a related span with context message
    pub fn with_related_span(mut self, span: SimpleSpan<usize>, message: String) -> Self {
        self.related_spans.push((span, message));
        self
    }

    /// Convenience method for a deconstruction whose target shape does not match its source
    pub fn arity_mismatch(expected: usize, found: usize, span: SimpleSpan<usize>) -> Self {
        Self::error(
            DiagnosticCode::DeconstructionArityMismatch,
            format!("Cannot deconstruct {found} elements into {expected} variables"),
        )
        .with_location(span)
    }

    /// Convenience method for an ambiguous pattern member that falls back to another route
    pub fn ambiguous_pattern(type_name: &str, member: &str, span: SimpleSpan<usize>) -> Self {
        Self::warning(
            DiagnosticCode::AmbiguousProtocolMember,
            format!("'{type_name}' does not implement the '{member}' pattern: the call is ambiguous"),
        )
        .with_location(span)
    }

    /// Convenience method for missing implicit conversions
    pub fn no_implicit_conversion(from: &str, to: &str, span: SimpleSpan<usize>) -> Self {
        Self::error(
            DiagnosticCode::NoImplicitConversion,
            format!("Cannot implicitly convert type '{from}' to '{to}'"),
        )
        .with_location(span)
    }

    /// Convenience method for missing explicit conversions
    pub fn no_explicit_conversion(from: &str, to: &str, span: SimpleSpan<usize>) -> Self {
        Self::error(
            DiagnosticCode::NoExplicitConversion,
            format!("Cannot convert type '{from}' to '{to}'"),
        )
        .with_location(span)
    }

    /// Returns true if this diagnostic is an error
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        write!(f, " (at {}:{})", self.span.start, self.span.end)?;
        for (span, message) in &self.related_spans {
            write!(f, "\n  note: {} (at {}:{})", message, span.start, span.end)?;
        }
        Ok(())
    }
}

/// Collection of diagnostics gathered while lowering a module
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DiagnosticCollection {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic to the collection
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add multiple diagnostics
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Get only error diagnostics
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .collect()
    }

    /// Get only warning diagnostics
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
            .collect()
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    pub const fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Sort diagnostics by severity (errors first) and then by message
    pub fn sort(&mut self) {
        self.diagnostics
            .sort_by(|a, b| a.severity.cmp(&b.severity).then(a.message.cmp(&b.message)));
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        let errors = self.errors().len();
        let warnings = self.warnings().len();
        let total = self.diagnostics.len();

        if total == 0 {
            "No issues found".to_string()
        } else {
            format!("{errors} errors, {warnings} warnings")
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }
}

impl From<Vec<Diagnostic>> for DiagnosticCollection {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }
}

impl IntoIterator for DiagnosticCollection {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}
