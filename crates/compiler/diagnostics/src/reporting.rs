//! # Error Reporting Utilities
//!
//! This module renders lowering diagnostics against their source text.

use crate::Diagnostic;
use ariadne::{Label, Report, Source};

/// Build a formatted message for a diagnostic
pub fn build_diagnostic_message(source: &str, diagnostic: &Diagnostic, with_color: bool) -> String {
    let mut write_buffer = Vec::new();
    let code_u32: u32 = diagnostic.code.into();
    let mut report = Report::build(
        diagnostic.severity.into(),
        ((), diagnostic.span.into_range()),
    )
    .with_config(
        ariadne::Config::new()
            .with_index_type(ariadne::IndexType::Byte)
            .with_color(with_color),
    )
    .with_code(code_u32)
    .with_message(&diagnostic.message)
    .with_label(Label::new(((), diagnostic.span.into_range())).with_message(&diagnostic.message));

    for (span, note) in &diagnostic.related_spans {
        report = report.with_label(Label::new(((), span.into_range())).with_message(note));
    }

    // Writing into a Vec cannot fail
    let _ = report
        .finish()
        .write(Source::from(source), &mut write_buffer);
    String::from_utf8_lossy(&write_buffer).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chumsky::span::SimpleSpan;

    #[test]
    fn test_report_contains_code_and_message() {
        let source = "(int x, string y) = new C();";
        let diag = Diagnostic::arity_mismatch(2, 3, SimpleSpan::from(0..17));
        let rendered = build_diagnostic_message(source, &diag, false);
        assert!(rendered.contains("1001"));
        assert!(rendered.contains("Cannot deconstruct 3 elements into 2 variables"));
    }
}
