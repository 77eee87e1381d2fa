use ariadne::{Color, Label, Report, ReportKind, Source};
use std::fmt;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A compile diagnostic with a span into the expression source.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: std::ops::Range<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(span: std::ops::Range<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            span,
            message: message.into(),
        }
    }

    pub fn warning(span: std::ops::Range<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            span,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{prefix}: {}", self.message)
    }
}

/// Render diagnostics against the expression source using ariadne.
pub fn render_diagnostics(source: &str, diagnostics: &[Diagnostic]) -> String {
    const NAME: &str = "<expression>";
    let mut output = Vec::new();

    for diag in diagnostics {
        let (kind, color) = match diag.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };

        let report = Report::build(kind, (NAME, diag.span.clone()))
            .with_message(&diag.message)
            .with_label(
                Label::new((NAME, diag.span.clone()))
                    .with_message(&diag.message)
                    .with_color(color),
            );

        report
            .finish()
            .write((NAME, Source::from(source)), &mut output)
            .ok();
    }

    String::from_utf8(output).unwrap_or_default()
}
