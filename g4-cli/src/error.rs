use std::fmt;

use g4_index::{Diagnostic as IndexDiagnostic, Severity};
use g4_parser::Location;
use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode, SourceSpan};

use crate::workspace::SourceFile;

/// Grammar diagnostic with its source attached, for miette rendering
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub(crate) struct RichDiagnostic {
    message: String,
    code: &'static str,
    severity: miette::Severity,
    advice: Option<String>,
    src: NamedSource<String>,
    span: SourceSpan,
    position_advice: String,
}

// Severity varies per diagnostic, so this is not derived.
impl Diagnostic for RichDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(self.severity)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.advice
            .as_ref()
            .map(|advice| Box::new(advice) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(self.position_advice.clone()),
            self.span,
        ))))
    }
}

fn source_span_from_location(location: &Location) -> SourceSpan {
    let start_offset = location.absolute_start;
    let length = location.absolute_end.saturating_sub(location.absolute_start);

    SourceSpan::new(start_offset.into(), length)
}

pub(crate) fn report(
    file: &SourceFile,
    diagnostic: &IndexDiagnostic,
    advice: Option<&str>,
) -> miette::Report {
    let location = &diagnostic.location;
    let line = location.start.line;
    let column = location.start.column;

    miette::Report::new(RichDiagnostic {
        message: diagnostic.message.clone(),
        code: diagnostic.code.as_str(),
        severity: match diagnostic.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
        },
        advice: advice.map(str::to_string),
        src: NamedSource::new(file.path.display().to_string(), file.text.clone()),
        span: source_span_from_location(location),
        position_advice: format!("line {line}, column {column}"),
    })
}
