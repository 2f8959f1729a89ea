//! Semantic diagnostics
//!
//! Syntax errors from the parser are folded in as error diagnostics so that
//! callers see one list per document.

use std::fmt;

use g4_parser::{Location, SyntaxError};
use serde::Serialize;

use crate::symbols::Namespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Stable machine-readable diagnostic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    Syntax,
    DuplicateDefinition,
    UnresolvedReference,
    UnknownImport,
}

impl DiagnosticCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::DuplicateDefinition => "duplicate-definition",
            Self::UnresolvedReference => "unresolved-reference",
            Self::UnknownImport => "unknown-import",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    pub code: DiagnosticCode,
}

impl Diagnostic {
    /// Convert a parser error into an error diagnostic
    #[must_use]
    pub fn from_syntax_error(error: &SyntaxError) -> Self {
        Self {
            severity: Severity::Error,
            location: error.location.clone(),
            message: error.kind.to_string(),
            code: DiagnosticCode::Syntax,
        }
    }

    pub(crate) fn duplicate_definition(
        name: &str,
        namespace: Namespace,
        location: &Location,
    ) -> Self {
        Self {
            severity: Severity::Error,
            location: location.clone(),
            message: format!("Duplicate definition: {namespace} '{name}' is already defined"),
            code: DiagnosticCode::DuplicateDefinition,
        }
    }

    pub(crate) fn unresolved_reference(
        name: &str,
        namespace: Namespace,
        location: &Location,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            location: location.clone(),
            message: format!("Unresolved reference: {namespace} '{name}' is not defined"),
            code: DiagnosticCode::UnresolvedReference,
        }
    }

    pub(crate) fn unknown_import(grammar: &str, location: &Location) -> Self {
        Self {
            severity: Severity::Warning,
            location: location.clone(),
            message: format!("Unknown import: grammar '{grammar}' is not available"),
            code: DiagnosticCode::UnknownImport,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message() {
        let diagnostic =
            Diagnostic::duplicate_definition("expr", Namespace::Rule, &Location::default());
        assert_eq!(
            diagnostic.message,
            "Duplicate definition: rule 'expr' is already defined"
        );
        assert!(diagnostic.is_error());
        assert_eq!(diagnostic.code.as_str(), "duplicate-definition");
    }

    #[test]
    fn test_syntax_errors_become_error_diagnostics() {
        let result = g4_parser::parse("grammar T;\na: 'x'");
        let diagnostics: Vec<_> = result
            .errors
            .iter()
            .map(Diagnostic::from_syntax_error)
            .collect();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.iter().all(Diagnostic::is_error));
        assert!(diagnostics.iter().all(|d| d.code == DiagnosticCode::Syntax));
    }
}
