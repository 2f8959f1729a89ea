use crate::DocumentId;

/// Contract violations of the index API.
///
/// Malformed grammars and unresolved names are never errors: they show up
/// as syntax errors and diagnostics on the analysis result instead.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("unknown document: {0} was never registered with the index")]
    UnknownDocument(DocumentId),
}
