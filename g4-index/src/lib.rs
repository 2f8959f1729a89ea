//! Incremental symbol index for ANTLR4 grammars.
//!
//! Editors push document text into a [`GrammarIndex`] and ask it for the
//! symbols a grammar defines and how often each one is referenced. Analyses
//! are cached per document and only recomputed when the text, or a grammar
//! it imports, changes.
//!
//! ```
//! use g4_index::{DocumentId, GrammarIndex};
//!
//! let index = GrammarIndex::new();
//! let doc = DocumentId::from("Expr.g4");
//! let text = "grammar Expr;\nexpr: INT;\nINT: [0-9]+;\n";
//!
//! let symbols = index.list_symbols_fast(&doc, text, false);
//! assert_eq!(symbols.len(), 2);
//! assert_eq!(index.count_references_fast(&doc, text, "INT"), 1);
//! ```

mod analysis;
mod cache;
mod config;
pub mod convert;
mod diagnostics;
mod document;
mod error;
mod graph;
mod index;
mod notify;
mod resolve;
mod symbols;

pub use analysis::{AnalysisResult, Snapshot, SymbolFilter, SymbolInfo, fingerprint};
pub use cache::CacheState;
pub use config::{DEFAULT_FIRST_ANALYSIS_TIMEOUT, IndexOptions, IndexOptionsBuilder};
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity};
pub use document::DocumentId;
pub use error::Error;
pub use index::GrammarIndex;
pub use notify::SubscriptionId;
pub use resolve::{ImportedSymbols, NoImports, Occurrence, OccurrenceKind, Resolution, resolve};
pub use symbols::{
    DEFAULT_MODE, Import, ImportKind, Namespace, Origin, Symbol, SymbolKind, SymbolTable,
    built_in, extract,
};
