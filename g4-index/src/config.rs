use std::time::Duration;

/// How long a query waits for the very first analysis of a document that
/// another thread is already analyzing.
pub const DEFAULT_FIRST_ANALYSIS_TIMEOUT: Duration = Duration::from_millis(250);

/// Configuration for a [`GrammarIndex`](crate::GrammarIndex).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct IndexOptions {
    /// Upper bound for waiting on an in-flight first analysis. Once a
    /// document has a published result, queries never wait.
    pub first_analysis_timeout: Duration,
    /// Resolve names through `import` and `tokenVocab`.
    pub resolve_imports: bool,
    /// Emit a warning diagnostic for every unresolved reference.
    pub warn_unresolved: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            first_analysis_timeout: DEFAULT_FIRST_ANALYSIS_TIMEOUT,
            resolve_imports: true,
            warn_unresolved: true,
        }
    }
}

impl IndexOptions {
    /// Create a new `IndexOptionsBuilder` for fluent configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use g4_index::IndexOptions;
    ///
    /// let options = IndexOptions::builder()
    ///     .with_first_analysis_timeout(Duration::from_millis(50))
    ///     .without_import_resolution()
    ///     .build();
    /// assert!(!options.resolve_imports);
    /// ```
    #[must_use]
    pub fn builder() -> IndexOptionsBuilder {
        IndexOptionsBuilder::default()
    }
}

/// Builder for `IndexOptions`.
///
/// Create an `IndexOptionsBuilder` using `IndexOptions::builder()`.
#[derive(Debug, Clone, Default)]
pub struct IndexOptionsBuilder {
    options: IndexOptions,
}

impl IndexOptionsBuilder {
    #[must_use]
    pub fn with_first_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.options.first_analysis_timeout = timeout;
        self
    }

    /// Treat every name that is not defined locally or built in as
    /// unresolved, even when an imported grammar defines it.
    #[must_use]
    pub fn without_import_resolution(mut self) -> Self {
        self.options.resolve_imports = false;
        self
    }

    /// Keep unresolved references out of the diagnostics. They are still
    /// reported as reference-only symbols.
    #[must_use]
    pub fn without_unresolved_warnings(mut self) -> Self {
        self.options.warn_unresolved = false;
        self
    }

    #[must_use]
    pub fn build(self) -> IndexOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_default() {
        let built = IndexOptions::builder().build();
        let default = IndexOptions::default();
        assert_eq!(built.first_analysis_timeout, default.first_analysis_timeout);
        assert!(built.resolve_imports);
        assert!(built.warn_unresolved);
    }

    #[test]
    fn test_builder_overrides() {
        let options = IndexOptions::builder()
            .with_first_analysis_timeout(Duration::ZERO)
            .without_unresolved_warnings()
            .build();
        assert_eq!(options.first_analysis_timeout, Duration::ZERO);
        assert!(!options.warn_unresolved);
        assert!(options.resolve_imports);
    }
}
