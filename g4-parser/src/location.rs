use serde::Serialize;

/// A `Location` represents a span of grammar source text.
#[derive(Debug, Default, Clone, Hash, Eq, PartialEq, Serialize)]
pub struct Location {
    /// Byte offset where the span starts (inclusive).
    pub absolute_start: usize,
    /// Byte offset where the span ends (exclusive).
    pub absolute_end: usize,

    /// The start position of the location.
    pub start: Position,
    /// The end position of the location.
    pub end: Position,
}

impl Location {
    /// Validates that this location satisfies all invariants.
    ///
    /// Checks:
    /// - `absolute_start <= absolute_end` (valid range)
    /// - `absolute_end <= input.len()` (within bounds)
    /// - Both offsets are on UTF-8 character boundaries
    ///
    /// # Errors
    /// Returned as strings for easier debugging.
    pub fn validate(&self, input: &str) -> Result<(), String> {
        if self.absolute_start > self.absolute_end {
            return Err(format!(
                "Invalid range: start {} > end {}",
                self.absolute_start, self.absolute_end
            ));
        }

        if self.absolute_end > input.len() {
            return Err(format!(
                "End offset {} exceeds input length {}",
                self.absolute_end,
                input.len()
            ));
        }

        if !input.is_char_boundary(self.absolute_start) {
            return Err(format!(
                "Start offset {} not on UTF-8 boundary",
                self.absolute_start
            ));
        }

        if !input.is_char_boundary(self.absolute_end) {
            return Err(format!(
                "End offset {} not on UTF-8 boundary",
                self.absolute_end
            ));
        }

        Ok(())
    }

    /// Check if a byte offset falls within this location (end exclusive).
    #[must_use]
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.absolute_start && offset < self.absolute_end
    }

    /// Slice the text this location was computed from.
    #[must_use]
    pub fn slice<'a>(&self, input: &'a str) -> Option<&'a str> {
        input.get(self.absolute_start..self.absolute_end)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "location.start({}), location.end({})",
            self.start, self.end
        )
    }
}

/// A `Position` is a human-readable point in a grammar source.
///
/// Lines are 1-indexed; columns are 0-indexed and counted as Unicode scalar
/// values, which is what editors expect once the line is shifted down by one.
#[derive(Debug, Default, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct Position {
    /// The line number of the position (1-indexed).
    pub line: usize,
    /// The column number of the position (0-indexed).
    #[serde(rename = "col")]
    pub column: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line: {}, column: {}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(absolute_start: usize, absolute_end: usize) -> Location {
        Location {
            absolute_start,
            absolute_end,
            start: Position {
                line: 1,
                column: absolute_start,
            },
            end: Position {
                line: 1,
                column: absolute_end,
            },
        }
    }

    #[test]
    fn test_validate_rejects_out_of_bounds() {
        assert!(loc(0, 3).validate("abc").is_ok());
        assert!(loc(0, 4).validate("abc").is_err());
        assert!(loc(2, 1).validate("abc").is_err());
    }

    #[test]
    fn test_validate_rejects_split_utf8() {
        // 'é' is two bytes
        assert!(loc(0, 1).validate("é").is_err());
        assert!(loc(0, 2).validate("é").is_ok());
    }

    #[test]
    fn test_contains_is_end_exclusive() {
        let location = loc(10, 20);
        assert!(!location.contains(9));
        assert!(location.contains(10));
        assert!(!location.contains(20));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            format!("{}", loc(0, 3)),
            "location.start(line: 1, column: 0), location.end(line: 1, column: 3)"
        );
    }
}
