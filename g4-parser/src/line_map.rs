use crate::{Location, Position};

/// Pre-calculated line position map for offset-to-position conversion.
///
/// Scans the input once to build a sorted list of line start offsets, then
/// answers lookups with a binary search.
#[derive(Debug, Clone)]
pub(crate) struct LineMap {
    /// Byte offsets where each line starts in the input
    line_starts: Vec<usize>,
    /// Byte offsets of every multi-byte character
    wide_chars: Vec<usize>,
    /// `wide_extra[i]` is the number of continuation bytes in
    /// `wide_chars[..i]`
    wide_extra: Vec<usize>,
}

impl LineMap {
    pub(crate) fn new(input: &str) -> Self {
        let mut line_starts = vec![0];
        let mut wide_chars = Vec::new();
        let mut wide_extra = vec![0];

        for (offset, ch) in input.char_indices() {
            if ch == '\n' {
                line_starts.push(offset + 1);
            } else if !ch.is_ascii() {
                let total = wide_extra.last().copied().unwrap_or(0);
                wide_chars.push(offset);
                wide_extra.push(total + ch.len_utf8() - 1);
            }
        }

        Self {
            line_starts,
            wide_chars,
            wide_extra,
        }
    }

    /// Continuation bytes of multi-byte characters starting before `offset`.
    fn extra_bytes_before(&self, offset: usize) -> usize {
        let count = self.wide_chars.partition_point(|&start| start < offset);
        self.wide_extra.get(count).copied().unwrap_or(0)
    }

    /// Convert a byte offset to a `Position`. Columns are counted as Unicode
    /// scalar values, not bytes. Offsets inside a multi-byte character round
    /// back to the start of that character.
    pub(crate) fn offset_to_position(&self, offset: usize, input: &str) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line_idx) => line_idx + 1,
            Err(line_idx) => line_idx,
        };

        let line_start_byte = self
            .line_starts
            .get(line.saturating_sub(1))
            .copied()
            .unwrap_or(0);

        let adjusted_offset = if offset > input.len() {
            input.len()
        } else if input.is_char_boundary(offset) {
            offset
        } else {
            (0..=offset)
                .rev()
                .find(|&i| input.is_char_boundary(i))
                .unwrap_or(0)
        };

        let bytes = adjusted_offset.saturating_sub(line_start_byte);
        let column = bytes.saturating_sub(
            self.extra_bytes_before(adjusted_offset) - self.extra_bytes_before(line_start_byte),
        );

        Position { line, column }
    }

    pub(crate) fn location(&self, start: usize, end: usize, input: &str) -> Location {
        Location {
            absolute_start: start,
            absolute_end: end,
            start: self.offset_to_position(start, input),
            end: self.offset_to_position(end, input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        let input = "grammar T;";
        let map = LineMap::new(input);
        assert_eq!(
            map.offset_to_position(8, input),
            Position { line: 1, column: 8 }
        );
    }

    #[test]
    fn test_after_newline() {
        let input = "a: b;\nb: 'x';\n";
        let map = LineMap::new(input);
        assert_eq!(
            map.offset_to_position(6, input),
            Position { line: 2, column: 0 }
        );
        assert_eq!(
            map.offset_to_position(9, input),
            Position { line: 2, column: 3 }
        );
    }

    #[test]
    fn test_multibyte_columns_count_chars() {
        let input = "// é\nr: 'ü' x;";
        let map = LineMap::new(input);
        // "r: 'ü' " -> 'x' is the 8th char on line 2
        let offset = input.find('x').unwrap_or_default();
        assert_eq!(
            map.offset_to_position(offset, input),
            Position { line: 2, column: 7 }
        );
    }

    #[test]
    fn test_long_line_columns() {
        let input = format!("{}é{}x", "a".repeat(100_000), "ü".repeat(100_000));
        let map = LineMap::new(&input);
        let offset = input.len() - 1;
        assert_eq!(
            map.offset_to_position(offset, &input),
            Position {
                line: 1,
                column: 200_001
            }
        );
        assert_eq!(
            map.offset_to_position(100_000, &input),
            Position {
                line: 1,
                column: 100_000
            }
        );
    }
}
