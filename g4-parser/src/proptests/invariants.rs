//! Parser invariant tests using property-based testing

use proptest::prelude::*;

use crate::{SyntaxNode, parse, sniff_grammar_name};

use super::generators::{any_grammar_string, structured_grammar, unicode_grammar};

fn verify_locations(node: &SyntaxNode, input: &str) -> Result<(), String> {
    node.location.validate(input)?;
    if node.location.start > node.location.end {
        return Err(format!("start after end at {}", node.location));
    }
    for child in &node.children {
        verify_locations(child, input)?;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    /// The parser returns a tree for any input, no matter how malformed.
    #[test]
    fn parser_never_panics(input in any_grammar_string()) {
        let _ = parse(&input);
        let _ = sniff_grammar_name(&input);
    }

    /// Node and error locations are valid spans of the input.
    #[test]
    fn locations_are_valid_spans(input in structured_grammar()) {
        let result = parse(&input);
        prop_assert!(verify_locations(&result.tree, &input).is_ok());
        for error in &result.errors {
            prop_assert!(error.location.validate(&input).is_ok());
        }
    }

    /// Offsets land on character boundaries for multi-byte input.
    #[test]
    fn offsets_are_utf8_safe(input in unicode_grammar()) {
        let result = parse(&input);
        prop_assert!(verify_locations(&result.tree, &input).is_ok());
    }

    /// Same text, same tree, same errors.
    #[test]
    fn parsing_is_deterministic(input in structured_grammar()) {
        prop_assert_eq!(parse(&input), parse(&input));
    }

    /// Errors come out in source order.
    #[test]
    fn errors_are_ordered(input in structured_grammar()) {
        let result = parse(&input);
        let starts: Vec<_> = result.errors.iter().map(|e| e.location.absolute_start).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        prop_assert_eq!(starts, sorted);
    }
}
