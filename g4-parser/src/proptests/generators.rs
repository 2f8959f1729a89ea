//! Input generators for property-based testing
#![allow(clippy::expect_used)]
use proptest::prelude::*;

/// Any string, including control characters and non-ASCII text.
pub fn any_grammar_string() -> impl Strategy<Value = String> {
    prop::string::string_regex(".*").expect("Failed to create any string strategy")
}

/// Grammar-shaped text assembled from fragments that are each plausible but
/// are glued together without regard for validity.
pub fn structured_grammar() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("grammar T;\n".to_string()),
            Just("lexer grammar L;\n".to_string()),
            Just("options { tokenVocab = L; }\n".to_string()),
            Just("import A, B = C;\n".to_string()),
            Just("tokens { X, Y }\n".to_string()),
            Just("mode M;\n".to_string()),
            Just("expr: expr '+' term | term;\n".to_string()),
            Just("fragment DIGIT: [0-9];\n".to_string()),
            Just("WS: [ \\t]+ -> skip;\n".to_string()),
            Just("STR: '\"' ~'\"'* '\"' -> pushMode(M);\n".to_string()),
            Just("a: x=b # Label\n".to_string()),
            Just("{ action(); }".to_string()),
            Just("(".to_string()),
            Just(")".to_string()),
            Just(";".to_string()),
            Just("'unterminated".to_string()),
            Just("/* comment".to_string()),
            prop::string::string_regex(r"[a-zA-Z_:;|()'\n ]{1,12}")
                .expect("Failed to create text chunk"),
        ],
        0..24,
    )
    .prop_map(|chunks| chunks.join(""))
}

/// Grammar fragments mixed with multi-byte characters.
pub fn unicode_grammar() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("grammar Ünï;\n"),
            Just("r: 'ü' 'ß';\n"),
            Just("// 日本語\n"),
            Just("😀"),
            Just("é: x;\n"),
            Just("A: [α-ω]+;\n"),
        ],
        0..16,
    )
    .prop_map(|chunks| chunks.concat())
}
