//! Property-based tests for the grammar parser
//!
//! These check invariants that hold for ANY input: the parser must survive
//! arbitrary text the way an editor feeds it half-typed grammars.

mod generators;
mod invariants;
