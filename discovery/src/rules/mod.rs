//! Tool rule engine: pattern matching and ordered rule evaluation.

pub mod pattern;
pub mod rule;

pub use pattern::{Pattern, PatternMatcher, PatternSet};
pub use rule::{CompiledRule, RuleOutcome, RuleSet, ToolRule};
