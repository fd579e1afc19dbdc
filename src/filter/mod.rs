//! Domain rule filtering.
//!
//! Decides whether a queried domain is covered by the configured rule list.

mod rules;

pub use rules::RuleSet;
