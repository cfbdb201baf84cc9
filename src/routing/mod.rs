//! # Routing Decisions
//!
//! Pure decision logic: clause evaluation, rule matching and best-instance
//! selection. Nothing in here performs I/O.

pub mod condition;
pub mod rule;
pub mod selector;

pub use condition::{evaluate, evaluate_named, Operator};
pub use rule::{
    MatchCondition, Rule, RuleAction, RuleDefinition, SendMode, TagField, TagScope,
};
pub use selector::{InstanceSelector, RankingMetric, Selection};
