//! User-defined mail rules: typed model, JSON loader, evaluation.
//!
//! `loader` turns the rule document into [`Rule`]s, `evaluator` tests one
//! condition, `aggregator` combines a rule's conditions and `engine` runs a
//! rule set over messages and collects the requested actions. `authoring`
//! appends new rules to the document for the `new-rule` command.

pub mod aggregator;
pub mod authoring;
pub mod engine;
pub mod evaluator;
pub mod loader;
pub mod model;

pub use engine::{EngineRun, MessageDecision, PlannedAction, RuleEngine, RuleFailure};
pub use loader::{load_rules, parse_rules};
pub use model::{
    Action, Combinator, Condition, DatePredicate, OffsetUnit, ReadState, RelativeOffset, Rule,
    TextField, TextPredicate,
};
