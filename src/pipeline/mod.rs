//! Rule application pipeline.
//!
//! Stored messages flow through:
//! 1. `Database::fetch_messages()` — one fetch per run
//! 2. `RuleEngine::evaluate()` — pure decision, no side effects
//! 3. `ActionDispatcher::apply()` — the only place messages change
//!
//! Swapping the dispatcher (store, dry-run) changes what happens to the
//! decisions without touching the engine.

pub mod dispatcher;
pub mod processor;
pub mod types;

pub use dispatcher::{DryRunDispatcher, StoreDispatcher};
pub use processor::RuleProcessor;
pub use types::{ActionDispatcher, Clock, FixedClock, RunSummary, SystemClock};
