//! Rule processor: fetches stored messages, evaluates the rule set and
//! hands each message's actions to the dispatcher.
//!
//! Flow:
//! 1. Read `now` once from the clock
//! 2. `Database::fetch_messages()`, a single fetch per run
//! 3. `RuleEngine::evaluate()` per message
//! 4. `ActionDispatcher::apply()` for each requested action, in order
//!
//! Messages are independent and may be processed concurrently up to
//! `max_concurrent`; actions for one message are always applied sequentially.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::error::DatabaseError;
use crate::pipeline::types::{ActionDispatcher, Clock, RunSummary, SystemClock};
use crate::rules::RuleEngine;
use crate::store::{Database, MessageRecord};

pub struct RuleProcessor {
    engine: Arc<RuleEngine>,
    db: Arc<dyn Database>,
    dispatcher: Arc<dyn ActionDispatcher>,
    clock: Arc<dyn Clock>,
    max_concurrent: usize,
}

impl RuleProcessor {
    /// Create a processor using the system clock and sequential processing.
    pub fn new(
        engine: Arc<RuleEngine>,
        db: Arc<dyn Database>,
        dispatcher: Arc<dyn ActionDispatcher>,
    ) -> Self {
        Self {
            engine,
            db,
            dispatcher,
            clock: Arc::new(SystemClock),
            max_concurrent: 1,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Maximum number of messages in flight at once. Values below 1 mean 1.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Run the rule set once over every stored message.
    ///
    /// Only the initial fetch can fail the run. Malformed messages and
    /// failed actions are logged and counted in the summary.
    pub async fn run(&self) -> Result<RunSummary, DatabaseError> {
        let now = self.clock.now();
        let messages = self.db.fetch_messages().await?;

        info!(
            messages = messages.len(),
            rules = self.engine.rules().len(),
            dispatcher = self.dispatcher.name(),
            %now,
            "Applying rules"
        );

        let summary = self.process_batch(&messages, now).await;

        info!(
            evaluated = summary.evaluated,
            matched = summary.matched,
            skipped = summary.skipped,
            rule_errors = summary.rule_errors,
            actions = summary.actions_dispatched,
            failed = summary.actions_failed,
            "Rule run complete"
        );
        Ok(summary)
    }

    /// Evaluate and dispatch a batch of already-fetched messages.
    pub async fn process_batch(&self, messages: &[MessageRecord], now: DateTime<Utc>) -> RunSummary {
        stream::iter(messages)
            .map(|message| self.process_message(message, now))
            .buffer_unordered(self.max_concurrent)
            .fold(RunSummary::default(), |mut total, summary| async move {
                total.merge(summary);
                total
            })
            .await
    }

    async fn process_message(&self, message: &MessageRecord, now: DateTime<Utc>) -> RunSummary {
        let mut summary = RunSummary::default();

        let decision = match self.engine.evaluate(message, now) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "Skipping malformed message");
                summary.skipped = 1;
                return summary;
            }
        };

        summary.evaluated = 1;
        summary.rule_errors = decision.rule_errors.len();

        if !decision.is_match() {
            debug!(message_id = %message.id, "No rule matched");
            return summary;
        }
        summary.matched = 1;

        debug!(
            message_id = %message.id,
            rules = ?decision.matched_rules,
            actions = decision.actions.len(),
            "Dispatching actions"
        );

        for action in &decision.actions {
            match self.dispatcher.apply(&message.id, action).await {
                Ok(()) => summary.actions_dispatched += 1,
                Err(e) => {
                    error!(
                        message_id = %message.id,
                        action = %action,
                        dispatcher = self.dispatcher.name(),
                        error = %e,
                        "Failed to apply action"
                    );
                    summary.actions_failed += 1;
                }
            }
        }

        summary
    }
}
