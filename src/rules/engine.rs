//! Rule-set evaluation over single messages and batches.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ConfigurationError, EvaluationError, MessageDataError, RuleSpecificationError};
use crate::rules::aggregator::rule_matches;
use crate::rules::loader::load_rules;
use crate::rules::model::{Action, Rule};
use crate::store::MessageRecord;

/// Evaluates messages against a validated rule set.
#[derive(Debug, Default, Clone)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

/// A rule that could not be evaluated for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule: String,
    pub error: ConfigurationError,
}

/// What the engine decided for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDecision {
    pub message_id: String,
    /// Names of matched rules, in rule-set order.
    pub matched_rules: Vec<String>,
    /// Concatenated actions of the matched rules, in rule-set order.
    pub actions: Vec<Action>,
    pub rule_errors: Vec<RuleFailure>,
}

impl MessageDecision {
    pub fn is_match(&self) -> bool {
        !self.matched_rules.is_empty()
    }
}

/// One requested mutation, ready to hand to a dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    pub message_id: String,
    pub action: Action,
}

/// Result of running the engine over a batch of messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineRun {
    pub decisions: Vec<MessageDecision>,
    /// Messages skipped because a condition needed a field they lack.
    pub skipped: Vec<MessageDataError>,
}

impl EngineRun {
    /// Every requested action, in message order then rule order.
    pub fn planned_actions(&self) -> Vec<PlannedAction> {
        self.decisions
            .iter()
            .flat_map(|d| {
                d.actions.iter().map(|action| PlannedAction {
                    message_id: d.message_id.clone(),
                    action: action.clone(),
                })
            })
            .collect()
    }

    pub fn matched_count(&self) -> usize {
        self.decisions.iter().filter(|d| d.is_match()).count()
    }
}

impl RuleEngine {
    /// Construct an engine from already-validated rules. Order is preserved.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Load and validate the rule document at `path`.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, RuleSpecificationError> {
        Ok(Self::new(load_rules(path)?))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule against one message.
    ///
    /// A rule whose condition cannot be interpreted is recorded in
    /// `rule_errors` and treated as not matching. A missing message field
    /// aborts the whole message.
    pub fn evaluate(
        &self,
        message: &MessageRecord,
        now: DateTime<Utc>,
    ) -> Result<MessageDecision, MessageDataError> {
        let mut decision = MessageDecision {
            message_id: message.id.clone(),
            matched_rules: Vec::new(),
            actions: Vec::new(),
            rule_errors: Vec::new(),
        };

        for rule in &self.rules {
            match rule_matches(rule, message, now) {
                Ok(true) => {
                    debug!(rule = %rule.name, message_id = %message.id, "Rule matched");
                    decision.matched_rules.push(rule.name.clone());
                    decision.actions.extend(rule.actions.iter().cloned());
                }
                Ok(false) => {}
                Err(EvaluationError::Configuration(error)) => {
                    warn!(
                        rule = %rule.name,
                        message_id = %message.id,
                        error = %error,
                        "Skipping rule for message"
                    );
                    decision.rule_errors.push(RuleFailure {
                        rule: rule.name.clone(),
                        error,
                    });
                }
                Err(EvaluationError::MessageData(error)) => return Err(error),
            }
        }

        Ok(decision)
    }

    /// Evaluate a batch of messages.
    ///
    /// Malformed messages are logged and listed in `skipped`; they never stop
    /// the rest of the batch.
    pub fn run<'a>(
        &self,
        messages: impl IntoIterator<Item = &'a MessageRecord>,
        now: DateTime<Utc>,
    ) -> EngineRun {
        let mut run = EngineRun::default();
        for message in messages {
            match self.evaluate(message, now) {
                Ok(decision) => run.decisions.push(decision),
                Err(error) => {
                    warn!(message_id = %message.id, error = %error, "Skipping malformed message");
                    run.skipped.push(error);
                }
            }
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::rules::loader::parse_rules;
    use crate::rules::model::{Combinator, Condition, DatePredicate, RelativeOffset};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    fn message(id: &str, sender: &str, subject: &str, age_days: i64) -> MessageRecord {
        MessageRecord {
            id: id.into(),
            external_id: format!("ext-{id}"),
            sender: Some(sender.into()),
            subject: Some(subject.into()),
            body: Some("hello".into()),
            received_at: Some(now() - Duration::days(age_days)),
            is_read: false,
            labels: vec!["INBOX".into()],
        }
    }

    const RULES: &str = r#"[
        {
            "name": "No Reply",
            "type": "all",
            "condition": [
                {"field": "from", "predicate": "contains", "value": "noreply"},
                {"field": "date received", "predicate": "greater than", "value": "2 D"}
            ],
            "action": [
                {"type": "mark", "value": "read"},
                {"type": "move", "value": "NoReply"}
            ]
        },
        {
            "name": "Tax",
            "type": "any",
            "condition": [
                {"field": "subject", "predicate": "contains", "value": "income tax"},
                {"field": "from", "predicate": "equals", "value": "irs@gov.example"}
            ],
            "action": [{"type": "move", "value": "Tax"}]
        }
    ]"#;

    fn engine() -> RuleEngine {
        RuleEngine::new(parse_rules(RULES, "test").unwrap())
    }

    #[test]
    fn old_noreply_mail_is_read_and_moved() {
        let msg = message("m1", "noreply@shop.example", "Your order", 5);
        let decision = engine().evaluate(&msg, now()).unwrap();
        assert_eq!(decision.matched_rules, vec!["No Reply"]);
        assert_eq!(
            decision.actions,
            vec![Action::mark_read(), Action::move_to("NoReply")]
        );
    }

    #[test]
    fn recent_no_reply_sender_within_thirty_days() {
        let rules = parse_rules(
            r#"[{
                "name": "No Reply", "type": "all",
                "condition": [
                    {"field": "from", "predicate": "contains", "value": "no-reply"},
                    {"field": "date received", "predicate": "less than", "value": "30 D"}
                ],
                "action": [
                    {"type": "mark", "value": "read"},
                    {"type": "move", "value": "NoReply"}
                ]
            }]"#,
            "test",
        )
        .unwrap();
        let msg = message("m1", "no-reply@service.com", "Weekly digest", 5);
        let decision = RuleEngine::new(rules).evaluate(&msg, now()).unwrap();
        assert_eq!(
            decision.actions,
            vec![Action::mark_read(), Action::move_to("NoReply")]
        );
    }

    #[test]
    fn income_tax_in_subject_or_body() {
        let rules = parse_rules(
            r#"[{
                "name": "Tax", "type": "any",
                "condition": [
                    {"field": "subject", "predicate": "contains", "value": "income tax"},
                    {"field": "message", "predicate": "contains", "value": "income tax"}
                ],
                "action": [{"type": "move", "value": "Tax"}]
            }]"#,
            "test",
        )
        .unwrap();
        let msg = message("m1", "bank@example.com", "Annual income tax statement", 3);
        let decision = RuleEngine::new(rules).evaluate(&msg, now()).unwrap();
        assert!(decision.is_match());
        assert_eq!(decision.actions, vec![Action::move_to("Tax")]);
    }

    #[test]
    fn recent_noreply_mail_does_not_match() {
        let msg = message("m1", "noreply@shop.example", "Your order", 1);
        let decision = engine().evaluate(&msg, now()).unwrap();
        assert!(!decision.is_match());
        assert!(decision.actions.is_empty());
    }

    #[test]
    fn tax_subject_matches_any_rule() {
        let msg = message("m2", "accountant@firm.example", "Income Tax return 2025", 0);
        let decision = engine().evaluate(&msg, now()).unwrap();
        assert_eq!(decision.matched_rules, vec!["Tax"]);
        assert_eq!(decision.actions, vec![Action::move_to("Tax")]);
    }

    #[test]
    fn actions_concatenate_in_rule_order() {
        let msg = message("m3", "noreply@irs.example", "Income tax notice", 10);
        let decision = engine().evaluate(&msg, now()).unwrap();
        assert_eq!(decision.matched_rules, vec!["No Reply", "Tax"]);
        assert_eq!(
            decision.actions,
            vec![
                Action::mark_read(),
                Action::move_to("NoReply"),
                Action::move_to("Tax"),
            ]
        );
    }

    #[test]
    fn run_skips_malformed_messages() {
        let good = message("good", "noreply@shop.example", "Order", 5);
        let mut bad = message("bad", "x@example.com", "Hi", 5);
        bad.sender = None;
        let other = message("other", "bob@example.com", "Lunch?", 0);

        let run = engine().run([&good, &bad, &other], now());
        assert_eq!(run.decisions.len(), 2);
        assert_eq!(run.skipped.len(), 1);
        assert_eq!(run.skipped[0].message_id, "bad");
        assert_eq!(run.matched_count(), 1);

        let planned = run.planned_actions();
        assert_eq!(
            planned,
            vec![
                PlannedAction {
                    message_id: "good".into(),
                    action: Action::mark_read(),
                },
                PlannedAction {
                    message_id: "good".into(),
                    action: Action::move_to("NoReply"),
                },
            ]
        );
    }

    #[test]
    fn no_match_plans_nothing() {
        let msg = message("m1", "friend@example.com", "Dinner", 1);
        let run = engine().run([&msg], now());
        assert!(run.planned_actions().is_empty());
        assert_eq!(run.matched_count(), 0);
    }

    #[test]
    fn unevaluable_rule_is_skipped_but_others_apply() {
        let rules = vec![
            Rule {
                name: "ancient".into(),
                description: None,
                combinator: Combinator::All,
                conditions: vec![Condition::DateReceived {
                    predicate: DatePredicate::GreaterThan,
                    offset: RelativeOffset::days(u32::MAX),
                }],
                actions: vec![Action::move_to("Archive")],
            },
            Rule {
                name: "everything".into(),
                description: None,
                combinator: Combinator::Any,
                conditions: vec![Condition::DateReceived {
                    predicate: DatePredicate::LessThan,
                    offset: RelativeOffset::days(30),
                }],
                actions: vec![Action::mark_read()],
            },
        ];
        let engine = RuleEngine::new(rules);
        let msg = message("m1", "a@example.com", "s", 1);
        let decision = engine.evaluate(&msg, now()).unwrap();
        assert_eq!(decision.matched_rules, vec!["everything"]);
        assert_eq!(decision.rule_errors.len(), 1);
        assert_eq!(decision.rule_errors[0].rule, "ancient");
    }

    #[test]
    fn repeated_runs_are_identical() {
        let messages = vec![
            message("a", "noreply@shop.example", "Order", 5),
            message("b", "irs@gov.example", "Notice", 40),
            message("c", "friend@example.com", "Hi", 0),
        ];
        let engine = engine();
        let first = engine.run(&messages, now());
        let second = engine.run(&messages, now());
        assert_eq!(first, second);
    }

    #[test]
    fn empty_engine_matches_nothing() {
        let engine = RuleEngine::default();
        assert!(engine.is_empty());
        let msg = message("m1", "a@example.com", "s", 1);
        let decision = engine.evaluate(&msg, now()).unwrap();
        assert!(!decision.is_match());
    }
}
