//! Combining a rule's conditions under its combinator.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::EvaluationError;
use crate::rules::evaluator::evaluate_condition;
use crate::rules::model::{Combinator, Rule};
use crate::store::MessageRecord;

/// Whether `rule` matches `message`.
///
/// Conditions run in declared order and stop at the first one that decides
/// the result (first `true` for ANY, first `false` for ALL). An error from a
/// condition that is reached aborts the rule; conditions after the deciding
/// one are never evaluated, so they cannot fail it.
pub fn rule_matches(
    rule: &Rule,
    message: &MessageRecord,
    now: DateTime<Utc>,
) -> Result<bool, EvaluationError> {
    let decisive = matches!(rule.combinator, Combinator::Any);
    for condition in &rule.conditions {
        let result = evaluate_condition(condition, message, now)?;
        debug!(
            rule = %rule.name,
            message_id = %message.id,
            condition = %condition,
            result,
            "Evaluated condition"
        );
        if result == decisive {
            return Ok(decisive);
        }
    }
    Ok(!decisive)
}
