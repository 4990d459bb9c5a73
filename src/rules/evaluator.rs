//! Single-condition evaluation.
//!
//! Pure functions: the reference instant is passed in, so the same
//! message, condition and `now` always give the same answer.

use chrono::{DateTime, Utc};

use crate::error::{ConfigurationError, EvaluationError, MessageDataError};
use crate::rules::model::{Condition, DatePredicate, RelativeOffset, TextField, TextPredicate};
use crate::store::MessageRecord;

/// Evaluate one condition against one message.
pub fn evaluate_condition(
    condition: &Condition,
    message: &MessageRecord,
    now: DateTime<Utc>,
) -> Result<bool, EvaluationError> {
    match condition {
        Condition::Text {
            field,
            predicate,
            value,
        } => {
            let actual = text_field(message, *field)?;
            Ok(text_matches(*predicate, actual, value))
        }
        Condition::DateReceived { predicate, offset } => {
            let received = message.received_at.ok_or_else(|| MessageDataError {
                message_id: message.id.clone(),
                field: "date received",
            })?;
            let cutoff = cutoff(*offset, now).map_err(|reason| ConfigurationError {
                condition: condition.to_string(),
                reason,
            })?;
            Ok(match predicate {
                DatePredicate::LessThan => received > cutoff,
                DatePredicate::GreaterThan => received < cutoff,
            })
        }
    }
}

/// The instant `offset` before `now`.
pub fn cutoff(offset: RelativeOffset, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    offset
        .to_duration()
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(|| format!("offset {offset} reaches outside the representable date range"))
}

fn text_field(message: &MessageRecord, field: TextField) -> Result<&str, MessageDataError> {
    let value = match field {
        TextField::From => message.sender.as_deref(),
        TextField::Subject => message.subject.as_deref(),
        TextField::Message => message.body.as_deref(),
    };
    value.ok_or_else(|| MessageDataError {
        message_id: message.id.clone(),
        field: field.as_str(),
    })
}

/// `expected` is already lowercase; the loader folds rule values once.
fn text_matches(predicate: TextPredicate, actual: &str, expected: &str) -> bool {
    let actual = actual.to_lowercase();
    match predicate {
        TextPredicate::Contains => actual.contains(expected),
        TextPredicate::DoesNotContain => !actual.contains(expected),
        TextPredicate::Equals => actual == expected,
        TextPredicate::DoesNotEqual => actual != expected,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    fn message() -> MessageRecord {
        MessageRecord {
            id: "m1".into(),
            external_id: "ext-1".into(),
            sender: Some("NoReply@Shop.example".into()),
            subject: Some("Your Income Tax statement".into()),
            body: Some("Please find attached.".into()),
            received_at: Some(now() - Duration::days(5)),
            is_read: false,
            labels: vec!["INBOX".into()],
        }
    }

    fn text(field: TextField, predicate: TextPredicate, value: &str) -> Condition {
        Condition::Text {
            field,
            predicate,
            value: value.into(),
        }
    }

    fn date(predicate: DatePredicate, days: u32) -> Condition {
        Condition::DateReceived {
            predicate,
            offset: RelativeOffset::days(days),
        }
    }

    fn eval(condition: &Condition, message: &MessageRecord) -> bool {
        evaluate_condition(condition, message, now()).unwrap()
    }

    #[test]
    fn text_comparisons_ignore_message_case() {
        let msg = message();
        assert!(eval(&text(TextField::From, TextPredicate::Contains, "noreply"), &msg));
        assert!(eval(
            &text(TextField::Subject, TextPredicate::Contains, "income tax"),
            &msg
        ));
        assert!(eval(
            &text(TextField::From, TextPredicate::Equals, "noreply@shop.example"),
            &msg
        ));
        assert!(!eval(
            &text(TextField::Message, TextPredicate::Equals, "please find"),
            &msg
        ));
    }

    #[test]
    fn mixed_case_rule_value_matches_once_loaded() {
        let rules = crate::rules::loader::parse_rules(
            r#"[{
                "name": "Shop", "type": "all",
                "condition": [{"field": "from", "predicate": "equals", "value": "NOREPLY@shop.Example"}],
                "action": [{"type": "mark", "value": "read"}]
            }]"#,
            "test",
        )
        .unwrap();
        assert!(eval(&rules[0].conditions[0], &message()));
    }

    #[test]
    fn negated_predicates_are_complements() {
        let msg = message();
        for field in [TextField::From, TextField::Subject, TextField::Message] {
            for needle in ["tax", "zzz", "please find attached.", ""] {
                let contains = eval(&text(field, TextPredicate::Contains, needle), &msg);
                let not_contains = eval(&text(field, TextPredicate::DoesNotContain, needle), &msg);
                assert_ne!(contains, not_contains, "{field:?} / {needle}");

                let equals = eval(&text(field, TextPredicate::Equals, needle), &msg);
                let not_equals = eval(&text(field, TextPredicate::DoesNotEqual, needle), &msg);
                assert_ne!(equals, not_equals, "{field:?} / {needle}");
            }
        }
    }

    #[test]
    fn empty_needle_is_contained() {
        assert!(eval(&text(TextField::Subject, TextPredicate::Contains, ""), &message()));
    }

    #[test]
    fn date_predicates_relative_to_now() {
        let msg = message();
        assert!(eval(&date(DatePredicate::LessThan, 30), &msg));
        assert!(!eval(&date(DatePredicate::GreaterThan, 30), &msg));
        assert!(eval(&date(DatePredicate::GreaterThan, 2), &msg));
        assert!(!eval(&date(DatePredicate::LessThan, 2), &msg));
    }

    #[test]
    fn exact_boundary_matches_neither_predicate() {
        let mut msg = message();
        msg.received_at = Some(now() - Duration::days(5));
        assert!(!eval(&date(DatePredicate::LessThan, 5), &msg));
        assert!(!eval(&date(DatePredicate::GreaterThan, 5), &msg));
    }

    #[test]
    fn month_offset_is_thirty_days() {
        let mut msg = message();
        msg.received_at = Some(now() - Duration::days(31));
        let one_month = Condition::DateReceived {
            predicate: DatePredicate::GreaterThan,
            offset: RelativeOffset::months(1),
        };
        assert!(eval(&one_month, &msg));

        msg.received_at = Some(now() - Duration::days(29));
        assert!(!eval(&one_month, &msg));
    }

    #[test]
    fn zero_offset_compares_against_now() {
        let mut msg = message();
        msg.received_at = Some(now() + Duration::seconds(1));
        assert!(eval(&date(DatePredicate::LessThan, 0), &msg));
        msg.received_at = Some(now());
        assert!(!eval(&date(DatePredicate::LessThan, 0), &msg));
        assert!(!eval(&date(DatePredicate::GreaterThan, 0), &msg));
    }

    #[test]
    fn missing_text_field_is_message_data_error() {
        let mut msg = message();
        msg.subject = None;
        let err = evaluate_condition(
            &text(TextField::Subject, TextPredicate::DoesNotContain, "x"),
            &msg,
            now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EvaluationError::MessageData(MessageDataError {
                message_id: "m1".into(),
                field: "subject",
            })
        );
    }

    #[test]
    fn missing_received_date_is_message_data_error() {
        let mut msg = message();
        msg.received_at = None;
        let err = evaluate_condition(&date(DatePredicate::LessThan, 3), &msg, now()).unwrap_err();
        assert!(matches!(err, EvaluationError::MessageData(e) if e.field == "date received"));
    }

    #[test]
    fn unrepresentable_cutoff_is_configuration_error() {
        let huge = Condition::DateReceived {
            predicate: DatePredicate::GreaterThan,
            offset: RelativeOffset::months(u32::MAX),
        };
        let err = evaluate_condition(&huge, &message(), now()).unwrap_err();
        assert!(matches!(err, EvaluationError::Configuration(_)));

        let far = Condition::DateReceived {
            predicate: DatePredicate::GreaterThan,
            offset: RelativeOffset::days(u32::MAX),
        };
        let err = evaluate_condition(&far, &message(), now()).unwrap_err();
        assert!(matches!(err, EvaluationError::Configuration(_)));
    }

    #[test]
    fn same_inputs_same_answer() {
        let msg = message();
        let cond = date(DatePredicate::GreaterThan, 4);
        let first = eval(&cond, &msg);
        for _ in 0..10 {
            assert_eq!(eval(&cond, &msg), first);
        }
    }
}
