//! Typed rule entities.
//!
//! Everything here is produced by the loader from the raw JSON document and
//! stays immutable afterwards. Conditions are a closed enum per field type,
//! so a date predicate can never be paired with a text field.

use std::fmt;

use chrono::TimeDelta;
use serde::Serialize;

/// Days counted for one month in relative date offsets.
pub const DAYS_PER_MONTH: i64 = 30;

/// How a rule joins its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Logical OR.
    Any,
    /// Logical AND.
    All,
}

impl Combinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
        }
    }
}

/// Text fields of a message a condition can inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    From,
    Subject,
    Message,
}

impl TextField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::From => "from",
            Self::Subject => "subject",
            Self::Message => "message",
        }
    }
}

/// Comparisons available on text fields. All are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPredicate {
    Contains,
    DoesNotContain,
    Equals,
    DoesNotEqual,
}

impl TextPredicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::DoesNotContain => "does not contain",
            Self::Equals => "equals",
            Self::DoesNotEqual => "does not equal",
        }
    }
}

/// Comparisons available on the received date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePredicate {
    /// Received within the offset, i.e. more recently than `now - offset`.
    LessThan,
    /// Received before `now - offset`.
    GreaterThan,
}

impl DatePredicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LessThan => "less than",
            Self::GreaterThan => "greater than",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetUnit {
    Days,
    Months,
}

/// A relative age such as `30 D` or `6 M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelativeOffset {
    pub amount: u32,
    pub unit: OffsetUnit,
}

impl RelativeOffset {
    pub fn days(amount: u32) -> Self {
        Self {
            amount,
            unit: OffsetUnit::Days,
        }
    }

    pub fn months(amount: u32) -> Self {
        Self {
            amount,
            unit: OffsetUnit::Months,
        }
    }

    /// Length of the offset in days. Months count as [`DAYS_PER_MONTH`] days.
    pub fn total_days(&self) -> i64 {
        let amount = i64::from(self.amount);
        match self.unit {
            OffsetUnit::Days => amount,
            OffsetUnit::Months => amount * DAYS_PER_MONTH,
        }
    }

    /// The offset as a duration, or `None` when it does not fit one.
    pub fn to_duration(&self) -> Option<TimeDelta> {
        TimeDelta::try_days(self.total_days())
    }

    /// Parse the `<integer> <D|M>` literal used in rule documents.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut parts = raw.split_whitespace();
        let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!(
                "expected '<number> <D|M>' (e.g. '30 D'), got '{raw}'"
            ));
        };

        let amount: u32 = amount
            .parse()
            .map_err(|_| format!("'{amount}' is not a non-negative whole number"))?;

        let unit = match unit.to_ascii_lowercase().as_str() {
            "d" => OffsetUnit::Days,
            "m" => OffsetUnit::Months,
            other => return Err(format!("unknown unit '{other}', expected D or M")),
        };

        Ok(Self { amount, unit })
    }
}

impl fmt::Display for RelativeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            OffsetUnit::Days => "D",
            OffsetUnit::Months => "M",
        };
        write!(f, "{} {}", self.amount, unit)
    }
}

/// One field/predicate/value test against a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Text {
        field: TextField,
        predicate: TextPredicate,
        /// Stored lowercase; only the message side is folded at evaluation.
        value: String,
    },
    DateReceived {
        predicate: DatePredicate,
        offset: RelativeOffset,
    },
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text {
                field,
                predicate,
                value,
            } => write!(f, "{} {} '{}'", field.as_str(), predicate.as_str(), value),
            Self::DateReceived { predicate, offset } => {
                write!(f, "date received {} {}", predicate.as_str(), offset)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadState {
    Read,
    Unread,
}

/// A requested mutation of a matched message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Mark { state: ReadState },
    Move { label: String },
}

impl Action {
    pub fn mark_read() -> Self {
        Self::Mark {
            state: ReadState::Read,
        }
    }

    pub fn mark_unread() -> Self {
        Self::Mark {
            state: ReadState::Unread,
        }
    }

    pub fn move_to(label: impl Into<String>) -> Self {
        Self::Move {
            label: label.into(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mark {
                state: ReadState::Read,
            } => write!(f, "mark read"),
            Self::Mark {
                state: ReadState::Unread,
            } => write!(f, "mark unread"),
            Self::Move { label } => write!(f, "move {label}"),
        }
    }
}

/// A named combination of conditions and the actions to request on a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub name: String,
    pub description: Option<String>,
    pub combinator: Combinator,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}
