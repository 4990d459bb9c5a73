//! Rule document loading and validation.
//!
//! The document is a JSON list of rules (or an object with a `rules` list):
//!
//! ```json
//! [{
//!   "name": "No Reply",
//!   "description": "archive old no-reply mail",
//!   "type": "all",
//!   "condition": [
//!     {"field": "from", "predicate": "contains", "value": "noreply"},
//!     {"field": "date received", "predicate": "greater than", "value": "2 D"}
//!   ],
//!   "action": [
//!     {"type": "mark", "value": "read"},
//!     {"type": "move", "value": "NoReply"}
//!   ]
//! }]
//! ```
//!
//! Vocabulary is matched case-insensitively after trimming. Any problem
//! rejects the whole document; a partially loaded rule set is never returned.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::RuleSpecificationError;
use crate::rules::model::{
    Action, Combinator, Condition, DatePredicate, ReadState, RelativeOffset, Rule, TextField,
    TextPredicate,
};

/// Read and validate the rule document at `path`.
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<Rule>, RuleSpecificationError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| RuleSpecificationError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let rules = parse_rules(&raw, &path.display().to_string())?;
    info!(path = %path.display(), count = rules.len(), "Loaded rules");
    Ok(rules)
}

/// Validate an in-memory rule document. `origin` names it in error messages.
pub fn parse_rules(raw: &str, origin: &str) -> Result<Vec<Rule>, RuleSpecificationError> {
    let parse_error = |message: String| RuleSpecificationError::Parse {
        origin: origin.to_string(),
        message,
    };

    let document: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| parse_error(e.to_string()))?;

    let defs: Vec<RuleDef> = match document {
        serde_json::Value::Array(_) => {
            serde_json::from_value(document).map_err(|e| parse_error(e.to_string()))?
        }
        serde_json::Value::Object(mut obj) => match obj.remove("rules") {
            Some(list) => serde_json::from_value(list).map_err(|e| parse_error(e.to_string()))?,
            None => {
                return Err(parse_error(
                    "expected a list of rules or an object with a \"rules\" list".into(),
                ));
            }
        },
        _ => return Err(parse_error("expected a list of rules".into())),
    };

    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(defs.len());
    for (index, def) in defs.into_iter().enumerate() {
        let rule = validate_rule(index, def)?;
        if !seen.insert(rule.name.clone()) {
            return Err(RuleSpecificationError::DuplicateRule { name: rule.name });
        }
        debug!(
            rule = %rule.name,
            combinator = rule.combinator.as_str(),
            conditions = rule.conditions.len(),
            actions = rule.actions.len(),
            "Validated rule"
        );
        rules.push(rule);
    }

    Ok(rules)
}

// ── Raw document shape ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RuleDef {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    combinator: Option<String>,
    #[serde(default)]
    condition: Vec<ConditionDef>,
    #[serde(default)]
    action: Vec<ActionDef>,
}

#[derive(Debug, Deserialize)]
struct ConditionDef {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    predicate: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionDef {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

// ── Validation ──────────────────────────────────────────────────────

fn validate_rule(index: usize, def: RuleDef) -> Result<Rule, RuleSpecificationError> {
    let name = def
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    let rule_ref = match &name {
        Some(n) => format!("'{n}'"),
        None => format!("#{index}"),
    };
    let invalid = |attribute: &str, reason: String| {
        RuleSpecificationError::invalid(rule_ref.clone(), attribute, reason)
    };

    let Some(name) = name else {
        return Err(invalid("name", "missing or empty".into()));
    };

    let combinator = match def.combinator.as_deref().map(normalize) {
        Some(c) if c == "any" => Combinator::Any,
        Some(c) if c == "all" => Combinator::All,
        Some(other) => {
            return Err(invalid(
                "type",
                format!("unknown combinator '{other}', expected any or all"),
            ));
        }
        None => return Err(invalid("type", "missing".into())),
    };

    if def.condition.is_empty() {
        return Err(invalid("condition", "at least one condition is required".into()));
    }
    let conditions = def
        .condition
        .iter()
        .enumerate()
        .map(|(i, c)| validate_condition(c).map_err(|reason| invalid(&format!("condition[{i}]"), reason)))
        .collect::<Result<Vec<_>, _>>()?;

    if def.action.is_empty() {
        return Err(invalid("action", "at least one action is required".into()));
    }
    let actions = def
        .action
        .iter()
        .enumerate()
        .map(|(i, a)| validate_action(a).map_err(|reason| invalid(&format!("action[{i}]"), reason)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Rule {
        name,
        description: def.description.filter(|d| !d.trim().is_empty()),
        combinator,
        conditions,
        actions,
    })
}

fn validate_condition(def: &ConditionDef) -> Result<Condition, String> {
    let field = def.field.as_deref().map(normalize).ok_or("missing field")?;
    let predicate = def
        .predicate
        .as_deref()
        .map(normalize)
        .ok_or("missing predicate")?;
    let value = def.value.as_deref().ok_or("missing value")?;

    let text_field = match field.as_str() {
        "from" => Some(TextField::From),
        "subject" => Some(TextField::Subject),
        "message" | "body" => Some(TextField::Message),
        "date received" => None,
        other => return Err(format!("unknown field '{other}'")),
    };

    match text_field {
        Some(field) => {
            let predicate = match predicate.as_str() {
                "contains" => TextPredicate::Contains,
                "does not contain" | "not contains" => TextPredicate::DoesNotContain,
                "equals" => TextPredicate::Equals,
                "does not equal" | "not equals" => TextPredicate::DoesNotEqual,
                other => {
                    return Err(format!(
                        "predicate '{other}' is not valid for text field '{}'",
                        field.as_str()
                    ));
                }
            };
            Ok(Condition::Text {
                field,
                predicate,
                value: value.to_lowercase(),
            })
        }
        None => {
            let predicate = match predicate.as_str() {
                "less than" => DatePredicate::LessThan,
                "greater than" => DatePredicate::GreaterThan,
                other => {
                    return Err(format!(
                        "predicate '{other}' is not valid for field 'date received'"
                    ));
                }
            };
            let offset = RelativeOffset::parse(value)?;
            Ok(Condition::DateReceived { predicate, offset })
        }
    }
}

fn validate_action(def: &ActionDef) -> Result<Action, String> {
    let kind = def.kind.as_deref().map(normalize).ok_or("missing type")?;
    let value = def.value.as_deref().map(str::trim).unwrap_or_default();

    match kind.as_str() {
        "mark" => match value.to_lowercase().as_str() {
            "read" => Ok(Action::Mark {
                state: ReadState::Read,
            }),
            "unread" => Ok(Action::Mark {
                state: ReadState::Unread,
            }),
            other => Err(format!("mark expects read or unread, got '{other}'")),
        },
        "move" if value.is_empty() => Err("move requires a non-empty label".into()),
        "move" => Ok(Action::move_to(value)),
        other => Err(format!("unknown action type '{other}'")),
    }
}

/// Lowercase and collapse internal whitespace so `"Does  Not Contain "` matches.
fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
