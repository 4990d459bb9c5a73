//! Rule authoring: turning answers collected by the `new-rule` command into
//! an entry of the rule document.
//!
//! Drafts are plain strings in the document's own vocabulary. A draft is
//! only written after the whole resulting document passes [`parse_rules`],
//! so the authoring path can never store a rule the loader would reject.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::RuleSpecificationError;
use crate::rules::loader::parse_rules;
use crate::rules::model::{Combinator, OffsetUnit, RelativeOffset};

pub const FIELDS: &[&str] = &["from", "subject", "message", "date received"];
pub const COMBINATORS: &[&str] = &["any", "all"];
pub const ACTION_TYPES: &[&str] = &["mark", "move"];
pub const READ_STATES: &[&str] = &["read", "unread"];

const TEXT_PREDICATES: &[&str] = &["contains", "does not contain", "equals", "does not equal"];
const DATE_PREDICATES: &[&str] = &["less than", "greater than"];

/// Predicates offered for `field`.
pub fn predicates_for(field: &str) -> &'static [&'static str] {
    if field == "date received" {
        DATE_PREDICATES
    } else {
        TEXT_PREDICATES
    }
}

/// The `"<n> D|M"` literal for a date condition value.
pub fn date_value(amount: u32, unit: OffsetUnit) -> String {
    RelativeOffset { amount, unit }.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionDraft {
    pub field: String,
    pub predicate: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDraft {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// One rule as it will appear in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub combinator: String,
    #[serde(rename = "condition")]
    pub conditions: Vec<ConditionDraft>,
    #[serde(rename = "action")]
    pub actions: Vec<ActionDraft>,
}

impl RuleDraft {
    pub fn new(name: impl Into<String>, combinator: Combinator) -> Self {
        Self {
            name: name.into(),
            description: None,
            combinator: combinator.as_str().to_string(),
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn condition(
        mut self,
        field: impl Into<String>,
        predicate: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.conditions.push(ConditionDraft {
            field: field.into(),
            predicate: predicate.into(),
            value: value.into(),
        });
        self
    }

    pub fn action(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.actions.push(ActionDraft {
            kind: kind.into(),
            value: value.into(),
        });
        self
    }
}

/// Append `draft` to the document `existing` (absent or blank means empty)
/// and return the new document, pretty-printed.
///
/// A document wrapped as `{"rules": [...]}` keeps its wrapper. The result is
/// validated as a whole, so a bad draft or a duplicate name is an error and
/// nothing is returned.
pub fn append_rule(
    existing: Option<&str>,
    origin: &str,
    draft: &RuleDraft,
) -> Result<String, RuleSpecificationError> {
    let parse_error = |message: String| RuleSpecificationError::Parse {
        origin: origin.to_string(),
        message,
    };

    let mut document = match existing.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => serde_json::from_str(raw).map_err(|e| parse_error(e.to_string()))?,
        None => serde_json::Value::Array(Vec::new()),
    };

    let entry = serde_json::to_value(draft).map_err(|e| parse_error(e.to_string()))?;
    let list = match &mut document {
        serde_json::Value::Array(list) => list,
        serde_json::Value::Object(obj) => match obj.get_mut("rules") {
            Some(serde_json::Value::Array(list)) => list,
            _ => {
                return Err(parse_error(
                    "expected a list of rules or an object with a \"rules\" list".into(),
                ));
            }
        },
        _ => return Err(parse_error("expected a list of rules".into())),
    };
    list.push(entry);

    let rendered =
        serde_json::to_string_pretty(&document).map_err(|e| parse_error(e.to_string()))?;
    parse_rules(&rendered, origin)?;
    Ok(rendered)
}

/// Append `draft` to the rule file at `path`, creating the file when it does
/// not exist. Returns the number of rules now in the file.
pub fn save_rule(path: impl AsRef<Path>, draft: &RuleDraft) -> Result<usize, RuleSpecificationError> {
    let path = path.as_ref();
    let io_error = |source| RuleSpecificationError::Io {
        path: path.display().to_string(),
        source,
    };

    let existing = match std::fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(io_error(e)),
    };

    let origin = path.display().to_string();
    let rendered = append_rule(existing.as_deref(), &origin, draft)?;
    let count = parse_rules(&rendered, &origin)?.len();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, rendered + "\n").map_err(io_error)?;

    info!(path = %path.display(), rule = %draft.name, count, "Saved rule");
    Ok(count)
}
