use serde_json::Value;
use tracing::warn;

use crate::modules::action::{Action, truncate};

const MISSING_REASON: &str = "no reason given";

/// Recovers `{"action", "reason"}` from model output.
///
/// Clean JSON is decoded directly. Otherwise the span from the first `{` to the last
/// `}` is decoded, which covers replies wrapped in prose or markdown fences. Anything
/// else becomes [`Action::fallback`].
pub fn parse(raw: Option<&str>) -> Action {
    let Some(raw) = raw else {
        return Action::fallback();
    };
    let output = raw.trim();
    if output.is_empty() {
        return Action::fallback();
    }

    if output.starts_with('{') {
        if let Some(action) = try_decode(output) {
            return action;
        }
    }

    if let (Some(start), Some(end)) = (output.find('{'), output.rfind('}')) {
        if end > start {
            if let Some(action) = try_decode(&output[start..=end]) {
                return action;
            }
        }
    }

    warn!(raw = %truncate(output, 200), "could not parse action from model output");
    Action::fallback()
}

fn try_decode(text: &str) -> Option<Action> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    let action = coerce(object.get("action")?)?;
    if action.trim().is_empty() {
        return None;
    }
    let reason = object
        .get("reason")
        .and_then(coerce)
        .unwrap_or_else(|| MISSING_REASON.to_string());
    Some(Action::new(action, reason))
}

fn coerce(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
