//! Discovery record stored under the discoveries key.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema version written alongside the discoveries collection.
pub const DISCOVERIES_VERSION: u32 = 1;

/// A dated note. Discoveries carry no identifier and may repeat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Discovery {
    /// Note text.
    pub text: String,
    /// Creation date (`YYYY-MM-DD`).
    pub date: String,
}

impl Discovery {
    /// Construct a discovery created on `date`.
    #[must_use]
    pub fn new(text: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            date: date.into(),
        }
    }

    /// Coerce an arbitrary stored entry into a discovery.
    ///
    /// Objects keep their `text` and `date`; anything else becomes a
    /// discovery whose text is the entry's string form. A missing date is
    /// filled with `today`.
    #[must_use]
    pub fn from_value(value: &Value, today: &str) -> Self {
        let (text, date) = match value {
            Value::Object(map) => {
                let text = match map.get("text") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => value.to_string(),
                    Some(other) => other.to_string(),
                };
                let date = map.get("date").and_then(Value::as_str).map(str::to_owned);
                (text, date)
            }
            Value::String(s) => (s.clone(), None),
            other => (other.to_string(), None),
        };
        Self {
            text,
            date: date
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| today.to_owned()),
        }
    }
}
