use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;

static TRAILING_COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex"));

/// Result of running caption text through the repair pipeline.
#[derive(Debug)]
pub enum ParseOutcome {
    /// Parsed as-is.
    Clean(Value),
    /// Parsed only after textual repair.
    Repaired(Value),
    /// Still unparseable after repair.
    Unrepaired(serde_json::Error),
}

impl ParseOutcome {
    pub fn into_value(self) -> Option<Value> {
        match self {
            ParseOutcome::Clean(v) | ParseOutcome::Repaired(v) => Some(v),
            ParseOutcome::Unrepaired(_) => None,
        }
    }
}

/// Applies the bounded set of textual fixes for common syntax defects in
/// upstream API output. Currently: trailing commas before a closing brace
/// or bracket.
pub fn fix_json_text(content: &str) -> Cow<'_, str> {
    TRAILING_COMMA_RE.replace_all(content, "$1")
}

/// Parses raw caption text, retrying once after repair. No I/O happens here.
pub fn parse_or_repair(content: &str) -> ParseOutcome {
    match serde_json::from_str(content) {
        Ok(value) => ParseOutcome::Clean(value),
        Err(_) => {
            let fixed = fix_json_text(content);
            match serde_json::from_str(&fixed) {
                Ok(value) => ParseOutcome::Repaired(value),
                Err(err) => ParseOutcome::Unrepaired(err),
            }
        }
    }
}
