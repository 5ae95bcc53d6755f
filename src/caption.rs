use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bookkeeping keys the API pipeline attaches and the normalizer strips.
pub const METADATA_KEYS: &[&str] = &["usage_metadata", "file_metadata"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub file_size_mb: f64,
    pub analysis_timestamp: String,
    pub model_used: String,
    pub frame_sampling_enabled: bool,
    pub frame_sampling_fps: f64,
    pub sampling_method: String,
    pub resolution: String,
    pub video_length_seconds: f64,
    pub video_length_formatted: String,
}

/// Strips a leading markdown code fence (and its trailing ```), which some
/// models wrap around JSON output despite being asked not to.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let body = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Extracts the outermost `{...}` span from free-form model output.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start { Some(&text[start..=end]) } else { None }
}

/// Turns raw model output into a caption document, falling back to wrapping
/// the raw text when no JSON object can be recovered.
pub fn parse_caption_text(text: &str) -> Value {
    let body = strip_code_fence(text);
    if let Some(span) = extract_json_object(body) {
        if let Some(value) = crate::repair::parse_or_repair(span).into_value() {
            return value;
        }
    }
    serde_json::json!({
        "caption": text,
        "error": "JSON parse failed",
    })
}

/// Removes the bookkeeping keys from a top-level object. Returns whether
/// anything was removed; absent keys are not an error.
pub fn strip_metadata(doc: &mut Map<String, Value>) -> bool {
    let mut modified = false;
    for key in METADATA_KEYS {
        if doc.remove(*key).is_some() {
            modified = true;
        }
    }
    modified
}

/// Merges caption content with bookkeeping metadata into the document that
/// gets written to disk.
pub fn with_metadata(caption: Value, usage: &UsageMetadata, file: &FileMetadata) -> Value {
    let mut doc = match caption {
        Value::Object(map) => map,
        other => {
            // Non-object captions still get persisted, under a wrapper key.
            let mut map = Map::new();
            map.insert("caption".to_string(), other);
            map
        }
    };
    doc.insert(
        "usage_metadata".to_string(),
        serde_json::to_value(usage).unwrap_or(Value::Null),
    );
    doc.insert(
        "file_metadata".to_string(),
        serde_json::to_value(file).unwrap_or(Value::Null),
    );
    Value::Object(doc)
}
