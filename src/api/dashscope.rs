use crate::api::{ApiError, CaptionBackend, CaptionRequest, CaptionResponse, TokenUsage};
use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

const GENERATION_PATH: &str = "/services/aigc/multimodal-generation/generation";
const REQUEST_TIMEOUT_SECS: u64 = 600;
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the DashScope multimodal generation endpoint.
pub struct DashScopeClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl DashScopeClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            client,
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.settings.vid_caption.model.clone(),
        })
    }

    pub fn with_client(client: Client, api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

fn error_fields(root: &Value) -> (String, String) {
    let code = root
        .get("code")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let message = root
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    (code, message)
}

fn classify_http_failure(status: StatusCode, raw: &str) -> ApiError {
    let (code, message) = serde_json::from_str::<Value>(raw)
        .map(|root| error_fields(&root))
        .unwrap_or_else(|_| ("unknown".to_string(), raw.chars().take(200).collect()));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ApiError::Auth(format!("{}: {}", code, message))
        }
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(message),
        _ => ApiError::Api { code, message },
    }
}

/// Pulls the generated text out of `output.choices[0].message.content`.
/// The content arrives either as a plain string or as a list of segments
/// holding `text` entries.
fn extract_output_text(root: &Value) -> Option<String> {
    let message = root
        .get("output")?
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?;

    let content = message.get("content")?;
    if let Some(text) = content.as_str() {
        return Some(text.to_string());
    }

    let segments = content.as_array()?;
    let mut out = String::new();
    for segment in segments {
        if let Some(text) = segment.get("text").and_then(|v| v.as_str()) {
            out.push_str(text);
        }
    }
    if out.is_empty() { None } else { Some(out) }
}

fn extract_usage(root: &Value) -> TokenUsage {
    let usage = root.get("usage");
    let field = |name: &str| {
        usage
            .and_then(|u| u.get(name))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    };
    TokenUsage {
        input_tokens: field("input_tokens"),
        output_tokens: field("output_tokens"),
    }
}

#[async_trait]
impl CaptionBackend for DashScopeClient {
    async fn caption_video(&self, request: &CaptionRequest) -> Result<CaptionResponse, ApiError> {
        // Local files go up as file:// URIs, absolute paths only.
        let abs = request
            .video_path
            .canonicalize()
            .unwrap_or_else(|_| request.video_path.clone());
        let file_uri = format!("file://{}", abs.display());

        let body = json!({
            "model": self.model,
            "input": {
                "messages": [
                    {
                        "role": "user",
                        "content": [
                            {"video": file_uri, "fps": request.frame_sampling_fps},
                            {"text": format!("{}\n\n{}", request.system_prompt, request.user_prompt)},
                        ],
                    },
                ],
            },
            "parameters": {
                "result_format": "message",
                "response_format": {"type": "json_object"},
            },
        });

        let resp = self
            .client
            .post(format!("{}{}", self.base_url, GENERATION_PATH))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(ApiError::Network)?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(classify_http_failure(status, &raw));
        }

        let root: Value = serde_json::from_str(&raw).map_err(|_| {
            ApiError::MalformedResponse(raw.chars().take(200).collect::<String>())
        })?;

        // Some API failures come back with HTTP 200 and a code in the body.
        if root
            .get("code")
            .and_then(|v| v.as_str())
            .is_some_and(|c| !c.is_empty())
        {
            let (code, message) = error_fields(&root);
            return Err(ApiError::Api { code, message });
        }

        let usage = extract_usage(&root);
        let text = extract_output_text(&root)
            .ok_or_else(|| ApiError::MalformedResponse("no output text in response".to_string()))?;

        Ok(CaptionResponse { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_from_segment_list() {
        let root: Value = serde_json::from_str(
            r#"{
                "output": {"choices": [{"message": {"content": [
                    {"text": "{\"weather\""},
                    {"text": ": {}}"}
                ]}}]},
                "usage": {"input_tokens": 12, "output_tokens": 7}
            }"#,
        )
        .unwrap();
        assert_eq!(
            extract_output_text(&root).as_deref(),
            Some("{\"weather\": {}}")
        );
        let usage = extract_usage(&root);
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.total(), 19);
    }

    #[test]
    fn extracts_text_from_plain_string_content() {
        let root: Value = serde_json::from_str(
            r#"{"output": {"choices": [{"message": {"content": "hello"}}]}}"#,
        )
        .unwrap();
        assert_eq!(extract_output_text(&root).as_deref(), Some("hello"));
        assert_eq!(extract_usage(&root).total(), 0);
    }

    #[test]
    fn missing_output_is_none() {
        let root: Value = serde_json::from_str(r#"{"usage": {}}"#).unwrap();
        assert!(extract_output_text(&root).is_none());
    }

    #[test]
    fn http_failures_classify_by_status() {
        let raw = r#"{"code": "InvalidApiKey", "message": "Invalid API-key provided."}"#;
        assert!(matches!(
            classify_http_failure(StatusCode::UNAUTHORIZED, raw),
            ApiError::Auth(_)
        ));
        assert!(matches!(
            classify_http_failure(StatusCode::TOO_MANY_REQUESTS, raw),
            ApiError::RateLimited(_)
        ));
        match classify_http_failure(StatusCode::BAD_REQUEST, raw) {
            ApiError::Api { code, .. } => assert_eq!(code, "InvalidApiKey"),
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
