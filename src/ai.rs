//! Assistant panel plumbing: prompt builders, tolerant response parsing, the
//! Gemini HTTP client, and the per-tool guard against stale responses.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::models::SuggestedTask;

pub const GEMINI_TEXT_MODEL: &str = "gemini-2.5-flash";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 45;

#[derive(Debug)]
pub enum AiError {
    /// No credential configured; the AI surface must be disabled, not attempted.
    MissingApiKey,
    /// Transport failure or non-success HTTP status.
    Http(String),
    /// The upstream answered, but nothing usable could be recovered from it.
    Malformed(String),
}

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiError::MissingApiKey => write!(f, "missing gemini api key"),
            AiError::Http(msg) => write!(f, "ai request failed: {msg}"),
            AiError::Malformed(msg) => write!(f, "malformed ai response: {msg}"),
        }
    }
}

impl std::error::Error for AiError {}

pub fn summarize_prompt(text: &str) -> String {
    format!(
        "Summarize the following text concisely, focusing on the key points and actionable \
         information:\n\nText:\n\"\"\"{text}\"\"\"\n\nConcise Summary:"
    )
}

pub fn breakdown_prompt(topic: &str) -> String {
    format!(
        "Break down the following topic or project into a list of 5-7 key components, steps, \
         or related ideas: \"{topic}\". Return these as a JSON array of strings. For example: \
         [\"Component 1\", \"Step 2\", \"Related Idea 3\"]."
    )
}

pub fn suggest_tasks_prompt(project_description: &str) -> String {
    format!(
        "Given the project description: \"{project_description}\", generate a list of 3-5 \
         actionable sub-tasks. For each sub-task, provide a concise 'title' and a brief \
         'description'. Return the tasks as a JSON array of objects, where each object has \
         'title' (string) and 'description' (string) keys.\n\n\
         Example response format:\n\
         ```json\n\
         [\n\
           {{ \"title\": \"Initial Research\", \"description\": \"Gather background information and define project scope.\" }},\n\
           {{ \"title\": \"Outline Key Deliverables\", \"description\": \"List all major outputs expected from the project.\" }}\n\
         ]\n\
         ```\n\n\
         Suggested Tasks (JSON):"
    )
}

/// Converts free-form AI output into task drafts.
///
/// Strict JSON is attempted first: an array of `{title, description}` objects,
/// with a plain string entry tolerated as a bare title. On JSON failure the
/// text is reinterpreted as bullet-like lines. An empty JSON array is a
/// legitimate "no suggestions"; anything unrecoverable is a reported error,
/// never a silently empty list.
pub fn parse_suggested_tasks(text: &str) -> Result<Vec<SuggestedTask>, AiError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AiError::Malformed("empty ai response".to_string()));
    }

    let candidate = strip_fenced_code_block(trimmed).unwrap_or(trimmed);

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return suggestions_from_value(value);
    }

    let lines = bullet_lines(candidate);
    if !lines.is_empty() {
        return Ok(lines
            .into_iter()
            .map(|title| SuggestedTask {
                title,
                description: String::new(),
            })
            .collect());
    }

    Err(AiError::Malformed(
        "response is neither json nor a bullet list".to_string(),
    ))
}

/// Parses a project-breakdown response: ideally a JSON array of strings.
/// Valid JSON of the wrong shape degrades to the raw text as a single item;
/// bullet-like plain text degrades to its lines.
pub fn parse_breakdown(text: &str) -> Result<Vec<String>, AiError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AiError::Malformed("empty ai response".to_string()));
    }

    let candidate = strip_fenced_code_block(trimmed).unwrap_or(trimmed);

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        if let Value::Array(items) = &value {
            if items.iter().all(|item| item.is_string()) {
                return Ok(items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect());
            }
        }
        return Ok(vec![candidate.to_string()]);
    }

    let lines = bullet_lines(candidate);
    if !lines.is_empty() {
        return Ok(lines);
    }

    Err(AiError::Malformed(
        "response is neither json nor a bullet list".to_string(),
    ))
}

fn suggestions_from_value(value: Value) -> Result<Vec<SuggestedTask>, AiError> {
    let Value::Array(items) = value else {
        return Err(AiError::Malformed(
            "expected a json array of tasks".to_string(),
        ));
    };

    // An empty array is the model saying "nothing to suggest".
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for item in &items {
        match item {
            Value::String(title) => {
                let title = title.trim();
                if !title.is_empty() {
                    out.push(SuggestedTask {
                        title: title.to_string(),
                        description: String::new(),
                    });
                }
            }
            Value::Object(map) => {
                let Some(title) = map.get("title").and_then(|v| v.as_str()) else {
                    continue;
                };
                let title = title.trim();
                if title.is_empty() {
                    continue;
                }
                let description = map
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .trim()
                    .to_string();
                out.push(SuggestedTask {
                    title: title.to_string(),
                    description,
                });
            }
            _ => {}
        }
    }

    if out.is_empty() {
        return Err(AiError::Malformed(
            "json array contained no usable tasks".to_string(),
        ));
    }
    Ok(out)
}

fn bullet_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let stripped = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .or_else(|| line.strip_prefix("• "))
                .or_else(|| strip_numbered_prefix(line))?;
            let stripped = stripped.trim();
            (!stripped.is_empty()).then(|| stripped.to_string())
        })
        .collect()
}

fn strip_numbered_prefix(line: &str) -> Option<&str> {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return None;
    }
    rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))
}

fn strip_fenced_code_block(text: &str) -> Option<&str> {
    let mut s = text.trim();
    if !s.starts_with("```") {
        return None;
    }
    // Trim opening fence line.
    if let Some(pos) = s.find('\n') {
        s = &s[pos + 1..];
    } else {
        return None;
    }
    // Trim trailing fence.
    if let Some(end) = s.rfind("```") {
        return Some(s[..end].trim());
    }
    None
}

/// One-shot client for the generative-language API. Construction fails on an
/// absent credential so callers can disable the AI surface up front instead of
/// discovering it per request.
#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Result<Self, AiError> {
        Self::with_model(api_key, GEMINI_TEXT_MODEL)
    }

    pub fn with_model(api_key: &str, model: &str) -> Result<Self, AiError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AiError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| AiError::Http(format!("failed to build http client: {err}")))?;
        Ok(Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            http,
        })
    }

    pub async fn generate_text(&self, prompt: &str) -> Result<String, AiError> {
        let url = format!(
            "{GEMINI_API_BASE}/models/{model}:generateContent",
            model = self.model
        );
        let payload = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|err| AiError::Http(format!("gemini request failed: {err}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|err| AiError::Http(format!("failed to read gemini response: {err}")))?;

        if !status.is_success() {
            log::warn!("gemini http {status}");
            return Err(AiError::Http(format!("gemini http {status}: {text}")));
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|err| AiError::Malformed(format!("invalid gemini json: {err}")))?;

        let content = value["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(AiError::Malformed(
                "gemini response carried no candidate text".to_string(),
            ));
        }
        Ok(content)
    }

    pub async fn summarize(&self, text: &str) -> Result<String, AiError> {
        self.generate_text(&summarize_prompt(text)).await
    }

    pub async fn breakdown_project(&self, topic: &str) -> Result<Vec<String>, AiError> {
        let text = self.generate_text(&breakdown_prompt(topic)).await?;
        parse_breakdown(&text)
    }

    pub async fn suggest_tasks(
        &self,
        project_description: &str,
    ) -> Result<Vec<SuggestedTask>, AiError> {
        let text = self
            .generate_text(&suggest_tasks_prompt(project_description))
            .await?;
        parse_suggested_tasks(&text)
    }
}

/// Token identifying one issued request against a [`ResponseSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken(u64);

/// Per-tool output slot with a last-issued-wins discipline for overlapping
/// requests: only the most recently issued token may apply or append output,
/// so an earlier, slower response can never overwrite a fresher one.
#[derive(Clone, Default)]
pub struct ResponseSlot {
    inner: Arc<Mutex<SlotData>>,
}

#[derive(Default)]
struct SlotData {
    latest_issued: u64,
    text: Option<String>,
}

impl ResponseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new request and clears the displayed output. Any token
    /// issued earlier becomes stale immediately, even before it resolves.
    pub fn issue(&self) -> RequestToken {
        let mut guard = self.inner.lock().expect("slot poisoned");
        guard.latest_issued += 1;
        guard.text = None;
        RequestToken(guard.latest_issued)
    }

    /// Replaces the output if `token` is still the latest issued request.
    /// Returns whether the result was accepted.
    pub fn apply(&self, token: RequestToken, text: String) -> bool {
        let mut guard = self.inner.lock().expect("slot poisoned");
        if token.0 != guard.latest_issued {
            log::debug!("dropping stale ai response token={}", token.0);
            return false;
        }
        guard.text = Some(text);
        true
    }

    /// Appends one streamed increment, in arrival order, if `token` is still
    /// the latest issued request.
    pub fn append(&self, token: RequestToken, chunk: &str) -> bool {
        let mut guard = self.inner.lock().expect("slot poisoned");
        if token.0 != guard.latest_issued {
            return false;
        }
        guard.text.get_or_insert_with(String::new).push_str(chunk);
        true
    }

    pub fn current(&self) -> Option<String> {
        let guard = self.inner.lock().expect("slot poisoned");
        guard.text.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_of_title_description_objects() {
        let tasks = parse_suggested_tasks(
            r#"[
              { "title": "Initial Research", "description": "Gather background information." },
              { "title": "Outline Key Deliverables", "description": "List all major outputs." }
            ]"#,
        )
        .unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Initial Research");
        assert_eq!(tasks[1].description, "List all major outputs.");
    }

    #[test]
    fn maps_plain_string_array_to_empty_descriptions() {
        let tasks = parse_suggested_tasks(r#"["Task one", "Task two"]"#).unwrap();
        assert_eq!(
            tasks,
            vec![
                SuggestedTask {
                    title: "Task one".to_string(),
                    description: String::new(),
                },
                SuggestedTask {
                    title: "Task two".to_string(),
                    description: String::new(),
                },
            ]
        );
    }

    #[test]
    fn accepts_fenced_json_and_missing_descriptions() {
        let tasks = parse_suggested_tasks(
            "```json\n[{\"title\":\"a\"},{\"title\":\" b \",\"description\":42}]\n```",
        )
        .unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].description, "");
        assert_eq!(tasks[1].title, "b");
    }

    #[test]
    fn falls_back_to_bullet_lines() {
        let tasks = parse_suggested_tasks("- Buy milk\n* Walk dog\n3. Call mom\n\nnoise").unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Buy milk", "Walk dog", "Call mom"]);
        assert!(tasks.iter().all(|t| t.description.is_empty()));
    }

    #[test]
    fn empty_json_array_means_no_suggestions() {
        let tasks = parse_suggested_tasks("[]").unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn unrecoverable_text_is_a_typed_failure_not_an_empty_list() {
        let err = parse_suggested_tasks("nothing list-like in here at all").unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));

        let err = parse_suggested_tasks("   ").unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));

        // A JSON object is valid JSON but not a recoverable shape.
        let err = parse_suggested_tasks(r#"{"title":"not a list"}"#).unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));

        // An array with nothing usable must not collapse to Ok(vec![]).
        let err = parse_suggested_tasks("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));
    }

    #[test]
    fn breakdown_prefers_string_arrays() {
        let items = parse_breakdown(r#"["Research", "Design", "Build"]"#).unwrap();
        assert_eq!(items, vec!["Research", "Design", "Build"]);
    }

    #[test]
    fn breakdown_degrades_wrong_json_shape_to_raw_text() {
        let items = parse_breakdown(r#"{"steps": ["a", "b"]}"#).unwrap();
        assert_eq!(items, vec![r#"{"steps": ["a", "b"]}"#]);
    }

    #[test]
    fn breakdown_accepts_bullet_lines_and_rejects_prose() {
        let items = parse_breakdown("1. Plan\n2. Execute").unwrap();
        assert_eq!(items, vec!["Plan", "Execute"]);

        let err = parse_breakdown("just a paragraph of prose").unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));
    }

    #[test]
    fn client_requires_an_api_key() {
        assert!(matches!(
            GeminiClient::new("").unwrap_err(),
            AiError::MissingApiKey
        ));
        assert!(matches!(
            GeminiClient::new("   ").unwrap_err(),
            AiError::MissingApiKey
        ));
        assert!(GeminiClient::new("key-123").is_ok());
    }

    #[test]
    fn error_display_is_human_readable() {
        assert_eq!(AiError::MissingApiKey.to_string(), "missing gemini api key");
        assert_eq!(
            AiError::Http("boom".to_string()).to_string(),
            "ai request failed: boom"
        );
        assert!(AiError::Malformed("x".to_string())
            .to_string()
            .starts_with("malformed ai response"));
    }

    #[test]
    fn prompts_embed_the_user_input() {
        assert!(summarize_prompt("weekly report").contains("weekly report"));
        assert!(breakdown_prompt("ship v2").contains("\"ship v2\""));
        assert!(suggest_tasks_prompt("build a garden").contains("\"build a garden\""));
    }

    #[test]
    fn response_slot_last_issued_wins() {
        let slot = ResponseSlot::new();
        let first = slot.issue();
        let second = slot.issue();

        // The slower first request resolves after the second was issued: dropped.
        assert!(!slot.apply(first, "stale".to_string()));
        assert_eq!(slot.current(), None);

        assert!(slot.apply(second, "fresh".to_string()));
        assert_eq!(slot.current().as_deref(), Some("fresh"));

        // Re-applying the dead token still fails after the fact.
        assert!(!slot.apply(first, "zombie".to_string()));
        assert_eq!(slot.current().as_deref(), Some("fresh"));
    }

    #[test]
    fn response_slot_issue_clears_previous_output() {
        let slot = ResponseSlot::new();
        let token = slot.issue();
        assert!(slot.apply(token, "old output".to_string()));
        let _next = slot.issue();
        assert_eq!(slot.current(), None);
    }

    #[test]
    fn response_slot_streams_in_order_and_drops_stale_chunks() {
        let slot = ResponseSlot::new();
        let token = slot.issue();
        assert!(slot.append(token, "Hello"));
        assert!(slot.append(token, ", world"));
        assert_eq!(slot.current().as_deref(), Some("Hello, world"));

        let newer = slot.issue();
        assert!(!slot.append(token, " too late"));
        assert!(slot.append(newer, "restart"));
        assert_eq!(slot.current().as_deref(), Some("restart"));
    }
}
