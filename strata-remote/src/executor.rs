//! Remote call executor.
//!
//! Builds and issues calls to the partner service: resolves the endpoint
//! template, injects the bearer token, signs the payload, enforces the
//! per-call timeout, and classifies the response. No retries happen here;
//! transient failures are classified and left to the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT_CHARSET, AUTHORIZATION, CONNECTION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use strata_core::error::{ConfigError, RemoteError, StrataResult};
use strata_core::{RejectionPolicy, ResolutionConfig};
use tracing::warn;

use crate::endpoint::EndpointTemplate;
use crate::ledger::CallLedger;
use crate::signer::RequestSigner;
use crate::token::AccessTokenProvider;

/// A fully-specified outbound call.
#[derive(Debug, Clone)]
pub struct RemoteCall {
    /// Raw endpoint template, `"<METHOD>:<url-with-{TOKEN}s>"`.
    pub template: String,
    /// Values for the template's tokens.
    pub path_params: HashMap<String, String>,
    /// Token scope, normally the entity kind name.
    pub scope: String,
    /// Domain fields of the request body.
    pub payload: Map<String, Value>,
    /// Per-call timeout.
    pub timeout: Duration,
}

/// A successfully parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteBody {
    /// `application/json` response.
    Json(Value),
    /// `text/plain` or `text/html` response.
    Text(String),
}

/// Executor for calls to the remote partner service.
pub struct RemoteCallExecutor {
    client: Client,
    tokens: Arc<dyn AccessTokenProvider>,
    signer: Option<RequestSigner>,
    ledger: Option<Arc<CallLedger>>,
}

impl RemoteCallExecutor {
    pub fn new(tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            client: Client::new(),
            tokens,
            signer: None,
            ledger: None,
        }
    }

    /// Sign outbound payloads with the given signer.
    pub fn with_signer(mut self, signer: RequestSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Record calls into the given ledger (subject to the per-config toggles).
    pub fn with_ledger(mut self, ledger: Arc<CallLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Execute a call.
    ///
    /// Returns `Ok(None)` only when a >= 400 response was suppressed under
    /// [`RejectionPolicy::FailOpen`]; every other outcome is either a
    /// parsed body or a classified error.
    pub async fn execute(
        &self,
        config: &ResolutionConfig,
        call: RemoteCall,
    ) -> StrataResult<Option<RemoteBody>> {
        let endpoint = EndpointTemplate::parse(&call.template)?;
        let resolved = endpoint.resolve(&call.path_params)?;

        let token = self.tokens.access_token(&call.scope).await?;

        let mut payload = call.payload;
        if let Some(signer) = &self.signer {
            signer.apply(&mut payload);
        }
        let request_body = serde_json::to_string(&Value::Object(payload)).map_err(|e| {
            RemoteError::MalformedResponse {
                url: resolved.url.clone(),
                reason: format!("request serialization failed: {}", e),
            }
        })?;

        let method = Method::from_bytes(resolved.method.as_bytes()).map_err(|_| {
            ConfigError::MalformedTemplate {
                template: call.template.clone(),
                reason: format!("'{}' is not an HTTP method", resolved.method),
            }
        })?;

        let timeout_ms = call.timeout.as_millis() as u64;
        let response = self
            .client
            .request(method, &resolved.url)
            .timeout(call.timeout)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(CONTENT_TYPE, "application/json")
            .header(CONNECTION, "keep-alive")
            .header(ACCEPT_CHARSET, "utf-8")
            .body(request_body.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Timeout {
                        url: resolved.url.clone(),
                        timeout_ms,
                    }
                } else {
                    RemoteError::Transport {
                        url: resolved.url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_lowercase())
            .unwrap_or_default();

        let body = response.text().await.map_err(|e| RemoteError::Transport {
            url: resolved.url.clone(),
            reason: format!("failed to read response body: {}", e),
        })?;

        self.record(config, &call.template, &request_body, Some(&body));

        if status.as_u16() >= 400 {
            let message = extract_error_message(&body);
            let rejected = RemoteError::ServerRejected {
                status: status.as_u16(),
                message,
            };
            return match config.rejection_policy {
                RejectionPolicy::FailClosed => Err(rejected.into()),
                RejectionPolicy::FailOpen => {
                    warn!(url = %resolved.url, error = %rejected, "remote rejection suppressed");
                    Ok(None)
                }
            };
        }

        parse_success(&resolved.url, &content_type, body).map(Some)
    }

    fn record(
        &self,
        config: &ResolutionConfig,
        endpoint: &str,
        request: &str,
        response: Option<&str>,
    ) {
        if let Some(ledger) = &self.ledger {
            ledger.record(&config.ledger, endpoint, request, response, false);
        }
    }
}

impl std::fmt::Debug for RemoteCallExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCallExecutor")
            .field("signer", &self.signer.is_some())
            .field("ledger", &self.ledger.is_some())
            .finish()
    }
}

/// Parse a success body by its content type.
fn parse_success(url: &str, content_type: &str, body: String) -> StrataResult<RemoteBody> {
    match content_type {
        "application/json" => serde_json::from_str(&body)
            .map(RemoteBody::Json)
            .map_err(|e| {
                RemoteError::MalformedResponse {
                    url: url.to_string(),
                    reason: format!("invalid JSON body: {}", e),
                }
                .into()
            }),
        "text/plain" | "text/html" => Ok(RemoteBody::Text(body)),
        other => Err(RemoteError::UnsupportedContentType {
            url: url.to_string(),
            content_type: other.to_string(),
        }
        .into()),
    }
}

/// Extract a human-readable message from an error response body.
///
/// JSON bodies contribute their `error` and `message` fields, combined
/// with ` - ` after dropping empties and duplicates. Non-JSON bodies are
/// treated as HTML/text: everything from the first `<!DOCTYPE` marker
/// onward is stripped and the remainder trimmed.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        let mut parts: Vec<String> = Vec::new();
        for field in ["error", "message"] {
            let Some(value) = map.get(field) else { continue };
            let text = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            if !text.is_empty() && !parts.contains(&text) {
                parts.push(text);
            }
        }
        if !parts.is_empty() {
            return parts.join(" - ");
        }
        return body.trim().to_string();
    }

    let cut = body.find("<!DOCTYPE").or_else(|| body.find("<!doctype"));
    match cut {
        Some(index) => body[..index].trim().to_string(),
        None => body.trim().to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_extraction_combines_error_and_message() {
        let message = extract_error_message(r#"{"error":"x","message":"y"}"#);
        assert_eq!(message, "x - y");
    }

    #[test]
    fn test_error_extraction_deduplicates() {
        let message = extract_error_message(r#"{"error":"quota","message":"quota"}"#);
        assert_eq!(message, "quota");
    }

    #[test]
    fn test_error_extraction_skips_empty_fields() {
        let message = extract_error_message(r#"{"error":"","message":"only this"}"#);
        assert_eq!(message, "only this");
    }

    #[test]
    fn test_error_extraction_strips_doctype() {
        let body = "Fatal: upstream exploded  <!DOCTYPE html><html><body>500</body></html>";
        assert_eq!(extract_error_message(body), "Fatal: upstream exploded");
    }

    #[test]
    fn test_error_extraction_lowercase_doctype() {
        let body = "warning line\n<!doctype html><html></html>";
        assert_eq!(extract_error_message(body), "warning line");
    }

    #[test]
    fn test_error_extraction_plain_text_is_trimmed() {
        assert_eq!(extract_error_message("  service unavailable \n"), "service unavailable");
    }

    #[test]
    fn test_error_extraction_json_without_known_fields() {
        let message = extract_error_message(r#"{"detail":"weird shape"}"#);
        assert_eq!(message, r#"{"detail":"weird shape"}"#);
    }

    #[test]
    fn test_error_extraction_non_string_values() {
        let message = extract_error_message(r#"{"error":404,"message":"gone"}"#);
        assert_eq!(message, "404 - gone");
    }

    #[test]
    fn test_parse_success_json() {
        let body = parse_success("https://x", "application/json", r#"{"a":1}"#.to_string())
            .expect("json should parse");
        assert_eq!(body, RemoteBody::Json(json!({"a": 1})));
    }

    #[test]
    fn test_parse_success_text_variants() {
        let plain = parse_success("https://x", "text/plain", "hello".to_string())
            .expect("text should parse");
        assert_eq!(plain, RemoteBody::Text("hello".to_string()));

        let html = parse_success("https://x", "text/html", "<p>hi</p>".to_string())
            .expect("html should parse");
        assert_eq!(html, RemoteBody::Text("<p>hi</p>".to_string()));
    }

    #[test]
    fn test_parse_success_rejects_unknown_content_type() {
        let err = parse_success("https://x", "application/octet-stream", String::new())
            .expect_err("unknown content type should fail");
        assert!(matches!(
            err,
            strata_core::StrataError::Remote(RemoteError::UnsupportedContentType { content_type, .. })
                if content_type == "application/octet-stream"
        ));
    }

    #[test]
    fn test_parse_success_invalid_json_is_malformed() {
        let err = parse_success("https://x", "application/json", "not json".to_string())
            .expect_err("invalid json should fail");
        assert!(matches!(
            err,
            strata_core::StrataError::Remote(RemoteError::MalformedResponse { .. })
        ));
    }
}
