//! Endpoint templates.
//!
//! A descriptor configures each remote operation as `"<METHOD>:<url>"`
//! where the url part may carry `{TOKEN}` placeholders, e.g.
//! `"POST:{FULL_DOMAIN}/v2/score"`. Tokens are substituted from a
//! per-call parameter map; any token left unresolved is a configuration
//! error, never a silently broken URL.

use std::collections::HashMap;
use strata_core::error::ConfigError;

/// A parsed but not yet resolved endpoint template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplate {
    method: String,
    url_template: String,
    raw: String,
}

/// A template with every token substituted, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub method: String,
    pub url: String,
}

impl EndpointTemplate {
    /// Parse `"<METHOD>:<url-template>"`.
    ///
    /// The method is uppercased; the url part is kept verbatim (it may
    /// itself contain `:` as in `https://`).
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let (method, url_template) = raw.split_once(':').ok_or_else(|| {
            ConfigError::MalformedTemplate {
                template: raw.to_string(),
                reason: "expected '<METHOD>:<url>'".to_string(),
            }
        })?;

        let method = method.trim();
        if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::MalformedTemplate {
                template: raw.to_string(),
                reason: format!("'{}' is not an HTTP method", method),
            });
        }
        if url_template.is_empty() {
            return Err(ConfigError::MalformedTemplate {
                template: raw.to_string(),
                reason: "empty url part".to_string(),
            });
        }

        Ok(Self {
            method: method.to_uppercase(),
            url_template: url_template.to_string(),
            raw: raw.to_string(),
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Substitute every `{TOKEN}` from `params`.
    ///
    /// Fails with [`ConfigError::UnresolvedToken`] naming the first token
    /// that has no entry in the map.
    pub fn resolve(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<ResolvedEndpoint, ConfigError> {
        let mut url = self.url_template.clone();
        for (token, value) in params {
            url = url.replace(&format!("{{{}}}", token), value);
        }

        if let Some(token) = first_unresolved_token(&url) {
            return Err(ConfigError::UnresolvedToken {
                token,
                template: self.raw.clone(),
            });
        }

        Ok(ResolvedEndpoint {
            method: self.method.clone(),
            url,
        })
    }
}

/// Find the first `{TOKEN}` remaining in a substituted url.
///
/// A dangling `{` with no closing brace is reported too, with the rest
/// of the url as the token name; a malformed url must never pass as
/// resolved.
fn first_unresolved_token(url: &str) -> Option<String> {
    let start = url.find('{')?;
    let end = url[start..].find('}').map(|i| i + start).unwrap_or(url.len());
    Some(url[start + 1..end].to_string())
}

// =============================================================================
// TESTS
// =============================================================================
