//! Request and response logging utilities with automatic secret redaction.
//!
//! Provides structured `tracing` logging for dispatched requests and their
//! responses, with redaction of:
//! - Authorization and other well-known sensitive headers
//! - Sensitive query parameter values
//! - Values matching secrets configured for the active environment (§component L)

use tracing::{debug, info, trace};

/// Minimum length for a secret to be redacted in body content.
/// Shorter secrets might cause false positives in legitimate content.
const MIN_SECRET_LENGTH_FOR_BODY_REDACTION: usize = 8;

/// Context containing resolved secret values for dynamic redaction.
///
/// Collected from the active environment's stored secrets
/// (`config::models::StoredSecret`) so that auth tokens and API keys never
/// appear verbatim in logs, even via headers or query params the static
/// redaction lists don't already know about.
#[derive(Debug, Default, Clone)]
pub struct SecretContext {
    secrets: Vec<String>,
}

impl SecretContext {
    /// Creates an empty `SecretContext` with no secrets to redact.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a context from resolved secret values, deduplicating them.
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = String>) -> Self {
        let mut secrets: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
        secrets.sort();
        secrets.dedup();
        Self { secrets }
    }

    /// Checks if a value exactly matches any of the secrets.
    #[must_use]
    pub fn is_secret(&self, value: &str) -> bool {
        self.secrets.iter().any(|s| s == value)
    }

    /// Redacts all occurrences of secrets in the given text.
    ///
    /// Only redacts secrets at least `MIN_SECRET_LENGTH_FOR_BODY_REDACTION`
    /// characters long, to avoid false positives with short values.
    #[must_use]
    pub fn redact_secrets_in_text(&self, text: &str) -> String {
        let mut result = text.to_string();
        for secret in &self.secrets {
            if secret.len() >= MIN_SECRET_LENGTH_FOR_BODY_REDACTION {
                result = result.replace(secret, "[REDACTED]");
            }
        }
        result
    }

    /// Returns true if this context has any secrets to redact.
    #[must_use]
    pub const fn has_secrets(&self) -> bool {
        !self.secrets.is_empty()
    }
}

/// Checks if a header name should be redacted.
///
/// Single source of truth for sensitive header identification, used by both
/// logging and the dispatcher's own tracing span.
#[must_use]
pub fn should_redact_header(header_name: &str) -> bool {
    let lower = header_name.to_lowercase();
    matches!(
        lower.as_str(),
        "authorization"
            | "proxy-authorization"
            | "x-api-key"
            | "x-api-token"
            | "api-key"
            | "api_key"
            | "x-access-token"
            | "x-auth-token"
            | "token"
            | "secret"
            | "password"
            | "cookie"
            | "set-cookie"
            | "x-csrf-token"
            | "x-xsrf-token"
    )
}

/// Checks if a query parameter name should be redacted.
fn should_redact_query_param(param_name: &str) -> bool {
    let lower = param_name.to_lowercase();
    matches!(
        lower.as_str(),
        "api_key"
            | "apikey"
            | "api-key"
            | "key"
            | "token"
            | "access_token"
            | "accesstoken"
            | "auth_token"
            | "authtoken"
            | "bearer_token"
            | "refresh_token"
            | "secret"
            | "api_secret"
            | "client_secret"
            | "password"
            | "passwd"
            | "pwd"
            | "signature"
            | "sig"
            | "auth"
            | "authorization"
            | "credentials"
    )
}

/// Redacts sensitive query parameters from a URL.
#[must_use]
pub fn redact_url_query_params(url: &str) -> String {
    let Some(query_start) = url.find('?') else {
        return url.to_string();
    };

    let base_url = &url[..query_start];
    let query_string = &url[query_start + 1..];

    let (query_part, fragment) =
        query_string
            .find('#')
            .map_or((query_string, None), |frag_start| {
                (
                    &query_string[..frag_start],
                    Some(&query_string[frag_start..]),
                )
            });

    let redacted_params: Vec<String> = query_part
        .split('&')
        .map(|param| {
            param.find('=').map_or_else(
                || param.to_string(),
                |eq_pos| {
                    let name = &param[..eq_pos];
                    if should_redact_query_param(name) {
                        format!("{name}=[REDACTED]")
                    } else {
                        param.to_string()
                    }
                },
            )
        })
        .collect();

    let mut result = format!("{base_url}?{}", redacted_params.join("&"));
    if let Some(frag) = fragment {
        result.push_str(frag);
    }
    result
}

/// Redacts a header value based on static rules and dynamic secret context.
fn redact_header_value(header_name: &str, value: &str, secret_ctx: Option<&SecretContext>) -> String {
    if should_redact_header(header_name) {
        return "[REDACTED]".to_string();
    }
    if secret_ctx.is_some_and(|ctx| ctx.is_secret(value)) {
        return "[REDACTED]".to_string();
    }
    value.to_string()
}

/// Logs a dispatched request: method, URL, headers (debug), body (trace).
pub fn log_request(
    method: &str,
    url: &str,
    headers: Option<&reqwest::header::HeaderMap>,
    body: Option<&str>,
    secret_ctx: Option<&SecretContext>,
) {
    let redacted_url = redact_url_query_params(url);

    info!(target: "runner::dispatch", "→ {} {}", method.to_uppercase(), redacted_url);

    let Some(header_map) = headers else {
        log_body(body, "Request", secret_ctx);
        return;
    };

    debug!(target: "runner::dispatch", "Request headers:");
    for (name, value) in header_map {
        let header_str = name.as_str();
        let raw_value = String::from_utf8_lossy(value.as_bytes()).to_string();
        let display_value = redact_header_value(header_str, &raw_value, secret_ctx);
        debug!(target: "runner::dispatch", "  {}: {}", header_str, display_value);
    }

    log_body(body, "Request", secret_ctx);
}

/// Logs a received response: status and duration (info), headers (debug), body (trace).
pub fn log_response(
    status: u16,
    duration_ms: u128,
    headers: Option<&reqwest::header::HeaderMap>,
    body: Option<&str>,
    max_body_len: usize,
    secret_ctx: Option<&SecretContext>,
) {
    info!(target: "runner::dispatch", "← {} ({}ms)", status, duration_ms);

    let Some(header_map) = headers else {
        log_response_body(body, max_body_len, secret_ctx);
        return;
    };

    debug!(target: "runner::dispatch", "Response headers:");
    for (name, value) in header_map {
        let header_str = name.as_str();
        let raw_value = String::from_utf8_lossy(value.as_bytes()).to_string();
        let display_value = redact_header_value(header_str, &raw_value, secret_ctx);
        debug!(target: "runner::dispatch", "  {}: {}", header_str, display_value);
    }

    log_response_body(body, max_body_len, secret_ctx);
}

fn log_body(body: Option<&str>, label: &str, secret_ctx: Option<&SecretContext>) {
    let Some(body_content) = body else {
        return;
    };
    let redacted = secret_ctx.map_or_else(
        || body_content.to_string(),
        |ctx| ctx.redact_secrets_in_text(body_content),
    );
    trace!(target: "runner::dispatch", "{} body: {}", label, redacted);
}

fn log_response_body(body: Option<&str>, max_body_len: usize, secret_ctx: Option<&SecretContext>) {
    let Some(body_content) = body else {
        return;
    };
    let redacted = secret_ctx.map_or_else(
        || body_content.to_string(),
        |ctx| ctx.redact_secrets_in_text(body_content),
    );

    if redacted.len() > max_body_len {
        trace!(
            target: "runner::dispatch",
            "Response body: {} (truncated at {} chars)",
            &redacted[..max_body_len],
            max_body_len
        );
    } else {
        trace!(target: "runner::dispatch", "Response body: {}", redacted);
    }
}

/// Gets the maximum body length to log, from `RUNNER_LOG_MAX_BODY`.
#[must_use]
pub fn get_max_body_len() -> usize {
    std::env::var("RUNNER_LOG_MAX_BODY")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_authorization_header() {
        assert!(should_redact_header("Authorization"));
        assert!(should_redact_header("AUTHORIZATION"));
    }

    #[test]
    fn redacts_api_key_variants() {
        assert!(should_redact_header("X-Api-Key"));
        assert!(should_redact_header("api_key"));
    }

    #[test]
    fn leaves_ordinary_headers_alone() {
        assert!(!should_redact_header("Content-Type"));
        assert!(!should_redact_header("X-Request-Id"));
    }

    #[test]
    fn redacts_sensitive_query_params() {
        let url = "https://api.example.com/users?api_key=secret123&page=1";
        assert_eq!(
            redact_url_query_params(url),
            "https://api.example.com/users?api_key=[REDACTED]&page=1"
        );
    }

    #[test]
    fn leaves_query_without_match_alone() {
        let url = "https://api.example.com/users?page=1&limit=10";
        assert_eq!(redact_url_query_params(url), url);
    }

    #[test]
    fn secret_context_redacts_long_secrets_only() {
        let ctx = SecretContext::from_values(["short".to_string(), "a-long-bearer-token".to_string()]);
        assert!(!ctx.redact_secrets_in_text("has short in it").contains("[REDACTED]"));
        assert_eq!(
            ctx.redact_secrets_in_text("token=a-long-bearer-token"),
            "token=[REDACTED]"
        );
    }

    #[test]
    fn header_value_redacted_by_dynamic_secret() {
        let ctx = SecretContext::from_values(["my_api_key_12345".to_string()]);
        let result = redact_header_value("X-Custom-Header", "my_api_key_12345", Some(&ctx));
        assert_eq!(result, "[REDACTED]");
    }
}
