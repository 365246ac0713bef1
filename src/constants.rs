//! Centralized string constants for the collection runner.
//!
//! This module contains commonly used string literals to:
//! - Reduce string duplication
//! - Improve maintainability
//! - Ensure consistency across the codebase

// HTTP Headers
pub const HEADER_ACCEPT: &str = "Accept";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_USER_AGENT: &str = "User-Agent";

// Lowercase header names (for HTTP/2 compatibility and internal use)
pub const HEADER_AUTHORIZATION_LC: &str = "authorization";
pub const HEADER_CONTENT_TYPE_LC: &str = "content-type";

// Content Types
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

// Authentication types (as named in the collection model's `Auth::kind`)
pub const AUTH_TYPE_BASIC: &str = "basic";
pub const AUTH_TYPE_BEARER: &str = "bearer";
pub const AUTH_TYPE_APIKEY: &str = "apikey";
pub const AUTH_TYPE_OAUTH1: &str = "oauth1";
pub const AUTH_TYPE_NOAUTH: &str = "noauth";

// Environment Variables
pub const ENV_RUNNER_CONFIG_DIR: &str = "RUNNER_CONFIG_DIR";
pub const ENV_RUNNER_ENV: &str = "RUNNER_ENV";

// Built-in dynamic variable names (component C)
pub const DYNVAR_GUID: &str = "$guid";
pub const DYNVAR_TIMESTAMP: &str = "$timestamp";
pub const DYNVAR_ISO_TIMESTAMP: &str = "$isoTimestamp";
pub const DYNVAR_RANDOM_INT: &str = "$randomInt";

// Error Context Messages
pub const ERR_API_CREDENTIALS: &str = "Check the auth configuration on this request or one of its ancestor folders.";
pub const ERR_ENDPOINT_NOT_FOUND: &str = "Check that the resolved URL and path variables are correct.";
pub const ERR_CONNECTION: &str = "Check that the target server is running and reachable.";
pub const ERR_TIMEOUT: &str = "The server may be slow or unresponsive. Consider raising --timeout-ms.";

// File System Messages
pub const ERR_FILE_NOT_FOUND: &str = "Check that the collection file path is correct and the file exists.";
pub const ERR_PERMISSION: &str = "Check file permissions or run with appropriate privileges.";

// Validation Messages
pub const ERR_JSON_SYNTAX: &str = "Check that the collection file contains valid JSON.";
pub const ERR_TOML_SYNTAX: &str = "Check that your configuration file is valid TOML syntax.";

// CLI Messages
pub const MSG_USE_HELP: &str = "Use --help to see available commands.";

// Config defaults
pub const DEFAULT_ENVIRONMENT: &str = "default";
pub const CONFIG_FILENAME: &str = "config.toml";

/// Check if a header name is authentication-related.
#[must_use]
pub fn is_auth_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "authorization" | "proxy-authorization" | "x-api-key" | "cookie"
    )
}

/// Check if a content type is JSON.
#[must_use]
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type.contains("json")
}
