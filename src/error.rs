//! Error taxonomy for the collection runner.
//!
//! All internal failures are mapped onto the fixed set of kinds from the
//! design's error taxonomy (schema, variable resolution, auth config, body
//! encoding, transport, hook) plus a handful of unavoidable external error
//! types (I/O, YAML/JSON parsing). No error unwinds out of
//! [`crate::executor::Executor::execute_request`]; everything else either
//! surfaces structurally (invariant violations) or is captured into an
//! [`crate::result::ExecutionResult`].

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{kind}: {message}")]
    Internal {
        kind: ErrorKind,
        message: Cow<'static, str>,
        context: Option<ErrorContext>,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// The fixed error taxonomy from the design's error handling section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal at load; never reaches the executor (`SchemaError`).
    Schema,
    /// `walk_requests`/`find_by_name`/`ancestors` failed to resolve a name.
    NotFound,
    /// Undefined variable (strict mode) or cycle/depth overflow in the resolver.
    VariableResolution(VariableResolutionKind),
    /// Missing required auth parameter, or an auth type with no core support.
    AuthConfig(AuthConfigKind),
    /// Request body could not be serialized, or a URL resolved to an empty host.
    BodyEncoding,
    /// Dispatcher-level transport failure.
    Transport(TransportKind),
    /// Pre-request/test hook failure (only surfaced as a hard error under `strict_hooks`).
    Hook,
    /// Catch-all for configuration and CLI-argument problems.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableResolutionKind {
    Undefined,
    CycleOrDepth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthConfigKind {
    MissingParam,
    UnsupportedType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    ConnectionRefused,
    DnsFailure,
    TlsFailure,
    TooManyRedirects,
    ProtocolError,
    Cancelled,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "SchemaError",
            Self::NotFound => "NotFoundError",
            Self::VariableResolution(_) => "VariableResolutionError",
            Self::AuthConfig(_) => "AuthConfigError",
            Self::BodyEncoding => "BodyEncodingError",
            Self::Transport(_) => "TransportError",
            Self::Hook => "HookError",
            Self::Config => "ConfigError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Additional context for consolidated errors: structured details plus an
/// optional human-readable suggestion.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub details: Option<serde_json::Value>,
    pub suggestion: Option<Cow<'static, str>>,
}

impl ErrorContext {
    #[must_use]
    pub fn with_detail(key: &str, value: impl Serialize) -> Self {
        Self {
            details: Some(json!({ key: value })),
            suggestion: None,
        }
    }
}

/// JSON representation of an error for `--json-errors` output.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonError {
    pub error_type: Cow<'static, str>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Cow<'static, str>>,
}

impl Error {
    fn internal(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            kind,
            message: message.into(),
            context: None,
        }
    }

    #[must_use]
    pub fn schema(message: impl Into<Cow<'static, str>>) -> Self {
        Self::internal(ErrorKind::Schema, message)
    }

    #[must_use]
    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::Internal {
            kind: ErrorKind::NotFound,
            message: Cow::Owned(format!("no {kind} named '{name}'")),
            context: Some(ErrorContext::with_detail("name", name)),
        }
    }

    #[must_use]
    pub fn undefined_variable(name: &str) -> Self {
        Self::Internal {
            kind: ErrorKind::VariableResolution(VariableResolutionKind::Undefined),
            message: Cow::Owned(format!("undefined variable '{name}'")),
            context: Some(ErrorContext::with_detail("name", name)),
        }
    }

    #[must_use]
    pub fn cycle_or_depth(name: &str) -> Self {
        Self::Internal {
            kind: ErrorKind::VariableResolution(VariableResolutionKind::CycleOrDepth),
            message: Cow::Owned(format!(
                "variable '{name}' exceeded the resolution visit limit"
            )),
            context: Some(ErrorContext::with_detail("name", name)),
        }
    }

    #[must_use]
    pub fn missing_auth_param(auth_type: &str, param: &str) -> Self {
        Self::Internal {
            kind: ErrorKind::AuthConfig(AuthConfigKind::MissingParam),
            message: Cow::Owned(format!("auth type '{auth_type}' is missing '{param}'")),
            context: Some(ErrorContext::with_detail("param", param)),
        }
    }

    #[must_use]
    pub fn unsupported_auth(auth_type: &str) -> Self {
        Self::Internal {
            kind: ErrorKind::AuthConfig(AuthConfigKind::UnsupportedType),
            message: Cow::Owned(format!("auth type '{auth_type}' is not supported")),
            context: None,
        }
    }

    #[must_use]
    pub fn body_encoding(message: impl Into<Cow<'static, str>>) -> Self {
        Self::internal(ErrorKind::BodyEncoding, message)
    }

    #[must_use]
    pub fn transport(kind: TransportKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            kind: ErrorKind::Transport(kind),
            message: message.into(),
            context: None,
        }
    }

    #[must_use]
    pub fn hook(message: impl Into<Cow<'static, str>>) -> Self {
        Self::internal(ErrorKind::Hook, message)
    }

    #[must_use]
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::internal(ErrorKind::Config, message)
    }

    #[must_use]
    pub fn invalid_config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::config(message)
    }

    /// The error kind, if this is a structured `Internal` error.
    #[must_use]
    pub const fn kind(&self) -> Option<&ErrorKind> {
        match self {
            Self::Internal { kind, .. } => Some(kind),
            _ => None,
        }
    }

    #[must_use]
    pub fn with_context(self, context: &str) -> Self {
        match self {
            Self::Internal {
                kind,
                message,
                context: ctx,
            } => Self::Internal {
                kind,
                message: Cow::Owned(format!("{context}: {message}")),
                context: ctx,
            },
            other => Self::config(format!("{context}: {other}")),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> JsonError {
        match self {
            Self::Internal {
                kind,
                message,
                context,
            } => JsonError {
                error_type: Cow::Borrowed(kind.as_str()),
                message: message.to_string(),
                details: context.as_ref().and_then(|c| c.details.clone()),
                suggestion: context.as_ref().and_then(|c| c.suggestion.clone()),
            },
            Self::Io(e) => JsonError {
                error_type: Cow::Borrowed("Io"),
                message: e.to_string(),
                details: None,
                suggestion: None,
            },
            Self::Network(e) => JsonError {
                error_type: Cow::Borrowed("Network"),
                message: e.to_string(),
                details: None,
                suggestion: None,
            },
            Self::Yaml(e) => JsonError {
                error_type: Cow::Borrowed("Yaml"),
                message: e.to_string(),
                details: None,
                suggestion: None,
            },
            Self::Json(e) => JsonError {
                error_type: Cow::Borrowed("Json"),
                message: e.to_string(),
                details: None,
                suggestion: None,
            },
            Self::Toml(e) => JsonError {
                error_type: Cow::Borrowed("Toml"),
                message: e.to_string(),
                details: None,
                suggestion: None,
            },
            Self::Anyhow(e) => JsonError {
                error_type: Cow::Borrowed("Unexpected"),
                message: e.to_string(),
                details: None,
                suggestion: None,
            },
        }
    }
}
