//! Result types (component H): per-request and per-collection execution
//! summaries returned to callers and serialized for `--json` output.

use crate::dispatch::Response;
use serde::Serialize;

/// A reference to the request a result belongs to, independent of its
/// position in the source tree (names are not guaranteed unique).
#[derive(Debug, Clone, Serialize)]
pub struct RequestRef {
    pub id: String,
    pub name: String,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseSummary {
    pub status_code: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    #[serde(skip)]
    pub body_bytes: Vec<u8>,
    pub final_url: String,
}

impl From<Response> for ResponseSummary {
    fn from(r: Response) -> Self {
        Self {
            status_code: r.status_code,
            reason: r.reason,
            headers: r.headers,
            body_bytes: r.body_bytes,
            final_url: r.final_url,
        }
    }
}

/// Outcome of one request execution (§4.H).
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub request_ref: RequestRef,
    pub success: bool,
    pub response: Option<ResponseSummary>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub duration_ms: u128,
    pub started_at: String,
    /// Non-fatal notices recorded during this request: undefined variable
    /// names left unresolved under the lenient policy (§4.C), and
    /// non-strict hook failures (§6) that didn't fail the request outright.
    pub diagnostics: Vec<String>,
}

impl ExecutionResult {
    #[must_use]
    pub fn success(
        request_ref: RequestRef,
        response: Response,
        duration_ms: u128,
        started_at: String,
        diagnostics: Vec<String>,
    ) -> Self {
        Self {
            request_ref,
            success: true,
            response: Some(response.into()),
            error: None,
            error_kind: None,
            duration_ms,
            started_at,
            diagnostics,
        }
    }

    #[must_use]
    pub fn failure(
        request_ref: RequestRef,
        error: &crate::error::Error,
        duration_ms: u128,
        started_at: String,
        diagnostics: Vec<String>,
    ) -> Self {
        Self {
            request_ref,
            success: false,
            response: None,
            error: Some(error.to_string()),
            error_kind: error.kind().map(|k| format!("{k:?}")),
            duration_ms,
            started_at,
            diagnostics,
        }
    }
}

/// Outcome of one collection (or folder-scoped) run.
#[derive(Debug, Clone, Serialize, Default)]
pub struct CollectionExecutionResult {
    pub results: Vec<ExecutionResult>,
    pub total_requests: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_time_ms: u128,
    pub stopped_early: Option<bool>,
}

impl CollectionExecutionResult {
    #[must_use]
    pub fn from_results(results: Vec<ExecutionResult>, total_time_ms: u128, stopped_early: bool) -> Self {
        let total_requests = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        let failed = total_requests - successful;
        Self {
            results,
            total_requests,
            successful,
            failed,
            total_time_ms,
            stopped_early: Some(stopped_early),
        }
    }
}
