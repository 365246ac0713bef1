//! Hook seams consumed by the executor around dispatch: pre-request
//! (last chance to mutate the prepared wire request, or seed runtime
//! variables from the declarative `Request`) and test (inspects the
//! response, may extract values into `runtime` scope for later requests in
//! the same sequential run, or fail the request). Both are optional; a
//! collection that declares none runs against the no-op defaults below.

use crate::collection::Request;
use crate::context::ExecutionContext;
use crate::dispatch::Response;
use crate::error::Error;
use crate::prepare::WireRequest;

/// Runs immediately before dispatch, with the declarative `Request` and the
/// prepared `WireRequest` in hand. May rewrite the wire request in place
/// (e.g. to sign it using a value only known at this point), fail it
/// outright, or write into `ctx`'s runtime scope.
pub trait PreRequestHook: Send + Sync {
    /// # Errors
    /// A hook failure aborts the request before it reaches the wire.
    fn run(&self, request: &Request, wire: &mut WireRequest, ctx: &mut ExecutionContext) -> Result<(), Error>;
}

/// Runs after dispatch completes, with the response in hand. May extract a
/// value from the response into `ctx`'s runtime scope so a later request in
/// the same sequential run can reference it, or fail the request (e.g. an
/// assertion on status code or body) without affecting the transport outcome
/// already recorded.
pub trait TestHook: Send + Sync {
    /// # Errors
    /// A hook failure marks the request `Failed` even though dispatch
    /// succeeded.
    fn run(&self, request: &Request, response: &Response, ctx: &mut ExecutionContext) -> Result<(), Error>;
}

/// Runs nothing and always succeeds; the executor's default when a
/// collection declares no prerequest/test scripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl PreRequestHook for NoopHook {
    fn run(&self, _request: &Request, _wire: &mut WireRequest, _ctx: &mut ExecutionContext) -> Result<(), Error> {
        Ok(())
    }
}

impl TestHook for NoopHook {
    fn run(&self, _request: &Request, _response: &Response, _ctx: &mut ExecutionContext) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{ItemId, Method, Url};

    fn sample_request() -> Request {
        Request {
            id: ItemId::new(),
            name: "r".to_string(),
            description: None,
            auth: None,
            variables: vec![],
            events: vec![],
            method: Method::Get,
            url: Url::from_raw("http://example.invalid/"),
            headers: vec![],
            body: None,
            example_responses: vec![],
        }
    }

    #[test]
    fn noop_pre_request_hook_always_succeeds() {
        let mut wire = WireRequest {
            method: "GET",
            url: "http://example.invalid/".to_string(),
            headers: vec![],
            body: None,
            timeout: None,
        };
        let mut ctx = ExecutionContext::new();
        assert!(NoopHook.run(&sample_request(), &mut wire, &mut ctx).is_ok());
    }

    #[test]
    fn noop_test_hook_always_succeeds() {
        let response = Response {
            status_code: 200,
            reason: "OK".to_string(),
            headers: vec![],
            body_bytes: vec![],
            elapsed_ms: 0,
            final_url: "http://example.invalid/".to_string(),
        };
        let mut ctx = ExecutionContext::new();
        assert!(NoopHook.run(&sample_request(), &response, &mut ctx).is_ok());
    }

    /// A `TestHook` that copies a fixed string into `runtime` scope, standing
    /// in for a hook that would extract a value out of the response body.
    struct StashHook {
        key: &'static str,
        value: &'static str,
    }

    impl TestHook for StashHook {
        fn run(&self, _request: &Request, _response: &Response, ctx: &mut ExecutionContext) -> Result<(), Error> {
            ctx.set(crate::context::Scope::Runtime, self.key, self.value);
            Ok(())
        }
    }

    #[test]
    fn test_hook_can_chain_a_value_into_runtime_scope() {
        let response = Response {
            status_code: 200,
            reason: "OK".to_string(),
            headers: vec![],
            body_bytes: b"{\"token\":\"abc123\"}".to_vec(),
            elapsed_ms: 1,
            final_url: "http://example.invalid/".to_string(),
        };
        let mut ctx = ExecutionContext::new();
        let hook = StashHook { key: "token", value: "abc123" };
        hook.run(&sample_request(), &response, &mut ctx).unwrap();
        assert_eq!(ctx.get("token"), Some("abc123"));
    }
}
