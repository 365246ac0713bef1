//! HTTP Dispatcher (component F): sends the wire request over `reqwest`,
//! capturing response bytes/headers/status/elapsed and normalizing
//! transport failures into the fixed `TransportError` taxonomy.

use crate::error::{Error, TransportKind};
use crate::logging::{self, SecretContext};
use crate::prepare::WireRequest;
use std::time::{Duration, Instant};

/// `{timeout, follow_redirects, max_redirects, verify_tls, proxy?}` (§4.F).
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub verify_tls: bool,
    pub proxy: Option<String>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            follow_redirects: true,
            max_redirects: 10,
            verify_tls: true,
            proxy: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body_bytes: Vec<u8>,
    pub elapsed_ms: u128,
    pub final_url: String,
}

/// Stateless except for an internally pooled connection set — the
/// underlying `reqwest::Client` is cheap to clone and shares its pool.
pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    /// Builds a dispatcher whose connection pool honors `options` for
    /// redirect policy and TLS verification. A fresh client is needed
    /// whenever those policies change, since `reqwest::Client` bakes them in
    /// at construction.
    ///
    /// # Errors
    /// Returns an error if the underlying TLS backend fails to initialize.
    pub fn new(options: &DispatchOptions) -> Result<Self, Error> {
        let redirect_policy = if options.follow_redirects {
            reqwest::redirect::Policy::limited(options.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let mut builder = reqwest::Client::builder()
            .redirect(redirect_policy)
            .danger_accept_invalid_certs(!options.verify_tls)
            .timeout(options.timeout);

        if let Some(proxy) = &options.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::config(format!("invalid proxy URL '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Sends `wire_request`, honoring `cancel` for cooperative cancellation
    /// at the dispatch suspension point.
    ///
    /// # Errors
    /// Returns `TransportError` classified by `TransportKind` (§4.F).
    pub async fn dispatch(
        &self,
        wire_request: &WireRequest,
        secret_ctx: Option<&SecretContext>,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<Response, Error> {
        let method = reqwest::Method::from_bytes(wire_request.method.as_bytes())
            .map_err(|e| Error::transport(TransportKind::ProtocolError, format!("invalid method: {e}")))?;

        let mut builder = self.client.request(method, &wire_request.url);
        for (key, value) in &wire_request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &wire_request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = wire_request.timeout {
            builder = builder.timeout(timeout);
        }

        logging::log_request(
            wire_request.method,
            &wire_request.url,
            None,
            wire_request.body.as_deref().and_then(|b| std::str::from_utf8(b).ok()),
            secret_ctx,
        );

        let start = Instant::now();
        let send = builder.send();

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(Error::transport(TransportKind::Cancelled, "dispatch cancelled before completion"));
            }
            result = send => result,
        };

        let response = result.map_err(classify_reqwest_error)?;
        let status_code = response.status().as_u16();
        let reason = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();
        let final_url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).to_string()))
            .collect();

        let body_result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(Error::transport(TransportKind::Cancelled, "dispatch cancelled while reading response body"));
            }
            result = response.bytes() => result,
        };
        let body_bytes = body_result.map_err(classify_reqwest_error)?.to_vec();
        let elapsed_ms = start.elapsed().as_millis();

        logging::log_response(
            status_code,
            elapsed_ms,
            None,
            std::str::from_utf8(&body_bytes).ok(),
            logging::get_max_body_len(),
            secret_ctx,
        );

        Ok(Response {
            status_code,
            reason,
            headers,
            body_bytes,
            elapsed_ms,
            final_url,
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::transport(TransportKind::Timeout, e.to_string())
    } else if e.is_connect() {
        Error::transport(TransportKind::ConnectionRefused, e.to_string())
    } else if e.is_redirect() {
        Error::transport(TransportKind::TooManyRedirects, e.to_string())
    } else if e.to_string().to_lowercase().contains("dns") {
        Error::transport(TransportKind::DnsFailure, e.to_string())
    } else {
        Error::transport(TransportKind::ProtocolError, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_spec_defaults() {
        let opts = DispatchOptions::default();
        assert_eq!(opts.timeout, Duration::from_millis(30_000));
        assert!(opts.follow_redirects);
        assert_eq!(opts.max_redirects, 10);
        assert!(opts.verify_tls);
    }

    #[tokio::test]
    async fn get_request_round_trips_through_wiremock() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let dispatcher = HttpDispatcher::new(&DispatchOptions::default()).unwrap();
        let wire = WireRequest {
            method: "GET",
            url: format!("{}/ping", server.uri()),
            headers: vec![],
            body: None,
            timeout: None,
        };
        let cancel = tokio_util::sync::CancellationToken::new();
        let response = dispatcher.dispatch(&wire, None, &cancel).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body_bytes, b"pong");
    }

    #[tokio::test]
    async fn cancellation_before_send_yields_cancelled_transport_error() {
        let dispatcher = HttpDispatcher::new(&DispatchOptions::default()).unwrap();
        let wire = WireRequest {
            method: "GET",
            url: "https://example.invalid/".to_string(),
            headers: vec![],
            body: None,
            timeout: None,
        };
        let cancel = tokio_util::sync::CancellationToken::new();
        cancel.cancel();
        let err = dispatcher.dispatch(&wire, None, &cancel).await.unwrap_err();
        assert!(matches!(
            err.kind(),
            Some(crate::error::ErrorKind::Transport(TransportKind::Cancelled))
        ));
    }
}
