//! End-to-end scenarios driving `Executor` against `wiremock` servers: the
//! pieces unit tests exercise in isolation (auth resolution, preparation,
//! dispatch) wired together through a parsed collection document.

use collection_runner::collection::{parse_collection, Collection, Request};
use collection_runner::context::{ExecutionContext, Scope};
use collection_runner::dispatch::Response;
use collection_runner::error::Error;
use collection_runner::executor::{Executor, ExecutorOptions};
use collection_runner::hooks::{NoopHook, TestHook};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn host_parts(server: &MockServer) -> (String, String) {
    let url = server.uri();
    let without_scheme = url.trim_start_matches("http://");
    let (host, port) = without_scheme.split_once(':').expect("wiremock always binds a port");
    (host.to_string(), port.to_string())
}

fn collection_json(host: &str, port: &str, folder_auth: &str, request_path: &str) -> String {
    format!(
        r#"{{
            "info": {{ "name": "auth-demo", "schema_version": "2.1.0" }},
            "items": [
                {{
                    "name": "Users",
                    "auth": {folder_auth},
                    "items": [
                        {{
                            "name": "get-user",
                            "method": "GET",
                            "url": {{
                                "protocol": "http",
                                "host": ["{host}"],
                                "port": "{port}",
                                "path": ["{request_path}"],
                                "query": []
                            }}
                        }}
                    ]
                }}
            ]
        }}"#
    )
}

fn parse(json: &str) -> Collection {
    parse_collection(json).expect("fixture collection parses")
}

#[tokio::test]
async fn folder_auth_is_inherited_by_nested_request() {
    let server = MockServer::start().await;
    let (host, port) = host_parts(&server);

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(header("Authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let folder_auth = r#"{"type": "bearer", "parameters": {"token": "secret-token"}}"#;
    let collection = parse(&collection_json(&host, &port, folder_auth, "users"));

    let executor = Executor::new(ExecutorOptions::default()).unwrap();
    let mut ctx = ExecutionContext::new();
    let result = executor.execute_collection(&collection, &mut ctx).await.unwrap();

    assert_eq!(result.successful, 1);
    assert_eq!(result.failed, 0);
}

#[tokio::test]
async fn request_auth_overrides_inherited_folder_auth() {
    let server = MockServer::start().await;
    let (host, port) = host_parts(&server);

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(header("Authorization", "Bearer request-token"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let folder_auth = r#"{"type": "bearer", "parameters": {"token": "folder-token"}}"#;
    let json = format!(
        r#"{{
            "info": {{ "name": "auth-demo", "schema_version": "2.1.0" }},
            "items": [
                {{
                    "name": "Users",
                    "auth": {folder_auth},
                    "items": [
                        {{
                            "name": "get-user",
                            "method": "GET",
                            "auth": {{"type": "bearer", "parameters": {{"token": "request-token"}}}},
                            "url": {{
                                "protocol": "http",
                                "host": ["{host}"],
                                "port": "{port}",
                                "path": ["users"],
                                "query": []
                            }}
                        }}
                    ]
                }}
            ]
        }}"#
    );
    let collection = parse(&json);

    let executor = Executor::new(ExecutorOptions::default()).unwrap();
    let mut ctx = ExecutionContext::new();
    let result = executor.execute_collection(&collection, &mut ctx).await.unwrap();

    assert_eq!(result.successful, 1);
}

/// Copies a `token` field out of a JSON response body into `runtime` scope,
/// standing in for a collection's own test script extracting a value for a
/// later request to reuse.
struct ExtractTokenHook;

impl TestHook for ExtractTokenHook {
    fn run(&self, _request: &Request, response: &Response, ctx: &mut ExecutionContext) -> Result<(), Error> {
        if let Ok(body) = serde_json::from_slice::<serde_json::Value>(&response.body_bytes) {
            if let Some(token) = body.get("token").and_then(|t| t.as_str()) {
                ctx.set(Scope::Runtime, "token", token.to_string());
            }
        }
        Ok(())
    }
}

#[tokio::test]
async fn sequential_run_chains_a_response_value_into_a_later_request() {
    let server = MockServer::start().await;
    let (host, port) = host_parts(&server);

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "xyz789"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer xyz789"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let json = format!(
        r#"{{
            "info": {{ "name": "chain-demo", "schema_version": "2.1.0" }},
            "items": [
                {{
                    "name": "login",
                    "method": "GET",
                    "url": {{ "protocol": "http", "host": ["{host}"], "port": "{port}", "path": ["login"], "query": [] }}
                }},
                {{
                    "name": "me",
                    "method": "GET",
                    "auth": {{"type": "bearer", "parameters": {{"token": "{{{{token}}}}"}}}},
                    "url": {{ "protocol": "http", "host": ["{host}"], "port": "{port}", "path": ["me"], "query": [] }}
                }}
            ]
        }}"#
    );
    let collection = parse(&json);

    let executor = Executor::with_hooks(ExecutorOptions::default(), Arc::new(NoopHook), Arc::new(ExtractTokenHook)).unwrap();
    let mut ctx = ExecutionContext::new();
    let result = executor.execute_collection(&collection, &mut ctx).await.unwrap();

    assert_eq!(result.successful, 2);
    assert_eq!(ctx.get("token"), Some("xyz789"));
}

#[tokio::test]
async fn sequential_run_stops_after_first_failure() {
    let server = MockServer::start().await;
    let (host, port) = host_parts(&server);

    Mock::given(method("GET"))
        .and(path("/first"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/second"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let json = format!(
        r#"{{
            "info": {{ "name": "stop-demo", "schema_version": "2.1.0" }},
            "items": [
                {{
                    "name": "first",
                    "method": "GET",
                    "url": {{ "protocol": "http", "host": ["{host}"], "port": "{port}", "path": ["first"], "query": [] }}
                }},
                {{
                    "name": "second",
                    "method": "GET",
                    "url": {{ "protocol": "http", "host": ["{host}"], "port": "{port}", "path": ["second"], "query": [] }}
                }}
            ]
        }}"#
    );
    let collection = parse(&json);

    let options = ExecutorOptions {
        stop_on_error: true,
        ..ExecutorOptions::default()
    };
    let executor = Executor::new(options).unwrap();
    let mut ctx = ExecutionContext::new();
    let result = executor.execute_collection(&collection, &mut ctx).await.unwrap();

    assert_eq!(result.stopped_early, Some(true));
    assert_eq!(result.results.len(), 1);
    assert!(!result.results[0].success);

    // A 500 only reaches status code mapping; wiremock never saw "/second".
    assert!(server.received_requests().await.unwrap().iter().all(|r| r.url.path() == "/first"));
}

#[tokio::test]
async fn parallel_run_executes_every_request_with_isolated_runtime() {
    let server = MockServer::start().await;
    let (host, port) = host_parts(&server);

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let json = format!(
        r#"{{
            "info": {{ "name": "parallel-demo", "schema_version": "2.1.0" }},
            "items": [
                {{
                    "name": "a",
                    "method": "GET",
                    "url": {{ "protocol": "http", "host": ["{host}"], "port": "{port}", "path": ["a"], "query": [] }}
                }},
                {{
                    "name": "b",
                    "method": "GET",
                    "url": {{ "protocol": "http", "host": ["{host}"], "port": "{port}", "path": ["b"], "query": [] }}
                }}
            ]
        }}"#
    );
    let collection = parse(&json);

    let options = ExecutorOptions {
        parallel: true,
        max_parallelism: 2,
        ..ExecutorOptions::default()
    };
    let executor = Executor::new(options).unwrap();
    let mut ctx = ExecutionContext::new();
    ctx.set(collection_runner::context::Scope::Request, "shared", "untouched");
    let result = executor.execute_collection(&collection, &mut ctx).await.unwrap();

    assert_eq!(result.total_requests, 2);
    assert_eq!(result.successful, 2);
    // Parallel workers run against snapshots; the caller's context is untouched.
    assert_eq!(ctx.get("shared"), Some("untouched"));
}

#[tokio::test]
async fn folder_scoped_run_only_executes_requests_under_the_named_folder() {
    let server = MockServer::start().await;
    let (host, port) = host_parts(&server);

    Mock::given(method("GET"))
        .and(path("/inside"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let json = format!(
        r#"{{
            "info": {{ "name": "folder-demo", "schema_version": "2.1.0" }},
            "items": [
                {{
                    "name": "outside",
                    "method": "GET",
                    "url": {{ "protocol": "http", "host": ["unreachable"], "port": "1", "path": [], "query": [] }}
                }},
                {{
                    "name": "Scoped",
                    "items": [
                        {{
                            "name": "inside",
                            "method": "GET",
                            "url": {{ "protocol": "http", "host": ["{host}"], "port": "{port}", "path": ["inside"], "query": [] }}
                        }}
                    ]
                }}
            ]
        }}"#
    );
    let collection = parse(&json);

    let executor = Executor::new(ExecutorOptions::default()).unwrap();
    let mut ctx = ExecutionContext::new();
    let result = executor.execute_folder(&collection, "Scoped", &mut ctx).await.unwrap();

    assert_eq!(result.total_requests, 1);
    assert_eq!(result.successful, 1);
    assert_eq!(result.results[0].request_ref.name, "inside");
}

#[tokio::test]
async fn collection_level_variable_resolves_into_the_request_url() {
    let server = MockServer::start().await;
    let (host, port) = host_parts(&server);

    Mock::given(method("GET"))
        .and(path("/widgets/42"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let json = format!(
        r#"{{
            "info": {{ "name": "vars-demo", "schema_version": "2.1.0" }},
            "variables": [
                {{ "key": "widgetId", "value": "42" }}
            ],
            "items": [
                {{
                    "name": "get-widget",
                    "method": "GET",
                    "url": {{
                        "protocol": "http",
                        "host": ["{host}"],
                        "port": "{port}",
                        "path": ["widgets", ":widgetId"],
                        "query": []
                    }}
                }}
            ]
        }}"#
    );
    let collection = parse(&json);

    let executor = Executor::new(ExecutorOptions::default()).unwrap();
    let mut ctx = ExecutionContext::new();
    ctx.seed(
        collection_runner::context::Scope::Collection,
        collection.variables.iter().map(|v| (v.key.clone(), v.value.clone())),
    );
    let result = executor.execute_collection(&collection, &mut ctx).await.unwrap();

    assert_eq!(result.successful, 1);
}
