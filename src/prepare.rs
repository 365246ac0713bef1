//! Request Preparer (component E): applies per-call extensions, resolves
//! variables, and assembles a wire request. Deterministic, idempotent, and
//! performs no I/O (§4.E).

use crate::auth::{self, Placement, ResolvedAuth};
use crate::collection::{Body, KeyValue, Request};
use crate::context::ExecutionContext;
use crate::error::Error;
use crate::resolve::{resolve_path_param, Diagnostics, VariableResolver};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Per-call overrides applied during preparation without mutating the
/// source tree (§3 `RequestExtensions`).
#[derive(Debug, Clone, Default)]
pub struct RequestExtensions {
    pub header_substitutions: HashMap<String, String>,
    pub header_extensions: HashMap<String, String>,
    pub param_substitutions: HashMap<String, String>,
    pub param_extensions: HashMap<String, String>,
    pub url_substitutions: UrlSubstitutions,
    pub body_substitutions: HashMap<String, String>,
    pub body_extensions: HashMap<String, String>,
    pub auth_substitutions: HashMap<String, String>,
    /// Overrides the dispatcher's default timeout for this one request
    /// (§4.G "a per-request timeout from `options.timeout` or extensions").
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct UrlSubstitutions {
    pub host: Option<String>,
    pub protocol: Option<String>,
    pub port: Option<String>,
}

/// The fully-resolved `{method, url, headers, body}` tuple the Preparer
/// hands to the Dispatcher.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

const SYSTEM_RESERVED_HEADERS: &[&str] = &["host", "content-length"];

/// Prepares a wire request, returning it alongside the diagnostics
/// accumulated while resolving it (undefined variable names left in place
/// under the lenient policy, §4.C).
///
/// # Errors
/// `VariableResolutionError`, `AuthConfigError`, `BodyEncodingError`.
pub fn prepare(
    request: &Request,
    ctx: &ExecutionContext,
    extensions: Option<&RequestExtensions>,
    resolver: &VariableResolver,
    effective_auth: &ResolvedAuth<'_>,
) -> Result<(WireRequest, Diagnostics), Error> {
    let empty = RequestExtensions::default();
    let ext = extensions.unwrap_or(&empty);
    let mut diagnostics = Diagnostics::default();

    let (mut url, query_pairs, url_diag) = build_url(request, ctx, ext, resolver)?;
    diagnostics.undefined.extend(url_diag.undefined);

    let (mut headers, header_diag) = build_headers(request, ctx, ext, resolver)?;
    diagnostics.undefined.extend(header_diag.undefined);

    let body = match &request.body {
        Some(b) if !matches!(b, Body::None) => {
            let (encoded, body_diag) = encode_body(b, ctx, ext, resolver, &mut headers)?;
            diagnostics.undefined.extend(body_diag.undefined);
            Some(encoded)
        }
        _ => None,
    };

    if let Some(auth) = effective_auth.auth {
        let mut auth = auth.clone();
        for (k, v) in &ext.auth_substitutions {
            auth.parameters.insert(k.clone(), v.clone());
        }
        let (placements, auth_diag) = auth::apply(&auth, ctx, resolver, request.method.as_str(), &url)?;
        diagnostics.undefined.extend(auth_diag.undefined);
        let mut extra_query = Vec::new();
        for placement in placements {
            match placement {
                Placement::Header(name, value) => set_header(&mut headers, &name, &value),
                Placement::Query(key, value) => extra_query.push((key, value)),
            }
        }
        if !extra_query.is_empty() {
            url = append_query(&url, &extra_query);
        }
    }

    let _ = query_pairs;

    if host_of(&url).is_none_or(str::is_empty) {
        return Err(Error::body_encoding("resolved URL has an empty host"));
    }

    Ok((
        WireRequest {
            method: request.method.as_str(),
            url,
            headers,
            body,
            timeout: ext.timeout_ms.map(Duration::from_millis),
        },
        diagnostics,
    ))
}

fn host_of(url: &str) -> Option<&str> {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = after_scheme.split(['/', '?']).next()?;
    Some(host)
}

fn build_url(
    request: &Request,
    ctx: &ExecutionContext,
    ext: &RequestExtensions,
    resolver: &VariableResolver,
) -> Result<(String, Vec<(String, String)>, Diagnostics), Error> {
    let mut url = request.url.clone();
    let mut diagnostics = Diagnostics::default();

    if let Some(host) = &ext.url_substitutions.host {
        url.host = vec![host.clone()];
    }
    if let Some(protocol) = &ext.url_substitutions.protocol {
        url.protocol = Some(protocol.clone());
    }
    if let Some(port) = &ext.url_substitutions.port {
        url.port = Some(port.clone());
    }

    let protocol = url.protocol.as_deref().unwrap_or("https");
    let host = url.host.join(".");
    let (host, host_diag) = resolver.resolve(&host, ctx)?;
    diagnostics.undefined.extend(host_diag.undefined);
    let port_suffix = url.port.as_ref().map(|p| format!(":{p}")).unwrap_or_default();

    let mut path_segments = Vec::new();
    for seg in &url.path {
        let resolved = if seg.starts_with(':') {
            resolve_path_param(seg, ctx).unwrap_or_else(|| seg.clone())
        } else {
            let (resolved, seg_diag) = resolver.resolve(seg, ctx)?;
            diagnostics.undefined.extend(seg_diag.undefined);
            resolved
        };
        path_segments.push(resolved);
    }
    let path = path_segments.join("/");

    let mut query_pairs = Vec::new();
    for q in &url.query {
        if q.disabled {
            continue;
        }
        let (key, key_diag) = resolver.resolve(&q.key, ctx)?;
        diagnostics.undefined.extend(key_diag.undefined);
        let value = if q.value.starts_with(':') {
            resolve_path_param(&q.value, ctx).unwrap_or_else(|| q.value.clone())
        } else {
            let (resolved, value_diag) = resolver.resolve(&q.value, ctx)?;
            diagnostics.undefined.extend(value_diag.undefined);
            resolved
        };
        query_pairs.push((key, value));
    }

    for (key, value) in &ext.param_substitutions {
        if let Some(existing) = query_pairs.iter_mut().find(|(k, _)| k == key) {
            existing.1 = value.clone();
        }
    }
    for (key, value) in &ext.param_extensions {
        query_pairs.push((key.clone(), value.clone()));
    }

    let mut rendered = format!("{protocol}://{host}{port_suffix}");
    if !path.is_empty() {
        rendered.push('/');
        rendered.push_str(&path);
    }
    if !query_pairs.is_empty() {
        rendered = append_query(&rendered, &query_pairs);
    }

    Ok((rendered, query_pairs, diagnostics))
}

fn append_query(url: &str, pairs: &[(String, String)]) -> String {
    let joined = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    if url.contains('?') {
        format!("{url}&{joined}")
    } else {
        format!("{url}?{joined}")
    }
}

fn build_headers(
    request: &Request,
    ctx: &ExecutionContext,
    ext: &RequestExtensions,
    resolver: &VariableResolver,
) -> Result<(Vec<(String, String)>, Diagnostics), Error> {
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut diagnostics = Diagnostics::default();

    for h in &request.headers {
        if h.disabled {
            continue;
        }
        if SYSTEM_RESERVED_HEADERS.contains(&h.key.to_lowercase().as_str()) {
            continue;
        }
        headers.push((h.key.clone(), h.value.clone()));
    }

    for (key, value) in &ext.header_substitutions {
        if let Some(existing) = headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            existing.1 = value.clone();
        }
    }
    for (key, value) in &ext.header_extensions {
        set_header(&mut headers, key, value);
    }

    let mut resolved = Vec::with_capacity(headers.len());
    for (key, value) in headers {
        let (resolved_key, key_diag) = resolver.resolve(&key, ctx)?;
        diagnostics.undefined.extend(key_diag.undefined);
        let (resolved_value, value_diag) = resolver.resolve(&value, ctx)?;
        diagnostics.undefined.extend(value_diag.undefined);
        if resolved_key.is_empty() || resolved_value.is_empty() {
            continue;
        }
        resolved.push((resolved_key, resolved_value));
    }

    Ok((resolved, diagnostics))
}

/// Sets a header by case-insensitive key, overwriting an existing entry —
/// the "extension wins" rule for `header_extensions` and for a Content-Type
/// an inferred body encoding would otherwise set (Open Question resolution).
fn set_header(headers: &mut Vec<(String, String)>, key: &str, value: &str) {
    if let Some(existing) = headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
        existing.1 = value.to_string();
    } else {
        headers.push((key.to_string(), value.to_string()));
    }
}

fn encode_body(
    body: &Body,
    ctx: &ExecutionContext,
    ext: &RequestExtensions,
    resolver: &VariableResolver,
    headers: &mut Vec<(String, String)>,
) -> Result<(Vec<u8>, Diagnostics), Error> {
    match body {
        Body::Raw { raw } => {
            let mut diagnostics = Diagnostics::default();
            let encoded = if let Ok(mut json) = serde_json::from_str::<serde_json::Value>(raw) {
                if let Some(obj) = json.as_object_mut() {
                    for (k, v) in &ext.body_substitutions {
                        if obj.contains_key(k) {
                            obj.insert(k.clone(), serde_json::Value::String(v.clone()));
                        }
                    }
                    for (k, v) in &ext.body_extensions {
                        obj.insert(k.clone(), serde_json::Value::String(v.clone()));
                    }
                }
                serde_json::to_string(&json).map_err(|e| Error::body_encoding(format!("re-serializing JSON body: {e}")))?
            } else {
                let (resolved, raw_diag) = resolver.resolve(raw, ctx)?;
                diagnostics.undefined.extend(raw_diag.undefined);
                resolved
            };
            set_content_type_if_absent(headers, "application/json");
            Ok((encoded.into_bytes(), diagnostics))
        }
        Body::Urlencoded { urlencoded } => {
            let (pairs, diagnostics) = apply_kv_extensions(urlencoded, ext, ctx, resolver)?;
            let encoded = pairs
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            set_content_type_if_absent(headers, "application/x-www-form-urlencoded");
            Ok((encoded.into_bytes(), diagnostics))
        }
        Body::Formdata { formdata } => {
            let (pairs, diagnostics) = apply_kv_extensions(formdata, ext, ctx, resolver)?;
            let boundary = format!("runner-boundary-{}", Uuid::new_v4().simple());
            let encoded = encode_multipart(&pairs, &boundary);
            set_content_type_if_absent(headers, &format!("multipart/form-data; boundary={boundary}"));
            Ok((encoded, diagnostics))
        }
        Body::File { file } => {
            let (resolved_path, diagnostics) = resolver.resolve(&file.src, ctx)?;
            set_content_type_if_absent(headers, "application/octet-stream");
            Ok((resolved_path.into_bytes(), diagnostics))
        }
        Body::Graphql { query, variables } => {
            let mut diagnostics = Diagnostics::default();
            let (resolved_query, query_diag) = resolver.resolve(query, ctx)?;
            diagnostics.undefined.extend(query_diag.undefined);
            let resolved_vars = match variables {
                Some(v) => {
                    let (resolved, var_diag) = resolver.resolve(v, ctx)?;
                    diagnostics.undefined.extend(var_diag.undefined);
                    Some(resolved)
                }
                None => None,
            };
            let payload = serde_json::json!({ "query": resolved_query, "variables": resolved_vars });
            set_content_type_if_absent(headers, "application/json");
            let encoded =
                serde_json::to_vec(&payload).map_err(|e| Error::body_encoding(format!("encoding GraphQL body: {e}")))?;
            Ok((encoded, diagnostics))
        }
        Body::None => Ok((Vec::new(), Diagnostics::default())),
    }
}

/// Hand-rolled `multipart/form-data` framing (RFC 2388): each field becomes
/// its own part carrying a `Content-Disposition: form-data; name="..."`
/// header, terminated by a closing boundary line.
fn encode_multipart(pairs: &[(String, String)], boundary: &str) -> Vec<u8> {
    let mut body = Vec::new();
    for (key, value) in pairs {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{key}\"\r\n\r\n").as_bytes());
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn apply_kv_extensions(
    source: &[KeyValue],
    ext: &RequestExtensions,
    ctx: &ExecutionContext,
    resolver: &VariableResolver,
) -> Result<(Vec<(String, String)>, Diagnostics), Error> {
    let mut pairs: Vec<(String, String)> = source
        .iter()
        .filter(|kv| !kv.disabled)
        .map(|kv| (kv.key.clone(), kv.value.clone()))
        .collect();

    for (k, v) in &ext.body_substitutions {
        if let Some(existing) = pairs.iter_mut().find(|(key, _)| key == k) {
            existing.1 = v.clone();
        }
    }
    for (k, v) in &ext.body_extensions {
        pairs.push((k.clone(), v.clone()));
    }

    let mut diagnostics = Diagnostics::default();
    let mut resolved = Vec::with_capacity(pairs.len());
    for (k, v) in pairs {
        let (resolved_key, key_diag) = resolver.resolve(&k, ctx)?;
        diagnostics.undefined.extend(key_diag.undefined);
        let (resolved_value, value_diag) = resolver.resolve(&v, ctx)?;
        diagnostics.undefined.extend(value_diag.undefined);
        resolved.push((resolved_key, resolved_value));
    }
    Ok((resolved, diagnostics))
}

fn set_content_type_if_absent(headers: &mut Vec<(String, String)>, content_type: &str) {
    if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
        headers.push(("Content-Type".to_string(), content_type.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SourceLevel;
    use crate::collection::{Header, ItemId, Method, Url};
    use crate::context::Scope;
    use crate::resolve::UndefinedPolicy;

    fn sample_request(url_raw: &str) -> Request {
        Request {
            id: ItemId::new(),
            name: "r".to_string(),
            description: None,
            auth: None,
            variables: vec![],
            events: vec![],
            method: Method::Get,
            url: Url::from_raw(url_raw),
            headers: vec![Header {
                key: "X-A".to_string(),
                value: "one".to_string(),
                disabled: false,
                description: None,
            }],
            body: None,
            example_responses: vec![],
        }
    }

    fn no_auth() -> ResolvedAuth<'static> {
        ResolvedAuth {
            auth: None,
            source_level: SourceLevel::None,
        }
    }

    #[test]
    fn path_and_template_mix_resolves_together() {
        let mut ctx = ExecutionContext::new();
        ctx.set(Scope::Global, "base", "https://api.x");
        ctx.set(Scope::Global, "id", "42");
        ctx.set(Scope::Global, "lim", "10");
        let request = sample_request("{{base}}/users/:id?limit={{lim}}");
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let (wire, _) = prepare(&request, &ctx, None, &resolver, &no_auth()).unwrap();
        assert_eq!(wire.url, "https://api.x/users/42?limit=10");
    }

    #[test]
    fn header_extension_wins_over_substitution() {
        let ctx = ExecutionContext::new();
        let mut ext = RequestExtensions::default();
        ext.header_substitutions.insert("X-A".to_string(), "two".to_string());
        ext.header_extensions.insert("X-A".to_string(), "three".to_string());
        let request = sample_request("https://api.x/ping");
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let (wire, _) = prepare(&request, &ctx, Some(&ext), &resolver, &no_auth()).unwrap();
        let value = wire.headers.iter().find(|(k, _)| k == "X-A").map(|(_, v)| v.as_str());
        assert_eq!(value, Some("three"));
    }

    #[test]
    fn empty_host_is_body_encoding_error() {
        let ctx = ExecutionContext::new();
        let request = sample_request("");
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        assert!(prepare(&request, &ctx, None, &resolver, &no_auth()).is_err());
    }

    #[test]
    fn preparing_twice_yields_identical_wire_request() {
        let mut ctx = ExecutionContext::new();
        ctx.set(Scope::Global, "base", "https://api.x");
        let request = sample_request("{{base}}/ping");
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let (a, _) = prepare(&request, &ctx, None, &resolver, &no_auth()).unwrap();
        let (b, _) = prepare(&request, &ctx, None, &resolver, &no_auth()).unwrap();
        assert_eq!(a.url, b.url);
        assert_eq!(a.headers, b.headers);
    }

    #[test]
    fn lenient_undefined_reference_is_recorded_as_a_diagnostic() {
        let ctx = ExecutionContext::new();
        let request = sample_request("https://api.x/ping?token={{missing}}");
        let resolver = VariableResolver::new(UndefinedPolicy::Lenient);
        let (_, diagnostics) = prepare(&request, &ctx, None, &resolver, &no_auth()).unwrap();
        assert_eq!(diagnostics.undefined, vec!["missing".to_string()]);
    }

    #[test]
    fn timeout_extension_overrides_dispatcher_default() {
        let ctx = ExecutionContext::new();
        let mut ext = RequestExtensions::default();
        ext.timeout_ms = Some(500);
        let request = sample_request("https://api.x/ping");
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let (wire, _) = prepare(&request, &ctx, Some(&ext), &resolver, &no_auth()).unwrap();
        assert_eq!(wire.timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn formdata_body_is_framed_as_real_multipart_with_matching_boundary() {
        let ctx = ExecutionContext::new();
        let mut request = sample_request("https://api.x/upload");
        request.body = Some(Body::Formdata {
            formdata: vec![KeyValue {
                key: "name".to_string(),
                value: "widget".to_string(),
                disabled: false,
            }],
        });
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let (wire, _) = prepare(&request, &ctx, None, &resolver, &no_auth()).unwrap();
        let content_type = wire
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone())
            .unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let boundary = content_type.strip_prefix("multipart/form-data; boundary=").unwrap();
        let body = String::from_utf8(wire.body.unwrap()).unwrap();
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.contains("Content-Disposition: form-data; name=\"name\"\r\n\r\nwidget\r\n"));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    }
}
