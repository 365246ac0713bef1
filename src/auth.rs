//! Auth Resolver + Applier (component D): walks the tree path to select the
//! effective `Auth` for a request, then renders it into the wire request's
//! headers/query/URL.

use crate::collection::{Auth, AuthKind, Request, TreeNodeRef};
use crate::context::ExecutionContext;
use crate::error::Error;
use crate::resolve::{Diagnostics, UndefinedPolicy, VariableResolver};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Where the effective auth came from, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLevel {
    Request,
    Folder(String),
    Collection,
    None,
}

pub struct ResolvedAuth<'a> {
    pub auth: Option<&'a Auth>,
    pub source_level: SourceLevel,
}

/// Resolves the effective auth for `request` given its ancestor chain,
/// nearest ancestor first being the natural fallback order (§4.D).
///
/// `ancestor_auths` pairs each ancestor's name with its `auth`, ordered from
/// the collection (first) down to the immediate parent folder (last) — the
/// same order `collection::ancestors` returns.
#[must_use]
pub fn resolve_effective_auth<'a>(
    request: &'a Request,
    ancestors: &'a [TreeNodeRef],
    collection_auth: Option<&'a Auth>,
    folder_auths: &'a [Option<&'a Auth>],
) -> ResolvedAuth<'a> {
    if let Some(auth) = &request.auth {
        if auth.kind != AuthKind::Noauth {
            return ResolvedAuth {
                auth: Some(auth),
                source_level: SourceLevel::Request,
            };
        }
        // Explicit noauth blocks inheritance (invariant 4).
        return ResolvedAuth {
            auth: None,
            source_level: SourceLevel::None,
        };
    }

    // Walk ancestors nearest-to-farthest: folder_auths is parent-to-root
    // aligned with `ancestors` reversed (innermost last in `ancestors`).
    for (idx, folder_auth) in folder_auths.iter().enumerate().rev() {
        if let Some(auth) = folder_auth {
            if auth.kind != AuthKind::Noauth {
                let name = ancestors.get(idx).map_or_else(|| "folder".to_string(), |a| a.name.clone());
                return ResolvedAuth {
                    auth: Some(auth),
                    source_level: SourceLevel::Folder(name),
                };
            }
            // An ancestor's explicit noauth also blocks further inheritance.
            return ResolvedAuth {
                auth: None,
                source_level: SourceLevel::None,
            };
        }
    }

    if let Some(auth) = collection_auth {
        if auth.kind != AuthKind::Noauth {
            return ResolvedAuth {
                auth: Some(auth),
                source_level: SourceLevel::Collection,
            };
        }
    }

    ResolvedAuth {
        auth: None,
        source_level: SourceLevel::None,
    }
}

/// Where the applier writes the rendered auth value.
pub enum Placement {
    Header(String, String),
    Query(String, String),
}

/// Renders `auth`'s (already substituted) parameters into one or more
/// `Placement`s, resolving each parameter value against `ctx` first.
///
/// # Errors
/// `AuthConfigError{missing_param}` if a type-required parameter is absent;
/// `AuthConfigError{unsupported_type}` for `digest`/`awsv4`/`ntlm`/`hawk`,
/// which have no core-level support (best-effort is left to the underlying
/// HTTP client per §4.D).
pub fn apply(
    auth: &Auth,
    ctx: &ExecutionContext,
    resolver: &VariableResolver,
    method: &str,
    url: &str,
) -> Result<(Vec<Placement>, Diagnostics), Error> {
    let mut diagnostics = Diagnostics::default();
    let mut param = |name: &str| -> Result<String, Error> {
        let raw = auth
            .parameters
            .get(name)
            .ok_or_else(|| Error::missing_auth_param(kind_name(auth.kind), name))?;
        let (resolved, diag) = resolver.resolve(raw, ctx)?;
        diagnostics.undefined.extend(diag.undefined);
        Ok(resolved)
    };
    let mut param_opt = |name: &str| -> Result<Option<String>, Error> {
        match auth.parameters.get(name) {
            Some(raw) => {
                let (resolved, diag) = resolver.resolve(raw, ctx)?;
                diagnostics.undefined.extend(diag.undefined);
                Ok(Some(resolved))
            }
            None => Ok(None),
        }
    };

    let placements = match auth.kind {
        AuthKind::Noauth => vec![],
        AuthKind::Basic => {
            let username = param("username")?;
            let password = param("password")?;
            let encoded = base64::engine::general_purpose::STANDARD
                .encode(format!("{username}:{password}"));
            vec![Placement::Header(
                "Authorization".to_string(),
                format!("Basic {encoded}"),
            )]
        }
        AuthKind::Bearer => {
            let token = param("token")?;
            vec![Placement::Header(
                "Authorization".to_string(),
                format!("Bearer {token}"),
            )]
        }
        AuthKind::Apikey => {
            let key = param("key")?;
            let value = param("value")?;
            let location = param_opt("in")?.unwrap_or_else(|| "header".to_string());
            if location == "query" {
                vec![Placement::Query(key, value)]
            } else {
                vec![Placement::Header(key, value)]
            }
        }
        AuthKind::Oauth2 => {
            let access_token = param("accessToken")?;
            let add_to = param_opt("addTokenTo")?.unwrap_or_else(|| "header".to_string());
            if add_to == "query" {
                vec![Placement::Query("access_token".to_string(), access_token)]
            } else {
                vec![Placement::Header(
                    "Authorization".to_string(),
                    format!("Bearer {access_token}"),
                )]
            }
        }
        AuthKind::Oauth1 => {
            let consumer_key = param("consumerKey")?;
            let consumer_secret = param("consumerSecret")?;
            let token = param("token")?;
            let token_secret = param("tokenSecret")?;
            let signature_method = param("signatureMethod")?;
            if signature_method != "HMAC-SHA1" {
                return Err(Error::unsupported_auth(&format!(
                    "oauth1 signatureMethod '{signature_method}'"
                )));
            }
            let header = sign_oauth1_hmac_sha1(
                method,
                url,
                &consumer_key,
                &consumer_secret,
                &token,
                &token_secret,
            );
            vec![Placement::Header("Authorization".to_string(), header)]
        }
        AuthKind::Digest | AuthKind::Awsv4 | AuthKind::Ntlm | AuthKind::Hawk => {
            return Err(Error::unsupported_auth(kind_name(auth.kind)));
        }
    };
    Ok((placements, diagnostics))
}

const fn kind_name(kind: AuthKind) -> &'static str {
    match kind {
        AuthKind::Noauth => "noauth",
        AuthKind::Basic => "basic",
        AuthKind::Bearer => "bearer",
        AuthKind::Apikey => "apikey",
        AuthKind::Oauth1 => "oauth1",
        AuthKind::Oauth2 => "oauth2",
        AuthKind::Digest => "digest",
        AuthKind::Awsv4 => "awsv4",
        AuthKind::Ntlm => "ntlm",
        AuthKind::Hawk => "hawk",
    }
}

type HmacSha1 = Hmac<Sha1>;

/// RFC 5849 HMAC-SHA1 signing, header-only (no query-param transmission).
fn sign_oauth1_hmac_sha1(
    method: &str,
    url: &str,
    consumer_key: &str,
    consumer_secret: &str,
    token: &str,
    token_secret: &str,
) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let timestamp = chrono::Utc::now().timestamp();

    let mut oauth_params = vec![
        ("oauth_consumer_key", consumer_key.to_string()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1".to_string()),
        ("oauth_timestamp", timestamp.to_string()),
        ("oauth_token", token.to_string()),
        ("oauth_version", "1.0".to_string()),
    ];
    oauth_params.sort_by(|a, b| a.0.cmp(b.0));

    let param_string = oauth_params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let base_url = url.split('?').next().unwrap_or(url);
    let base_string = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(base_url),
        encode(&param_string)
    );

    let signing_key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(base_string.as_bytes());
    let signature = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    format!(
        "OAuth oauth_consumer_key=\"{}\", oauth_nonce=\"{}\", oauth_signature=\"{}\", oauth_signature_method=\"HMAC-SHA1\", oauth_timestamp=\"{}\", oauth_token=\"{}\", oauth_version=\"1.0\"",
        encode(consumer_key),
        encode(&oauth_params[1].1),
        encode(&signature),
        timestamp,
        encode(token),
    )
}

fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}
