//! The collection tree model (component A): Collection, Item, Folder, Request,
//! and their attached Url/Header/Body/Auth/Variable/Event types.
//!
//! The tree is read-only after load: items carry no back-reference to their
//! parent, so ancestor paths are computed on demand (see `tree::ancestors`)
//! rather than stored, avoiding reference cycles.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity for a Folder or Request, independent of its display name.
///
/// `find_by_name` only promises first-match-by-name; executors and result
/// models need a cheap, clone-friendly identity that survives a rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(rename = "2.0.0", alias = "v2.0")]
    V2_0,
    #[serde(rename = "2.1.0", alias = "v2.1")]
    V2_1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub schema_version: SchemaVersion,
    #[serde(default)]
    pub description: Option<String>,
}

/// Root container of items, variables, auth, and events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub info: CollectionInfo,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub auth: Option<Auth>,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// A variant of Request or Folder, the two things a collection tree can hold.
///
/// `Request` is tried first: it has non-optional `method`/`url` fields, so a
/// folder document (which has neither) always fails that branch and falls
/// through to `Folder`, whose only required field is `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Item {
    Request(Request),
    Folder(Folder),
}

impl Item {
    #[must_use]
    pub fn id(&self) -> ItemId {
        match self {
            Self::Folder(f) => f.id,
            Self::Request(r) => r.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Folder(f) => &f.name,
            Self::Request(r) => &r.name,
        }
    }

    #[must_use]
    pub fn auth(&self) -> Option<&Auth> {
        match self {
            Self::Folder(f) => f.auth.as_ref(),
            Self::Request(r) => r.auth.as_ref(),
        }
    }

    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        match self {
            Self::Folder(f) => &f.variables,
            Self::Request(r) => &r.variables,
        }
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}

/// A named, possibly nested container contributing a variable scope and
/// optional auth during traversal. A Folder owns its children exclusively —
/// no item appears under two folders, and no cycle is constructible because
/// `items` is an owned `Vec`, never a shared or back-referencing handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    #[serde(default = "ItemId::new")]
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub auth: Option<Auth>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub items: Vec<Item>,
}

/// One HTTP call definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "ItemId::new")]
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub auth: Option<Auth>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub events: Vec<Event>,
    pub method: Method,
    pub url: Url,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<Body>,
    #[serde(default)]
    pub example_responses: Vec<ExampleResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

/// A single query-string entry. `disabled` and "empty value" are distinct:
/// disabled entries are dropped during preparation, empty-valued entries are
/// kept (Open Question resolution — see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryParam {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub disabled: bool,
}

/// Structured URL. `raw` is carried for round-tripping but the structured
/// fields are authoritative for resolution; `raw` is re-derived on render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Url {
    #[serde(default)]
    pub raw: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub host: Vec<String>,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub query: Vec<QueryParam>,
    #[serde(default)]
    pub path_vars: Vec<Variable>,
}

impl Url {
    /// Parses a raw URL string into host/path/query components, used by the
    /// reference loader when a collection only provides `raw`.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let (before_query, query_str) = raw.split_once('?').unwrap_or((raw, ""));
        let (protocol, rest) = before_query
            .split_once("://")
            .map_or((None, before_query), |(p, r)| (Some(p.to_string()), r));
        let (host_part, path_part) = rest.split_once('/').unwrap_or((rest, ""));
        let host: Vec<String> = host_part.split('.').map(str::to_string).collect();
        let path: Vec<String> = path_part
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let query = query_str
            .split('&')
            .filter(|s| !s.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                QueryParam {
                    key: k.to_string(),
                    value: v.to_string(),
                    disabled: false,
                }
            })
            .collect();
        Self {
            raw: raw.to_string(),
            protocol,
            host,
            port: None,
            path,
            query,
            path_vars: Vec::new(),
        }
    }
}

/// Case-insensitive on override; original casing is preserved on emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Body {
    Raw { raw: String },
    Urlencoded { urlencoded: Vec<KeyValue> },
    Formdata { formdata: Vec<KeyValue> },
    File { file: FileRef },
    Graphql { query: String, variables: Option<String> },
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub src: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleResponse {
    pub name: String,
    pub status: u16,
    #[serde(default)]
    pub body: Option<String>,
}

/// `{type, parameters}` — parameters are type-specific; see `auth::apply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    #[serde(rename = "type")]
    pub kind: AuthKind,
    #[serde(default)]
    pub parameters: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    Noauth,
    Basic,
    Bearer,
    Apikey,
    Oauth1,
    Oauth2,
    Digest,
    Awsv4,
    Ntlm,
    Hawk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub var_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub listen: EventListen,
    pub script: Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventListen {
    Prerequest,
    Test,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub lines: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_from_raw_splits_components() {
        let url = Url::from_raw("https://api.x/users/42?limit=10");
        assert_eq!(url.protocol.as_deref(), Some("https"));
        assert_eq!(url.path, vec!["users", "42"]);
        assert_eq!(url.query.len(), 1);
        assert_eq!(url.query[0].key, "limit");
        assert_eq!(url.query[0].value, "10");
    }

    #[test]
    fn item_auth_is_none_for_unset_folder() {
        let folder = Folder {
            id: ItemId::new(),
            name: "f".into(),
            description: None,
            auth: None,
            variables: vec![],
            events: vec![],
            items: vec![],
        };
        assert!(Item::Folder(folder).auth().is_none());
    }
}
