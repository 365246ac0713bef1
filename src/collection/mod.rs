//! Component A: the collection tree model and its read-only accessors.

pub mod loader;
pub mod model;
pub mod tree;

pub use loader::{parse_collection, CollectionLoader, JsonFileLoader};
pub use model::{
    Auth, AuthKind, Body, Collection, CollectionInfo, Event, EventListen, Folder, Header, Item,
    ItemId, KeyValue, Method, QueryParam, Request, SchemaVersion, Script, Url, Variable,
};
pub use tree::{ancestors, find_by_name, walk_requests, TreeNodeRef};
