//! Read-only tree accessors (component A operations): `walk_requests`,
//! `find_by_name`, `ancestors`.
//!
//! None of these mutate the tree or retain a parent back-reference; ancestor
//! paths are computed on demand during a walk, per the spec's note on
//! avoiding reference cycles (§9 "Reference cycles").

use super::model::{Collection, Folder, Item, Request};
use crate::error::Error;

/// A cheap, clone-friendly handle identifying a position in the tree,
/// carried instead of a parent back-reference.
#[derive(Debug, Clone)]
pub struct TreeNodeRef {
    pub id: crate::collection::model::ItemId,
    pub name: String,
}

impl<'a> From<&'a Folder> for TreeNodeRef {
    fn from(f: &'a Folder) -> Self {
        Self {
            id: f.id,
            name: f.name.clone(),
        }
    }
}

/// Depth-first pre-order walk over the tree, yielding each Request together
/// with its ancestor folder path (collection root excluded, nearest last).
#[must_use]
pub fn walk_requests(collection: &Collection) -> Vec<(&Request, Vec<TreeNodeRef>)> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    walk_items(&collection.items, &mut path, &mut out);
    out
}

fn walk_items<'a>(
    items: &'a [Item],
    path: &mut Vec<TreeNodeRef>,
    out: &mut Vec<(&'a Request, Vec<TreeNodeRef>)>,
) {
    for item in items {
        match item {
            Item::Request(r) => out.push((r, path.clone())),
            Item::Folder(f) => {
                path.push(TreeNodeRef::from(f));
                walk_items(&f.items, path, out);
                path.pop();
            }
        }
    }
}

/// First match, depth-first pre-order, by request or folder name.
///
/// # Errors
/// Returns `NotFoundError` if no item with `name` exists in the tree.
pub fn find_by_name<'a>(collection: &'a Collection, name: &str) -> Result<&'a Item, Error> {
    find_in_items(&collection.items, name).ok_or_else(|| Error::not_found("item", name))
}

fn find_in_items<'a>(items: &'a [Item], name: &str) -> Option<&'a Item> {
    for item in items {
        if item.name() == name {
            return Some(item);
        }
        if let Item::Folder(f) = item {
            if let Some(found) = find_in_items(&f.items, name) {
                return Some(found);
            }
        }
    }
    None
}

/// Ordered ancestor path from the collection root down to (but excluding)
/// the request itself, for the request identified by `request_id`.
///
/// # Errors
/// Returns `NotFoundError` if no request with that id exists in the tree.
pub fn ancestors(
    collection: &Collection,
    request_id: crate::collection::model::ItemId,
) -> Result<Vec<TreeNodeRef>, Error> {
    let mut path = Vec::new();
    if find_ancestors(&collection.items, request_id, &mut path) {
        Ok(path)
    } else {
        Err(Error::not_found("request", &request_id.to_string()))
    }
}

fn find_ancestors(items: &[Item], target: crate::collection::model::ItemId, path: &mut Vec<TreeNodeRef>) -> bool {
    for item in items {
        match item {
            Item::Request(r) if r.id == target => return true,
            Item::Folder(f) => {
                path.push(TreeNodeRef::from(f));
                if find_ancestors(&f.items, target, path) {
                    return true;
                }
                path.pop();
            }
            Item::Request(_) => {}
        }
    }
    false
}
