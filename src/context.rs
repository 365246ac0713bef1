//! Execution Context (component B): a layered variable store with
//! `global`/`environment`/`collection`/`folder`/`request`/`runtime` scopes
//! and a nested-folder scope stack.
//!
//! Precedence is imposed at lookup time by the resolver (`crate::resolve`),
//! not here — this module only owns storage and the folder stack.

use std::collections::HashMap;

/// One named level of the layered variable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Environment,
    Collection,
    Folder,
    Request,
    Runtime,
}

/// A single variable entry: value plus an enabled flag, since disabled
/// variables are skipped during lookup (§4.C).
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    enabled: bool,
}

type ScopeMap = HashMap<String, Entry>;

/// The layered variable store threaded through one execution.
///
/// In sequential mode a single `ExecutionContext` is threaded through all
/// requests so `runtime` writes from one request are visible to later ones
/// (response-token chaining). In parallel mode each worker gets an immutable
/// `snapshot()` plus its own fresh `runtime` scope — see `crate::executor`.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    global: ScopeMap,
    environment: ScopeMap,
    collection: ScopeMap,
    /// Innermost-last stack of folder scopes, pushed on entering a folder
    /// and popped on leaving it during a sequential depth-first walk.
    folder_stack: Vec<ScopeMap>,
    request: ScopeMap,
    runtime: ScopeMap,
}

impl ExecutionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one scope from caller-provided key/value pairs, all enabled.
    pub fn seed(&mut self, scope: Scope, values: impl IntoIterator<Item = (String, String)>) {
        for (k, v) in values {
            self.set(scope, &k, v);
        }
    }

    /// Writes into one named scope. Folder writes go to the innermost
    /// currently-pushed folder scope; if none is pushed, a scope is created.
    pub fn set(&mut self, scope: Scope, key: &str, value: impl Into<String>) {
        let entry = Entry {
            value: value.into(),
            enabled: true,
        };
        match scope {
            Scope::Global => {
                self.global.insert(key.to_string(), entry);
            }
            Scope::Environment => {
                self.environment.insert(key.to_string(), entry);
            }
            Scope::Collection => {
                self.collection.insert(key.to_string(), entry);
            }
            Scope::Folder => {
                if self.folder_stack.is_empty() {
                    self.folder_stack.push(HashMap::new());
                }
                self.folder_stack
                    .last_mut()
                    .expect("just ensured non-empty")
                    .insert(key.to_string(), entry);
            }
            Scope::Request => {
                self.request.insert(key.to_string(), entry);
            }
            Scope::Runtime => {
                self.runtime.insert(key.to_string(), entry);
            }
        }
    }

    /// Looks up `key` honoring §4.C precedence:
    /// runtime > request > innermost folder > … > outermost folder >
    /// collection > environment > global. Disabled variables are skipped.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        lookup(&self.runtime, key)
            .or_else(|| lookup(&self.request, key))
            .or_else(|| self.folder_stack.iter().rev().find_map(|f| lookup(f, key)))
            .or_else(|| lookup(&self.collection, key))
            .or_else(|| lookup(&self.environment, key))
            .or_else(|| lookup(&self.global, key))
    }

    /// Pushes a fresh folder scope seeded from `vars`, called on entering a
    /// folder during traversal.
    pub fn push_folder(&mut self, vars: &[crate::collection::Variable]) {
        let mut map = HashMap::new();
        for v in vars {
            map.insert(
                v.key.clone(),
                Entry {
                    value: v.value.clone(),
                    enabled: v.enabled,
                },
            );
        }
        self.folder_stack.push(map);
    }

    /// Pops the innermost folder scope, called on leaving a folder.
    pub fn pop_folder(&mut self) {
        self.folder_stack.pop();
    }

    /// An immutable, independently-writable clone handed to a parallel
    /// worker together with a fresh `runtime` scope. Writes made through the
    /// returned context never propagate back to `self` (§5 "per-worker
    /// mutable").
    #[must_use]
    pub fn snapshot(&self) -> Self {
        Self {
            global: self.global.clone(),
            environment: self.environment.clone(),
            collection: self.collection.clone(),
            folder_stack: self.folder_stack.clone(),
            request: self.request.clone(),
            runtime: HashMap::new(),
        }
    }
}

fn lookup<'a>(map: &'a ScopeMap, key: &str) -> Option<&'a str> {
    map.get(key)
        .filter(|e| e.enabled)
        .map(|e| e.value.as_str())
}
