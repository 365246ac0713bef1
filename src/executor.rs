//! Executor (component G): orchestrates single-request, folder-scoped, and
//! whole-collection runs, sequentially or with bounded concurrency, with
//! stop-on-error and cooperative cancellation.
//!
//! Parallel mode uses `futures::stream::buffer_unordered` rather than
//! `tokio::spawn` per request: the spec sanctions single-task cooperative
//! concurrency as an implementation of the "task-per-request" model (§5), and
//! it lets workers borrow the read-only Collection tree directly instead of
//! requiring `Arc`-wrapped ownership to satisfy `'static` spawn bounds.

use crate::auth::{self, ResolvedAuth};
use crate::collection::{Auth, Collection, Folder, Item, Request, Variable};
use crate::collection::tree::{self, TreeNodeRef};
use crate::context::ExecutionContext;
use crate::dispatch::{DispatchOptions, HttpDispatcher};
use crate::error::Error;
use crate::hooks::{NoopHook, PreRequestHook, TestHook};
use crate::prepare::{self, RequestExtensions};
use crate::resolve::{UndefinedPolicy, VariableResolver};
use crate::result::{CollectionExecutionResult, ExecutionResult, RequestRef};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Soft cap on in-flight requests in parallel mode (§5).
const MAX_PARALLELISM_CAP: usize = 64;

/// `ExecutorOptions` (§6 "Configuration keys"). Field-for-field the keys
/// named there, with the spec's defaults.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub timeout_ms: u64,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub verify_tls: bool,
    pub parallel: bool,
    pub max_parallelism: usize,
    pub stop_on_error: bool,
    pub strict_variables: bool,
    pub strict_hooks: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            follow_redirects: true,
            max_redirects: 10,
            verify_tls: true,
            parallel: false,
            max_parallelism: 8,
            stop_on_error: false,
            strict_variables: false,
            strict_hooks: false,
        }
    }
}

/// Orchestrates execution of a Collection, Folder, or single Request.
pub struct Executor {
    options: ExecutorOptions,
    dispatcher: HttpDispatcher,
    resolver: VariableResolver,
    pre_hook: Arc<dyn PreRequestHook>,
    test_hook: Arc<dyn TestHook>,
    cancel: CancellationToken,
    secret_ctx: Option<crate::logging::SecretContext>,
}

impl Executor {
    /// # Errors
    /// Propagates a dispatcher construction failure (invalid proxy URL, TLS
    /// backend init failure).
    pub fn new(options: ExecutorOptions) -> Result<Self, Error> {
        Self::with_hooks(options, Arc::new(NoopHook), Arc::new(NoopHook))
    }

    /// # Errors
    /// Same as [`Executor::new`].
    pub fn with_hooks(
        mut options: ExecutorOptions,
        pre_hook: Arc<dyn PreRequestHook>,
        test_hook: Arc<dyn TestHook>,
    ) -> Result<Self, Error> {
        options.max_parallelism = options.max_parallelism.clamp(1, MAX_PARALLELISM_CAP);
        let dispatch_options = DispatchOptions {
            timeout: Duration::from_millis(options.timeout_ms),
            follow_redirects: options.follow_redirects,
            max_redirects: options.max_redirects,
            verify_tls: options.verify_tls,
            proxy: None,
        };
        let dispatcher = HttpDispatcher::new(&dispatch_options)?;
        let policy = if options.strict_variables {
            UndefinedPolicy::Strict
        } else {
            UndefinedPolicy::Lenient
        };
        Ok(Self {
            options,
            dispatcher,
            resolver: VariableResolver::new(policy),
            pre_hook,
            test_hook,
            cancel: CancellationToken::new(),
            secret_ctx: None,
        })
    }

    /// Supplies the resolved secret values (from `config::ConfigManager::resolve_secrets`)
    /// used to redact request/response logging for this run.
    #[must_use]
    pub fn with_secret_context(mut self, secret_ctx: crate::logging::SecretContext) -> Self {
        self.secret_ctx = Some(secret_ctx);
        self
    }

    /// Standalone template resolution exposed for callers (§6).
    ///
    /// # Errors
    /// `VariableResolutionError` per [`VariableResolver::resolve`].
    pub fn resolve(&self, template: &str, ctx: &ExecutionContext) -> Result<String, Error> {
        self.resolver.resolve(template, ctx).map(|(s, _)| s)
    }

    /// Signals cancellation to any in-flight or future dispatch under this
    /// executor.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Releases the dispatcher's connection pool. `reqwest::Client` closes
    /// idle connections on drop, so this is a no-op placeholder that exists
    /// to give callers an explicit disposal point (§6).
    pub fn dispose(self) {
        drop(self);
    }

    /// Executes a single request in isolation (operation 1, §4.G). Takes
    /// `ctx` by mutable reference so the pre-request and test hooks can seed
    /// or extract `runtime`-scope variables for later requests in the same
    /// sequential run to pick up (§6, §8 scenario 2).
    pub async fn execute_request(
        &self,
        request: &Request,
        ctx: &mut ExecutionContext,
        effective_auth: &ResolvedAuth<'_>,
        extensions: Option<&RequestExtensions>,
        request_ref: RequestRef,
    ) -> ExecutionResult {
        let started_at = Utc::now().to_rfc3339();
        let start = Instant::now();
        let mut diagnostics: Vec<String> = Vec::new();

        let (mut wire, prep_diag) = match prepare::prepare(request, &*ctx, extensions, &self.resolver, effective_auth) {
            Ok(v) => v,
            Err(e) => {
                return ExecutionResult::failure(request_ref, &e, start.elapsed().as_millis(), started_at, diagnostics);
            }
        };
        diagnostics.extend(prep_diag.undefined.into_iter().map(|name| format!("undefined variable: {name}")));

        if let Err(e) = self.pre_hook.run(request, &mut wire, ctx) {
            if self.options.strict_hooks {
                return ExecutionResult::failure(request_ref, &e, start.elapsed().as_millis(), started_at, diagnostics);
            }
            diagnostics.push(format!("pre-request hook: {e}"));
        }

        let response = match self
            .dispatcher
            .dispatch(&wire, self.secret_ctx.as_ref(), &self.cancel)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return ExecutionResult::failure(request_ref, &e, start.elapsed().as_millis(), started_at, diagnostics);
            }
        };

        if let Err(e) = self.test_hook.run(request, &response, ctx) {
            if self.options.strict_hooks {
                return ExecutionResult::failure(request_ref, &e, start.elapsed().as_millis(), started_at, diagnostics);
            }
            diagnostics.push(format!("test hook: {e}"));
        }

        ExecutionResult::success(request_ref, response, start.elapsed().as_millis(), started_at, diagnostics)
    }

    /// Executes every request under `folder_name`, found anywhere in the
    /// tree, with that folder as the traversal root (operation 2, §4.G).
    ///
    /// # Errors
    /// `NotFoundError` if no folder with that name exists.
    pub async fn execute_folder(
        &self,
        collection: &Collection,
        folder_name: &str,
        ctx: &mut ExecutionContext,
    ) -> Result<CollectionExecutionResult, Error> {
        let item = tree::find_by_name(collection, folder_name)?;
        let Item::Folder(folder) = item else {
            return Err(Error::not_found("folder", folder_name));
        };
        let mut ancestor_path = Vec::new();
        if !find_folder_ancestors(&collection.items, folder.id, &mut ancestor_path) {
            return Err(Error::not_found("folder", folder_name));
        }

        let start = Instant::now();
        let (results, stopped_early) = if self.options.parallel {
            self.run_parallel_subtree(collection, folder, &ancestor_path, ctx).await
        } else {
            let mut ancestors_path = ancestor_path;
            let mut folder_auths: Vec<Option<&Auth>> = resolve_folder_auths(collection, &ancestors_path);
            ctx.push_folder(&folder.variables);
            ancestors_path.push(TreeNodeRef::from(folder));
            folder_auths.push(folder.auth.as_ref());
            let (results, stopped_early) =
                self.run_sequential_items(&folder.items, collection.auth.as_ref(), ctx, &mut ancestors_path, &mut folder_auths)
                    .await;
            ctx.pop_folder();
            (results, stopped_early)
        };

        Ok(CollectionExecutionResult::from_results(
            results,
            start.elapsed().as_millis(),
            stopped_early,
        ))
    }

    /// Executes every request in the collection (operation 3, §4.G).
    pub async fn execute_collection(
        &self,
        collection: &Collection,
        ctx: &mut ExecutionContext,
    ) -> Result<CollectionExecutionResult, Error> {
        let start = Instant::now();
        let (results, stopped_early) = if self.options.parallel {
            self.run_parallel(collection, ctx).await
        } else {
            let mut ancestors_path = Vec::new();
            let mut folder_auths = Vec::new();
            self.run_sequential_items(
                &collection.items,
                collection.auth.as_ref(),
                ctx,
                &mut ancestors_path,
                &mut folder_auths,
            )
            .await
        };
        Ok(CollectionExecutionResult::from_results(
            results,
            start.elapsed().as_millis(),
            stopped_early,
        ))
    }

    /// Depth-first pre-order sequential walk over `items`, threading a single
    /// mutable `ctx` through every request so `runtime` writes chain forward
    /// (§4.G "Sequential semantics").
    async fn run_sequential_items<'a>(
        &self,
        items: &'a [Item],
        collection_auth: Option<&'a Auth>,
        ctx: &mut ExecutionContext,
        ancestors_path: &mut Vec<TreeNodeRef>,
        folder_auths: &mut Vec<Option<&'a Auth>>,
    ) -> (Vec<ExecutionResult>, bool) {
        struct Frame<'a> {
            iter: std::slice::Iter<'a, Item>,
        }

        let mut results = Vec::new();
        let mut stopped_early = false;
        let mut frames = vec![Frame { iter: items.iter() }];

        'walk: loop {
            let Some(frame) = frames.last_mut() else {
                break;
            };
            match frame.iter.next() {
                Some(Item::Request(request)) => {
                    let effective_auth =
                        auth::resolve_effective_auth(request, ancestors_path, collection_auth, folder_auths);
                    let request_ref = RequestRef {
                        id: request.id.to_string(),
                        name: request.name.clone(),
                        path: ancestors_path.iter().map(|n| n.name.clone()).collect(),
                    };
                    let result = self
                        .execute_request(request, ctx, &effective_auth, None, request_ref)
                        .await;
                    let failed = !result.success;
                    results.push(result);
                    if failed && self.options.stop_on_error {
                        stopped_early = true;
                        break 'walk;
                    }
                }
                Some(Item::Folder(folder)) => {
                    ctx.push_folder(&folder.variables);
                    ancestors_path.push(TreeNodeRef::from(folder));
                    folder_auths.push(folder.auth.as_ref());
                    frames.push(Frame { iter: folder.items.iter() });
                }
                None => {
                    frames.pop();
                    if !frames.is_empty() {
                        ctx.pop_folder();
                        ancestors_path.pop();
                        folder_auths.pop();
                    }
                }
            }
        }

        // Stopping early can leave folder scopes open partway down the tree
        // (the `None` arm above only unwinds on natural exhaustion); pop
        // whatever frames remain so `ctx`/`ancestors_path`/`folder_auths`
        // return to the depth they had on entry.
        while frames.len() > 1 {
            frames.pop();
            ctx.pop_folder();
            ancestors_path.pop();
            folder_auths.pop();
        }

        (results, stopped_early)
    }

    /// Parallel mode: flattens the whole tree into independent per-request
    /// work items up front, then runs up to `max_parallelism` concurrently
    /// (§4.G "Parallel semantics").
    async fn run_parallel(&self, collection: &Collection, ctx: &ExecutionContext) -> (Vec<ExecutionResult>, bool) {
        let flat = flatten(&collection.items);
        self.run_flat_parallel(flat, collection.auth.as_ref(), ctx).await
    }

    async fn run_parallel_subtree(
        &self,
        collection: &Collection,
        folder: &Folder,
        ancestor_path: &[TreeNodeRef],
        ctx: &ExecutionContext,
    ) -> (Vec<ExecutionResult>, bool) {
        let mut ancestors_path = ancestor_path.to_vec();
        let mut folder_auths = resolve_folder_auths(collection, &ancestors_path);
        ancestors_path.push(TreeNodeRef::from(folder));
        folder_auths.push(folder.auth.as_ref());

        let mut flat = Vec::new();
        flatten_into(
            &folder.items,
            &mut ancestors_path,
            &mut folder_auths,
            &mut vec![&folder.variables[..]],
            &mut flat,
        );
        self.run_flat_parallel(flat, collection.auth.as_ref(), ctx).await
    }

    async fn run_flat_parallel<'a>(
        &self,
        flat: Vec<FlatRequest<'a>>,
        collection_auth: Option<&'a Auth>,
        ctx: &ExecutionContext,
    ) -> (Vec<ExecutionResult>, bool) {
        let base = ctx.snapshot();
        let results = stream::iter(flat.into_iter())
            .map(|item| {
                let base = base.clone();
                let cancel = self.cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let mut worker_ctx = base;
                    for &vars in &item.folder_vars {
                        worker_ctx.push_folder(vars);
                    }
                    let effective_auth = auth::resolve_effective_auth(
                        item.request,
                        &item.ancestors,
                        collection_auth,
                        &item.folder_auths,
                    );
                    let request_ref = RequestRef {
                        id: item.request.id.to_string(),
                        name: item.request.name.clone(),
                        path: item.ancestors.iter().map(|n| n.name.clone()).collect(),
                    };
                    let result = self
                        .execute_request(item.request, &mut worker_ctx, &effective_auth, None, request_ref)
                        .await;
                    Some(result)
                }
            })
            .buffer_unordered(self.options.max_parallelism);

        tokio::pin!(results);
        let mut out = Vec::new();
        let mut stopped_early = false;
        while let Some(maybe_result) = results.next().await {
            let Some(result) = maybe_result else {
                continue;
            };
            let failed = !result.success;
            out.push(result);
            if failed && self.options.stop_on_error && !self.cancel.is_cancelled() {
                self.cancel.cancel();
                stopped_early = true;
            }
        }
        (out, stopped_early)
    }
}

/// Ancestor path down to (but excluding) the folder identified by `target`.
/// `tree::ancestors` only resolves request ids (§3 "ancestors" is defined for
/// requests); folder-scoped runs need the same walk for a folder id.
fn find_folder_ancestors(
    items: &[Item],
    target: crate::collection::ItemId,
    path: &mut Vec<TreeNodeRef>,
) -> bool {
    for item in items {
        if let Item::Folder(f) = item {
            if f.id == target {
                return true;
            }
            path.push(TreeNodeRef::from(f));
            if find_folder_ancestors(&f.items, target, path) {
                return true;
            }
            path.pop();
        }
    }
    false
}

/// Folder auths for an already-known ancestor path, used when a folder-scoped
/// run needs the same parallel ancestor arrays `resolve_effective_auth` takes.
fn resolve_folder_auths<'a>(collection: &'a Collection, ancestor_path: &[TreeNodeRef]) -> Vec<Option<&'a Auth>> {
    let mut out = Vec::with_capacity(ancestor_path.len());
    let mut items = &collection.items;
    for node in ancestor_path {
        let folder = items.iter().find_map(|item| match item {
            Item::Folder(f) if f.id == node.id => Some(f),
            _ => None,
        });
        match folder {
            Some(f) => {
                out.push(f.auth.as_ref());
                items = &f.items;
            }
            None => out.push(None),
        }
    }
    out
}

struct FlatRequest<'a> {
    request: &'a Request,
    ancestors: Vec<TreeNodeRef>,
    folder_auths: Vec<Option<&'a Auth>>,
    folder_vars: Vec<&'a [Variable]>,
}

fn flatten(items: &[Item]) -> Vec<FlatRequest<'_>> {
    let mut out = Vec::new();
    flatten_into(items, &mut Vec::new(), &mut Vec::new(), &mut Vec::new(), &mut out);
    out
}

fn flatten_into<'a>(
    items: &'a [Item],
    ancestors: &mut Vec<TreeNodeRef>,
    folder_auths: &mut Vec<Option<&'a Auth>>,
    folder_vars: &mut Vec<&'a [Variable]>,
    out: &mut Vec<FlatRequest<'a>>,
) {
    for item in items {
        match item {
            Item::Request(r) => out.push(FlatRequest {
                request: r,
                ancestors: ancestors.clone(),
                folder_auths: folder_auths.clone(),
                folder_vars: folder_vars.clone(),
            }),
            Item::Folder(f) => {
                ancestors.push(TreeNodeRef::from(f));
                folder_auths.push(f.auth.as_ref());
                folder_vars.push(&f.variables[..]);
                flatten_into(&f.items, ancestors, folder_auths, folder_vars, out);
                folder_vars.pop();
                folder_auths.pop();
                ancestors.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{CollectionInfo, ItemId, Method, SchemaVersion, Url};

    fn ping_request(name: &str) -> Request {
        Request {
            id: ItemId::new(),
            name: name.to_string(),
            description: None,
            auth: None,
            variables: vec![],
            events: vec![],
            method: Method::Get,
            url: Url::from_raw("http://127.0.0.1:0/ping"),
            headers: vec![],
            body: None,
            example_responses: vec![],
        }
    }

    #[test]
    fn default_options_match_spec_defaults() {
        let opts = ExecutorOptions::default();
        assert_eq!(opts.timeout_ms, 30_000);
        assert_eq!(opts.max_parallelism, 8);
        assert!(!opts.parallel);
        assert!(!opts.stop_on_error);
    }

    #[test]
    fn max_parallelism_is_clamped_to_soft_cap() {
        let mut options = ExecutorOptions::default();
        options.max_parallelism = 9000;
        let executor = Executor::new(options).unwrap();
        assert_eq!(executor.options.max_parallelism, MAX_PARALLELISM_CAP);
    }

    #[test]
    fn flatten_collects_requests_with_ancestor_and_auth_arrays() {
        let inner = ping_request("inner");
        let folder = Folder {
            id: ItemId::new(),
            name: "folder-a".to_string(),
            description: None,
            auth: None,
            variables: vec![],
            events: vec![],
            items: vec![Item::Request(inner)],
        };
        let items = vec![Item::Folder(folder), Item::Request(ping_request("top"))];
        let flat = flatten(&items);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].ancestors.len(), 1);
        assert_eq!(flat[0].folder_auths.len(), 1);
        assert!(flat[1].ancestors.is_empty());
    }

    #[tokio::test]
    async fn sequential_stop_on_error_halts_after_first_failure() {
        let mut options = ExecutorOptions::default();
        options.stop_on_error = true;
        let executor = Executor::new(options).unwrap();

        let collection = Collection {
            info: CollectionInfo {
                name: "c".to_string(),
                schema_version: SchemaVersion::V2_1,
                description: None,
            },
            items: vec![
                Item::Request(unreachable_request("one")),
                Item::Request(unreachable_request("two")),
                Item::Request(unreachable_request("three")),
            ],
            variables: vec![],
            auth: None,
            events: vec![],
        };
        let mut ctx = ExecutionContext::new();
        let result = executor.execute_collection(&collection, &mut ctx).await.unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.stopped_early, Some(true));
    }

    fn unreachable_request(name: &str) -> Request {
        Request {
            id: ItemId::new(),
            name: name.to_string(),
            description: None,
            auth: None,
            variables: vec![],
            events: vec![],
            method: Method::Get,
            url: Url::from_raw("http://127.0.0.1:1/"),
            headers: vec![],
            body: None,
            example_responses: vec![],
        }
    }
}
