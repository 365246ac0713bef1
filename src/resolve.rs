//! Variable Resolver (component C): template expansion of `{{key}}` and the
//! `:key` path-parameter form, built-in dynamic variables, and cycle
//! detection over the layered `ExecutionContext` (component B).

use crate::context::ExecutionContext;
use crate::error::Error;
use chrono::Utc;

/// Per-resolution visit cap for any single key before the resolver reports
/// `VariableResolutionError{CycleOrDepth}` (§4.C).
const MAX_VISITS_PER_KEY: u32 = 10;

/// Selectable at construction. Default is `Lenient` during preparation to
/// preserve Postman compatibility; `Strict` is opt-in (`--strict-variables`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndefinedPolicy {
    #[default]
    Lenient,
    Strict,
}

/// Names of undefined references left in place under the lenient policy.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub undefined: Vec<String>,
}

pub struct VariableResolver {
    policy: UndefinedPolicy,
}

impl VariableResolver {
    #[must_use]
    pub const fn new(policy: UndefinedPolicy) -> Self {
        Self { policy }
    }

    /// Resolves all `{{...}}` references in `template` against `ctx`,
    /// re-scanning the result after each substitution until no template
    /// remains (two-pass expansion, §8 "Round-trip") or a cycle is detected.
    ///
    /// # Errors
    /// `VariableResolutionError{Undefined}` under the strict policy, or
    /// `VariableResolutionError{CycleOrDepth}` if any key is visited more
    /// than `MAX_VISITS_PER_KEY` times while resolving this one template.
    pub fn resolve(&self, template: &str, ctx: &ExecutionContext) -> Result<(String, Diagnostics), Error> {
        let mut current = template.to_string();
        let mut visits: std::collections::HashMap<String, u32> = std::collections::HashMap::new();
        let mut diagnostics = Diagnostics::default();
        // Byte offset to resume scanning from; advanced past literals we
        // deliberately left unexpanded so a lenient miss doesn't loop forever.
        let mut search_from = 0;

        loop {
            let Some(span) = find_next_template(&current[search_from..]) else {
                return Ok((current, diagnostics));
            };
            let start = search_from + span.start;
            let end = search_from + span.end;
            let name = span.name;

            let count = visits.entry(name.to_string()).or_insert(0);
            *count += 1;
            if *count > MAX_VISITS_PER_KEY {
                return Err(Error::cycle_or_depth(name));
            }

            match resolve_one(name, ctx) {
                Some(value) => {
                    current.replace_range(start..end, &value);
                    // The substitution may itself contain templates (two-pass
                    // expansion); re-scan from the top of the string.
                    search_from = 0;
                }
                None => match self.policy {
                    UndefinedPolicy::Strict => return Err(Error::undefined_variable(name)),
                    UndefinedPolicy::Lenient => {
                        diagnostics.undefined.push(name.to_string());
                        search_from = end;
                    }
                },
            }
        }
    }
}

fn resolve_one(name: &str, ctx: &ExecutionContext) -> Option<String> {
    match name {
        "$guid" => Some(uuid::Uuid::new_v4().to_string()),
        "$timestamp" => Some(Utc::now().timestamp().to_string()),
        "$isoTimestamp" => Some(Utc::now().to_rfc3339()),
        "$randomInt" => Some(fastrand::u32(0..=1000).to_string()),
        _ => ctx.get(name).map(str::to_string),
    }
}

struct TemplateSpan<'a> {
    start: usize,
    end: usize,
    name: &'a str,
}

/// Finds the next `{{...}}` span in `s`, the teacher's brace-scanning style
/// (see `config/server_variable_resolver.rs::find_next_template`).
fn find_next_template(s: &str) -> Option<TemplateSpan<'_>> {
    let start = s.find("{{")?;
    let rel_end = s[start + 2..].find("}}")?;
    let end = start + 2 + rel_end + 2;
    let name = s[start + 2..start + 2 + rel_end].trim();
    Some(TemplateSpan { start, end, name })
}

/// Expands a `:key` path parameter occupying an entire path segment or query
/// value position (`/:foo/`, `?x=:foo`, `?:foo`). A bare `:` followed by a
/// non-identifier character is not a reference — callers only invoke this on
/// segments/values already isolated by the URL grammar, so no boundary
/// scanning is needed here.
#[must_use]
pub fn resolve_path_param(segment: &str, ctx: &ExecutionContext) -> Option<String> {
    let name = segment.strip_prefix(':')?;
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    ctx.get(name).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Scope;

    #[test]
    fn resolves_simple_reference() {
        let mut ctx = ExecutionContext::new();
        ctx.set(Scope::Global, "name", "world");
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let (out, _) = resolver.resolve("hello {{name}}", &ctx).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn two_pass_expansion_resolves_nested_reference() {
        let mut ctx = ExecutionContext::new();
        ctx.set(Scope::Global, "a", "{{b}}");
        ctx.set(Scope::Global, "b", "c");
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let (out, _) = resolver.resolve("{{a}}", &ctx).unwrap();
        assert_eq!(out, "c");
    }

    #[test]
    fn self_referencing_key_overflows_to_cycle_error() {
        let mut ctx = ExecutionContext::new();
        ctx.set(Scope::Global, "a", "{{a}}");
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let err = resolver.resolve("{{a}}", &ctx).unwrap_err();
        assert!(matches!(
            err.kind(),
            Some(crate::error::ErrorKind::VariableResolution(
                crate::error::VariableResolutionKind::CycleOrDepth
            ))
        ));
    }

    #[test]
    fn strict_policy_fails_on_undefined() {
        let ctx = ExecutionContext::new();
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        assert!(resolver.resolve("{{missing}}", &ctx).is_err());
    }

    #[test]
    fn lenient_policy_leaves_literal_and_records_diagnostic() {
        let ctx = ExecutionContext::new();
        let resolver = VariableResolver::new(UndefinedPolicy::Lenient);
        let (out, diag) = resolver.resolve("{{missing}}", &ctx).unwrap();
        assert_eq!(out, "{{missing}}");
        assert_eq!(diag.undefined, vec!["missing".to_string()]);
    }

    #[test]
    fn no_references_returns_input_unchanged() {
        let ctx = ExecutionContext::new();
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let (out, _) = resolver.resolve("just text", &ctx).unwrap();
        assert_eq!(out, "just text");
    }

    #[test]
    fn resolve_is_idempotent_after_fixed_point() {
        let mut ctx = ExecutionContext::new();
        ctx.set(Scope::Global, "name", "world");
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let (once, _) = resolver.resolve("hello {{name}}", &ctx).unwrap();
        let (twice, _) = resolver.resolve(&once, &ctx).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn path_param_resolves_whole_segment() {
        let mut ctx = ExecutionContext::new();
        ctx.set(Scope::Global, "id", "42");
        assert_eq!(resolve_path_param(":id", &ctx).as_deref(), Some("42"));
    }

    #[test]
    fn bare_colon_is_not_a_reference() {
        let ctx = ExecutionContext::new();
        assert_eq!(resolve_path_param(":", &ctx), None);
    }

    #[test]
    fn builtin_guid_resolves_without_store_entry() {
        let ctx = ExecutionContext::new();
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let (out, _) = resolver.resolve("{{$guid}}", &ctx).unwrap();
        assert_eq!(out.len(), 36);
    }

    #[test]
    fn builtin_random_int_within_range() {
        let ctx = ExecutionContext::new();
        let resolver = VariableResolver::new(UndefinedPolicy::Strict);
        let (out, _) = resolver.resolve("{{$randomInt}}", &ctx).unwrap();
        let n: u32 = out.parse().unwrap();
        assert!(n <= 1000);
    }
}
