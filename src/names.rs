//! Helpers for C++ qualified names.
//!
//! Names are compared after normalization: no leading `::`, no template
//! argument lists, single `::` separators.

/// Split `a::b<c::d>::e` into `["a", "b<c::d>", "e"]`.
///
/// Separators inside `<...>` or `(...)` are not split on, and an `operator`
/// component swallows the rest of the name.
pub fn split_qualified(name: &str) -> Vec<&str> {
    let name = name.trim().trim_start_matches("::");
    let bytes = name.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if depth == 0 && i == start && is_operator(&name[start..]) {
            break;
        }
        match bytes[i] {
            b'<' | b'(' => depth += 1,
            b'>' | b')' => depth -= 1,
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                parts.push(name[start..i].trim());
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    let last = name[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

/// `operator<<`, `operator()`, `operator new`; not `operators` or `operator_id`.
fn is_operator(component: &str) -> bool {
    component.strip_prefix("operator").is_some_and(|rest| {
        !rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

/// Drop a template argument list from a single name component.
pub fn strip_template_args(component: &str) -> &str {
    if is_operator(component) {
        return component;
    }
    match component.find('<') {
        Some(pos) => component[..pos].trim_end(),
        None => component,
    }
}

/// Normalize a possibly-qualified name: `::ns::Foo<int>::bar` → `ns::Foo::bar`.
pub fn normalize(name: &str) -> String {
    split_qualified(name)
        .into_iter()
        .map(strip_template_args)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("::")
}

/// Last component of a qualified name.
pub fn simple_name(name: &str) -> &str {
    split_qualified(name).last().copied().unwrap_or("")
}

/// Everything but the last component (`""` for unqualified names).
pub fn scope_of(qualified: &str) -> String {
    let parts = split_qualified(qualified);
    match parts.len() {
        0 | 1 => String::new(),
        n => parts[..n - 1].join("::"),
    }
}

/// Enclosing scopes from innermost to the global one.
///
/// `scope_chain("a::b")` yields `["a::b", "a", ""]`.
pub fn scope_chain(scope: &str) -> Vec<String> {
    let parts = split_qualified(scope);
    let mut chain: Vec<String> = (1..=parts.len())
        .rev()
        .map(|n| parts[..n].join("::"))
        .collect();
    chain.push(String::new());
    chain
}

/// Join a scope and a name, skipping an empty scope.
pub fn join(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}::{name}")
    }
}

/// Whether `qualified` ends with the components of `suffix`.
pub fn has_suffix(qualified: &str, suffix: &str) -> bool {
    qualified == suffix || qualified.ends_with(&format!("::{suffix}"))
}
