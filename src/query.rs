//! Query operations over a [`ProjectSnapshot`].
//!
//! Every response is plain serializable data with a [`QueryStatus`]. A name
//! that matches nothing is a `not_found` response, never an error; only
//! malformed patterns are errors.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{QueryStatus, Result};
use crate::graph::calls::{CallGraphStats, CallRelation, UnresolvedCall};
use crate::graph::index::Related;
use crate::graph::snapshot::ProjectSnapshot;
use crate::graph::types::{
    BaseSpecifier, CallSite, Diagnostic, IndexStats, Symbol, SymbolId, SymbolKind,
};
use crate::names;

const CLASS_KINDS: &[SymbolKind] = &[SymbolKind::Class, SymbolKind::Struct];
const FUNCTION_KINDS: &[SymbolKind] = &[SymbolKind::Function, SymbolKind::Method];

/// Filters shared by the search operations.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    /// Leave out symbols from dependency directories (default true).
    pub project_only: bool,
    /// Only members of this class (simple or qualified name).
    pub class_name: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            project_only: true,
            class_name: None,
        }
    }
}

// ─── Response Types ─────────────────────────────────────────────

/// A symbol as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolView {
    #[serde(flatten)]
    pub symbol: Symbol,
    pub is_project: bool,
    /// `double geo::Circle::area() const`
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub status: QueryStatus,
    pub pattern: String,
    pub count: usize,
    pub results: Vec<SymbolView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassInfo {
    pub class: SymbolView,
    pub bases: Vec<BaseSpecifier>,
    pub methods: Vec<SymbolView>,
    pub fields: Vec<SymbolView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassInfoResponse {
    pub status: QueryStatus,
    pub name: String,
    pub classes: Vec<ClassInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignatureResponse {
    pub status: QueryStatus,
    pub name: String,
    /// One entry per overload; definitions stand in for their declarations.
    pub overloads: Vec<SymbolView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSymbolsResponse {
    pub status: QueryStatus,
    pub file: PathBuf,
    pub symbols: Vec<SymbolView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedClass {
    pub name: String,
    pub depth: usize,
    pub symbol: Option<SymbolView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HierarchyEntry {
    pub class: SymbolView,
    /// Root first, ending with the direct bases.
    pub ancestors: Vec<RelatedClass>,
    pub cycles: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HierarchyResponse {
    pub status: QueryStatus,
    pub name: String,
    pub classes: Vec<HierarchyEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DerivedEntry {
    pub class_name: String,
    /// `None` for bases outside the index, such as `std::exception`.
    pub class: Option<SymbolView>,
    pub derived: Vec<RelatedClass>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DerivedResponse {
    pub status: QueryStatus,
    pub name: String,
    pub classes: Vec<DerivedEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallView {
    pub symbol: SymbolView,
    pub sites: Vec<CallSite>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallEntry {
    pub function: SymbolView,
    pub calls: Vec<CallView>,
    /// Callees that matched no symbol (empty for caller queries).
    pub unresolved: Vec<UnresolvedCall>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallResponse {
    pub status: QueryStatus,
    pub name: String,
    pub functions: Vec<CallEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallPathResponse {
    pub status: QueryStatus,
    pub from: String,
    pub to: String,
    pub max_depth: usize,
    pub path: Vec<SymbolView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedSymbol {
    pub qualified_name: String,
    pub call_sites: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub root: PathBuf,
    pub generation: u64,
    pub built_at: String,
    pub files: usize,
    pub stats: IndexStats,
    pub call_graph: CallGraphStats,
    pub most_called: Vec<RankedSymbol>,
    pub most_calling: Vec<RankedSymbol>,
    pub diagnostics: Vec<Diagnostic>,
}

// ─── Helpers ────────────────────────────────────────────────────

/// Compile a name pattern. A plain word is a substring match.
pub fn compile_pattern(pattern: &str, case_sensitive: bool) -> Result<Regex> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()?;
    Ok(regex)
}

fn view(snapshot: &ProjectSnapshot, symbol: &Symbol) -> SymbolView {
    SymbolView {
        symbol: symbol.clone(),
        is_project: snapshot.index.is_project(symbol),
        display: symbol.display_signature(),
    }
}

fn related_view(snapshot: &ProjectSnapshot, related: &Related<'_>) -> RelatedClass {
    RelatedClass {
        name: related.name.clone(),
        depth: related.depth,
        symbol: related.symbol.map(|s| view(snapshot, s)),
    }
}

fn in_class(symbol: &Symbol, class: &str) -> bool {
    let class = names::normalize(class);
    symbol
        .parent
        .as_deref()
        .is_some_and(|parent| names::has_suffix(parent, &class))
}

/// One symbol per overload, definitions preferred, lexical order kept.
fn distinct_overloads<'a>(symbols: Vec<&'a Symbol>) -> Vec<&'a Symbol> {
    let mut out: Vec<&Symbol> = Vec::new();
    for sym in symbols {
        let key = sym.overload_key();
        match out.iter_mut().find(|s| s.overload_key() == key) {
            Some(existing) if !existing.is_definition && sym.is_definition => *existing = sym,
            Some(_) => {}
            None => out.push(sym),
        }
    }
    out
}

fn functions_named<'a>(
    snapshot: &'a ProjectSnapshot,
    name: &str,
    class_name: Option<&str>,
) -> Vec<&'a Symbol> {
    let matches = snapshot
        .index
        .callables_named(name)
        .into_iter()
        .filter(|s| class_name.map_or(true, |c| in_class(s, c)))
        .collect();
    distinct_overloads(matches)
}

// ─── Search ─────────────────────────────────────────────────────

/// Symbols of the given kinds whose name matches `pattern`, in lexical order.
pub fn search_symbols(
    snapshot: &ProjectSnapshot,
    pattern: &str,
    kinds: Option<&[SymbolKind]>,
    options: &SearchOptions,
) -> Result<SearchResponse> {
    let regex = compile_pattern(pattern, options.case_sensitive)?;
    let results: Vec<SymbolView> = snapshot
        .index
        .by_name(&regex, kinds)
        .into_iter()
        .filter(|s| !options.project_only || snapshot.index.is_project(s))
        .filter(|s| {
            options
                .class_name
                .as_deref()
                .map_or(true, |c| in_class(s, c))
        })
        .map(|s| view(snapshot, s))
        .collect();

    Ok(SearchResponse {
        status: if results.is_empty() {
            QueryStatus::NotFound
        } else {
            QueryStatus::Found
        },
        pattern: pattern.to_string(),
        count: results.len(),
        results,
    })
}

pub fn search_classes(
    snapshot: &ProjectSnapshot,
    pattern: &str,
    options: &SearchOptions,
) -> Result<SearchResponse> {
    search_symbols(snapshot, pattern, Some(CLASS_KINDS), options)
}

pub fn search_functions(
    snapshot: &ProjectSnapshot,
    pattern: &str,
    options: &SearchOptions,
) -> Result<SearchResponse> {
    search_symbols(snapshot, pattern, Some(FUNCTION_KINDS), options)
}

// ─── Classes ────────────────────────────────────────────────────

pub fn get_class_info(snapshot: &ProjectSnapshot, name: &str) -> ClassInfoResponse {
    let classes: Vec<ClassInfo> = snapshot
        .index
        .classes_named(name)
        .into_iter()
        .map(|class| {
            let members = snapshot.index.members_of(&class.qualified_name);
            let methods = members
                .iter()
                .filter(|m| m.kind == SymbolKind::Method)
                .map(|m| view(snapshot, m))
                .collect();
            let fields = members
                .iter()
                .filter(|m| m.kind == SymbolKind::Field)
                .map(|m| view(snapshot, m))
                .collect();
            ClassInfo {
                class: view(snapshot, class),
                bases: class.bases.clone(),
                methods,
                fields,
            }
        })
        .collect();

    ClassInfoResponse {
        status: QueryStatus::for_count(classes.len()),
        name: name.to_string(),
        classes,
    }
}

pub fn get_class_hierarchy(snapshot: &ProjectSnapshot, name: &str) -> HierarchyResponse {
    let classes: Vec<HierarchyEntry> = snapshot
        .index
        .classes_named(name)
        .into_iter()
        .map(|class| {
            let hierarchy = snapshot.index.hierarchy(class);
            HierarchyEntry {
                class: view(snapshot, class),
                ancestors: hierarchy
                    .ancestors
                    .iter()
                    .map(|r| related_view(snapshot, r))
                    .collect(),
                cycles: hierarchy.cycles,
            }
        })
        .collect();

    HierarchyResponse {
        status: QueryStatus::for_count(classes.len()),
        name: name.to_string(),
        classes,
    }
}

/// Subclasses of every class named `name`, or of an external base by that name.
///
/// With `project_only`, subclasses declared in dependency directories are left out.
pub fn get_derived_classes(
    snapshot: &ProjectSnapshot,
    name: &str,
    project_only: bool,
) -> DerivedResponse {
    let keep = |r: &&Related<'_>| {
        !project_only || r.symbol.map_or(true, |s| snapshot.index.is_project(s))
    };
    let views = |related: Vec<Related<'_>>| -> Vec<RelatedClass> {
        related
            .iter()
            .filter(|r| keep(r))
            .map(|r| related_view(snapshot, r))
            .collect()
    };

    let mut classes: Vec<DerivedEntry> = snapshot
        .index
        .classes_named(name)
        .into_iter()
        .map(|class| DerivedEntry {
            class_name: class.qualified_name.clone(),
            class: Some(view(snapshot, class)),
            derived: views(snapshot.index.derived_of(class)),
        })
        .collect();

    if classes.is_empty() {
        let derived = views(snapshot.index.derived_of_external(name));
        if !derived.is_empty() {
            classes.push(DerivedEntry {
                class_name: names::normalize(name),
                class: None,
                derived,
            });
        }
    }

    DerivedResponse {
        status: QueryStatus::for_count(classes.len()),
        name: name.to_string(),
        classes,
    }
}

// ─── Functions ──────────────────────────────────────────────────

pub fn get_function_signature(
    snapshot: &ProjectSnapshot,
    name: &str,
    class_name: Option<&str>,
) -> SignatureResponse {
    let overloads: Vec<SymbolView> = functions_named(snapshot, name, class_name)
        .into_iter()
        .map(|s| view(snapshot, s))
        .collect();
    SignatureResponse {
        status: QueryStatus::for_count(overloads.len()),
        name: name.to_string(),
        overloads,
    }
}

/// Symbols declared in `file`, by line, optionally filtered by name.
pub fn find_in_file(
    snapshot: &ProjectSnapshot,
    file: &str,
    pattern: Option<&str>,
    case_sensitive: bool,
) -> Result<FileSymbolsResponse> {
    let regex = pattern
        .map(|p| compile_pattern(p, case_sensitive))
        .transpose()?;
    let relative = snapshot.relative_path(Path::new(file));

    if snapshot.file(&relative).is_none() {
        return Ok(FileSymbolsResponse {
            status: QueryStatus::NotFound,
            file: relative,
            symbols: Vec::new(),
        });
    }

    let symbols = snapshot
        .index
        .in_file(&relative)
        .into_iter()
        .filter(|s| regex.as_ref().map_or(true, |r| r.is_match(&s.name)))
        .map(|s| view(snapshot, s))
        .collect();

    Ok(FileSymbolsResponse {
        status: QueryStatus::Found,
        file: relative,
        symbols,
    })
}

fn call_views(snapshot: &ProjectSnapshot, relations: Vec<CallRelation>) -> Vec<CallView> {
    relations
        .into_iter()
        .filter_map(|rel| {
            let symbol = snapshot.index.get(&rel.id)?;
            Some(CallView {
                symbol: view(snapshot, symbol),
                sites: rel.sites,
            })
        })
        .collect()
}

/// Direct callers of every function named `name`.
pub fn find_callers(snapshot: &ProjectSnapshot, name: &str, class_name: Option<&str>) -> CallResponse {
    let functions: Vec<CallEntry> = functions_named(snapshot, name, class_name)
        .into_iter()
        .map(|f| CallEntry {
            function: view(snapshot, f),
            calls: call_views(snapshot, snapshot.calls.callers(&f.id)),
            unresolved: Vec::new(),
        })
        .collect();
    CallResponse {
        status: QueryStatus::for_count(functions.len()),
        name: name.to_string(),
        functions,
    }
}

/// Direct callees of every function named `name`, plus calls that did not resolve.
pub fn find_callees(snapshot: &ProjectSnapshot, name: &str, class_name: Option<&str>) -> CallResponse {
    let functions: Vec<CallEntry> = functions_named(snapshot, name, class_name)
        .into_iter()
        .map(|f| CallEntry {
            function: view(snapshot, f),
            calls: call_views(snapshot, snapshot.calls.callees(&f.id)),
            unresolved: snapshot.calls.unresolved_from(&f.id).to_vec(),
        })
        .collect();
    CallResponse {
        status: QueryStatus::for_count(functions.len()),
        name: name.to_string(),
        functions,
    }
}

/// Shortest call path between any function named `from` and any named `to`.
pub fn get_call_path(
    snapshot: &ProjectSnapshot,
    from: &str,
    to: &str,
    max_depth: usize,
) -> CallPathResponse {
    let ids = |name: &str| -> Vec<SymbolId> {
        functions_named(snapshot, name, None)
            .into_iter()
            .map(|s| s.id.clone())
            .collect()
    };
    let sources = ids(from);
    let targets = ids(to);

    let path: Vec<SymbolView> = if sources.is_empty() || targets.is_empty() {
        Vec::new()
    } else {
        snapshot
            .calls
            .path_between(&sources, &targets, max_depth)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| snapshot.index.get(id))
            .map(|s| view(snapshot, s))
            .collect()
    };

    CallPathResponse {
        status: if path.is_empty() {
            QueryStatus::NotFound
        } else {
            QueryStatus::Found
        },
        from: from.to_string(),
        to: to.to_string(),
        max_depth,
        path,
    }
}

// ─── Stats ──────────────────────────────────────────────────────

pub fn get_stats(snapshot: &ProjectSnapshot) -> StatsResponse {
    let ranked = |list: Vec<(SymbolId, usize)>| -> Vec<RankedSymbol> {
        list.into_iter()
            .filter_map(|(id, call_sites)| {
                snapshot.index.get(&id).map(|s| RankedSymbol {
                    qualified_name: s.qualified_name.clone(),
                    call_sites,
                })
            })
            .collect()
    };

    StatsResponse {
        root: snapshot.root.clone(),
        generation: snapshot.generation,
        built_at: snapshot.built_at.to_rfc3339(),
        files: snapshot.files.len(),
        stats: snapshot.stats.clone(),
        call_graph: snapshot.calls.stats().clone(),
        most_called: ranked(snapshot.calls.most_called(10)),
        most_calling: ranked(snapshot.calls.most_calling(10)),
        diagnostics: snapshot.diagnostics.clone(),
    }
}
