//! Symbol extraction over any [`Cursor`] tree.
//!
//! Traversal is depth-first with an explicit work-list, so deeply nested
//! sources cannot exhaust the stack. Calls are collected while walking and
//! resolved against the file's own symbols once the walk is complete.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{Cursor, CursorKind};
use crate::graph::types::{
    symbol_id, Access, BaseSpecifier, CallEdge, CallSite, Extraction, Parameter, Signature, Symbol,
    SymbolKind,
};
use crate::names;

/// Lexical context carried along with each queued cursor.
#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    in_class: bool,
    /// Index of the enclosing function definition in the symbol list.
    function: Option<usize>,
}

struct PendingCall {
    caller: usize,
    callee: String,
    target: Option<Target>,
    /// File as reported by the frontend, for comparison with `target.file`.
    unit_file: PathBuf,
    site: CallSite,
    arg_count: Option<usize>,
}

struct Target {
    qualified: String,
    file: PathBuf,
    line: usize,
}

/// Extract symbols and call edges from one translation unit.
///
/// `file` is the root-relative path stamped on every record.
pub fn extract<C: Cursor>(file: &Path, root: &C) -> Extraction {
    let mut symbols: Vec<Symbol> = Vec::new();
    let mut pending: Vec<PendingCall> = Vec::new();
    let mut stack: Vec<(C, Scope)> = Vec::new();

    enqueue(&mut stack, root.children(), Scope::default());

    while let Some((cursor, scope)) = stack.pop() {
        match cursor.kind() {
            CursorKind::TranslationUnit | CursorKind::Other => {
                enqueue(&mut stack, cursor.children(), scope);
            }

            CursorKind::Namespace => {
                let name = cursor.spelling();
                if !name.is_empty() && scope.function.is_none() {
                    symbols.push(make_symbol(file, &cursor, SymbolKind::Namespace, &[]));
                }
                enqueue(&mut stack, cursor.children(), scope);
            }

            CursorKind::ClassDecl | CursorKind::StructDecl => {
                // Forward declarations and classes local to a body are not symbols.
                if !cursor.is_definition() || scope.function.is_some() {
                    continue;
                }
                let children = cursor.children();
                if cursor.spelling().is_empty() {
                    enqueue(&mut stack, children, scope);
                    continue;
                }
                let kind = if cursor.kind() == CursorKind::ClassDecl {
                    SymbolKind::Class
                } else {
                    SymbolKind::Struct
                };
                symbols.push(make_symbol(file, &cursor, kind, &children));
                enqueue(
                    &mut stack,
                    children,
                    Scope {
                        in_class: true,
                        function: None,
                    },
                );
            }

            CursorKind::EnumDecl => {
                if cursor.is_definition() && !cursor.spelling().is_empty() && scope.function.is_none() {
                    symbols.push(make_symbol(file, &cursor, SymbolKind::Enum, &[]));
                }
            }

            CursorKind::FieldDecl => {
                if scope.in_class && scope.function.is_none() {
                    symbols.push(make_symbol(file, &cursor, SymbolKind::Field, &[]));
                }
            }

            CursorKind::FunctionDecl
            | CursorKind::Method
            | CursorKind::Constructor
            | CursorKind::Destructor => {
                // Local declarations inside a body are not symbols.
                if scope.function.is_some() {
                    continue;
                }
                let kind = if cursor.kind() == CursorKind::FunctionDecl {
                    SymbolKind::Function
                } else {
                    SymbolKind::Method
                };
                let children = cursor.children();
                symbols.push(make_symbol(file, &cursor, kind, &children));
                if cursor.is_definition() {
                    let idx = symbols.len() - 1;
                    enqueue(
                        &mut stack,
                        children,
                        Scope {
                            in_class: false,
                            function: Some(idx),
                        },
                    );
                }
            }

            CursorKind::CallExpr => {
                let callee = cursor.qualified_spelling();
                let referenced = cursor.referenced();
                // Calls through expressions (`(*fp)(x)`) have no name to resolve.
                let named = !callee.is_empty() || referenced.is_some();
                if let (Some(caller), true) = (scope.function, named) {
                    let location = cursor.location();
                    let target = referenced.map(|decl| {
                        let loc = decl.location();
                        Target {
                            qualified: decl.qualified_spelling(),
                            file: loc.file,
                            line: loc.line,
                        }
                    });
                    pending.push(PendingCall {
                        caller,
                        callee,
                        target,
                        unit_file: location.file,
                        site: CallSite {
                            file: file.to_path_buf(),
                            line: location.line,
                            column: location.column,
                        },
                        arg_count: cursor.argument_count(),
                    });
                }
                enqueue(&mut stack, cursor.children(), scope);
            }

            CursorKind::ParmDecl | CursorKind::BaseSpecifier => {}
        }
    }

    let edges = resolve_local_calls(&symbols, pending);

    Extraction {
        symbols,
        edges,
        syntax_errors: root.has_syntax_errors(),
    }
}

/// Push children so that they pop in source order.
fn enqueue<C: Cursor>(stack: &mut Vec<(C, Scope)>, children: Vec<C>, scope: Scope) {
    stack.extend(children.into_iter().rev().map(|child| (child, scope)));
}

fn make_symbol<C: Cursor>(file: &Path, cursor: &C, kind: SymbolKind, children: &[C]) -> Symbol {
    let name = cursor.spelling();
    let mut qualified_name = names::normalize(&cursor.qualified_spelling());
    if qualified_name.is_empty() {
        qualified_name = name.clone();
    }
    let location = cursor.location();

    let signature = kind.is_callable().then(|| signature_of(cursor, children));
    let parameter_types: Vec<&str> = signature
        .as_ref()
        .map(|s| s.parameter_types())
        .unwrap_or_default();
    let id = symbol_id(
        file,
        kind,
        &qualified_name,
        &parameter_types,
        location.line,
        location.column,
    );

    let bases = if kind.is_class_like() {
        children
            .iter()
            .filter(|c| c.kind() == CursorKind::BaseSpecifier)
            .map(|c| BaseSpecifier {
                name: c.spelling(),
                access: c.access().unwrap_or(match kind {
                    SymbolKind::Struct => Access::Public,
                    _ => Access::Private,
                }),
                is_virtual: c.is_virtual(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let parent = matches!(kind, SymbolKind::Method | SymbolKind::Field)
        .then(|| names::scope_of(&qualified_name))
        .filter(|scope| !scope.is_empty());

    Symbol {
        id,
        kind,
        name,
        qualified_name,
        signature,
        file: file.to_path_buf(),
        line_start: location.line,
        line_end: cursor.end_line().max(location.line),
        column: location.column,
        bases,
        access: cursor.access(),
        parent,
        type_name: (kind == SymbolKind::Field)
            .then(|| cursor.type_spelling())
            .flatten(),
        is_definition: cursor.is_definition(),
    }
}

fn signature_of<C: Cursor>(cursor: &C, children: &[C]) -> Signature {
    let parameters = children
        .iter()
        .filter(|c| c.kind() == CursorKind::ParmDecl)
        .map(|p| Parameter {
            type_spelling: p.type_spelling().unwrap_or_default(),
            name: p.spelling(),
            has_default: p.has_default(),
        })
        .collect();

    Signature {
        return_type: cursor.result_type_spelling().unwrap_or_default(),
        parameters,
        is_virtual: cursor.is_virtual() || cursor.is_pure(),
        is_override: cursor.is_override(),
        is_pure: cursor.is_pure(),
        is_const: cursor.is_const(),
        is_static: cursor.is_static(),
    }
}

/// Turn pending calls into edges, filling `callee_id` for same-file targets.
fn resolve_local_calls(symbols: &[Symbol], pending: Vec<PendingCall>) -> Vec<CallEdge> {
    let mut callables: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, sym) in symbols.iter().enumerate() {
        if sym.kind.is_callable() {
            callables.entry(sym.qualified_name.as_str()).or_default().push(i);
        }
    }

    pending
        .into_iter()
        .map(|call| {
            let (callee_id, callee_name) = match call.target {
                Some(target) => {
                    let qualified = names::normalize(&target.qualified);
                    let local = if target.file == call.unit_file {
                        callables.get(qualified.as_str()).and_then(|candidates| {
                            candidates
                                .iter()
                                .find(|&&i| symbols[i].line_start == target.line)
                                .or_else(|| {
                                    candidates.iter().find(|&&i| symbols[i].is_definition)
                                })
                                .or_else(|| candidates.first())
                                .map(|&i| symbols[i].id.clone())
                        })
                    } else {
                        None
                    };
                    (local, qualified)
                }
                None => (None, names::normalize(&call.callee)),
            };
            CallEdge {
                caller_id: symbols[call.caller].id.clone(),
                callee_id,
                callee_name,
                call_site: call.site,
                arg_count: call.arg_count,
            }
        })
        .collect()
}
