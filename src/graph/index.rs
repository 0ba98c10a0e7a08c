//! Symbol index: every symbol of a snapshot, with name, file, member and
//! inheritance lookups.
//!
//! Symbols are held in lexical order (qualified name, signature, file, line),
//! so every listing produced here is deterministic.

use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::types::{FileOrigin, FileRecord, Symbol, SymbolId, SymbolKind};
use crate::names;

/// A class in an inheritance relation: a class of the project, or a base
/// that never resolved to one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ClassKey {
    Known(usize),
    External(String),
}

/// One class reached through the inheritance graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Related<'a> {
    /// Qualified name, or the normalized spelling of an unresolved base.
    pub name: String,
    pub symbol: Option<&'a Symbol>,
    /// 1 for direct bases or direct subclasses.
    pub depth: usize,
}

/// Ancestors of a class, root first, plus any base cycles met on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy<'a> {
    pub ancestors: Vec<Related<'a>>,
    /// Each cycle as a list of qualified names, closed (first == last).
    pub cycles: Vec<Vec<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

enum Frame {
    Enter(ClassKey, usize),
    Exit(ClassKey, usize),
}

pub struct SymbolIndex {
    symbols: Vec<Symbol>,
    project: Vec<bool>,
    by_id: HashMap<SymbolId, usize>,
    by_name: HashMap<String, Vec<usize>>,
    by_qualified: HashMap<String, Vec<usize>>,
    by_file: HashMap<PathBuf, Vec<usize>>,
    members: HashMap<String, Vec<usize>>,
    /// Qualified class name → the class symbol standing for it.
    classes: HashMap<String, usize>,
    bases: HashMap<usize, Vec<ClassKey>>,
    derived: HashMap<ClassKey, Vec<usize>>,
    /// Class → qualified names of its ancestors, nearest first. Method calls
    /// search these scopes after the class itself.
    ancestor_scopes: HashMap<usize, Vec<String>>,
}

impl std::fmt::Debug for SymbolIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolIndex")
            .field("symbols", &self.symbols.len())
            .field("classes", &self.classes.len())
            .finish()
    }
}

impl Default for SymbolIndex {
    fn default() -> Self {
        Self::build(std::iter::empty())
    }
}

impl SymbolIndex {
    /// Build the index from parsed file records.
    pub fn build<'r>(records: impl IntoIterator<Item = &'r FileRecord>) -> Self {
        let mut entries: Vec<(Symbol, bool)> = records
            .into_iter()
            .flat_map(|r| {
                let project = r.origin == FileOrigin::Project;
                r.symbols.iter().cloned().map(move |s| (s, project))
            })
            .collect();
        entries.sort_by_cached_key(|(s, _)| {
            (
                s.qualified_name.clone(),
                s.signature
                    .as_ref()
                    .map(|sig| sig.parameter_list())
                    .unwrap_or_default(),
                s.file.clone(),
                s.line_start,
                s.column,
                s.kind,
            )
        });
        let (symbols, project): (Vec<Symbol>, Vec<bool>) = entries.into_iter().unzip();

        let mut index = Self {
            symbols,
            project,
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            by_qualified: HashMap::new(),
            by_file: HashMap::new(),
            members: HashMap::new(),
            classes: HashMap::new(),
            bases: HashMap::new(),
            derived: HashMap::new(),
            ancestor_scopes: HashMap::new(),
        };

        for (i, sym) in index.symbols.iter().enumerate() {
            index.by_id.entry(sym.id.clone()).or_insert(i);
            index.by_name.entry(sym.name.clone()).or_default().push(i);
            index
                .by_qualified
                .entry(sym.qualified_name.clone())
                .or_default()
                .push(i);
            index.by_file.entry(sym.file.clone()).or_default().push(i);
            if let Some(parent) = &sym.parent {
                index.members.entry(parent.clone()).or_default().push(i);
            }
            if sym.kind.is_class_like() {
                index.classes.entry(sym.qualified_name.clone()).or_insert(i);
            }
        }

        let symbols = &index.symbols;
        let by_line = |a: &usize, b: &usize| {
            (symbols[*a].line_start, symbols[*a].column).cmp(&(symbols[*b].line_start, symbols[*b].column))
        };
        for list in index.by_file.values_mut() {
            list.sort_by(by_line);
        }
        for list in index.members.values_mut() {
            list.sort_by(|a, b| {
                symbols[*a]
                    .file
                    .cmp(&symbols[*b].file)
                    .then_with(|| by_line(a, b))
            });
        }

        let mut class_ids: Vec<usize> = index.classes.values().copied().collect();
        class_ids.sort_unstable();
        for class in class_ids {
            let keys: Vec<ClassKey> = index.symbols[class]
                .bases
                .iter()
                .map(|b| index.resolve_base(&b.name, class))
                .collect();
            for key in &keys {
                let list = index.derived.entry(key.clone()).or_default();
                if !list.contains(&class) {
                    list.push(class);
                }
            }
            index.bases.insert(class, keys);
        }

        let with_bases: Vec<usize> = index
            .bases
            .iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(&class, _)| class)
            .collect();
        for class in with_bases {
            let scopes: Vec<String> = index
                .hierarchy(&index.symbols[class])
                .ancestors
                .into_iter()
                .rev()
                .map(|r| r.name)
                .collect();
            index.ancestor_scopes.insert(class, scopes);
        }

        index
    }

    /// Resolve a base name against the classes of the index.
    fn resolve_base(&self, written: &str, derived: usize) -> ClassKey {
        let name = names::normalize(written);
        let own = &self.symbols[derived];

        for scope in names::scope_chain(&names::scope_of(&own.qualified_name)) {
            let candidate = names::join(&scope, &name);
            if candidate == own.qualified_name {
                continue;
            }
            if let Some(&idx) = self.classes.get(&candidate) {
                return ClassKey::Known(idx);
            }
        }

        let simple = names::simple_name(&name);
        let candidates: Vec<usize> = self
            .by_name
            .get(simple)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&i| {
                let s = &self.symbols[i];
                s.kind.is_class_like()
                    && self.classes.get(&s.qualified_name) == Some(&i)
                    && s.qualified_name != own.qualified_name
            })
            .collect();

        let suffixed: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&i| names::has_suffix(&self.symbols[i].qualified_name, &name))
            .collect();
        let pool = if suffixed.is_empty() && !name.contains("::") {
            &candidates
        } else {
            &suffixed
        };

        match pool.as_slice() {
            [] => ClassKey::External(name),
            [only] => ClassKey::Known(*only),
            many => {
                let same_file = many.iter().find(|&&i| self.symbols[i].file == own.file);
                ClassKey::Known(*same_file.unwrap_or(&many[0]))
            }
        }
    }

    // ─── Accessors ──────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// All symbols in lexical order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn get(&self, id: &str) -> Option<&Symbol> {
        self.by_id.get(id).map(|&i| &self.symbols[i])
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub(crate) fn at(&self, idx: usize) -> &Symbol {
        &self.symbols[idx]
    }

    /// Whether the symbol comes from a project file rather than a dependency.
    pub fn is_project(&self, symbol: &Symbol) -> bool {
        self.position(&symbol.id)
            .map(|i| self.project[i])
            .unwrap_or(false)
    }

    pub fn count_kind(&self, pred: impl Fn(SymbolKind) -> bool) -> usize {
        self.symbols.iter().filter(|s| pred(s.kind)).count()
    }

    // ─── Lookups ────────────────────────────────────────────────

    /// Symbols whose name matches `pattern`, in lexical order.
    pub fn by_name(&self, pattern: &Regex, kinds: Option<&[SymbolKind]>) -> Vec<&Symbol> {
        self.symbols
            .iter()
            .filter(|s| kinds.map_or(true, |k| k.contains(&s.kind)))
            .filter(|s| pattern.is_match(&s.name))
            .collect()
    }

    /// Exact qualified-name lookup. Definitions win over declarations.
    pub fn by_qualified_name(&self, name: &str) -> Option<&Symbol> {
        let list = self.by_qualified.get(&names::normalize(name))?;
        list.iter()
            .find(|&&i| self.symbols[i].is_definition)
            .or_else(|| list.first())
            .map(|&i| &self.symbols[i])
    }

    /// Symbols declared in `path`, by line.
    pub fn in_file(&self, path: &Path) -> Vec<&Symbol> {
        self.by_file
            .get(path)
            .map(|list| list.iter().map(|&i| &self.symbols[i]).collect())
            .unwrap_or_default()
    }

    /// Files that contributed at least one symbol.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.by_file.keys().map(PathBuf::as_path)
    }

    /// Methods and fields whose parent is `class`, by file and line.
    pub fn members_of(&self, class: &str) -> Vec<&Symbol> {
        self.members
            .get(class)
            .map(|list| list.iter().map(|&i| &self.symbols[i]).collect())
            .unwrap_or_default()
    }

    fn named(&self, name: &str, accept: impl Fn(&Symbol) -> bool) -> Vec<usize> {
        let name = names::normalize(name);
        if name.is_empty() {
            return Vec::new();
        }
        if let Some(exact) = self.by_qualified.get(&name) {
            let hits: Vec<usize> = exact
                .iter()
                .copied()
                .filter(|&i| accept(&self.symbols[i]))
                .collect();
            if !hits.is_empty() {
                return hits;
            }
        }
        let qualified = name.contains("::");
        self.by_name
            .get(names::simple_name(&name))
            .into_iter()
            .flatten()
            .copied()
            .filter(|&i| accept(&self.symbols[i]))
            .filter(|&i| !qualified || names::has_suffix(&self.symbols[i].qualified_name, &name))
            .collect()
    }

    /// Classes and structs matching a simple or qualified name, one per qualified name.
    pub fn classes_named(&self, name: &str) -> Vec<&Symbol> {
        self.named(name, |s| {
            s.kind.is_class_like()
                && self
                    .classes
                    .get(&s.qualified_name)
                    .is_some_and(|&i| self.symbols[i].id == s.id)
        })
        .into_iter()
        .map(|i| &self.symbols[i])
        .collect()
    }

    /// Functions and methods matching a simple or qualified name, every overload.
    pub fn callables_named(&self, name: &str) -> Vec<&Symbol> {
        self.named(name, |s| s.kind.is_callable())
            .into_iter()
            .map(|i| &self.symbols[i])
            .collect()
    }

    // ─── Inheritance ────────────────────────────────────────────

    fn class_key_of(&self, class: &Symbol) -> Option<ClassKey> {
        self.classes
            .get(&class.qualified_name)
            .map(|&i| ClassKey::Known(i))
    }

    fn related(&self, key: &ClassKey, depth: usize) -> Related<'_> {
        match key {
            ClassKey::Known(i) => Related {
                name: self.symbols[*i].qualified_name.clone(),
                symbol: Some(&self.symbols[*i]),
                depth,
            },
            ClassKey::External(name) => Related {
                name: name.clone(),
                symbol: None,
                depth,
            },
        }
    }

    fn key_name(&self, key: &ClassKey) -> String {
        match key {
            ClassKey::Known(i) => self.symbols[*i].qualified_name.clone(),
            ClassKey::External(name) => name.clone(),
        }
    }

    fn bases_of(&self, key: &ClassKey) -> &[ClassKey] {
        match key {
            ClassKey::Known(i) => self.bases.get(i).map(Vec::as_slice).unwrap_or(&[]),
            ClassKey::External(_) => &[],
        }
    }

    /// Transitive ancestors of `class`, root first.
    ///
    /// With multiple inheritance each base's own ancestors precede it, and a
    /// class reachable through several paths appears once.
    pub fn hierarchy(&self, class: &Symbol) -> Hierarchy<'_> {
        let Some(start) = self.class_key_of(class) else {
            return Hierarchy::default();
        };
        let mut result = Hierarchy::default();
        let mut state: HashMap<ClassKey, Visit> = HashMap::new();
        let mut path: Vec<ClassKey> = vec![start.clone()];
        state.insert(start.clone(), Visit::InProgress);

        let mut stack: Vec<Frame> = self
            .bases_of(&start)
            .iter()
            .rev()
            .map(|b| Frame::Enter(b.clone(), 1))
            .collect();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(key, depth) => match state.get(&key) {
                    Some(Visit::Done) => {}
                    Some(Visit::InProgress) => {
                        let from = path.iter().position(|k| *k == key).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            path[from..].iter().map(|k| self.key_name(k)).collect();
                        cycle.push(self.key_name(&key));
                        result.cycles.push(cycle);
                    }
                    None => {
                        state.insert(key.clone(), Visit::InProgress);
                        path.push(key.clone());
                        stack.push(Frame::Exit(key.clone(), depth));
                        for base in self.bases_of(&key).iter().rev() {
                            stack.push(Frame::Enter(base.clone(), depth + 1));
                        }
                    }
                },
                Frame::Exit(key, depth) => {
                    state.insert(key.clone(), Visit::Done);
                    path.pop();
                    result.ancestors.push(self.related(&key, depth));
                }
            }
        }

        result
    }

    /// Direct and transitive subclasses of `class`, nearest first.
    pub fn derived_of(&self, class: &Symbol) -> Vec<Related<'_>> {
        match self.class_key_of(class) {
            Some(key) => self.derived_from(key),
            None => Vec::new(),
        }
    }

    /// Subclasses of a base that is not a class of the index, such as `std::exception`.
    pub fn derived_of_external(&self, name: &str) -> Vec<Related<'_>> {
        self.derived_from(ClassKey::External(names::normalize(name)))
    }

    fn derived_from(&self, start: ClassKey) -> Vec<Related<'_>> {
        let mut out = Vec::new();
        let mut seen: HashSet<ClassKey> = HashSet::new();
        let mut queue: VecDeque<(ClassKey, usize)> = VecDeque::new();
        seen.insert(start.clone());
        queue.push_back((start, 0));

        while let Some((key, depth)) = queue.pop_front() {
            for &child in self.derived.get(&key).map(Vec::as_slice).unwrap_or(&[]) {
                let child_key = ClassKey::Known(child);
                if seen.insert(child_key.clone()) {
                    out.push(self.related(&child_key, depth + 1));
                    queue.push_back((child_key, depth + 1));
                }
            }
        }
        out
    }

    /// Every base cycle in the index, each reported once.
    pub fn base_cycles(&self) -> Vec<(&Symbol, Vec<String>)> {
        let mut state: HashMap<usize, Visit> = HashMap::new();
        let mut reported: HashSet<Vec<String>> = HashSet::new();
        let mut out = Vec::new();

        let mut roots: Vec<usize> = self.bases.keys().copied().collect();
        roots.sort_unstable();

        for root in roots {
            if state.contains_key(&root) {
                continue;
            }
            let mut path: Vec<usize> = Vec::new();
            let mut stack = vec![(root, false)];
            while let Some((node, leaving)) = stack.pop() {
                if leaving {
                    state.insert(node, Visit::Done);
                    path.pop();
                    continue;
                }
                match state.get(&node) {
                    Some(Visit::Done) => continue,
                    Some(Visit::InProgress) => {
                        let from = path.iter().position(|&p| p == node).unwrap_or(0);
                        let mut cycle: Vec<String> = path[from..]
                            .iter()
                            .map(|&i| self.symbols[i].qualified_name.clone())
                            .collect();
                        let mut key = cycle.clone();
                        key.sort();
                        cycle.push(self.symbols[node].qualified_name.clone());
                        if reported.insert(key) {
                            warn!(class = %self.symbols[node].qualified_name, cycle = %cycle.join(" -> "), "cyclic base classes");
                            out.push((&self.symbols[node], cycle));
                        }
                        continue;
                    }
                    None => {}
                }
                state.insert(node, Visit::InProgress);
                path.push(node);
                stack.push((node, true));
                for base in self.bases.get(&node).into_iter().flatten().rev() {
                    if let ClassKey::Known(b) = base {
                        stack.push((*b, false));
                    }
                }
            }
        }
        out
    }

    // ─── Call Resolution ────────────────────────────────────────

    /// Pick the callable a call to `name` from `caller` most likely reaches.
    ///
    /// Candidates come from the first source that yields any: the caller's
    /// scopes (its class, that class's ancestors, then enclosing namespaces),
    /// the exact qualified name, a `::` suffix, then the simple name. Among
    /// candidates, a matching parameter count wins, then definitions, then
    /// the caller's file, then lexical order.
    pub fn resolve_callable(
        &self,
        name: &str,
        caller: &Symbol,
        arg_count: Option<usize>,
    ) -> Option<&Symbol> {
        let global = name.trim_start().starts_with("::");
        let name = names::normalize(name);
        if name.is_empty() {
            return None;
        }
        let candidates = self.call_candidates(&name, caller, global);
        let best = candidates.into_iter().min_by_key(|&i| {
            let s = &self.symbols[i];
            let arity_mismatch = match (arg_count, &s.signature) {
                (Some(n), Some(sig)) => !sig.accepts(n),
                _ => false,
            };
            (arity_mismatch, !s.is_definition, s.file != caller.file, i)
        })?;
        Some(&self.symbols[self.canonical(best)])
    }

    fn callables_at(&self, qualified: &str) -> Vec<usize> {
        self.by_qualified
            .get(qualified)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&i| self.symbols[i].kind.is_callable())
            .collect()
    }

    fn call_candidates(&self, name: &str, caller: &Symbol, global: bool) -> Vec<usize> {
        // `::f` names the global scope explicitly.
        let mut scopes = if global {
            Vec::new()
        } else {
            names::scope_chain(&names::scope_of(&caller.qualified_name))
        };
        let class = caller.parent.as_deref().and_then(|p| self.classes.get(p));
        let ancestors = class.and_then(|c| self.ancestor_scopes.get(c));
        if let (Some(ancestors), false) = (ancestors, global) {
            let at = scopes
                .iter()
                .position(|s| Some(s.as_str()) == caller.parent.as_deref())
                .map_or(0, |p| p + 1);
            for (offset, ancestor) in ancestors.iter().enumerate() {
                scopes.insert(at + offset, ancestor.clone());
            }
        }

        for scope in &scopes {
            let hits = self.callables_at(&names::join(scope, name));
            if !hits.is_empty() {
                return hits;
            }
        }

        let exact = self.callables_at(name);
        if !exact.is_empty() {
            return exact;
        }

        let simple = self
            .by_name
            .get(names::simple_name(name))
            .into_iter()
            .flatten()
            .copied()
            .filter(|&i| self.symbols[i].kind.is_callable());
        if name.contains("::") {
            return simple
                .filter(|&i| names::has_suffix(&self.symbols[i].qualified_name, name))
                .collect();
        }
        simple.collect()
    }

    /// Map a declaration to the definition of the same overload, when there is one.
    pub(crate) fn canonical(&self, idx: usize) -> usize {
        let sym = &self.symbols[idx];
        if sym.is_definition || !sym.kind.is_callable() {
            return idx;
        }
        let key = sym.overload_key();
        let definitions: Vec<usize> = self
            .callables_at(&sym.qualified_name)
            .into_iter()
            .filter(|&i| self.symbols[i].is_definition && self.symbols[i].overload_key() == key)
            .collect();
        definitions
            .iter()
            .find(|&&i| self.symbols[i].file == sym.file)
            .or_else(|| definitions.first())
            .copied()
            .unwrap_or(idx)
    }
}
