//! Call graph: forward and reverse call adjacency over resolved symbols.
//!
//! Built in two passes over the call edges of every parsed file: edges the
//! extractor already resolved go in first, then the remaining callee names
//! are resolved against the finished [`SymbolIndex`]. Resolution results
//! live only here; the per-file edges are never modified.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use super::index::SymbolIndex;
use super::types::{CallEdge, CallSite, FileRecord, SymbolId};

/// One caller or callee with every site where the call happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRelation {
    pub id: SymbolId,
    pub sites: Vec<CallSite>,
}

/// A call whose target is not a symbol of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedCall {
    pub callee_name: String,
    pub call_site: CallSite,
    pub arg_count: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphStats {
    /// Distinct caller → callee pairs.
    pub edges: usize,
    pub call_sites: usize,
    pub resolved_locally: usize,
    pub resolved_by_name: usize,
    pub unresolved: usize,
}

#[derive(Debug, Default)]
pub struct CallGraph {
    graph: DiGraph<SymbolId, Vec<CallSite>>,
    nodes: HashMap<SymbolId, NodeIndex>,
    /// Declaration id → id of the definition it stands for.
    aliases: HashMap<SymbolId, SymbolId>,
    unresolved: HashMap<SymbolId, Vec<UnresolvedCall>>,
    stats: CallGraphStats,
}

impl CallGraph {
    pub fn build<'r>(index: &SymbolIndex, records: impl IntoIterator<Item = &'r FileRecord> + Clone) -> Self {
        let mut cg = CallGraph::default();

        for (pos, sym) in index.symbols().iter().enumerate() {
            if sym.kind.is_callable() && !sym.is_definition {
                let canonical = index.canonical(pos);
                if canonical != pos {
                    cg.aliases.insert(sym.id.clone(), index.at(canonical).id.clone());
                }
            }
        }

        // Pass 1: edges resolved within their own file.
        for edge in records.clone().into_iter().flat_map(|r| r.edges.iter()) {
            let Some(callee_id) = &edge.callee_id else {
                continue;
            };
            let (Some(caller), Some(callee)) = (index.position(&edge.caller_id), index.position(callee_id)) else {
                continue;
            };
            let caller = index.at(index.canonical(caller)).id.clone();
            let callee = index.at(index.canonical(callee)).id.clone();
            cg.add_call(caller, callee, edge.call_site.clone());
            cg.stats.resolved_locally += 1;
        }

        // Pass 2: names left for cross-file resolution.
        for edge in records.into_iter().flat_map(|r| r.edges.iter()) {
            if edge.callee_id.is_some() {
                continue;
            }
            let Some(caller_pos) = index.position(&edge.caller_id) else {
                continue;
            };
            let caller = index.at(caller_pos);
            match index.resolve_callable(&edge.callee_name, caller, edge.arg_count) {
                Some(callee) => {
                    let caller_id = index.at(index.canonical(caller_pos)).id.clone();
                    cg.add_call(caller_id, callee.id.clone(), edge.call_site.clone());
                    cg.stats.resolved_by_name += 1;
                }
                None => cg.add_unresolved(edge),
            }
        }

        cg.stats.edges = cg.graph.edge_count();
        debug!(
            edges = cg.stats.edges,
            sites = cg.stats.call_sites,
            unresolved = cg.stats.unresolved,
            "call graph built"
        );
        cg
    }

    fn node(&mut self, id: SymbolId) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.nodes.insert(id, idx);
        idx
    }

    fn add_call(&mut self, caller: SymbolId, callee: SymbolId, site: CallSite) {
        let from = self.node(caller);
        let to = self.node(callee);
        match self.graph.find_edge(from, to) {
            Some(edge) => self.graph[edge].push(site),
            None => {
                self.graph.add_edge(from, to, vec![site]);
            }
        }
        self.stats.call_sites += 1;
    }

    fn add_unresolved(&mut self, edge: &CallEdge) {
        let caller = self.resolve_id(&edge.caller_id).to_string();
        self.unresolved
            .entry(caller)
            .or_default()
            .push(UnresolvedCall {
                callee_name: edge.callee_name.clone(),
                call_site: edge.call_site.clone(),
                arg_count: edge.arg_count,
            });
        self.stats.unresolved += 1;
    }

    fn resolve_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.aliases.get(id).map(String::as_str).unwrap_or(id)
    }

    fn node_of(&self, id: &str) -> Option<NodeIndex> {
        self.nodes.get(self.resolve_id(id)).copied()
    }

    /// Adjacent edges in the order they were first added.
    fn adjacent(&self, node: NodeIndex, direction: Direction) -> Vec<(EdgeIndex, NodeIndex)> {
        let mut edges: Vec<(EdgeIndex, NodeIndex)> = self
            .graph
            .edges_directed(node, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.id(), other)
            })
            .collect();
        edges.sort_by_key(|(edge, _)| edge.index());
        edges
    }

    fn relations(&self, id: &str, direction: Direction) -> Vec<CallRelation> {
        let Some(node) = self.node_of(id) else {
            return Vec::new();
        };
        self.adjacent(node, direction)
            .into_iter()
            .map(|(edge, other)| CallRelation {
                id: self.graph[other].clone(),
                sites: self.graph[edge].clone(),
            })
            .collect()
    }

    /// Direct callers of `id`.
    pub fn callers(&self, id: &str) -> Vec<CallRelation> {
        self.relations(id, Direction::Incoming)
    }

    /// Direct callees of `id`.
    pub fn callees(&self, id: &str) -> Vec<CallRelation> {
        self.relations(id, Direction::Outgoing)
    }

    /// Calls from `id` that matched no symbol.
    pub fn unresolved_from(&self, id: &str) -> &[UnresolvedCall] {
        self.unresolved
            .get(self.resolve_id(id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Shortest call path from `from` to `to`, at most `max_depth` calls long.
    pub fn path(&self, from: &str, to: &str, max_depth: usize) -> Option<Vec<SymbolId>> {
        self.path_between(&[from.to_string()], &[to.to_string()], max_depth)
    }

    /// Shortest path from any of `sources` to any of `targets`.
    ///
    /// Breadth-first over callees in insertion order, so among equally short
    /// paths the first discovered wins.
    pub fn path_between(
        &self,
        sources: &[SymbolId],
        targets: &[SymbolId],
        max_depth: usize,
    ) -> Option<Vec<SymbolId>> {
        let targets: Vec<&str> = targets.iter().map(|t| self.resolve_id(t)).collect();

        for source in sources {
            let source = self.resolve_id(source);
            if targets.contains(&source) {
                return Some(vec![source.to_string()]);
            }
        }

        let mut parent: HashMap<NodeIndex, Option<NodeIndex>> = HashMap::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        for source in sources {
            if let Some(node) = self.node_of(source) {
                if parent.insert(node, None).is_none() {
                    queue.push_back((node, 0));
                }
            }
        }

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (_, next) in self.adjacent(node, Direction::Outgoing) {
                if parent.contains_key(&next) {
                    continue;
                }
                parent.insert(next, Some(node));
                if targets.contains(&self.graph[next].as_str()) {
                    return Some(self.unwind(&parent, next));
                }
                queue.push_back((next, depth + 1));
            }
        }
        None
    }

    fn unwind(&self, parent: &HashMap<NodeIndex, Option<NodeIndex>>, end: NodeIndex) -> Vec<SymbolId> {
        let mut path = vec![self.graph[end].clone()];
        let mut current = end;
        while let Some(Some(prev)) = parent.get(&current) {
            path.push(self.graph[*prev].clone());
            current = *prev;
        }
        path.reverse();
        path
    }

    pub fn stats(&self) -> &CallGraphStats {
        &self.stats
    }

    /// Symbols with the most incoming call sites, most called first.
    pub fn most_called(&self, limit: usize) -> Vec<(SymbolId, usize)> {
        self.ranked(Direction::Incoming, limit)
    }

    /// Symbols with the most outgoing call sites.
    pub fn most_calling(&self, limit: usize) -> Vec<(SymbolId, usize)> {
        self.ranked(Direction::Outgoing, limit)
    }

    fn ranked(&self, direction: Direction, limit: usize) -> Vec<(SymbolId, usize)> {
        let mut counts: Vec<(usize, NodeIndex)> = self
            .graph
            .node_indices()
            .map(|n| {
                let sites = self
                    .graph
                    .edges_directed(n, direction)
                    .map(|e| e.weight().len())
                    .sum();
                (sites, n)
            })
            .filter(|(sites, _)| *sites > 0)
            .collect();
        counts.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.index().cmp(&b.1.index())));
        counts
            .into_iter()
            .take(limit)
            .map(|(sites, n)| (self.graph[n].clone(), sites))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{symbol_id, Extraction, FileOrigin, Signature, Symbol, SymbolKind};
    use std::path::{Path, PathBuf};

    fn func(file: &str, name: &str, line: usize, params: usize, definition: bool) -> Symbol {
        let signature = Signature {
            parameters: (0..params)
                .map(|_| crate::graph::types::Parameter {
                    type_spelling: "int".to_string(),
                    name: String::new(),
                    has_default: false,
                })
                .collect(),
            ..Signature::default()
        };
        let types = signature.parameter_types();
        Symbol {
            id: symbol_id(Path::new(file), SymbolKind::Function, name, &types, line, 1),
            kind: SymbolKind::Function,
            name: name.to_string(),
            qualified_name: name.to_string(),
            signature: Some(signature.clone()),
            file: PathBuf::from(file),
            line_start: line,
            line_end: line,
            column: 1,
            bases: Vec::new(),
            access: None,
            parent: None,
            type_name: None,
            is_definition: definition,
        }
    }

    fn call(caller: &Symbol, callee: &str, line: usize, args: usize) -> CallEdge {
        CallEdge {
            caller_id: caller.id.clone(),
            callee_id: None,
            callee_name: callee.to_string(),
            call_site: CallSite {
                file: caller.file.clone(),
                line,
                column: 5,
            },
            arg_count: Some(args),
        }
    }

    fn record(file: &str, symbols: Vec<Symbol>, edges: Vec<CallEdge>) -> FileRecord {
        FileRecord::parsed(
            PathBuf::from(file),
            String::new(),
            FileOrigin::Project,
            Extraction {
                symbols,
                edges,
                syntax_errors: false,
            },
        )
    }

    fn build(records: &[FileRecord]) -> (SymbolIndex, CallGraph) {
        let index = SymbolIndex::build(records);
        let graph = CallGraph::build(&index, records);
        (index, graph)
    }

    #[test]
    fn test_path_through_cycle() {
        let f = func("a.cpp", "f", 1, 0, true);
        let g = func("b.cpp", "g", 1, 0, true);
        let h = func("c.cpp", "h", 1, 0, true);
        let records = vec![
            record("a.cpp", vec![f.clone()], vec![call(&f, "g", 2, 0)]),
            record("b.cpp", vec![g.clone()], vec![call(&g, "h", 2, 0)]),
            record("c.cpp", vec![h.clone()], vec![call(&h, "f", 2, 0)]),
        ];
        let (_, cg) = build(&records);

        assert_eq!(
            cg.path(&f.id, &h.id, 10),
            Some(vec![f.id.clone(), g.id.clone(), h.id.clone()])
        );
        assert_eq!(cg.path(&f.id, &f.id, 10), Some(vec![f.id.clone()]));
        assert_eq!(cg.path(&f.id, &h.id, 1), None);
    }

    #[test]
    fn test_no_path() {
        let f = func("a.cpp", "f", 1, 0, true);
        let g = func("a.cpp", "g", 5, 0, true);
        let records = vec![record("a.cpp", vec![f.clone(), g.clone()], vec![call(&g, "f", 6, 0)])];
        let (_, cg) = build(&records);
        assert_eq!(cg.path(&f.id, &g.id, 10), None);
    }

    #[test]
    fn test_callers_and_callees_in_insertion_order() {
        let main = func("main.cpp", "main", 1, 0, true);
        let a = func("lib.cpp", "a", 1, 0, true);
        let b = func("lib.cpp", "b", 5, 0, true);
        let records = vec![
            record("lib.cpp", vec![a.clone(), b.clone()], vec![call(&a, "b", 2, 0)]),
            record(
                "main.cpp",
                vec![main.clone()],
                vec![call(&main, "b", 2, 0), call(&main, "a", 3, 0), call(&main, "b", 4, 0)],
            ),
        ];
        let (_, cg) = build(&records);

        let callees = cg.callees(&main.id);
        let ids: Vec<&str> = callees.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![b.id.as_str(), a.id.as_str()]);
        assert_eq!(callees[0].sites.len(), 2);

        let callers: Vec<String> = cg.callers(&b.id).into_iter().map(|c| c.id).collect();
        assert_eq!(callers, vec![a.id.clone(), main.id.clone()]);
        assert_eq!(cg.stats().edges, 3);
        assert_eq!(cg.stats().call_sites, 4);
    }

    #[test]
    fn test_local_edges_and_declaration_aliases() {
        let decl = func("a.cpp", "helper", 1, 0, false);
        let run = func("a.cpp", "run", 3, 0, true);
        let def = func("a.cpp", "helper", 9, 0, true);
        let mut edge = call(&run, "helper", 4, 0);
        edge.callee_id = Some(decl.id.clone());
        let records = vec![record("a.cpp", vec![decl.clone(), run.clone(), def.clone()], vec![edge])];
        let (_, cg) = build(&records);

        assert_eq!(cg.callees(&run.id)[0].id, def.id);
        assert_eq!(cg.callers(&decl.id)[0].id, run.id);
        assert_eq!(cg.stats().resolved_locally, 1);
    }

    #[test]
    fn test_unresolved_calls_are_kept() {
        let f = func("a.cpp", "f", 1, 0, true);
        let records = vec![record("a.cpp", vec![f.clone()], vec![call(&f, "printf", 2, 1)])];
        let (_, cg) = build(&records);

        assert!(cg.callees(&f.id).is_empty());
        let unresolved = cg.unresolved_from(&f.id);
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].callee_name, "printf");
        assert_eq!(cg.stats().unresolved, 1);
    }

    #[test]
    fn test_cross_file_resolution_matches_arity() {
        let one = func("x.cpp", "load", 1, 1, true);
        let two = func("y.cpp", "load", 1, 2, true);
        let main = func("main.cpp", "main", 1, 0, true);
        let records = vec![
            record("main.cpp", vec![main.clone()], vec![call(&main, "load", 2, 2)]),
            record("x.cpp", vec![one], Vec::new()),
            record("y.cpp", vec![two.clone()], Vec::new()),
        ];
        let (_, cg) = build(&records);
        assert_eq!(cg.callees(&main.id)[0].id, two.id);
    }

    #[test]
    fn test_path_between_overload_sets() {
        let f1 = func("a.cpp", "f", 1, 0, true);
        let f2 = func("a.cpp", "f", 5, 1, true);
        let g = func("a.cpp", "g", 9, 0, true);
        let records = vec![record(
            "a.cpp",
            vec![f1.clone(), f2.clone(), g.clone()],
            vec![call(&f2, "g", 6, 0)],
        )];
        let (_, cg) = build(&records);
        let path = cg
            .path_between(&[f1.id.clone(), f2.id.clone()], &[g.id.clone()], 10)
            .unwrap();
        assert_eq!(path, vec![f2.id.clone(), g.id.clone()]);
    }

    #[test]
    fn test_most_called() {
        let a = func("a.cpp", "a", 1, 0, true);
        let b = func("a.cpp", "b", 5, 0, true);
        let c = func("a.cpp", "c", 9, 0, true);
        let records = vec![record(
            "a.cpp",
            vec![a.clone(), b.clone(), c.clone()],
            vec![call(&a, "c", 2, 0), call(&b, "c", 6, 0), call(&a, "b", 3, 0)],
        )];
        let (_, cg) = build(&records);
        let top = cg.most_called(1);
        assert_eq!(top, vec![(c.id.clone(), 2)]);
    }
}
