mod builder;
mod edge;
mod parallel_builder;
mod symbol;

pub use builder::{GraphBuilder, GraphInconsistencyError};
pub use edge::{EdgeConfidence, EdgeKind, ImportMatch, ReferenceEdge, UnresolvedReference};
pub use parallel_builder::{BuildError, ParallelGraphBuilder};
pub use symbol::{NodeId, Span, Symbol, SymbolKind, Visibility};

use crate::discovery::Language;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A scanned file as the graph sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub language: Language,

    /// Unprofiled or undecodable: no symbols, no edges, always reachable
    pub opaque: bool,

    pub line_count: usize,
}

/// The dependency graph of one run: files, symbols and the references between them
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Nodes are NodeIds, edges are references. Parallel edges are kept.
    inner: DiGraph<NodeId, ReferenceEdge>,

    node_map: HashMap<NodeId, NodeIndex>,

    symbols: HashMap<NodeId, Symbol>,

    files: BTreeMap<PathBuf, FileNode>,

    /// Simple name to declaring symbols
    name_index: HashMap<String, Vec<NodeId>>,

    /// Enclosing symbol to its members
    children_index: HashMap<NodeId, Vec<NodeId>>,

    /// File to the symbols it declares
    file_symbols: HashMap<PathBuf, Vec<NodeId>>,

    /// Symbols the runtime reaches without a visible reference
    implicit_roots: HashSet<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a File node
    pub fn add_file(&mut self, path: PathBuf, node: FileNode) -> NodeId {
        let id = NodeId::file(path.clone());
        if !self.node_map.contains_key(&id) {
            let idx = self.inner.add_node(id.clone());
            self.node_map.insert(id.clone(), idx);
        }
        self.files.insert(path, node);
        id
    }

    /// Add a Symbol node. Its file must already be present.
    pub fn add_symbol(&mut self, symbol: Symbol) -> NodeId {
        let id = symbol.id();
        let idx = self.inner.add_node(id.clone());
        self.node_map.insert(id.clone(), idx);

        self.name_index
            .entry(symbol.name.clone())
            .or_default()
            .push(id.clone());
        if let Some(parent) = &symbol.parent {
            self.children_index
                .entry(parent.clone())
                .or_default()
                .push(id.clone());
        }
        self.file_symbols
            .entry(symbol.file.clone())
            .or_default()
            .push(id.clone());

        self.symbols.insert(id.clone(), symbol);
        id
    }

    /// Add an edge between two present nodes; returns false if either is missing
    pub fn add_edge(&mut self, from: &NodeId, to: &NodeId, edge: ReferenceEdge) -> bool {
        match (self.node_map.get(from), self.node_map.get(to)) {
            (Some(&from_idx), Some(&to_idx)) => {
                self.inner.add_edge(from_idx, to_idx, edge);
                true
            }
            _ => false,
        }
    }

    pub fn mark_implicit_root(&mut self, id: NodeId) {
        self.implicit_roots.insert(id);
    }

    pub fn is_implicit_root(&self, id: &NodeId) -> bool {
        self.implicit_roots.contains(id)
    }

    pub fn implicit_roots(&self) -> impl Iterator<Item = &NodeId> {
        self.implicit_roots.iter()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node_map.contains_key(id)
    }

    pub fn symbol(&self, id: &NodeId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn file(&self, path: &Path) -> Option<&FileNode> {
        self.files.get(path)
    }

    /// Files in path order
    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &FileNode)> {
        self.files.iter()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.inner.node_weights()
    }

    /// Opaque files are never analysed and never removed
    pub fn is_opaque(&self, id: &NodeId) -> bool {
        match id {
            NodeId::File { path } => self.files.get(path).map(|f| f.opaque).unwrap_or(false),
            NodeId::Symbol { .. } => false,
        }
    }

    pub fn find_by_name(&self, name: &str) -> &[NodeId] {
        self.name_index.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Symbols declared in a file
    pub fn symbols_in(&self, path: &Path) -> &[NodeId] {
        self.file_symbols
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Direct members of a symbol, or the symbols of a file
    pub fn members_of(&self, id: &NodeId) -> &[NodeId] {
        match id {
            NodeId::File { path } => self.symbols_in(path),
            NodeId::Symbol { .. } => self
                .children_index
                .get(id)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }

    /// Enclosing symbol, or the owning file for top-level symbols
    pub fn container_of(&self, id: &NodeId) -> Option<NodeId> {
        match id {
            NodeId::File { .. } => None,
            NodeId::Symbol { .. } => Some(
                self.symbols
                    .get(id)
                    .and_then(|s| s.parent.clone())
                    .unwrap_or_else(|| id.owning_file()),
            ),
        }
    }

    /// Edges pointing at a node, with their source
    pub fn inbound(&self, id: &NodeId) -> Vec<(&NodeId, &ReferenceEdge)> {
        self.edges(id, Direction::Incoming)
    }

    /// Edges leaving a node, with their target
    pub fn outbound(&self, id: &NodeId) -> Vec<(&NodeId, &ReferenceEdge)> {
        self.edges(id, Direction::Outgoing)
    }

    fn edges(&self, id: &NodeId, direction: Direction) -> Vec<(&NodeId, &ReferenceEdge)> {
        let Some(&idx) = self.node_map.get(id) else {
            return Vec::new();
        };
        self.inner
            .edges_directed(idx, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                (&self.inner[other], edge.weight())
            })
            .collect()
    }

    /// Certain edges pointing at a node, counting parallel edges
    pub fn certain_inbound_count(&self, id: &NodeId) -> usize {
        self.inbound(id)
            .into_iter()
            .filter(|(_, edge)| edge.is_certain())
            .count()
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: &NodeId) -> bool {
        let Some(idx) = self.node_map.remove(id) else {
            return false;
        };
        let last = NodeIndex::new(self.inner.node_count() - 1);
        self.inner.remove_node(idx);
        // petgraph moves the last node into the freed slot
        if idx != last {
            let moved = self.inner[idx].clone();
            self.node_map.insert(moved, idx);
        }

        match id {
            NodeId::File { path } => {
                self.files.remove(path);
                self.file_symbols.remove(path);
            }
            NodeId::Symbol { file, name, .. } => {
                self.symbols.remove(id);
                if let Some(ids) = self.name_index.get_mut(name) {
                    ids.retain(|other| other != id);
                }
                if let Some(ids) = self.file_symbols.get_mut(file) {
                    ids.retain(|other| other != id);
                }
                for children in self.children_index.values_mut() {
                    children.retain(|other| other != id);
                }
            }
        }
        self.children_index.remove(id);
        self.implicit_roots.remove(id);
        true
    }

    /// Point every inbound edge of `from` at `to` instead
    pub fn retarget_inbound(&mut self, from: &NodeId, to: &NodeId) {
        let (Some(&from_idx), Some(&to_idx)) = (self.node_map.get(from), self.node_map.get(to))
        else {
            return;
        };
        let moved: Vec<(NodeIndex, ReferenceEdge)> = self
            .inner
            .edges_directed(from_idx, Direction::Incoming)
            .map(|edge| (edge.source(), edge.weight().clone()))
            .collect();
        self.inner
            .retain_edges(|g, e| g.edge_endpoints(e).map(|(_, t)| t != from_idx).unwrap_or(true));
        for (source, edge) in moved {
            if source != to_idx {
                self.inner.add_edge(source, to_idx, edge);
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Get the underlying petgraph for advanced operations
    pub fn inner(&self) -> &DiGraph<NodeId, ReferenceEdge> {
        &self.inner
    }

    pub fn node_index(&self, id: &NodeId) -> Option<NodeIndex> {
        self.node_map.get(id).copied()
    }
}
