use crate::config::Config;
use crate::graph::{Graph, NodeId, Symbol};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Why a node is a reachability root
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootKind {
    /// File matched an entry glob
    EntryFile,
    /// Public symbol declared in an entry file
    EntryFileExport,
    /// Name matched an entry symbol pattern
    EntrySymbol,
    /// Carries an entry annotation (`#[test]`, `@app.route`, ...)
    EntryAnnotation,
    /// Public symbol in library mode
    LibraryExport,
    /// Unprofiled or undecodable file
    Opaque,
    /// Reached by the runtime (Go `init`, impls of foreign types)
    Implicit,
}

/// The root set of one analysis, kept so simulations can reuse it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roots {
    roots: BTreeMap<NodeId, RootKind>,
}

impl Roots {
    pub fn insert(&mut self, id: NodeId, kind: RootKind) {
        self.roots.entry(id).or_insert(kind);
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.roots.contains_key(id)
    }

    pub fn kind(&self, id: &NodeId) -> Option<RootKind> {
        self.roots.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, RootKind)> {
        self.roots.iter().map(|(id, kind)| (id, *kind))
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Detects reachability roots from configuration and graph facts
pub struct EntryPointDetector<'a> {
    config: &'a Config,
    entry_files: GlobSet,
}

impl<'a> EntryPointDetector<'a> {
    pub fn new(config: &'a Config) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.entry.files {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!("Ignoring invalid entry glob '{}': {}", pattern, e),
            }
        }
        let entry_files = builder.build().unwrap_or_else(|e| {
            warn!("Entry globs unusable: {}", e);
            GlobSet::empty()
        });
        Self {
            config,
            entry_files,
        }
    }

    /// Detect all roots in the graph
    pub fn detect(&self, graph: &Graph) -> Roots {
        let mut roots = Roots::default();

        for (path, file) in graph.files() {
            if file.opaque {
                roots.insert(NodeId::file(path.clone()), RootKind::Opaque);
            } else if self.entry_files.is_match(path) {
                debug!("Entry file: {}", path.display());
                roots.insert(NodeId::file(path.clone()), RootKind::EntryFile);
            }
        }

        let mut symbols: Vec<&Symbol> = graph.symbols().collect();
        symbols.sort_by_key(|s| s.id());
        for symbol in symbols {
            if let Some(kind) = self.symbol_root(symbol) {
                debug!("Entry symbol: {} ({:?})", symbol.display(), kind);
                roots.insert(symbol.id(), kind);
            }
        }

        for id in graph.implicit_roots() {
            roots.insert(id.clone(), RootKind::Implicit);
        }

        info!("Detected {} roots", roots.len());
        roots
    }

    fn symbol_root(&self, symbol: &Symbol) -> Option<RootKind> {
        if self.config.has_entry_annotation(&symbol.annotations) {
            return Some(RootKind::EntryAnnotation);
        }
        if self.config.is_entry_symbol(&symbol.name) {
            return Some(RootKind::EntrySymbol);
        }
        if symbol.is_public() && self.entry_files.is_match(&symbol.file) {
            return Some(RootKind::EntryFileExport);
        }
        if symbol.is_public() && self.config.entry.library_mode {
            return Some(RootKind::LibraryExport);
        }
        None
    }
}
