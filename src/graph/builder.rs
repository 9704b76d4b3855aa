use super::{
    EdgeKind, FileNode, Graph, ImportMatch, NodeId, ReferenceEdge, Symbol, SymbolKind,
    UnresolvedReference, Visibility,
};
use crate::config::Config;
use crate::discovery::{Language, SourceFile};
use crate::parser::{normalize_path, parent_dir, profile_for, FileExtraction, ModuleTarget, PackageScope, Profile};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

/// Two files declare the same configured-unique entry point
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("entry point '{name}' must be unique but is declared in {}", join_paths(.files))]
pub struct GraphInconsistencyError {
    pub name: String,
    pub files: Vec<PathBuf>,
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A reference waiting for every file to be known
struct PendingReference {
    from: NodeId,
    file: PathBuf,
    language: Language,
    reference: UnresolvedReference,
}

/// Lookup tables over the scanned file set
#[derive(Default)]
struct FileIndex {
    paths: HashSet<PathBuf>,
    /// File name (`dates.py`) to paths
    by_name: HashMap<String, Vec<PathBuf>>,
    /// File stem (`dates`) to paths
    by_stem: HashMap<String, Vec<PathBuf>>,
    /// Name of the parent directory to paths
    by_dir: HashMap<String, Vec<PathBuf>>,
}

impl FileIndex {
    fn insert(&mut self, path: &Path) {
        self.paths.insert(path.to_path_buf());
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            self.by_name.entry(name.to_string()).or_default().push(path.to_path_buf());
        }
        if let Some(stem) = path.file_stem().and_then(|n| n.to_str()) {
            self.by_stem.entry(stem.to_string()).or_default().push(path.to_path_buf());
        }
        if let Some(dir) = path.parent().and_then(Path::file_name).and_then(|n| n.to_str()) {
            self.by_dir.entry(dir.to_string()).or_default().push(path.to_path_buf());
        }
    }

    fn resolve(&self, target: &ModuleTarget) -> Vec<PathBuf> {
        match target {
            ModuleTarget::Exact(path) => {
                let path = normalize_path(path);
                if self.paths.contains(&path) {
                    vec![path]
                } else {
                    Vec::new()
                }
            }
            ModuleTarget::Suffix(suffix) => {
                let Some(name) = suffix.file_name().and_then(|n| n.to_str()) else {
                    return Vec::new();
                };
                self.by_name
                    .get(name)
                    .map(|paths| paths.iter().filter(|p| p.ends_with(suffix)).cloned().collect())
                    .unwrap_or_default()
            }
            ModuleTarget::Package(dir) => {
                let Some(last) = dir.file_name().and_then(|n| n.to_str()) else {
                    return Vec::new();
                };
                self.by_dir
                    .get(last)
                    .map(|paths| {
                        paths
                            .iter()
                            .filter(|p| {
                                let parent = parent_dir(p);
                                parent.ends_with(dir) || dir.ends_with(&parent)
                            })
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            }
        }
    }

    fn with_stem(&self, stem: &str) -> &[PathBuf] {
        self.by_stem.get(stem).map(Vec::as_slice).unwrap_or(&[])
    }

    fn in_dir(&self, dir: &str) -> &[PathBuf] {
        self.by_dir.get(dir).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Merges per-file extraction results into one [`Graph`].
///
/// Single writer: files are added one at a time, then [`GraphBuilder::build`]
/// resolves every pending reference against the complete file set.
pub struct GraphBuilder<'c> {
    config: &'c Config,
    graph: Graph,
    index: FileIndex,
    pending: Vec<PendingReference>,
}

impl<'c> GraphBuilder<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self {
            config,
            graph: Graph::new(),
            index: FileIndex::default(),
            pending: Vec::new(),
        }
    }

    /// Add a file, its symbols, and its references for later resolution
    pub fn add_file(&mut self, file: &SourceFile, extraction: &FileExtraction) {
        let file_id = self.graph.add_file(
            file.path.clone(),
            FileNode {
                language: file.language,
                opaque: extraction.opaque,
                line_count: file.lines.len(),
            },
        );
        self.index.insert(&file.path);

        if extraction.opaque {
            debug!("Opaque file: {}", file.path.display());
            return;
        }

        for symbol in &extraction.symbols {
            self.graph.add_symbol(symbol.clone());
        }

        for reference in &extraction.references {
            let from = innermost_symbol(&extraction.symbols, reference.line())
                .map(Symbol::id)
                .unwrap_or_else(|| file_id.clone());
            self.pending.push(PendingReference {
                from,
                file: file.path.clone(),
                language: file.language,
                reference: reference.clone(),
            });
        }
    }

    /// Resolve every pending reference and return the finished graph
    pub fn build(mut self) -> Result<Graph, GraphInconsistencyError> {
        self.check_unique_entry_points()?;
        self.link_companions();
        self.mark_implicit_roots();

        let pending = std::mem::take(&mut self.pending);
        let mut imported: HashMap<PathBuf, HashSet<PathBuf>> = HashMap::new();

        // Imports first: identifier resolution depends on what each file imports
        for item in &pending {
            if let UnresolvedReference::Import { line, import } = &item.reference {
                let files = self.resolve_import(item, *line, import);
                imported.entry(item.file.clone()).or_default().extend(files);
            }
        }

        let no_imports = HashSet::new();
        for item in &pending {
            let file_imports = imported.get(&item.file).unwrap_or(&no_imports);
            match &item.reference {
                UnresolvedReference::Import { .. } => {}
                UnresolvedReference::Identifier { line, name } => {
                    self.resolve_identifier(item, *line, name, file_imports)
                }
                UnresolvedReference::StringLiteral { line, value } => {
                    self.resolve_mention(item, *line, value, EdgeKind::StringMention)
                }
                UnresolvedReference::DynamicLoad { line, target } => {
                    self.resolve_dynamic(item, *line, target)
                }
            }
        }

        debug!(
            "Graph built: {} nodes, {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );
        Ok(self.graph)
    }

    fn check_unique_entry_points(&self) -> Result<(), GraphInconsistencyError> {
        for name in &self.config.entry.unique_entry_points {
            let files: BTreeSet<PathBuf> = self
                .graph
                .find_by_name(name)
                .iter()
                .filter_map(|id| self.graph.symbol(id))
                .filter(|s| s.visibility != Visibility::Private)
                .map(|s| s.file.clone())
                .collect();
            if files.len() > 1 {
                return Err(GraphInconsistencyError {
                    name: name.clone(),
                    files: files.into_iter().collect(),
                });
            }
        }
        Ok(())
    }

    /// `impl Foo` blocks live exactly as long as a `Foo` declared beside them
    fn link_companions(&mut self) {
        let companions: Vec<Symbol> = self
            .graph
            .symbols()
            .filter(|s| s.companion)
            .cloned()
            .collect();

        for companion in companions {
            let owners: Vec<NodeId> = self
                .graph
                .find_by_name(&companion.name)
                .iter()
                .filter_map(|id| self.graph.symbol(id))
                .filter(|s| !s.companion && s.kind == SymbolKind::Class && s.file == companion.file)
                .map(Symbol::id)
                .collect();

            if owners.is_empty() {
                // Trait impls for foreign types and impls split from their type
                self.graph.mark_implicit_root(companion.id());
                continue;
            }
            for owner in owners {
                self.graph.add_edge(
                    &owner,
                    &companion.id(),
                    ReferenceEdge::certain(EdgeKind::Call, companion.span.start_line, &companion.name),
                );
            }
        }
    }

    fn mark_implicit_roots(&mut self) {
        let roots: Vec<NodeId> = self
            .graph
            .symbols()
            .filter(|s| s.parent.is_none())
            .filter(|s| {
                profile_for(s.language)
                    .map(|p| p.implicit_roots.contains(&s.name.as_str()))
                    .unwrap_or(false)
            })
            .map(Symbol::id)
            .collect();
        for id in roots {
            self.graph.mark_implicit_root(id);
        }
    }

    /// Link an import to the files and symbols it names; returns the imported files
    fn resolve_import(&mut self, item: &PendingReference, line: usize, import: &ImportMatch) -> HashSet<PathBuf> {
        let Some(profile) = profile_for(item.language) else {
            return HashSet::new();
        };

        let mut files: HashSet<PathBuf> = HashSet::new();
        for target in profile.resolve_module(&item.file, import) {
            let resolved = self.index.resolve(&target);
            match target {
                // A package import only reaches the files declaring what it names
                ModuleTarget::Package(_) if !import.wildcard => {
                    files.extend(resolved.into_iter().filter(|path| {
                        import
                            .names
                            .iter()
                            .any(|name| self.declares(path, name))
                    }));
                }
                _ => files.extend(resolved),
            }
        }

        // `from pkg import util` may name a module rather than a symbol
        for name in &import.names {
            let submodule = ImportMatch::module(profile.submodule(&import.module, name));
            for target in profile.resolve_module(&item.file, &submodule) {
                if !matches!(target, ModuleTarget::Package(_)) {
                    files.extend(self.index.resolve(&target));
                }
            }
        }
        files.remove(&item.file);

        let mut sorted: Vec<&PathBuf> = files.iter().collect();
        sorted.sort();
        for path in sorted {
            trace!("{} imports {}", item.file.display(), path.display());
            self.graph.add_edge(
                &item.from,
                &NodeId::file(path.clone()),
                ReferenceEdge::certain(EdgeKind::Import, line, &import.module),
            );
            for name in &import.names {
                let targets: Vec<NodeId> = self
                    .graph
                    .symbols_in(path)
                    .iter()
                    .filter(|id| matches!(id, NodeId::Symbol { name: n, .. } if n == name))
                    .cloned()
                    .collect();
                for target in targets {
                    self.graph.add_edge(
                        &item.from,
                        &target,
                        ReferenceEdge::certain(EdgeKind::Import, line, name),
                    );
                }
            }
        }
        files
    }

    fn declares(&self, path: &Path, name: &str) -> bool {
        self.graph
            .symbols_in(path)
            .iter()
            .any(|id| matches!(id, NodeId::Symbol { name: n, .. } if n == name))
    }

    /// Certain through same-file, imported-file or same-package scope; otherwise
    /// heuristic to every same-named symbol
    fn resolve_identifier(
        &mut self,
        item: &PendingReference,
        line: usize,
        name: &str,
        imports: &HashSet<PathBuf>,
    ) {
        let candidates: Vec<Symbol> = self
            .graph
            .find_by_name(name)
            .iter()
            .filter(|id| **id != item.from)
            .filter_map(|id| self.graph.symbol(id))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return;
        }

        let package_scope = profile_for(item.language).map(|p| p.package_scope);
        let in_scope = |symbol: &Symbol| {
            symbol.file == item.file
                || imports.contains(&symbol.file)
                || (package_scope == Some(PackageScope::Directory)
                    && symbol.language == item.language
                    && parent_dir(&symbol.file) == parent_dir(&item.file))
        };

        let certain: Vec<&Symbol> = candidates.iter().filter(|s| in_scope(s)).collect();
        if !certain.is_empty() {
            for symbol in certain {
                self.graph.add_edge(
                    &item.from,
                    &symbol.id(),
                    ReferenceEdge::certain(EdgeKind::Call, line, name),
                );
            }
            return;
        }

        for symbol in &candidates {
            self.graph.add_edge(
                &item.from,
                &symbol.id(),
                ReferenceEdge::heuristic(EdgeKind::Call, line, name),
            );
        }
    }

    /// A literal naming a symbol or a file stem
    fn resolve_mention(&mut self, item: &PendingReference, line: usize, value: &str, kind: EdgeKind) {
        let last = last_segment(value);
        let mut targets: BTreeSet<NodeId> = BTreeSet::new();

        for name in [value, last] {
            for id in self.graph.find_by_name(name) {
                targets.insert(id.clone());
            }
        }
        for path in self.index.with_stem(last) {
            targets.insert(NodeId::file(path.clone()));
        }

        for target in targets {
            if target == item.from || target == NodeId::file(item.file.clone()) {
                continue;
            }
            self.graph
                .add_edge(&item.from, &target, ReferenceEdge::heuristic(kind, line, value));
        }
    }

    fn resolve_dynamic(&mut self, item: &PendingReference, line: usize, target: &str) {
        if let Some((head, _)) = target.split_once("${") {
            // `./plugins/${name}` may load any file of the plugins directory
            let Some(dir) = head.split('/').filter(|s| !s.is_empty() && *s != ".").last() else {
                return;
            };
            let files: Vec<PathBuf> = self.index.in_dir(dir).to_vec();
            for path in files {
                if path != item.file {
                    self.graph.add_edge(
                        &item.from,
                        &NodeId::file(path),
                        ReferenceEdge::heuristic(EdgeKind::DynamicReference, line, target),
                    );
                }
            }
            return;
        }

        if let Some(profile) = profile_for(item.language) {
            let files = self.module_files(profile, &item.file, target);
            for path in files {
                if path != item.file {
                    self.graph.add_edge(
                        &item.from,
                        &NodeId::file(path),
                        ReferenceEdge::heuristic(EdgeKind::DynamicReference, line, target),
                    );
                }
            }
        }
        self.resolve_mention(item, line, target, EdgeKind::DynamicReference);
    }

    fn module_files(&self, profile: &Profile, file: &Path, module: &str) -> Vec<PathBuf> {
        let import = ImportMatch::module(module);
        let mut files: Vec<PathBuf> = profile
            .resolve_module(file, &import)
            .iter()
            .filter(|t| !matches!(t, ModuleTarget::Package(_)))
            .flat_map(|t| self.index.resolve(t))
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

/// Innermost symbol whose span covers `line`
fn innermost_symbol(symbols: &[Symbol], line: usize) -> Option<&Symbol> {
    symbols
        .iter()
        .filter(|s| s.span.contains(line))
        .min_by_key(|s| s.span.len())
}

/// `plugins.csv_export` -> `csv_export`, `./handlers/auth.js` -> `auth`, `a::b` -> `b`
fn last_segment(value: &str) -> &str {
    let without_ext = match value.rsplit_once('.') {
        Some((head, ext))
            if !head.is_empty()
                && !ext.is_empty()
                && ext.len() <= 4
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && Language::from_extension(ext).is_some() =>
        {
            head
        }
        _ => value,
    };
    without_ext
        .rsplit(['/', '.', ':'])
        .find(|s| !s.is_empty())
        .unwrap_or(without_ext)
}
