use serde::{Deserialize, Serialize};

/// Kind of reference between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Import/use/require statement
    Import,

    /// Call or other direct use of an identifier
    Call,

    /// String literal that matches a symbol or file name
    StringMention,

    /// Known dynamic-loading construct (importlib, Class.forName, import())
    DynamicReference,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Import => "import",
            EdgeKind::Call => "call",
            EdgeKind::StringMention => "string-mention",
            EdgeKind::DynamicReference => "dynamic-reference",
        }
    }
}

/// How sure the extractor is that the reference is real
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeConfidence {
    Certain,
    Heuristic,
}

/// A directed reference. Parallel edges are kept: multiplicity matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub kind: EdgeKind,
    pub confidence: EdgeConfidence,

    /// Line of the occurrence in the source node's file
    pub line: usize,

    /// Identifier, module path or literal that produced the edge
    pub name: String,
}

impl ReferenceEdge {
    pub fn new(kind: EdgeKind, confidence: EdgeConfidence, line: usize, name: impl Into<String>) -> Self {
        Self {
            kind,
            confidence,
            line,
            name: name.into(),
        }
    }

    pub fn certain(kind: EdgeKind, line: usize, name: impl Into<String>) -> Self {
        Self::new(kind, EdgeConfidence::Certain, line, name)
    }

    pub fn heuristic(kind: EdgeKind, line: usize, name: impl Into<String>) -> Self {
        Self::new(kind, EdgeConfidence::Heuristic, line, name)
    }

    pub fn is_certain(&self) -> bool {
        self.confidence == EdgeConfidence::Certain
    }
}

/// An import statement as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMatch {
    /// Module path as written (`./dates`, `pkg.util`, `crate::a::b`, `github.com/x/y`)
    pub module: String,

    /// Names imported from the module (empty for whole-module imports)
    pub names: Vec<String>,

    /// `*` import
    pub wildcard: bool,
}

impl ImportMatch {
    pub fn module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            names: Vec::new(),
            wildcard: false,
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn with_wildcard(mut self) -> Self {
        self.wildcard = true;
        self
    }
}

/// A reference found by the extractor, resolved later against the whole graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReference {
    Import { line: usize, import: ImportMatch },
    Identifier { line: usize, name: String },
    StringLiteral { line: usize, value: String },
    DynamicLoad { line: usize, target: String },
}

impl UnresolvedReference {
    pub fn line(&self) -> usize {
        match self {
            UnresolvedReference::Import { line, .. }
            | UnresolvedReference::Identifier { line, .. }
            | UnresolvedReference::StringLiteral { line, .. }
            | UnresolvedReference::DynamicLoad { line, .. } => *line,
        }
    }
}
