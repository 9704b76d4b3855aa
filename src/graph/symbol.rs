use crate::discovery::Language;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identity of a graph node: a whole file or a symbol declared in one
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "kebab-case")]
pub enum NodeId {
    File {
        path: PathBuf,
    },
    Symbol {
        file: PathBuf,
        name: String,
        line: usize,
    },
}

impl NodeId {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        NodeId::File { path: path.into() }
    }

    pub fn symbol(file: impl Into<PathBuf>, name: impl Into<String>, line: usize) -> Self {
        NodeId::Symbol {
            file: file.into(),
            name: name.into(),
            line,
        }
    }

    /// The file this node is, or the file declaring it
    pub fn path(&self) -> &Path {
        match self {
            NodeId::File { path } => path,
            NodeId::Symbol { file, .. } => file,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, NodeId::File { .. })
    }

    /// The File node owning this node (itself for files)
    pub fn owning_file(&self) -> NodeId {
        NodeId::file(self.path())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeId::File { path } => write!(f, "{}", path.display()),
            NodeId::Symbol { file, name, line } => {
                write!(f, "{}::{}@{}", file.display(), name, line)
            }
        }
    }
}

/// Kind of declared symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Function,
    Class,
    ExportedConstant,
    Module,
}

impl SymbolKind {
    /// Whether the symbol's span is a body worth comparing for duplication
    pub fn has_comparable_body(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Class)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::ExportedConstant => "exported constant",
            SymbolKind::Module => "module",
        }
    }
}

/// Visibility as far as the language profile can tell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    Public,
    Private,
    #[default]
    Unknown,
}

/// Inclusive 1-based line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line: end_line.max(start_line),
        }
    }

    pub fn contains(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn len(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// A declared symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Declaring file, relative to the scan root
    pub file: PathBuf,

    /// Declared name
    pub name: String,

    pub kind: SymbolKind,

    /// Declaration span
    pub span: Span,

    pub visibility: Visibility,

    /// Attribute/decorator/annotation lines directly above the declaration
    pub annotations: Vec<String>,

    /// Normalized parameter list, when the profile can read it
    pub signature: Option<String>,

    pub language: Language,

    /// Innermost enclosing symbol in the same file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,

    /// Declaration attaches to a same-named type (Rust `impl` blocks)
    #[serde(default)]
    pub companion: bool,

    /// Body tokens with comments and layout removed and the own name masked
    #[serde(skip)]
    pub body_tokens: Vec<String>,
}

impl Symbol {
    pub fn new(
        file: PathBuf,
        name: String,
        kind: SymbolKind,
        span: Span,
        language: Language,
    ) -> Self {
        Self {
            file,
            name,
            kind,
            span,
            visibility: Visibility::default(),
            annotations: Vec::new(),
            signature: None,
            language,
            parent: None,
            companion: false,
            body_tokens: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        NodeId::symbol(self.file.clone(), self.name.clone(), self.span.start_line)
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Get a display string for this symbol
    pub fn display(&self) -> String {
        format!(
            "{} {} ({}:{})",
            self.kind.display_name(),
            self.name,
            self.file.display(),
            self.span.start_line
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::file("src/a.py").to_string(), "src/a.py");
        assert_eq!(
            NodeId::symbol("src/a.py", "format_date", 3).to_string(),
            "src/a.py::format_date@3"
        );
    }

    #[test]
    fn test_owning_file() {
        let id = NodeId::symbol("src/a.py", "f", 1);
        assert_eq!(id.owning_file(), NodeId::file("src/a.py"));
        assert!(!id.is_file());
        assert!(id.owning_file().is_file());
    }

    #[test]
    fn test_span_contains() {
        let span = Span::new(3, 7);
        assert!(span.contains(3));
        assert!(span.contains(7));
        assert!(!span.contains(8));
        assert_eq!(span.len(), 5);
        assert_eq!(Span::new(5, 2).end_line, 5);
    }

    #[test]
    fn test_symbol_kind_display() {
        assert_eq!(SymbolKind::Function.display_name(), "function");
        assert!(SymbolKind::Class.has_comparable_body());
        assert!(!SymbolKind::ExportedConstant.has_comparable_body());
    }
}
