use crate::graph::{Symbol, UnresolvedReference};

/// Result of extracting one source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileExtraction {
    /// Symbols declared in the file, in declaration order
    pub symbols: Vec<Symbol>,

    /// References to be resolved against the whole graph
    pub references: Vec<UnresolvedReference>,

    /// No profile or undecodable bytes: the file is a single opaque node
    pub opaque: bool,
}

impl FileExtraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opaque() -> Self {
        Self {
            opaque: true,
            ..Self::default()
        }
    }
}
