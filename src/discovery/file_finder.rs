use crate::config::Config;
use crate::context::{CancelToken, Cancelled};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Fatal scanning errors; individual unreadable files are skipped instead
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Scan root does not exist: {0}")]
    RootNotFound(PathBuf),
    #[error("Scan root is not a traversable directory: {0}")]
    NotTraversable(PathBuf),
    #[error("Invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Language tag assigned by extension or shebang marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    Kotlin,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Shell,
}

impl Language {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Language::Rust),
            "py" | "pyi" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" | "mts" | "cts" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            "kt" | "kts" => Some(Language::Kotlin),
            "c" | "h" => Some(Language::C),
            "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => Some(Language::Cpp),
            "cs" => Some(Language::CSharp),
            "rb" => Some(Language::Ruby),
            "php" => Some(Language::Php),
            "sh" | "bash" | "zsh" => Some(Language::Shell),
            _ => None,
        }
    }

    /// Classify an extensionless script by its `#!` line
    pub fn from_shebang(first_line: &str) -> Option<Self> {
        let command = first_line.trim().strip_prefix("#!")?;
        let mut words = command.split_whitespace();
        let mut interpreter = words.next()?.rsplit('/').next()?;
        if interpreter == "env" {
            interpreter = words.find(|w| !w.starts_with('-'))?;
        }

        if interpreter.starts_with("python") {
            Some(Language::Python)
        } else if interpreter == "node" || interpreter == "deno" {
            Some(Language::JavaScript)
        } else if interpreter == "ruby" {
            Some(Language::Ruby)
        } else if interpreter == "php" {
            Some(Language::Php)
        } else if matches!(interpreter, "sh" | "bash" | "zsh" | "dash") {
            Some(Language::Shell)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Shell => "shell",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let language = match lower.as_str() {
            "rust" => Language::Rust,
            "python" => Language::Python,
            "javascript" | "js" => Language::JavaScript,
            "typescript" | "ts" => Language::TypeScript,
            "go" | "golang" => Language::Go,
            "java" => Language::Java,
            "kotlin" => Language::Kotlin,
            "c" => Language::C,
            "cpp" | "c++" => Language::Cpp,
            "csharp" | "c#" => Language::CSharp,
            "ruby" => Language::Ruby,
            "php" => Language::Php,
            "shell" | "sh" | "bash" => Language::Shell,
            other => return Err(format!("unknown language '{}'", other)),
        };
        Ok(language)
    }
}

/// A scanned source file. Immutable once produced; a re-scan replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the scan root
    pub path: PathBuf,

    /// Detected language
    pub language: Language,

    /// SHA-256 of the raw bytes, lowercase hex
    pub content_hash: String,

    /// Raw lines without terminators (empty when undecodable)
    pub lines: Vec<String>,

    /// Bytes were not valid UTF-8
    pub undecodable: bool,
}

impl SourceFile {
    /// Build a record from raw bytes
    pub fn from_bytes(path: PathBuf, language: Language, bytes: &[u8]) -> Self {
        let content_hash = content_hash(bytes);
        match std::str::from_utf8(bytes) {
            Ok(text) => Self {
                path,
                language,
                content_hash,
                lines: text.lines().map(str::to_string).collect(),
                undecodable: false,
            },
            Err(_) => Self {
                path,
                language,
                content_hash,
                lines: Vec::new(),
                undecodable: true,
            },
        }
    }

    /// Convenience constructor for in-memory sources
    pub fn from_text(path: impl Into<PathBuf>, language: Language, text: &str) -> Self {
        Self::from_bytes(path.into(), language, text.as_bytes())
    }

    /// Lines `start..=end` (1-based, clamped)
    pub fn span_text(&self, start: usize, end: usize) -> String {
        let from = start.saturating_sub(1).min(self.lines.len());
        let to = end.min(self.lines.len()).max(from);
        self.lines[from..to].join("\n")
    }
}

/// SHA-256 of `bytes` as lowercase hex
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Result of scanning a root
#[derive(Debug, Clone)]
pub struct ScanOutput {
    /// Canonical scan root
    pub root: PathBuf,

    /// Scanned files, sorted by path
    pub files: Vec<SourceFile>,

    /// Files that could not be read
    pub skipped: Vec<PathBuf>,
}

/// Walks a root path and produces source file records
pub struct FileFinder<'a> {
    config: &'a Config,
}

impl<'a> FileFinder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Scan `root`, reading files on the rayon pool
    pub fn scan(&self, root: &Path, cancel: &CancelToken) -> Result<ScanOutput, ScanError> {
        if !root.exists() {
            return Err(ScanError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() || std::fs::read_dir(root).is_err() {
            return Err(ScanError::NotTraversable(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .map_err(|_| ScanError::NotTraversable(root.to_path_buf()))?;

        debug!("Scanning for files in: {}", root.display());

        let candidates = self.walk(&root)?;
        debug!("Walk produced {} candidate files", candidates.len());

        let results: Vec<Result<Option<SourceFile>, (PathBuf, std::io::Error)>> = candidates
            .par_iter()
            .map(|(path, language)| {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                self.read_file(&root, path, *language)
            })
            .collect();

        cancel.check()?;

        let mut files = Vec::new();
        let mut skipped = Vec::new();
        for result in results {
            match result {
                Ok(Some(file)) => files.push(file),
                Ok(None) => {}
                Err((path, e)) => {
                    warn!("Skipping unreadable file {}: {}", path.display(), e);
                    skipped.push(path);
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        skipped.sort();

        debug!("Found {} source files", files.len());
        Ok(ScanOutput {
            root,
            files,
            skipped,
        })
    }

    /// Walk the tree, honouring .gitignore and the configured excludes
    fn walk(&self, root: &Path) -> Result<Vec<(PathBuf, Option<Language>)>, ScanError> {
        let mut overrides = OverrideBuilder::new(root);
        for pattern in &self.config.scan.exclude {
            overrides
                .add(&format!("!{}", pattern))
                .map_err(|source| ScanError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
        }
        let overrides = overrides.build().map_err(|source| ScanError::InvalidPattern {
            pattern: self.config.scan.exclude.join(", "),
            source,
        })?;

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .ignore(true)
            .parents(false)
            .follow_links(false)
            .overrides(overrides)
            .build();

        let candidates = walker
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let path = entry.path();
                match path.extension().and_then(|e| e.to_str()) {
                    Some(ext) => {
                        let language = Language::from_extension(&ext.to_ascii_lowercase())?;
                        trace!("Found {:?}: {}", language, path.display());
                        Some((path.to_path_buf(), Some(language)))
                    }
                    // Extensionless files are classified by their shebang after reading
                    None => Some((path.to_path_buf(), None)),
                }
            })
            .collect();

        Ok(candidates)
    }

    fn read_file(
        &self,
        root: &Path,
        path: &Path,
        language: Option<Language>,
    ) -> Result<Option<SourceFile>, (PathBuf, std::io::Error)> {
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        let bytes = std::fs::read(path).map_err(|e| (relative.clone(), e))?;

        let language = match language {
            Some(language) => language,
            None => {
                let first_line = bytes
                    .split(|b| *b == b'\n')
                    .next()
                    .map(String::from_utf8_lossy)
                    .unwrap_or_default();
                match Language::from_shebang(&first_line) {
                    Some(language) => language,
                    None => return Ok(None),
                }
            }
        };

        if !self.config.scan.languages.is_empty() && !self.config.scan.languages.contains(&language)
        {
            return Ok(None);
        }

        Ok(Some(SourceFile::from_bytes(relative, language, &bytes)))
    }
}

/// Per-language file counts
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub scanned: usize,
    pub skipped: usize,
    pub opaque: usize,
    pub by_language: BTreeMap<Language, usize>,
}

impl FileStats {
    pub fn from_scan(output: &ScanOutput) -> Self {
        let mut stats = Self {
            scanned: output.files.len(),
            skipped: output.skipped.len(),
            ..Self::default()
        };
        for file in &output.files {
            *stats.by_language.entry(file.language).or_default() += 1;
            if file.undecodable || !crate::parser::has_profile(file.language) {
                stats.opaque += 1;
            }
        }
        stats
    }
}
