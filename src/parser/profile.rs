use super::lexer::Syntax;
use super::profiles::{go, javascript, jvm, python, rust};
use crate::discovery::Language;
use crate::graph::{ImportMatch, SymbolKind, Visibility};
use regex::Regex;
use std::path::{Component, Path, PathBuf};

/// Keywords that still name a return type (`void run()`, `int size()`)
const TYPE_KEYWORDS: &[&str] = &[
    "void", "boolean", "byte", "char", "short", "int", "long", "float", "double",
];

/// How a declaration's span is delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStyle {
    Braces,
    Indentation,
}

/// Which files share unqualified names with a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageScope {
    /// Only the file itself and what it imports
    File,
    /// Every file of the same language in the same directory
    Directory,
}

/// Maps a definition match to a visibility
#[derive(Debug, Clone, Copy)]
pub enum VisibilityRule {
    /// Decided by the words captured in the `vis` group. Private words are checked first.
    Keyword {
        public: &'static [&'static str],
        private: &'static [&'static str],
        otherwise: Visibility,
    },
    /// `_name` is private, anything else public
    LeadingUnderscore,
    /// `Name` is public, `name` private
    Capitalized,
    Fixed(Visibility),
}

impl VisibilityRule {
    pub fn resolve(&self, name: &str, vis: Option<&str>) -> Visibility {
        match self {
            VisibilityRule::Keyword {
                public,
                private,
                otherwise,
            } => {
                let words: Vec<&str> = vis.map(|v| v.split_whitespace().collect()).unwrap_or_default();
                if words.iter().any(|w| private.iter().any(|p| w.starts_with(p))) {
                    Visibility::Private
                } else if words.iter().any(|w| public.iter().any(|p| w.starts_with(p))) {
                    Visibility::Public
                } else {
                    *otherwise
                }
            }
            VisibilityRule::LeadingUnderscore => {
                if name.starts_with('_') {
                    Visibility::Private
                } else {
                    Visibility::Public
                }
            }
            VisibilityRule::Capitalized => {
                if name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
                    Visibility::Public
                } else {
                    Visibility::Private
                }
            }
            VisibilityRule::Fixed(visibility) => *visibility,
        }
    }
}

/// One definition pattern. Named groups: `name` (required), `vis`, `ty`.
#[derive(Debug)]
pub struct DefinitionRule {
    pub kind: SymbolKind,
    pub pattern: Regex,
    pub visibility: VisibilityRule,
    /// Declaration attaches to a type declared elsewhere (Rust `impl` blocks)
    pub companion: bool,
}

impl DefinitionRule {
    pub fn new(kind: SymbolKind, pattern: &str, visibility: VisibilityRule) -> Self {
        Self {
            kind,
            pattern: Regex::new(pattern).unwrap(),
            visibility,
            companion: false,
        }
    }

    pub fn companion(mut self) -> Self {
        self.companion = true;
        self
    }
}

/// A definition found on a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub kind: SymbolKind,
    pub name: String,
    pub visibility: Visibility,
    pub companion: bool,
    /// Byte offset just past the name in the code view
    pub name_end: usize,
}

/// Where an import may land, relative to the scan root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleTarget {
    /// This exact file
    Exact(PathBuf),
    /// Any file whose path ends with these components
    Suffix(PathBuf),
    /// Files of a package directory (the directory path and the package path share a suffix)
    Package(PathBuf),
}

/// Per-language capability set: definition, import and dynamic-reference matchers
#[derive(Debug)]
pub struct Profile {
    pub language: Language,
    pub syntax: Syntax,
    pub body_style: BodyStyle,
    pub package_scope: PackageScope,
    pub annotation_prefixes: &'static [&'static str],
    pub keywords: &'static [&'static str],
    /// Names the runtime calls without a visible reference (Go `init`)
    pub implicit_roots: &'static [&'static str],
    pub module_separator: &'static str,
    pub definitions: Vec<DefinitionRule>,
    pub import_start: Regex,
    pub imports: fn(&str) -> Vec<ImportMatch>,
    /// Patterns with a `target` group, matched against text with literals intact
    pub dynamic: Vec<Regex>,
    pub resolve: fn(&Path, &ImportMatch) -> Vec<ModuleTarget>,
}

impl Profile {
    pub fn is_keyword(&self, word: &str) -> bool {
        self.keywords.contains(&word)
    }

    /// First definition rule matching a code-view line
    pub fn match_definition(&self, code: &str) -> Option<Definition> {
        self.definitions.iter().find_map(|rule| {
            let caps = rule.pattern.captures(code)?;
            let name = caps.name("name")?;
            if self.is_keyword(name.as_str()) {
                return None;
            }
            if let Some(ty) = caps.name("ty") {
                if self.is_keyword(ty.as_str()) && !TYPE_KEYWORDS.contains(&ty.as_str()) {
                    return None;
                }
            }
            let vis = caps.name("vis").map(|m| m.as_str());
            Some(Definition {
                kind: rule.kind,
                name: name.as_str().to_string(),
                visibility: rule.visibility.resolve(name.as_str(), vis),
                companion: rule.companion,
                name_end: name.end(),
            })
        })
    }

    pub fn is_import_start(&self, text: &str) -> bool {
        self.import_start.is_match(text)
    }

    pub fn match_imports(&self, statement: &str) -> Vec<ImportMatch> {
        (self.imports)(statement)
    }

    /// Targets of dynamic-loading constructs on a line
    pub fn match_dynamic(&self, text: &str) -> Vec<String> {
        self.dynamic
            .iter()
            .flat_map(|re| {
                re.captures_iter(text)
                    .filter_map(|caps| caps.name("target").map(|m| m.as_str().to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn resolve_module(&self, importing: &Path, import: &ImportMatch) -> Vec<ModuleTarget> {
        (self.resolve)(importing, import)
    }

    /// Module path of `name` inside `module` (`pkg.util` + `dates`, `.` + `dates`)
    pub fn submodule(&self, module: &str, name: &str) -> String {
        if module.ends_with(self.module_separator) {
            format!("{}{}", module, name)
        } else {
            format!("{}{}{}", module, self.module_separator, name)
        }
    }
}

/// Select the profile for a language tag
pub fn profile_for(language: Language) -> Option<&'static Profile> {
    match language {
        Language::Rust => Some(&*rust::PROFILE),
        Language::Python => Some(&*python::PROFILE),
        Language::JavaScript => Some(&*javascript::JAVASCRIPT),
        Language::TypeScript => Some(&*javascript::TYPESCRIPT),
        Language::Go => Some(&*go::PROFILE),
        Language::Java => Some(&*jvm::JAVA),
        Language::Kotlin => Some(&*jvm::KOTLIN),
        Language::C
        | Language::Cpp
        | Language::CSharp
        | Language::Ruby
        | Language::Php
        | Language::Shell => None,
    }
}

/// Whether files of this language get symbols and edges, or stay opaque
pub fn has_profile(language: Language) -> bool {
    profile_for(language).is_some()
}

/// Resolve `.` and `..` lexically; leading `..` past the root are dropped
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Directory holding `file`, empty for root-level files
pub fn parent_dir(file: &Path) -> PathBuf {
    file.parent().map(Path::to_path_buf).unwrap_or_default()
}
