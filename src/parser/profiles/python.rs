use crate::discovery::Language;
use crate::graph::{ImportMatch, SymbolKind};
use crate::parser::lexer::{StringDelim, Syntax};
use crate::parser::profile::{
    normalize_path, parent_dir, BodyStyle, DefinitionRule, ModuleTarget, PackageScope, Profile,
    VisibilityRule,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield", "self", "cls",
];

const STRINGS: &[StringDelim] = &[
    StringDelim::quoted("\"\"\"").multiline(),
    StringDelim::quoted("'''").multiline(),
    StringDelim::quoted("\""),
    StringDelim::quoted("'"),
];

pub static PROFILE: Lazy<Profile> = Lazy::new(|| Profile {
    language: Language::Python,
    syntax: Syntax {
        line_comments: &["#"],
        block_comment: None,
        strings: STRINGS,
        char_literals: false,
    },
    body_style: BodyStyle::Indentation,
    package_scope: PackageScope::File,
    annotation_prefixes: &["@"],
    keywords: KEYWORDS,
    implicit_roots: &[],
    module_separator: ".",
    definitions: vec![
        DefinitionRule::new(
            SymbolKind::Function,
            r"^\s*(?:async\s+)?def\s+(?P<name>[A-Za-z_]\w*)",
            VisibilityRule::LeadingUnderscore,
        ),
        DefinitionRule::new(
            SymbolKind::Class,
            r"^\s*class\s+(?P<name>[A-Za-z_]\w*)",
            VisibilityRule::LeadingUnderscore,
        ),
        DefinitionRule::new(
            SymbolKind::ExportedConstant,
            r"^(?P<name>_*[A-Z][A-Z0-9_]*)\s*(?::[^=]*)?=[^=]",
            VisibilityRule::LeadingUnderscore,
        ),
    ],
    import_start: Regex::new(r"^\s*(?:from\s+[.\w]+\s+import\b|import\s)").unwrap(),
    imports: match_imports,
    dynamic: vec![
        Regex::new(r#"importlib\.import_module\(\s*["'](?P<target>[^"']+)["']"#).unwrap(),
        Regex::new(r#"__import__\(\s*["'](?P<target>[^"']+)["']"#).unwrap(),
        Regex::new(r#"getattr\([^,()]+,\s*["'](?P<target>[^"']+)["']"#).unwrap(),
        Regex::new(r#"(?:globals|locals)\(\)\[\s*["'](?P<target>[^"']+)["']"#).unwrap(),
    ],
    resolve: resolve_module,
});

static FROM_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*from\s+(?P<module>[.\w]+)\s+import\s+(?P<names>.+)$").unwrap()
});

static PLAIN_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*import\s+(?P<modules>.+)$").unwrap());

fn strip_alias(item: &str) -> &str {
    item.split(" as ").next().unwrap_or(item).trim()
}

fn match_imports(statement: &str) -> Vec<ImportMatch> {
    if let Some(caps) = FROM_IMPORT.captures(statement) {
        let names = caps["names"].replace(['(', ')'], " ");
        let mut import = ImportMatch::module(&caps["module"]);
        for item in names.split(',').map(strip_alias).filter(|s| !s.is_empty()) {
            if item == "*" {
                import.wildcard = true;
            } else {
                import.names.push(item.to_string());
            }
        }
        return vec![import];
    }

    if let Some(caps) = PLAIN_IMPORT.captures(statement) {
        return caps["modules"]
            .split(',')
            .map(strip_alias)
            .filter(|m| !m.is_empty())
            .map(ImportMatch::module)
            .collect();
    }

    Vec::new()
}

fn resolve_module(importing: &Path, import: &ImportMatch) -> Vec<ModuleTarget> {
    let module = import.module.as_str();
    let dots = module.chars().take_while(|c| *c == '.').count();
    let segments: PathBuf = module[dots..].split('.').filter(|s| !s.is_empty()).collect();

    if dots > 0 {
        let mut base = parent_dir(importing);
        for _ in 1..dots {
            base.pop();
        }
        let path = normalize_path(&base.join(&segments));
        if segments.as_os_str().is_empty() {
            return vec![ModuleTarget::Exact(path.join("__init__.py"))];
        }
        return vec![
            ModuleTarget::Exact(path.with_extension("py")),
            ModuleTarget::Exact(path.join("__init__.py")),
        ];
    }

    if segments.as_os_str().is_empty() {
        return Vec::new();
    }
    vec![
        ModuleTarget::Suffix(segments.with_extension("py")),
        ModuleTarget::Suffix(segments.join("__init__.py")),
    ]
}
