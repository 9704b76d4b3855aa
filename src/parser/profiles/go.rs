use crate::discovery::Language;
use crate::graph::{ImportMatch, SymbolKind};
use crate::parser::lexer::{StringDelim, Syntax};
use crate::parser::profile::{
    BodyStyle, DefinitionRule, ModuleTarget, PackageScope, Profile, VisibilityRule,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return",
    "select", "struct", "switch", "type", "var", "nil", "true", "false", "iota",
];

const STRINGS: &[StringDelim] = &[
    StringDelim::quoted("`").multiline().raw(),
    StringDelim::quoted("\""),
    StringDelim::quoted("'"),
];

pub static PROFILE: Lazy<Profile> = Lazy::new(|| Profile {
    language: Language::Go,
    syntax: Syntax {
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        strings: STRINGS,
        char_literals: false,
    },
    body_style: BodyStyle::Braces,
    package_scope: PackageScope::Directory,
    annotation_prefixes: &[],
    keywords: KEYWORDS,
    implicit_roots: &["init", "main"],
    module_separator: "/",
    definitions: vec![
        DefinitionRule::new(
            SymbolKind::Function,
            r"^func\s+(?:\([^)]*\)\s*)?(?P<name>[A-Za-z_]\w*)",
            VisibilityRule::Capitalized,
        ),
        DefinitionRule::new(
            SymbolKind::Class,
            r"^type\s+(?P<name>[A-Za-z_]\w*)\b",
            VisibilityRule::Capitalized,
        ),
        DefinitionRule::new(
            SymbolKind::ExportedConstant,
            r"^(?:const|var)\s+(?P<name>[A-Z]\w*)",
            VisibilityRule::Capitalized,
        ),
    ],
    import_start: Regex::new(r"^\s*import\b").unwrap(),
    imports: match_imports,
    dynamic: vec![
        Regex::new(r#"\.MethodByName\(\s*"(?P<target>\w+)""#).unwrap(),
        Regex::new(r#"\.FieldByName\(\s*"(?P<target>\w+)""#).unwrap(),
        Regex::new(r#"plugin\.Open\(\s*"(?P<target>[^"]+)""#).unwrap(),
    ],
    resolve: resolve_module,
});

static IMPORT_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:[\w.]+\s+)?"(?P<path>[^"]+)""#).unwrap());

fn match_imports(statement: &str) -> Vec<ImportMatch> {
    let Some(body) = statement.trim_start().strip_prefix("import") else {
        return Vec::new();
    };
    // A Go import brings in the whole package
    IMPORT_SPEC
        .captures_iter(body)
        .map(|caps| ImportMatch::module(&caps["path"]).with_wildcard())
        .collect()
}

fn resolve_module(_importing: &Path, import: &ImportMatch) -> Vec<ModuleTarget> {
    vec![ModuleTarget::Package(PathBuf::from(&import.module))]
}
