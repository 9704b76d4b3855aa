use crate::discovery::Language;
use crate::graph::{ImportMatch, SymbolKind, Visibility};
use crate::parser::lexer::{StringDelim, Syntax};
use crate::parser::profile::{
    BodyStyle, DefinitionRule, ModuleTarget, PackageScope, Profile, VisibilityRule,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Inline annotations ahead of a declaration: `@Override public void run()`
const ANNOTATED: &str = r"^\s*(?:@[\w.]+(?:\([^)]*\))?\s+)*";

const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "package", "private", "protected", "public", "return", "short", "static",
    "strictfp", "super", "switch", "synchronized", "this", "throw", "throws", "transient", "try",
    "void", "volatile", "while", "true", "false", "null", "var", "record", "yield", "sealed",
    "permits",
];

const KOTLIN_KEYWORDS: &[&str] = &[
    "as", "break", "class", "continue", "do", "else", "false", "for", "fun", "if", "in",
    "interface", "is", "null", "object", "package", "return", "super", "this", "throw", "true",
    "try", "typealias", "typeof", "val", "var", "when", "while", "by", "catch", "constructor",
    "finally", "get", "import", "init", "set", "where", "abstract", "annotation", "companion",
    "const", "data", "enum", "external", "final", "infix", "inline", "inner", "internal",
    "lateinit", "open", "operator", "out", "override", "private", "protected", "public",
    "sealed", "suspend", "tailrec", "vararg", "it",
];

const SOURCE_EXTENSIONS: &[&str] = &["java", "kt", "kts"];

fn java_visibility() -> VisibilityRule {
    VisibilityRule::Keyword {
        public: &["public", "protected"],
        private: &["private"],
        otherwise: Visibility::Unknown,
    }
}

fn kotlin_visibility() -> VisibilityRule {
    VisibilityRule::Keyword {
        public: &["public", "protected"],
        private: &["private", "internal"],
        otherwise: Visibility::Public,
    }
}

const STRINGS: &[StringDelim] = &[
    StringDelim::quoted("\"\"\"").multiline().raw().interpolating(),
    StringDelim::quoted("\"").interpolating(),
    StringDelim::quoted("'"),
];

fn syntax() -> Syntax {
    Syntax {
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        strings: STRINGS,
        char_literals: false,
    }
}

fn dynamic() -> Vec<Regex> {
    vec![
        Regex::new(r#"Class\.forName\(\s*"(?P<target>[\w.$]+)""#).unwrap(),
        Regex::new(r#"\.get(?:Declared)?Method\(\s*"(?P<target>\w+)""#).unwrap(),
        Regex::new(r#"\.get(?:Declared)?Field\(\s*"(?P<target>\w+)""#).unwrap(),
        Regex::new(r#"\.loadClass\(\s*"(?P<target>[\w.$]+)""#).unwrap(),
    ]
}

pub static JAVA: Lazy<Profile> = Lazy::new(|| Profile {
    language: Language::Java,
    syntax: syntax(),
    body_style: BodyStyle::Braces,
    package_scope: PackageScope::Directory,
    annotation_prefixes: &["@"],
    keywords: JAVA_KEYWORDS,
    implicit_roots: &[],
    module_separator: ".",
    definitions: vec![
        DefinitionRule::new(
            SymbolKind::Class,
            &format!(
                r"{}(?P<vis>(?:(?:public|private|protected|static|final|abstract|sealed|non-sealed|strictfp)\s+)*)(?:class|interface|enum|record|@interface)\s+(?P<name>[A-Za-z_]\w*)",
                ANNOTATED
            ),
            java_visibility(),
        ),
        DefinitionRule::new(
            SymbolKind::Function,
            &format!(
                r"{}(?P<vis>(?:(?:public|private|protected|static|final|abstract|synchronized|native|default|strictfp)\s+)*)(?:<[^>]+>\s+)?(?P<ty>[A-Za-z_][\w.]*(?:<[^()]*>)?(?:\[\])*)\s+(?P<name>[A-Za-z_]\w*)\s*\(",
                ANNOTATED
            ),
            java_visibility(),
        ),
        DefinitionRule::new(
            SymbolKind::ExportedConstant,
            &format!(
                r"{}(?P<vis>(?:(?:public|private|protected|static|final)\s+)*)[\w.<>\[\]]+\s+(?P<name>[A-Z][A-Z0-9_]*)\s*=",
                ANNOTATED
            ),
            java_visibility(),
        ),
    ],
    import_start: Regex::new(r"^\s*import\s").unwrap(),
    imports: match_imports,
    dynamic: dynamic(),
    resolve: resolve_module,
});

pub static KOTLIN: Lazy<Profile> = Lazy::new(|| Profile {
    language: Language::Kotlin,
    syntax: syntax(),
    body_style: BodyStyle::Braces,
    package_scope: PackageScope::Directory,
    annotation_prefixes: &["@"],
    keywords: KOTLIN_KEYWORDS,
    implicit_roots: &[],
    module_separator: ".",
    definitions: vec![
        DefinitionRule::new(
            SymbolKind::Class,
            &format!(
                r"{}(?P<vis>(?:(?:public|private|protected|internal|open|abstract|sealed|data|enum|inner|annotation|value|inline|final)\s+)*)(?:class|interface|object)\s+(?P<name>[A-Za-z_]\w*)",
                ANNOTATED
            ),
            kotlin_visibility(),
        ),
        DefinitionRule::new(
            SymbolKind::Function,
            &format!(
                r"{}(?P<vis>(?:(?:public|private|protected|internal|open|override|abstract|suspend|inline|operator|infix|tailrec|external|final)\s+)*)fun\s+(?:<[^>]+>\s+)?(?:[\w.<>?]+\.)?(?P<name>[A-Za-z_]\w*)\s*\(",
                ANNOTATED
            ),
            kotlin_visibility(),
        ),
        DefinitionRule::new(
            SymbolKind::ExportedConstant,
            &format!(
                r"{}(?P<vis>(?:(?:public|private|protected|internal)\s+)*)(?:const\s+)?val\s+(?P<name>[A-Z][A-Z0-9_]*)\s*(?::[^=]+)?=",
                ANNOTATED
            ),
            kotlin_visibility(),
        ),
    ],
    import_start: Regex::new(r"^\s*import\s").unwrap(),
    imports: match_imports,
    dynamic: dynamic(),
    resolve: resolve_module,
});

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*import\s+(?:static\s+)?(?P<path>[\w.`]+?)(?P<wild>\.\*)?\s*(?:as\s+\w+)?\s*;?\s*$")
        .unwrap()
});

fn match_imports(statement: &str) -> Vec<ImportMatch> {
    let Some(caps) = IMPORT.captures(statement) else {
        return Vec::new();
    };
    let path = caps["path"].replace('`', "");
    if caps.name("wild").is_some() {
        return vec![ImportMatch::module(path).with_wildcard()];
    }
    match path.rsplit_once('.') {
        Some((module, name)) => {
            vec![ImportMatch::module(module).with_names(vec![name.to_string()])]
        }
        None => vec![ImportMatch::module(path)],
    }
}

fn resolve_module(_importing: &Path, import: &ImportMatch) -> Vec<ModuleTarget> {
    let dir: PathBuf = import.module.split('.').collect();
    let mut targets = Vec::new();

    // `a.b.C` as a class file (static imports name a member of C)
    for ext in SOURCE_EXTENSIONS {
        targets.push(ModuleTarget::Suffix(dir.with_extension(ext)));
    }
    for name in &import.names {
        for ext in SOURCE_EXTENSIONS {
            targets.push(ModuleTarget::Suffix(dir.join(format!("{}.{}", name, ext))));
        }
    }
    // Top-level Kotlin declarations and wildcard imports live anywhere in the package
    targets.push(ModuleTarget::Package(dir));
    targets
}
