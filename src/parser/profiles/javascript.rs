use crate::discovery::Language;
use crate::graph::{ImportMatch, SymbolKind, Visibility};
use crate::parser::lexer::{StringDelim, Syntax};
use crate::parser::profile::{
    normalize_path, parent_dir, BodyStyle, DefinitionRule, ModuleTarget, PackageScope, Profile,
    VisibilityRule,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

const JS_KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "export", "extends", "false", "finally", "for", "from",
    "function", "get", "if", "import", "in", "instanceof", "let", "new", "null", "of", "return",
    "set", "static", "super", "switch", "this", "throw", "true", "try", "typeof", "undefined",
    "var", "void", "while", "with", "yield",
];

const TS_KEYWORDS: &[&str] = &[
    "abstract", "any", "as", "async", "await", "boolean", "break", "case", "catch", "class",
    "const", "constructor", "continue", "declare", "default", "delete", "do", "else", "enum",
    "export", "extends", "false", "finally", "for", "from", "function", "get", "if",
    "implements", "import", "in", "instanceof", "interface", "keyof", "let", "namespace", "never",
    "new", "null", "number", "of", "private", "protected", "public", "readonly", "return", "set",
    "static", "string", "super", "switch", "this", "throw", "true", "try", "type", "typeof",
    "undefined", "unknown", "var", "void", "while", "with", "yield",
];

const EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"];

const IDENT: &str = r"[A-Za-z_$][\w$]*";

fn exported() -> VisibilityRule {
    VisibilityRule::Keyword {
        public: &["export"],
        private: &[],
        otherwise: Visibility::Private,
    }
}

const STRINGS: &[StringDelim] = &[
    StringDelim::quoted("`").multiline().interpolating(),
    StringDelim::quoted("\""),
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

fn common_definitions() -> Vec<DefinitionRule> {
    vec![
        DefinitionRule::new(
            SymbolKind::Function,
            &format!(
                r"^\s*(?P<vis>export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>{})",
                IDENT
            ),
            exported(),
        ),
        DefinitionRule::new(
            SymbolKind::Class,
            &format!(
                r"^\s*(?P<vis>export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(?P<name>{})",
                IDENT
            ),
            exported(),
        ),
        DefinitionRule::new(
            SymbolKind::Function,
            &format!(
                r"^\s*(?P<vis>export\s+)?(?:const|let|var)\s+(?P<name>{id})\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|{id}\s*=>|\($)",
                id = IDENT
            ),
            exported(),
        ),
        DefinitionRule::new(
            SymbolKind::ExportedConstant,
            &format!(r"^\s*(?P<vis>export\s+)(?:const|let|var)\s+(?P<name>{})", IDENT),
            exported(),
        ),
        // Class members: indented `name(args) {`
        DefinitionRule::new(
            SymbolKind::Function,
            &format!(
                r"^\s+(?P<vis>(?:(?:public|private|protected|static|async|readonly|override|get|set)\s+)*)\*?(?P<name>{})\s*\([^)]*\)\s*(?::\s*[^{{=;]+)?\{{",
                IDENT
            ),
            VisibilityRule::Keyword {
                public: &["public"],
                private: &["private", "protected"],
                otherwise: Visibility::Unknown,
            },
        ),
    ]
}

fn typescript_definitions() -> Vec<DefinitionRule> {
    let mut rules = common_definitions();
    rules.extend([
        DefinitionRule::new(
            SymbolKind::Class,
            &format!(
                r"^\s*(?P<vis>export\s+)?(?:declare\s+)?(?:interface|enum|const\s+enum)\s+(?P<name>{})",
                IDENT
            ),
            exported(),
        ),
        DefinitionRule::new(
            SymbolKind::Class,
            &format!(
                r"^\s*(?P<vis>export\s+)?(?:declare\s+)?type\s+(?P<name>{})\s*(?:<[^=]*>)?\s*=",
                IDENT
            ),
            exported(),
        ),
        DefinitionRule::new(
            SymbolKind::Module,
            &format!(
                r"^\s*(?P<vis>export\s+)?(?:declare\s+)?(?:namespace|module)\s+(?P<name>{})",
                IDENT
            ),
            exported(),
        ),
    ]);
    rules
}

fn import_start() -> Regex {
    Regex::new(r"^\s*(?:import[\s{*'\x22]|export\s+(?:type\s+)?(?:\*|\{)|(?:const|let|var)\s+[^=]+=\s*require\()")
        .unwrap()
}

fn dynamic() -> Vec<Regex> {
    vec![
        Regex::new(r#"\bimport\(\s*["'`](?P<target>[^"'`]+)["'`]\s*\)"#).unwrap(),
        Regex::new(r#"\brequire\(\s*`(?P<target>[^`]*\$\{[^`]*)`\s*\)"#).unwrap(),
        Regex::new(r#"\brequire\(\s*(?P<target>[A-Za-z_$][^)]*)\)"#).unwrap(),
    ]
}

pub static JAVASCRIPT: Lazy<Profile> = Lazy::new(|| Profile {
    language: Language::JavaScript,
    syntax: syntax(),
    body_style: BodyStyle::Braces,
    package_scope: PackageScope::File,
    annotation_prefixes: &["@"],
    keywords: JS_KEYWORDS,
    implicit_roots: &[],
    module_separator: "/",
    definitions: common_definitions(),
    import_start: import_start(),
    imports: match_imports,
    dynamic: dynamic(),
    resolve: resolve_module,
});

pub static TYPESCRIPT: Lazy<Profile> = Lazy::new(|| Profile {
    language: Language::TypeScript,
    syntax: syntax(),
    body_style: BodyStyle::Braces,
    package_scope: PackageScope::File,
    annotation_prefixes: &["@"],
    keywords: TS_KEYWORDS,
    implicit_roots: &[],
    module_separator: "/",
    definitions: typescript_definitions(),
    import_start: import_start(),
    imports: match_imports,
    dynamic: dynamic(),
    resolve: resolve_module,
});

static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*import\s+(?:type\s+)?(?P<clause>[\s\S]+?)\s+from\s+["'](?P<module>[^"']+)["']"#)
        .unwrap()
});

static IMPORT_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*import\s+["'](?P<module>[^"']+)["']"#).unwrap());

static EXPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*export\s+(?:type\s+)?(?P<clause>\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s+["'](?P<module>[^"']+)["']"#)
        .unwrap()
});

static REQUIRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:(?P<clause>\{[^}]*\}|[\w$]+)\s*=\s*)?require\(\s*["'](?P<module>[^"']+)["']\s*\)"#)
        .unwrap()
});

/// Parse `X, { a, b as c }`, `* as ns`, `{ a }` into an import
fn parse_clause(module: &str, clause: &str) -> ImportMatch {
    let mut import = ImportMatch::module(module);
    let clause = clause.trim();

    let (head, braced) = match clause.find('{') {
        Some(open) => (&clause[..open], Some(&clause[open..])),
        None => (clause, None),
    };

    for item in head.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if item.starts_with('*') {
            import.wildcard = true;
        } else {
            import.names.push(item.to_string());
        }
    }

    if let Some(braced) = braced {
        let inner = braced.trim_start_matches('{');
        let inner = inner.split('}').next().unwrap_or(inner);
        for item in inner.split(',') {
            let item = item.trim().trim_start_matches("type ").trim();
            let name = item.split(" as ").next().unwrap_or(item).trim();
            if !name.is_empty() {
                import.names.push(name.to_string());
            }
        }
    }
    import
}

fn match_imports(statement: &str) -> Vec<ImportMatch> {
    if let Some(caps) = IMPORT_FROM.captures(statement) {
        return vec![parse_clause(&caps["module"], &caps["clause"])];
    }
    if let Some(caps) = IMPORT_BARE.captures(statement) {
        return vec![ImportMatch::module(&caps["module"])];
    }
    if let Some(caps) = EXPORT_FROM.captures(statement) {
        return vec![parse_clause(&caps["module"], &caps["clause"])];
    }
    REQUIRE
        .captures_iter(statement)
        .map(|caps| match caps.name("clause") {
            Some(clause) if clause.as_str().starts_with('{') => {
                parse_clause(&caps["module"], clause.as_str())
            }
            _ => ImportMatch::module(&caps["module"]),
        })
        .collect()
}

fn resolve_module(importing: &Path, import: &ImportMatch) -> Vec<ModuleTarget> {
    let spec = import.module.as_str();

    if spec.starts_with('.') {
        let base = normalize_path(&parent_dir(importing).join(spec));
        let mut targets = vec![ModuleTarget::Exact(base.clone())];
        for ext in EXTENSIONS {
            targets.push(ModuleTarget::Exact(append_extension(&base, ext)));
        }
        for ext in EXTENSIONS {
            targets.push(ModuleTarget::Exact(base.join(format!("index.{}", ext))));
        }
        return targets;
    }

    // Path aliases (`@/lib/dates`, `~/lib/dates`) and bare specifiers
    let bare = spec
        .strip_prefix("@/")
        .or_else(|| spec.strip_prefix("~/"))
        .unwrap_or(spec);
    let base = PathBuf::from(bare);
    EXTENSIONS
        .iter()
        .map(|ext| ModuleTarget::Suffix(append_extension(&base, ext)))
        .collect()
}

/// `dates.util` + `ts` -> `dates.util.ts`, unlike `with_extension`
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}
