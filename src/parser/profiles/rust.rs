use crate::discovery::Language;
use crate::graph::{ImportMatch, SymbolKind, Visibility};
use crate::parser::lexer::{StringDelim, Syntax};
use crate::parser::profile::{
    normalize_path, parent_dir, BodyStyle, DefinitionRule, ModuleTarget, PackageScope, Profile,
    VisibilityRule,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const VIS: &str = r"(?P<vis>pub(?:\s*\([^)]*\))?\s+)?";

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "union",
];

fn visibility() -> VisibilityRule {
    VisibilityRule::Keyword {
        public: &["pub"],
        private: &["pub(crate)", "pub(super)", "pub(self)", "pub(in"],
        otherwise: Visibility::Private,
    }
}

const STRINGS: &[StringDelim] = &[
    StringDelim::paired("r#\"", "\"#").multiline().raw(),
    StringDelim::quoted("\"").multiline(),
];

pub static PROFILE: Lazy<Profile> = Lazy::new(|| Profile {
    language: Language::Rust,
    syntax: Syntax {
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        strings: STRINGS,
        char_literals: true,
    },
    body_style: BodyStyle::Braces,
    package_scope: PackageScope::File,
    annotation_prefixes: &["#["],
    keywords: KEYWORDS,
    implicit_roots: &[],
    module_separator: "::",
    definitions: vec![
        DefinitionRule::new(
            SymbolKind::Function,
            &format!(
                r#"^\s*{}(?:default\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+(?P<name>[A-Za-z_]\w*)"#,
                VIS
            ),
            visibility(),
        ),
        DefinitionRule::new(
            SymbolKind::Class,
            &format!(
                r"^\s*{}(?:unsafe\s+)?(?:struct|enum|union|trait)\s+(?P<name>[A-Za-z_]\w*)",
                VIS
            ),
            visibility(),
        ),
        DefinitionRule::new(
            SymbolKind::Class,
            r"^\s*(?:unsafe\s+)?impl(?:\s*<[^{]*?>)?\s+(?:!?[\w:]+(?:<[^{]*?>)?\s+for\s+)?(?:\w+::)*(?P<name>[A-Za-z_]\w*)",
            VisibilityRule::Fixed(Visibility::Unknown),
        )
        .companion(),
        DefinitionRule::new(
            SymbolKind::ExportedConstant,
            &format!(
                r"^\s*{}(?:const|static)\s+(?:mut\s+)?(?P<name>[A-Z_][A-Z0-9_]*)\s*:",
                VIS
            ),
            visibility(),
        ),
        DefinitionRule::new(
            SymbolKind::Module,
            &format!(r"^\s*{}mod\s+(?P<name>[A-Za-z_]\w*)\s*\{{", VIS),
            visibility(),
        ),
        DefinitionRule::new(
            SymbolKind::Function,
            r"^\s*macro_rules!\s*(?P<name>[A-Za-z_]\w*)",
            VisibilityRule::Fixed(Visibility::Unknown),
        ),
    ],
    import_start: Regex::new(
        r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?(?:use\s|mod\s+\w+\s*;|extern\s+crate\s)",
    )
    .unwrap(),
    imports: match_imports,
    dynamic: Vec::new(),
    resolve: resolve_module,
});

static MOD_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?mod\s+(?P<name>\w+)\s*;").unwrap()
});

static EXTERN_CRATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*extern\s+crate\s+(?P<name>\w+)").unwrap());

static USE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?use\s+(?P<tree>[^;]+);?").unwrap()
});

fn match_imports(statement: &str) -> Vec<ImportMatch> {
    if let Some(caps) = MOD_DECL.captures(statement) {
        return vec![ImportMatch::module(format!("self::{}", &caps["name"]))];
    }
    if let Some(caps) = EXTERN_CRATE.captures(statement) {
        return vec![ImportMatch::module(&caps["name"])];
    }
    let Some(caps) = USE_DECL.captures(statement) else {
        return Vec::new();
    };

    // Group expanded paths by module so `use a::{b, c}` yields one import
    let mut grouped: BTreeMap<String, ImportMatch> = BTreeMap::new();
    for path in expand_use_tree("", &caps["tree"]) {
        let segments: Vec<&str> = path.split("::").filter(|s| !s.is_empty()).collect();
        let Some((last, prefix)) = segments.split_last() else {
            continue;
        };
        if prefix.is_empty() {
            grouped
                .entry(last.to_string())
                .or_insert_with(|| ImportMatch::module(*last));
            continue;
        }
        let module = prefix.join("::");
        let entry = grouped
            .entry(module.clone())
            .or_insert_with(|| ImportMatch::module(module));
        match *last {
            "*" => entry.wildcard = true,
            "self" => {}
            name => entry.names.push(name.to_string()),
        }
    }
    grouped.into_values().collect()
}

/// Flatten `a::{b, c::{d, e as f}}` into full paths
fn expand_use_tree(prefix: &str, tree: &str) -> Vec<String> {
    let tree = tree.trim();
    let Some(open) = tree.find('{') else {
        let path = tree.split(" as ").next().unwrap_or(tree).trim();
        return vec![join(prefix, path)];
    };

    let head = tree[..open].trim().trim_end_matches("::");
    let body = &tree[open + 1..];
    let body = body.rfind('}').map(|close| &body[..close]).unwrap_or(body);
    let base = join(prefix, head);

    split_top_level(body)
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .flat_map(|item| expand_use_tree(&base, item))
        .collect()
}

fn join(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}::{}", prefix, path),
    }
}

fn split_top_level(body: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (idx, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            ',' if depth == 0 => {
                items.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    items.push(&body[start..]);
    items
}

/// Directory holding the children of the module defined by `file`
fn module_dir(file: &Path) -> PathBuf {
    let dir = parent_dir(file);
    match file.file_stem().and_then(|s| s.to_str()) {
        Some("mod") | Some("lib") | Some("main") | None => dir,
        Some(stem) => dir.join(stem),
    }
}

/// The `src` directory above `file`, if there is one
fn crate_root(file: &Path) -> Option<PathBuf> {
    file.ancestors()
        .skip(1)
        .find(|dir| dir.file_name().map(|n| n == "src").unwrap_or(false))
        .map(Path::to_path_buf)
}

fn resolve_module(importing: &Path, import: &ImportMatch) -> Vec<ModuleTarget> {
    let segments: Vec<&str> = import.module.split("::").filter(|s| !s.is_empty()).collect();
    let Some((first, rest)) = segments.split_first() else {
        return Vec::new();
    };

    let (base, rest, exact) = match *first {
        "self" => (module_dir(importing), rest, true),
        "super" => {
            let mut base = module_dir(importing);
            let mut rest = rest;
            base.pop();
            while let Some(("super", tail)) = rest.split_first().map(|(h, t)| (*h, t)) {
                base.pop();
                rest = tail;
            }
            (base, rest, true)
        }
        "crate" => match crate_root(importing) {
            Some(root) => (root, rest, true),
            None => (PathBuf::new(), rest, false),
        },
        // External crate or a 2015-style local path
        _ => match crate_root(importing) {
            Some(root) => (root, &segments[..], true),
            None => (PathBuf::new(), &segments[..], false),
        },
    };

    // Every prefix is a candidate: the item may live in an inline module of an ancestor file
    let mut targets = Vec::new();
    let mut path = base;
    for segment in rest {
        path.push(segment);
        let as_file = normalize_path(&path.with_extension("rs"));
        let as_dir = normalize_path(&path.join("mod.rs"));
        if exact {
            targets.push(ModuleTarget::Exact(as_file));
            targets.push(ModuleTarget::Exact(as_dir));
        } else {
            targets.push(ModuleTarget::Suffix(as_file));
            targets.push(ModuleTarget::Suffix(as_dir));
        }
    }
    targets
}
