use super::common::FileExtraction;
use super::lexer::{identifiers, strip_lines, tokenize, LineView};
use super::profile::{profile_for, BodyStyle, Profile};
use crate::discovery::SourceFile;
use crate::graph::{Span, Symbol, SymbolKind, UnresolvedReference};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Lines joined when looking for the end of a bracketed statement
const MAX_STATEMENT_LINES: usize = 50;

/// Line endings that continue a declaration header onto the next line
const CONTINUATIONS: &[&str] = &[
    ",", "(", "[", "=", "=>", "->", ":", "+", "-", "*", "&&", "||", ".", "<", "?", "|",
];

/// Next-line starts that continue a declaration header
const LEADING_CONTINUATIONS: &[&str] = &[
    "{", "where", "->", ":", "=", ".", "|", "throws", "extends", "implements",
];

static INLINE_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@[\w.]+(?:\([^)]*\))?\s*").unwrap());

/// Extract symbols and unresolved references from a file
pub fn extract(file: &SourceFile) -> FileExtraction {
    if file.undecodable {
        return FileExtraction::opaque();
    }
    match profile_for(file.language) {
        Some(profile) => SymbolExtractor::new(profile).extract(file),
        None => FileExtraction::opaque(),
    }
}

/// Drives one language profile over a file's lines
pub struct SymbolExtractor<'p> {
    profile: &'p Profile,
}

impl<'p> SymbolExtractor<'p> {
    pub fn new(profile: &'p Profile) -> Self {
        Self { profile }
    }

    pub fn extract(&self, file: &SourceFile) -> FileExtraction {
        let views = strip_lines(&self.profile.syntax, &file.lines);
        let mut result = FileExtraction::new();
        let mut import_lines = vec![false; views.len()];
        let mut declaring: HashMap<usize, String> = HashMap::new();
        let mut pending_annotations: Vec<String> = Vec::new();

        let mut idx = 0;
        while idx < views.len() {
            let view = &views[idx];
            let trimmed = view.text.trim();
            if trimmed.is_empty() {
                idx += 1;
                continue;
            }

            if self.profile.is_import_start(&view.text) {
                let end = statement_end(&views, idx);
                let imports = self.profile.match_imports(&join_text(&views, idx, end));
                if !imports.is_empty() {
                    for import in imports {
                        result.references.push(UnresolvedReference::Import {
                            line: idx + 1,
                            import,
                        });
                    }
                    import_lines[idx..=end].iter_mut().for_each(|l| *l = true);
                    pending_annotations.clear();
                    idx = end + 1;
                    continue;
                }
            }

            if let Some(def) = self.profile.match_definition(&view.code) {
                let end = match self.profile.body_style {
                    BodyStyle::Braces => brace_end(&views, idx),
                    BodyStyle::Indentation => indent_end(&views, idx),
                };

                let mut annotations = std::mem::take(&mut pending_annotations);
                annotations.extend(self.inline_annotations(trimmed));

                let mut symbol = Symbol::new(
                    file.path.clone(),
                    def.name.clone(),
                    def.kind,
                    Span::new(idx + 1, end + 1),
                    file.language,
                );
                symbol.visibility = def.visibility;
                symbol.annotations = annotations;
                symbol.companion = def.companion;
                if def.kind == SymbolKind::Function {
                    symbol.signature = signature(&views, idx, def.name_end);
                }
                symbol.body_tokens = body_tokens(&views, idx, end, &def.name);

                declaring.insert(idx, def.name);
                result.symbols.push(symbol);
                idx += 1;
                continue;
            }

            if self.is_annotation(trimmed) {
                let end = statement_end(&views, idx);
                pending_annotations.push(join_text(&views, idx, end).trim().to_string());
                idx = end + 1;
                continue;
            }

            pending_annotations.clear();
            idx += 1;
        }

        assign_parents(&mut result.symbols);

        for (idx, view) in views.iter().enumerate() {
            if import_lines[idx] {
                continue;
            }
            self.collect_references(idx, view, declaring.get(&idx), &mut result.references);
        }

        result
    }

    fn is_annotation(&self, trimmed: &str) -> bool {
        self.profile
            .annotation_prefixes
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
    }

    /// `@Override public void run()` carries its annotations on the declaration line
    fn inline_annotations(&self, trimmed: &str) -> Vec<String> {
        if !self.profile.annotation_prefixes.contains(&"@") {
            return Vec::new();
        }
        let mut found = Vec::new();
        let mut rest = trimmed;
        while let Some(m) = INLINE_ANNOTATION.find(rest) {
            found.push(m.as_str().trim().to_string());
            rest = &rest[m.end()..];
        }
        // A lone annotation line is handled by the caller
        if rest.is_empty() {
            Vec::new()
        } else {
            found
        }
    }

    fn collect_references(
        &self,
        idx: usize,
        view: &LineView,
        declared: Option<&String>,
        references: &mut Vec<UnresolvedReference>,
    ) {
        let line = idx + 1;
        let dynamic = self.profile.match_dynamic(&view.text);

        for literal in &view.strings {
            if dynamic.iter().any(|target| target == literal) {
                continue;
            }
            if is_mention_candidate(literal) {
                references.push(UnresolvedReference::StringLiteral {
                    line,
                    value: literal.clone(),
                });
            }
        }

        for target in dynamic {
            references.push(UnresolvedReference::DynamicLoad { line, target });
        }

        let mut skip = declared.map(String::as_str);
        for (_, name) in identifiers(&view.code) {
            if self.profile.is_keyword(name) {
                continue;
            }
            if skip == Some(name) {
                skip = None;
                continue;
            }
            references.push(UnresolvedReference::Identifier {
                line,
                name: name.to_string(),
            });
        }
    }
}

/// Literals that could name a symbol or a file
fn is_mention_candidate(literal: &str) -> bool {
    (2..=200).contains(&literal.len())
        && literal.chars().any(|c| c.is_alphabetic())
        && literal
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '/' | ':' | '-'))
}

fn bracket_delta(code: &str) -> i32 {
    code.chars().fold(0, |depth, c| match c {
        '(' | '[' | '{' => depth + 1,
        ')' | ']' | '}' => depth - 1,
        _ => depth,
    })
}

/// Last line of a statement whose brackets open on `start`
fn statement_end(views: &[LineView], start: usize) -> usize {
    let limit = (start + MAX_STATEMENT_LINES).min(views.len());
    let mut depth = 0;
    for (j, view) in views.iter().enumerate().take(limit).skip(start) {
        depth += bracket_delta(&view.code);
        if depth <= 0 {
            return j;
        }
    }
    limit.saturating_sub(1).max(start)
}

fn join_text(views: &[LineView], start: usize, end: usize) -> String {
    views[start..=end]
        .iter()
        .map(|v| v.text.trim())
        .collect::<Vec<_>>()
        .join(" ")
}

fn continues(code: &str) -> bool {
    let trimmed = code.trim_end();
    CONTINUATIONS.iter().any(|c| trimmed.ends_with(c))
}

fn next_line_continues(views: &[LineView], j: usize) -> bool {
    views[j + 1..]
        .iter()
        .map(|v| v.code.trim())
        .find(|code| !code.is_empty())
        .map(|code| LEADING_CONTINUATIONS.iter().any(|c| code.starts_with(c)))
        .unwrap_or(false)
}

/// End of a brace-delimited declaration: the closing brace, a `;` before any
/// body, or a header line that does not continue
fn brace_end(views: &[LineView], start: usize) -> usize {
    let mut depth = 0i32;
    let mut nesting = 0i32;
    let mut opened = false;

    for j in start..views.len() {
        for c in views[j].code.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => {
                    depth -= 1;
                    if opened && depth <= 0 {
                        return j;
                    }
                }
                '(' | '[' => nesting += 1,
                ')' | ']' => nesting -= 1,
                ';' if !opened && nesting <= 0 => return j,
                _ => {}
            }
        }

        let header_done = !opened
            && nesting <= 0
            && !views[j].code.trim().is_empty()
            && !continues(&views[j].code);
        if header_done && !next_line_continues(views, j) {
            return j;
        }
    }
    views.len().saturating_sub(1).max(start)
}

fn indent_of(text: &str) -> usize {
    text.chars().take_while(|c| c.is_whitespace()).count()
}

/// End of an indentation-delimited declaration
fn indent_end(views: &[LineView], start: usize) -> usize {
    let base = indent_of(&views[start].code);

    let mut nesting = 0;
    let mut header_end = start;
    for (j, view) in views.iter().enumerate().skip(start) {
        nesting += bracket_delta(&view.code);
        header_end = j;
        if nesting <= 0 {
            break;
        }
    }
    if !views[header_end].code.trim_end().ends_with(':') {
        return header_end;
    }

    let mut last = header_end;
    let mut nesting = 0;
    for (j, view) in views.iter().enumerate().skip(header_end + 1) {
        let code = view.code.trim();
        if code.is_empty() {
            // Lines inside a multi-line string belong to the body
            if !view.text.trim().is_empty() {
                last = j;
            }
            continue;
        }
        if nesting <= 0 && indent_of(&view.code) <= base {
            break;
        }
        nesting += bracket_delta(code);
        last = j;
    }
    last
}

/// Parameter list following the declared name, whitespace-normalized
fn signature(views: &[LineView], start: usize, name_end: usize) -> Option<String> {
    let first = views[start].code.get(name_end..)?;
    let open = first.find('(')?;

    let mut params = String::new();
    let mut depth = 1;
    let limit = (start + MAX_STATEMENT_LINES).min(views.len());
    for j in start..limit {
        let chunk = if j == start {
            &first[open + 1..]
        } else {
            views[j].code.as_str()
        };
        for c in chunk.chars() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let normalized = params.split_whitespace().collect::<Vec<_>>().join(" ");
                        return Some(format!("({})", normalized));
                    }
                }
                _ => {}
            }
            params.push(c);
        }
        params.push(' ');
    }
    None
}

/// Comparison tokens of a declaration, own name masked
fn body_tokens(views: &[LineView], start: usize, end: usize, name: &str) -> Vec<String> {
    let text = views[start..=end]
        .iter()
        .map(|v| v.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    tokenize(&text)
        .into_iter()
        .map(|token| {
            if token == name {
                "$name".to_string()
            } else {
                token
            }
        })
        .collect()
}

/// Point each symbol at the innermost symbol whose span encloses it
fn assign_parents(symbols: &mut [Symbol]) {
    let parents: Vec<_> = symbols
        .iter()
        .map(|symbol| {
            symbols
                .iter()
                .filter(|other| {
                    other.span.start_line < symbol.span.start_line
                        && symbol.span.end_line <= other.span.end_line
                })
                .min_by_key(|other| other.span.len())
                .map(Symbol::id)
        })
        .collect();
    for (symbol, parent) in symbols.iter_mut().zip(parents) {
        symbol.parent = parent;
    }
}
