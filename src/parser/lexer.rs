//! Line-oriented comment and string stripping driven by a profile's syntax table

use once_cell::sync::Lazy;
use regex::Regex;

/// A string literal delimiter pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringDelim {
    pub open: &'static str,
    pub close: &'static str,
    /// May span lines
    pub multiline: bool,
    /// Backslash escapes the next character
    pub escapes: bool,
    /// `${expr}` segments are code
    pub interpolates: bool,
}

impl StringDelim {
    pub const fn quoted(quote: &'static str) -> Self {
        Self {
            open: quote,
            close: quote,
            multiline: false,
            escapes: true,
            interpolates: false,
        }
    }

    pub const fn paired(open: &'static str, close: &'static str) -> Self {
        Self {
            open,
            close,
            multiline: false,
            escapes: true,
            interpolates: false,
        }
    }

    pub const fn multiline(self) -> Self {
        Self {
            multiline: true,
            ..self
        }
    }

    pub const fn raw(self) -> Self {
        Self {
            escapes: false,
            ..self
        }
    }

    pub const fn interpolating(self) -> Self {
        Self {
            interpolates: true,
            ..self
        }
    }
}

/// Comment and literal syntax of one language
#[derive(Debug, Clone, Copy)]
pub struct Syntax {
    pub line_comments: &'static [&'static str],
    pub block_comment: Option<(&'static str, &'static str)>,
    /// Ordered longest opener first
    pub strings: &'static [StringDelim],
    /// `'x'` is a char literal, a lone `'` is a lifetime
    pub char_literals: bool,
}

/// One source line after stripping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineView {
    /// Comments removed, string literals kept verbatim
    pub text: String,
    /// Comments removed, string literal contents blanked
    pub code: String,
    /// Contents of string literals that close on this line
    pub strings: Vec<String>,
}

enum State {
    Code,
    BlockComment,
    Str { delim: StringDelim, buf: String },
}

fn starts_at(chars: &[char], i: usize, pattern: &str) -> bool {
    let mut at = i;
    for p in pattern.chars() {
        if chars.get(at) != Some(&p) {
            return false;
        }
        at += 1;
    }
    true
}

/// Strip every line of a file, carrying block comments and multi-line strings across lines
pub fn strip_lines(syntax: &Syntax, lines: &[String]) -> Vec<LineView> {
    let mut state = State::Code;
    let mut views = Vec::with_capacity(lines.len());

    for line in lines {
        let chars: Vec<char> = line.chars().collect();
        let mut view = LineView::default();
        let mut i = 0;

        'chars: while i < chars.len() {
            match &mut state {
                State::BlockComment => {
                    if let Some((_, close)) = syntax.block_comment {
                        if starts_at(&chars, i, close) {
                            i += close.chars().count();
                            state = State::Code;
                            continue;
                        }
                    }
                    i += 1;
                }
                State::Str { delim, buf } => {
                    let c = chars[i];
                    if delim.escapes && c == '\\' {
                        buf.push(c);
                        view.text.push(c);
                        if let Some(&next) = chars.get(i + 1) {
                            buf.push(next);
                            view.text.push(next);
                        }
                        i += 2;
                    } else if starts_at(&chars, i, delim.close) {
                        view.text.push_str(delim.close);
                        view.code.push_str(delim.close);
                        if delim.interpolates {
                            for segment in interpolated_segments(buf) {
                                view.code.push(' ');
                                view.code.push_str(&segment);
                            }
                        }
                        view.strings.push(std::mem::take(buf));
                        i += delim.close.chars().count();
                        state = State::Code;
                    } else {
                        buf.push(c);
                        view.text.push(c);
                        i += 1;
                    }
                }
                State::Code => {
                    if syntax.line_comments.iter().any(|p| starts_at(&chars, i, p)) {
                        break 'chars;
                    }
                    if let Some((open, _)) = syntax.block_comment {
                        if starts_at(&chars, i, open) {
                            view.text.push(' ');
                            view.code.push(' ');
                            i += open.chars().count();
                            state = State::BlockComment;
                            continue;
                        }
                    }
                    if syntax.char_literals && chars[i] == '\'' {
                        if let Some(len) = char_literal_len(&chars, i) {
                            view.text.extend(&chars[i..i + len]);
                            view.code.push_str("' '");
                            i += len;
                            continue;
                        }
                    }
                    if let Some(delim) = syntax.strings.iter().find(|d| starts_at(&chars, i, d.open)) {
                        view.text.push_str(delim.open);
                        view.code.push_str(delim.open);
                        i += delim.open.chars().count();
                        state = State::Str {
                            delim: *delim,
                            buf: String::new(),
                        };
                        continue;
                    }
                    view.text.push(chars[i]);
                    view.code.push(chars[i]);
                    i += 1;
                }
            }
        }

        // Single-line literals end with the line even when unterminated
        if let State::Str { delim, buf } = &mut state {
            if delim.multiline {
                buf.push('\n');
            } else {
                view.strings.push(std::mem::take(buf));
                state = State::Code;
            }
        }

        views.push(view);
    }

    views
}

/// Length of a `'x'` or `'\n'` literal starting at `i`, None for lifetimes
fn char_literal_len(chars: &[char], i: usize) -> Option<usize> {
    match chars.get(i + 1) {
        Some('\\') => (i + 3..chars.len().min(i + 12))
            .find(|&j| chars[j] == '\'')
            .map(|j| j - i + 1),
        Some(_) if chars.get(i + 2) == Some(&'\'') => Some(3),
        _ => None,
    }
}

/// Code inside `${...}` of an interpolating literal
fn interpolated_segments(literal: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut rest = literal;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let mut depth = 1;
        let mut end = None;
        for (idx, c) in after.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(idx);
                        break;
                    }
                }
                _ => {}
            }
        }
        match end {
            Some(end) => {
                segments.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    segments
}

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:\\.|[^"\\])*"|'(?:\\.|[^'\\])*'|`[^`]*`|[A-Za-z_$][A-Za-z0-9_$]*|\d[\d_]*(?:\.\d+)?|\S"#)
        .unwrap()
});

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").unwrap());

/// Split stripped text into comparison tokens; literals stay whole
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Identifier tokens of a code view, with their byte offsets
pub fn identifiers(code: &str) -> impl Iterator<Item = (usize, &str)> {
    IDENT.find_iter(code).filter_map(|m| {
        // Skip tails of numeric literals like 0x1f
        let preceded_by_digit = code[..m.start()]
            .chars()
            .next_back()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false);
        (!preceded_by_digit).then(|| (m.start(), m.as_str()))
    })
}
