use std::fmt;

use crate::types::{FactorError, Result};

// ---------------------------------------------------------------------------
// StatementTemplate: phrase text with `$placeholder` slots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    /// Literal text as written, `$$` escapes included.
    Text(String),
    Placeholder { name: String, braced: bool },
}

/// Phrase text with placeholders for the terms of a statement.
///
/// Placeholders are written `$name` or `${name}`; `$$` is a literal dollar
/// sign. Each distinct placeholder is one role, numbered by first
/// appearance. The word "were" directly after a placeholder is stored as
/// "was" and only turned back into "were" when a plural term is rendered
/// into that slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementTemplate {
    segments: Vec<Segment>,
    placeholders: Vec<String>,
}

impl StatementTemplate {
    pub fn new(text: &str) -> Self {
        let mut segments = parse_segments(text);
        make_singular(&mut segments);

        let mut placeholders: Vec<String> = Vec::new();
        for segment in &segments {
            if let Segment::Placeholder { name, .. } = segment {
                if !placeholders.contains(name) {
                    placeholders.push(name.clone());
                }
            }
        }
        StatementTemplate { segments, placeholders }
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// The template text, after "were" normalization.
    pub fn content(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder { name, braced: true } => {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                }
                Segment::Placeholder { name, braced: false } => {
                    out.push('$');
                    out.push_str(name);
                }
            }
        }
        out
    }

    /// Template text with each placeholder replaced by `{}`. Two templates
    /// that differ only in placeholder names give the same string.
    pub fn content_without_placeholders(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(&unescape(text)),
                Segment::Placeholder { .. } => out.push_str("{}"),
            }
        }
        out
    }

    /// Fill each role with its `(text, plural)` pair. A plural term turns
    /// the "was" following its placeholder into "were".
    pub fn render(&self, terms: &[(String, bool)]) -> Result<String> {
        if terms.len() != self.placeholders.len() {
            return Err(FactorError::Construction(format!(
                "expected {} terms for template '{}', got {}",
                self.placeholders.len(),
                self.content(),
                terms.len()
            )));
        }

        let mut out = String::new();
        let mut plural_before = false;
        for segment in &self.segments {
            match segment {
                Segment::Placeholder { name, .. } => {
                    let index = self.role_index(name);
                    let (text, plural) = &terms[index];
                    out.push_str(text);
                    plural_before = *plural;
                }
                Segment::Text(text) => {
                    let text = unescape(text);
                    match text.strip_prefix(" was") {
                        Some(rest) if plural_before && at_word_end(rest) => {
                            out.push_str(" were");
                            out.push_str(rest);
                        }
                        _ => out.push_str(&text),
                    }
                    plural_before = false;
                }
            }
        }
        Ok(out)
    }

    fn role_index(&self, name: &str) -> usize {
        self.placeholders
            .iter()
            .position(|p| p == name)
            .unwrap_or_default()
    }
}

impl fmt::Display for StatementTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatementTemplate(\"{}\")", self.content())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn at_word_end(rest: &str) -> bool {
    rest.chars().next().map_or(true, |c| !is_ident_char(c))
}

fn unescape(text: &str) -> String {
    text.replace("$$", "$")
}

fn parse_segments(text: &str) -> Vec<Segment> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '$' {
            literal.push(chars[i]);
            i += 1;
            continue;
        }
        match chars.get(i + 1) {
            Some('$') => {
                literal.push_str("$$");
                i += 2;
            }
            Some('{') => {
                let close = chars[i + 2..].iter().position(|&c| c == '}');
                let name: Option<String> =
                    close.map(|len| chars[i + 2..i + 2 + len].iter().collect());
                match (close, name) {
                    (Some(len), Some(name)) if valid_identifier(&name) => {
                        flush(&mut literal, &mut segments);
                        segments.push(Segment::Placeholder { name, braced: true });
                        i += len + 3;
                    }
                    _ => {
                        literal.push('$');
                        i += 1;
                    }
                }
            }
            Some(&c) if is_ident_start(c) => {
                let mut end = i + 1;
                while end < chars.len() && is_ident_char(chars[end]) {
                    end += 1;
                }
                flush(&mut literal, &mut segments);
                segments.push(Segment::Placeholder {
                    name: chars[i + 1..end].iter().collect(),
                    braced: false,
                });
                i = end;
            }
            _ => {
                literal.push('$');
                i += 1;
            }
        }
    }
    flush(&mut literal, &mut segments);
    segments
}

fn flush(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Text(std::mem::take(literal)));
    }
}

fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().map_or(false, is_ident_start) && chars.all(is_ident_char)
}

/// "$group were" → "$group was".
fn make_singular(segments: &mut [Segment]) {
    for i in 1..segments.len() {
        if !matches!(segments[i - 1], Segment::Placeholder { .. }) {
            continue;
        }
        if let Segment::Text(text) = &mut segments[i] {
            if let Some(rest) = text.strip_prefix(" were") {
                if at_word_end(rest) {
                    *text = format!(" was{}", rest);
                }
            }
        }
    }
}
