//! Lexical scanners used by the migration rewrites
//!
//! These walk source bytes with an explicit depth counter. Every
//! delimiter of interest is ASCII, so byte indices returned here are
//! always valid `str` boundaries.

/// A `#[derive(...)]` attribute found in source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derive {
    /// Index of the leading `#`
    pub start: usize,
    /// Index one past the closing `]`
    pub end: usize,
    pub items: Vec<String>,
}

const DERIVE_OPEN: &str = "#[derive(";

/// Parse a derive attribute beginning exactly at `at`.
///
/// Items may span lines; trailing commas are tolerated.
pub fn parse_derive(code: &str, at: usize) -> Option<Derive> {
    if !code.get(at..)?.starts_with(DERIVE_OPEN) {
        return None;
    }
    let list_start = at + DERIVE_OPEN.len();
    let close = list_start + code[list_start..].find(')')?;
    let bracket = skip_ws(code, close + 1);
    if code.as_bytes().get(bracket) != Some(&b']') {
        return None;
    }

    let items = code[list_start..close]
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();

    Some(Derive {
        start: at,
        end: bracket + 1,
        items,
    })
}

/// All well-formed derive attributes in `code`, in source order
pub fn find_derives(code: &str) -> Vec<Derive> {
    code.match_indices(DERIVE_OPEN)
        .filter_map(|(at, _)| parse_derive(code, at))
        .collect()
}

/// A derive attribute whose closing `]` is followed only by whitespace up to `before`
pub fn derive_ending_at(code: &str, before: usize) -> Option<Derive> {
    let trimmed = code[..before].trim_end();
    let at = trimmed.rfind(DERIVE_OPEN)?;
    parse_derive(code, at).filter(|d| d.end == trimmed.len())
}

pub fn render_derive(items: &[String]) -> String {
    format!("#[derive({})]", items.join(", "))
}

/// Whether a derive item names `name`, with or without a path prefix
pub fn is_named(item: &str, name: &str) -> bool {
    item.rsplit("::").next().map(str::trim) == Some(name)
}

pub fn skip_ws(code: &str, mut i: usize) -> usize {
    let bytes = code.as_bytes();
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Index just past `word` at `i`, if `word` appears there as a whole identifier
pub fn expect_word(code: &str, i: usize, word: &str) -> Option<usize> {
    if !code.get(i..)?.starts_with(word) {
        return None;
    }
    let end = i + word.len();
    match code.as_bytes().get(end) {
        Some(&b) if is_ident_byte(b) => None,
        _ => Some(end),
    }
}

pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Index one past the delimiter matching the `open` byte at `start`.
///
/// String literals, raw strings, character literals and comments are
/// stepped over, so delimiters inside them do not count. Returns `None`
/// when the block is unterminated.
pub fn find_closing(code: &str, start: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = code.as_bytes();
    if bytes.get(start) != Some(&open) {
        return None;
    }

    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = code[i..].find('\n').map_or(bytes.len(), |n| i + n + 1);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i)?;
                continue;
            }
            b'"' => {
                i = skip_string(bytes, i + 1)?;
                continue;
            }
            b'r' if starts_raw_string(bytes, i) => {
                i = skip_raw_string(bytes, i + 1)?;
                continue;
            }
            b'\'' => {
                i = skip_char_literal(code, i);
                continue;
            }
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split a comma-separated list at depth zero of `{}` nesting
pub fn split_top_level(list: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in list.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn skip_block_comment(bytes: &[u8], start: usize) -> Option<usize> {
    // block comments nest in Rust
    let mut depth = 0usize;
    let mut i = start;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'*') => {
                depth += 1;
                i += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

fn skip_string(bytes: &[u8], mut i: usize) -> Option<usize> {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn starts_raw_string(bytes: &[u8], i: usize) -> bool {
    let standalone = i == 0 || !is_ident_byte(bytes[i - 1]) || (bytes[i - 1] == b'b' && (i == 1 || !is_ident_byte(bytes[i - 2])));
    if !standalone {
        return false;
    }
    let mut j = i + 1;
    while bytes.get(j) == Some(&b'#') {
        j += 1;
    }
    bytes.get(j) == Some(&b'"')
}

fn skip_raw_string(bytes: &[u8], mut i: usize) -> Option<usize> {
    let mut hashes = 0;
    while bytes.get(i) == Some(&b'#') {
        hashes += 1;
        i += 1;
    }
    // opening quote
    i += 1;
    while i < bytes.len() {
        if bytes[i] == b'"' && (1..=hashes).all(|k| bytes.get(i + k) == Some(&b'#')) {
            return Some(i + 1 + hashes);
        }
        i += 1;
    }
    None
}

/// Step over a character literal, or just the quote of a lifetime
fn skip_char_literal(code: &str, quote: usize) -> usize {
    let bytes = code.as_bytes();
    if bytes.get(quote + 1) == Some(&b'\\') {
        return code
            .get(quote + 3..)
            .and_then(|rest| rest.find('\''))
            .map_or(quote + 1, |n| quote + 3 + n + 1);
    }
    match code.get(quote + 1..).and_then(|rest| rest.chars().next()) {
        Some(c) if bytes.get(quote + 1 + c.len_utf8()) == Some(&b'\'') => quote + 2 + c.len_utf8(),
        _ => quote + 1,
    }
}
