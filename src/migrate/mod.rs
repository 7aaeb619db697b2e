//! Source syntax migration for Rust contracts
//!
//! Normalizes contracts written against the `#[near_bindgen]` era of
//! near-sdk to the `#[near]` / `#[near(contract_state)]` form that
//! near-sdk 5 expects. Each rewrite is a structural text pattern, not a
//! parse; output is best effort and left for the compiler to judge.
//!
//! `migrate` is pure and idempotent.

mod scan;

use scan::{expect_word, find_closing, find_derives, is_named, parse_derive, render_derive, skip_ws};

const LEGACY_ATTR: &str = "#[near_bindgen]";
const LEGACY_NAME: &str = "near_bindgen";
const STATE_ATTR: &str = "#[near(contract_state)]";
const PANIC_ON_DEFAULT: &str = "PanicOnDefault";

/// Rewrite legacy contract syntax to the current form
pub fn migrate(source: &str) -> String {
    if is_current(source) {
        return source.to_string();
    }

    let code = rewrite_single_import(source);
    let code = rewrite_grouped_imports(&code);
    let code = ensure_panic_on_default_import(&code);
    let code = rewrite_contract_structs(&code);
    let code = remove_default_impl(&code);
    let code = replace_default_derives(&code);
    let code = strip_state_derives(&code);
    let code = collapse_semicolons(&code);
    let code = remove_unused_borsh_import(&code);
    let code = dedup_panic_on_default(&code);
    rewrite_impl_markers(&code)
}

/// Whether `source` already uses current syntax
pub fn is_current(source: &str) -> bool {
    source.contains(STATE_ATTR)
        || (source.contains("use near_sdk::near;") && !source.contains(LEGACY_NAME))
}

fn rewrite_single_import(code: &str) -> String {
    const LEGACY_IMPORT: &str = "use near_sdk::near_bindgen";

    let mut out = String::with_capacity(code.len());
    let mut rest = code;
    while let Some(pos) = rest.find(LEGACY_IMPORT) {
        out.push_str(&rest[..pos]);
        out.push_str("use near_sdk::near;");
        rest = &rest[pos + LEGACY_IMPORT.len()..];
        rest = rest.strip_prefix(';').unwrap_or(rest);
    }
    out.push_str(rest);
    out
}

/// `use near_sdk::{near_bindgen, env};` becomes `use near_sdk::{near, env};`
fn rewrite_grouped_imports(code: &str) -> String {
    const GROUP: &str = "use near_sdk::{";

    let mut out = String::with_capacity(code.len());
    let mut cursor = 0;
    while let Some(rel) = code[cursor..].find(GROUP) {
        let pos = cursor + rel;
        let open = pos + GROUP.len() - 1;
        let Some(close_end) = find_closing(code, open, b'{', b'}') else {
            break;
        };

        let items = scan::split_top_level(&code[open + 1..close_end - 1]);
        if !items.iter().any(|item| item == LEGACY_NAME) {
            out.push_str(&code[cursor..close_end]);
            cursor = close_end;
            continue;
        }

        let mut kept: Vec<String> = items.into_iter().filter(|item| item != LEGACY_NAME).collect();
        if !kept.iter().any(|item| item == "near") {
            kept.insert(0, "near".to_string());
        }

        out.push_str(&code[cursor..pos]);
        if kept.len() == 1 {
            out.push_str("use near_sdk::near;");
        } else {
            out.push_str(&format!("use near_sdk::{{{}}};", kept.join(", ")));
        }
        cursor = if code[close_end..].starts_with(';') {
            close_end + 1
        } else {
            close_end
        };
    }
    out.push_str(&code[cursor..]);
    out
}

fn ensure_panic_on_default_import(code: &str) -> String {
    if code.contains(PANIC_ON_DEFAULT) {
        return code.to_string();
    }

    let last_use_end = code
        .match_indices("use near_sdk::")
        .filter_map(|(pos, _)| code[pos..].find(';').map(|n| pos + n + 1))
        .last();

    match last_use_end {
        Some(end) => format!("{}\nuse near_sdk::PanicOnDefault;{}", &code[..end], &code[end..]),
        None => format!("use near_sdk::PanicOnDefault;\n{}", code),
    }
}

/// Rewrite `#[near_bindgen]` on the state struct to `#[near(contract_state)]`.
///
/// The derive list may sit on either side of the legacy attribute. Other
/// attributes between it and `pub struct` are kept, except `#[borsh(...)]`
/// which the state marker now supplies.
fn rewrite_contract_structs(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut cursor = 0;

    while let Some(rel) = code[cursor..].find(LEGACY_ATTR) {
        let attr = cursor + rel;
        let after = attr + LEGACY_ATTR.len();

        let mut start = attr;
        let mut derive = None;
        if let Some(d) = scan::derive_ending_at(code, attr).filter(|d| d.start >= cursor) {
            start = d.start;
            derive = Some(d.items);
        }

        let mut extra_attrs = Vec::new();
        let mut i = skip_ws(code, after);
        while code[i..].starts_with("#[") {
            if derive.is_none() {
                if let Some(d) = parse_derive(code, i) {
                    derive = Some(d.items);
                    i = skip_ws(code, d.end);
                    continue;
                }
            }
            let Some(end) = find_closing(code, i + 1, b'[', b']') else {
                break;
            };
            let text = &code[i..end];
            if !text.starts_with("#[borsh(") {
                extra_attrs.push(text);
            }
            i = skip_ws(code, end);
        }

        let Some(struct_kw) = expect_word(code, i, "pub").map(|p| skip_ws(code, p)) else {
            out.push_str(&code[cursor..after]);
            cursor = after;
            continue;
        };
        let Some(end) = expect_word(code, struct_kw, "struct") else {
            out.push_str(&code[cursor..after]);
            cursor = after;
            continue;
        };

        let items = match derive {
            Some(items) => {
                let mut items: Vec<String> = items
                    .into_iter()
                    .filter(|item| {
                        !is_named(item, "Default")
                            && !is_named(item, "BorshSerialize")
                            && !is_named(item, "BorshDeserialize")
                    })
                    .collect();
                ensure_panic_on_default(&mut items);
                items
            }
            None => vec![PANIC_ON_DEFAULT.to_string()],
        };

        out.push_str(&code[cursor..start]);
        out.push_str(&render_derive(&items));
        out.push('\n');
        out.push_str(STATE_ATTR);
        out.push('\n');
        for extra in extra_attrs {
            out.push_str(extra);
            out.push('\n');
        }
        out.push_str("pub struct");
        cursor = end;
    }
    out.push_str(&code[cursor..]);
    out
}

/// Remove the first `impl Default for Contract { ... }` block.
///
/// The closing brace is found by depth counting, so nested blocks in the
/// body are handled. An unterminated block leaves the source untouched.
fn remove_default_impl(code: &str) -> String {
    let mut search = 0;
    while let Some(rel) = code[search..].find("impl") {
        let start = search + rel;
        search = start + 4;

        let boundary = start == 0 || !scan::is_ident_byte(code.as_bytes()[start - 1]);
        let Some(open) = boundary.then(|| default_impl_open(code, start)).flatten() else {
            continue;
        };
        let Some(end) = find_closing(code, open, b'{', b'}') else {
            return code.to_string();
        };

        let line_start = code[..start]
            .rfind(|c: char| c != ' ' && c != '\t')
            .map_or(0, |n| n + 1);
        let line_start = if line_start == 0 || code.as_bytes()[line_start - 1] == b'\n' {
            line_start
        } else {
            start
        };
        let tail = code[end..]
            .find(|c: char| c != ' ' && c != '\t')
            .map_or(code.len(), |n| end + n);
        let tail = if code[tail..].starts_with("\r\n") {
            tail + 2
        } else if code[tail..].starts_with('\n') {
            tail + 1
        } else {
            end
        };

        return format!("{}{}", &code[..line_start], &code[tail..]);
    }
    code.to_string()
}

/// Index of `{` when `impl Default for Contract {` starts at `start`
fn default_impl_open(code: &str, start: usize) -> Option<usize> {
    let mut i = expect_word(code, start, "impl")?;
    for word in ["Default", "for", "Contract"] {
        let next = skip_ws(code, i);
        if next == i {
            return None;
        }
        i = expect_word(code, next, word)?;
    }
    let open = skip_ws(code, i);
    (code.as_bytes().get(open) == Some(&b'{')).then_some(open)
}

fn ensure_panic_on_default(items: &mut Vec<String>) {
    if !items.iter().any(|item| is_named(item, PANIC_ON_DEFAULT)) {
        items.push(PANIC_ON_DEFAULT.to_string());
    }
}

/// Re-render every derive list for which `rewrite` returns a new item list
fn rewrite_derives<F>(code: &str, rewrite: F) -> String
where
    F: Fn(&[String], &str) -> Option<Vec<String>>,
{
    let mut out = String::with_capacity(code.len());
    let mut cursor = 0;
    for derive in find_derives(code) {
        if derive.start < cursor {
            continue;
        }
        if let Some(items) = rewrite(&derive.items, &code[derive.end..]) {
            out.push_str(&code[cursor..derive.start]);
            out.push_str(&render_derive(&items));
            cursor = derive.end;
        }
    }
    out.push_str(&code[cursor..]);
    out
}

fn replace_default_derives(code: &str) -> String {
    rewrite_derives(code, |items, _| {
        if !items.iter().any(|item| is_named(item, "Default")) {
            return None;
        }
        let mut kept: Vec<String> = items.iter().filter(|item| !is_named(item, "Default")).cloned().collect();
        ensure_panic_on_default(&mut kept);
        Some(kept)
    })
}

fn strip_state_derives(code: &str) -> String {
    rewrite_derives(code, |items, rest| {
        if !rest.trim_start().starts_with(STATE_ATTR) {
            return None;
        }
        let mut kept: Vec<String> = items
            .iter()
            .filter(|item| !is_named(item, "BorshSerialize") && !is_named(item, "BorshDeserialize"))
            .cloned()
            .collect();
        ensure_panic_on_default(&mut kept);
        Some(kept)
    })
}

fn dedup_panic_on_default(code: &str) -> String {
    rewrite_derives(code, |items, _| {
        let count = items.iter().filter(|item| is_named(item, PANIC_ON_DEFAULT)).count();
        if count < 2 {
            return None;
        }
        let mut seen: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            if !seen.contains(item) {
                seen.push(item.clone());
            }
        }
        Some(seen)
    })
}

fn collapse_semicolons(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    for c in code.chars() {
        if c == ';' && out.ends_with(';') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Drop `use near_sdk::borsh::...;` when nothing else refers to borsh
fn remove_unused_borsh_import(code: &str) -> String {
    const BORSH_IMPORT: &str = "use near_sdk::borsh::";

    let mut without = String::with_capacity(code.len());
    let mut cursor = 0;
    while let Some(rel) = code[cursor..].find(BORSH_IMPORT) {
        let pos = cursor + rel;
        let Some(semi) = code[pos..].find(';').map(|n| pos + n + 1) else {
            break;
        };
        let end = code[semi..]
            .find(|c: char| c != ' ' && c != '\t')
            .map_or(code.len(), |n| semi + n);
        let end = if code[end..].starts_with('\n') { end + 1 } else { semi };

        without.push_str(&code[cursor..pos]);
        cursor = end;
    }
    if cursor == 0 {
        return code.to_string();
    }
    without.push_str(&code[cursor..]);

    let referenced = without.contains("BorshSerialize")
        || without.contains("BorshDeserialize")
        || without.contains("borsh::");
    if referenced {
        code.to_string()
    } else {
        without
    }
}

/// `#[near_bindgen]` on an impl block becomes `#[near]`
fn rewrite_impl_markers(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut cursor = 0;
    while let Some(rel) = code[cursor..].find(LEGACY_ATTR) {
        let attr = cursor + rel;
        let after = attr + LEGACY_ATTR.len();
        let next = skip_ws(code, after);
        match expect_word(code, next, "impl") {
            Some(end) => {
                out.push_str(&code[cursor..attr]);
                out.push_str("#[near]\nimpl");
                cursor = end;
            }
            None => {
                out.push_str(&code[cursor..after]);
                cursor = after;
            }
        }
    }
    out.push_str(&code[cursor..]);
    out
}
