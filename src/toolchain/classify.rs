//! Best-effort extraction of a readable message from compiler output
//!
//! Rules are tried in priority order over stderr lines, then stdout lines.
//! The first rule that matches any line wins. When nothing matches the
//! message falls back to the last non-empty stderr line, then to a bounded
//! tail of the combined output.

use crate::toolchain::runner::InvokeError;

/// Maximum length of the combined-output fallback
const TAIL_CHARS: usize = 500;

/// Lines of combined output kept by the fallback
const TAIL_LINES: usize = 5;

/// Classified failure message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    /// Single human-readable message
    pub message: String,
    /// Name of the rule that produced the message, if any
    pub rule: Option<&'static str>,
}

struct Rule {
    name: &'static str,
    extract: fn(&str) -> Option<String>,
}

const RULES: &[Rule] = &[
    Rule {
        name: "syntax-error",
        extract: syntax_error,
    },
    Rule {
        name: "rustc-coded-error",
        extract: rustc_coded_error,
    },
    Rule {
        name: "error-prefix",
        extract: error_prefix,
    },
    Rule {
        name: "rust-error",
        extract: rust_error,
    },
];

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn syntax_error(line: &str) -> Option<String> {
    let idx = line.find("SyntaxError: ")?;
    non_empty(&line[idx + "SyntaxError: ".len()..]).map(|m| format!("Syntax Error: {}", m))
}

fn rustc_coded_error(line: &str) -> Option<String> {
    let line = line.trim();
    let rest = line.strip_prefix("error[E")?;
    let close = rest.find("]: ")?;
    let code = &rest[..close];
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    non_empty(line)
}

fn error_prefix(line: &str) -> Option<String> {
    let idx = line.find("Error: ")?;
    non_empty(&line[idx + "Error: ".len()..])
}

fn rust_error(line: &str) -> Option<String> {
    let rest = line.trim().strip_prefix("error: ")?;
    if rest.starts_with("could not compile") || rest.starts_with("aborting due to") {
        return None;
    }
    non_empty(rest)
}

/// Classify raw tool output. Never panics; may return an empty message when
/// both streams are blank.
pub fn classify(stdout: &str, stderr: &str) -> Diagnosis {
    for rule in RULES {
        let hit = stderr
            .lines()
            .chain(stdout.lines())
            .find_map(|line| (rule.extract)(line));
        if let Some(message) = hit {
            return Diagnosis {
                message,
                rule: Some(rule.name),
            };
        }
    }

    if let Some(last) = stderr.lines().rev().find_map(non_empty) {
        return Diagnosis {
            message: last,
            rule: None,
        };
    }

    Diagnosis {
        message: combined_tail(stdout, stderr),
        rule: None,
    }
}

/// Classify a failed invocation, falling back to its exit information
pub fn classify_invoke(err: &InvokeError) -> Diagnosis {
    match err {
        InvokeError::Timeout { timeout, .. } => Diagnosis {
            message: format!("Compilation timed out after {}s", timeout.as_secs()),
            rule: Some("timeout"),
        },
        InvokeError::Spawn { .. } => Diagnosis {
            message: err.to_string(),
            rule: Some("spawn"),
        },
        InvokeError::NonZeroExit { stdout, stderr, .. } => {
            let diagnosis = classify(stdout, stderr);
            if diagnosis.message.is_empty() {
                Diagnosis {
                    message: err.to_string(),
                    rule: None,
                }
            } else {
                diagnosis
            }
        }
    }
}

fn combined_tail(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout
        .lines()
        .chain(stderr.lines())
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    let tail = lines[start..].join("\n");

    if tail.len() <= TAIL_CHARS {
        return tail;
    }
    let mut cut = tail.len() - TAIL_CHARS;
    while !tail.is_char_boundary(cut) {
        cut += 1;
    }
    tail[cut..].to_string()
}
