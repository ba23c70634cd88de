//! Best-effort repair of near-valid JSON emitted by a model.
//!
//! Repairs are an ordered list of named, pure text → text rules. Every rule
//! only rewrites text outside JSON string literals, so valid JSON passes
//! through unchanged and running the list twice equals running it once.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// One named text → text rewrite.
pub struct RepairRule {
    pub name: &'static str,
    apply: fn(&str) -> String,
}

impl RepairRule {
    pub fn apply(&self, text: &str) -> String {
        (self.apply)(text)
    }
}

impl std::fmt::Debug for RepairRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepairRule").field("name", &self.name).finish()
    }
}

/// Applied in this order by [`repair`].
pub static RULES: &[RepairRule] = &[
    RepairRule {
        name: "strip_comments",
        apply: strip_comments,
    },
    RepairRule {
        name: "collapse_ellipsis_arrays",
        apply: collapse_ellipsis_arrays,
    },
    RepairRule {
        name: "drop_trailing_ellipsis",
        apply: drop_trailing_ellipsis,
    },
    RepairRule {
        name: "drop_inner_ellipsis",
        apply: drop_inner_ellipsis,
    },
    RepairRule {
        name: "drop_leading_ellipsis",
        apply: drop_leading_ellipsis,
    },
    RepairRule {
        name: "strip_residual_ellipsis",
        apply: strip_residual_ellipsis,
    },
    RepairRule {
        name: "close_unbalanced_brackets",
        apply: close_unbalanced_brackets,
    },
    RepairRule {
        name: "strip_trailing_commas",
        apply: strip_trailing_commas,
    },
];

/// Upper bound on full passes over [`RULES`].
const MAX_PASSES: usize = 4;

/// Run every rule in [`RULES`] over `text`, repeating the list until a
/// pass changes nothing.
pub fn repair(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_PASSES {
        let next = RULES.iter().fold(current.clone(), |acc, rule| {
            let out = rule.apply(&acc);
            if out != acc {
                debug!(rule = rule.name, "applied JSON repair rule");
            }
            out
        });
        if next == current {
            break;
        }
        current = next;
    }
    current
}

// ── String-aware scanning ─────────────────────────────────────

/// Split `text` into alternating code / string-literal pieces and pass
/// the code pieces through `f`. An unterminated string runs to the end.
fn map_outside_strings<F>(text: &str, f: F) -> String
where
    F: for<'a> Fn(&'a str) -> Cow<'a, str>,
{
    let mut out = String::with_capacity(text.len());
    let mut code_start = 0;
    let mut string_start = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        match string_start {
            None => {
                if c == '"' {
                    out.push_str(&f(&text[code_start..i]));
                    string_start = Some(i);
                }
            }
            Some(start) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    out.push_str(&text[start..=i]);
                    string_start = None;
                    code_start = i + 1;
                }
            }
        }
    }

    match string_start {
        Some(start) => out.push_str(&text[start..]),
        None => out.push_str(&f(&text[code_start..])),
    }
    out
}

const ELLIPSIS: &str = r"(?:\.\.\.|…)";

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(&$re).expect("repair pattern is valid"));
    };
}

pattern!(ELLIPSIS_ARRAY, format!(r"\[\s*{ELLIPSIS}\s*\]"));
pattern!(TRAILING_ELLIPSIS, format!(r",?\s*{ELLIPSIS}\s*([\]}}])"));
pattern!(INNER_ELLIPSIS, format!(r",\s*{ELLIPSIS}\s*,"));
pattern!(LEADING_ELLIPSIS, format!(r"([\[{{])\s*{ELLIPSIS}\s*,"));
pattern!(RESIDUAL_ELLIPSIS, ELLIPSIS.to_string());
pattern!(TRAILING_COMMA, r",(?:\s*,)*(\s*[\]}])".to_string());

/// Replace `re` matches in `text` until none remain. Matches never
/// overlap, so `, ..., ...,` needs a second sweep.
fn replace_until_stable<'a>(re: &Regex, text: &'a str, rep: &str) -> Cow<'a, str> {
    let mut current = match re.replace_all(text, rep) {
        Cow::Borrowed(_) => return Cow::Borrowed(text),
        Cow::Owned(s) => s,
    };
    loop {
        let next = match re.replace_all(&current, rep) {
            Cow::Borrowed(_) => break,
            Cow::Owned(next) => next,
        };
        current = next;
    }
    Cow::Owned(current)
}

fn collapse_ellipsis_arrays(text: &str) -> String {
    map_outside_strings(text, |s| replace_until_stable(&ELLIPSIS_ARRAY, s, "[]"))
}

/// `["x", ...]` → `["x"]`, `[1, ...]` → `[1]`, `{"a": 1, ...}` → `{"a": 1}`.
fn drop_trailing_ellipsis(text: &str) -> String {
    map_outside_strings(text, |s| replace_until_stable(&TRAILING_ELLIPSIS, s, "$1"))
}

fn drop_inner_ellipsis(text: &str) -> String {
    map_outside_strings(text, |s| replace_until_stable(&INNER_ELLIPSIS, s, ","))
}

fn drop_leading_ellipsis(text: &str) -> String {
    map_outside_strings(text, |s| replace_until_stable(&LEADING_ELLIPSIS, s, "$1"))
}

fn strip_residual_ellipsis(text: &str) -> String {
    map_outside_strings(text, |s| RESIDUAL_ELLIPSIS.replace_all(s, ""))
}

/// `[1, 2,, ]` → `[1, 2 ]`: the whole run of commas before a closer goes.
fn strip_trailing_commas(text: &str) -> String {
    map_outside_strings(text, |s| TRAILING_COMMA.replace_all(s, "$1"))
}

/// Drop `//` and `/* */` comments in one scan, so whichever opener comes
/// first wins and a quote inside a comment never opens a string.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                // Keep the newline so line structure survives.
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Insert closers for brackets the model opened but never closed, and
/// drop closers that match nothing.
fn close_unbalanced_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '[' => {
                stack.push(']');
                out.push(c);
            }
            '{' => {
                stack.push('}');
                out.push(c);
            }
            ']' | '}' => {
                if stack.contains(&c) {
                    while let Some(expected) = stack.pop() {
                        out.push(expected);
                        if expected == c {
                            break;
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }

    if in_string {
        out.push('"');
    }
    while let Some(expected) = stack.pop() {
        out.push(expected);
    }
    out
}
