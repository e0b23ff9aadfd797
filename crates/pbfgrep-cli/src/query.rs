//! Glob queries over node ids and tags.
//!
//! Each query term is `key=value` where both sides are shell-style globs
//! (`*`, `?`, `[...]`). A bare `key` means `key=*`. The pseudo-key `id`
//! matches the node id.

use anyhow::{Context, Result};
use pbfgrep_core::PointRecord;
use regex::Regex;

/// One compiled `key=value` term
#[derive(Debug)]
struct Term {
    key: Regex,
    value: Regex,
}

impl Term {
    fn is_match(&self, key: &str, value: &str) -> bool {
        self.key.is_match(key) && self.value.is_match(value)
    }
}

/// A conjunction of terms
#[derive(Debug)]
pub(crate) struct Query {
    terms: Vec<Term>,
}

impl Query {
    /// Compiles `key=value` glob pairs.
    pub(crate) fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let terms = patterns
            .iter()
            .map(|pattern| -> Result<Term> {
                let pattern = pattern.as_ref();
                let (key, value) = pattern.split_once('=').unwrap_or((pattern, "*"));
                Ok(Term {
                    key: compile_glob(key)
                        .with_context(|| format!("Invalid key pattern in '{}'", pattern))?,
                    value: compile_glob(value)
                        .with_context(|| format!("Invalid value pattern in '{}'", pattern))?,
                })
            })
            .collect::<Result<_>>()?;

        Ok(Self { terms })
    }

    /// Matches a node against every term.
    ///
    /// The id and each tag are credited to the first term they satisfy. The
    /// node matches when every term was satisfied at least once; the result
    /// lists the pairs that did so.
    pub(crate) fn matches(&self, record: &PointRecord) -> Option<Vec<(String, String)>> {
        let mut seen = vec![false; self.terms.len()];
        let mut matched = Vec::new();

        let id = record.id.to_string();
        let candidates = std::iter::once(("id", id.as_str())).chain(
            record
                .tags
                .iter()
                .map(|(key, value)| (&**key, &**value)),
        );

        for (key, value) in candidates {
            if let Some(index) = self.terms.iter().position(|term| term.is_match(key, value)) {
                seen[index] = true;
                matched.push((key.to_string(), value.to_string()));
            }
        }

        seen.iter().all(|&hit| hit).then_some(matched)
    }
}

/// Translates a shell glob into an anchored regex source.
pub(crate) fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from(r"\A(?s:");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => match class_end(&chars, i + 1) {
                Some(end) => {
                    out.push('[');
                    let mut j = i + 1;
                    if chars[j] == '!' {
                        out.push('^');
                        j += 1;
                    } else if chars[j] == '^' {
                        out.push_str(r"\^");
                        j += 1;
                    }
                    for &c in &chars[j..end] {
                        match c {
                            '\\' | '[' | '&' | '~' => {
                                out.push('\\');
                                out.push(c);
                            }
                            _ => out.push(c),
                        }
                    }
                    out.push(']');
                    i = end;
                }
                None => out.push_str(r"\["),
            },
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }

    out.push_str(r")\z");
    out
}

/// Index of the `]` closing a class that starts at `start`, if any.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    // A leading ']' is a literal member
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    chars[j.min(chars.len())..]
        .iter()
        .position(|&c| c == ']')
        .map(|offset| j + offset)
}

fn compile_glob(glob: &str) -> Result<Regex> {
    Regex::new(&glob_to_regex(glob)).with_context(|| format!("Cannot compile glob '{}'", glob))
}
