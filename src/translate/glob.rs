//! Graphite glob segment to regular-expression compilation.
//!
//! The emitted pattern body is interpreted by the backend's regex matcher,
//! not compiled locally. `?` and `*` never cross the hierarchy separator,
//! `{a,b}` becomes an alternation group and `[0-9]` passes through as a
//! character class. The boolean result reports whether any metacharacter
//! was emitted, so callers can choose an equality filter over a regex one
//! for plain segments.

use thiserror::Error;

/// Runes permitted in a plain Graphite identifier segment.
const VALID_IDENTIFIER_RUNES: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789$-_'|<>%#/:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlobError {
    #[error("invalid character {ch} at pos {pos} in {glob}")]
    InvalidRune { ch: char, pos: usize, glob: String },

    #[error("invalid '{close}' at {pos}, no prior for '{open}' in {glob}")]
    UnmatchedCloser {
        close: char,
        open: char,
        pos: usize,
        glob: String,
    },

    #[error("invalid ',' outside of matching group at pos {pos} in {glob}")]
    CommaOutsideGroup { pos: usize, glob: String },

    #[error("unbalanced '{open}' in {glob}")]
    UnbalancedOpener { open: char, glob: String },
}

/// Compile a Graphite glob into a regex body. Returns the pattern and
/// whether any regex metacharacter was emitted.
pub fn glob_to_regex(glob: &str) -> Result<(String, bool), GlobError> {
    let mut pattern = String::with_capacity(glob.len() * 2);
    let mut escaping = false;
    let mut regexed = false;
    let mut group_stack: Vec<char> = Vec::new();

    for (pos, r) in glob.char_indices() {
        if escaping {
            pattern.push(r);
            escaping = false;
            continue;
        }
        match r {
            '\\' => {
                escaping = true;
                pattern.push('\\');
            }
            '.' => {
                // Hierarchy separator; only seen when compiling a whole
                // multi-segment pattern.
                pattern.push_str("\\.+");
                regexed = true;
            }
            '?' => {
                // Any single rune short of the separator.
                pattern.push_str("[^.]");
                regexed = true;
            }
            '*' => {
                // Any run of runes up to the next separator.
                pattern.push_str("[^.]*");
                regexed = true;
            }
            '{' => {
                pattern.push('(');
                group_stack.push('{');
                regexed = true;
            }
            '}' => {
                if group_stack.last() != Some(&'{') {
                    return Err(GlobError::UnmatchedCloser {
                        close: '}',
                        open: '{',
                        pos,
                        glob: glob.to_string(),
                    });
                }
                pattern.push(')');
                group_stack.pop();
            }
            '[' => {
                pattern.push('[');
                group_stack.push('[');
                regexed = true;
            }
            ']' => {
                if group_stack.last() != Some(&'[') {
                    return Err(GlobError::UnmatchedCloser {
                        close: ']',
                        open: '[',
                        pos,
                        glob: glob.to_string(),
                    });
                }
                pattern.push(']');
                group_stack.pop();
            }
            '<' | '>' | '\'' | '$' => {
                pattern.push('\\');
                pattern.push(r);
            }
            '|' => {
                pattern.push('|');
                regexed = true;
            }
            ',' => {
                // Commas alternate only inside a `{…}` group.
                if group_stack.last() == Some(&'{') {
                    pattern.push('|');
                } else {
                    return Err(GlobError::CommaOutsideGroup {
                        pos,
                        glob: glob.to_string(),
                    });
                }
            }
            _ => {
                if !VALID_IDENTIFIER_RUNES.contains(r) {
                    return Err(GlobError::InvalidRune {
                        ch: r,
                        pos,
                        glob: glob.to_string(),
                    });
                }
                pattern.push(r);
            }
        }
    }

    if let Some(&open) = group_stack.last() {
        return Err(GlobError::UnbalancedOpener {
            open,
            glob: glob.to_string(),
        });
    }

    Ok((pattern, regexed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn compiles_patterns() {
        let cases = [
            ("barbaz", false, "barbaz"),
            ("barbaz:quxqaz", false, "barbaz:quxqaz"),
            (
                "foo\\+bar.'baz<1001>'.qux",
                true,
                "foo\\+bar\\.+\\'baz\\<1001\\>\\'\\.+qux",
            ),
            (
                "foo.host.me{1,2,3}.*",
                true,
                "foo\\.+host\\.+me(1|2|3)\\.+[^.]*",
            ),
            (
                "bar.zed.whatever[0-9].*.*.bar",
                true,
                "bar\\.+zed\\.+whatever[0-9]\\.+[^.]*\\.+[^.]*\\.+bar",
            ),
            ("foo{0[3-9],1[0-9],20}", true, "foo(0[3-9]|1[0-9]|20)"),
            ("foo{0[3-9],1[0-9],20}:bar", true, "foo(0[3-9]|1[0-9]|20):bar"),
        ];
        for (glob, want_regex, want_pattern) in cases {
            let (pattern, is_regex) = glob_to_regex(glob).unwrap();
            assert_eq!(is_regex, want_regex, "is_regex for {glob}");
            assert_eq!(pattern, want_pattern, "bad pattern for {glob}");
        }
    }

    #[test]
    fn reports_errors() {
        let cases = [
            ("foo.host{1,2", "unbalanced '{' in foo.host{1,2"),
            (
                "foo.host{1,2]",
                "invalid ']' at 12, no prior for '[' in foo.host{1,2]",
            ),
            (
                "foo.,",
                "invalid ',' outside of matching group at pos 4 in foo.,",
            ),
            (
                "foo.host{a[0-}",
                "invalid '}' at 13, no prior for '{' in foo.host{a[0-}",
            ),
        ];
        for (glob, want) in cases {
            let err = glob_to_regex(glob).unwrap_err();
            assert_eq!(err.to_string(), want, "invalid error for {glob}");
        }
    }

    #[test]
    fn compiled_patterns_match() {
        let cases: &[(&str, bool, &[&str])] = &[
            (
                "foo.bar.timers.baz??-bar.qux.query.count",
                true,
                &[
                    "foo.bar.timers.baz01-bar.qux.query.count",
                    "foo.bar.timers.baz24-bar.qux.query.count",
                ],
            ),
            (
                "foo.bar.timers.baz??-bar.qux.query.count",
                false,
                &[
                    "foo.bar.timers.baz-bar.qux.query.count",
                    "foo.bar.timers.baz.0-bar.qux.query.count",
                    "foo.bar.timers.baz021-bar.qux.query.count",
                ],
            ),
            ("foo.host{1,2}.*", true, &["foo.host1.zed", "foo.host2.whatever"]),
            ("foo.*.zed.*", true, &["foo.bar.zed.eq", "foo.zed.zed.zed"]),
            (
                "foo.*.zed.*",
                false,
                &["bar.bar.zed.zed", "foo.bar.zed", "foo.bar.zed.eq.monk"],
            ),
            (
                "foo.host{1,2}.zed",
                false,
                &["foo.host3.zed", "foo.hostA.zed", "blad.host1.zed", "foo.host1.zed.z"],
            ),
            (
                "optic{0[3-9],1[0-9],20}",
                true,
                &["optic03", "optic10", "optic20"],
            ),
            (
                "optic{0[3-9],1[0-9],20}",
                false,
                &["optic01", "optic21", "optic201", "optic031"],
            ),
        ];
        for (glob, want_match, inputs) in cases {
            let (pattern, _) = glob_to_regex(glob).unwrap();
            let re = Regex::new(&format!("^{pattern}$")).unwrap();
            for input in *inputs {
                assert_eq!(
                    re.is_match(input),
                    *want_match,
                    "incorrect match between {glob} and {input}"
                );
            }
        }
    }
}
