//! Glob pattern matching over raw bytes
//!
//! The dialect shared by `KEYS`, `SCAN`, and pattern subscriptions:
//! `*` (any run of bytes), `?` (any single byte), `[...]` (byte class,
//! with `a-z` ranges and a leading `^` for negation), and `\` to escape
//! the next byte.
//!
//! Matching is iterative with single-star backtracking, so pathological
//! patterns cannot blow the stack.

/// Check whether `text` matches `pattern`.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    // Most recent `*` position and the text position it has consumed up to
    let (mut star, mut star_t) = (usize::MAX, 0usize);

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = p;
                    star_t = t;
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    if let Some((matched, next_p)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next_p;
                            t += 1;
                            continue;
                        }
                    }
                    // fall through to backtrack
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                    // fall through to backtrack
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                    // fall through to backtrack
                }
            }
        }
        // Mismatch: retry from the last star, consuming one more byte
        if star != usize::MAX {
            p = star + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    // Only trailing stars may remain
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

/// Match `byte` against the class starting at `pattern[start] == b'['`.
///
/// Returns `(matched, index past the closing bracket)`, or `None` when the
/// class is unterminated (an unterminated class matches nothing).
fn match_class(pattern: &[u8], start: usize, byte: u8) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negated = if i < pattern.len() && pattern[i] == b'^' {
        i += 1;
        true
    } else {
        false
    };

    let mut matched = false;
    let mut first = true;
    while i < pattern.len() {
        if pattern[i] == b']' && !first {
            return Some((matched != negated, i + 1));
        }
        first = false;
        // Range form `a-z` (a trailing `-` is a literal)
        if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = (pattern[i], pattern[i + 2]);
            if lo <= byte && byte <= hi {
                matched = true;
            }
            i += 3;
        } else {
            if pattern[i] == byte {
                matched = true;
            }
            i += 1;
        }
    }
    None
}
