//! Path globs and regex flag handling shared by batch edits and rules.

use regex::Regex;
use regex::RegexBuilder;

/// Matches a part path against a glob pattern.
///
/// Supports:
/// - Exact match: `"ppt/theme/theme1.xml"` matches only that path
/// - `*`: any run of characters within one path segment
/// - `**`: any run of characters across segments (`**/` may match nothing)
/// - `?`: exactly one character other than `/`
///
/// # Examples
///
/// ```
/// use partkit_core::pattern::glob_matches;
///
/// assert!(glob_matches("ppt/slides/*.xml", "ppt/slides/slide1.xml"));
/// assert!(!glob_matches("ppt/*.xml", "ppt/slides/slide1.xml"));
/// assert!(glob_matches("ppt/**/*.xml", "ppt/slides/slide1.xml"));
/// assert!(glob_matches("ppt/theme/theme?.xml", "ppt/theme/theme1.xml"));
/// ```
#[must_use]
pub fn glob_matches(pattern: &str, path: &str) -> bool {
    if pattern == path {
        return true;
    }
    if !pattern.contains(['*', '?']) {
        return false;
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let path: Vec<char> = path.chars().collect();
    match_from(&pattern, &path)
}

/// Returns `true` if the pattern contains glob metacharacters.
#[must_use]
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Fills a table where `row[i][j]` says whether `pattern[i..]` matches
/// `text[j..]`, from the ends backwards. Runs in `O(pattern * text)`.
fn match_from(pattern: &[char], text: &[char]) -> bool {
    let width = text.len() + 1;
    let mut table = vec![false; (pattern.len() + 1) * width];
    let at = |i: usize, j: usize| i * width + j;
    table[at(pattern.len(), text.len())] = true;

    for i in (0..pattern.len()).rev() {
        let double = pattern[i] == '*' && pattern.get(i + 1) == Some(&'*');
        // "**/" also matches zero segments
        let slash = double && pattern.get(i + 2) == Some(&'/');
        let mut any_rest = false;

        for j in (0..width).rev() {
            let next = text.get(j).copied();
            table[at(i, j)] = if double {
                any_rest |= table[at(i + 2, j)];
                any_rest || (slash && table[at(i + 3, j)])
            } else {
                match pattern[i] {
                    '*' => {
                        table[at(i + 1, j)]
                            || (next.is_some_and(|c| c != '/') && table[at(i, j + 1)])
                    }
                    '?' => next.is_some_and(|c| c != '/') && table[at(i + 1, j + 1)],
                    c => next == Some(c) && table[at(i + 1, j + 1)],
                }
            };
        }
    }
    table[at(0, 0)]
}

/// Compiles a regular expression with single-letter flags.
///
/// `i`, `m`, `s` and `x` map to case-insensitive, multi-line,
/// dot-matches-newline and verbose mode. `g` and `u` are accepted and
/// ignored: replacement is always global and patterns are always Unicode.
///
/// # Errors
///
/// Returns a description of the problem for an unknown flag or an invalid
/// pattern.
///
/// # Examples
///
/// ```
/// use partkit_core::pattern::compile_regex;
///
/// let re = compile_regex("^calibri$", "gi").unwrap();
/// assert!(re.is_match("Calibri"));
/// assert!(compile_regex("a", "q").is_err());
/// ```
pub fn compile_regex(pattern: &str, flags: &str) -> Result<Regex, String> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            'g' | 'u' => {}
            other => return Err(format!("unsupported regex flag '{other}'")),
        }
    }
    builder
        .build()
        .map_err(|e| format!("invalid regex '{pattern}': {e}"))
}
