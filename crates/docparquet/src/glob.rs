//! Path glob patterns used to select columns
//!
//! Patterns follow filesystem glob rules over slash-separated column paths:
//!
//! - `*` matches any run of characters within one path segment
//! - `**` matches across segments
//! - `?` matches one character other than `/`
//! - `[abc]`, `[a-z]`, `[!abc]` match one character of a class (never `/`)
//! - `{a,b}` matches any of the comma-separated alternatives (no nesting)
//! - `\` escapes the next character
//!
//! A pattern is compiled into an anchored regular expression, so `**/streetName`
//! matches `/addresses/streetName` but `*/streetName` does not.

use regex::Regex;

use crate::error::{Error, Result};

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: String,
    regex: Regex,
}

impl GlobMatcher {
    /// Compiles a glob pattern
    pub fn new(pattern: &str) -> Result<Self> {
        let source = glob_to_regex(pattern)?;
        let regex = Regex::new(&source)
            .map_err(|e| Error::invalid_pattern(pattern, e.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written by the caller
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True when the whole path matches the pattern
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Compiles every pattern, failing on the first malformed one
pub fn compile_all<I, S>(patterns: I) -> Result<Vec<GlobMatcher>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| GlobMatcher::new(p.as_ref()))
        .collect()
}

/// Translates a glob into an anchored regular expression
fn glob_to_regex(glob: &str) -> Result<String> {
    let chars: Vec<char> = glob.chars().collect();
    let mut regex = String::from("^");
    let mut in_group = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '\\' => {
                let escaped = chars
                    .get(i)
                    .ok_or_else(|| Error::invalid_pattern(glob, "no character to escape"))?;
                i += 1;
                push_literal(&mut regex, *escaped);
            }
            '/' => regex.push('/'),
            '[' => {
                i = push_class(glob, &chars, i, &mut regex)?;
            }
            '{' => {
                if in_group {
                    return Err(Error::invalid_pattern(glob, "cannot nest groups"));
                }
                regex.push_str("(?:");
                in_group = true;
            }
            '}' if in_group => {
                regex.push(')');
                in_group = false;
            }
            ',' if in_group => regex.push('|'),
            '*' => {
                if chars.get(i) == Some(&'*') {
                    regex.push_str(".*");
                    i += 1;
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            other => push_literal(&mut regex, other),
        }
    }

    if in_group {
        return Err(Error::invalid_pattern(glob, "missing '}'"));
    }

    regex.push('$');
    Ok(regex)
}

/// Emits a bracket expression starting after `[`; returns the index after `]`
fn push_class(glob: &str, chars: &[char], mut i: usize, regex: &mut String) -> Result<usize> {
    // Intersect with "not a separator" so classes never cross segments
    regex.push_str("[[^/]&&[");

    if chars.get(i) == Some(&'^') {
        regex.push_str("\\^");
        i += 1;
    } else {
        if chars.get(i) == Some(&'!') {
            regex.push('^');
            i += 1;
        }
        if chars.get(i) == Some(&'-') {
            regex.push_str("\\-");
            i += 1;
        }
    }

    let mut range_start: Option<char> = None;
    let mut closed = false;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            ']' => {
                closed = true;
                break;
            }
            '/' => {
                return Err(Error::invalid_pattern(
                    glob,
                    "explicit name separator in class",
                ))
            }
            '-' => {
                let start = range_start
                    .take()
                    .ok_or_else(|| Error::invalid_pattern(glob, "invalid range"))?;
                match chars.get(i) {
                    None => break,
                    Some(']') => {
                        // Trailing '-' is a literal
                        regex.push_str("\\-");
                    }
                    Some(&end) => {
                        if end < start {
                            return Err(Error::invalid_pattern(glob, "invalid range"));
                        }
                        regex.push('-');
                        push_literal(regex, end);
                        i += 1;
                    }
                }
            }
            other => {
                push_literal(regex, other);
                range_start = Some(other);
            }
        }
    }

    if !closed {
        return Err(Error::invalid_pattern(glob, "missing ']'"));
    }

    regex.push_str("]]");
    Ok(i)
}

fn push_literal(regex: &mut String, c: char) {
    let mut buf = [0u8; 4];
    regex.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        GlobMatcher::new(pattern).unwrap().is_match(path)
    }

    #[test]
    fn test_literal_path() {
        assert!(matches("/person/gender", "/person/gender"));
        assert!(!matches("/person/gender", "/person/genders"));
        assert!(!matches("/person/gender", "/other/person/gender"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        assert!(matches("/person/name/*", "/person/name/firstName"));
        assert!(!matches("/person/*", "/person/name/firstName"));
        assert!(!matches("*/streetName", "/addresses/streetName"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        assert!(matches("**/streetName", "/addresses/streetName"));
        assert!(matches("**/firstname", "/person/name/firstname"));
        assert!(matches("**", "/a/b/c"));
        assert!(!matches("**/streetName", "/addresses/streetNames"));
    }

    #[test]
    fn test_question_mark() {
        assert!(matches("/a?c", "/abc"));
        assert!(!matches("/a?c", "/a/c"));
    }

    #[test]
    fn test_classes() {
        assert!(matches("/zip[Cc]ode", "/zipCode"));
        assert!(matches("/v[0-9]", "/v7"));
        assert!(!matches("/v[!0-9]", "/v7"));
        assert!(matches("/v[!0-9]", "/vx"));
        assert!(matches("/a[-x]", "/a-"));
    }

    #[test]
    fn test_groups() {
        assert!(matches("/person/{name,gender}", "/person/gender"));
        assert!(matches("/person/{name,gender}", "/person/name"));
        assert!(!matches("/person/{name,gender}", "/person/age"));
        // Commas outside a group are literal
        assert!(matches("/a,b", "/a,b"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(matches("/a.b", "/a.b"));
        assert!(!matches("/a.b", "/axb"));
        assert!(matches("/a+(b)", "/a+(b)"));
        assert!(matches("/a\\*", "/a*"));
        assert!(!matches("/a\\*", "/ab"));
    }

    #[test]
    fn test_empty_pattern_matches_only_empty_path() {
        assert!(matches("", ""));
        assert!(!matches("", "/a"));
    }

    #[test]
    fn test_invalid_patterns() {
        for pattern in ["/a[bc", "/{a,{b}}", "/{a,b", "/a\\", "/[a/b]", "/[z-a]"] {
            let result = GlobMatcher::new(pattern);
            assert!(
                matches!(result, Err(Error::InvalidPattern { .. })),
                "expected {:?} to be rejected",
                pattern
            );
        }
    }

    #[test]
    fn test_compile_all() {
        let matchers = compile_all(["**/a", "/b"]).unwrap();
        assert_eq!(matchers.len(), 2);
        assert_eq!(matchers[1].pattern(), "/b");
        assert!(compile_all(["/ok", "/bad["]).is_err());
    }
}
