//! Filename filtering with shell glob patterns.

use glob::Pattern;

use super::error::WatchError;

/// Compile a single glob, reporting the offending pattern on failure.
///
/// The pattern is first rewritten into the `glob` dialect so that it reads
/// the way fnmatch(3) reads it:
/// - `\x` matches `x` literally
/// - a run of `*` is a single `*`
/// - a `[` with no closing `]` is an ordinary character
pub fn compile(pattern: &str) -> Result<Pattern, WatchError> {
    Pattern::new(&normalize(pattern)).map_err(|e| WatchError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.msg.to_string(),
    })
}

fn normalize(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                out.push_str(&Pattern::escape(&chars[i + 1].to_string()));
                i += 2;
            }
            '*' => {
                out.push('*');
                while chars.get(i) == Some(&'*') {
                    i += 1;
                }
            }
            '[' => match bracket_end(&chars, i) {
                Some(end) => {
                    out.push('[');
                    let mut body = i + 1;
                    if matches!(chars[body], '!' | '^') {
                        out.push('!');
                        body += 1;
                    }
                    out.extend(&chars[body..=end]);
                    i = end + 1;
                }
                None => {
                    out.push_str("[[]");
                    i += 1;
                }
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Index of the `]` closing the bracket expression opened at `open`.
/// A `]` right after `[` or `[!` belongs to the set.
fn bracket_end(chars: &[char], open: usize) -> Option<usize> {
    let mut first = open + 1;
    if matches!(chars.get(first), Some('!' | '^')) {
        first += 1;
    }
    chars
        .get(first + 1..)?
        .iter()
        .position(|&c| c == ']')
        .map(|pos| first + 1 + pos)
}

/// Whether `filename` satisfies at least one of `patterns`.
///
/// An empty pattern list matches everything. Matching is over the whole
/// name with fnmatch(3) default flags: case sensitive, `*` may cross `/`
/// and match a leading dot.
pub fn matches(filename: &str, patterns: &[Pattern]) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| p.matches(filename))
}

/// An ordered set of compiled filename globs.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new<I, S>(patterns: I) -> Result<Self, WatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, filename: &str) -> bool {
        matches(filename, &self.patterns)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Pattern::as_str)
    }
}
