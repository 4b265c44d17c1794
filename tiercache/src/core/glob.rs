//! Wildcard matching for backends without native pattern queries

use regex::Regex;

/// Compiled glob pattern
///
/// `*` matches zero or more characters, `?` exactly one, and `[...]`
/// character classes pass through. Everything else is literal. Matching is
/// anchored to the whole string.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    regex: Regex,
}

impl GlobMatcher {
    pub fn compile(pattern: &str) -> Self {
        let regex = Regex::new(&Self::translate(pattern, true))
            .or_else(|_| Regex::new(&Self::translate(pattern, false)))
            .expect("fully escaped glob is always a valid regex");

        Self { regex }
    }

    pub fn test(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// Keep only the candidates matching this pattern
    pub fn filter<I>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        candidates.into_iter().filter(|c| self.test(c)).collect()
    }

    /// Translate to an anchored regex; unbalanced classes fall back to
    /// literal brackets when `classes` is false.
    ///
    /// Inside `[...]` only a leading `^` and `-` ranges keep their meaning;
    /// `*`, `?` and `[` are literal there, as in Redis `KEYS`.
    fn translate(pattern: &str, classes: bool) -> String {
        let mut out = String::with_capacity(pattern.len() + 8);
        out.push_str("(?s)^");

        let mut buf = [0u8; 4];
        let mut in_class = false;
        let mut class_start = false;
        for ch in pattern.chars() {
            let first_in_class = std::mem::take(&mut class_start);
            match ch {
                '[' if classes && !in_class => {
                    in_class = true;
                    class_start = true;
                    out.push('[');
                }
                ']' if in_class && !first_in_class => {
                    in_class = false;
                    out.push(']');
                }
                '^' if in_class && first_in_class => out.push('^'),
                '-' if in_class => out.push('-'),
                '*' if !in_class => out.push_str(".*"),
                '?' if !in_class => out.push('.'),
                _ => out.push_str(&regex::escape(ch.encode_utf8(&mut buf))),
            }
        }

        out.push('$');
        out
    }
}
