//! `{placeholder}` path templates.
//!
//! Templates are formatted in two steps: stage-level fields (`{raw}`) are
//! bound when a pipeline is linked, per-call fields (`{subject}`,
//! `{session}`) when a file is accessed. Unknown placeholders survive a
//! partial format untouched.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Field values substituted into a template.
pub type PathFields<'a> = [(&'a str, &'a str)];

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_-]*)\}").expect("placeholder pattern is valid"))
}

/// A path with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathTemplate(String);

impl PathTemplate {
    /// Wraps a template string.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Returns the template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitutes the given fields and keeps all other placeholders.
    #[must_use]
    pub fn partial(&self, fields: &PathFields<'_>) -> Self {
        Self(substitute(&self.0, fields).into_owned())
    }

    /// Appends a relative template below this one.
    #[must_use]
    pub fn join(&self, child: &str) -> Self {
        let base = self.0.trim_end_matches('/');
        Self(format!("{base}/{child}"))
    }

    /// Formats the template into a path.
    #[must_use]
    pub fn format(&self, fields: &PathFields<'_>) -> PathBuf {
        PathBuf::from(substitute(&self.0, fields).into_owned())
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn substitute<'t>(template: &'t str, fields: &PathFields<'_>) -> Cow<'t, str> {
    placeholder().replace_all(template, |caps: &Captures<'_>| {
        let key = &caps[1];
        fields
            .iter()
            .find(|(k, _)| *k == key)
            .map_or_else(|| caps[0].to_string(), |(_, v)| (*v).to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_all_fields() {
        let t = PathTemplate::new("{root}/meg/{subject}/{subject}_{session}-raw.fif");
        let path = t.format(&[("root", "/exp"), ("subject", "R01"), ("session", "words")]);
        assert_eq!(path, PathBuf::from("/exp/meg/R01/R01_words-raw.fif"));
    }

    #[test]
    fn test_partial_keeps_unknown_placeholders() {
        let t = PathTemplate::new("{root}/cache/{subject} {session} {raw}-raw.fif");
        let bound = t.partial(&[("raw", "1-40")]);
        assert_eq!(bound.as_str(), "{root}/cache/{subject} {session} 1-40-raw.fif");
        let path = bound.format(&[("root", "/exp"), ("subject", "R01"), ("session", "words")]);
        assert_eq!(path, PathBuf::from("/exp/cache/R01 words 1-40-raw.fif"));
    }

    #[test]
    fn test_join() {
        let t = PathTemplate::new("{root}/meg/{subject}/");
        assert_eq!(t.join("{subject} ica-ica.fif").as_str(), "{root}/meg/{subject}/{subject} ica-ica.fif");
    }
}
