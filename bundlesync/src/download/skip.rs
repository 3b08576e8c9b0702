use crate::catalog::ContentKey;

/// Operator override list of keys that are never downloaded.
///
/// A key is skipped when it contains any pattern (case-sensitive).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipList {
    patterns: Vec<String>,
}

impl SkipList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// The configured patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check if no patterns are configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The first pattern `key` contains, if any.
    pub fn matching(&self, key: &ContentKey) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| key.as_str().contains(p.as_str()))
            .map(String::as_str)
    }
}
