use std::fmt;

/// A manifest entry whose on-disk file has a different checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub key: String,
    pub expected: u32,
    pub actual: u32,
}

/// Result of comparing a manifest against a directory of built files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    /// Keys whose file checksum matches.
    pub matched: Vec<String>,
    /// Keys whose file exists but differs.
    pub mismatched: Vec<Mismatch>,
    /// Keys with no file in the directory.
    pub missing: Vec<String>,
}

impl ManifestDiff {
    /// Whether every entry matched.
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty()
    }
}

impl fmt::Display for ManifestDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} matched, {} mismatched, {} missing",
            self.matched.len(),
            self.mismatched.len(),
            self.missing.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_diff_is_clean() {
        assert!(ManifestDiff::default().is_clean());
    }

    #[test]
    fn test_diff_display() {
        let diff = ManifestDiff {
            matched: vec!["a".into(), "b".into()],
            mismatched: vec![],
            missing: vec!["c".into()],
        };
        assert_eq!(diff.to_string(), "2 matched, 0 mismatched, 1 missing");
        assert!(!diff.is_clean());
    }
}
