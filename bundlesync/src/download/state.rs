//! Per-session download bookkeeping.
//!
//! A session tracks which keys are still pending and which are downloaded.
//! Every key in the session is in exactly one of the two sets, and a key
//! only moves from pending to downloaded together with the progress update.

use std::collections::HashSet;

use crate::catalog::ContentKey;

/// Download state for one key set.
#[derive(Debug, Clone)]
pub struct DownloadSession {
    /// Keys not yet downloaded, in insertion order.
    pending: Vec<ContentKey>,
    /// Keys downloaded (or skipped) this session.
    downloaded: HashSet<ContentKey>,
    /// Size of the key set when the session began.
    total: usize,
    /// Keys moved to `downloaded` so far.
    num_downloaded: usize,
    /// `num_downloaded / total * 100`.
    percentage: f32,
    /// A key failed during the current pass.
    has_error: bool,
    /// Keys that failed during the current pass.
    failed: Vec<ContentKey>,
}

impl DownloadSession {
    /// Start a session for `keys`. Duplicate keys are dropped.
    pub fn new(keys: Vec<ContentKey>) -> Self {
        let mut seen = HashSet::new();
        let pending: Vec<ContentKey> = keys
            .into_iter()
            .filter(|k| seen.insert(k.clone()))
            .collect();
        let total = pending.len();

        Self {
            pending,
            downloaded: HashSet::new(),
            total,
            num_downloaded: 0,
            percentage: if total == 0 { 100.0 } else { 0.0 },
            has_error: false,
            failed: Vec::new(),
        }
    }

    /// Keys still to download, in pass order.
    pub fn pending(&self) -> &[ContentKey] {
        &self.pending
    }

    /// Keys downloaded so far in this session.
    pub fn downloaded(&self) -> &HashSet<ContentKey> {
        &self.downloaded
    }

    /// Number of distinct keys in the session.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of keys downloaded so far.
    pub fn num_downloaded(&self) -> usize {
        self.num_downloaded
    }

    /// Progress from 0 to 100. An empty session is at 100.
    pub fn percentage(&self) -> f32 {
        self.percentage
    }

    /// Whether any key failed during the current pass.
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    /// Keys that failed during the current pass.
    pub fn failed(&self) -> &[ContentKey] {
        &self.failed
    }

    /// Check if `key` has been downloaded.
    pub fn is_downloaded(&self, key: &ContentKey) -> bool {
        self.downloaded.contains(key)
    }

    /// All keys are downloaded.
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Move `key` from pending to downloaded and recompute progress.
    ///
    /// Returns the new percentage, or `None` if the key was not pending.
    pub fn record_success(&mut self, key: &ContentKey) -> Option<f32> {
        let index = self.pending.iter().position(|k| k == key)?;
        self.pending.remove(index);
        self.downloaded.insert(key.clone());
        self.num_downloaded += 1;
        self.percentage = (self.num_downloaded as f32 / self.total as f32) * 100.0;
        Some(self.percentage)
    }

    /// Record a failed key. The key stays pending.
    pub fn record_failure(&mut self, key: &ContentKey) {
        self.has_error = true;
        if !self.failed.contains(key) {
            self.failed.push(key.clone());
        }
    }

    /// Take and clear the failures of the current pass.
    pub fn take_failures(&mut self) -> Vec<ContentKey> {
        self.has_error = false;
        std::mem::take(&mut self.failed)
    }

    /// Prepare for another pass over the remaining keys.
    ///
    /// Recomputes `pending = pending \ downloaded` and clears the error
    /// state. Progress carries over.
    pub fn resume(&mut self) {
        let downloaded = &self.downloaded;
        self.pending.retain(|k| !downloaded.contains(k));
        self.has_error = false;
        self.failed.clear();
    }

    /// `pending ∩ downloaded = ∅` and `|pending| + |downloaded| = total`.
    pub fn invariant_holds(&self) -> bool {
        let disjoint = self.pending.iter().all(|k| !self.downloaded.contains(k));
        disjoint && self.pending.len() + self.downloaded.len() == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys(values: &[&str]) -> Vec<ContentKey> {
        values.iter().map(|k| ContentKey::from(*k)).collect()
    }

    #[test]
    fn test_new_session() {
        let session = DownloadSession::new(keys(&["a", "b", "a"]));
        assert_eq!(session.total(), 2);
        assert_eq!(session.pending(), keys(&["a", "b"]).as_slice());
        assert_eq!(session.percentage(), 0.0);
        assert!(!session.is_complete());
        assert!(session.invariant_holds());
    }

    #[test]
    fn test_empty_session_is_complete() {
        let session = DownloadSession::new(Vec::new());
        assert!(session.is_complete());
        assert_eq!(session.percentage(), 100.0);
    }

    #[test]
    fn test_record_success_moves_key() {
        let mut session = DownloadSession::new(keys(&["a", "b", "c", "d"]));
        assert_eq!(session.record_success(&ContentKey::from("b")), Some(25.0));
        assert_eq!(session.pending(), keys(&["a", "c", "d"]).as_slice());
        assert!(session.is_downloaded(&ContentKey::from("b")));
        assert_eq!(session.num_downloaded(), 1);
        assert!(session.invariant_holds());
    }

    #[test]
    fn test_record_success_twice_is_noop() {
        let mut session = DownloadSession::new(keys(&["a", "b"]));
        session.record_success(&ContentKey::from("a"));
        assert_eq!(session.record_success(&ContentKey::from("a")), None);
        assert_eq!(session.num_downloaded(), 1);
    }

    #[test]
    fn test_failure_keeps_key_pending() {
        let mut session = DownloadSession::new(keys(&["a", "b"]));
        session.record_failure(&ContentKey::from("a"));
        session.record_failure(&ContentKey::from("a"));

        assert!(session.has_error());
        assert_eq!(session.failed(), keys(&["a"]).as_slice());
        assert_eq!(session.pending().len(), 2);
        assert_eq!(session.take_failures(), keys(&["a"]));
        assert!(!session.has_error());
    }

    #[test]
    fn test_resume_keeps_progress() {
        let mut session = DownloadSession::new(keys(&["a", "b"]));
        session.record_success(&ContentKey::from("a"));
        session.record_failure(&ContentKey::from("b"));
        session.resume();

        assert_eq!(session.pending(), keys(&["b"]).as_slice());
        assert_eq!(session.percentage(), 50.0);
        assert!(!session.has_error());
        assert!(session.invariant_holds());
    }

    proptest! {
        #[test]
        fn prop_invariant_holds_under_any_outcomes(
            n in 0usize..40,
            outcomes in proptest::collection::vec(any::<bool>(), 0..40),
        ) {
            let all: Vec<ContentKey> = (0..n).map(|i| ContentKey::new(format!("k{}", i))).collect();
            let mut session = DownloadSession::new(all.clone());
            let mut last = session.percentage();

            for (key, ok) in all.iter().zip(outcomes.iter()) {
                if *ok {
                    let pct = session.record_success(key).unwrap();
                    prop_assert!(pct >= last);
                    last = pct;
                } else {
                    session.record_failure(key);
                }
                prop_assert!(session.invariant_holds());
            }

            session.resume();
            prop_assert!(session.invariant_holds());
            prop_assert_eq!(session.num_downloaded(), session.downloaded().len());
        }
    }
}
