use crate::catalog::{CatalogService, ContentKey};

/// Releases a key's service handles when dropped.
///
/// Held for the duration of one key's size query, invalidation and
/// download, so every exit path (success, failure, cancellation) releases.
pub struct KeyOperationGuard<'a> {
    service: &'a dyn CatalogService,
    key: &'a ContentKey,
}

impl<'a> KeyOperationGuard<'a> {
    pub fn new(service: &'a dyn CatalogService, key: &'a ContentKey) -> Self {
        Self { service, key }
    }
}

impl Drop for KeyOperationGuard<'_> {
    fn drop(&mut self) {
        self.service.release(self.key);
    }
}
