use parking_lot::Mutex;
use tracker_domain::{DocumentProvider, PersistenceError, TrackerDocument};

/// Keeps the serialised document in memory. Useful for scratch sessions and
/// tests; can be switched offline to exercise failure paths.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    stored: Mutex<Option<String>>,
    offline: Mutex<bool>,
    saves: Mutex<usize>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: &TrackerDocument) -> Result<Self, PersistenceError> {
        let provider = Self::default();
        *provider.stored.lock() = Some(document.to_json()?);
        Ok(provider)
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        let provider = Self::default();
        *provider.stored.lock() = Some(raw.into());
        provider
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    pub fn raw(&self) -> Option<String> {
        self.stored.lock().clone()
    }

    fn ensure_online(&self) -> Result<(), PersistenceError> {
        if *self.offline.lock() {
            return Err(PersistenceError::Unavailable("memory provider is offline".into()));
        }
        Ok(())
    }
}

impl DocumentProvider for MemoryProvider {
    fn load(&self) -> Result<TrackerDocument, PersistenceError> {
        self.ensure_online()?;
        match self.stored.lock().as_deref() {
            Some(raw) => Ok(TrackerDocument::from_json(raw)?),
            None => Ok(TrackerDocument::default()),
        }
    }

    fn save(&self, document: &TrackerDocument) -> Result<(), PersistenceError> {
        self.ensure_online()?;
        *self.stored.lock() = Some(document.to_json()?);
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_provider_fails_both_ways() {
        let provider = MemoryProvider::new();
        provider.set_offline(true);
        assert!(matches!(provider.load(), Err(PersistenceError::Unavailable(_))));
        assert!(provider.save(&TrackerDocument::default()).is_err());
        assert_eq!(provider.save_count(), 0);
    }

    #[test]
    fn garbage_is_reported_as_parse_error() {
        let provider = MemoryProvider::with_raw("{\"tasks\": 7}");
        assert!(matches!(provider.load(), Err(PersistenceError::Parse(_))));
    }
}
