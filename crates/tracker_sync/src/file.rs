use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use tracker_domain::{DocumentProvider, PersistenceError, TrackerDocument};

/// Fingerprint of the stored bytes, used as the save precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision(u64);

impl Revision {
    fn of(bytes: &[u8]) -> Self {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Whole-document JSON file.
///
/// The revision seen at the last load or save is remembered. If the file has
/// changed or disappeared by the time of the next save, the save still goes
/// ahead and overwrites or recreates it: there is no conflict detection, the
/// last writer wins.
#[derive(Debug)]
pub struct FileProvider {
    path: PathBuf,
    revision: Mutex<Option<Revision>>,
}

impl FileProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            revision: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn revision(&self) -> Option<Revision> {
        *self.revision.lock()
    }

    fn read_current(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl DocumentProvider for FileProvider {
    fn load(&self) -> Result<TrackerDocument, PersistenceError> {
        let Some(bytes) = self.read_current()? else {
            info!(path = %self.path.display(), "no stored document yet, starting empty");
            *self.revision.lock() = None;
            return Ok(TrackerDocument::default());
        };
        let document: TrackerDocument = serde_json::from_slice(&bytes)?;
        *self.revision.lock() = Some(Revision::of(&bytes));
        debug!(path = %self.path.display(), bytes = bytes.len(), "document read");
        Ok(document)
    }

    fn save(&self, document: &TrackerDocument) -> Result<(), PersistenceError> {
        let payload = document.to_json()?;
        let mut revision = self.revision.lock();
        match (self.read_current()?, *revision) {
            (Some(bytes), Some(seen)) if Revision::of(&bytes) != seen => {
                warn!(path = %self.path.display(), "stored document changed since last sync, overwriting");
            }
            (None, Some(_)) => {
                warn!(path = %self.path.display(), "stored document vanished, recreating");
            }
            _ => {}
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, payload.as_bytes())?;
        fs::rename(&staging, &self.path)?;
        *revision = Some(Revision::of(payload.as_bytes()));
        debug!(path = %self.path.display(), bytes = payload.len(), "document written");
        Ok(())
    }
}
