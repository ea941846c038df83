use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tracker_domain::{DocumentProvider, TrackerStore};

pub mod file;
pub mod memory;

pub use crate::file::FileProvider;
pub use crate::memory::MemoryProvider;

/// Where a tracker document is kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncTarget {
    pub id: String,
    pub backend: StorageBackend,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageBackend {
    Local { path: PathBuf },
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncJob {
    pub target_id: String,
    pub job_kind: SyncJobKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncJobKind {
    InitialLoad,
    Load,
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Loaded {
        groups: usize,
        tasks: usize,
        routines: usize,
    },
    Saved,
    /// Nothing to save.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub target_id: String,
    pub job_kind: SyncJobKind,
    pub outcome: SyncOutcome,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    fn new(job: &SyncJob, outcome: SyncOutcome) -> Self {
        Self {
            target_id: job.target_id.clone(),
            job_kind: job.job_kind,
            outcome,
            finished_at: Utc::now(),
        }
    }
}

/// Runs explicit load and save jobs between a [`TrackerStore`] and its
/// registered storage targets. Jobs run only when dequeued and performed by
/// the caller; failures are returned as-is and nothing is retried.
#[derive(Default)]
pub struct TrackerSyncService {
    targets: Vec<SyncTarget>,
    providers: HashMap<String, Arc<dyn DocumentProvider>>,
    pending_jobs: VecDeque<SyncJob>,
}

impl TrackerSyncService {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self))]
    pub fn register_target(&mut self, target: SyncTarget) -> Result<()> {
        let provider = build_provider(&target)?;
        self.register_with_provider(target, provider);
        Ok(())
    }

    /// Registers a target backed by a caller-supplied provider. Registering
    /// an id twice is a no-op.
    pub fn register_with_provider(&mut self, target: SyncTarget, provider: Arc<dyn DocumentProvider>) {
        if self.targets.iter().any(|existing| existing.id == target.id) {
            return;
        }
        self.pending_jobs.push_back(SyncJob {
            target_id: target.id.clone(),
            job_kind: SyncJobKind::InitialLoad,
        });
        self.providers.insert(target.id.clone(), provider);
        self.targets.push(target);
    }

    pub fn list_targets(&self) -> &[SyncTarget] {
        &self.targets
    }

    pub fn dequeue_job(&mut self) -> Option<SyncJob> {
        self.pending_jobs.pop_front()
    }

    pub fn schedule_load(&mut self, target_id: &str) {
        self.pending_jobs.push_back(SyncJob {
            target_id: target_id.to_string(),
            job_kind: SyncJobKind::Load,
        });
    }

    pub fn schedule_save(&mut self, target_id: &str) {
        self.pending_jobs.push_back(SyncJob {
            target_id: target_id.to_string(),
            job_kind: SyncJobKind::Save,
        });
    }

    /// Performs every queued job in order, stopping at the first failure.
    pub fn drain(&mut self, store: &TrackerStore) -> Result<Vec<SyncReport>> {
        let mut reports = Vec::new();
        while let Some(job) = self.dequeue_job() {
            reports.push(self.perform_job(job, store)?);
        }
        Ok(reports)
    }

    #[instrument(skip(self, store))]
    pub fn perform_job(&self, job: SyncJob, store: &TrackerStore) -> Result<SyncReport> {
        let target = self
            .targets
            .iter()
            .find(|candidate| candidate.id == job.target_id)
            .with_context(|| format!("unknown sync target `{}`", job.target_id))?;
        let provider = self
            .providers
            .get(&target.id)
            .with_context(|| format!("no provider for sync target `{}`", target.id))?;

        match job.job_kind {
            SyncJobKind::InitialLoad | SyncJobKind::Load => {
                let document = store
                    .load_from(provider.as_ref())
                    .with_context(|| format!("failed to load from `{}`", target.display_name))?;
                Ok(SyncReport::new(
                    &job,
                    SyncOutcome::Loaded {
                        groups: document.groups.len(),
                        tasks: document.tasks.len(),
                        routines: document.routines.len(),
                    },
                ))
            }
            SyncJobKind::Save if !store.is_dirty() => {
                tracing::debug!(target_id = %target.id, "nothing to save");
                Ok(SyncReport::new(&job, SyncOutcome::Skipped))
            }
            SyncJobKind::Save => {
                store
                    .save_to(provider.as_ref())
                    .with_context(|| format!("failed to save to `{}`", target.display_name))?;
                Ok(SyncReport::new(&job, SyncOutcome::Saved))
            }
        }
    }
}

pub fn build_provider(target: &SyncTarget) -> Result<Arc<dyn DocumentProvider>> {
    match &target.backend {
        StorageBackend::Local { path } => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                anyhow::ensure!(
                    parent.is_dir(),
                    "directory for sync target `{}` does not exist",
                    parent.display()
                );
            }
            Ok(Arc::new(FileProvider::new(path)))
        }
        StorageBackend::Memory => {
            tracing::debug!(target_id = %target.id, "using in-memory storage");
            Ok(Arc::new(MemoryProvider::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_domain::{Routine, TrackerDocument};

    fn memory_target(id: &str) -> SyncTarget {
        SyncTarget {
            id: id.into(),
            backend: StorageBackend::Memory,
            display_name: "Scratch".into(),
        }
    }

    #[test]
    fn register_target_queues_initial_load() {
        let mut service = TrackerSyncService::new();
        service.register_target(memory_target("mem")).unwrap();
        service.register_target(memory_target("mem")).unwrap();

        assert_eq!(service.list_targets().len(), 1);
        assert!(matches!(
            service.dequeue_job(),
            Some(SyncJob {
                job_kind: SyncJobKind::InitialLoad,
                ..
            })
        ));
        assert!(service.dequeue_job().is_none());
    }

    #[test]
    fn missing_local_directory_is_rejected() {
        let mut service = TrackerSyncService::new();
        let result = service.register_target(SyncTarget {
            id: "local".into(),
            backend: StorageBackend::Local {
                path: PathBuf::from("/definitely/not/here/tracker.json"),
            },
            display_name: "Local".into(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn save_is_skipped_when_clean_and_runs_when_dirty() {
        let mut service = TrackerSyncService::new();
        let provider = Arc::new(MemoryProvider::new());
        service.register_with_provider(memory_target("mem"), provider.clone());
        let store = TrackerStore::builder().build().unwrap();

        service.schedule_save("mem");
        let reports = service.drain(&store).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].outcome, SyncOutcome::Skipped);
        assert_eq!(provider.save_count(), 0);

        store.add_routine(Routine::new("r", "Swim")).unwrap();
        service.schedule_save("mem");
        let report = service.drain(&store).unwrap().remove(0);
        assert_eq!(report.outcome, SyncOutcome::Saved);
        assert_eq!(provider.save_count(), 1);
        assert!(!store.is_dirty());
    }

    #[test]
    fn failed_load_surfaces_error_and_keeps_store() {
        let mut service = TrackerSyncService::new();
        let provider = Arc::new(MemoryProvider::with_document(&TrackerDocument::default()).unwrap());
        provider.set_offline(true);
        service.register_with_provider(memory_target("mem"), provider);
        let store = TrackerStore::builder().build().unwrap();
        store.add_routine(Routine::new("r", "Swim")).unwrap();

        let err = service.drain(&store).unwrap_err();
        assert!(format!("{err:#}").contains("offline"));
        assert_eq!(store.snapshot().routines.len(), 1);
    }

    #[test]
    fn unknown_target_is_an_error() {
        let service = TrackerSyncService::new();
        let store = TrackerStore::builder().build().unwrap();
        let job = SyncJob {
            target_id: "ghost".into(),
            job_kind: SyncJobKind::Load,
        };
        assert!(service.perform_job(job, &store).is_err());
    }
}
