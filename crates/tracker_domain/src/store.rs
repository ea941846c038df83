use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::{
    body::{weight_trend, WeightEntry, WeightTrend},
    calendar::{Moment, ReferenceZone},
    clock::{Clock, SystemClock},
    document::TrackerDocument,
    error::DomainError,
    model::{Group, Routine, Task, TaskStatus},
    mutation,
    persistence::{DocumentProvider, PersistenceError},
    priority::{partition_into_buckets, rank_entities, BucketDef, Buckets, Ranked},
};

/// Label shown for group ids that no longer resolve.
pub const UNKNOWN_GROUP: &str = "Unknown";

struct StoreState {
    document: Arc<TrackerDocument>,
    dirty: bool,
}

/// In-memory owner of the tracker document.
///
/// Every mutation builds a fresh document and swaps it in, so an
/// `Arc<TrackerDocument>` obtained from [`TrackerStore::snapshot`] never
/// changes underneath its holder. There is no locking against other writers
/// of the persisted copy: the last save wins.
pub struct TrackerStore {
    state: RwLock<StoreState>,
    zone: ReferenceZone,
    clock: Arc<dyn Clock>,
}

pub struct TrackerStoreBuilder {
    zone: ReferenceZone,
    clock: Option<Arc<dyn Clock>>,
    document: TrackerDocument,
}

impl TrackerStoreBuilder {
    pub fn new() -> Self {
        Self {
            zone: ReferenceZone::default(),
            clock: None,
            document: TrackerDocument::default(),
        }
    }

    pub fn with_zone(mut self, zone: ReferenceZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_document(mut self, document: TrackerDocument) -> Self {
        self.document = document;
        self
    }

    pub fn build(self) -> Result<TrackerStore, DomainError> {
        self.document.validate()?;
        Ok(TrackerStore {
            state: RwLock::new(StoreState {
                document: Arc::new(self.document),
                dirty: false,
            }),
            zone: self.zone,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

impl Default for TrackerStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerStore {
    pub fn builder() -> TrackerStoreBuilder {
        TrackerStoreBuilder::new()
    }

    pub fn zone(&self) -> ReferenceZone {
        self.zone
    }

    pub fn moment(&self) -> Moment {
        self.zone.moment(self.clock.now())
    }

    pub fn today(&self) -> chrono::NaiveDate {
        self.moment().today()
    }

    pub fn snapshot(&self) -> Arc<TrackerDocument> {
        Arc::clone(&self.state.read().document)
    }

    /// True when the in-memory document has changes not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.state.read().dirty
    }

    pub fn replace(&self, document: TrackerDocument) -> Result<(), DomainError> {
        document.validate()?;
        let mut state = self.state.write();
        state.document = Arc::new(document);
        state.dirty = true;
        Ok(())
    }

    /// Replaces the in-memory document with the provider's copy. On failure
    /// the current document stays as it was.
    #[instrument(skip_all)]
    pub fn load_from(&self, provider: &dyn DocumentProvider) -> Result<Arc<TrackerDocument>, PersistenceError> {
        let document = match provider.load().and_then(|doc| {
            doc.validate()?;
            Ok(doc)
        }) {
            Ok(document) => Arc::new(document),
            Err(err) => {
                warn!(%err, "load failed, keeping in-memory document");
                return Err(err);
            }
        };
        let mut state = self.state.write();
        state.document = Arc::clone(&document);
        state.dirty = false;
        info!(
            tasks = document.tasks.len(),
            routines = document.routines.len(),
            groups = document.groups.len(),
            "document loaded"
        );
        Ok(document)
    }

    /// Writes the current snapshot through the provider, overwriting whatever
    /// it holds.
    #[instrument(skip_all)]
    pub fn save_to(&self, provider: &dyn DocumentProvider) -> Result<(), PersistenceError> {
        let document = self.snapshot();
        if let Err(err) = provider.save(&document) {
            warn!(%err, "save failed, changes remain unsynced");
            return Err(err);
        }
        let mut state = self.state.write();
        // A mutation that landed while saving keeps the store dirty.
        if Arc::ptr_eq(&state.document, &document) {
            state.dirty = false;
        }
        info!("document saved");
        Ok(())
    }

    pub fn group_name(&self, id: &str) -> String {
        self.snapshot()
            .group(id)
            .map(|group| group.name.clone())
            .unwrap_or_else(|| UNKNOWN_GROUP.to_string())
    }

    pub fn add_group(&self, group: Group) -> Result<(), DomainError> {
        group.validate()?;
        self.mutate(|doc| {
            if doc.group(&group.id).is_some() {
                return Err(DomainError::DuplicateId {
                    kind: "group",
                    id: group.id.clone(),
                });
            }
            doc.groups.push(group);
            Ok(())
        })
    }

    pub fn update_group(&self, group: Group) -> Result<(), DomainError> {
        group.validate()?;
        self.mutate(|doc| {
            let slot = doc
                .groups
                .iter_mut()
                .find(|existing| existing.id == group.id)
                .ok_or_else(|| DomainError::not_found("group", &group.id))?;
            *slot = group;
            Ok(())
        })
    }

    /// Removes the group only; tasks and routines keep the now dangling id.
    pub fn delete_group(&self, id: &str) -> Result<Group, DomainError> {
        self.mutate(|doc| take_by_id(&mut doc.groups, "group", id, |group| &group.id))
    }

    #[instrument(skip_all, fields(id = %task.id))]
    pub fn add_task(&self, mut task: Task) -> Result<(), DomainError> {
        task.validate()?;
        task.created_at.get_or_insert_with(|| self.clock.now());
        self.mutate(|doc| {
            if doc.tasks.iter().any(|existing| existing.id == task.id) {
                return Err(DomainError::DuplicateId {
                    kind: "task",
                    id: task.id.clone(),
                });
            }
            doc.tasks.push(task);
            Ok(())
        })
    }

    #[instrument(skip_all, fields(id = %task.id))]
    pub fn update_task(&self, task: Task) -> Result<(), DomainError> {
        task.validate()?;
        self.mutate(|doc| {
            let slot = find_mut(&mut doc.tasks, "task", &task.id, |t| &t.id)?;
            *slot = task;
            Ok(())
        })
    }

    pub fn delete_task(&self, id: &str) -> Result<Task, DomainError> {
        self.mutate(|doc| take_by_id(&mut doc.tasks, "task", id, |task| &task.id))
    }

    #[instrument(skip(self))]
    pub fn toggle_task(&self, id: &str) -> Result<Task, DomainError> {
        let moment = self.moment();
        self.mutate(|doc| {
            let slot = find_mut(&mut doc.tasks, "task", id, |t| &t.id)?;
            *slot = mutation::toggle_task(slot, &moment);
            debug!(status = ?slot.status, "task toggled");
            Ok(slot.clone())
        })
    }

    /// Moves a task to `status`. Transitions into or out of `Completed` go
    /// through the toggle so history and streaks stay consistent.
    #[instrument(skip(self))]
    pub fn set_task_status(&self, id: &str, status: TaskStatus) -> Result<Task, DomainError> {
        let moment = self.moment();
        self.mutate(|doc| {
            let slot = find_mut(&mut doc.tasks, "task", id, |t| &t.id)?;
            if slot.status == status {
                return Ok(slot.clone());
            }
            if slot.status == TaskStatus::Completed || status == TaskStatus::Completed {
                *slot = mutation::toggle_task(slot, &moment);
            }
            slot.status = status;
            Ok(slot.clone())
        })
    }

    #[instrument(skip_all, fields(id = %routine.id))]
    pub fn add_routine(&self, routine: Routine) -> Result<(), DomainError> {
        routine.validate()?;
        self.mutate(|doc| {
            if doc.routines.iter().any(|existing| existing.id == routine.id) {
                return Err(DomainError::DuplicateId {
                    kind: "routine",
                    id: routine.id.clone(),
                });
            }
            doc.routines.push(routine);
            Ok(())
        })
    }

    #[instrument(skip_all, fields(id = %routine.id))]
    pub fn update_routine(&self, routine: Routine) -> Result<(), DomainError> {
        routine.validate()?;
        self.mutate(|doc| {
            let slot = find_mut(&mut doc.routines, "routine", &routine.id, |r| &r.id)?;
            *slot = routine;
            Ok(())
        })
    }

    pub fn delete_routine(&self, id: &str) -> Result<Routine, DomainError> {
        self.mutate(|doc| take_by_id(&mut doc.routines, "routine", id, |routine| &routine.id))
    }

    #[instrument(skip(self))]
    pub fn toggle_routine(&self, id: &str) -> Result<Routine, DomainError> {
        let today = self.today();
        self.mutate(|doc| {
            let slot = find_mut(&mut doc.routines, "routine", id, |r| &r.id)?;
            *slot = mutation::toggle_routine(slot, today);
            debug!(completed = slot.completed_today.is_some(), "routine toggled");
            Ok(slot.clone())
        })
    }

    /// Records a weigh-in, replacing any entry for the same day.
    pub fn record_weight(&self, entry: WeightEntry) -> Result<(), DomainError> {
        entry.validate()?;
        self.mutate(|doc| {
            doc.weights.retain(|existing| existing.date != entry.date);
            doc.weights.push(entry);
            doc.weights.sort_by_key(|existing| existing.date);
            Ok(())
        })
    }

    pub fn weight_trend(&self, window_days: u32) -> Option<WeightTrend> {
        weight_trend(&self.snapshot().weights, self.today(), window_days)
    }

    /// Applies the day change to every task and routine. Returns how many
    /// entities changed; when none did, the snapshot is left as is.
    #[instrument(skip(self))]
    pub fn apply_daily_rollover(&self) -> usize {
        let today = self.today();
        let mut state = self.state.write();
        let current = Arc::clone(&state.document);
        let tasks: Vec<Task> = current
            .tasks
            .iter()
            .map(|task| mutation::rollover_task(task, today))
            .collect();
        let routines: Vec<Routine> = current
            .routines
            .iter()
            .map(|routine| mutation::rollover_routine(routine, today))
            .collect();
        let changed = tasks.iter().zip(&current.tasks).filter(|(a, b)| a != b).count()
            + routines
                .iter()
                .zip(&current.routines)
                .filter(|(a, b)| a != b)
                .count();
        if changed > 0 {
            let mut next = (*current).clone();
            next.tasks = tasks;
            next.routines = routines;
            state.document = Arc::new(next);
            state.dirty = true;
            info!(changed, %today, "daily rollover applied");
        }
        changed
    }

    pub fn prioritized(&self) -> Vec<Ranked> {
        rank_entities(&self.snapshot().entities(), self.today())
    }

    pub fn buckets(&self, defs: &[BucketDef]) -> Buckets {
        partition_into_buckets(&self.snapshot().entities(), defs, &self.moment())
    }

    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut TrackerDocument) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let mut state = self.state.write();
        let mut next = (*state.document).clone();
        let output = apply(&mut next)?;
        state.document = Arc::new(next);
        state.dirty = true;
        Ok(output)
    }
}

fn find_mut<'a, T>(
    items: &'a mut [T],
    kind: &'static str,
    id: &str,
    key: impl Fn(&T) -> &String,
) -> Result<&'a mut T, DomainError> {
    items
        .iter_mut()
        .find(|item| key(item) == id)
        .ok_or_else(|| DomainError::not_found(kind, id))
}

fn take_by_id<T>(
    items: &mut Vec<T>,
    kind: &'static str,
    id: &str,
    key: impl Fn(&T) -> &String,
) -> Result<T, DomainError> {
    let idx = items
        .iter()
        .position(|item| key(item) == id)
        .ok_or_else(|| DomainError::not_found(kind, id))?;
    Ok(items.remove(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::Streak;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use parking_lot::Mutex;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store_at(y: i32, m: u32, d: u32) -> (TrackerStore, Arc<FixedClock>) {
        // 03:30 UTC is 09:00 in Kolkata, same calendar day.
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(y, m, d, 3, 30, 0).unwrap()));
        let store = TrackerStore::builder()
            .with_clock(clock.clone())
            .build()
            .unwrap();
        (store, clock)
    }

    #[derive(Default)]
    struct MemoryProvider {
        stored: Mutex<Option<TrackerDocument>>,
        fail: bool,
    }

    impl DocumentProvider for MemoryProvider {
        fn load(&self) -> Result<TrackerDocument, PersistenceError> {
            if self.fail {
                return Err(PersistenceError::Unavailable("offline".into()));
            }
            Ok(self.stored.lock().clone().unwrap_or_default())
        }

        fn save(&self, document: &TrackerDocument) -> Result<(), PersistenceError> {
            if self.fail {
                return Err(PersistenceError::Unavailable("offline".into()));
            }
            *self.stored.lock() = Some(document.clone());
            Ok(())
        }
    }

    #[test]
    fn snapshots_are_unaffected_by_later_mutations() {
        let (store, _) = store_at(2024, 6, 9);
        store
            .add_task(Task::deadline("t1", "Dentist", date(2024, 6, 10)))
            .unwrap();
        let before = store.snapshot();
        store.toggle_task("t1").unwrap();
        store.delete_task("t1").unwrap();

        assert_eq!(before.tasks.len(), 1);
        assert_eq!(before.tasks[0].status, TaskStatus::Pending);
        assert!(store.snapshot().tasks.is_empty());
        assert!(!Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn add_task_stamps_creation_and_rejects_duplicates() {
        let (store, clock) = store_at(2024, 6, 9);
        store.add_task(Task::repeating("t1", "Bins", 7)).unwrap();
        assert_eq!(store.snapshot().tasks[0].created_at, Some(clock.now()));
        assert!(matches!(
            store.add_task(Task::repeating("t1", "Bins again", 7)),
            Err(DomainError::DuplicateId { kind: "task", .. })
        ));
        assert!(store.add_task(Task::repeating("t2", "Zero", 0)).is_err());
        assert_eq!(store.snapshot().tasks.len(), 1);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let (store, _) = store_at(2024, 6, 9);
        assert!(matches!(
            store.toggle_routine("nope"),
            Err(DomainError::NotFound { kind: "routine", .. })
        ));
        assert!(store.delete_task("nope").is_err());
        assert!(!store.is_dirty());
    }

    #[test]
    fn deleting_a_group_leaves_dangling_references() {
        let (store, _) = store_at(2024, 6, 9);
        store.add_group(Group::new("g1", "Fitness")).unwrap();
        store
            .add_routine(Routine::new("r1", "Squats").with_group("g1"))
            .unwrap();
        assert_eq!(store.group_name("g1"), "Fitness");

        store.delete_group("g1").unwrap();
        let snapshot = store.snapshot();
        assert!(snapshot.routines[0].group_ids.contains("g1"));
        assert_eq!(store.group_name("g1"), UNKNOWN_GROUP);
    }

    #[test]
    fn routine_streak_follows_the_clock() {
        let (store, clock) = store_at(2024, 1, 1);
        store
            .add_routine(Routine::new("r1", "Journal").tracking_streak())
            .unwrap();
        for _ in 0..3 {
            store.toggle_routine("r1").unwrap();
            clock.advance(Duration::days(1));
            store.apply_daily_rollover();
        }
        // Now 2024-01-04, nothing logged yet today.
        let routine = store.snapshot().routines[0].clone();
        assert_eq!(routine.completed_today, None);
        assert_eq!(
            routine.streak,
            Some(Streak {
                current: 0,
                longest: 3
            })
        );

        let routine = store.toggle_routine("r1").unwrap();
        assert_eq!(
            routine.streak,
            Some(Streak {
                current: 4,
                longest: 4
            })
        );
    }

    #[test]
    fn rollover_without_changes_keeps_snapshot() {
        let (store, _) = store_at(2024, 6, 9);
        store
            .add_task(Task::deadline("t1", "Dentist", date(2024, 6, 10)))
            .unwrap();
        let before = store.snapshot();
        assert_eq!(store.apply_daily_rollover(), 0);
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn status_changes_route_through_toggle() {
        let (store, _) = store_at(2024, 6, 9);
        store
            .add_task(Task::deadline("t1", "Dentist", date(2024, 6, 10)))
            .unwrap();
        let held = store.set_task_status("t1", TaskStatus::OnHold).unwrap();
        assert_eq!(held.status, TaskStatus::OnHold);
        assert!(store.prioritized().is_empty());

        let done = store.set_task_status("t1", TaskStatus::Completed).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());

        let reopened = store.set_task_status("t1", TaskStatus::Pending).unwrap();
        assert_eq!(reopened.status, TaskStatus::Pending);
        assert!(reopened.completed_at.is_none());
        assert!(reopened.history.is_empty());
    }

    #[test]
    fn failed_load_keeps_current_document() {
        let (store, _) = store_at(2024, 6, 9);
        store.add_routine(Routine::new("r1", "Walk")).unwrap();
        let offline = MemoryProvider {
            fail: true,
            ..MemoryProvider::default()
        };
        assert!(store.load_from(&offline).is_err());
        assert_eq!(store.snapshot().routines.len(), 1);
        assert!(store.save_to(&offline).is_err());
        assert!(store.is_dirty());
    }

    #[test]
    fn save_then_load_round_trips_and_clears_dirty() {
        let (store, _) = store_at(2024, 6, 9);
        let provider = MemoryProvider::default();
        store.add_routine(Routine::new("r1", "Walk")).unwrap();
        store
            .record_weight(WeightEntry::new(date(2024, 6, 9), 80.2))
            .unwrap();
        assert!(store.is_dirty());
        store.save_to(&provider).unwrap();
        assert!(!store.is_dirty());

        let (other, _) = store_at(2024, 6, 9);
        let loaded = other.load_from(&provider).unwrap();
        assert_eq!(*loaded, *store.snapshot());
        assert!(!other.is_dirty());
        assert!(other.weight_trend(7).is_some());
    }

    #[test]
    fn invalid_stored_document_is_rejected() {
        let (store, _) = store_at(2024, 6, 9);
        let mut bad = TrackerDocument::default();
        bad.tasks.push(Task::repeating("t", "Zero cadence", 0));
        let provider = MemoryProvider {
            stored: Mutex::new(Some(bad)),
            fail: false,
        };
        assert!(matches!(
            store.load_from(&provider),
            Err(PersistenceError::Invalid(_))
        ));
    }

    #[test]
    fn buckets_use_the_store_clock() {
        let (store, _) = store_at(2024, 6, 9);
        store
            .add_task(Task::deadline("t1", "Overdue thing", date(2024, 6, 1)))
            .unwrap();
        store
            .add_task(Task::deadline("t2", "Later thing", date(2024, 8, 1)))
            .unwrap();
        let buckets = store.buckets(&BucketDef::dashboard());
        assert_eq!(buckets.titles("today"), vec!["Overdue thing"]);
        assert_eq!(buckets.titles("later"), vec!["Later thing"]);
    }
}
