use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use tracker_domain::{
    body::WeightEntry,
    calendar::parse_date,
    priority::{BucketDef, Buckets, Ranked},
    urgency::badge,
    Entity, ReferenceZone, TaskStatus, TrackerStore,
};
use tracker_sync::{StorageBackend, SyncOutcome, SyncReport, SyncTarget, TrackerSyncService};

use crate::cli::Command;

const PRIMARY_TARGET: &str = "primary";
const WEIGHT_WINDOW_DAYS: u32 = 30;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) document_path: PathBuf,
    pub(crate) zone: ReferenceZone,
    pub(crate) rollover_interval: Duration,
    pub(crate) due_soon_hours: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `TRACKER_*` variables; malformed values are logged
    /// and the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("TRACKER_DOCUMENT") {
            if !path.trim().is_empty() {
                config.document_path = PathBuf::from(path.trim());
            }
        }
        if let Some(name) = lookup("TRACKER_TIME_ZONE") {
            match ReferenceZone::from_name(&name) {
                Ok(zone) => config.zone = zone,
                Err(err) => warn!(%err, "ignoring TRACKER_TIME_ZONE"),
            }
        }
        if let Some(secs) = lookup("TRACKER_ROLLOVER_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(value) if value > 0 => config.rollover_interval = Duration::from_secs(value),
                _ => warn!(value = %secs, "ignoring TRACKER_ROLLOVER_SECS"),
            }
        }
        if let Some(hours) = lookup("TRACKER_DUE_SOON_HOURS") {
            match hours.trim().parse::<u32>() {
                Ok(value) => config.due_soon_hours = value,
                Err(_) => warn!(value = %hours, "ignoring TRACKER_DUE_SOON_HOURS"),
            }
        }
        config
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    pub fn zone(&self) -> ReferenceZone {
        self.zone
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from("tracker.json"),
            zone: ReferenceZone::default(),
            rollover_interval: Duration::from_secs(60),
            due_soon_hours: 3,
        }
    }
}

pub struct App {
    config: AppConfig,
    store: TrackerStore,
    sync: TrackerSyncService,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = TrackerStore::builder()
            .with_zone(config.zone)
            .build()
            .context("failed to initialize store")?;
        Self::with_store(config, store)
    }

    /// Registers the configured document, loads it into `store` and brings it
    /// forward to today.
    pub fn with_store(config: AppConfig, store: TrackerStore) -> Result<Self> {
        info!(
            path = %config.document_path.display(),
            zone = %config.zone,
            "starting tracker"
        );
        let mut sync = TrackerSyncService::new();
        sync.register_target(SyncTarget {
            id: PRIMARY_TARGET.to_string(),
            backend: StorageBackend::Local {
                path: config.document_path.clone(),
            },
            display_name: config.document_path.display().to_string(),
        })?;
        let start = Instant::now();
        sync.drain(&store)?;
        info!(elapsed_ms = %start.elapsed().as_millis(), "document ready");

        let app = Self {
            config,
            store,
            sync,
        };
        if app.store.apply_daily_rollover() > 0 {
            debug!("rollover changed the loaded document");
        }
        Ok(app)
    }

    pub fn store(&self) -> &TrackerStore {
        &self.store
    }

    pub fn execute(&mut self, command: Command) -> Result<String> {
        match command {
            Command::Agenda => Ok(self.render_agenda()),
            Command::Routines => Ok(self.render_routines()),
            Command::ToggleTask { id } => {
                let task = self.store.toggle_task(&id)?;
                self.save()?;
                Ok(format!("{} is now {}", task.title, status_label(task.status)))
            }
            Command::ToggleRoutine { id } => {
                let routine = self.store.toggle_routine(&id)?;
                self.save()?;
                let state = if routine.completed_today.is_some() {
                    "checked"
                } else {
                    "unchecked"
                };
                Ok(format!("{} {state}{}", routine.title, streak_suffix(routine.streak)))
            }
            Command::Hold { id } => {
                let task = self.store.set_task_status(&id, TaskStatus::OnHold)?;
                self.save()?;
                Ok(format!("{} is now {}", task.title, status_label(task.status)))
            }
            Command::Resume { id } => {
                let task = self.store.set_task_status(&id, TaskStatus::Pending)?;
                self.save()?;
                Ok(format!("{} is now {}", task.title, status_label(task.status)))
            }
            Command::Weigh { kilograms, date } => {
                let date = match date {
                    Some(raw) => parse_date(&raw)?,
                    None => self.store.today(),
                };
                self.store.record_weight(WeightEntry::new(date, kilograms))?;
                self.save()?;
                Ok(self.render_weight())
            }
            Command::Sync => {
                self.sync.schedule_save(PRIMARY_TARGET);
                self.sync.schedule_load(PRIMARY_TARGET);
                let reports = self.sync.drain(&self.store)?;
                Ok(reports.iter().map(describe_report).collect::<Vec<_>>().join("\n"))
            }
            Command::Watch { ticks } => {
                self.watch(ticks)?;
                Ok(String::new())
            }
        }
    }

    /// Polls the daily rollover; persists only when it changed something.
    pub fn watch(&mut self, ticks: Option<u32>) -> Result<()> {
        let mut polls = 0u32;
        loop {
            let changed = self.store.apply_daily_rollover();
            if changed > 0 {
                info!(changed, "rollover changed entities, saving");
                self.save()?;
            }
            polls += 1;
            if ticks.is_some_and(|limit| polls >= limit) {
                return Ok(());
            }
            std::thread::sleep(self.config.rollover_interval);
        }
    }

    fn save(&mut self) -> Result<()> {
        self.sync.schedule_save(PRIMARY_TARGET);
        self.sync.drain(&self.store)?;
        Ok(())
    }

    pub fn render_agenda(&self) -> String {
        let buckets = self.store.buckets(&BucketDef::dashboard());
        let mut out = self.render_buckets(&buckets);
        if let Some(trend) = self.store.weight_trend(WEIGHT_WINDOW_DAYS) {
            let _ = write!(
                out,
                "\nweight {:.1} kg ({:+.1} kg over {} entries)",
                trend.latest.kilograms, trend.change, trend.samples
            );
        }
        out
    }

    pub fn render_routines(&self) -> String {
        let entities: Vec<Entity> = self
            .store
            .snapshot()
            .routines
            .iter()
            .cloned()
            .map(Entity::Routine)
            .collect();
        let buckets = tracker_domain::priority::partition_into_buckets(
            &entities,
            &BucketDef::routine_timeline(self.config.due_soon_hours),
            &self.store.moment(),
        );
        self.render_buckets(&buckets)
    }

    fn render_weight(&self) -> String {
        match self.store.weight_trend(WEIGHT_WINDOW_DAYS) {
            Some(trend) => format!(
                "latest {:.1} kg on {}, {WEIGHT_WINDOW_DAYS}-day average {:.1} kg",
                trend.latest.kilograms, trend.latest.date, trend.average
            ),
            None => format!("no weigh-ins in the last {WEIGHT_WINDOW_DAYS} days"),
        }
    }

    fn render_buckets(&self, buckets: &Buckets) -> String {
        let today = self.store.today();
        let mut out = String::new();
        for bucket in buckets.iter().filter(|bucket| !bucket.items.is_empty()) {
            let _ = writeln!(out, "== {} ==", bucket.name.replace('_', " "));
            for item in &bucket.items {
                let _ = writeln!(out, "  {}", self.render_line(item, today));
            }
        }
        if out.is_empty() {
            out.push_str("nothing pending\n");
        }
        out.trim_end().to_string()
    }

    fn render_line(&self, ranked: &Ranked, today: chrono::NaiveDate) -> String {
        let entity = &ranked.entity;
        let mut line = format!("[{}] {}", badge(entity, &ranked.urgency), entity.title());
        if let Entity::Routine(routine) = entity {
            if routine.is_completed_on(today) {
                line.insert_str(0, "(done) ");
            }
            if let Some(time) = &routine.complete_by_time {
                let _ = write!(line, " by {time}");
            }
        }
        let groups: Vec<String> = entity
            .group_ids()
            .iter()
            .map(|id| self.store.group_name(id))
            .collect();
        if !groups.is_empty() {
            let _ = write!(line, " #{}", groups.join(" #"));
        }
        line.push_str(&streak_suffix(entity.streak()));
        line
    }
}

fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Completed => "completed",
        TaskStatus::OnHold => "on hold",
    }
}

fn streak_suffix(streak: Option<tracker_domain::model::Streak>) -> String {
    match streak {
        Some(streak) if streak.longest > 0 => {
            format!(" (streak {}, best {})", streak.current, streak.longest)
        }
        _ => String::new(),
    }
}

fn describe_report(report: &SyncReport) -> String {
    match report.outcome {
        SyncOutcome::Loaded {
            groups,
            tasks,
            routines,
        } => format!("loaded {tasks} tasks, {routines} routines, {groups} groups"),
        SyncOutcome::Saved => "saved".to_string(),
        SyncOutcome::Skipped => "already up to date".to_string(),
    }
}
