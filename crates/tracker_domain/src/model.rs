use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{calendar::parse_time_of_day, error::DomainError};

/// Longest accepted repeat cadence, roughly a century.
pub const MAX_CADENCE_DAYS: u32 = 36_500;

/// Named label referenced by id from tasks and routines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub name: String,
}

impl Group {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("group", &self.id, "id", &self.id)?;
        require_text("group", &self.id, "name", &self.name)
    }
}

/// Explicit priority, 1 (lowest) through 5 (highest).
///
/// The persisted form is the integer; the `low`/`medium`/`high` labels some
/// documents carry are accepted on read and map to 1, 3 and 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "PriorityRepr", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const LOW: Priority = Priority(1);
    pub const MEDIUM: Priority = Priority(3);
    pub const HIGH: Priority = Priority(5);

    pub fn new(level: i64) -> Result<Self, DomainError> {
        match u8::try_from(level) {
            Ok(value @ 1..=5) => Ok(Self(value)),
            _ => Err(DomainError::InvalidPriority(level)),
        }
    }

    pub fn from_label(label: &str) -> Result<Self, DomainError> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::LOW),
            "medium" => Ok(Self::MEDIUM),
            "high" => Ok(Self::HIGH),
            other => other
                .parse::<i64>()
                .map_err(|_| DomainError::InvalidPriorityLabel(label.to_string()))
                .and_then(Self::new),
        }
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriorityRepr {
    Level(i64),
    Label(String),
}

impl TryFrom<PriorityRepr> for Priority {
    type Error = DomainError;

    fn try_from(repr: PriorityRepr) -> Result<Self, Self::Error> {
        match repr {
            PriorityRepr::Level(level) => Priority::new(level),
            PriorityRepr::Label(label) => Priority::from_label(&label),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
    OnHold,
}

/// Temporal behaviour of a task. Serialised into the task object under a
/// `type` tag so each variant only carries its own field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskSchedule {
    Deadline {
        deadline: NaiveDate,
    },
    #[serde(rename_all = "camelCase")]
    Repeat {
        repeat_every_days: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub group_ids: BTreeSet<String>,
    #[serde(flatten)]
    pub schedule: TaskSchedule,
    #[serde(default)]
    pub track_streak: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<Streak>,
    #[serde(default)]
    pub last_completed: Option<NaiveDate>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub history: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn deadline(id: impl Into<String>, title: impl Into<String>, deadline: NaiveDate) -> Self {
        Self::with_schedule(id, title, TaskSchedule::Deadline { deadline })
    }

    pub fn repeating(id: impl Into<String>, title: impl Into<String>, every_days: u32) -> Self {
        Self::with_schedule(
            id,
            title,
            TaskSchedule::Repeat {
                repeat_every_days: every_days,
            },
        )
    }

    fn with_schedule(id: impl Into<String>, title: impl Into<String>, schedule: TaskSchedule) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            priority: Priority::default(),
            group_ids: BTreeSet::new(),
            schedule,
            track_streak: false,
            streak: None,
            last_completed: None,
            status: TaskStatus::Pending,
            history: BTreeSet::new(),
            created_at: None,
            completed_at: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_ids.insert(group_id.into());
        self
    }

    pub fn tracking_streak(mut self) -> Self {
        self.track_streak = true;
        self.streak.get_or_insert_with(Streak::default);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("task", &self.id, "id", &self.id)?;
        require_text("task", &self.id, "title", &self.title)?;
        if let TaskSchedule::Repeat { repeat_every_days } = self.schedule {
            validate_cadence(repeat_every_days)?;
        }
        if self.status == TaskStatus::Completed && self.completed_at.is_none() {
            return Err(DomainError::invalid(
                "task",
                &self.id,
                "completed without a completion timestamp",
            ));
        }
        validate_streak("task", &self.id, self.track_streak, self.streak)
    }
}

/// Periodic habit with a full completion history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub group_ids: BTreeSet<String>,
    #[serde(default = "daily")]
    pub repeat_every_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_by_time: Option<String>,
    #[serde(default)]
    pub track_streak: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<Streak>,
    #[serde(default)]
    pub completed_today: Option<NaiveDate>,
    #[serde(default)]
    pub history: BTreeSet<NaiveDate>,
}

fn daily() -> u32 {
    1
}

impl Routine {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            priority: Priority::default(),
            group_ids: BTreeSet::new(),
            repeat_every_days: daily(),
            complete_by_time: None,
            track_streak: false,
            streak: None,
            completed_today: None,
            history: BTreeSet::new(),
        }
    }

    pub fn every(mut self, days: u32) -> Self {
        self.repeat_every_days = days;
        self
    }

    pub fn complete_by(mut self, time: impl Into<String>) -> Self {
        self.complete_by_time = Some(time.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_ids.insert(group_id.into());
        self
    }

    pub fn tracking_streak(mut self) -> Self {
        self.track_streak = true;
        self.streak.get_or_insert_with(Streak::default);
        self
    }

    /// Parsed `complete_by_time`; unparseable values never survive validation.
    pub fn complete_by_time(&self) -> Option<NaiveTime> {
        self.complete_by_time
            .as_deref()
            .and_then(|raw| parse_time_of_day(raw).ok())
    }

    pub fn is_completed_on(&self, day: NaiveDate) -> bool {
        self.completed_today == Some(day)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("routine", &self.id, "id", &self.id)?;
        require_text("routine", &self.id, "title", &self.title)?;
        validate_cadence(self.repeat_every_days)?;
        if let Some(raw) = &self.complete_by_time {
            parse_time_of_day(raw)?;
        }
        validate_streak("routine", &self.id, self.track_streak, self.streak)
    }
}

/// Either kind of trackable item, as consumed by the urgency classifier and
/// the priority sorter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Task(Task),
    Routine(Routine),
}

/// How an entity becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Deadline(NaiveDate),
    Repeat {
        every_days: u32,
        last_completed: Option<NaiveDate>,
    },
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Task(task) => &task.id,
            Entity::Routine(routine) => &routine.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Entity::Task(task) => &task.title,
            Entity::Routine(routine) => &routine.title,
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            Entity::Task(task) => task.priority,
            Entity::Routine(routine) => routine.priority,
        }
    }

    pub fn group_ids(&self) -> &BTreeSet<String> {
        match self {
            Entity::Task(task) => &task.group_ids,
            Entity::Routine(routine) => &routine.group_ids,
        }
    }

    pub fn streak(&self) -> Option<Streak> {
        match self {
            Entity::Task(task) => task.streak,
            Entity::Routine(routine) => routine.streak,
        }
    }

    /// Routines have no status and are always considered pending.
    pub fn is_pending(&self) -> bool {
        match self {
            Entity::Task(task) => task.is_pending(),
            Entity::Routine(_) => true,
        }
    }

    pub fn cadence(&self) -> Cadence {
        match self {
            Entity::Task(task) => match task.schedule {
                TaskSchedule::Deadline { deadline } => Cadence::Deadline(deadline),
                TaskSchedule::Repeat { repeat_every_days } => Cadence::Repeat {
                    every_days: repeat_every_days,
                    last_completed: task.last_completed,
                },
            },
            Entity::Routine(routine) => Cadence::Repeat {
                every_days: routine.repeat_every_days,
                last_completed: routine
                    .history
                    .iter()
                    .next_back()
                    .copied()
                    .max(routine.completed_today),
            },
        }
    }

    pub fn deadline(&self) -> Option<NaiveDate> {
        match self.cadence() {
            Cadence::Deadline(deadline) => Some(deadline),
            Cadence::Repeat { .. } => None,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Entity::Task(task) => task.validate(),
            Entity::Routine(routine) => routine.validate(),
        }
    }
}

impl From<Task> for Entity {
    fn from(task: Task) -> Self {
        Entity::Task(task)
    }
}

impl From<Routine> for Entity {
    fn from(routine: Routine) -> Self {
        Entity::Routine(routine)
    }
}

fn require_text(kind: &'static str, id: &str, field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::invalid(kind, id, format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate_cadence(every_days: u32) -> Result<(), DomainError> {
    if every_days == 0 || every_days > MAX_CADENCE_DAYS {
        return Err(DomainError::InvalidCadence(i64::from(every_days)));
    }
    Ok(())
}

fn validate_streak(
    kind: &'static str,
    id: &str,
    track_streak: bool,
    streak: Option<Streak>,
) -> Result<(), DomainError> {
    match streak {
        Some(_) if !track_streak => Err(DomainError::invalid(
            kind,
            id,
            "streak present but trackStreak is off",
        )),
        None if track_streak => Err(DomainError::invalid(
            kind,
            id,
            "trackStreak is on but no streak is recorded",
        )),
        Some(streak) if streak.longest < streak.current => Err(DomainError::invalid(
            kind,
            id,
            format!(
                "longest streak {} is shorter than current streak {}",
                streak.longest, streak.current
            ),
        )),
        _ => Ok(()),
    }
}
