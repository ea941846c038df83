use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    calendar::days_between,
    model::{Cadence, Entity},
};

/// Deadline tasks due within this many days rank as [`UrgencyRank::Near`].
pub const NEAR_WINDOW_DAYS: i64 = 2;

/// Discrete urgency category, declared from most to least urgent so the
/// derived `Ord` is the display order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyRank {
    /// Deadline already passed.
    Overdue,
    /// Multi-day repeat whose next occurrence is today or earlier.
    RepeatDue,
    /// Deadline within the next two days.
    Near,
    /// Daily repeat, always due in spirit.
    DailyPending,
    /// Deadline further out.
    Far,
    /// Multi-day repeat not yet due.
    RepeatFar,
}

impl UrgencyRank {
    pub const ALL: [UrgencyRank; 6] = [
        UrgencyRank::Overdue,
        UrgencyRank::RepeatDue,
        UrgencyRank::Near,
        UrgencyRank::DailyPending,
        UrgencyRank::Far,
        UrgencyRank::RepeatFar,
    ];

    pub fn as_index(self) -> u8 {
        self as u8
    }
}

/// Rank plus the signed day count it was derived from: days left until the
/// deadline, or days until the next repeat (negative when overdue).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Urgency {
    pub rank: UrgencyRank,
    pub days: i64,
}

/// Next due date of a repeat cadence; never-completed items are due today.
/// A due date past the end of the calendar saturates at `NaiveDate::MAX`.
pub fn next_due(entity: &Entity, today: NaiveDate) -> Option<NaiveDate> {
    match entity.cadence() {
        Cadence::Deadline(_) => None,
        Cadence::Repeat {
            every_days,
            last_completed,
        } => Some(match last_completed {
            Some(last) => last
                .checked_add_days(Days::new(u64::from(every_days)))
                .unwrap_or(NaiveDate::MAX),
            None => today,
        }),
    }
}

/// Classifies a pending entity. Tasks that are completed or on hold have no
/// urgency.
pub fn compute_urgency(entity: &Entity, today: NaiveDate) -> Option<Urgency> {
    if !entity.is_pending() {
        return None;
    }
    let urgency = match entity.cadence() {
        Cadence::Deadline(deadline) => {
            let days = days_between(today, deadline);
            let rank = if days < 0 {
                UrgencyRank::Overdue
            } else if days <= NEAR_WINDOW_DAYS {
                UrgencyRank::Near
            } else {
                UrgencyRank::Far
            };
            Urgency { rank, days }
        }
        Cadence::Repeat { every_days, .. } => {
            let due = next_due(entity, today)?;
            let days = days_between(today, due);
            let rank = if every_days <= 1 {
                UrgencyRank::DailyPending
            } else if days <= 0 {
                UrgencyRank::RepeatDue
            } else {
                UrgencyRank::RepeatFar
            };
            Urgency { rank, days }
        }
    };
    Some(urgency)
}

/// Short label shown next to an entity, e.g. "Due Tomorrow" or "Every 3d".
pub fn badge(entity: &Entity, urgency: &Urgency) -> String {
    match entity.cadence() {
        Cadence::Deadline(_) => match urgency.days {
            -1 => "Overdue by 1 day".to_string(),
            days if days < 0 => format!("Overdue by {} days", -days),
            0 => "Due Today".to_string(),
            1 => "Due Tomorrow".to_string(),
            days => format!("Due in {days} days"),
        },
        Cadence::Repeat { every_days: 1, .. } => "Daily".to_string(),
        Cadence::Repeat { every_days, .. } if urgency.days <= 0 => {
            format!("Every {every_days}d · due")
        }
        Cadence::Repeat { every_days, .. } => format!("Every {every_days}d"),
    }
}
