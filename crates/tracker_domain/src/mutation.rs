//! Pure state transitions. Every function returns a new value and leaves its
//! input untouched.

use chrono::{Days, NaiveDate};

use crate::{
    calendar::Moment,
    model::{Entity, Routine, Task, TaskSchedule, TaskStatus},
    streak::recalc_streak,
};

pub fn toggle_complete(entity: &Entity, moment: &Moment) -> Entity {
    match entity {
        Entity::Task(task) => Entity::Task(toggle_task(task, moment)),
        Entity::Routine(routine) => Entity::Routine(toggle_routine(routine, moment.today())),
    }
}

/// Completes a pending or on-hold task, or reopens a completed one.
///
/// Completing records today in the history; reopening removes today again
/// only when the completion being undone happened today, so earlier
/// completions are never erased.
pub fn toggle_task(task: &Task, moment: &Moment) -> Task {
    let today = moment.today();
    let mut next = task.clone();
    match task.status {
        TaskStatus::Completed => {
            next.status = TaskStatus::Pending;
            next.completed_at = None;
            if task.last_completed == Some(today) {
                next.history.remove(&today);
                next.last_completed = next.history.iter().next_back().copied();
            }
        }
        TaskStatus::Pending | TaskStatus::OnHold => {
            next.status = TaskStatus::Completed;
            next.completed_at = Some(moment.instant());
            next.last_completed = Some(today);
            next.history.insert(today);
        }
    }
    refresh_task_streak(&mut next, today);
    next
}

pub fn toggle_routine(routine: &Routine, today: NaiveDate) -> Routine {
    let mut next = routine.clone();
    if routine.is_completed_on(today) {
        next.completed_today = None;
        next.history.remove(&today);
    } else {
        next.completed_today = Some(today);
        next.history.insert(today);
    }
    refresh_routine_streak(&mut next, today);
    next
}

/// Brings entities forward to `today`: stale `completed_today` markers are
/// cleared, completed repeat tasks whose next occurrence has arrived reopen,
/// and streaks are replayed so a missed day shows a zero current streak.
/// Completion histories are never modified.
pub fn apply_daily_rollover(entities: &[Entity], today: NaiveDate) -> Vec<Entity> {
    entities
        .iter()
        .map(|entity| match entity {
            Entity::Task(task) => Entity::Task(rollover_task(task, today)),
            Entity::Routine(routine) => Entity::Routine(rollover_routine(routine, today)),
        })
        .collect()
}

pub fn rollover_task(task: &Task, today: NaiveDate) -> Task {
    let mut next = task.clone();
    if let (TaskStatus::Completed, TaskSchedule::Repeat { repeat_every_days }) =
        (task.status, task.schedule)
    {
        let reopens = task.last_completed.map_or(true, |last| {
            last.checked_add_days(Days::new(u64::from(repeat_every_days)))
                .is_some_and(|due| due <= today)
        });
        if reopens {
            next.status = TaskStatus::Pending;
            next.completed_at = None;
        }
    }
    refresh_task_streak(&mut next, today);
    next
}

pub fn rollover_routine(routine: &Routine, today: NaiveDate) -> Routine {
    let mut next = routine.clone();
    if next.completed_today.is_some_and(|day| day != today) {
        next.completed_today = None;
    }
    refresh_routine_streak(&mut next, today);
    next
}

fn refresh_task_streak(task: &mut Task, today: NaiveDate) {
    if task.track_streak {
        task.streak = Some(recalc_streak(task.history.iter().copied(), today));
    }
}

fn refresh_routine_streak(routine: &mut Routine, today: NaiveDate) {
    if routine.track_streak {
        routine.streak = Some(recalc_streak(routine.history.iter().copied(), today));
    }
}
