use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::{calendar::days_between, model::Streak};

/// Replays a completion history into `{current, longest}`.
///
/// The history may be unsorted and contain duplicates. `current` only counts
/// a run that ends on `today`; a missed day leaves the history intact but
/// drops `current` to zero.
pub fn recalc_streak(history: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> Streak {
    let dates: BTreeSet<NaiveDate> = history.into_iter().collect();
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;

    for date in dates.iter().copied() {
        run = match previous {
            Some(prev) if days_between(prev, date) == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }

    let current = match previous {
        Some(last) if last == today => run,
        _ => 0,
    };

    let streak = Streak { current, longest };
    debug_assert!(streak.longest >= streak.current);
    streak
}
