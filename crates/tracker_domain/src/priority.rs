use std::cmp::Ordering;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    calendar::Moment,
    model::Entity,
    urgency::{compute_urgency, Urgency, UrgencyRank},
};

/// A pending entity together with its urgency for a given day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked {
    pub entity: Entity,
    pub urgency: Urgency,
}

/// Display order: urgency rank, then deadline when both have one, then
/// priority (highest first), then title.
pub fn compare_ranked(a: &Ranked, b: &Ranked) -> Ordering {
    a.urgency
        .rank
        .cmp(&b.urgency.rank)
        .then_with(|| match (a.entity.deadline(), b.entity.deadline()) {
            (Some(ours), Some(theirs)) => ours.cmp(&theirs),
            _ => Ordering::Equal,
        })
        .then_with(|| b.entity.priority().cmp(&a.entity.priority()))
        .then_with(|| a.entity.title().cmp(b.entity.title()))
}

/// Classifies and orders the pending entities, most urgent first. Entities
/// without urgency (completed, on hold) are dropped. The sort is stable, so
/// fully tied entities keep their input order.
pub fn rank_entities(entities: &[Entity], today: NaiveDate) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = entities
        .iter()
        .filter_map(|entity| {
            compute_urgency(entity, today).map(|urgency| Ranked {
                entity: entity.clone(),
                urgency,
            })
        })
        .collect();
    ranked.sort_by(compare_ranked);
    ranked
}

pub fn sort_by_priority(entities: &[Entity], today: NaiveDate) -> Vec<Entity> {
    rank_entities(entities, today)
        .into_iter()
        .map(|ranked| ranked.entity)
        .collect()
}

/// Membership predicate for a display bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BucketRule {
    Ranks(Vec<UrgencyRank>),
    /// Signed day count at most this value.
    DaysAtMost(i64),
    /// Due by today with a due instant no more than this many hours away.
    DueWithinHours(u32),
    AllOf(Vec<BucketRule>),
    AnyOf(Vec<BucketRule>),
    Always,
}

impl BucketRule {
    pub fn matches(&self, ranked: &Ranked, moment: &Moment) -> bool {
        match self {
            BucketRule::Ranks(ranks) => ranks.contains(&ranked.urgency.rank),
            BucketRule::DaysAtMost(limit) => ranked.urgency.days <= *limit,
            BucketRule::DueWithinHours(hours) => due_at(ranked, moment.today())
                .map(|due| due - moment.local() <= Duration::hours(i64::from(*hours)))
                .unwrap_or(false),
            BucketRule::AllOf(rules) => rules.iter().all(|rule| rule.matches(ranked, moment)),
            BucketRule::AnyOf(rules) => rules.iter().any(|rule| rule.matches(ranked, moment)),
            BucketRule::Always => true,
        }
    }
}

/// Wall-clock instant by which an entity due today (or earlier) should be
/// done: the routine's completion time if it has one, otherwise the end of
/// the due day.
fn due_at(ranked: &Ranked, today: NaiveDate) -> Option<NaiveDateTime> {
    if ranked.urgency.days > 0 {
        return None;
    }
    match &ranked.entity {
        Entity::Routine(routine) if routine.is_completed_on(today) => None,
        Entity::Routine(routine) => Some(match routine.complete_by_time() {
            Some(time) => today.and_time(time),
            None => end_of(today),
        }),
        Entity::Task(_) => Some(end_of(
            ranked.entity.deadline().map_or(today, |deadline| deadline.min(today)),
        )),
    }
}

fn end_of(day: NaiveDate) -> NaiveDateTime {
    day.succ_opt()
        .map_or(NaiveDateTime::MAX, |next| next.and_time(NaiveTime::default()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketDef {
    pub name: String,
    pub rule: BucketRule,
}

impl BucketDef {
    pub fn new(name: impl Into<String>, rule: BucketRule) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }

    /// Overdue/today, this week, repeating, later.
    pub fn dashboard() -> Vec<BucketDef> {
        vec![
            BucketDef::new(
                "today",
                BucketRule::AnyOf(vec![
                    BucketRule::Ranks(vec![
                        UrgencyRank::Overdue,
                        UrgencyRank::RepeatDue,
                        UrgencyRank::DailyPending,
                    ]),
                    BucketRule::AllOf(vec![
                        BucketRule::Ranks(vec![UrgencyRank::Near]),
                        BucketRule::DaysAtMost(0),
                    ]),
                ]),
            ),
            BucketDef::new(
                "this_week",
                BucketRule::AllOf(vec![
                    BucketRule::Ranks(vec![UrgencyRank::Near, UrgencyRank::Far]),
                    BucketRule::DaysAtMost(7),
                ]),
            ),
            BucketDef::new("repeating", BucketRule::Ranks(vec![UrgencyRank::RepeatFar])),
            BucketDef::new("later", BucketRule::Always),
        ]
    }

    /// Due within `hours` versus everything else.
    pub fn routine_timeline(hours: u32) -> Vec<BucketDef> {
        vec![
            BucketDef::new("due_soon", BucketRule::DueWithinHours(hours)),
            BucketDef::new("later", BucketRule::Always),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub name: String,
    pub items: Vec<Ranked>,
}

/// Partition result, in bucket definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets {
    buckets: Vec<Bucket>,
}

impl Buckets {
    pub fn get(&self, name: &str) -> Option<&[Ranked]> {
        self.buckets
            .iter()
            .find(|bucket| bucket.name == name)
            .map(|bucket| bucket.items.as_slice())
    }

    pub fn titles(&self, name: &str) -> Vec<&str> {
        self.get(name)
            .map(|items| items.iter().map(|item| item.entity.title()).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.items.len()).sum()
    }
}

/// Sorts the pending entities and places each in the first bucket whose rule
/// matches. Entities matching no bucket are left out.
pub fn partition_into_buckets(entities: &[Entity], defs: &[BucketDef], moment: &Moment) -> Buckets {
    let mut buckets: Vec<Bucket> = defs
        .iter()
        .map(|def| Bucket {
            name: def.name.clone(),
            items: Vec::new(),
        })
        .collect();

    for ranked in rank_entities(entities, moment.today()) {
        match defs.iter().position(|def| def.rule.matches(&ranked, moment)) {
            Some(idx) => buckets[idx].items.push(ranked),
            None => {
                tracing::debug!(id = ranked.entity.id(), "entity matched no bucket");
            }
        }
    }

    Buckets { buckets }
}
