use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    body::WeightEntry,
    error::DomainError,
    model::{Entity, Group, Routine, Task},
};

pub const DOCUMENT_VERSION: u32 = 1;

fn current_version() -> u32 {
    DOCUMENT_VERSION
}

/// The whole persisted dataset, read and written as one unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerDocument {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub routines: Vec<Routine>,
    #[serde(default)]
    pub weights: Vec<WeightEntry>,
}

impl Default for TrackerDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            groups: Vec::new(),
            tasks: Vec::new(),
            routines: Vec::new(),
            weights: Vec::new(),
        }
    }
}

impl TrackerDocument {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Tasks and routines as one list for ranking.
    pub fn entities(&self) -> Vec<Entity> {
        self.tasks
            .iter()
            .cloned()
            .map(Entity::Task)
            .chain(self.routines.iter().cloned().map(Entity::Routine))
            .collect()
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        unique_ids("group", self.groups.iter().map(|group| group.id.as_str()))?;
        unique_ids("task", self.tasks.iter().map(|task| task.id.as_str()))?;
        unique_ids("routine", self.routines.iter().map(|routine| routine.id.as_str()))?;
        self.groups.iter().try_for_each(Group::validate)?;
        self.tasks.iter().try_for_each(Task::validate)?;
        self.routines.iter().try_for_each(Routine::validate)?;
        self.weights.iter().try_for_each(WeightEntry::validate)
    }
}

fn unique_ids<'a>(kind: &'static str, ids: impl Iterator<Item = &'a str>) -> Result<(), DomainError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(DomainError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn missing_collections_and_version_default() {
        let doc = TrackerDocument::from_json(r#"{"tasks": []}"#).unwrap();
        assert_eq!(doc, TrackerDocument::default());
        assert_eq!(doc.version, DOCUMENT_VERSION);
    }

    #[test]
    fn parses_a_full_document() {
        let raw = r#"{
            "version": 1,
            "groups": [{"id": "g1", "name": "Health"}],
            "tasks": [
                {"id": "t1", "title": "Dentist", "type": "deadline", "deadline": "2024-06-10",
                 "priority": 4, "groupIds": ["g1", "gone"], "status": "pending"},
                {"id": "t2", "title": "Change filter", "type": "repeat", "repeatEveryDays": 30,
                 "lastCompleted": "2024-05-20", "trackStreak": true,
                 "streak": {"current": 0, "longest": 1}, "history": ["2024-05-20"]}
            ],
            "routines": [
                {"id": "r1", "title": "Run", "completeByTime": "07:30 AM",
                 "completedToday": null, "history": ["2024-06-01", "2024-06-02"]}
            ],
            "weights": [{"date": "2024-06-01", "kilograms": 81.4}]
        }"#;
        let doc = TrackerDocument::from_json(raw).unwrap();
        doc.validate().unwrap();
        assert_eq!(doc.tasks.len(), 2);
        assert_eq!(doc.entities().len(), 3);
        assert_eq!(doc.group("g1").map(|g| g.name.as_str()), Some("Health"));
        assert!(doc.group("gone").is_none());
        assert_eq!(
            doc.routines[0].history.iter().next_back(),
            NaiveDate::from_ymd_opt(2024, 6, 2).as_ref()
        );

        let again = TrackerDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn duplicate_ids_fail_validation() {
        let mut doc = TrackerDocument::default();
        doc.groups.push(Group::new("g", "One"));
        doc.groups.push(Group::new("g", "Two"));
        assert!(matches!(
            doc.validate(),
            Err(DomainError::DuplicateId { kind: "group", .. })
        ));
    }
}
