pub mod body;
pub mod calendar;
pub mod clock;
pub mod document;
pub mod error;
pub mod model;
pub mod mutation;
pub mod persistence;
pub mod priority;
pub mod store;
pub mod streak;
pub mod urgency;

pub use crate::calendar::{Moment, ReferenceZone};
pub use crate::document::TrackerDocument;
pub use crate::error::DomainError;
pub use crate::model::{Entity, Group, Priority, Routine, Task, TaskSchedule, TaskStatus};
pub use crate::persistence::{DocumentProvider, PersistenceError};
pub use crate::store::{TrackerStore, TrackerStoreBuilder};
