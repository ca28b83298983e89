//! Index Checkpoint
//!
//! Single persisted high-water mark for search index synchronization:
//! everything modified at or before `last_check` has been reconciled.

use super::node::min_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted reconcile checkpoint
///
/// `revision` is bumped by the store on every save and is used as the
/// expected value on the next save, so two overlapping reconcile runs cannot
/// silently overwrite each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub name: String,
    pub last_check: DateTime<Utc>,
    #[serde(default)]
    pub revision: i64,
}

impl Checkpoint {
    /// Fresh checkpoint at the minimum representable timestamp
    pub fn initial(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_check: min_timestamp(),
            revision: 0,
        }
    }

    /// Move `last_check` forward; never moves it backwards
    pub fn advance_to(&mut self, at: DateTime<Utc>) {
        if at > self.last_check {
            self.last_check = at;
        }
    }
}
