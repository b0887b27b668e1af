//! Persisted per-user progression state and the unlock diff
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{Achievement, Catalog};
use crate::role::Role;

/// First-unlock record for one achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockRecord {
    pub unlocked_at: DateTime<Utc>,
    /// Set once the user has been shown (and dismissed) the unlock.
    #[serde(default)]
    pub acknowledged: bool,
}

/// Everything the engine keeps between evaluations for one user.
///
/// Unlocks are sticky: once an id is recorded it stays recorded, whatever the
/// facts say later. `total_points` is derived and rewritten on every
/// evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionSnapshot {
    pub user_id: String,
    #[serde(default)]
    pub unlocked: BTreeMap<String, UnlockRecord>,
    #[serde(default)]
    pub total_points: u32,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub last_active_date: Option<NaiveDate>,
    #[serde(default)]
    pub catalog_version: Option<String>,
}

impl ProgressionSnapshot {
    /// Fresh state for a user with no history.
    #[must_use]
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            unlocked: BTreeMap::new(),
            total_points: 0,
            streak: 0,
            last_active_date: None,
            catalog_version: None,
        }
    }

    pub fn unlocked_ids(&self) -> impl Iterator<Item = &str> {
        self.unlocked.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_unlocked(&self, id: &str) -> bool {
        self.unlocked.contains_key(id)
    }

    /// Record every satisfied id not already unlocked, stamped with `now`.
    /// Returns the ids that were added. Existing records keep their
    /// original timestamp.
    pub fn record_unlocks(&mut self, satisfied: &BTreeSet<String>, now: DateTime<Utc>) -> Vec<String> {
        let mut added = Vec::new();
        for id in satisfied {
            if !self.unlocked.contains_key(id) {
                self.unlocked.insert(
                    id.clone(),
                    UnlockRecord {
                        unlocked_at: now,
                        acknowledged: false,
                    },
                );
                added.push(id.clone());
            }
        }
        added
    }

    /// Unlocked ids not yet acknowledged.
    pub fn pending_ids(&self) -> impl Iterator<Item = &str> {
        self.unlocked
            .iter()
            .filter(|(_, record)| !record.acknowledged)
            .map(|(id, _)| id.as_str())
    }

    /// The one pending achievement to announce: the first pending entry in
    /// `role`'s catalog order.
    #[must_use]
    pub fn next_pending<'c>(&self, catalog: &'c Catalog, role: Role) -> Option<&'c Achievement> {
        catalog
            .by_role(role)
            .map(|def| &def.achievement)
            .find(|achievement| {
                self.unlocked
                    .get(&achievement.id)
                    .is_some_and(|record| !record.acknowledged)
            })
    }

    /// Pending unlocks that `role`'s catalog can announce.
    #[must_use]
    pub fn pending_count(&self, catalog: &Catalog, role: Role) -> usize {
        self.pending_ids()
            .filter(|id| catalog.lookup(role, id).is_some())
            .count()
    }

    /// Mark every pending unlock acknowledged. Returns how many changed.
    pub fn acknowledge_all(&mut self) -> usize {
        let mut changed = 0;
        for record in self.unlocked.values_mut() {
            if !record.acknowledged {
                record.acknowledged = true;
                changed += 1;
            }
        }
        changed
    }
}
