//! Progression Engine
//!
//! Platform-agnostic achievement, level, streak and next-step logic for the
//! marketplace. The engine consumes a snapshot of facts about a user and reads
//! and writes a small per-user snapshot through the [`ProgressionStore`] port;
//! it never gathers facts or touches storage directly.

pub mod catalog;
#[cfg(feature = "async")]
pub mod collect;
pub mod config;
pub mod evaluator;
pub mod facts;
pub mod levels;
pub mod numbers;
pub mod planner;
pub mod result;
pub mod role;
pub mod rules;
pub mod snapshot;
pub mod store;
pub mod streak;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;

// Re-export commonly used types
pub use catalog::{
    Achievement, AchievementDef, Catalog, CatalogError, Category, LevelThreshold, NextStep,
    NextStepDef, Rarity, catalog,
};
#[cfg(feature = "async")]
pub use collect::{Collection, FactFailure, FactSource, collect_facts};
pub use config::{ConfigError, EngineConfig};
pub use evaluator::{UnlockEvaluation, evaluate_unlocks, unlocked_ids};
pub use facts::{FactBag, FactKey, FactKind, FactValue, LenientFacts};
pub use levels::{LevelProgress, level_for_points, progress_to_next_level, total_points};
pub use planner::{StepPlan, plan_next_steps};
pub use result::{AchievementStatus, EvaluationResult, PersistenceStatus};
pub use role::{InvalidRole, Role, RoleScope};
pub use rules::{Outcome, Rule, RuleFacts};
pub use snapshot::{ProgressionSnapshot, UnlockRecord};
pub use store::{MemoryStore, ProgressionStore};
pub use streak::{StreakUpdate, advance_streak};

/// Why an engine could not be built.
#[derive(Debug, Error)]
pub enum EngineSetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Main progression engine: evaluates users against a catalog and keeps
/// their snapshots in a store.
///
/// Calls for the same user id are serialized; calls for different users run
/// independently. A snapshot whose save failed is held in memory and used as
/// the baseline until a later save for that user succeeds.
pub struct ProgressionEngine<S>
where
    S: ProgressionStore,
{
    catalog: Arc<Catalog>,
    catalog_version: String,
    store: S,
    config: EngineConfig,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    held: Mutex<HashMap<String, ProgressionSnapshot>>,
}

impl<S> ProgressionEngine<S>
where
    S: ProgressionStore,
{
    /// Engine over the embedded catalog with default configuration.
    pub fn new(store: S) -> Self {
        Self::build(Arc::new(catalog().clone()), store, EngineConfig::default())
    }

    /// Engine over the embedded catalog with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is out of bounds.
    pub fn with_config(store: S, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(Arc::new(catalog().clone()), store, config))
    }

    /// Engine over an explicit catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of bounds or the catalog
    /// breaks a structural invariant.
    pub fn with_catalog(
        catalog: Arc<Catalog>,
        store: S,
        config: EngineConfig,
    ) -> Result<Self, EngineSetupError> {
        config.validate()?;
        catalog.validate()?;
        Ok(Self::build(catalog, store, config))
    }

    fn build(catalog: Arc<Catalog>, store: S, config: EngineConfig) -> Self {
        Self {
            catalog_version: catalog.fingerprint(),
            catalog,
            store,
            config,
            user_locks: Mutex::new(HashMap::new()),
            held: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Fingerprint of the catalog this engine was built with.
    #[must_use]
    pub fn catalog_version(&self) -> &str {
        &self.catalog_version
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Run `op` while holding the lock for `user_id`, then drop the lock
    /// entry if nobody else is waiting on it.
    fn with_user_lock<R>(&self, user_id: &str, op: impl FnOnce() -> R) -> R {
        let lock = {
            let mut locks = self
                .user_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        let outcome = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            op()
        };

        let mut locks = self
            .user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        // Clones are only handed out under the map lock.
        if locks
            .get(user_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(user_id);
        }
        outcome
    }

    fn held_snapshot(&self, user_id: &str) -> Option<ProgressionSnapshot> {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    fn release_held(&self, user_id: &str) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
    }

    /// Save `snapshot` as the new baseline, holding it back on failure.
    fn commit(&self, user_id: &str, snapshot: &ProgressionSnapshot) -> Result<(), S::Error> {
        match self.store.save(user_id, snapshot) {
            Ok(()) => {
                self.release_held(user_id);
                Ok(())
            }
            Err(err) => {
                self.held
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(user_id.to_string(), snapshot.clone());
                Err(err)
            }
        }
    }

    /// Evaluate `facts` for a user at instant `now` and commit the result.
    ///
    /// The calendar day used for streaks is `now`'s UTC date. This never fails
    /// for data-availability reasons: unknown facts leave their achievements
    /// locked, and storage problems are reported through
    /// [`EvaluationResult::persistence`].
    pub fn evaluate(
        &self,
        user_id: &str,
        role: Role,
        facts: &FactBag,
        now: DateTime<Utc>,
    ) -> EvaluationResult {
        self.with_user_lock(user_id, || self.evaluate_locked(user_id, role, facts, now))
    }

    fn evaluate_locked(
        &self,
        user_id: &str,
        role: Role,
        facts: &FactBag,
        now: DateTime<Utc>,
    ) -> EvaluationResult {
        let catalog = self.catalog.as_ref();

        let baseline = match self.held_snapshot(user_id) {
            Some(held) => Ok(Some(held)),
            None => self.store.load(user_id),
        };
        let (mut snapshot, load_failure) = match baseline {
            Ok(Some(prior)) => (prior, None),
            Ok(None) => (ProgressionSnapshot::empty(user_id), None),
            Err(err) => {
                log::warn!("progression for user {user_id} could not be loaded: {err}");
                (ProgressionSnapshot::empty(user_id), Some(err.to_string()))
            }
        };
        user_id.clone_into(&mut snapshot.user_id);

        let evaluation = evaluate_unlocks(catalog, role, facts);
        for (id, fact) in &evaluation.withheld {
            log::debug!("`{id}` withheld for user {user_id}: `{fact}` unknown");
        }
        let added = snapshot.record_unlocks(&evaluation.satisfied, now);
        if !added.is_empty() {
            log::info!("user {user_id} unlocked {}", added.join(", "));
        }

        let streak = advance_streak(snapshot.last_active_date, snapshot.streak, now.date_naive());
        snapshot.streak = streak.streak;
        snapshot.last_active_date = Some(streak.last_active_date);
        snapshot.total_points = total_points(catalog, role, snapshot.unlocked_ids());
        snapshot.catalog_version = Some(self.catalog_version.clone());

        let level = level_for_points(catalog, role, snapshot.total_points).cloned();
        let progress =
            progress_to_next_level(catalog, role, snapshot.total_points).unwrap_or_default();
        let next_steps = plan_next_steps(catalog, role, facts, self.config.next_step_limit);

        // Without a trustworthy baseline every unlock would look new.
        let (new_achievement, pending_count) = if load_failure.is_none() {
            (
                snapshot.next_pending(catalog, role).cloned(),
                snapshot.pending_count(catalog, role),
            )
        } else {
            (None, 0)
        };

        let persistence = match load_failure {
            Some(reason) => PersistenceStatus::Skipped(reason),
            None => match self.commit(user_id, &snapshot) {
                Ok(()) => PersistenceStatus::Saved,
                Err(err) => {
                    log::warn!("progression for user {user_id} could not be saved: {err}");
                    PersistenceStatus::Failed(err.to_string())
                }
            },
        };

        let achievements = catalog
            .achievements_for(role)
            .into_iter()
            .map(|achievement| AchievementStatus {
                unlocked_at: snapshot
                    .unlocked
                    .get(&achievement.id)
                    .map(|record| record.unlocked_at),
                achievement: achievement.clone(),
            })
            .collect();

        EvaluationResult {
            user_id: user_id.to_string(),
            role,
            total_points: snapshot.total_points,
            achievements,
            level,
            progress,
            streak: snapshot.streak,
            new_achievement,
            pending_count,
            next_steps,
            persistence,
            snapshot,
        }
    }

    /// Dismiss every pending unlock for a user. Returns how many were pending.
    ///
    /// If the save fails the acknowledgement is still held in memory and
    /// committed by the next successful save for this user.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded or saved.
    pub fn acknowledge_new_achievement(&self, user_id: &str) -> Result<usize, S::Error> {
        self.with_user_lock(user_id, || -> Result<usize, S::Error> {
            let held = self.held_snapshot(user_id);
            let was_held = held.is_some();
            let stored = match held {
                Some(held) => Some(held),
                None => self.store.load(user_id)?,
            };
            let Some(mut snapshot) = stored else {
                return Ok(0);
            };
            let acknowledged = snapshot.acknowledge_all();
            if acknowledged > 0 || was_held {
                self.commit(user_id, &snapshot)?;
                log::debug!("user {user_id} acknowledged {acknowledged} unlock(s)");
            }
            Ok(acknowledged)
        })
    }

    /// Persist a snapshot, typically one returned with
    /// [`PersistenceStatus::Failed`]. On success it replaces any snapshot
    /// held back for the same user.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    pub fn save_snapshot(&self, snapshot: &ProgressionSnapshot) -> Result<(), S::Error> {
        let user_id = snapshot.user_id.as_str();
        self.with_user_lock(user_id, || -> Result<(), S::Error> {
            self.store.save(user_id, snapshot)?;
            self.release_held(user_id);
            Ok(())
        })
    }

    /// The committed snapshot for a user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded.
    pub fn snapshot(&self, user_id: &str) -> Result<Option<ProgressionSnapshot>, S::Error> {
        self.store.load(user_id)
    }

    /// Delete everything stored or held for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be removed.
    pub fn forget_user(&self, user_id: &str) -> Result<(), S::Error> {
        self.with_user_lock(user_id, || -> Result<(), S::Error> {
            self.release_held(user_id);
            self.store.delete(user_id)?;
            log::info!("progression for user {user_id} deleted");
            Ok(())
        })
    }
}
