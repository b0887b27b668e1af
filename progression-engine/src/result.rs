//! Evaluation results handed back to the caller
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Achievement, LevelThreshold};
use crate::levels::LevelProgress;
use crate::planner::StepPlan;
use crate::role::Role;
use crate::snapshot::ProgressionSnapshot;

/// One catalog achievement and whether (and when) the user unlocked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementStatus {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl AchievementStatus {
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

/// What happened to the snapshot at the end of an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PersistenceStatus {
    /// The new snapshot is the committed baseline.
    Saved,
    /// Saving failed; the result is still valid and `snapshot` can be retried.
    Failed(String),
    /// The prior snapshot could not be loaded, so nothing was written.
    Skipped(String),
}

impl PersistenceStatus {
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

/// Full progression view for one user after an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub user_id: String,
    pub role: Role,
    pub total_points: u32,
    /// Every achievement offered to the role, in catalog order.
    pub achievements: Vec<AchievementStatus>,
    pub level: Option<LevelThreshold>,
    pub progress: LevelProgress,
    pub streak: u32,
    /// The single unlock to celebrate, if any is pending.
    pub new_achievement: Option<Achievement>,
    /// Pending unlocks in total, including `new_achievement`.
    pub pending_count: usize,
    pub next_steps: StepPlan,
    pub persistence: PersistenceStatus,
    /// The snapshot this result was computed into.
    pub snapshot: ProgressionSnapshot,
}

impl EvaluationResult {
    pub fn unlocked(&self) -> impl Iterator<Item = &AchievementStatus> {
        self.achievements.iter().filter(|status| status.is_unlocked())
    }

    #[must_use]
    pub fn unlocked_count(&self) -> usize {
        self.unlocked().count()
    }
}
