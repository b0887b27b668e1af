//! Points totals, level lookup and progress toward the next level
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, LevelThreshold};
use crate::numbers::{percent_of, round_percent_to_u8};
use crate::role::Role;

/// Sum of points for the unlocked ids found in `role`'s catalog.
///
/// Ids the catalog does not know contribute nothing.
#[must_use]
pub fn total_points<'a, I>(catalog: &Catalog, role: Role, unlocked: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    unlocked
        .into_iter()
        .filter_map(|id| catalog.lookup(role, id))
        .fold(0_u32, |total, achievement| {
            total.saturating_add(achievement.points)
        })
}

/// Highest level whose threshold is at or below `points`. Points beyond the
/// last threshold stay on the last level.
#[must_use]
pub fn level_for_points(catalog: &Catalog, role: Role, points: u32) -> Option<&LevelThreshold> {
    let levels = catalog.levels(role);
    levels
        .iter()
        .rev()
        .find(|level| level.min_points <= points)
        .or_else(|| levels.first())
        .copied()
}

/// Where a point total sits between its level and the next one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub points: u32,
    pub level: u32,
    pub title: String,
    pub next_level: Option<u32>,
    pub next_title: Option<String>,
    pub points_to_next: Option<u32>,
    /// Percent of the way to the next level, in `[0, 100]`; 100 at the top.
    pub percent: f64,
}

impl LevelProgress {
    #[must_use]
    pub fn whole_percent(&self) -> u8 {
        round_percent_to_u8(self.percent)
    }

    #[must_use]
    pub const fn is_max_level(&self) -> bool {
        self.next_level.is_none()
    }
}

/// Progress from the current level toward the next.
#[must_use]
pub fn progress_to_next_level(catalog: &Catalog, role: Role, points: u32) -> Option<LevelProgress> {
    let current = level_for_points(catalog, role, points)?;
    let next = catalog
        .levels(role)
        .into_iter()
        .find(|level| level.min_points > current.min_points);

    let progress = match next {
        Some(next) => LevelProgress {
            points,
            level: current.level,
            title: current.title.clone(),
            next_level: Some(next.level),
            next_title: Some(next.title.clone()),
            points_to_next: Some(next.min_points.saturating_sub(points)),
            percent: percent_of(
                points.saturating_sub(current.min_points),
                next.min_points - current.min_points,
            ),
        },
        None => LevelProgress {
            points,
            level: current.level,
            title: current.title.clone(),
            next_level: None,
            next_title: None,
            points_to_next: None,
            percent: 100.0,
        },
    };
    Some(progress)
}
