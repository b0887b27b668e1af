//! Achievement catalog, level thresholds and next-step definitions
//!
//! The catalog ships with the build as JSON and is validated once on load.
//! Entries are partitioned by role; nothing here changes at runtime.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::hash::Hasher;
use std::sync::OnceLock;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::facts::FactKey;
use crate::role::{Role, RoleScope};
use crate::rules::Rule;

const DEFAULT_CATALOG_DATA: &str = include_str!("../data/catalog.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Profile,
    Engagement,
    Milestone,
    Social,
}

/// Display-only tier. Has no effect on unlock logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// A named, point-valued milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub category: Category,
    pub points: u32,
    pub rarity: Rarity,
    pub role: RoleScope,
}

/// Catalog entry: the achievement plus the rule that unlocks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDef {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub unlock: Rule,
}

/// Minimum points for a level within one role's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelThreshold {
    pub level: u32,
    pub title: String,
    pub min_points: u32,
    pub role: Role,
}

/// An onboarding or engagement task suggested to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextStep {
    pub id: String,
    pub title: String,
    pub description: String,
    pub action_ref: String,
    pub points: u32,
    /// Lower is more urgent.
    pub priority: u32,
    pub role: RoleScope,
}

/// Catalog entry: the step plus the rule that marks it done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextStepDef {
    #[serde(flatten)]
    pub step: NextStep,
    pub complete_when: Rule,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON is invalid: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate achievement id `{id}` in the {role} catalog")]
    DuplicateAchievement { id: String, role: Role },
    #[error("duplicate next step id `{id}` in the {role} catalog")]
    DuplicateStep { id: String, role: Role },
    #[error("no level thresholds defined for {role}")]
    MissingLevels { role: Role },
    #[error("{role} level table must start at 0 points (starts at {min_points})")]
    LevelsDoNotStartAtZero { role: Role, min_points: u32 },
    #[error("{role} level {level} needs more than {previous} points (got {min_points})")]
    LevelsNotIncreasing {
        role: Role,
        level: u32,
        previous: u32,
        min_points: u32,
    },
    #[error("rule for `{id}` is malformed: {problem}")]
    MalformedRule { id: String, problem: String },
}

/// The complete, role-partitioned catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub achievements: Vec<AchievementDef>,
    #[serde(default)]
    pub levels: Vec<LevelThreshold>,
    #[serde(default)]
    pub next_steps: Vec<NextStepDef>,
}

/// Process-wide catalog built from the embedded asset.
///
/// A broken embedded asset is a build defect; it is logged and replaced by an
/// empty catalog rather than taking the host process down.
#[must_use]
pub fn catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(|| {
        Catalog::load_from_static().unwrap_or_else(|err| {
            log::error!("embedded progression catalog rejected: {err}");
            Catalog::default()
        })
    })
}

impl Catalog {
    /// Parse and validate a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not parse or violates a catalog invariant.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse the catalog embedded in the build.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded asset is invalid.
    pub fn load_from_static() -> Result<Self, CatalogError> {
        Self::from_json(DEFAULT_CATALOG_DATA)
    }

    /// Check every structural invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for role in Role::ALL {
            self.validate_achievements(role)?;
            self.validate_levels(role)?;
            self.validate_steps(role)?;
        }
        Ok(())
    }

    fn validate_achievements(&self, role: Role) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for def in self.by_role(role) {
            let id = &def.achievement.id;
            if !seen.insert(id.as_str()) {
                return Err(CatalogError::DuplicateAchievement {
                    id: id.clone(),
                    role,
                });
            }
            if let Some(problem) = def.unlock.shape_problem() {
                return Err(CatalogError::MalformedRule {
                    id: id.clone(),
                    problem,
                });
            }
        }
        Ok(())
    }

    fn validate_levels(&self, role: Role) -> Result<(), CatalogError> {
        let levels = self.levels(role);
        let first = levels.first().ok_or(CatalogError::MissingLevels { role })?;
        if first.min_points != 0 {
            return Err(CatalogError::LevelsDoNotStartAtZero {
                role,
                min_points: first.min_points,
            });
        }
        for pair in levels.windows(2) {
            if pair[1].min_points <= pair[0].min_points {
                return Err(CatalogError::LevelsNotIncreasing {
                    role,
                    level: pair[1].level,
                    previous: pair[0].min_points,
                    min_points: pair[1].min_points,
                });
            }
        }
        Ok(())
    }

    fn validate_steps(&self, role: Role) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for def in self.steps_by_role(role) {
            let id = &def.step.id;
            if !seen.insert(id.as_str()) {
                return Err(CatalogError::DuplicateStep {
                    id: id.clone(),
                    role,
                });
            }
            if let Some(problem) = def.complete_when.shape_problem() {
                return Err(CatalogError::MalformedRule {
                    id: id.clone(),
                    problem,
                });
            }
        }
        Ok(())
    }

    /// Achievement definitions offered to `role`, in catalog order.
    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &AchievementDef> {
        self.achievements
            .iter()
            .filter(move |def| def.achievement.role.applies_to(role))
    }

    /// Achievements offered to `role`, in catalog order.
    #[must_use]
    pub fn achievements_for(&self, role: Role) -> Vec<&Achievement> {
        self.by_role(role).map(|def| &def.achievement).collect()
    }

    /// Find an achievement in `role`'s catalog.
    #[must_use]
    pub fn lookup(&self, role: Role, id: &str) -> Option<&Achievement> {
        self.by_role(role)
            .map(|def| &def.achievement)
            .find(|achievement| achievement.id == id)
    }

    /// Level table for `role`, ascending.
    #[must_use]
    pub fn levels(&self, role: Role) -> Vec<&LevelThreshold> {
        self.levels.iter().filter(|level| level.role == role).collect()
    }

    /// Next-step definitions offered to `role`, in catalog order.
    pub fn steps_by_role(&self, role: Role) -> impl Iterator<Item = &NextStepDef> {
        self.next_steps
            .iter()
            .filter(move |def| def.step.role.applies_to(role))
    }

    /// Every fact read by `role`'s achievements and next steps.
    #[must_use]
    pub fn required_facts(&self, role: Role) -> BTreeSet<FactKey> {
        let unlock = self.by_role(role).flat_map(|def| def.unlock.required_facts());
        let steps = self
            .steps_by_role(role)
            .flat_map(|def| def.complete_when.required_facts());
        unlock.chain(steps).collect()
    }

    /// Stable version tag of the catalog contents. Recomputed on every call.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(&canonical);
        format!("{:016x}", hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json(levels: &str) -> String {
        format!(
            r#"{{
                "achievements": [
                    {{"id": "a", "title": "A", "description": "", "icon": "i", "category": "profile",
                      "points": 5, "rarity": "common", "role": "both",
                      "unlock": {{"kind": "flag", "fact": "has_avatar"}}}}
                ],
                "levels": {levels}
            }}"#
        )
    }

    const BOTH_LEVELS: &str = r#"[
        {"level": 1, "title": "One", "min_points": 0, "role": "investor"},
        {"level": 1, "title": "Uno", "min_points": 0, "role": "syndicator"}
    ]"#;

    #[test]
    fn embedded_catalog_is_valid() {
        let loaded = Catalog::load_from_static().unwrap();
        for role in Role::ALL {
            assert!(!loaded.achievements_for(role).is_empty());
            assert_eq!(loaded.levels(role).len(), 5);
            assert!(loaded.steps_by_role(role).count() > 0);
        }
        assert!(std::ptr::eq(catalog(), catalog()));
        assert!(!catalog().achievements.is_empty());
    }

    #[test]
    fn role_partitions_share_both_scoped_entries() {
        let catalog = Catalog::load_from_static().unwrap();
        assert!(catalog.lookup(Role::Investor, "profile_photo").is_some());
        assert!(catalog.lookup(Role::Syndicator, "profile_photo").is_some());
        assert!(catalog.lookup(Role::Investor, "first_favorite").is_some());
        assert!(catalog.lookup(Role::Syndicator, "first_favorite").is_none());
        assert!(catalog.lookup(Role::Investor, "no_such_thing").is_none());
    }

    #[test]
    fn required_facts_follow_role() {
        let catalog = Catalog::load_from_static().unwrap();
        let investor = catalog.required_facts(Role::Investor);
        assert!(investor.contains(&FactKey::FavoritesCount));
        assert!(!investor.contains(&FactKey::PublishedDealCount));
        let syndicator = catalog.required_facts(Role::Syndicator);
        assert!(syndicator.contains(&FactKey::PublishedDealCount));
        assert!(!syndicator.contains(&FactKey::InvestmentsCount));
    }

    #[test]
    fn duplicate_ids_within_a_role_are_rejected() {
        let json = r#"{
            "achievements": [
                {"id": "a", "title": "A", "description": "", "icon": "i", "category": "profile",
                 "points": 5, "rarity": "common", "role": "investor",
                 "unlock": {"kind": "flag", "fact": "has_avatar"}},
                {"id": "a", "title": "A2", "description": "", "icon": "i", "category": "social",
                 "points": 5, "rarity": "common", "role": "both",
                 "unlock": {"kind": "flag", "fact": "is_verified"}}
            ],
            "levels": [
                {"level": 1, "title": "One", "min_points": 0, "role": "investor"},
                {"level": 1, "title": "Uno", "min_points": 0, "role": "syndicator"}
            ]
        }"#;
        let err = Catalog::from_json(json).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::DuplicateAchievement { ref id, role: Role::Investor } if id == "a"
        ));
    }

    #[test]
    fn level_tables_must_start_at_zero_and_increase() {
        assert!(Catalog::from_json(&minimal_json(BOTH_LEVELS)).is_ok());

        let missing = r#"[{"level": 1, "title": "One", "min_points": 0, "role": "investor"}]"#;
        assert!(matches!(
            Catalog::from_json(&minimal_json(missing)).unwrap_err(),
            CatalogError::MissingLevels {
                role: Role::Syndicator
            }
        ));

        let offset = r#"[
            {"level": 1, "title": "One", "min_points": 10, "role": "investor"},
            {"level": 1, "title": "Uno", "min_points": 0, "role": "syndicator"}
        ]"#;
        assert!(matches!(
            Catalog::from_json(&minimal_json(offset)).unwrap_err(),
            CatalogError::LevelsDoNotStartAtZero { min_points: 10, .. }
        ));

        let flat = r#"[
            {"level": 1, "title": "One", "min_points": 0, "role": "investor"},
            {"level": 2, "title": "Two", "min_points": 0, "role": "investor"},
            {"level": 1, "title": "Uno", "min_points": 0, "role": "syndicator"}
        ]"#;
        assert!(matches!(
            Catalog::from_json(&minimal_json(flat)).unwrap_err(),
            CatalogError::LevelsNotIncreasing { level: 2, .. }
        ));
    }

    #[test]
    fn malformed_rules_are_rejected() {
        let json = minimal_json(BOTH_LEVELS).replace(
            r#"{"kind": "flag", "fact": "has_avatar"}"#,
            r#"{"kind": "at_least", "fact": "has_avatar", "min": 1}"#,
        );
        let err = Catalog::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("has_avatar"));
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let a = Catalog::from_json(&minimal_json(BOTH_LEVELS)).unwrap();
        let b = Catalog::from_json(&minimal_json(BOTH_LEVELS)).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);

        let changed = minimal_json(BOTH_LEVELS).replace("\"points\": 5", "\"points\": 6");
        let c = Catalog::from_json(&changed).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn fingerprint_follows_edits() {
        let mut catalog = Catalog::from_json(&minimal_json(BOTH_LEVELS)).unwrap();
        let before = catalog.fingerprint();
        catalog.achievements[0].achievement.points += 1;
        assert_ne!(catalog.fingerprint(), before);
    }
}
