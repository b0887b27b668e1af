//! Next-step planning for onboarding and engagement tasks
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, NextStep};
use crate::facts::FactBag;
use crate::role::Role;

/// Suggested tasks for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StepPlan {
    /// The most urgent incomplete steps, most urgent first.
    Pending {
        steps: Vec<NextStep>,
        /// Incomplete steps in total, including those cut by the limit.
        remaining: usize,
        completed: usize,
    },
    /// Every step offered to the role is done.
    AllCaughtUp { completed: usize },
}

impl StepPlan {
    #[must_use]
    pub fn steps(&self) -> &[NextStep] {
        match self {
            Self::Pending { steps, .. } => steps.as_slice(),
            Self::AllCaughtUp { .. } => &[],
        }
    }

    #[must_use]
    pub const fn is_all_caught_up(&self) -> bool {
        matches!(self, Self::AllCaughtUp { .. })
    }
}

/// Incomplete steps for `role`, sorted by priority (catalog order breaks ties),
/// truncated to `limit`.
///
/// A step whose fact is unknown counts as not completed.
#[must_use]
pub fn plan_next_steps(catalog: &Catalog, role: Role, facts: &FactBag, limit: usize) -> StepPlan {
    let mut completed = 0;
    let mut incomplete: Vec<&NextStep> = Vec::new();
    for def in catalog.steps_by_role(role) {
        if def.complete_when.is_satisfied(facts) {
            completed += 1;
        } else {
            incomplete.push(&def.step);
        }
    }

    if incomplete.is_empty() {
        return StepPlan::AllCaughtUp { completed };
    }

    incomplete.sort_by_key(|step| step.priority);
    let remaining = incomplete.len();
    StepPlan::Pending {
        steps: incomplete.into_iter().take(limit).cloned().collect(),
        remaining,
        completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;
    use crate::facts::FactKey;

    fn ordering_catalog() -> Catalog {
        Catalog::from_json(
            r#"{
                "levels": [
                    {"level": 1, "title": "One", "min_points": 0, "role": "investor"},
                    {"level": 1, "title": "Uno", "min_points": 0, "role": "syndicator"}
                ],
                "next_steps": [
                    {"id": "p1", "title": "", "description": "", "action_ref": "/a", "points": 0,
                     "priority": 1, "role": "both",
                     "complete_when": {"kind": "flag", "fact": "has_avatar"}},
                    {"id": "p3", "title": "", "description": "", "action_ref": "/b", "points": 0,
                     "priority": 3, "role": "both",
                     "complete_when": {"kind": "flag", "fact": "profile_complete"}},
                    {"id": "p2", "title": "", "description": "", "action_ref": "/c", "points": 0,
                     "priority": 2, "role": "both",
                     "complete_when": {"kind": "at_least", "fact": "favorites_count", "min": 1}},
                    {"id": "p2b", "title": "", "description": "", "action_ref": "/d", "points": 0,
                     "priority": 2, "role": "syndicator",
                     "complete_when": {"kind": "flag", "fact": "is_verified"}}
                ]
            }"#,
        )
        .unwrap()
    }

    fn ids(plan: &StepPlan) -> Vec<&str> {
        plan.steps().iter().map(|step| step.id.as_str()).collect()
    }

    #[test]
    fn incomplete_steps_sort_by_priority() {
        let plan = plan_next_steps(&ordering_catalog(), Role::Investor, &FactBag::new(), 10);
        assert_eq!(ids(&plan), vec!["p1", "p2", "p3"]);
        assert!(matches!(
            plan,
            StepPlan::Pending {
                remaining: 3,
                completed: 0,
                ..
            }
        ));
    }

    #[test]
    fn ties_keep_catalog_order() {
        let plan = plan_next_steps(&ordering_catalog(), Role::Syndicator, &FactBag::new(), 10);
        assert_eq!(ids(&plan), vec!["p1", "p2", "p2b", "p3"]);
    }

    #[test]
    fn completed_steps_drop_out_and_limit_applies() {
        let facts = FactBag::new().with_flag(FactKey::HasAvatar, true);
        let plan = plan_next_steps(&ordering_catalog(), Role::Investor, &facts, 1);
        assert_eq!(ids(&plan), vec!["p2"]);
        assert!(matches!(
            plan,
            StepPlan::Pending {
                remaining: 2,
                completed: 1,
                ..
            }
        ));
    }

    #[test]
    fn all_done_reports_caught_up() {
        let facts = FactBag::new()
            .with_flag(FactKey::HasAvatar, true)
            .with_flag(FactKey::ProfileComplete, true)
            .with_count(FactKey::FavoritesCount, 2);
        let plan = plan_next_steps(&ordering_catalog(), Role::Investor, &facts, 3);
        assert_eq!(plan, StepPlan::AllCaughtUp { completed: 3 });
        assert!(plan.is_all_caught_up());
        assert!(plan.steps().is_empty());
    }

    #[test]
    fn unknown_facts_leave_steps_incomplete() {
        let facts = FactBag::new().with_flag(FactKey::HasAvatar, true);
        let plan = plan_next_steps(catalog(), Role::Investor, &facts, 3);
        assert_eq!(ids(&plan), vec!["finish_profile", "set_preferences", "browse_deals"]);
    }

    #[test]
    fn plan_serializes_with_state_tag() {
        let json = serde_json::to_value(StepPlan::AllCaughtUp { completed: 2 }).unwrap();
        assert_eq!(json["state"], "all_caught_up");
    }
}
