//! Unlock evaluation: facts in, satisfied achievement ids out
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::Catalog;
use crate::facts::{FactBag, FactKey};
use crate::role::Role;
use crate::rules::Outcome;

/// Result of one pass over a role's catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockEvaluation {
    /// Achievements whose rule holds right now.
    pub satisfied: BTreeSet<String>,
    /// Achievements not satisfied only because a fact was unknown,
    /// keyed by id with the first missing fact.
    pub withheld: BTreeMap<String, FactKey>,
}

/// Evaluate every achievement offered to `role` against `facts`.
///
/// Each rule is evaluated on its own; a missing fact only affects the rules
/// that read it.
#[must_use]
pub fn evaluate_unlocks(catalog: &Catalog, role: Role, facts: &FactBag) -> UnlockEvaluation {
    let mut evaluation = UnlockEvaluation::default();
    for def in catalog.by_role(role) {
        match def.unlock.outcome(facts) {
            Outcome::Met => {
                evaluation.satisfied.insert(def.achievement.id.clone());
            }
            Outcome::Unknown(fact) => {
                evaluation.withheld.insert(def.achievement.id.clone(), fact);
            }
            Outcome::Unmet => {}
        }
    }
    evaluation
}

/// Shorthand for the satisfied set alone.
#[must_use]
pub fn unlocked_ids(catalog: &Catalog, role: Role, facts: &FactBag) -> BTreeSet<String> {
    evaluate_unlocks(catalog, role, facts).satisfied
}
