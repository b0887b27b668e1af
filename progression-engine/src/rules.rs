//! Unlock and completion rules over a fact bag
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::facts::{FactBag, FactKey, FactKind};

/// Facts read by a single rule. Most rules read one or two.
pub type RuleFacts = SmallVec<[FactKey; 4]>;

/// A fixed predicate over facts. Rules ship with the catalog and are never
/// authored at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    /// A flag fact must be `true`.
    Flag { fact: FactKey },
    /// A count fact must be at least `min`.
    AtLeast { fact: FactKey, min: u64 },
    /// Every nested rule must hold.
    AllOf { rules: Vec<Rule> },
    /// At least one nested rule must hold.
    AnyOf { rules: Vec<Rule> },
}

/// Three-valued result of a rule. `Unknown` carries the first missing fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Met,
    Unmet,
    Unknown(FactKey),
}

impl Outcome {
    /// Unknown collapses to "not satisfied".
    #[must_use]
    pub const fn is_met(self) -> bool {
        matches!(self, Self::Met)
    }
}

impl Rule {
    #[must_use]
    pub fn outcome(&self, facts: &FactBag) -> Outcome {
        match self {
            Self::Flag { fact } => match facts.flag(*fact) {
                Some(true) => Outcome::Met,
                Some(false) => Outcome::Unmet,
                None => Outcome::Unknown(*fact),
            },
            Self::AtLeast { fact, min } => match facts.count(*fact) {
                Some(value) if value >= *min => Outcome::Met,
                Some(_) => Outcome::Unmet,
                None => Outcome::Unknown(*fact),
            },
            Self::AllOf { rules } => {
                let mut unknown = None;
                for rule in rules {
                    match rule.outcome(facts) {
                        Outcome::Unmet => return Outcome::Unmet,
                        Outcome::Unknown(fact) => {
                            unknown.get_or_insert(fact);
                        }
                        Outcome::Met => {}
                    }
                }
                unknown.map_or(Outcome::Met, Outcome::Unknown)
            }
            Self::AnyOf { rules } => {
                let mut unknown = None;
                for rule in rules {
                    match rule.outcome(facts) {
                        Outcome::Met => return Outcome::Met,
                        Outcome::Unknown(fact) => {
                            unknown.get_or_insert(fact);
                        }
                        Outcome::Unmet => {}
                    }
                }
                unknown.map_or(Outcome::Unmet, Outcome::Unknown)
            }
        }
    }

    #[must_use]
    pub fn is_satisfied(&self, facts: &FactBag) -> bool {
        self.outcome(facts).is_met()
    }

    /// Every fact this rule reads, deduplicated, in first-seen order.
    #[must_use]
    pub fn required_facts(&self) -> RuleFacts {
        let mut out = RuleFacts::new();
        self.collect_facts(&mut out);
        out
    }

    fn collect_facts(&self, out: &mut RuleFacts) {
        match self {
            Self::Flag { fact } | Self::AtLeast { fact, .. } => {
                if !out.contains(fact) {
                    out.push(*fact);
                }
            }
            Self::AllOf { rules } | Self::AnyOf { rules } => {
                for rule in rules {
                    rule.collect_facts(out);
                }
            }
        }
    }

    /// Structural problems: a fact read with the wrong kind, or an empty group.
    pub(crate) fn shape_problem(&self) -> Option<String> {
        match self {
            Self::Flag { fact } if fact.kind() != FactKind::Flag => {
                Some(format!("flag rule reads count fact `{fact}`"))
            }
            Self::AtLeast { fact, .. } if fact.kind() != FactKind::Count => {
                Some(format!("at_least rule reads flag fact `{fact}`"))
            }
            Self::AllOf { rules } | Self::AnyOf { rules } if rules.is_empty() => {
                Some("empty rule group".to_string())
            }
            Self::AllOf { rules } | Self::AnyOf { rules } => {
                rules.iter().find_map(Self::shape_problem)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn favorites(min: u64) -> Rule {
        Rule::AtLeast {
            fact: FactKey::FavoritesCount,
            min,
        }
    }

    fn avatar() -> Rule {
        Rule::Flag {
            fact: FactKey::HasAvatar,
        }
    }

    #[test]
    fn leaf_rules_treat_absent_facts_as_unknown() {
        let empty = FactBag::new();
        assert_eq!(avatar().outcome(&empty), Outcome::Unknown(FactKey::HasAvatar));
        assert!(!favorites(1).is_satisfied(&empty));

        let facts = FactBag::new()
            .with_flag(FactKey::HasAvatar, false)
            .with_count(FactKey::FavoritesCount, 3);
        assert_eq!(avatar().outcome(&facts), Outcome::Unmet);
        assert_eq!(favorites(3).outcome(&facts), Outcome::Met);
        assert_eq!(favorites(4).outcome(&facts), Outcome::Unmet);
    }

    #[test]
    fn all_of_prefers_unmet_over_unknown() {
        let rule = Rule::AllOf {
            rules: vec![favorites(1), avatar()],
        };
        let facts = FactBag::new().with_flag(FactKey::HasAvatar, false);
        assert_eq!(rule.outcome(&facts), Outcome::Unmet);

        let facts = FactBag::new().with_flag(FactKey::HasAvatar, true);
        assert_eq!(rule.outcome(&facts), Outcome::Unknown(FactKey::FavoritesCount));

        let facts = facts.with_count(FactKey::FavoritesCount, 1);
        assert_eq!(rule.outcome(&facts), Outcome::Met);
    }

    #[test]
    fn any_of_prefers_met_over_unknown() {
        let rule = Rule::AnyOf {
            rules: vec![favorites(1), avatar()],
        };
        let facts = FactBag::new().with_flag(FactKey::HasAvatar, true);
        assert_eq!(rule.outcome(&facts), Outcome::Met);
        let facts = FactBag::new().with_flag(FactKey::HasAvatar, false);
        assert_eq!(rule.outcome(&facts), Outcome::Unknown(FactKey::FavoritesCount));
        let facts = facts.with_count(FactKey::FavoritesCount, 0);
        assert_eq!(rule.outcome(&facts), Outcome::Unmet);
    }

    #[test]
    fn required_facts_are_deduplicated() {
        let rule = Rule::AllOf {
            rules: vec![
                favorites(1),
                Rule::AnyOf {
                    rules: vec![avatar(), favorites(5)],
                },
            ],
        };
        assert_eq!(
            rule.required_facts().as_slice(),
            &[FactKey::FavoritesCount, FactKey::HasAvatar]
        );
    }

    #[test]
    fn shape_checks_fact_kinds_and_empty_groups() {
        assert!(avatar().shape_problem().is_none());
        let wrong = Rule::Flag {
            fact: FactKey::FavoritesCount,
        };
        assert!(wrong.shape_problem().unwrap().contains("favorites_count"));
        let nested = Rule::AnyOf {
            rules: vec![avatar(), Rule::AllOf { rules: vec![] }],
        };
        assert_eq!(nested.shape_problem().as_deref(), Some("empty rule group"));
    }

    #[test]
    fn rules_deserialize_from_tagged_json() {
        let rule: Rule = serde_json::from_str(
            r#"{"kind": "all_of", "rules": [
                {"kind": "flag", "fact": "has_avatar"},
                {"kind": "at_least", "fact": "favorites_count", "min": 10}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            rule,
            Rule::AllOf {
                rules: vec![avatar(), favorites(10)]
            }
        );
    }
}
