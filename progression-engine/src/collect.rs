//! Fact collection boundary: fan out per-fact lookups, fan results back in
//!
//! Every lookup runs concurrently and fails on its own. A failed lookup is
//! recorded and its fact left out of the bag; it never aborts the batch.
use async_trait::async_trait;
use futures::future::join_all;

use crate::facts::{FactBag, FactKey, FactValue};
use crate::role::Role;

/// A source of individual facts about a user.
#[async_trait]
pub trait FactSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Look up one fact. `Ok(None)` means the source has no value for it.
    async fn fetch(
        &self,
        user_id: &str,
        role: Role,
        fact: FactKey,
    ) -> Result<Option<FactValue>, Self::Error>;
}

/// A lookup that failed and was downgraded to "fact absent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactFailure {
    pub fact: FactKey,
    pub message: String,
}

/// Facts gathered for one user plus the lookups that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collection {
    pub facts: FactBag,
    pub failures: Vec<FactFailure>,
}

/// Fetch every fact in `keys` concurrently and merge the results.
pub async fn collect_facts<S, I>(source: &S, user_id: &str, role: Role, keys: I) -> Collection
where
    S: FactSource + ?Sized,
    I: IntoIterator<Item = FactKey>,
{
    let lookups = keys.into_iter().map(|fact| async move {
        let outcome = source.fetch(user_id, role, fact).await;
        (fact, outcome)
    });

    let mut collection = Collection::default();
    for (fact, outcome) in join_all(lookups).await {
        match outcome {
            Ok(Some(value)) => collection.facts.insert(fact, value),
            Ok(None) => {}
            Err(err) => {
                log::warn!("fact `{fact}` unavailable for user {user_id}: {err}");
                collection.failures.push(FactFailure {
                    fact,
                    message: err.to_string(),
                });
            }
        }
    }
    collection
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("backend timed out")]
    struct LookupFailed;

    struct FixtureSource {
        values: HashMap<FactKey, FactValue>,
        failing: Vec<FactKey>,
    }

    #[async_trait]
    impl FactSource for FixtureSource {
        type Error = LookupFailed;

        async fn fetch(
            &self,
            _user_id: &str,
            _role: Role,
            fact: FactKey,
        ) -> Result<Option<FactValue>, Self::Error> {
            if self.failing.contains(&fact) {
                return Err(LookupFailed);
            }
            Ok(self.values.get(&fact).copied())
        }
    }

    #[tokio::test]
    async fn failed_lookups_become_absent_facts() {
        let source = FixtureSource {
            values: HashMap::from([
                (FactKey::HasAvatar, FactValue::Flag(true)),
                (FactKey::FavoritesCount, FactValue::Count(4)),
                (FactKey::MessagesSentCount, FactValue::Count(2)),
            ]),
            failing: vec![FactKey::FavoritesCount],
        };
        let keys = [
            FactKey::HasAvatar,
            FactKey::FavoritesCount,
            FactKey::MessagesSentCount,
            FactKey::ConnectionsCount,
        ];

        let collection = collect_facts(&source, "u1", Role::Investor, keys).await;

        assert_eq!(collection.facts.flag(FactKey::HasAvatar), Some(true));
        assert_eq!(collection.facts.count(FactKey::MessagesSentCount), Some(2));
        assert!(!collection.facts.contains(FactKey::FavoritesCount));
        assert!(!collection.facts.contains(FactKey::ConnectionsCount));
        assert_eq!(
            collection.failures,
            vec![FactFailure {
                fact: FactKey::FavoritesCount,
                message: "backend timed out".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn empty_key_set_collects_nothing() {
        let source = FixtureSource {
            values: HashMap::new(),
            failing: Vec::new(),
        };
        let collection = collect_facts(&source, "u1", Role::Syndicator, std::iter::empty()).await;
        assert_eq!(collection, Collection::default());
    }
}
