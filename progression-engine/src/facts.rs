//! Fact keys and the per-user fact bag consumed by unlock rules
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Whether a fact is a yes/no flag or a non-negative count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Flag,
    Count,
}

/// Named facts about one user's account or activity.
///
/// The set is fixed per release; collectors supply values for whichever of
/// these they could look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKey {
    HasAvatar,
    ProfileComplete,
    HasInvestmentPreferences,
    HasCompanyLogo,
    IsVerified,
    FavoritesCount,
    DealsViewedCount,
    MessagesSentCount,
    ConnectionsCount,
    InvestmentsCount,
    TotalDealsCount,
    PublishedDealCount,
    DealInterestCount,
}

impl FactKey {
    pub const ALL: [Self; 13] = [
        Self::HasAvatar,
        Self::ProfileComplete,
        Self::HasInvestmentPreferences,
        Self::HasCompanyLogo,
        Self::IsVerified,
        Self::FavoritesCount,
        Self::DealsViewedCount,
        Self::MessagesSentCount,
        Self::ConnectionsCount,
        Self::InvestmentsCount,
        Self::TotalDealsCount,
        Self::PublishedDealCount,
        Self::DealInterestCount,
    ];

    #[must_use]
    pub const fn kind(self) -> FactKind {
        match self {
            Self::HasAvatar
            | Self::ProfileComplete
            | Self::HasInvestmentPreferences
            | Self::HasCompanyLogo
            | Self::IsVerified => FactKind::Flag,
            Self::FavoritesCount
            | Self::DealsViewedCount
            | Self::MessagesSentCount
            | Self::ConnectionsCount
            | Self::InvestmentsCount
            | Self::TotalDealsCount
            | Self::PublishedDealCount
            | Self::DealInterestCount => FactKind::Count,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HasAvatar => "has_avatar",
            Self::ProfileComplete => "profile_complete",
            Self::HasInvestmentPreferences => "has_investment_preferences",
            Self::HasCompanyLogo => "has_company_logo",
            Self::IsVerified => "is_verified",
            Self::FavoritesCount => "favorites_count",
            Self::DealsViewedCount => "deals_viewed_count",
            Self::MessagesSentCount => "messages_sent_count",
            Self::ConnectionsCount => "connections_count",
            Self::InvestmentsCount => "investments_count",
            Self::TotalDealsCount => "total_deals_count",
            Self::PublishedDealCount => "published_deal_count",
            Self::DealInterestCount => "deal_interest_count",
        }
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown fact `{s}`"))
    }
}

/// A single fact value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Flag(bool),
    Count(u64),
}

/// Facts about one user. Any key may be missing; a missing key means the
/// value is unknown, which is different from `false` or `0` only in that it
/// is reported as the reason a rule was withheld.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactBag(BTreeMap<FactKey, FactValue>);

/// Result of lenient fact loading: the usable bag plus the names that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LenientFacts {
    pub facts: FactBag,
    pub ignored: Vec<String>,
}

impl FactBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style flag insert.
    #[must_use]
    pub fn with_flag(mut self, key: FactKey, value: bool) -> Self {
        self.insert(key, FactValue::Flag(value));
        self
    }

    /// Builder-style count insert.
    #[must_use]
    pub fn with_count(mut self, key: FactKey, value: u64) -> Self {
        self.insert(key, FactValue::Count(value));
        self
    }

    pub fn insert(&mut self, key: FactKey, value: FactValue) {
        self.0.insert(key, value);
    }

    pub fn remove(&mut self, key: FactKey) -> Option<FactValue> {
        self.0.remove(&key)
    }

    #[must_use]
    pub fn get(&self, key: FactKey) -> Option<FactValue> {
        self.0.get(&key).copied()
    }

    /// Flag value, or `None` when absent or stored with the wrong kind.
    #[must_use]
    pub fn flag(&self, key: FactKey) -> Option<bool> {
        match self.get(key)? {
            FactValue::Flag(value) => Some(value),
            FactValue::Count(_) => None,
        }
    }

    /// Count value, or `None` when absent or stored with the wrong kind.
    #[must_use]
    pub fn count(&self, key: FactKey) -> Option<u64> {
        match self.get(key)? {
            FactValue::Count(value) => Some(value),
            FactValue::Flag(_) => None,
        }
    }

    #[must_use]
    pub fn contains(&self, key: FactKey) -> bool {
        self.0.contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Load facts from a JSON object, skipping unknown names, `null` values
    /// and values that are neither booleans nor non-negative integers.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a JSON object.
    pub fn from_json_lenient(json: &str) -> Result<LenientFacts, serde_json::Error> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut out = LenientFacts::default();
        for (name, value) in raw {
            let Ok(key) = name.parse::<FactKey>() else {
                out.ignored.push(name);
                continue;
            };
            let parsed = match value {
                serde_json::Value::Bool(flag) => Some(FactValue::Flag(flag)),
                serde_json::Value::Number(number) => number.as_u64().map(FactValue::Count),
                _ => None,
            };
            match parsed {
                Some(value) => out.facts.insert(key, value),
                None => out.ignored.push(name),
            }
        }
        Ok(out)
    }
}

impl FromIterator<(FactKey, FactValue)> for FactBag {
    fn from_iter<T: IntoIterator<Item = (FactKey, FactValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
