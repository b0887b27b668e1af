//! Fact source backed by a JSON file.
//!
//! The file is a flat object of fact names to booleans or counts. An optional
//! `unavailable` array lists facts whose lookup should fail, which is how
//! fixture files exercise the collector's failure path.
use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use progression_engine::{FactBag, FactKey, FactSource, FactValue, Role};
use serde::Deserialize;
use thiserror::Error;

const UNAVAILABLE_KEY: &str = "unavailable";

#[derive(Debug, Error)]
#[error("lookup of `{0}` failed")]
pub struct FactLookupError(pub FactKey);

#[derive(Debug, Default, Deserialize)]
struct Directives {
    #[serde(default)]
    unavailable: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct JsonFactSource {
    facts: FactBag,
    unavailable: BTreeSet<FactKey>,
}

impl JsonFactSource {
    pub fn from_json(json: &str) -> Result<Self> {
        let loaded = FactBag::from_json_lenient(json).context("fact file must be a JSON object")?;
        let directives: Directives =
            serde_json::from_str(json).context("`unavailable` must be a list of fact names")?;

        let mut unavailable = BTreeSet::new();
        for name in directives.unavailable {
            match name.parse::<FactKey>() {
                Ok(key) => {
                    unavailable.insert(key);
                }
                Err(err) => log::warn!("ignoring unavailable entry: {err}"),
            }
        }
        for name in loaded.ignored.iter().filter(|name| *name != UNAVAILABLE_KEY) {
            log::warn!("ignoring fact `{name}`: unknown name or unusable value");
        }

        Ok(Self {
            facts: loaded.facts,
            unavailable,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read facts from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid facts in {}", path.display()))
    }
}

#[async_trait]
impl FactSource for JsonFactSource {
    type Error = FactLookupError;

    async fn fetch(
        &self,
        _user_id: &str,
        _role: Role,
        fact: FactKey,
    ) -> Result<Option<FactValue>, Self::Error> {
        if self.unavailable.contains(&fact) {
            return Err(FactLookupError(fact));
        }
        Ok(self.facts.get(fact))
    }
}
