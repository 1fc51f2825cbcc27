use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::counts::CategoryTallies;
use crate::reactions::{self, Category};

/// Where a given reaction lands on a user's stats row: a fixed category
/// counter, or an entry in the open overflow map keyed by raw name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GivenTarget {
    Category(Category),
    Other(String),
}

impl GivenTarget {
    pub fn for_reaction(reaction_name: &str) -> Self {
        match reactions::classify(reaction_name) {
            Some(category) => Self::Category(category),
            None => Self::Other(reaction_name.to_string()),
        }
    }
}

/// Per-user counters of reactions *given* to others' messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserStats {
    pub user_id: String,
    pub user_name: String,
    pub avatar_url: Option<String>,
    pub given: CategoryTallies,
    pub other_given: BTreeMap<String, i64>,
    pub updated_at: DateTime<Utc>,
}

impl UserStats {
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        avatar_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            avatar_url,
            given: CategoryTallies::default(),
            other_given: BTreeMap::new(),
            updated_at: now,
        }
    }

    /// Apply a signed delta to the target bucket. Category counters clamp at
    /// zero; overflow entries are pruned once they reach zero.
    pub fn apply(&mut self, target: &GivenTarget, delta: i64, now: DateTime<Utc>) {
        match target {
            GivenTarget::Category(category) => self.given.add_clamped(*category, delta),
            GivenTarget::Other(name) => {
                let next = self.other_given.get(name).copied().unwrap_or(0) + delta;
                if next > 0 {
                    self.other_given.insert(name.clone(), next);
                } else {
                    self.other_given.remove(name);
                }
            }
        }
        self.updated_at = now;
    }
}
