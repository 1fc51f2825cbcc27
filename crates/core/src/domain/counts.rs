use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reactions::Category;

/// One counter per tracked category. Shared between the message side
/// (received reactions) and the user side (given reactions).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTallies {
    pub upvotes: i64,
    pub downvotes: i64,
    pub yay: i64,
    pub sob: i64,
    pub heart: i64,
    pub star: i64,
    pub fire: i64,
    pub leek: i64,
    pub real: i64,
    pub same: i64,
    pub skull: i64,
    pub eyes: i64,
    pub yipee: i64,
    pub ping_good: i64,
    pub ping_bad: i64,
}

impl CategoryTallies {
    pub fn get(&self, category: Category) -> i64 {
        match category {
            Category::Upvote => self.upvotes,
            Category::Downvote => self.downvotes,
            Category::Yay => self.yay,
            Category::Sob => self.sob,
            Category::Heart => self.heart,
            Category::Star => self.star,
            Category::Fire => self.fire,
            Category::Leek => self.leek,
            Category::Real => self.real,
            Category::Same => self.same,
            Category::Skull => self.skull,
            Category::Eyes => self.eyes,
            Category::Yipee => self.yipee,
            Category::PingGood => self.ping_good,
            Category::PingBad => self.ping_bad,
        }
    }

    pub fn set(&mut self, category: Category, value: i64) {
        let slot = match category {
            Category::Upvote => &mut self.upvotes,
            Category::Downvote => &mut self.downvotes,
            Category::Yay => &mut self.yay,
            Category::Sob => &mut self.sob,
            Category::Heart => &mut self.heart,
            Category::Star => &mut self.star,
            Category::Fire => &mut self.fire,
            Category::Leek => &mut self.leek,
            Category::Real => &mut self.real,
            Category::Same => &mut self.same,
            Category::Skull => &mut self.skull,
            Category::Eyes => &mut self.eyes,
            Category::Yipee => &mut self.yipee,
            Category::PingGood => &mut self.ping_good,
            Category::PingBad => &mut self.ping_bad,
        };
        *slot = value;
    }

    /// Apply a signed delta, clamping at zero.
    pub fn add_clamped(&mut self, category: Category, delta: i64) {
        let next = (self.get(category) + delta).max(0);
        self.set(category, next);
    }

    pub fn sum(&self) -> i64 {
        crate::reactions::CATEGORIES.iter().map(|category| self.get(*category)).sum()
    }
}

/// A message's full reaction state: fixed category counters, the overflow map
/// for untracked reaction names, and the grand total.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReactionCounts {
    pub tallies: CategoryTallies,
    pub other: BTreeMap<String, i64>,
    pub total: i64,
}

impl ReactionCounts {
    pub fn zero() -> Self {
        Self::default()
    }
}
