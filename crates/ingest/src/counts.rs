//! Authoritative counter derivation.
//!
//! Counters are never incremented from individual events; every write
//! recomputes the full truth from the upstream reaction list. Upvotes count
//! distinct reacting users so that two upvote-aliased emoji from the same
//! person score once; every other category sums raw counts across its
//! aliases. Unclassified names land in the overflow map and still count
//! toward the total.

use std::collections::HashSet;

use vibes_core::domain::ReactionCounts;
use vibes_core::reactions::{classify, Category};
use vibes_slack::api::ReactionTally;

pub fn derive_counts(tallies: &[ReactionTally]) -> ReactionCounts {
    let mut counts = ReactionCounts::zero();
    let mut upvoters: HashSet<&str> = HashSet::new();

    for tally in tallies {
        match classify(&tally.name) {
            Some(Category::Upvote) => {
                for user in &tally.users {
                    upvoters.insert(user.as_str());
                }
            }
            Some(category) => {
                let current = counts.tallies.get(category);
                counts.tallies.set(category, current + tally.count);
            }
            None => {
                *counts.other.entry(tally.name.clone()).or_insert(0) += tally.count;
            }
        }
    }

    counts.tallies.upvotes = upvoters.len() as i64;
    counts.total = counts.tallies.sum() + counts.other.values().sum::<i64>();
    counts
}
