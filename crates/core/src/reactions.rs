//! Maps raw Slack reaction names onto the fixed set of tracked categories.
//!
//! Several raw emoji names collapse into one category (skin/style variants of
//! the same sentiment); anything outside the table is untracked and lands in
//! the per-record overflow maps instead.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Upvote,
    Downvote,
    Yay,
    Sob,
    Heart,
    Star,
    Fire,
    Leek,
    Real,
    Same,
    Skull,
    Eyes,
    Yipee,
    PingGood,
    PingBad,
}

pub const CATEGORIES: [Category; 15] = [
    Category::Upvote,
    Category::Downvote,
    Category::Yay,
    Category::Sob,
    Category::Heart,
    Category::Star,
    Category::Fire,
    Category::Leek,
    Category::Real,
    Category::Same,
    Category::Skull,
    Category::Eyes,
    Category::Yipee,
    Category::PingGood,
    Category::PingBad,
];

// Alias lists are matched verbatim against the reaction name Slack delivers.
// `upvote` keeps the legacy `this` alias; `Eyes` (capitalized) is a distinct
// custom emoji in the workspace, not a typo.
const ALIASES: &[(Category, &[&str])] = &[
    (Category::Upvote, &["upvote", "this"]),
    (Category::Downvote, &["downvote"]),
    (Category::Yay, &["yay"]),
    (Category::Sob, &["sob", "heavysob", "pf"]),
    (Category::Heart, &["ohneheart", "ohnelove", "blahaj-heart", "heart", "sparkling_heart"]),
    (Category::Star, &["star"]),
    (Category::Fire, &["fire"]),
    (Category::Leek, &["leeks", "leek"]),
    (Category::Real, &["real"]),
    (Category::Same, &["same"]),
    (Category::Skull, &["skulk", "skull", "skull-ios"]),
    (Category::Eyes, &["earthquakyeyes", "eyes_wtf", "eyes", "Eyes"]),
    (Category::Yipee, &["ultrafastparrot", "yippeee"]),
    (Category::PingGood, &["happy_ping_sock"]),
    (Category::PingBad, &["mad_ping_sock"]),
];

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upvote => "upvote",
            Self::Downvote => "downvote",
            Self::Yay => "yay",
            Self::Sob => "sob",
            Self::Heart => "heart",
            Self::Star => "star",
            Self::Fire => "fire",
            Self::Leek => "leek",
            Self::Real => "real",
            Self::Same => "same",
            Self::Skull => "skull",
            Self::Eyes => "eyes",
            Self::Yipee => "yipee",
            Self::PingGood => "ping_good",
            Self::PingBad => "ping_bad",
        }
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        ALIASES
            .iter()
            .find(|(category, _)| category == self)
            .map(|(_, aliases)| *aliases)
            .unwrap_or(&[])
    }
}

/// First category whose alias list contains the raw name, or `None` when the
/// name is untracked.
pub fn classify(reaction_name: &str) -> Option<Category> {
    ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&reaction_name))
        .map(|(category, _)| *category)
}

pub fn is_tracked(reaction_name: &str) -> bool {
    classify(reaction_name).is_some()
}

#[cfg(test)]
mod tests {
    use super::{classify, is_tracked, Category, CATEGORIES};

    #[test]
    fn classify_resolves_primary_names() {
        assert_eq!(classify("upvote"), Some(Category::Upvote));
        assert_eq!(classify("downvote"), Some(Category::Downvote));
        assert_eq!(classify("heart"), Some(Category::Heart));
    }

    #[test]
    fn classify_resolves_legacy_and_variant_aliases() {
        assert_eq!(classify("this"), Some(Category::Upvote));
        assert_eq!(classify("blahaj-heart"), Some(Category::Heart));
        assert_eq!(classify("skull-ios"), Some(Category::Skull));
        assert_eq!(classify("Eyes"), Some(Category::Eyes));
        assert_eq!(classify("ultrafastparrot"), Some(Category::Yipee));
    }

    #[test]
    fn classify_is_exact_match_only() {
        assert_eq!(classify("UPVOTE"), None);
        assert_eq!(classify("upvote "), None);
        assert_eq!(classify("partyparrot"), None);
    }

    #[test]
    fn untracked_names_are_untracked() {
        assert!(is_tracked("upvote"));
        assert!(!is_tracked("thumbsup"));
        assert!(!is_tracked(""));
    }

    #[test]
    fn every_category_has_at_least_one_alias() {
        for category in CATEGORIES {
            assert!(!category.aliases().is_empty(), "{} has no aliases", category.as_str());
        }
    }

    #[test]
    fn aliases_map_back_to_their_category() {
        for category in CATEGORIES {
            for alias in category.aliases() {
                assert_eq!(classify(alias), Some(category), "alias {alias} misrouted");
            }
        }
    }
}
