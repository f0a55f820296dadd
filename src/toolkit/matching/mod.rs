pub mod engine;
pub mod explain;
pub mod scoring;

pub use engine::{
    match_concepts, rank_matches, BoostedPair, MatchOptions, MatchResult, MatchedConcept,
    ProfileMatch, RankOptions,
};
pub use explain::{Explanation, MatchExplainer};
pub use scoring::depth_weight;
