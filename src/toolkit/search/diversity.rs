use std::collections::HashSet;

use super::models::LecturerSearchResult;
use crate::toolkit::similarity::jaccard_similarity;
use crate::toolkit::text::{normalize, split_phrases};

const NAME_WEIGHT: f64 = 0.5;
const RESEARCH_WEIGHT: f64 = 0.3;
const AREA_WEIGHT: f64 = 0.2;

fn phrase_set(values: &[String]) -> HashSet<String> {
    values.iter().flat_map(|v| split_phrases(v)).collect()
}

/// Precomputed comparison features of one result.
struct Profile {
    name: String,
    research: HashSet<String>,
    area: HashSet<String>,
}

impl Profile {
    fn of(result: &LecturerSearchResult) -> Self {
        Self {
            name: normalize(&result.full_name),
            research: phrase_set(&result.research_interests),
            area: phrase_set(&result.area_of_interest),
        }
    }

    fn similarity(&self, other: &Profile) -> f64 {
        NAME_WEIGHT * strsim::normalized_levenshtein(&self.name, &other.name)
            + RESEARCH_WEIGHT * jaccard_similarity(&self.research, &other.research)
            + AREA_WEIGHT * jaccard_similarity(&self.area, &other.area)
    }
}

/// Similarity of two results in [0, 1]: fuzzy name similarity plus overlap of research
/// interests and areas of interest.
pub fn profile_similarity(a: &LecturerSearchResult, b: &LecturerSearchResult) -> f64 {
    Profile::of(a).similarity(&Profile::of(b))
}

/// Maximal marginal relevance selection over `final_score`.
///
/// Starts from the highest scoring result, then repeatedly adds the result maximizing
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`. Returns exactly
/// `limit` results when more are given, in selection order.
pub fn select_diverse(
    mut candidates: Vec<LecturerSearchResult>,
    limit: usize,
    lambda: f64,
) -> Vec<LecturerSearchResult> {
    candidates.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.lecturer_id.cmp(&b.lecturer_id))
    });
    if candidates.len() <= limit {
        return candidates;
    }
    if limit == 0 {
        return Vec::new();
    }

    let features: Vec<Profile> = candidates.iter().map(Profile::of).collect();
    let mut selected: Vec<usize> = vec![0];
    let mut remaining: Vec<usize> = (1..candidates.len()).collect();

    while selected.len() < limit {
        let mut best: Option<(usize, f64)> = None;
        for (pos, &idx) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| features[idx].similarity(&features[s]))
                .fold(0.0, f64::max);
            let mmr = lambda * candidates[idx].final_score - (1.0 - lambda) * redundancy;
            if best.is_none_or(|(_, score)| mmr > score) {
                best = Some((pos, mmr));
            }
        }
        let Some((pos, _)) = best else {
            break;
        };
        selected.push(remaining.remove(pos));
    }

    let mut slots: Vec<Option<LecturerSearchResult>> = candidates.into_iter().map(Some).collect();
    selected
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect()
}
