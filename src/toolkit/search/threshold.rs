/// Minimum final score for a search result. Name queries get the loosest bar; topic
/// queries get stricter as the number of recognized concepts grows.
pub fn score_threshold(has_name: bool, concept_count: usize) -> f64 {
    if has_name {
        0.60
    } else if concept_count <= 2 {
        0.65
    } else if concept_count <= 5 {
        0.70
    } else {
        0.75
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(score_threshold(true, 10), 0.60);
        assert_eq!(score_threshold(false, 0), 0.65);
        assert_eq!(score_threshold(false, 2), 0.65);
        assert_eq!(score_threshold(false, 3), 0.70);
        assert_eq!(score_threshold(false, 5), 0.70);
        assert_eq!(score_threshold(false, 6), 0.75);
    }
}
