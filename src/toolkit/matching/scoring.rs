/// Weight of an exact concept match at `depth`. Deeper keys are more specific and
/// weigh more; depths at or above the domain level get half weight.
pub fn depth_weight(depth: usize) -> f64 {
    match depth {
        0..=2 => 0.5,
        3 => 1.0,
        4 => 1.5,
        5 => 2.0,
        _ => 2.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_steps() {
        assert_eq!(depth_weight(3), 1.0);
        assert_eq!(depth_weight(4), 1.5);
        assert_eq!(depth_weight(5), 2.0);
        assert_eq!(depth_weight(6), 2.5);
        assert_eq!(depth_weight(12), 2.5);
    }

    #[test]
    fn test_weight_is_non_decreasing() {
        for depth in 0..20 {
            assert!(depth_weight(depth + 1) >= depth_weight(depth));
        }
    }
}
