// Aggregation Logic
// Combines the three detector scores and applies the pass policy

use crate::models::DetectorScoreSet;

/// Aggregate below this passes (the product copy promises 10%; the decision logic uses 15)
pub const DEFAULT_PASS_THRESHOLD: f64 = 15.0;

/// Round to two decimals, the precision reported to callers
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Unweighted mean of the three scores, two-decimal precision
pub fn aggregate_scores(scores: &DetectorScoreSet) -> f64 {
    round2((scores.remote + scores.heuristic + scores.perplexity) / 3.0)
}

/// Strictly below the threshold passes
pub fn is_passing(aggregate: f64, threshold: f64) -> bool {
    aggregate < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_is_unweighted_mean() {
        let scores = DetectorScoreSet {
            remote: 10.0,
            heuristic: 20.0,
            perplexity: 30.0,
        };
        assert_eq!(aggregate_scores(&scores), 20.0);
    }

    #[test]
    fn test_aggregate_rounds_to_two_decimals() {
        let scores = DetectorScoreSet {
            remote: 12.345,
            heuristic: 5.0,
            perplexity: 5.0,
        };
        assert_eq!(aggregate_scores(&scores), 7.45);
    }

    #[test]
    fn test_pass_boundary() {
        assert!(is_passing(14.99, DEFAULT_PASS_THRESHOLD));
        assert!(!is_passing(15.0, DEFAULT_PASS_THRESHOLD));
        assert!(!is_passing(80.0, DEFAULT_PASS_THRESHOLD));
    }
}
