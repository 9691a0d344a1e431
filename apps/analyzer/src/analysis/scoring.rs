use crate::models::analysis::KeywordCount;

/// Share of keywords found at least once, as a percentage rounded to two
/// decimals. An empty keyword list scores 0.
pub fn relevance_score(counts: &[KeywordCount]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }
    let matched = counts.iter().filter(|c| c.count > 0).count();
    round2(matched as f64 / counts.len() as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, usize)]) -> Vec<KeywordCount> {
        pairs
            .iter()
            .map(|(k, c)| KeywordCount {
                keyword: k.to_string(),
                count: *c,
            })
            .collect()
    }

    #[test]
    fn test_two_of_three_keywords() {
        let score = relevance_score(&counts(&[("Docker", 2), ("Kubernetes", 0), ("Go", 1)]));
        assert_eq!(score, 66.67);
    }

    #[test]
    fn test_all_and_none() {
        assert_eq!(relevance_score(&counts(&[("Rust", 4), ("Go", 1)])), 100.0);
        assert_eq!(relevance_score(&counts(&[("Rust", 0), ("Go", 0)])), 0.0);
    }

    #[test]
    fn test_one_third_rounds_down() {
        let score = relevance_score(&counts(&[("a", 1), ("b", 0), ("c", 0)]));
        assert_eq!(score, 33.33);
    }

    #[test]
    fn test_empty_keyword_list_scores_zero() {
        assert_eq!(relevance_score(&[]), 0.0);
    }

    #[test]
    fn test_occurrence_volume_does_not_matter() {
        let few = relevance_score(&counts(&[("a", 1), ("b", 0)]));
        let many = relevance_score(&counts(&[("a", 40), ("b", 0)]));
        assert_eq!(few, many);
    }
}
