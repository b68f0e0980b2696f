//! Query results.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::record::Metadata;

/// One (id, score) hit, with metadata when the backend returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<Metadata>,
}

impl QueryMatch {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            metadata: None,
        }
    }
}

/// NaN ranks as the worst possible score, whatever its sign bit.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() { f32::NEG_INFINITY } else { score }
}

/// Best first; equal scores fall back to ascending id.
pub fn compare_matches(a: &QueryMatch, b: &QueryMatch) -> Ordering {
    rank_key(b.score)
        .total_cmp(&rank_key(a.score))
        .then_with(|| a.id.cmp(&b.id))
}

/// Put backend hits into canonical order: sorted, one entry per id, at most
/// `top_k` long.
pub fn rank_matches(mut matches: Vec<QueryMatch>, top_k: usize) -> Vec<QueryMatch> {
    for m in &mut matches {
        m.score = rank_key(m.score);
    }
    matches.sort_by(compare_matches);

    let mut seen = HashSet::with_capacity(matches.len());
    matches.retain(|m| seen.insert(m.id.clone()));
    matches.truncate(top_k);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_orders_by_score_then_id() {
        let ranked = rank_matches(
            vec![
                QueryMatch::new("b", 0.5),
                QueryMatch::new("c", 0.9),
                QueryMatch::new("a", 0.5),
            ],
            10,
        );
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn test_rank_dedups_and_truncates() {
        let ranked = rank_matches(
            vec![
                QueryMatch::new("a", 0.2),
                QueryMatch::new("a", 0.8),
                QueryMatch::new("b", 0.7),
                QueryMatch::new("c", 0.1),
            ],
            2,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "a");
        assert_eq!(ranked[0].score, 0.8);
        assert_eq!(ranked[1].id, "b");
    }

    #[test]
    fn test_nan_scores_sort_last() {
        let ranked = rank_matches(
            vec![QueryMatch::new("nan", f32::NAN), QueryMatch::new("x", 0.1)],
            2,
        );
        assert_eq!(ranked[0].id, "x");
        assert_eq!(ranked[1].score, f32::NEG_INFINITY);
    }

    #[test]
    fn test_nan_sign_does_not_change_order() {
        let negative_nan = -f32::NAN;
        assert!(negative_nan.is_nan() && negative_nan.is_sign_negative());
        let ranked = rank_matches(
            vec![
                QueryMatch::new("pos", f32::NAN),
                QueryMatch::new("neg", negative_nan),
                QueryMatch::new("low", -5.0),
            ],
            3,
        );
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["low", "neg", "pos"]);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
