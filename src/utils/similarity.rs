//! Vector similarity functions shared by the in-process index and rerankers.

// Accumulation runs in f64 so squares of large finite components stay finite.

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    dot_f64(a, b) as f32
}

pub fn norm(v: &[f32]) -> f32 {
    norm_f64(v) as f32
}

fn dot_f64(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum()
}

fn norm_f64(v: &[f32]) -> f64 {
    v.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt()
}

/// Cosine similarity; 0.0 when either vector has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let denom = norm_f64(a) * norm_f64(b);
    if denom > 0.0 && denom.is_finite() {
        (dot_f64(a, b) / denom).clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Map a non-negative distance onto (0, 1], 1.0 meaning identical.
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// L2-normalize; zero vectors are returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let n = norm_f64(v);
    if n > 0.0 {
        v.iter().map(|&x| (x as f64 / n) as f32).collect()
    } else {
        v.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_large_components_stay_finite() {
        let big = [1e20f32, 0.0, 0.0, 0.0];
        assert!((cosine(&big, &big) - 1.0).abs() < 1e-6);
        assert!(cosine(&big, &[1.0, 1.0, 0.0, 0.0]).is_finite());
        assert!((norm(&normalize(&big)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_score() {
        assert_eq!(distance_to_score(euclidean(&[1.0, 2.0], &[1.0, 2.0])), 1.0);
        assert!((euclidean(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert!((distance_to_score(1.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize() {
        let v = normalize(&[3.0, 4.0]);
        assert!((norm(&v) - 1.0).abs() < 1e-6);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
