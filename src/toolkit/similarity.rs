use std::collections::HashSet;
use std::hash::Hash;


pub fn cosine_similarity(vec1: &[f32], vec2: &[f32]) -> f64 {
    if vec1.len() != vec2.len() || vec1.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = vec1.iter().zip(vec2.iter()).map(|(a, b)| a * b).sum();
    let mag1: f32 = vec1.iter().map(|a| a * a).sum::<f32>().sqrt();
    let mag2: f32 = vec2.iter().map(|b| b * b).sum::<f32>().sqrt();

    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    f64::from(dot_product / (mag1 * mag2)).clamp(-1.0, 1.0)
}


pub fn batch_cosine_similarity(query: &[f32], candidates: &[Vec<f32>]) -> Vec<f64> {
    candidates
        .iter()
        .map(|candidate| cosine_similarity(query, candidate))
        .collect()
}

/// |A ∩ B| / |A ∪ B|; two empty sets are treated as unrelated (0.0).
pub fn jaccard_similarity<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Element-wise mean of equally sized vectors. Vectors with a different length
/// than the first one are skipped.
pub fn mean_pool<'a>(vectors: impl IntoIterator<Item = &'a [f32]>) -> Option<Vec<f32>> {
    let mut sum: Option<Vec<f32>> = None;
    let mut count = 0usize;

    for vector in vectors {
        if vector.is_empty() {
            continue;
        }
        match sum.as_mut() {
            None => {
                sum = Some(vector.to_vec());
                count = 1;
            }
            Some(acc) if acc.len() == vector.len() => {
                for (a, v) in acc.iter_mut().zip(vector) {
                    *a += v;
                }
                count += 1;
            }
            Some(_) => continue,
        }
    }

    sum.map(|mut acc| {
        for value in acc.iter_mut() {
            *value /= count as f32;
        }
        acc
    })
}
