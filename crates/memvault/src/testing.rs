//! Test utilities - deterministic embedding vectors
//!
//! Production callers bring their own embeddings; tests need predictable
//! ones. These helpers produce stable vectors without any model.

/// Deterministic pseudo-embedding derived from a text hash, normalized to
/// unit length. Equal inputs give equal vectors; different inputs are very
/// unlikely to collide.
pub fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();

    let mut embedding: Vec<f32> = (0..dimension)
        .map(|i| {
            let x = seed
                .wrapping_mul(i as u64 + 1)
                .wrapping_add(0x9e3779b97f4a7c15);
            let normalized = (x as f32) / (u64::MAX as f32);
            (normalized * 2.0) - 1.0
        })
        .collect();

    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for val in &mut embedding {
            *val /= magnitude;
        }
    }

    embedding
}

/// Unit vector along one axis, handy for exact-similarity scenarios.
pub fn unit_embedding(dimension: usize, axis: usize) -> Vec<f32> {
    let mut embedding = vec![0.0; dimension];
    embedding[axis] = 1.0;
    embedding
}
