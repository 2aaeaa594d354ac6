use std::collections::HashSet;

use crate::{
    error::MatchError,
    models::{AudioFeatures, ScoredTrack, Track, TrackId, FEATURE_COUNT},
};

/// Feature vector in canonical order
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Component-wise mean of the seeds' features
///
/// A missing value is left out of that component's mean rather than counted
/// as zero. A component no seed carries makes the centroid undefined.
pub fn centroid(seeds: &[Track]) -> Result<FeatureVector, MatchError> {
    let mut sums = [0.0; FEATURE_COUNT];
    let mut counts = [0usize; FEATURE_COUNT];

    for seed in seeds {
        for (dim, value) in seed.features.components().into_iter().enumerate() {
            if let Some(value) = value {
                sums[dim] += value;
                counts[dim] += 1;
            }
        }
    }

    let mut centroid = [0.0; FEATURE_COUNT];
    for dim in 0..FEATURE_COUNT {
        if counts[dim] == 0 {
            return Err(MatchError::InsufficientFeatureData(AudioFeatures::NAMES[dim]));
        }
        centroid[dim] = sums[dim] / counts[dim] as f64;
    }

    Ok(centroid)
}

/// Candidate features as a dense vector, missing components read as zero
pub fn dense_features(features: &AudioFeatures) -> FeatureVector {
    features.components().map(|value| value.unwrap_or(0.0))
}

/// Cosine similarity, defined as 0 when either vector has zero norm
pub fn cosine_similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Ranks candidates by similarity to the seeds' centroid
///
/// Seeds are never returned. Ties on similarity fall back to popularity
/// (descending), then to the order candidates were given in.
pub fn score(
    seeds: &[Track],
    candidates: Vec<Track>,
    n: usize,
) -> Result<Vec<ScoredTrack>, MatchError> {
    let anchor = centroid(seeds)?;
    let seed_ids: HashSet<TrackId> = seeds.iter().map(|s| s.id).collect();

    let mut scored: Vec<ScoredTrack> = candidates
        .into_iter()
        .filter(|track| !seed_ids.contains(&track.id))
        .map(|track| {
            let similarity = cosine_similarity(&anchor, &dense_features(&track.features));
            ScoredTrack { track, similarity }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| b.track.popularity.cmp(&a.track.popularity))
    });
    scored.truncate(n);

    tracing::debug!(
        seeds = seeds.len(),
        returned = scored.len(),
        best = scored.first().map(|s| s.similarity),
        "Similarity scoring completed"
    );

    Ok(scored)
}
