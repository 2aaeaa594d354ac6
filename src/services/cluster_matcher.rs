use crate::{
    error::MatchError,
    models::{ClusterHierarchy, ClusterLabel, ClusterMatch, MatchDegree, Track, TrackId},
};

/// Seed index pairs checked for a two-way match, in order
const SEED_PAIRS: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];

/// Finds the cluster the three seeds agree on
///
/// Levels are scanned coarsest first. A three-way agreement at any level beats
/// a two-way agreement at any level; within a degree the first level wins.
/// When nothing matches, `with_fallback` decides between using the first
/// seed's label at the hierarchy's fallback level and failing with
/// [`MatchError::NoConsensus`].
pub fn match_seeds(
    seeds: &[Track; 3],
    hierarchy: &ClusterHierarchy,
    with_fallback: bool,
) -> Result<ClusterMatch, MatchError> {
    if let Some(found) = find_all_three(seeds, hierarchy) {
        return Ok(found);
    }

    if let Some(found) = find_two_of_three(seeds, hierarchy) {
        return Ok(found);
    }

    if !with_fallback {
        tracing::debug!("No cluster consensus and fallback disabled");
        return Err(MatchError::NoConsensus);
    }

    let level = hierarchy.fallback_level();
    let shared_value = seeds[0].label_at(level).ok_or(MatchError::NoConsensus)?;

    tracing::debug!(
        level = hierarchy.name(level),
        shared_value = %shared_value,
        "Falling back to first seed's cluster"
    );

    Ok(ClusterMatch {
        level,
        shared_value,
        degree: MatchDegree::FallbackFirstSeed,
    })
}

fn labels_at(seeds: &[Track; 3], level: usize) -> Option<[ClusterLabel; 3]> {
    Some([
        seeds[0].label_at(level)?,
        seeds[1].label_at(level)?,
        seeds[2].label_at(level)?,
    ])
}

fn find_all_three(seeds: &[Track; 3], hierarchy: &ClusterHierarchy) -> Option<ClusterMatch> {
    (0..hierarchy.depth()).find_map(|level| {
        let [a, b, c] = labels_at(seeds, level)?;
        (a == b && b == c).then_some(ClusterMatch {
            level,
            shared_value: a,
            degree: MatchDegree::AllThree,
        })
    })
}

fn find_two_of_three(seeds: &[Track; 3], hierarchy: &ClusterHierarchy) -> Option<ClusterMatch> {
    (0..hierarchy.depth()).find_map(|level| {
        let labels = labels_at(seeds, level)?;
        SEED_PAIRS
            .iter()
            .find(|(i, j)| labels[*i] == labels[*j])
            .map(|(i, _)| ClusterMatch {
                level,
                shared_value: labels[*i],
                degree: MatchDegree::TwoOfThree,
            })
    })
}

/// Keeps catalog tracks sitting in the matched cluster, most popular first
///
/// Seeds are excluded. The sort is stable, so equal popularity keeps catalog
/// order. At most `n` tracks are returned.
pub fn rank_cluster_candidates(
    catalog: Vec<Track>,
    seed_ids: &[TrackId],
    found: &ClusterMatch,
    n: usize,
) -> Vec<Track> {
    let mut candidates: Vec<Track> = catalog
        .into_iter()
        .filter(|track| !seed_ids.contains(&track.id))
        .filter(|track| track.label_at(found.level) == Some(found.shared_value))
        .collect();

    candidates.sort_by(|a, b| b.popularity.cmp(&a.popularity));
    candidates.truncate(n);
    candidates
}
