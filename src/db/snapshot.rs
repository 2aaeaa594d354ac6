use std::{collections::HashMap, path::Path};

use anyhow::{bail, Context};

use crate::{
    db::CatalogStore,
    error::AppResult,
    models::{ClusterHierarchy, Track, TrackId, TrackSummary},
};

/// Immutable in-memory catalog
///
/// Loaded once from a JSON array of tracks. File order is the catalog
/// iteration order, so popularity ties resolve the same way on every run.
#[derive(Debug, Clone)]
pub struct SnapshotCatalogStore {
    tracks: Vec<Track>,
    positions: HashMap<TrackId, usize>,
}

impl SnapshotCatalogStore {
    /// Builds a snapshot, enforcing unique ids and a uniform level count
    pub fn new(tracks: Vec<Track>) -> anyhow::Result<Self> {
        let mut positions = HashMap::with_capacity(tracks.len());
        let depth = tracks.first().map(|t| t.cluster_levels.len());

        for (idx, track) in tracks.iter().enumerate() {
            if positions.insert(track.id, idx).is_some() {
                bail!("duplicate track id {} in catalog snapshot", track.id);
            }
            if Some(track.cluster_levels.len()) != depth {
                bail!(
                    "track {} has {} cluster levels, expected {}",
                    track.id,
                    track.cluster_levels.len(),
                    depth.unwrap_or_default()
                );
            }
        }

        Ok(Self { tracks, positions })
    }

    /// Loads a snapshot from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog snapshot {}", path.display()))?;
        let tracks: Vec<Track> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid catalog snapshot {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            tracks = tracks.len(),
            "Loaded catalog snapshot"
        );

        Self::new(tracks)
    }

    /// Cluster levels carried by every track; `None` for an empty snapshot
    pub fn cluster_depth(&self) -> Option<usize> {
        self.tracks.first().map(|t| t.cluster_levels.len())
    }

    /// Fails unless the tracks carry exactly the hierarchy's levels
    ///
    /// A shallower catalog would leave the fallback level without a label and
    /// a deeper one would have levels the matcher never scans.
    pub fn ensure_hierarchy(&self, hierarchy: &ClusterHierarchy) -> anyhow::Result<()> {
        match self.cluster_depth() {
            Some(depth) if depth != hierarchy.depth() => bail!(
                "catalog snapshot has {} cluster levels, the hierarchy expects {}",
                depth,
                hierarchy.depth()
            ),
            _ => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[async_trait::async_trait]
impl CatalogStore for SnapshotCatalogStore {
    async fn get_by_ids(&self, ids: &[TrackId]) -> AppResult<Vec<Track>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.positions.get(id))
            .map(|&idx| self.tracks[idx].clone())
            .collect())
    }

    async fn get_all(&self, limit: usize) -> AppResult<Vec<Track>> {
        Ok(self.tracks.iter().take(limit).cloned().collect())
    }

    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<TrackSummary>> {
        let needle = query.to_lowercase();
        let mut hits: Vec<&Track> = self
            .tracks
            .iter()
            .filter(|t| {
                t.name.to_lowercase().contains(&needle)
                    || t.artists.to_lowercase().contains(&needle)
            })
            .collect();
        // same order as the database: most popular first, then by id
        hits.sort_by(|a, b| b.popularity.cmp(&a.popularity).then(a.id.cmp(&b.id)));
        Ok(hits
            .into_iter()
            .take(limit)
            .map(TrackSummary::from)
            .collect())
    }

    fn name(&self) -> &'static str {
        "snapshot"
    }
}
