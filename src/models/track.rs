use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Number of audio feature dimensions carried by every track
pub const FEATURE_COUNT: usize = 9;

/// Stable catalog identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub i64);

impl Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque label assigned to a track at one level of the offline clustering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterLabel(pub i64);

impl Display for ClusterLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Audio features in their fixed order
///
/// Every component is optional: the upstream feature service does not always
/// return a value. Tempo and loudness are unbounded, the rest sit in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioFeatures {
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub valence: Option<f64>,
    pub tempo: Option<f64>,
    pub acousticness: Option<f64>,
    pub speechiness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub loudness: Option<f64>,
}

impl AudioFeatures {
    /// Feature names, in vector order
    pub const NAMES: [&'static str; FEATURE_COUNT] = [
        "danceability",
        "energy",
        "valence",
        "tempo",
        "acousticness",
        "speechiness",
        "instrumentalness",
        "liveness",
        "loudness",
    ];

    /// Builds a fully populated feature set from a vector in canonical order
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [
            danceability,
            energy,
            valence,
            tempo,
            acousticness,
            speechiness,
            instrumentalness,
            liveness,
            loudness,
        ] = values.map(Some);
        Self {
            danceability,
            energy,
            valence,
            tempo,
            acousticness,
            speechiness,
            instrumentalness,
            liveness,
            loudness,
        }
    }

    /// Returns the components in canonical order
    pub fn components(&self) -> [Option<f64>; FEATURE_COUNT] {
        [
            self.danceability,
            self.energy,
            self.valence,
            self.tempo,
            self.acousticness,
            self.speechiness,
            self.instrumentalness,
            self.liveness,
            self.loudness,
        ]
    }
}

/// A catalog track as seen by the recommendation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub artists: String,
    /// Only used to break ties
    pub popularity: u32,
    /// Cluster labels from coarsest to finest, indexed by level position
    pub cluster_levels: Vec<ClusterLabel>,
    #[serde(default)]
    pub features: AudioFeatures,
}

impl Track {
    /// Label at the given level, if the track carries that many levels
    pub fn label_at(&self, level: usize) -> Option<ClusterLabel> {
        self.cluster_levels.get(level).copied()
    }
}

/// Lightweight track listing returned by search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: TrackId,
    pub name: String,
    pub artists: String,
}

impl From<&Track> for TrackSummary {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            name: track.name.clone(),
            artists: track.artists.clone(),
        }
    }
}

/// Names and fallback position of the catalog's cluster levels
///
/// Levels are addressed by position (0 = coarsest); names are only used when
/// reporting which level produced a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHierarchy {
    level_names: Vec<String>,
    fallback_level: usize,
}

impl ClusterHierarchy {
    /// Creates a hierarchy; `None` if it is empty or the fallback is out of range
    pub fn new(level_names: Vec<String>, fallback_level: usize) -> Option<Self> {
        if fallback_level >= level_names.len() {
            return None;
        }
        Some(Self {
            level_names,
            fallback_level,
        })
    }

    /// `cluster1`..`clusterN`, falling back on `fallback_level`
    pub fn numbered(depth: usize, fallback_level: usize) -> Option<Self> {
        let names = (1..=depth).map(|i| format!("cluster{}", i)).collect();
        Self::new(names, fallback_level)
    }

    pub fn depth(&self) -> usize {
        self.level_names.len()
    }

    pub fn fallback_level(&self) -> usize {
        self.fallback_level
    }

    pub fn name(&self, level: usize) -> &str {
        self.level_names
            .get(level)
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}

impl Default for ClusterHierarchy {
    /// Five levels with the middle one as fallback
    fn default() -> Self {
        Self {
            level_names: (1..=5).map(|i| format!("cluster{}", i)).collect(),
            fallback_level: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_serde_is_transparent() {
        let id = TrackId(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let parsed: TrackId = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_features_components_keep_canonical_order() {
        let features = AudioFeatures::from_array([0.1, 0.2, 0.3, 120.0, 0.5, 0.6, 0.7, 0.8, -5.0]);
        let components = features.components();
        assert_eq!(components[0], Some(0.1));
        assert_eq!(components[3], Some(120.0));
        assert_eq!(components[8], Some(-5.0));
        assert_eq!(AudioFeatures::NAMES[3], "tempo");
    }

    #[test]
    fn test_missing_features_deserialize_as_none() {
        let features: AudioFeatures = serde_json::from_str(r#"{"energy": 0.4}"#).unwrap();
        assert_eq!(features.energy, Some(0.4));
        assert_eq!(features.danceability, None);
    }

    #[test]
    fn test_default_hierarchy() {
        let hierarchy = ClusterHierarchy::default();
        assert_eq!(hierarchy.depth(), 5);
        assert_eq!(hierarchy.fallback_level(), 2);
        assert_eq!(hierarchy.name(0), "cluster1");
        assert_eq!(hierarchy.name(hierarchy.fallback_level()), "cluster3");
    }

    #[test]
    fn test_hierarchy_rejects_out_of_range_fallback() {
        assert!(ClusterHierarchy::numbered(5, 5).is_none());
        assert!(ClusterHierarchy::numbered(0, 0).is_none());
        assert_eq!(ClusterHierarchy::numbered(3, 1).unwrap().name(2), "cluster3");
    }

    #[test]
    fn test_label_at_out_of_range() {
        let track = Track {
            id: TrackId(1),
            name: "Song".to_string(),
            artists: "Artist".to_string(),
            popularity: 10,
            cluster_levels: vec![ClusterLabel(4)],
            features: AudioFeatures::default(),
        };
        assert_eq!(track.label_at(0), Some(ClusterLabel(4)));
        assert_eq!(track.label_at(1), None);
    }
}
