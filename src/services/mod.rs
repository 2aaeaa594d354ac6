pub mod cluster_matcher;
pub mod history;
pub mod recommendations;
pub mod similarity;
pub mod track_search;

pub use history::{HistoryLogger, HistoryLoggerHandle};
pub use recommendations::{EngineSettings, RecommendationEngine};
