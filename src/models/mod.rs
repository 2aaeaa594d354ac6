pub mod recommendation;
pub mod track;

pub use recommendation::*;
pub use track::*;
