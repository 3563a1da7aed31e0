// Core algorithm exports
pub mod distance;
pub mod filters;
pub mod normalize;
pub mod parser;
pub mod safety;
pub mod scoring;
pub mod searcher;

pub use distance::{haversine_distance, calculate_bounding_box, is_within_bounding_box};
pub use filters::{CourseQuery, LocationFilter, SearchTolerances};
pub use parser::{ParseError, QueryParser};
pub use safety::{compute_safety_scores, summarize_safety, SafetyProfile};
pub use scoring::adjusted_score;
pub use searcher::{CourseSearcher, SearchResult};
