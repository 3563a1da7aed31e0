//! Course Finder - running course recommendation service
//!
//! Turns free-text Korean running requests ("잠실 5km 저녁 러닝") into
//! structured filters, searches stored courses around the requested place
//! and ranks them with safety data from nearby street and security lights.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{CourseSearcher, QueryParser, distance::{haversine_distance, calculate_bounding_box}};
pub use models::{Course, ParsedQuery, RankedCourse, RankingWeights, SafetyPoint};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let bbox = calculate_bounding_box(37.5133, 127.1001, 2.0);
        assert!(bbox.min_lat < 37.5133);

        let parsed = QueryParser::new().parse("부산 10km").unwrap();
        assert_eq!(parsed.distance_km, Some(10.0));
    }
}
