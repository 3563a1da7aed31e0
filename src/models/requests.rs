use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::normalize::RawCourse;
use crate::models::domain::ParsedQuery;

/// Request to parse a free-text query
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ParseQueryRequest {
    #[validate(length(min = 1, max = 200))]
    pub query: String,
}

/// Request to search courses with an already parsed query
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchCoursesRequest {
    pub parsed: ParsedQuery,
    #[serde(default)]
    pub limit: Option<usize>,
    #[validate(range(min = -90.0, max = 90.0))]
    #[serde(default, alias = "user_lat", rename = "userLat")]
    pub user_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    #[serde(default, alias = "user_lng", rename = "userLng")]
    pub user_lng: Option<f64>,
}

impl SearchCoursesRequest {
    /// Coordinates, only when both are given
    pub fn user_location(&self) -> Option<(f64, f64)> {
        self.user_lat.zip(self.user_lng)
    }
}

/// Parse, geocode and search in one call
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecommendRequest {
    #[validate(length(min = 1, max = 200))]
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Request to recompute precomputed safety data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrecomputeRequest {
    #[serde(default, alias = "course_id", rename = "courseId")]
    pub course_id: Option<String>,
    #[serde(default, alias = "batch_mode", rename = "batchMode")]
    pub batch_mode: bool,
}

/// Request to normalize raw course labels
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NormalizeRequest {
    #[validate(length(min = 1, max = 1000))]
    pub courses: Vec<RawCourse>,
    /// Insert the normalized courses into the backend
    #[serde(default)]
    pub persist: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_accepts_both_spellings() {
        let req: SearchCoursesRequest = serde_json::from_value(serde_json::json!({
            "parsed": { "distance": 5.0 },
            "userLat": 37.5,
            "user_lng": 127.0,
        }))
        .unwrap();

        assert_eq!(req.user_location(), Some((37.5, 127.0)));
        assert_eq!(req.parsed.distance_km, Some(5.0));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_search_request_rejects_bad_latitude() {
        let req: SearchCoursesRequest = serde_json::from_value(serde_json::json!({
            "parsed": {},
            "userLat": 137.5,
            "userLng": 127.0,
        }))
        .unwrap();

        assert!(req.validate().is_err());
    }

    #[test]
    fn test_empty_query_is_invalid() {
        let req = ParseQueryRequest { query: String::new() };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_precompute_defaults() {
        let req: PrecomputeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.course_id.is_none());
        assert!(!req.batch_mode);
    }
}
