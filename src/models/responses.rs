use serde::{Deserialize, Serialize};

use crate::core::normalize::NormalizedCourse;
use crate::core::safety::SafetyProfile;
use crate::models::domain::{CourseSafetyRecord, GeoLocation, ParsedQuery, RankedCourse};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Current weather at the query location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherInfo {
    pub location: String,
    pub temperature: i32,
    pub feels_like: i32,
    pub humidity: u32,
    pub wind_speed: f64,
    pub description: String,
    pub icon: String,
}

/// Response for the parse endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResponse {
    pub success: bool,
    pub parsed: ParsedQuery,
    pub weather: Option<WeatherInfo>,
}

/// Response for the search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub courses: Vec<RankedCourse>,
    pub total: usize,
    pub user_location: Option<GeoLocation>,
}

/// Response for the one-shot recommend endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendResponse {
    pub success: bool,
    pub request_id: String,
    pub parsed: ParsedQuery,
    pub weather: Option<WeatherInfo>,
    pub user_location: Option<GeoLocation>,
    pub courses: Vec<RankedCourse>,
    pub total: usize,
}

/// Details behind a precomputed safety analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDetails {
    pub nearby_lights_count: u64,
    pub light_density_per_km: f64,
    pub parking_available: bool,
    pub restroom_nearby: bool,
    pub convenience_stores: u64,
    pub path_width_estimated: f64,
}

/// Precomputed safety analysis of one course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSafetyAnalysis {
    pub course_id: String,
    pub course_name: String,
    pub lighting_score: f64,
    pub safety_score: f64,
    pub crew_friendly: bool,
    pub max_group_size: u32,
    pub facilities: Vec<String>,
    pub analysis_details: AnalysisDetails,
}

impl From<CourseSafetyRecord> for CourseSafetyAnalysis {
    fn from(record: CourseSafetyRecord) -> Self {
        let safety_data = record.safety_data.unwrap_or(serde_json::Value::Null);
        let lighting = &safety_data["lighting"];

        let analysis_details = AnalysisDetails {
            nearby_lights_count: lighting["lights_count"].as_u64().unwrap_or(0),
            light_density_per_km: lighting["density_per_km"].as_f64().unwrap_or(0.0),
            parking_available: record.parking_available.unwrap_or(false),
            restroom_nearby: record.facilities.iter().any(|f| f == "화장실"),
            convenience_stores: safety_data["facilities"]["convenience_count"].as_u64().unwrap_or(0),
            path_width_estimated: 2.5,
        };

        Self {
            course_id: record.id,
            course_name: record.name,
            lighting_score: record.lighting_score.unwrap_or(0.5),
            safety_score: record.park_water_score.unwrap_or(0.5),
            crew_friendly: record.crew_friendly.unwrap_or(false),
            max_group_size: record.max_group_size.unwrap_or(5),
            facilities: record.facilities,
            analysis_details,
        }
    }
}

/// Outcome of precomputing one course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecomputeResult {
    pub course_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<SafetyProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response for safety precompute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecomputeResponse {
    pub message: String,
    pub total: usize,
    pub succeeded: usize,
    pub results: Vec<PrecomputeResult>,
}

/// Response for the region tag refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionTagsResponse {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Response for course normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeResponse {
    pub total: usize,
    pub inserted: usize,
    pub courses: Vec<NormalizedCourse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_analysis_defaults() {
        let record: CourseSafetyRecord = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "석촌호수",
        }))
        .unwrap();

        let analysis = CourseSafetyAnalysis::from(record);

        assert_eq!(analysis.lighting_score, 0.5);
        assert_eq!(analysis.safety_score, 0.5);
        assert!(!analysis.crew_friendly);
        assert_eq!(analysis.max_group_size, 5);
        assert_eq!(analysis.analysis_details.path_width_estimated, 2.5);
    }

    #[test]
    fn test_safety_analysis_reads_stored_profile() {
        let record: CourseSafetyRecord = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "석촌호수",
            "lighting_score": 0.9,
            "crew_friendly": true,
            "max_group_size": 20,
            "facilities": ["주차장", "화장실"],
            "safety_data": {
                "lighting": { "lights_count": 14, "density_per_km": 5.6 },
                "facilities": { "convenience_count": 3 }
            }
        }))
        .unwrap();

        let analysis = CourseSafetyAnalysis::from(record);

        assert_eq!(analysis.lighting_score, 0.9);
        assert_eq!(analysis.max_group_size, 20);
        assert!(analysis.analysis_details.restroom_nearby);
        assert_eq!(analysis.analysis_details.nearby_lights_count, 14);
        assert_eq!(analysis.analysis_details.convenience_stores, 3);
    }
}
