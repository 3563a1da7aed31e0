use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::distance::{calculate_bounding_box, distance_within};
use crate::models::{Course, CourseType, DataSource, SafetyInfo, SafetyLevel, SafetyPoint, SafetyScores};

/// Radius for the light summary attached to search results
pub const SEARCH_SAFETY_RADIUS_KM: f64 = 2.0;

/// Radius for the composite scores stored on each course
pub const COMPOSITE_SAFETY_RADIUS_KM: f64 = 3.0;

/// Radius for the lighting score used by crew analysis
pub const LIGHTING_RADIUS_KM: f64 = 0.5;

/// Course length floor used for every density calculation
const MIN_LENGTH_KM: f64 = 0.5;

/// Default safety score for a point loaded from a given source
#[inline]
pub fn point_base_score(source: DataSource) -> f64 {
    match source {
        DataSource::StreetLight => 20.0,
        DataSource::SecurityLight => 15.0,
        DataSource::CrimeData | DataSource::Other => 10.0,
    }
}

/// Points within `radius_km` of a coordinate (bbox pre-filter, then haversine)
pub fn points_within<'a>(
    lat: f64,
    lng: f64,
    radius_km: f64,
    points: &'a [SafetyPoint],
) -> Vec<&'a SafetyPoint> {
    let bbox = calculate_bounding_box(lat, lng, radius_km);
    points
        .iter()
        .filter(|p| distance_within(lat, lng, p.latitude, p.longitude, &bbox, radius_km).is_some())
        .collect()
}

#[inline]
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Light summary for a course, from points within [`SEARCH_SAFETY_RADIUS_KM`]
/// of its start. `None` when the course has no coordinates or no points nearby.
pub fn summarize_safety(course: &Course, points: &[SafetyPoint]) -> Option<SafetyInfo> {
    let (lat, lng) = course.coordinates()?;
    let nearby = points_within(lat, lng, SEARCH_SAFETY_RADIUS_KM, points);
    if nearby.is_empty() {
        return None;
    }

    let street_lights = nearby.iter().filter(|p| p.data_source == DataSource::StreetLight).count();
    let security_lights = nearby.iter().filter(|p| p.data_source == DataSource::SecurityLight).count();
    let total_lights = street_lights + security_lights;

    let light_density = (total_lights as f64 / course.distance_km.max(MIN_LENGTH_KM)).round() as u32;

    let safety_level = if light_density >= 15 {
        SafetyLevel::High
    } else if light_density >= 8 {
        SafetyLevel::Medium
    } else {
        SafetyLevel::Low
    };

    Some(SafetyInfo {
        safety_level,
        total_lights,
        street_lights,
        security_lights,
        light_density,
        is_night_safe: light_density >= 10,
        is_group_friendly: course.distance_km >= 2.0 && light_density >= 5,
        facilities: likely_facilities(course),
        nearby_points_count: nearby.len(),
    })
}

/// Facilities a course probably has, guessed from its tags and type
pub fn likely_facilities(course: &Course) -> Vec<String> {
    let mut facilities: Vec<String> = Vec::new();
    let mut add = |name: &str| {
        if !facilities.iter().any(|f| f == name) {
            facilities.push(name.to_string());
        }
    };

    if course.has_natural_tag("공원") {
        add("화장실");
        add("주차장");
    }
    if course.has_natural_tag("트랙") {
        add("주차장");
    }
    if course.course_type == CourseType::River {
        add("화장실");
    }

    facilities
}

/// Composite scores from points within [`COMPOSITE_SAFETY_RADIUS_KM`].
///
/// All outputs are rounded to two decimals; no points means all zeros.
pub fn compute_safety_scores(points: &[&SafetyPoint], course_length_km: f64) -> SafetyScores {
    if points.is_empty() {
        return SafetyScores::default();
    }

    let n = points.len() as f64;
    let lights = points.iter().filter(|p| p.data_source.is_light()).count() as f64;
    let avg_safety = points.iter().map(|p| p.safety_score).sum::<f64>() / n;

    let light_density = lights / course_length_km.max(MIN_LENGTH_KM);
    let safe_light_score = (avg_safety * lights / n.max(1.0)).min(100.0);
    let safe_area_score = avg_safety.min(100.0);
    let avg_crime_index = (100.0 - avg_safety).max(0.0);

    let recommendation_weight = safe_light_score * 0.4
        + safe_area_score * 0.3
        + (100.0 - avg_crime_index) * 0.2
        + (light_density * 5.0).min(100.0) * 0.1;

    SafetyScores {
        safe_light_score: round2(safe_light_score),
        safe_area_score: round2(safe_area_score),
        avg_light_density: round2(light_density),
        avg_crime_index: round2(avg_crime_index),
        recommendation_weight: round2(recommendation_weight),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingSource {
    RealData,
    Estimated,
    FallbackEstimated,
}

/// Lighting score (0.1 - 1.0) for a course start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightingAnalysis {
    pub score: f64,
    pub lights_count: usize,
    pub density_per_km: f64,
    pub data_source: LightingSource,
}

impl LightingAnalysis {
    /// Used when the safety points could not be loaded
    pub fn fallback() -> Self {
        Self {
            score: 0.6,
            lights_count: 0,
            density_per_km: 0.0,
            data_source: LightingSource::FallbackEstimated,
        }
    }
}

/// Score lighting from the lights within [`LIGHTING_RADIUS_KM`] of the start
pub fn analyze_lighting(lat: f64, lng: f64, distance_km: f64, points: &[SafetyPoint]) -> LightingAnalysis {
    let any_lights = points.iter().any(|p| p.data_source.is_light());
    let lights_count = points_within(lat, lng, LIGHTING_RADIUS_KM, points)
        .into_iter()
        .filter(|p| p.data_source.is_light())
        .count();

    let density_per_km = lights_count as f64 / distance_km.max(MIN_LENGTH_KM);

    let score = match density_per_km {
        d if d >= 20.0 => 1.0,
        d if d >= 15.0 => 0.9,
        d if d >= 10.0 => 0.7,
        d if d >= 5.0 => 0.5,
        d if d >= 2.0 => 0.3,
        _ => 0.1,
    };

    LightingAnalysis {
        score,
        lights_count,
        density_per_km,
        data_source: if any_lights {
            LightingSource::RealData
        } else {
            LightingSource::Estimated
        },
    }
}

/// Facility categories surveyed around each course
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilityCategory {
    Parking,
    Restroom,
    Convenience,
    Cafe,
    Water,
}

impl FacilityCategory {
    pub const ALL: [FacilityCategory; 5] = [
        FacilityCategory::Parking,
        FacilityCategory::Restroom,
        FacilityCategory::Convenience,
        FacilityCategory::Cafe,
        FacilityCategory::Water,
    ];

    /// Search keyword, also used as the facility label
    pub fn keyword(&self) -> &'static str {
        match self {
            FacilityCategory::Parking => "주차장",
            FacilityCategory::Restroom => "화장실",
            FacilityCategory::Convenience => "편의점",
            FacilityCategory::Cafe => "카페",
            FacilityCategory::Water => "음수대",
        }
    }
}

/// Search radius for the facility survey, in meters
pub const FACILITY_RADIUS_M: u32 = 1000;

/// Facilities found near a course start
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacilitySurvey {
    pub has_parking: bool,
    pub has_restroom: bool,
    pub convenience_count: usize,
    pub available_facilities: Vec<String>,
}

impl FacilitySurvey {
    /// Record the hit count of one category search
    pub fn record(&mut self, category: FacilityCategory, count: usize) {
        if count == 0 {
            return;
        }
        match category {
            FacilityCategory::Parking => self.has_parking = true,
            FacilityCategory::Restroom => self.has_restroom = true,
            FacilityCategory::Convenience => self.convenience_count = count,
            FacilityCategory::Cafe | FacilityCategory::Water => {}
        }
        let label = category.keyword();
        if !self.available_facilities.iter().any(|f| f == label) {
            self.available_facilities.push(label.to_string());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewAnalysis {
    pub is_crew_friendly: bool,
    pub max_group_size: u32,
    pub crew_score: u32,
}

/// Crew friendliness from lighting, facilities and course length
pub fn analyze_crew_friendliness(
    lighting: &LightingAnalysis,
    facilities: &FacilitySurvey,
    distance_km: f64,
) -> CrewAnalysis {
    let mut crew_score = 0;
    if facilities.has_parking {
        crew_score += 25;
    }
    if facilities.has_restroom {
        crew_score += 20;
    }
    if facilities.convenience_count > 0 {
        crew_score += 15;
    }
    if lighting.score >= 0.7 {
        crew_score += 20;
    }
    if distance_km >= 3.0 {
        crew_score += 10;
    }
    if facilities.available_facilities.len() >= 3 {
        crew_score += 10;
    }

    let max_group_size = match crew_score {
        s if s >= 80 => 30,
        s if s >= 60 => 20,
        s if s >= 40 => 15,
        s if s >= 20 => 10,
        _ => 5,
    };

    CrewAnalysis {
        is_crew_friendly: crew_score >= 40,
        max_group_size,
        crew_score,
    }
}

/// Facility safety score in 0..=1
pub fn facility_safety_score(lighting: &LightingAnalysis, facilities: &FacilitySurvey) -> f64 {
    let facility_score = (facilities.available_facilities.len() as f64 / 5.0).min(1.0);
    let convenience_score = (facilities.convenience_count as f64 / 3.0).min(1.0);

    (0.3 + lighting.score * 0.5 + facility_score * 0.3 + convenience_score * 0.2).min(1.0)
}

/// Everything precomputed for one course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyProfile {
    pub lighting: LightingAnalysis,
    pub facilities: FacilitySurvey,
    pub crew_analysis: CrewAnalysis,
    pub scores: SafetyScores,
    pub safety_score: f64,
    pub calculated_at: DateTime<Utc>,
}

impl SafetyProfile {
    /// Combine the analyses of one course.
    ///
    /// `points` is `None` when the safety points could not be loaded.
    pub fn compute(course: &Course, points: Option<&[SafetyPoint]>, facilities: FacilitySurvey) -> Option<Self> {
        let (lat, lng) = course.coordinates()?;

        let (lighting, scores) = match points {
            Some(points) => {
                let nearby = points_within(lat, lng, COMPOSITE_SAFETY_RADIUS_KM, points);
                (
                    analyze_lighting(lat, lng, course.distance_km, points),
                    compute_safety_scores(&nearby, course.distance_km),
                )
            }
            None => (LightingAnalysis::fallback(), SafetyScores::default()),
        };

        let crew_analysis = analyze_crew_friendliness(&lighting, &facilities, course.distance_km);
        let safety_score = facility_safety_score(&lighting, &facilities);

        Some(Self {
            lighting,
            facilities,
            crew_analysis,
            scores,
            safety_score,
            calculated_at: Utc::now(),
        })
    }

    /// Column patch written back to the course row
    pub fn to_course_patch(&self) -> serde_json::Value {
        serde_json::json!({
            "lighting_score": self.lighting.score,
            "park_water_score": self.safety_score,
            "crew_friendly": self.crew_analysis.is_crew_friendly,
            "max_group_size": self.crew_analysis.max_group_size,
            "parking_available": self.facilities.has_parking,
            "facilities": self.facilities.available_facilities,
            "safe_light_score": self.scores.safe_light_score,
            "safe_area_score": self.scores.safe_area_score,
            "avg_light_density": self.scores.avg_light_density,
            "avg_crime_index": self.scores.avg_crime_index,
            "recommendation_weight": self.scores.recommendation_weight,
            "safety_data": {
                "lighting": self.lighting,
                "facilities": self.facilities,
                "crew_analysis": self.crew_analysis,
                "calculated_at": self.calculated_at,
            },
            "updated_at": self.calculated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: (f64, f64) = (37.5133, 127.1001);

    fn point(lat: f64, lng: f64, source: DataSource) -> SafetyPoint {
        SafetyPoint {
            latitude: lat,
            longitude: lng,
            safety_score: point_base_score(source),
            data_source: source,
            region: None,
            district: None,
        }
    }

    fn course(distance_km: f64) -> Course {
        serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "석촌호수",
            "start_lat": START.0,
            "start_lng": START.1,
            "distance_km": distance_km,
        }))
        .unwrap()
    }

    fn lights_near_start(count: usize) -> Vec<SafetyPoint> {
        (0..count)
            .map(|i| point(START.0 + 0.0001 * i as f64, START.1, DataSource::StreetLight))
            .collect()
    }

    #[test]
    fn test_base_scores() {
        assert_eq!(point_base_score(DataSource::StreetLight), 20.0);
        assert_eq!(point_base_score(DataSource::SecurityLight), 15.0);
        assert_eq!(point_base_score(DataSource::CrimeData), 10.0);
        assert_eq!(point_base_score(DataSource::Other), 10.0);
    }

    #[test]
    fn test_summary_levels() {
        let c = course(1.0);

        let info = summarize_safety(&c, &lights_near_start(16)).unwrap();
        assert_eq!(info.safety_level, SafetyLevel::High);
        assert!(info.is_night_safe);
        assert!(!info.is_group_friendly, "1km course is too short for groups");

        let info = summarize_safety(&c, &lights_near_start(9)).unwrap();
        assert_eq!(info.safety_level, SafetyLevel::Medium);
        assert!(!info.is_night_safe);

        let info = summarize_safety(&c, &lights_near_start(3)).unwrap();
        assert_eq!(info.safety_level, SafetyLevel::Low);
    }

    #[test]
    fn test_summary_ignores_far_points() {
        let c = course(3.0);
        // ~3km north
        let points = vec![point(START.0 + 0.027, START.1, DataSource::StreetLight)];

        assert!(summarize_safety(&c, &points).is_none());
    }

    #[test]
    fn test_short_course_length_is_floored() {
        let c = course(0.2);
        let info = summarize_safety(&c, &lights_near_start(5)).unwrap();

        assert_eq!(info.light_density, 10);
    }

    #[test]
    fn test_facility_heuristic_deduplicates() {
        let mut c = course(3.0);
        c.natural_tags = vec!["공원".into(), "트랙".into()];
        c.course_type = CourseType::River;

        assert_eq!(likely_facilities(&c), vec!["화장실".to_string(), "주차장".to_string()]);
    }

    #[test]
    fn test_composite_scores() {
        let points = vec![
            point(START.0, START.1, DataSource::StreetLight),
            point(START.0, START.1, DataSource::StreetLight),
            point(START.0, START.1, DataSource::CrimeData),
        ];
        let refs: Vec<&SafetyPoint> = points.iter().collect();
        let scores = compute_safety_scores(&refs, 1.0);

        assert_eq!(scores.safe_light_score, 11.11);
        assert_eq!(scores.safe_area_score, 16.67);
        assert_eq!(scores.avg_crime_index, 83.33);
        assert_eq!(scores.avg_light_density, 2.0);
        assert_eq!(scores.recommendation_weight, 13.78);
    }

    #[test]
    fn test_composite_scores_empty() {
        assert_eq!(compute_safety_scores(&[], 3.0), SafetyScores::default());
    }

    #[test]
    fn test_lighting_tiers() {
        let lit = analyze_lighting(START.0, START.1, 1.0, &lights_near_start(20));
        assert_eq!(lit.score, 1.0);
        assert_eq!(lit.data_source, LightingSource::RealData);

        let dim = analyze_lighting(START.0, START.1, 1.0, &lights_near_start(6));
        assert_eq!(dim.score, 0.5);

        let none = analyze_lighting(START.0, START.1, 1.0, &[]);
        assert_eq!(none.score, 0.1);
        assert_eq!(none.data_source, LightingSource::Estimated);
    }

    #[test]
    fn test_crew_analysis() {
        let mut facilities = FacilitySurvey::default();
        facilities.record(FacilityCategory::Parking, 3);
        facilities.record(FacilityCategory::Restroom, 1);
        facilities.record(FacilityCategory::Convenience, 4);
        facilities.record(FacilityCategory::Water, 0);

        let lighting = LightingAnalysis::fallback();
        let crew = analyze_crew_friendliness(&lighting, &facilities, 5.0);

        // 25 + 20 + 15 + 10 (distance) + 10 (three facilities)
        assert_eq!(crew.crew_score, 80);
        assert_eq!(crew.max_group_size, 30);
        assert!(crew.is_crew_friendly);

        let crew = analyze_crew_friendliness(&lighting, &FacilitySurvey::default(), 1.0);
        assert_eq!(crew.crew_score, 0);
        assert_eq!(crew.max_group_size, 5);
        assert!(!crew.is_crew_friendly);
    }

    #[test]
    fn test_facility_safety_score_is_capped() {
        let mut facilities = FacilitySurvey::default();
        for category in FacilityCategory::ALL {
            facilities.record(category, 5);
        }
        let lighting = analyze_lighting(START.0, START.1, 1.0, &lights_near_start(25));

        assert_eq!(facility_safety_score(&lighting, &facilities), 1.0);
        assert!((facility_safety_score(&LightingAnalysis::fallback(), &FacilitySurvey::default()) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_profile_without_points_uses_fallback() {
        let profile = SafetyProfile::compute(&course(3.0), None, FacilitySurvey::default()).unwrap();

        assert_eq!(profile.lighting.data_source, LightingSource::FallbackEstimated);
        assert_eq!(profile.scores, SafetyScores::default());

        let patch = profile.to_course_patch();
        assert_eq!(patch["lighting_score"], 0.6);
        assert_eq!(patch["crew_friendly"], false);
    }
}
