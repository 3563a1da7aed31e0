use crate::core::{
    filters::{matches_attributes, matches_location, CourseQuery, SearchTolerances},
    safety::summarize_safety,
    scoring::{adjusted_score, compare_ranked},
};
use crate::models::{Course, ParsedQuery, RankedCourse, RankingWeights, SafetyPoint};

/// Upper bound on results per search
pub const MAX_RESULTS: usize = 50;

/// Default result count for group queries
pub const DEFAULT_GROUP_LIMIT: usize = 8;

/// Default result count for everything else
pub const DEFAULT_LIMIT: usize = 5;

/// Result of a course search
#[derive(Debug)]
pub struct SearchResult {
    pub courses: Vec<RankedCourse>,
    pub total_candidates: usize,
}

/// Search orchestrator - runs the course filtering pipeline
///
/// # Pipeline Stages
/// 1. Location filter (radius, tags or text)
/// 2. Attribute filters (distance, duration, type, tags, difficulty)
/// 3. Safety summary from nearby safety points
/// 4. Scoring and ranking
#[derive(Debug, Clone)]
pub struct CourseSearcher {
    weights: RankingWeights,
    tolerances: SearchTolerances,
}

impl CourseSearcher {
    pub fn new(weights: RankingWeights, tolerances: SearchTolerances) -> Self {
        Self { weights, tolerances }
    }

    pub fn with_defaults() -> Self {
        Self {
            weights: RankingWeights::default(),
            tolerances: SearchTolerances::default(),
        }
    }

    pub fn tolerances(&self) -> &SearchTolerances {
        &self.tolerances
    }

    /// Effective result limit: the requested one capped at [`MAX_RESULTS`],
    /// otherwise the default for the query kind
    pub fn result_limit(parsed: &ParsedQuery, requested: Option<usize>) -> usize {
        match requested {
            Some(limit) if limit > 0 => limit.min(MAX_RESULTS),
            _ if parsed.is_group_running => DEFAULT_GROUP_LIMIT,
            _ => DEFAULT_LIMIT,
        }
    }

    /// Build the query the backend pre-filters with
    pub fn build_query(
        &self,
        parsed: &ParsedQuery,
        user_location: Option<(f64, f64)>,
        limit: Option<usize>,
    ) -> CourseQuery {
        CourseQuery::build(
            parsed,
            user_location,
            &self.tolerances,
            Self::result_limit(parsed, limit),
        )
    }

    /// Find and rank courses for a parsed query
    ///
    /// # Arguments
    /// * `parsed` - Structured query
    /// * `user_location` - Geocoded coordinates of the query location, if any
    /// * `candidates` - Courses loaded from the backend
    /// * `safety_points` - Safety points covering the candidates
    /// * `limit` - Requested result count
    pub fn search(
        &self,
        parsed: &ParsedQuery,
        user_location: Option<(f64, f64)>,
        candidates: Vec<Course>,
        safety_points: &[SafetyPoint],
        limit: Option<usize>,
    ) -> SearchResult {
        let query = self.build_query(parsed, user_location, limit);
        self.search_with_query(parsed, &query, candidates, safety_points)
    }

    /// Filter and rank candidates against an already built query
    ///
    /// Used when the caller adjusted the query, e.g. after falling back from
    /// tag search to text search.
    pub fn search_with_query(
        &self,
        parsed: &ParsedQuery,
        query: &CourseQuery,
        candidates: Vec<Course>,
        safety_points: &[SafetyPoint],
    ) -> SearchResult {
        let total_candidates = candidates.len();

        let mut ranked: Vec<RankedCourse> = candidates
            .into_iter()
            // Stage 1: Location
            .filter_map(|course| {
                matches_location(&course, &query.location).map(|distance| (course, distance))
            })
            // Stage 2: Attributes
            .filter(|(course, _)| matches_attributes(course, query))
            // Stage 3 & 4: Safety summary and score
            .map(|(course, distance_from_user)| {
                let safety_info = summarize_safety(&course, safety_points);
                let adjusted_score = adjusted_score(&course, parsed, &self.weights);

                RankedCourse {
                    course,
                    distance_from_user,
                    adjusted_score,
                    safety_info,
                }
            })
            .collect();

        ranked.sort_by(compare_ranked);
        ranked.truncate(query.limit);

        tracing::debug!(
            total_candidates,
            returned = ranked.len(),
            "Course search completed"
        );

        SearchResult {
            courses: ranked,
            total_candidates,
        }
    }
}

impl Default for CourseSearcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filters::LocationFilter;
    use crate::models::{CourseType, DataSource};

    const JAMSIL: (f64, f64) = (37.5133, 127.1001);

    fn create_course(id: &str, lat: f64, lng: f64, distance_km: f64, beginner_score: f64) -> Course {
        let mut course: Course = serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("코스 {}", id),
            "start_lat": lat,
            "start_lng": lng,
            "distance_km": distance_km,
            "course_type": "공원",
        }))
        .unwrap();
        course.beginner_score = Some(beginner_score);
        course
    }

    #[test]
    fn test_radius_search() {
        let searcher = CourseSearcher::with_defaults();
        let parsed = ParsedQuery { distance_km: Some(5.0), ..Default::default() };

        let candidates = vec![
            create_course("near", 37.52, 127.10, 5.0, 60.0),   // ~0.7km away
            create_course("far", 37.60, 127.10, 5.0, 90.0),    // ~9.7km away
            create_course("short", 37.52, 127.10, 2.0, 90.0),  // distance out of range
        ];

        let result = searcher.search(&parsed, Some(JAMSIL), candidates, &[], None);

        assert_eq!(result.total_candidates, 3);
        assert_eq!(result.courses.len(), 1);
        assert_eq!(result.courses[0].course.id, "near");
        assert!(result.courses[0].distance_from_user.is_some_and(|d| d < 1.0));
    }

    #[test]
    fn test_sorted_by_score_then_distance() {
        let searcher = CourseSearcher::with_defaults();
        let parsed = ParsedQuery::default();

        let candidates = vec![
            create_course("a", 37.520, 127.100, 3.0, 50.0),
            create_course("b", 37.514, 127.100, 3.0, 50.0),
            create_course("c", 37.525, 127.100, 3.0, 80.0),
        ];

        let result = searcher.search(&parsed, Some(JAMSIL), candidates, &[], None);
        let ids: Vec<&str> = result.courses.iter().map(|c| c.course.id.as_str()).collect();

        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_default_limits() {
        let solo = ParsedQuery::default();
        let group = ParsedQuery { is_group_running: true, ..Default::default() };

        assert_eq!(CourseSearcher::result_limit(&solo, None), DEFAULT_LIMIT);
        assert_eq!(CourseSearcher::result_limit(&group, None), DEFAULT_GROUP_LIMIT);
        assert_eq!(CourseSearcher::result_limit(&solo, Some(500)), MAX_RESULTS);
        assert_eq!(CourseSearcher::result_limit(&solo, Some(0)), DEFAULT_LIMIT);
    }

    #[test]
    fn test_respects_limit() {
        let searcher = CourseSearcher::with_defaults();
        let parsed = ParsedQuery::default();

        let candidates: Vec<Course> = (0..20)
            .map(|i| create_course(&i.to_string(), 37.514 + i as f64 * 0.0005, 127.10, 3.0, i as f64))
            .collect();

        let result = searcher.search(&parsed, Some(JAMSIL), candidates, &[], Some(3));

        assert_eq!(result.courses.len(), 3);
        assert_eq!(result.courses[0].course.id, "19");
    }

    #[test]
    fn test_attaches_safety_info() {
        let searcher = CourseSearcher::with_defaults();
        let parsed = ParsedQuery { course_type: Some(CourseType::Park), ..Default::default() };

        let points: Vec<SafetyPoint> = (0..10)
            .map(|i| SafetyPoint {
                latitude: 37.5201 + i as f64 * 0.0001,
                longitude: 127.1001,
                safety_score: 20.0,
                data_source: DataSource::StreetLight,
                region: Some("서울".into()),
                district: Some("송파구".into()),
            })
            .collect();

        let candidates = vec![create_course("1", 37.52, 127.10, 1.0, 50.0)];
        let result = searcher.search(&parsed, Some(JAMSIL), candidates, &points, None);

        let info = result.courses[0].safety_info.as_ref().unwrap();
        assert_eq!(info.total_lights, 10);
        assert!(info.is_night_safe);
    }

    #[test]
    fn test_search_with_text_fallback_query() {
        let searcher = CourseSearcher::with_defaults();
        let parsed = ParsedQuery {
            location: Some("석촌".to_string()),
            neighborhood: Some("석촌동".to_string()),
            ..Default::default()
        };

        let mut query = searcher.build_query(&parsed, None, None);
        assert!(matches!(query.location, LocationFilter::Tags { .. }));
        query.location = LocationFilter::Text("석촌".to_string());

        let mut candidates = vec![
            create_course("lake", 37.508, 127.104, 2.5, 70.0),
            create_course("other", 37.52, 127.10, 2.5, 90.0),
        ];
        candidates[0].name = "석촌호수".to_string();

        let result = searcher.search_with_query(&parsed, &query, candidates, &[]);

        assert_eq!(result.total_candidates, 2);
        assert_eq!(result.courses.len(), 1);
        assert_eq!(result.courses[0].course.id, "lake");
    }
}
