use std::cmp::Ordering;

use crate::models::{Course, ParsedQuery, RankedCourse, RankingWeights};

/// Calculate the adjusted ranking score of a course for a query
///
/// Scoring formula:
/// score = base                                  # beginner_score, else recommendation_weight, else 0
///     + crew_bonus                              # group query, crew-friendly course
///         (+ group_fit_bonus | - group_overflow_penalty)   # crew size vs max_group_size
///     - non_crew_penalty                        # group query, course not crew-friendly
///     + lighting_score * night_lighting_factor  # night query
pub fn adjusted_score(course: &Course, parsed: &ParsedQuery, weights: &RankingWeights) -> f64 {
    let mut score = course
        .beginner_score
        .or(course.recommendation_weight)
        .unwrap_or(0.0);

    if parsed.is_group_running {
        if course.is_crew_friendly() {
            score += weights.crew_bonus;

            if let (Some(crew_size), Some(max_group)) = (parsed.crew_size, course.max_group_size) {
                if crew_size <= max_group {
                    score += weights.group_fit_bonus;
                } else {
                    score -= weights.group_overflow_penalty;
                }
            }
        } else {
            score -= weights.non_crew_penalty;
        }
    }

    if parsed.wants_night_running() {
        score += course.lighting_score.unwrap_or(0.0) * weights.night_lighting_factor;
    }

    score
}

/// Result ordering: adjusted score desc, then distance from user asc
#[inline]
pub fn compare_ranked(a: &RankedCourse, b: &RankedCourse) -> Ordering {
    b.adjusted_score
        .partial_cmp(&a.adjusted_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            let da = a.distance_from_user.unwrap_or(f64::MAX);
            let db = b.distance_from_user.unwrap_or(f64::MAX);
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeOfDay;

    fn create_test_course(beginner: Option<f64>, weight: Option<f64>) -> Course {
        let mut course: Course = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "한강 반포",
        }))
        .unwrap();
        course.beginner_score = beginner;
        course.recommendation_weight = weight;
        course
    }

    fn ranked(score: f64, distance: Option<f64>) -> RankedCourse {
        RankedCourse {
            course: create_test_course(None, None),
            distance_from_user: distance,
            adjusted_score: score,
            safety_info: None,
        }
    }

    #[test]
    fn test_base_score_fallbacks() {
        let weights = RankingWeights::default();
        let parsed = ParsedQuery::default();

        assert_eq!(adjusted_score(&create_test_course(Some(70.0), Some(40.0)), &parsed, &weights), 70.0);
        assert_eq!(adjusted_score(&create_test_course(None, Some(40.0)), &parsed, &weights), 40.0);
        assert_eq!(adjusted_score(&create_test_course(None, None), &parsed, &weights), 0.0);
    }

    #[test]
    fn test_group_adjustments() {
        let weights = RankingWeights::default();
        let parsed = ParsedQuery {
            is_group_running: true,
            crew_size: Some(12),
            ..Default::default()
        };

        let mut course = create_test_course(Some(50.0), None);
        course.crew_friendly = Some(true);
        course.max_group_size = Some(15);
        assert_eq!(adjusted_score(&course, &parsed, &weights), 75.0);

        course.max_group_size = Some(10);
        assert_eq!(adjusted_score(&course, &parsed, &weights), 45.0);

        course.crew_friendly = Some(false);
        assert_eq!(adjusted_score(&course, &parsed, &weights), 40.0);
    }

    #[test]
    fn test_group_without_crew_size() {
        let weights = RankingWeights::default();
        let parsed = ParsedQuery { is_group_running: true, ..Default::default() };

        let mut course = create_test_course(Some(50.0), None);
        course.crew_friendly = Some(true);
        course.max_group_size = Some(10);

        assert_eq!(adjusted_score(&course, &parsed, &weights), 65.0);
    }

    #[test]
    fn test_night_lighting_bonus() {
        let weights = RankingWeights::default();
        let mut course = create_test_course(Some(50.0), None);
        course.lighting_score = Some(0.9);

        let evening = ParsedQuery { time_of_day: Some(TimeOfDay::Evening), ..Default::default() };
        assert!((adjusted_score(&course, &evening, &weights) - 68.0).abs() < 1e-9);

        let morning = ParsedQuery { time_of_day: Some(TimeOfDay::Morning), ..Default::default() };
        assert_eq!(adjusted_score(&course, &morning, &weights), 50.0);
    }

    #[test]
    fn test_ordering_ties_broken_by_distance() {
        let mut results = vec![ranked(50.0, Some(3.0)), ranked(80.0, Some(5.0)), ranked(50.0, Some(1.0))];
        results.sort_by(compare_ranked);

        assert_eq!(results[0].adjusted_score, 80.0);
        assert_eq!(results[1].distance_from_user, Some(1.0));
        assert_eq!(results[2].distance_from_user, Some(3.0));
    }
}
