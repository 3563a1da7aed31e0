use crate::core::distance::{calculate_bounding_box, distance_within};
use crate::core::parser::GROUP_RUNNING_KEYWORD;
use crate::models::{BoundingBox, Course, CourseType, Difficulty, ParsedQuery};
use serde::{Deserialize, Serialize};

/// Natural tag marking courses that are lit well enough for night running
pub const NIGHT_AVAILABLE_TAG: &str = "야간가능";

/// Assumed beginner pace used when a course has no stored duration
pub const DEFAULT_PACE_MIN_PER_KM: f64 = 9.0;

/// Search tolerances
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTolerances {
    /// Radius used when the query names no distance, and the minimum radius otherwise
    pub min_radius_km: f64,
    pub distance_tolerance_km: f64,
    /// Tolerance for long runs (10km and above)
    pub long_distance_tolerance_km: f64,
    pub duration_tolerance_minutes: u32,
}

impl Default for SearchTolerances {
    fn default() -> Self {
        Self {
            min_radius_km: 2.0,
            distance_tolerance_km: 1.0,
            long_distance_tolerance_km: 2.0,
            duration_tolerance_minutes: 10,
        }
    }
}

/// Where the user is searching from
#[derive(Debug, Clone, PartialEq)]
pub enum LocationFilter {
    /// Radius search around geocoded coordinates
    Radius {
        lat: f64,
        lng: f64,
        radius_km: f64,
        bounding_box: BoundingBox,
    },
    /// Administrative tags parsed from the query
    Tags {
        region: Option<String>,
        district: Option<String>,
        neighborhood: Option<String>,
    },
    /// Free-text match on city, district, name and description
    Text(String),
    None,
}

/// Course query built from a parsed query
#[derive(Debug, Clone)]
pub struct CourseQuery {
    pub location: LocationFilter,
    pub distance_range: Option<(f64, f64)>,
    pub duration_range: Option<(u32, u32)>,
    pub course_type: Option<CourseType>,
    pub required_tags: Vec<&'static str>,
    pub has_uphill: Option<bool>,
    pub limit: usize,
}

impl CourseQuery {
    pub fn build(
        parsed: &ParsedQuery,
        user_location: Option<(f64, f64)>,
        tolerances: &SearchTolerances,
        limit: usize,
    ) -> Self {
        let location = match user_location {
            Some((lat, lng)) => {
                let radius_km = parsed
                    .distance_km
                    .map_or(tolerances.min_radius_km, |d| d.max(tolerances.min_radius_km));
                LocationFilter::Radius {
                    lat,
                    lng,
                    radius_km,
                    bounding_box: calculate_bounding_box(lat, lng, radius_km),
                }
            }
            None if parsed.region.is_some()
                || parsed.district.is_some()
                || parsed.neighborhood.is_some() =>
            {
                LocationFilter::Tags {
                    region: parsed.region.clone(),
                    district: parsed.district.clone(),
                    neighborhood: parsed.neighborhood.clone(),
                }
            }
            None => match &parsed.location {
                Some(location) => LocationFilter::Text(location.clone()),
                None => LocationFilter::None,
            },
        };

        let distance_range = parsed.distance_km.map(|d| {
            let tolerance = if d >= 10.0 {
                tolerances.long_distance_tolerance_km
            } else {
                tolerances.distance_tolerance_km
            };
            (d - tolerance, d + tolerance)
        });

        let duration_range = parsed.duration_minutes.map(|t| {
            (
                t.saturating_sub(tolerances.duration_tolerance_minutes),
                t.saturating_add(tolerances.duration_tolerance_minutes),
            )
        });

        let mut required_tags = Vec::new();
        if parsed.is_group_running {
            required_tags.push(GROUP_RUNNING_KEYWORD);
        }
        if parsed.is_night_running {
            required_tags.push(NIGHT_AVAILABLE_TAG);
        }

        let has_uphill = match parsed.difficulty {
            Some(Difficulty::Easy) => Some(false),
            Some(Difficulty::Hard) => Some(true),
            _ => None,
        };

        Self {
            location,
            distance_range,
            duration_range,
            course_type: parsed.course_type,
            required_tags,
            has_uphill,
            limit,
        }
    }
}

/// Stored duration, or an estimate from distance at beginner pace
pub fn effective_duration_minutes(course: &Course) -> Option<u32> {
    course.estimated_duration_minutes.or_else(|| {
        (course.distance_km > 0.0)
            .then(|| (course.distance_km * DEFAULT_PACE_MIN_PER_KM).round() as u32)
    })
}

/// Check the location part of the query.
///
/// Returns `Some(distance_from_user)` on a match; the distance is only known
/// in radius mode. Courses without coordinates never match.
pub fn matches_location(course: &Course, filter: &LocationFilter) -> Option<Option<f64>> {
    let (lat, lng) = course.coordinates()?;

    match filter {
        LocationFilter::Radius { lat: user_lat, lng: user_lng, radius_km, bounding_box } => {
            distance_within(*user_lat, *user_lng, lat, lng, bounding_box, *radius_km).map(Some)
        }
        LocationFilter::Tags { region, district, neighborhood } => {
            let tag_ok = |wanted: &Option<String>, tags: &[String]| {
                wanted.as_ref().map_or(true, |w| tags.contains(w))
            };
            (tag_ok(region, &course.region_tags)
                && tag_ok(district, &course.district_tags)
                && tag_ok(neighborhood, &course.neighborhood_tags))
            .then_some(None)
        }
        LocationFilter::Text(text) => {
            let needle = text.to_lowercase();
            let hit = |field: Option<&str>| {
                field.is_some_and(|f| f.to_lowercase().contains(&needle))
            };
            (hit(course.city.as_deref())
                || hit(course.district.as_deref())
                || hit(Some(&course.name))
                || hit(course.description.as_deref()))
            .then_some(None)
        }
        LocationFilter::None => Some(None),
    }
}

/// Check the non-location constraints of the query
#[inline]
pub fn matches_attributes(course: &Course, query: &CourseQuery) -> bool {
    if let Some((min, max)) = query.distance_range {
        if course.distance_km < min || course.distance_km > max {
            return false;
        }
    }

    if let Some((min, max)) = query.duration_range {
        match effective_duration_minutes(course) {
            Some(minutes) if minutes >= min && minutes <= max => {}
            _ => return false,
        }
    }

    if let Some(course_type) = query.course_type {
        if course.course_type != course_type {
            return false;
        }
    }

    if !query.required_tags.iter().all(|tag| course.has_natural_tag(tag)) {
        return false;
    }

    if let Some(uphill) = query.has_uphill {
        if course.has_uphill != uphill {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: &str, lat: f64, lng: f64, distance_km: f64) -> Course {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("코스 {}", id),
            "start_lat": lat,
            "start_lng": lng,
            "distance_km": distance_km,
        }))
        .unwrap()
    }

    #[test]
    fn test_radius_defaults_to_minimum() {
        let parsed = ParsedQuery::default();
        let query = CourseQuery::build(&parsed, Some((37.5, 127.0)), &SearchTolerances::default(), 10);

        match query.location {
            LocationFilter::Radius { radius_km, .. } => assert_eq!(radius_km, 2.0),
            other => panic!("expected radius filter, got {:?}", other),
        }
    }

    #[test]
    fn test_radius_grows_with_requested_distance() {
        let parsed = ParsedQuery { distance_km: Some(5.0), ..Default::default() };
        let query = CourseQuery::build(&parsed, Some((37.5, 127.0)), &SearchTolerances::default(), 10);

        assert!(matches!(query.location, LocationFilter::Radius { radius_km, .. } if radius_km == 5.0));
        assert_eq!(query.distance_range, Some((4.0, 6.0)));
    }

    #[test]
    fn test_long_distance_tolerance() {
        let parsed = ParsedQuery { distance_km: Some(10.0), ..Default::default() };
        let query = CourseQuery::build(&parsed, None, &SearchTolerances::default(), 10);

        assert_eq!(query.distance_range, Some((8.0, 12.0)));
    }

    #[test]
    fn test_text_filter_when_no_tags() {
        let parsed = ParsedQuery { location: Some("석촌".into()), ..Default::default() };
        let query = CourseQuery::build(&parsed, None, &SearchTolerances::default(), 10);

        let mut c = course("1", 37.5, 127.1, 3.0);
        c.name = "석촌호수 둘레".into();
        assert_eq!(matches_location(&c, &query.location), Some(None));

        c.name = "올림픽공원".into();
        assert_eq!(matches_location(&c, &query.location), None);
    }

    #[test]
    fn test_course_without_coordinates_never_matches() {
        let mut c = course("1", 37.5, 127.1, 3.0);
        c.start_lng = None;

        assert_eq!(matches_location(&c, &LocationFilter::None), None);
    }

    #[test]
    fn test_duration_estimated_from_distance() {
        let c = course("1", 37.5, 127.1, 5.0);
        assert_eq!(effective_duration_minutes(&c), Some(45));

        let parsed = ParsedQuery { duration_minutes: Some(40), ..Default::default() };
        let query = CourseQuery::build(&parsed, None, &SearchTolerances::default(), 10);
        assert!(matches_attributes(&c, &query));

        let parsed = ParsedQuery { duration_minutes: Some(20), ..Default::default() };
        let query = CourseQuery::build(&parsed, None, &SearchTolerances::default(), 10);
        assert!(!matches_attributes(&c, &query));
    }

    #[test]
    fn test_required_tags_and_difficulty() {
        let mut c = course("1", 37.5, 127.1, 5.0);
        c.natural_tags = vec!["하천".into(), "야간가능".into()];

        let parsed = ParsedQuery {
            is_night_running: true,
            difficulty: Some(Difficulty::Easy),
            ..Default::default()
        };
        let query = CourseQuery::build(&parsed, None, &SearchTolerances::default(), 10);
        assert!(matches_attributes(&c, &query));

        c.has_uphill = true;
        assert!(!matches_attributes(&c, &query));

        let parsed = ParsedQuery { is_group_running: true, ..Default::default() };
        let query = CourseQuery::build(&parsed, None, &SearchTolerances::default(), 10);
        assert!(!matches_attributes(&c, &query));
    }

    #[test]
    fn test_duration_range_saturates() {
        let parsed = ParsedQuery { duration_minutes: Some(u32::MAX - 3), ..Default::default() };
        let query = CourseQuery::build(&parsed, None, &SearchTolerances::default(), 10);
        assert_eq!(query.duration_range, Some((u32::MAX - 13, u32::MAX)));
    }
}
