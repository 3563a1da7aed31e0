use crate::models::BoundingBox;

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers per degree of latitude
const KM_PER_DEGREE: f64 = 111.0;

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Calculate a bounding box around a center point
///
/// Used as a cheap pre-filter before the exact Haversine check, both in memory
/// and as range filters on the backend query.
/// 1° latitude ≈ 111km, 1° longitude ≈ 111km * cos(latitude)
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEGREE;
    let lon_delta = radius_km / (KM_PER_DEGREE * lat.to_radians().cos().abs());

    BoundingBox {
        min_lat: lat - lat_delta,
        max_lat: lat + lat_delta,
        min_lon: lon - lon_delta,
        max_lon: lon + lon_delta,
    }
}

/// Check if a point is within a bounding box (edges inclusive)
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    lat >= bbox.min_lat && lat <= bbox.max_lat && lon >= bbox.min_lon && lon <= bbox.max_lon
}

/// Bounding-box pre-filter followed by the exact distance check.
///
/// Returns the distance when the point lies within `radius_km` of the center.
#[inline]
pub fn distance_within(
    center_lat: f64,
    center_lon: f64,
    lat: f64,
    lon: f64,
    bbox: &BoundingBox,
    radius_km: f64,
) -> Option<f64> {
    if !is_within_bounding_box(lat, lon, bbox) {
        return None;
    }
    let distance = haversine_distance(center_lat, center_lon, lat, lon);
    (distance <= radius_km).then_some(distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAMSIL: (f64, f64) = (37.5133, 127.1001);

    #[test]
    fn test_haversine_distance() {
        // Seoul City Hall to Busan City Hall (approximately 325 km)
        let distance = haversine_distance(37.5663, 126.9779, 35.1798, 129.0750);
        assert!((distance - 325.0).abs() < 10.0, "Distance should be ~325km, got {}", distance);
    }

    #[test]
    fn test_bounding_box() {
        let bbox = calculate_bounding_box(JAMSIL.0, JAMSIL.1, 2.0);

        assert!(bbox.min_lat < JAMSIL.0 && bbox.max_lat > JAMSIL.0);
        assert!(bbox.min_lon < JAMSIL.1 && bbox.max_lon > JAMSIL.1);

        // 4km / 111km per degree = ~0.036 degrees
        let lat_span = bbox.max_lat - bbox.min_lat;
        assert!((lat_span - 0.036).abs() < 0.001, "Lat span should be ~0.036 degrees");

        // Longitude degrees are shorter at 37.5°N, so the box is wider
        assert!(bbox.max_lon - bbox.min_lon > lat_span);
    }

    #[test]
    fn test_point_within_bbox() {
        let bbox = calculate_bounding_box(JAMSIL.0, JAMSIL.1, 2.0);

        assert!(is_within_bounding_box(JAMSIL.0, JAMSIL.1, &bbox));
        assert!(is_within_bounding_box(bbox.max_lat, bbox.min_lon, &bbox));
        assert!(!is_within_bounding_box(35.1798, 129.0750, &bbox));
    }

    #[test]
    fn test_distance_within_rejects_box_corners() {
        let bbox = calculate_bounding_box(JAMSIL.0, JAMSIL.1, 2.0);

        // The corner is inside the box but ~2.8km away
        assert!(distance_within(JAMSIL.0, JAMSIL.1, bbox.max_lat, bbox.max_lon, &bbox, 2.0).is_none());

        let near = distance_within(JAMSIL.0, JAMSIL.1, 37.5150, 127.1020, &bbox, 2.0);
        assert!(near.is_some_and(|d| d < 0.5));
    }
}
