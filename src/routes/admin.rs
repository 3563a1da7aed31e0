use actix_web::{web, HttpResponse, Responder};
use serde_json::{json, Value};
use std::time::Duration;
use validator::Validate;

use crate::core::calculate_bounding_box;
use crate::core::normalize::{merge_tags, normalize_courses, parse_address_tags, AddressTags};
use crate::core::safety::{FacilitySurvey, SafetyProfile, COMPOSITE_SAFETY_RADIUS_KM};
use crate::models::{
    Course, ErrorResponse, NormalizeRequest, NormalizeResponse, PrecomputeRequest,
    PrecomputeResponse, PrecomputeResult, RegionTagsResponse,
};
use crate::routes::courses::{validation_error, AppState};
use crate::services::{BackendError, KakaoPlace};

/// Configure batch maintenance routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/admin/safety/precompute", web::post().to(precompute_safety))
        .route("/admin/courses/region-tags", web::post().to(update_region_tags))
        .route("/admin/courses/normalize", web::post().to(normalize));
}

/// Kakao columns recorded for a matched place
pub fn kakao_patch(place: &KakaoPlace) -> Value {
    json!({
        "kakao_place_id": place.id,
        "kakao_course_name": place.place_name,
        "kakao_address": place.best_address(),
    })
}

/// Tag columns after merging address tags into a course
///
/// `None` when the merge changes nothing.
pub fn region_tags_patch(course: &Course, tags: &AddressTags) -> Option<Value> {
    let region_tags = merge_tags(&course.region_tags, &tags.region_tags);
    let district_tags = merge_tags(&course.district_tags, &tags.district_tags);
    let neighborhood_tags = merge_tags(&course.neighborhood_tags, &tags.neighborhood_tags);

    if region_tags == course.region_tags
        && district_tags == course.district_tags
        && neighborhood_tags == course.neighborhood_tags
    {
        return None;
    }

    let mut patch = json!({
        "region_tags": region_tags,
        "district_tags": district_tags,
        "neighborhood_tags": neighborhood_tags,
    });
    if let Some(city) = region_tags.first() {
        patch["city"] = json!(city);
    }
    if let Some(district) = district_tags.first() {
        patch["district"] = json!(district);
    }

    Some(patch)
}

fn merge_patch(target: &mut Value, patch: Value) {
    if let (Some(target), Value::Object(patch)) = (target.as_object_mut(), patch) {
        target.extend(patch);
    }
}

fn failed(course_id: &str, error: impl ToString) -> PrecomputeResult {
    PrecomputeResult {
        course_id: course_id.to_string(),
        success: false,
        profile: None,
        error: Some(error.to_string()),
    }
}

/// Compute and store the safety profile of one course
async fn precompute_course(state: &AppState, course: &Course) -> PrecomputeResult {
    let Some((lat, lng)) = course.coordinates() else {
        return failed(&course.id, "course has no coordinates");
    };

    let (place, facilities) = if state.kakao.is_configured() {
        let place = match state.kakao.find_place(&course.name, lat, lng).await {
            Ok(place) => place,
            Err(e) => {
                tracing::warn!("Kakao place lookup failed for {}: {}", course.name, e);
                None
            }
        };
        let delay = Duration::from_millis(state.precompute.facility_delay_ms);
        (place, state.kakao.survey_facilities(lat, lng, delay).await)
    } else {
        (None, FacilitySurvey::default())
    };

    let bbox = calculate_bounding_box(lat, lng, COMPOSITE_SAFETY_RADIUS_KM);
    let points = match state.backend.query_safety_points(&bbox).await {
        Ok(points) => Some(points),
        Err(e) => {
            tracing::warn!("Safety points unavailable for {}, using fallback lighting: {}", course.id, e);
            None
        }
    };

    let Some(profile) = SafetyProfile::compute(course, points.as_deref(), facilities) else {
        return failed(&course.id, "course has no coordinates");
    };

    let mut patch = profile.to_course_patch();
    if let Some(place) = &place {
        merge_patch(&mut patch, kakao_patch(place));
    }

    if let Err(e) = state.backend.update_course(&course.id, &patch).await {
        tracing::error!("Failed to store safety profile for {}: {}", course.id, e);
        return failed(&course.id, e);
    }

    tracing::info!(
        course_id = %course.id,
        lighting = profile.lighting.score,
        crew_friendly = profile.crew_analysis.is_crew_friendly,
        "Safety profile stored"
    );

    PrecomputeResult {
        course_id: course.id.clone(),
        success: true,
        profile: Some(profile),
        error: None,
    }
}

/// Precompute safety data
///
/// POST /api/v1/admin/safety/precompute
///
/// Request body:
/// ```json
/// { "courseId": "string" }
/// ```
/// or `{ "batchMode": true }` for every course.
async fn precompute_safety(state: web::Data<AppState>, req: web::Json<PrecomputeRequest>) -> impl Responder {
    let courses = match (&req.course_id, req.batch_mode) {
        (Some(course_id), _) => state.backend.get_course(course_id).await.map(|c| vec![c]),
        (None, true) => state.backend.list_courses().await,
        (None, false) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Invalid request".to_string(),
                message: "courseId or batchMode is required".to_string(),
                status_code: 400,
            });
        }
    };

    let courses = match courses {
        Ok(courses) => courses,
        Err(BackendError::NotFound(message)) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "Course not found".to_string(),
                message,
                status_code: 404,
            });
        }
        Err(e) => {
            tracing::error!("Failed to load courses for precompute: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to load courses".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    tracing::info!("Precomputing safety data for {} courses", courses.len());

    let delay = Duration::from_millis(state.precompute.course_delay_ms);
    let mut results = Vec::with_capacity(courses.len());

    for (i, course) in courses.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        results.push(precompute_course(&state, course).await);
    }

    let succeeded = results.iter().filter(|r| r.success).count();

    HttpResponse::Ok().json(PrecomputeResponse {
        message: format!("{}/{} courses processed", succeeded, results.len()),
        total: results.len(),
        succeeded,
        results,
    })
}

/// Refresh administrative tags from stored Kakao addresses
///
/// POST /api/v1/admin/courses/region-tags
async fn update_region_tags(state: web::Data<AppState>) -> impl Responder {
    let courses = match state.backend.list_courses_with_address().await {
        Ok(courses) => courses,
        Err(e) => {
            tracing::error!("Failed to load courses with addresses: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to load courses".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    let mut response = RegionTagsResponse {
        total: courses.len(),
        updated: 0,
        failed: 0,
    };

    for course in &courses {
        let Some(address) = course.kakao_address.as_deref() else {
            continue;
        };
        let Some(patch) = region_tags_patch(course, &parse_address_tags(address)) else {
            continue;
        };

        match state.backend.update_course(&course.id, &patch).await {
            Ok(()) => response.updated += 1,
            Err(e) => {
                tracing::warn!("Failed to update tags for {}: {}", course.id, e);
                response.failed += 1;
            }
        }
    }

    tracing::info!(
        "Region tags refreshed: {} updated, {} failed of {}",
        response.updated,
        response.failed,
        response.total
    );

    HttpResponse::Ok().json(response)
}

/// Normalize raw course labels, optionally inserting them
///
/// POST /api/v1/admin/courses/normalize
async fn normalize(state: web::Data<AppState>, req: web::Json<NormalizeRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let courses = normalize_courses(&req.courses);
    tracing::info!("Normalized {} raw labels into {} courses", req.courses.len(), courses.len());

    let mut inserted = 0;
    if req.persist {
        let rows: Vec<Value> = match courses.iter().map(serde_json::to_value).collect::<Result<Vec<Value>, _>>() {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("Failed to serialize normalized courses: {}", e);
                return HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Serialization failed".to_string(),
                    message: e.to_string(),
                    status_code: 500,
                });
            }
        };

        inserted = match state.backend.insert_courses(&rows).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("Failed to insert normalized courses: {}", e);
                return HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to insert courses".to_string(),
                    message: e.to_string(),
                    status_code: 500,
                });
            }
        };
    }

    HttpResponse::Ok().json(NormalizeResponse {
        total: courses.len(),
        inserted,
        courses,
    })
}
