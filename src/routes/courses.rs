use actix_web::{web, HttpResponse, Responder};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use validator::Validate;

use crate::config::PrecomputeSettings;
use crate::core::filters::LocationFilter;
use crate::core::safety::SEARCH_SAFETY_RADIUS_KM;
use crate::core::{calculate_bounding_box, CourseSearcher, QueryParser, SearchResult};
use crate::models::{
    BoundingBox, Course, CourseSafetyAnalysis, ErrorResponse, GeoLocation, HealthResponse,
    DataSource, ParseQueryRequest, ParseResponse, ParsedQuery, RecommendRequest, RecommendResponse,
    SafetyPoint, SearchCoursesRequest, SearchResponse, WeatherInfo,
};
use crate::services::weather::english_city_name;
use crate::services::{BackendClient, BackendError, CacheKey, CacheManager, KakaoClient, WeatherClient};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<BackendClient>,
    pub kakao: Arc<KakaoClient>,
    pub weather: Arc<WeatherClient>,
    pub cache: Arc<CacheManager>,
    pub parser: Arc<QueryParser>,
    pub searcher: CourseSearcher,
    /// Rows fetched from the backend per search
    pub candidate_limit: usize,
    pub precompute: PrecomputeSettings,
}

/// Configure all course-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/query/parse", web::post().to(parse_query))
        .route("/courses/search", web::post().to(search_courses))
        .route("/courses/recommend", web::post().to(recommend_courses))
        .route("/courses/{id}/safety", web::get().to(course_safety));
}

pub(crate) fn validation_error(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
    })
}

/// Place name used for the weather lookup
///
/// Prefers a location or region the weather service knows by name, else the
/// raw location text.
pub fn weather_location(parsed: &ParsedQuery) -> Option<String> {
    let location = parsed.location.as_deref();
    let region = parsed.region.as_deref();

    location
        .filter(|l| english_city_name(l).is_some())
        .or_else(|| region.filter(|r| english_city_name(r).is_some()))
        .or(location)
        .or(region)
        .map(str::to_string)
}

/// Widest side, in degrees, of one safety point query box
const SAFETY_BOX_MAX_SPAN_DEG: f64 = 0.06;

/// Safety point queries in flight per search
const SAFETY_FETCH_CONCURRENCY: usize = 6;

/// Query boxes covering the safety radius of every candidate.
///
/// Nearby candidates share a box; a box never grows past
/// [`SAFETY_BOX_MAX_SPAN_DEG`], so the backend row limit applies per
/// neighborhood instead of per city.
pub fn safety_query_boxes(courses: &[Course]) -> Vec<BoundingBox> {
    let fits = |b: &BoundingBox| {
        b.max_lat - b.min_lat <= SAFETY_BOX_MAX_SPAN_DEG && b.max_lon - b.min_lon <= SAFETY_BOX_MAX_SPAN_DEG
    };

    let mut boxes: Vec<BoundingBox> = Vec::new();
    for (lat, lng) in courses.iter().filter_map(Course::coordinates) {
        let bbox = calculate_bounding_box(lat, lng, SEARCH_SAFETY_RADIUS_KM);
        match boxes.iter_mut().find(|existing| fits(&existing.union(&bbox))) {
            Some(existing) => *existing = existing.union(&bbox),
            None => boxes.push(bbox),
        }
    }
    boxes
}

/// Safety points around the candidates; failed boxes are skipped with a warning
async fn load_safety_points(state: &AppState, candidates: &[Course]) -> Vec<SafetyPoint> {
    let boxes = safety_query_boxes(candidates);

    let batches: Vec<_> = stream::iter(boxes.iter())
        .map(|bbox| state.backend.query_safety_points(bbox))
        .buffer_unordered(SAFETY_FETCH_CONCURRENCY)
        .collect()
        .await;

    // Overlapping boxes return the same rows
    let mut seen: HashSet<(u64, u64, DataSource)> = HashSet::new();
    let mut points = Vec::new();
    for batch in batches {
        match batch {
            Ok(batch) => points.extend(
                batch
                    .into_iter()
                    .filter(|p| seen.insert((p.latitude.to_bits(), p.longitude.to_bits(), p.data_source))),
            ),
            Err(e) => tracing::warn!("Failed to load safety points, ranking without them: {}", e),
        }
    }

    tracing::debug!("Loaded {} safety points from {} boxes", points.len(), boxes.len());
    points
}

/// Current weather, cached; `None` when unavailable
async fn lookup_weather(state: &AppState, parsed: &ParsedQuery) -> Option<WeatherInfo> {
    let location = weather_location(parsed)?;
    let key = CacheKey::weather(&location);

    if let Ok(weather) = state.cache.get::<WeatherInfo>(&key).await {
        return Some(weather);
    }
    if !state.weather.is_configured() {
        tracing::debug!("Weather API key not configured, skipping lookup");
        return None;
    }

    match state.weather.current(&location).await {
        Ok(weather) => {
            if let Err(e) = state.cache.set(&key, &weather).await {
                tracing::warn!("Failed to cache weather for {}: {}", location, e);
            }
            Some(weather)
        }
        Err(e) => {
            tracing::warn!("Weather lookup failed for {}: {}", location, e);
            None
        }
    }
}

/// Coordinates of the query location, cached; `None` when unavailable
async fn geocode(state: &AppState, parsed: &ParsedQuery) -> Option<GeoLocation> {
    let location = parsed.location.as_deref()?;
    let key = CacheKey::geocode(location);

    if let Ok(geo) = state.cache.get::<GeoLocation>(&key).await {
        return Some(geo);
    }
    if !state.kakao.is_configured() {
        tracing::debug!("Kakao API key not configured, skipping geocode");
        return None;
    }

    match state.kakao.geocode(location).await {
        Ok(Some(geo)) => {
            if let Err(e) = state.cache.set(&key, &geo).await {
                tracing::warn!("Failed to cache geocode for {}: {}", location, e);
            }
            Some(geo)
        }
        Ok(None) => {
            tracing::info!("No geocode result for {}", location);
            None
        }
        Err(e) => {
            tracing::warn!("Geocode failed for {}: {}", location, e);
            None
        }
    }
}

/// Load candidates and safety points, then rank
async fn run_search(
    state: &AppState,
    parsed: &ParsedQuery,
    user_location: Option<(f64, f64)>,
    limit: Option<usize>,
) -> Result<SearchResult, BackendError> {
    let mut query = state.searcher.build_query(parsed, user_location, limit);
    let mut candidates = state.backend.query_courses(&query, state.candidate_limit).await?;

    // Tag columns are sparse on older rows; retry by name before giving up
    if candidates.is_empty() && matches!(query.location, LocationFilter::Tags { .. }) {
        if let Some(location) = &parsed.location {
            tracing::info!("No tagged courses for {}, falling back to text search", location);
            query.location = LocationFilter::Text(location.clone());
            candidates = state.backend.query_courses(&query, state.candidate_limit).await?;
        }
    }

    tracing::debug!("Loaded {} candidate courses", candidates.len());

    let safety_points = load_safety_points(state, &candidates).await;

    Ok(state
        .searcher
        .search_with_query(parsed, &query, candidates, &safety_points))
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let backend_healthy = state.backend.health_check().await.unwrap_or(false);

    let status = if backend_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Parse query endpoint
///
/// POST /api/v1/query/parse
///
/// Request body:
/// ```json
/// { "query": "잠실 5km 저녁 러닝" }
/// ```
async fn parse_query(state: web::Data<AppState>, req: web::Json<ParseQueryRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let parsed = match state.parser.parse(&req.query) {
        Ok(parsed) => parsed,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Invalid query".to_string(),
                message: e.to_string(),
                status_code: 400,
            });
        }
    };

    tracing::info!("Parsed query {:?}: location={:?}", req.query, parsed.location);

    let weather = lookup_weather(&state, &parsed).await;

    HttpResponse::Ok().json(ParseResponse {
        success: true,
        parsed,
        weather,
    })
}

/// Search courses endpoint
///
/// POST /api/v1/courses/search
///
/// Request body:
/// ```json
/// { "parsed": { "location": "잠실", "distance": 5 }, "limit": 5, "userLat": 37.51, "userLng": 127.10 }
/// ```
async fn search_courses(state: web::Data<AppState>, req: web::Json<SearchCoursesRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let user_location = req.user_location();

    let result = match run_search(&state, &req.parsed, user_location, req.limit).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Course search failed: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to search courses".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    tracing::info!(
        "Returning {} courses (from {} candidates)",
        result.courses.len(),
        result.total_candidates
    );

    let user_location = user_location.map(|(lat, lng)| GeoLocation {
        location: req.parsed.location.clone().unwrap_or_default(),
        lat,
        lng,
        place_name: None,
        address: None,
    });

    HttpResponse::Ok().json(SearchResponse {
        success: true,
        total: result.courses.len(),
        courses: result.courses,
        user_location,
    })
}

/// One-shot recommend endpoint: parse, weather, geocode and search
///
/// POST /api/v1/courses/recommend
async fn recommend_courses(state: web::Data<AppState>, req: web::Json<RecommendRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let request_id = uuid::Uuid::new_v4().to_string();

    let parsed = match state.parser.parse(&req.query) {
        Ok(parsed) => parsed,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Invalid query".to_string(),
                message: e.to_string(),
                status_code: 400,
            });
        }
    };

    let (weather, user_location) = tokio::join!(lookup_weather(&state, &parsed), geocode(&state, &parsed));
    let coordinates = user_location.as_ref().map(|geo| (geo.lat, geo.lng));

    let result = match run_search(&state, &parsed, coordinates, req.limit).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Recommendation {} failed: {}", request_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to search courses".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    tracing::info!(
        request_id = %request_id,
        returned = result.courses.len(),
        total_candidates = result.total_candidates,
        "Recommendation completed"
    );

    HttpResponse::Ok().json(RecommendResponse {
        success: true,
        request_id,
        parsed,
        weather,
        user_location,
        total: result.courses.len(),
        courses: result.courses,
    })
}

/// Precomputed safety analysis of one course
///
/// GET /api/v1/courses/{id}/safety
async fn course_safety(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let course_id = path.into_inner();

    match state.backend.get_course_safety(&course_id).await {
        Ok(record) => HttpResponse::Ok().json(CourseSafetyAnalysis::from(record)),
        Err(BackendError::NotFound(message)) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Course not found".to_string(),
            message,
            status_code: 404,
        }),
        Err(e) => {
            tracing::error!("Failed to fetch safety data for {}: {}", course_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch course safety".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}
