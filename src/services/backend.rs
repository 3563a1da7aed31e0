use crate::core::filters::{CourseQuery, LocationFilter};
use crate::models::{BoundingBox, Course, CourseSafetyRecord, SafetyPoint};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to the backend table API
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: invalid service key")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Table names in the backend
#[derive(Debug, Clone)]
pub struct BackendTables {
    pub courses: String,
    pub safety_points: String,
}

/// Backend table API client
///
/// Talks to a PostgREST-style REST endpoint (`/rest/v1/<table>`) for:
/// - Querying candidate courses with server-side pre-filters
/// - Reading and patching single courses
/// - Reading and inserting safety points
pub struct BackendClient {
    base_url: String,
    api_key: String,
    client: Client,
    tables: BackendTables,
    safety_point_limit: usize,
}

/// Strip characters with meaning inside PostgREST filter values and
/// `or=(...)` expressions
fn sanitize_filter_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '{' | '}' | '"' | '.' | ':' | '\\' | '%'))
        .collect()
}

/// Server-side pre-filters for a course query.
///
/// Only constraints that are exact on the stored columns are pushed down;
/// radius, text and duration checks run in memory afterwards.
pub fn course_filters(query: &CourseQuery, limit: usize) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("select".into(), "*".into()),
        ("start_lat".into(), "not.is.null".into()),
        ("start_lng".into(), "not.is.null".into()),
    ];

    match &query.location {
        LocationFilter::Radius { bounding_box, .. } => {
            params.extend(bbox_filters("start_lat", "start_lng", bounding_box));
        }
        LocationFilter::Tags { region, district, neighborhood } => {
            let tag_filters = [
                ("region_tags", region),
                ("district_tags", district),
                ("neighborhood_tags", neighborhood),
            ];
            for (column, tag) in tag_filters {
                if let Some(tag) = tag {
                    params.push((column.into(), format!("cs.{{{}}}", sanitize_filter_value(tag))));
                }
            }
        }
        LocationFilter::Text(text) => {
            let needle = sanitize_filter_value(text);
            let ors = ["city", "district", "name", "description"]
                .iter()
                .map(|column| format!("{}.ilike.*{}*", column, needle))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("or".into(), format!("({})", ors)));
        }
        LocationFilter::None => {}
    }

    if let Some((min, max)) = query.distance_range {
        params.push(("distance_km".into(), format!("gte.{}", min)));
        params.push(("distance_km".into(), format!("lte.{}", max)));
    }

    if let Some(course_type) = query.course_type {
        params.push(("course_type".into(), format!("eq.{}", course_type.label())));
    }

    if !query.required_tags.is_empty() {
        params.push(("natural_tags".into(), format!("cs.{{{}}}", query.required_tags.join(","))));
    }

    if let Some(uphill) = query.has_uphill {
        params.push(("has_uphill".into(), format!("eq.{}", uphill)));
    }

    params.push(("limit".into(), limit.to_string()));
    params
}

fn bbox_filters(lat_column: &str, lng_column: &str, bbox: &BoundingBox) -> Vec<(String, String)> {
    vec![
        (lat_column.into(), format!("gte.{}", bbox.min_lat)),
        (lat_column.into(), format!("lte.{}", bbox.max_lat)),
        (lng_column.into(), format!("gte.{}", bbox.min_lon)),
        (lng_column.into(), format!("lte.{}", bbox.max_lon)),
    ]
}

impl BackendClient {
    /// Create a new backend client
    pub fn new(base_url: String, api_key: String, tables: BackendTables, safety_point_limit: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            api_key,
            client,
            tables,
            safety_point_limit,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn check_status(response: reqwest::Response, action: &str) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
        tracing::error!("Backend request failed ({}): {} - {}", action, status, body);
        Err(BackendError::ApiError(format!("Failed to {}: {}", action, status)))
    }

    /// GET rows from a table and keep the ones that deserialize
    async fn select_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(String, String)],
        action: &str,
    ) -> Result<Vec<T>, BackendError> {
        let request = self.authorized(self.client.get(self.table_url(table)).query(params));
        let response = Self::check_status(request.send().await?, action).await?;

        let json: Value = response.json().await?;
        let rows = json
            .as_array()
            .ok_or_else(|| BackendError::InvalidResponse("Expected a JSON array of rows".into()))?;

        let mut parsed: Vec<T> = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value(row.clone()) {
                Ok(value) => parsed.push(value),
                Err(e) => tracing::warn!(
                    "Skipping malformed row {} from {}: {}",
                    row.get("id").unwrap_or(&serde_json::Value::Null),
                    table,
                    e
                ),
            }
        }

        Ok(parsed)
    }

    /// Query candidate courses for a search
    pub async fn query_courses(&self, query: &CourseQuery, limit: usize) -> Result<Vec<Course>, BackendError> {
        let params = course_filters(query, limit);
        tracing::debug!("Querying courses with {} filters", params.len());

        let courses: Vec<Course> = self.select_rows(&self.tables.courses, &params, "query courses").await?;

        tracing::debug!("Queried {} candidate courses", courses.len());
        Ok(courses)
    }

    /// Get a single course by id
    pub async fn get_course(&self, id: &str) -> Result<Course, BackendError> {
        let params = vec![
            ("select".to_string(), "*".to_string()),
            ("id".to_string(), format!("eq.{}", id)),
        ];

        self.select_rows::<Course>(&self.tables.courses, &params, "fetch course")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("Course not found: {}", id)))
    }

    /// Get the precomputed safety columns of a course
    pub async fn get_course_safety(&self, id: &str) -> Result<CourseSafetyRecord, BackendError> {
        let params = vec![
            (
                "select".to_string(),
                "id,name,lighting_score,park_water_score,crew_friendly,max_group_size,facilities,parking_available,safety_data"
                    .to_string(),
            ),
            ("id".to_string(), format!("eq.{}", id)),
        ];

        self.select_rows::<CourseSafetyRecord>(&self.tables.courses, &params, "fetch course safety")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("Course not found: {}", id)))
    }

    /// All courses, oldest first
    pub async fn list_courses(&self) -> Result<Vec<Course>, BackendError> {
        let params = vec![
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), "created_at.asc".to_string()),
        ];
        self.select_rows(&self.tables.courses, &params, "list courses").await
    }

    /// Courses that already have a Kakao address
    pub async fn list_courses_with_address(&self) -> Result<Vec<Course>, BackendError> {
        let params = vec![
            ("select".to_string(), "*".to_string()),
            ("kakao_address".to_string(), "not.is.null".to_string()),
        ];
        self.select_rows(&self.tables.courses, &params, "list addressed courses").await
    }

    /// Safety points inside a bounding box
    pub async fn query_safety_points(&self, bbox: &BoundingBox) -> Result<Vec<SafetyPoint>, BackendError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(bbox_filters("latitude", "longitude", bbox));
        params.push(("limit".to_string(), self.safety_point_limit.to_string()));

        let points: Vec<SafetyPoint> = self
            .select_rows(&self.tables.safety_points, &params, "query safety points")
            .await?;

        if points.len() >= self.safety_point_limit {
            tracing::warn!(
                "Safety point query hit the {} row limit, lights may be undercounted",
                self.safety_point_limit
            );
        } else {
            tracing::debug!("Queried {} safety points", points.len());
        }
        Ok(points)
    }

    /// Patch columns of one course
    pub async fn update_course(&self, id: &str, patch: &Value) -> Result<(), BackendError> {
        let request = self
            .authorized(self.client.patch(self.table_url(&self.tables.courses)))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(patch);

        Self::check_status(request.send().await?, "update course").await?;

        tracing::debug!("Updated course {}", id);
        Ok(())
    }

    async fn insert_rows<T: serde::Serialize>(&self, table: &str, rows: &[T], action: &str) -> Result<usize, BackendError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let request = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(rows);

        Self::check_status(request.send().await?, action).await?;
        Ok(rows.len())
    }

    /// Insert course rows, returning the number inserted
    pub async fn insert_courses(&self, rows: &[Value]) -> Result<usize, BackendError> {
        self.insert_rows(&self.tables.courses, rows, "insert courses").await
    }

    /// Insert one batch of safety points
    pub async fn insert_safety_points(&self, points: &[SafetyPoint]) -> Result<usize, BackendError> {
        self.insert_rows(&self.tables.safety_points, points, "insert safety points").await
    }

    /// Cheap reachability check
    pub async fn health_check(&self) -> Result<bool, BackendError> {
        let request = self
            .authorized(self.client.get(self.table_url(&self.tables.courses)))
            .query(&[("select", "id"), ("limit", "1")]);

        Ok(request.send().await?.status().is_success())
    }
}
