//! Safety point CSV import.
//!
//! Public light datasets ship as CSV with latitude / longitude columns.
//! Rows are validated against the bounds of South Korea, scored by source
//! and inserted into the backend in batches.

use crate::core::safety::point_base_score;
use crate::models::{DataSource, SafetyPoint};
use crate::services::backend::{BackendClient, BackendError};
use serde::Serialize;
use std::io;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

const LAT_RANGE: (f64, f64) = (33.0, 38.6);
const LNG_RANGE: (f64, f64) = (124.0, 132.0);

/// Errors that can occur while loading safety data
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Column layout of a safety CSV
#[derive(Debug, Clone)]
pub struct CsvLayout {
    pub lat_col: String,
    pub lng_col: String,
    pub region_col: Option<String>,
    pub district_col: Option<String>,
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self {
            lat_col: "위도".to_string(),
            lng_col: "경도".to_string(),
            region_col: None,
            district_col: None,
        }
    }
}

/// Outcome of parsing a CSV
#[derive(Debug, Default)]
pub struct ParsedPoints {
    pub points: Vec<SafetyPoint>,
    pub invalid_rows: usize,
    pub out_of_bounds: usize,
}

/// Outcome of inserting points
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub total: usize,
    pub inserted: usize,
    pub failed: usize,
    pub batches: usize,
}

pub fn within_korea(lat: f64, lng: f64) -> bool {
    (LAT_RANGE.0..=LAT_RANGE.1).contains(&lat) && (LNG_RANGE.0..=LNG_RANGE.1).contains(&lng)
}

/// Rough region name from coordinates, checked metro areas first
pub fn region_from_coords(lat: f64, lng: f64) -> &'static str {
    const REGIONS: &[(&str, (f64, f64), (f64, f64))] = &[
        ("서울", (37.4, 37.7), (126.7, 127.2)),
        ("부산", (35.0, 35.3), (129.0, 129.3)),
        ("대구", (35.7, 36.0), (128.4, 128.7)),
        ("대전", (36.2, 36.4), (127.3, 127.5)),
        ("광주", (35.1, 35.2), (126.7, 126.9)),
        ("인천", (37.3, 37.6), (126.4, 126.8)),
        ("경기", (37.0, 38.5), (126.5, 127.8)),
    ];

    REGIONS
        .iter()
        .find(|(_, (lat_min, lat_max), (lng_min, lng_max))| {
            (*lat_min..=*lat_max).contains(&lat) && (*lng_min..=*lng_max).contains(&lng)
        })
        .map(|(name, _, _)| *name)
        .unwrap_or("기타")
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
}

fn non_empty(record: &csv::StringRecord, index: Option<usize>) -> Option<String> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse safety points from any CSV reader
pub fn parse_points<R: io::Read>(
    reader: R,
    source: DataSource,
    layout: &CsvLayout,
) -> Result<ParsedPoints, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let lat_idx = column_index(&headers, &layout.lat_col)
        .ok_or_else(|| LoadError::MissingColumn(layout.lat_col.clone()))?;
    let lng_idx = column_index(&headers, &layout.lng_col)
        .ok_or_else(|| LoadError::MissingColumn(layout.lng_col.clone()))?;
    let region_idx = layout.region_col.as_deref().and_then(|c| column_index(&headers, c));
    let district_idx = layout.district_col.as_deref().and_then(|c| column_index(&headers, c));

    let score = point_base_score(source);
    let mut parsed = ParsedPoints::default();

    for (line, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping unreadable row {}: {}", line + 2, e);
                parsed.invalid_rows += 1;
                continue;
            }
        };

        let coords = record
            .get(lat_idx)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .zip(record.get(lng_idx).and_then(|v| v.trim().parse::<f64>().ok()));

        let Some((lat, lng)) = coords else {
            tracing::debug!("Skipping row {} without coordinates", line + 2);
            parsed.invalid_rows += 1;
            continue;
        };

        if !within_korea(lat, lng) {
            parsed.out_of_bounds += 1;
            continue;
        }

        let region = non_empty(&record, region_idx)
            .unwrap_or_else(|| region_from_coords(lat, lng).to_string());

        parsed.points.push(SafetyPoint {
            latitude: lat,
            longitude: lng,
            safety_score: score,
            data_source: source,
            region: Some(region),
            district: non_empty(&record, district_idx),
        });
    }

    Ok(parsed)
}

/// Parse safety points from a CSV file
pub fn parse_file<P: AsRef<Path>>(
    path: P,
    source: DataSource,
    layout: &CsvLayout,
) -> Result<ParsedPoints, LoadError> {
    let file = std::fs::File::open(path.as_ref()).map_err(csv::Error::from)?;
    parse_points(file, source, layout)
}

/// Insert points in batches, retrying a failed batch one row at a time
pub async fn insert_points(
    backend: &BackendClient,
    points: &[SafetyPoint],
    batch_size: usize,
) -> LoadReport {
    let batch_size = batch_size.max(1);
    let mut report = LoadReport {
        total: points.len(),
        ..LoadReport::default()
    };

    for (index, batch) in points.chunks(batch_size).enumerate() {
        report.batches += 1;

        match backend.insert_safety_points(batch).await {
            Ok(n) => {
                report.inserted += n;
                tracing::info!(
                    "Batch {} stored ({}/{})",
                    index + 1,
                    report.inserted,
                    report.total
                );
            }
            Err(e) => {
                tracing::warn!("Batch {} failed, retrying row by row: {}", index + 1, e);
                for point in batch {
                    match backend.insert_safety_points(std::slice::from_ref(point)).await {
                        Ok(n) => report.inserted += n,
                        Err(e) => {
                            tracing::debug!("Row insert failed: {}", e);
                            report.failed += 1;
                        }
                    }
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::backend::BackendTables;

    const SAMPLE: &str = "관리번호,위도,경도,자치구\n\
                          1,37.5665,126.9780,중구\n\
                          2,35.1796,129.0756,\n\
                          3,not-a-number,127.0,강남구\n\
                          4,40.1,127.0,\n\
                          5,36.35,127.38,\n";

    #[test]
    fn test_parse_points() {
        let layout = CsvLayout {
            district_col: Some("자치구".to_string()),
            ..CsvLayout::default()
        };
        let parsed = parse_points(SAMPLE.as_bytes(), DataSource::StreetLight, &layout).unwrap();

        assert_eq!(parsed.points.len(), 3);
        assert_eq!(parsed.invalid_rows, 1);
        assert_eq!(parsed.out_of_bounds, 1);

        let seoul = &parsed.points[0];
        assert_eq!(seoul.safety_score, 20.0);
        assert_eq!(seoul.region.as_deref(), Some("서울"));
        assert_eq!(seoul.district.as_deref(), Some("중구"));

        assert_eq!(parsed.points[1].region.as_deref(), Some("부산"));
        assert!(parsed.points[1].district.is_none());
        assert_eq!(parsed.points[2].region.as_deref(), Some("대전"));
    }

    #[test]
    fn test_missing_column() {
        let csv = "lat,lon\n37.5,127.0\n";
        let result = parse_points(csv.as_bytes(), DataSource::SecurityLight, &CsvLayout::default());
        assert!(matches!(result, Err(LoadError::MissingColumn(c)) if c == "위도"));
    }

    #[test]
    fn test_custom_columns_and_bom() {
        let csv = "\u{feff}lat,lon\n37.45,126.65\n";
        let layout = CsvLayout {
            lat_col: "lat".to_string(),
            lng_col: "lon".to_string(),
            ..CsvLayout::default()
        };
        let parsed = parse_points(csv.as_bytes(), DataSource::SecurityLight, &layout).unwrap();

        assert_eq!(parsed.points.len(), 1);
        assert_eq!(parsed.points[0].safety_score, 15.0);
        assert_eq!(parsed.points[0].region.as_deref(), Some("인천"));
    }

    #[test]
    fn test_region_from_coords() {
        assert_eq!(region_from_coords(37.5, 127.0), "서울");
        assert_eq!(region_from_coords(37.2, 127.0), "경기");
        assert_eq!(region_from_coords(33.4, 126.5), "기타");
        assert!(within_korea(33.0, 124.0));
        assert!(!within_korea(38.7, 127.0));
    }

    fn point(lat: f64) -> SafetyPoint {
        SafetyPoint {
            latitude: lat,
            longitude: 127.0,
            safety_score: 20.0,
            data_source: DataSource::StreetLight,
            region: None,
            district: None,
        }
    }

    #[tokio::test]
    async fn test_batch_failure_falls_back_to_rows() {
        let mut server = mockito::Server::new_async().await;
        let batch = server
            .mock("POST", "/rest/v1/safety_points")
            .match_body(mockito::Matcher::Regex(r#""latitude":37.5.*"latitude":37.6"#.to_string()))
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let first = server
            .mock("POST", "/rest/v1/safety_points")
            .match_body(mockito::Matcher::Regex(r#"^\[\{"latitude":37.5,[^{]*\]$"#.to_string()))
            .with_status(201)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/rest/v1/safety_points")
            .match_body(mockito::Matcher::Regex(r#"^\[\{"latitude":37.6,[^{]*\]$"#.to_string()))
            .with_status(400)
            .expect(1)
            .create_async()
            .await;

        let tables = BackendTables {
            courses: "running_courses".to_string(),
            safety_points: "safety_points".to_string(),
        };
        let backend = BackendClient::new(server.url(), "key".to_string(), tables, 5000);

        let report = insert_points(&backend, &[point(37.5), point(37.6)], 10).await;

        batch.assert_async().await;
        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(
            report,
            LoadReport {
                total: 2,
                inserted: 1,
                failed: 1,
                batches: 1
            }
        );
    }
}
