use crate::core::safety::{FacilityCategory, FacilitySurvey, FACILITY_RADIUS_M};
use crate::models::GeoLocation;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when calling the Kakao Local API
#[derive(Debug, Error)]
pub enum KakaoError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid REST API key")]
    Unauthorized,

    #[error("Kakao REST API key is not configured")]
    MissingApiKey,
}

/// One keyword search hit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KakaoPlace {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub place_name: String,
    #[serde(default)]
    pub address_name: String,
    #[serde(default)]
    pub road_address_name: Option<String>,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Longitude as a decimal string
    #[serde(default)]
    pub x: String,
    /// Latitude as a decimal string
    #[serde(default)]
    pub y: String,
}

impl KakaoPlace {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.y.parse().ok()?;
        let lng = self.x.parse().ok()?;
        Some((lat, lng))
    }

    /// Road address when known, else the lot address
    pub fn best_address(&self) -> &str {
        self.road_address_name
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.address_name)
    }
}

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    #[serde(default)]
    documents: Vec<KakaoPlace>,
}

/// Optional search area for keyword queries
#[derive(Debug, Clone, Copy)]
pub struct SearchArea {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: u32,
}

/// Kakao Local keyword search client
pub struct KakaoClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl KakaoClient {
    /// Create a new Kakao client; without a key every call fails with `MissingApiKey`
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Keyword search, optionally restricted to a circle
    pub async fn search_keyword(
        &self,
        query: &str,
        area: Option<SearchArea>,
        size: Option<u32>,
    ) -> Result<Vec<KakaoPlace>, KakaoError> {
        let api_key = self.api_key.as_ref().ok_or(KakaoError::MissingApiKey)?;

        let mut url = format!(
            "{}/v2/local/search/keyword.json?query={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(query)
        );
        if let Some(area) = area {
            url.push_str(&format!("&x={}&y={}&radius={}", area.lng, area.lat, area.radius_m));
        }
        if let Some(size) = size {
            url.push_str(&format!("&size={}", size));
        }

        tracing::debug!("Kakao keyword search: {}", query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("KakaoAK {}", api_key))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED => return Err(KakaoError::Unauthorized),
            status => {
                return Err(KakaoError::ApiError(format!("Keyword search failed: {}", status)));
            }
        }

        let body: KeywordResponse = response.json().await?;
        Ok(body.documents)
    }

    /// Coordinates of the first hit for a location name
    pub async fn geocode(&self, location: &str) -> Result<Option<GeoLocation>, KakaoError> {
        let places = self.search_keyword(location, None, Some(1)).await?;

        Ok(places.into_iter().find_map(|place| {
            let (lat, lng) = place.coordinates()?;
            Some(GeoLocation {
                location: location.to_string(),
                lat,
                lng,
                address: Some(place.best_address().to_string()),
                place_name: Some(place.place_name),
            })
        }))
    }

    /// Number of hits for a keyword around a point
    pub async fn count_nearby(&self, keyword: &str, lat: f64, lng: f64, radius_m: u32) -> Result<usize, KakaoError> {
        let places = self
            .search_keyword(keyword, Some(SearchArea { lat, lng, radius_m }), None)
            .await?;
        Ok(places.len())
    }

    /// The place best matching a course name near its start
    pub async fn find_place(&self, name: &str, lat: f64, lng: f64) -> Result<Option<KakaoPlace>, KakaoError> {
        let places = self
            .search_keyword(name, Some(SearchArea { lat, lng, radius_m: 2000 }), Some(1))
            .await?;
        Ok(places.into_iter().next())
    }

    /// Count each facility category within 1 km, pausing between searches
    ///
    /// A failed search counts as zero for that category.
    pub async fn survey_facilities(&self, lat: f64, lng: f64, delay: Duration) -> FacilitySurvey {
        let mut survey = FacilitySurvey::default();

        for (i, category) in FacilityCategory::ALL.into_iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.count_nearby(category.keyword(), lat, lng, FACILITY_RADIUS_M).await {
                Ok(count) => survey.record(category, count),
                Err(e) => tracing::warn!("Facility search for {} failed: {}", category.keyword(), e),
            }
        }

        survey
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_geocode_uses_first_document() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/local/search/keyword.json")
            .match_query(mockito::Matcher::UrlEncoded("query".into(), "잠실".into()))
            .match_header("authorization", "KakaoAK test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"documents": [
                    {"id": "1", "place_name": "잠실역", "address_name": "서울 송파구 잠실동", "road_address_name": "", "x": "127.1001", "y": "37.5133"},
                    {"id": "2", "place_name": "잠실나루역", "address_name": "서울 송파구 신천동", "x": "127.1037", "y": "37.5206"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = KakaoClient::new(server.url(), Some("test-key".to_string()));
        let location = client.geocode("잠실").await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(location.lat, 37.5133);
        assert_eq!(location.lng, 127.1001);
        assert_eq!(location.place_name.as_deref(), Some("잠실역"));
        assert_eq!(location.address.as_deref(), Some("서울 송파구 잠실동"));
    }

    #[tokio::test]
    async fn test_geocode_no_hits() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/local/search/keyword.json")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"documents": []}"#)
            .create_async()
            .await;

        let client = KakaoClient::new(server.url(), Some("test-key".to_string()));
        assert!(client.geocode("없는곳").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_count_nearby_sends_area() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/local/search/keyword.json")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("query".into(), "편의점".into()),
                mockito::Matcher::UrlEncoded("radius".into(), "1000".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"documents": [{"place_name": "a"}, {"place_name": "b"}, {"place_name": "c"}]}"#)
            .create_async()
            .await;

        let client = KakaoClient::new(server.url(), Some("test-key".to_string()));
        let count = client.count_nearby("편의점", 37.5, 127.0, 1000).await.unwrap();

        mock.assert_async().await;
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_survey_facilities() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/local/search/keyword.json")
            .match_query(mockito::Matcher::UrlEncoded("query".into(), "주차장".into()))
            .with_status(200)
            .with_body(r#"{"documents": [{"place_name": "공영주차장"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v2/local/search/keyword.json")
            .match_query(mockito::Matcher::UrlEncoded("query".into(), "편의점".into()))
            .with_status(200)
            .with_body(r#"{"documents": [{"place_name": "a"}, {"place_name": "b"}]}"#)
            .create_async()
            .await;
        for keyword in ["화장실", "카페", "음수대"] {
            server
                .mock("GET", "/v2/local/search/keyword.json")
                .match_query(mockito::Matcher::UrlEncoded("query".into(), keyword.into()))
                .with_status(200)
                .with_body(r#"{"documents": []}"#)
                .create_async()
                .await;
        }

        let client = KakaoClient::new(server.url(), Some("test-key".to_string()));
        let survey = client.survey_facilities(37.5, 127.0, Duration::ZERO).await;

        assert!(survey.has_parking);
        assert!(!survey.has_restroom);
        assert_eq!(survey.convenience_count, 2);
        assert_eq!(survey.available_facilities, vec!["주차장".to_string(), "편의점".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let client = KakaoClient::new("http://127.0.0.1:1".to_string(), Some(String::new()));

        assert!(!client.is_configured());
        assert!(matches!(client.geocode("잠실").await, Err(KakaoError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/local/search/keyword.json")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let client = KakaoClient::new(server.url(), Some("bad".to_string()));
        assert!(matches!(client.geocode("잠실").await, Err(KakaoError::Unauthorized)));
    }
}
