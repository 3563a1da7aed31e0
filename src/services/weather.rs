use crate::models::WeatherInfo;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when calling OpenWeather
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("City not found: {0}")]
    NotFound(String),

    #[error("OpenWeather API key is not configured")]
    MissingApiKey,
}

/// Korean place names mapped to the city names OpenWeather knows
const CITY_NAMES: &[(&str, &str)] = &[
    ("서울", "Seoul"),
    ("부산", "Busan"),
    ("대구", "Daegu"),
    ("인천", "Incheon"),
    ("광주", "Gwangju"),
    ("대전", "Daejeon"),
    ("울산", "Ulsan"),
    ("세종", "Sejong"),
    ("수원", "Suwon"),
    ("성남", "Seongnam"),
    ("고양", "Goyang"),
    ("용인", "Yongin"),
    ("부천", "Bucheon"),
    ("안산", "Ansan"),
    ("안양", "Anyang"),
    ("남양주", "Namyangju"),
    ("화성", "Hwaseong"),
    ("평택", "Pyeongtaek"),
    ("의정부", "Uijeongbu"),
    ("시흥", "Siheung"),
    ("파주", "Paju"),
    ("광명", "Gwangmyeong"),
    ("김포", "Gimpo"),
    ("군포", "Gunpo"),
    ("오산", "Osan"),
    ("이천", "Icheon"),
    ("양주", "Yangju"),
    ("하남", "Hanam"),
    ("춘천", "Chuncheon"),
    ("원주", "Wonju"),
    ("강릉", "Gangneung"),
    ("청주", "Cheongju"),
    ("천안", "Cheonan"),
    ("전주", "Jeonju"),
    ("포항", "Pohang"),
    ("창원", "Changwon"),
    ("마산", "Masan"),
    ("진주", "Jinju"),
    ("순천", "Suncheon"),
    ("목포", "Mokpo"),
    ("여수", "Yeosu"),
    ("제주", "Jeju"),
    ("서귀포", "Seogwipo"),
    ("인하대", "Incheon"),
    ("한강", "Seoul"),
];

/// English city name for a Korean place name, if it is a known city
pub fn english_city_name(location: &str) -> Option<&'static str> {
    CITY_NAMES
        .iter()
        .find(|(korean, _)| *korean == location)
        .map(|(_, english)| *english)
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    #[serde(default)]
    name: String,
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
    #[serde(default)]
    wind: Option<Wind>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
    humidity: u32,
}

#[derive(Debug, Default, Deserialize)]
struct Condition {
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct Wind {
    #[serde(default)]
    speed: f64,
}

impl From<CurrentWeather> for WeatherInfo {
    fn from(current: CurrentWeather) -> Self {
        let condition = current.weather.into_iter().next().unwrap_or_default();
        let wind_speed = current.wind.map(|w| w.speed).unwrap_or(0.0);

        Self {
            location: current.name,
            temperature: current.main.temp.round() as i32,
            feels_like: current.main.feels_like.round() as i32,
            humidity: current.main.humidity,
            wind_speed: (wind_speed * 10.0).round() / 10.0,
            description: condition.description,
            icon: condition.icon,
        }
    }
}

/// OpenWeather current-weather client
pub struct WeatherClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl WeatherClient {
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

    /// Current weather for a Korean place name
    ///
    /// Unknown names are passed through as-is.
    pub async fn current(&self, location: &str) -> Result<WeatherInfo, WeatherError> {
        let api_key = self.api_key.as_ref().ok_or(WeatherError::MissingApiKey)?;
        let city = english_city_name(location).unwrap_or(location);

        let url = format!(
            "{}/data/2.5/weather?q={},KR&appid={}&units=metric&lang=kr",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(city),
            urlencoding::encode(api_key)
        );

        tracing::debug!("Fetching weather for {} ({})", location, city);

        let response = self.client.get(&url).send().await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(WeatherError::NotFound(city.to_string())),
            status => {
                return Err(WeatherError::ApiError(format!("Weather lookup failed: {}", status)));
            }
        }

        let current: CurrentWeather = response.json().await?;
        Ok(current.into())
    }
}
