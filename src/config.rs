use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::core::filters::SearchTolerances;
use crate::models::RankingWeights;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    #[serde(default)]
    pub kakao: KakaoSettings,
    #[serde(default)]
    pub weather: WeatherSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub ranking: RankingSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub precompute: PrecomputeSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    pub url: String,
    pub service_key: String,
    #[serde(default = "default_courses_table")]
    pub courses_table: String,
    #[serde(default = "default_safety_points_table")]
    pub safety_points_table: String,
    #[serde(default = "default_safety_point_limit")]
    pub safety_point_limit: usize,
}

fn default_courses_table() -> String { "running_courses".to_string() }
fn default_safety_points_table() -> String { "safety_points".to_string() }
fn default_safety_point_limit() -> usize { 5000 }

#[derive(Debug, Clone, Deserialize)]
pub struct KakaoSettings {
    #[serde(default = "default_kakao_url")]
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for KakaoSettings {
    fn default() -> Self {
        Self {
            base_url: default_kakao_url(),
            api_key: None,
        }
    }
}

fn default_kakao_url() -> String { "https://dapi.kakao.com".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherSettings {
    #[serde(default = "default_weather_url")]
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            base_url: default_weather_url(),
            api_key: None,
        }
    }
}

fn default_weather_url() -> String { "https://api.openweathermap.org".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    /// Rows fetched from the backend per search
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
    #[serde(default)]
    pub tolerances: SearchTolerances,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
            tolerances: SearchTolerances::default(),
        }
    }
}

fn default_candidate_limit() -> usize { 50 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankingSettings {
    #[serde(default)]
    pub weights: RankingWeights,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Redis is optional; without it only the in-process cache is used
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: Some(600),
            l1_cache_size: Some(1000),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrecomputeSettings {
    #[serde(default = "default_course_delay_ms")]
    pub course_delay_ms: u64,
    #[serde(default = "default_facility_delay_ms")]
    pub facility_delay_ms: u64,
}

impl Default for PrecomputeSettings {
    fn default() -> Self {
        Self {
            course_delay_ms: default_course_delay_ms(),
            facility_delay_ms: default_facility_delay_ms(),
        }
    }
}

fn default_course_delay_ms() -> u64 { 200 }
fn default_facility_delay_ms() -> u64 { 100 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration files (config/default.toml, config/local.toml)
    /// 3. Environment variables (prefixed with COURSE__)
    /// 4. Well-known secret variables (SUPABASE_URL, KAKAO_REST_API_KEY, ...)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., COURSE__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("COURSE")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Secrets the deployment exposes under their conventional names
const SECRET_VARS: &[(&str, &str)] = &[
    ("SUPABASE_URL", "backend.url"),
    ("SUPABASE_SERVICE_ROLE_KEY", "backend.service_key"),
    ("KAKAO_REST_API_KEY", "kakao.api_key"),
    ("OPENWEATHER_API_KEY", "weather.api_key"),
    ("REDIS_URL", "cache.redis_url"),
];

/// Override config values with the conventional secret variables when set
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    let mut builder = Config::builder().add_source(settings);

    for (var, key) in SECRET_VARS {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                builder = builder.set_override(*key, value)?;
            }
        }
    }

    builder.build()
}
