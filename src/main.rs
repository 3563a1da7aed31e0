use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use course_finder::config::Settings;
use course_finder::core::{CourseSearcher, QueryParser};
use course_finder::routes::{self, handle_json_payload_error, AppState};
use course_finder::services::{BackendClient, BackendTables, CacheManager, KakaoClient, WeatherClient};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }

    info!("Starting course finder service...");

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("Configuration error: {}", e))
    })?;

    info!("Configuration loaded successfully");

    let backend = Arc::new(BackendClient::new(
        settings.backend.url.clone(),
        settings.backend.service_key.clone(),
        BackendTables {
            courses: settings.backend.courses_table.clone(),
            safety_points: settings.backend.safety_points_table.clone(),
        },
        settings.backend.safety_point_limit,
    ));

    info!("Backend client initialized ({})", settings.backend.url);

    let kakao = Arc::new(KakaoClient::new(
        settings.kakao.base_url.clone(),
        settings.kakao.api_key.clone(),
    ));
    if !kakao.is_configured() {
        warn!("KAKAO_REST_API_KEY not set, geocoding and facility surveys are disabled");
    }

    let weather = Arc::new(WeatherClient::new(
        settings.weather.base_url.clone(),
        settings.weather.api_key.clone(),
    ));
    if !weather.is_configured() {
        warn!("OPENWEATHER_API_KEY not set, weather lookups are disabled");
    }

    // Redis is optional; fall back to the in-process cache
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(600);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let cache = match settings.cache.redis_url.as_deref() {
        Some(redis_url) => match CacheManager::new(redis_url, l1_cache_size, cache_ttl).await {
            Ok(c) => {
                info!("Cache manager initialized with Redis (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);
                c
            }
            Err(e) => {
                warn!("Failed to connect to Redis ({}), using in-process cache only", e);
                CacheManager::in_memory(l1_cache_size, cache_ttl)
            }
        },
        None => {
            info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);
            CacheManager::in_memory(l1_cache_size, cache_ttl)
        }
    };

    let weights = settings.ranking.weights;
    let searcher = CourseSearcher::new(weights, settings.search.tolerances);

    info!("Searcher initialized with weights: {:?}", weights);

    // Build application state
    let app_state = AppState {
        backend,
        kakao,
        weather,
        cache: Arc::new(cache),
        parser: Arc::new(QueryParser::new()),
        searcher,
        candidate_limit: settings.search.candidate_limit,
        precompute: settings.precompute.clone(),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
