// Service exports
pub mod backend;
pub mod cache;
pub mod kakao;
pub mod safety_loader;
pub mod weather;

pub use backend::{BackendClient, BackendError, BackendTables};
pub use cache::{CacheError, CacheKey, CacheManager, CacheStats};
pub use kakao::{KakaoClient, KakaoError, KakaoPlace};
pub use safety_loader::{CsvLayout, LoadError, LoadReport};
pub use weather::{WeatherClient, WeatherError};
