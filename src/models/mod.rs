// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BoundingBox, Course, CourseSafetyRecord, CourseType, DataSource, Difficulty, GeoLocation,
    ParsedQuery, RankedCourse, RankingWeights, SafetyInfo, SafetyLevel, SafetyPoint, SafetyScores,
    TimeOfDay,
};
pub use requests::{NormalizeRequest, ParseQueryRequest, PrecomputeRequest, RecommendRequest, SearchCoursesRequest};
pub use responses::{
    CourseSafetyAnalysis, ErrorResponse, HealthResponse, NormalizeResponse, ParseResponse,
    PrecomputeResponse, PrecomputeResult, RecommendResponse, RegionTagsResponse, SearchResponse,
    WeatherInfo,
};
