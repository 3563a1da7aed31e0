use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit `null` column like a missing one
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Course type as stored in the `course_type` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseType {
    #[serde(rename = "하천")]
    River,
    #[serde(rename = "공원")]
    Park,
    #[serde(rename = "호수")]
    Lake,
    #[serde(rename = "트랙")]
    Track,
    #[serde(rename = "산책로")]
    Trail,
    #[serde(rename = "해안")]
    Coast,
    #[serde(rename = "업힐")]
    Uphill,
    #[serde(rename = "수변")]
    Waterside,
    #[serde(rename = "기타")]
    #[serde(other)]
    Other,
}

impl CourseType {
    /// Korean label used in storage and queries
    pub fn label(&self) -> &'static str {
        match self {
            CourseType::River => "하천",
            CourseType::Park => "공원",
            CourseType::Lake => "호수",
            CourseType::Track => "트랙",
            CourseType::Trail => "산책로",
            CourseType::Coast => "해안",
            CourseType::Uphill => "업힐",
            CourseType::Waterside => "수변",
            CourseType::Other => "기타",
        }
    }
}

impl Default for CourseType {
    fn default() -> Self {
        CourseType::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Now,
    Dawn,
    Morning,
    Afternoon,
    Evening,
}

/// Running course record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_lat: Option<f64>,
    #[serde(default)]
    pub start_lng: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub distance_km: f64,
    #[serde(default)]
    pub estimated_duration_minutes: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub course_type: CourseType,
    #[serde(default)]
    pub difficulty_level: Option<Difficulty>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_uphill: bool,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub region_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub district_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub neighborhood_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub natural_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub beginner_score: Option<f64>,
    #[serde(default)]
    pub lighting_score: Option<f64>,
    #[serde(default)]
    pub recommendation_weight: Option<f64>,
    #[serde(default)]
    pub crew_friendly: Option<bool>,
    #[serde(default)]
    pub max_group_size: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub facilities: Vec<String>,
    /// Address of the matching Kakao place, set by safety precompute
    #[serde(default)]
    pub kakao_address: Option<String>,
}

impl Course {
    /// Start coordinates, present only when both are stored
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.start_lat, self.start_lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    pub fn is_crew_friendly(&self) -> bool {
        self.crew_friendly.unwrap_or(false)
    }

    pub fn has_natural_tag(&self, tag: &str) -> bool {
        self.natural_tags.iter().any(|t| t == tag)
    }
}

/// Origin of a safety point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    StreetLight,
    SecurityLight,
    CrimeData,
    #[serde(other)]
    Other,
}

impl DataSource {
    pub fn is_light(&self) -> bool {
        matches!(self, DataSource::StreetLight | DataSource::SecurityLight)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::StreetLight => "street_light",
            DataSource::SecurityLight => "security_light",
            DataSource::CrimeData => "crime_data",
            DataSource::Other => "other",
        }
    }
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "street_light" => Ok(DataSource::StreetLight),
            "security_light" => Ok(DataSource::SecurityLight),
            "crime_data" => Ok(DataSource::CrimeData),
            other => Err(format!("unknown data source: {}", other)),
        }
    }
}

/// Geocoded light / facility data point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub safety_score: f64,
    pub data_source: DataSource,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
}

/// Structured filters extracted from a free-text query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuery {
    pub location: Option<String>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub neighborhood: Option<String>,
    #[serde(rename = "distance")]
    pub distance_km: Option<f64>,
    #[serde(rename = "duration")]
    pub duration_minutes: Option<u32>,
    #[serde(rename = "time")]
    pub time_of_day: Option<TimeOfDay>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub course_type: Option<CourseType>,
    #[serde(default)]
    pub is_group_running: bool,
    #[serde(default)]
    pub is_night_running: bool,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub crew_size: Option<u32>,
}

impl ParsedQuery {
    /// Night ranking applies to explicit night keywords and evening queries
    pub fn wants_night_running(&self) -> bool {
        self.is_night_running || self.time_of_day == Some(TimeOfDay::Evening)
    }
}

/// Resolved user location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub location: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub place_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    Low,
    Medium,
    High,
}

/// Light-density summary attached to search results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyInfo {
    pub safety_level: SafetyLevel,
    pub total_lights: usize,
    pub street_lights: usize,
    pub security_lights: usize,
    pub light_density: u32,
    pub is_night_safe: bool,
    pub is_group_friendly: bool,
    pub facilities: Vec<String>,
    pub nearby_points_count: usize,
}

/// Composite safety scores stored on the course record
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SafetyScores {
    pub safe_light_score: f64,
    pub safe_area_score: f64,
    pub avg_light_density: f64,
    pub avg_crime_index: f64,
    pub recommendation_weight: f64,
}

/// Precomputed safety columns of a course row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSafetyRecord {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub lighting_score: Option<f64>,
    #[serde(default)]
    pub park_water_score: Option<f64>,
    #[serde(default)]
    pub crew_friendly: Option<bool>,
    #[serde(default)]
    pub max_group_size: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub facilities: Vec<String>,
    #[serde(default)]
    pub parking_available: Option<bool>,
    #[serde(default)]
    pub safety_data: Option<serde_json::Value>,
}

/// Course returned by a search, with distance and ranking data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCourse {
    #[serde(flatten)]
    pub course: Course,
    pub distance_from_user: Option<f64>,
    pub adjusted_score: f64,
    pub safety_info: Option<SafetyInfo>,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Smallest box containing both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }
}

/// Ranking weights
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub crew_bonus: f64,
    pub group_fit_bonus: f64,
    pub group_overflow_penalty: f64,
    pub non_crew_penalty: f64,
    pub night_lighting_factor: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            crew_bonus: 15.0,
            group_fit_bonus: 10.0,
            group_overflow_penalty: 20.0,
            non_crew_penalty: 10.0,
            night_lighting_factor: 20.0,
        }
    }
}
