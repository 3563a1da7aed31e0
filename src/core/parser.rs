use crate::models::{CourseType, Difficulty, ParsedQuery, TimeOfDay};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("query is required")]
    EmptyQuery,
}

/// Known place keyword and the administrative area it resolves to
#[derive(Debug, Clone, Copy)]
pub struct LocationEntry {
    pub keyword: &'static str,
    pub region: &'static str,
    pub district: Option<&'static str>,
    pub neighborhood: Option<&'static str>,
}

const fn place(
    keyword: &'static str,
    region: &'static str,
    district: Option<&'static str>,
    neighborhood: Option<&'static str>,
) -> LocationEntry {
    LocationEntry { keyword, region, district, neighborhood }
}

/// Location lookup table. Order matters: the first keyword found in the query
/// wins, so neighborhoods and districts come before bare regions. A keyword is
/// skipped when a longer keyword containing it, for a different area, is also
/// in the query (서구 inside 달서구).
pub const LOCATIONS: &[LocationEntry] = &[
    // 서울
    place("잠실", "서울", Some("송파구"), Some("잠실동")),
    place("송파", "서울", Some("송파구"), None),
    place("송파구", "서울", Some("송파구"), None),
    place("강남", "서울", Some("강남구"), None),
    place("강남구", "서울", Some("강남구"), None),
    place("서초", "서울", Some("서초구"), None),
    place("서초구", "서울", Some("서초구"), None),
    place("영등포", "서울", Some("영등포구"), None),
    place("마포", "서울", Some("마포구"), None),
    place("종로", "서울", Some("종로구"), None),
    place("중구", "서울", Some("중구"), None),
    place("성북", "서울", Some("성북구"), None),
    place("강북", "서울", Some("강북구"), None),
    place("은평", "서울", Some("은평구"), None),
    place("서대문", "서울", Some("서대문구"), None),
    place("구로", "서울", Some("구로구"), None),
    place("금천", "서울", Some("금천구"), None),
    // 인천
    place("인하대", "인천", Some("미추홀구"), Some("인하대")),
    place("송도", "인천", Some("연수구"), Some("송도")),
    place("청라", "인천", Some("서구"), Some("청라")),
    place("연수구", "인천", Some("연수구"), None),
    place("미추홀구", "인천", Some("미추홀구"), None),
    place("남동구", "인천", Some("남동구"), None),
    // 경기
    place("광명", "경기", Some("광명시"), None),
    place("부천", "경기", Some("부천시"), None),
    place("성남", "경기", Some("성남시"), None),
    place("용인", "경기", Some("용인시"), None),
    place("화성", "경기", Some("화성시"), None),
    place("안양", "경기", Some("안양시"), None),
    place("수원", "경기", Some("수원시"), None),
    place("고양", "경기", Some("고양시"), None),
    place("파주", "경기", Some("파주시"), None),
    // 부산
    place("해운대", "부산", Some("해운대구"), None),
    place("부산진", "부산", Some("부산진구"), None),
    place("동래", "부산", Some("동래구"), None),
    place("서구", "부산", Some("서구"), None),
    place("사하구", "부산", Some("사하구"), None),
    // 대구
    place("달서구", "대구", Some("달서구"), None),
    place("수성구", "대구", Some("수성구"), None),
    place("북구", "대구", Some("북구"), None),
    // 광역시/도
    place("서울", "서울", None, None),
    place("부산", "부산", None, None),
    place("대구", "대구", None, None),
    place("인천", "인천", None, None),
    place("광주", "광주", None, None),
    place("대전", "대전", None, None),
    place("울산", "울산", None, None),
    place("경기", "경기", None, None),
    place("경기도", "경기", None, None),
    place("제주", "제주", None, None),
];

/// Course type keywords, checked in order
const COURSE_TYPES: &[(CourseType, &[&str])] = &[
    (CourseType::River, &["하천", "천", "강", "한강", "안양천", "탄천", "중랑천"]),
    (CourseType::Park, &["공원", "파크"]),
    (CourseType::Lake, &["호수", "저수지", "석촌호수", "일산호수"]),
    (CourseType::Track, &["트랙", "운동장", "경기장"]),
    (CourseType::Trail, &["산책로", "둘레길", "올레길"]),
    (CourseType::Coast, &["해안", "해변", "바다"]),
    (CourseType::Uphill, &["업힐", "오르막", "산"]),
];

const TIMES_OF_DAY: &[(TimeOfDay, &[&str])] = &[
    (TimeOfDay::Now, &["오늘", "지금", "현재"]),
    (TimeOfDay::Morning, &["아침", "새벽"]),
    (TimeOfDay::Afternoon, &["점심", "낮"]),
    (TimeOfDay::Evening, &["저녁", "밤", "야간"]),
];

const GROUP_WORDS: &[&str] = &["크루", "그룹", "같이", "함께", "단체"];
const NIGHT_WORDS: &[&str] = &["야간", "밤", "저녁", "어두운"];
const EASY_WORDS: &[&str] = &["쉬운", "가벼운", "편한"];
const HARD_WORDS: &[&str] = &["어려운", "힘든", "업힐", "오르막"];

/// Extra amenity keywords: (trigger, keyword added to the result)
const AMENITY_KEYWORDS: &[(&str, &str)] = &[
    ("주차", "주차장"),
    ("화장실", "화장실"),
    ("안전", "안전"),
    ("조명", "조명"),
];

pub const GROUP_RUNNING_KEYWORD: &str = "크루러닝";
pub const NIGHT_RUNNING_KEYWORD: &str = "야간러닝";

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Keyword/regex based parser for Korean running queries
///
/// ```
/// use course_finder::core::QueryParser;
///
/// let parsed = QueryParser::new().parse("잠실 5km 저녁 러닝").unwrap();
/// assert_eq!(parsed.district.as_deref(), Some("송파구"));
/// assert_eq!(parsed.distance_km, Some(5.0));
/// assert!(parsed.is_night_running);
/// ```
#[derive(Debug, Clone)]
pub struct QueryParser {
    distance_patterns: Vec<Regex>,
    hours_and_minutes: Regex,
    hours: Regex,
    minutes: Regex,
    crew_size: Regex,
}

impl QueryParser {
    pub fn new() -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("invalid built-in pattern");

        Self {
            distance_patterns: vec![
                compile(r"(?i)(\d+(?:\.\d+)?)\s*(?:키로|킬로|km|키로미터)"),
                compile(r"(?i)(\d+(?:\.\d+)?)\s*k"),
                compile(r"(\d+)\s*키로"),
            ],
            hours_and_minutes: compile(r"(\d+)\s*시간?\s*(\d+)\s*분"),
            hours: compile(r"(\d+)\s*시간"),
            minutes: compile(r"(\d+)\s*분"),
            crew_size: compile(r"(\d+)\s*명"),
        }
    }

    /// Parse a free-text query into structured filters
    pub fn parse(&self, query: &str) -> Result<ParsedQuery, ParseError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ParseError::EmptyQuery);
        }

        let mut result = ParsedQuery::default();

        if let Some(entry) = Self::match_location(query) {
            result.location = Some(entry.keyword.to_string());
            result.region = Some(entry.region.to_string());
            result.district = entry.district.map(str::to_string);
            result.neighborhood = entry.neighborhood.map(str::to_string);
        }

        result.distance_km = self.extract_distance(query);
        result.duration_minutes = self.extract_duration(query);
        result.time_of_day = Self::extract_time_of_day(query);

        result.course_type = Self::extract_course_type(query, result.location.as_deref());

        result.crew_size = self
            .crew_size
            .captures(query)
            .and_then(|c| c[1].parse().ok());

        if contains_any(query, GROUP_WORDS) || result.crew_size.is_some() {
            result.is_group_running = true;
            result.keywords.push(GROUP_RUNNING_KEYWORD.to_string());
        }

        if contains_any(query, NIGHT_WORDS) {
            result.is_night_running = true;
            result.keywords.push(NIGHT_RUNNING_KEYWORD.to_string());
        }

        result.difficulty = if contains_any(query, EASY_WORDS) {
            Some(Difficulty::Easy)
        } else if contains_any(query, HARD_WORDS) {
            Some(Difficulty::Hard)
        } else {
            None
        };

        for (trigger, keyword) in AMENITY_KEYWORDS {
            if query.contains(trigger) {
                result.keywords.push(keyword.to_string());
            }
        }

        tracing::debug!("Parsed query {:?} -> {:?}", query, result);

        Ok(result)
    }

    fn match_location(query: &str) -> Option<&'static LocationEntry> {
        LOCATIONS
            .iter()
            .find(|entry| query.contains(entry.keyword) && !Self::shadowed(entry, query))
    }

    fn shadowed(entry: &LocationEntry, query: &str) -> bool {
        LOCATIONS.iter().any(|other| {
            other.keyword.len() > entry.keyword.len()
                && other.keyword.contains(entry.keyword)
                && query.contains(other.keyword)
                && (other.region, other.district) != (entry.region, entry.district)
        })
    }

    fn extract_distance(&self, query: &str) -> Option<f64> {
        self.distance_patterns
            .iter()
            .find_map(|pattern| pattern.captures(query))
            .and_then(|c| c[1].parse().ok())
    }

    fn extract_duration(&self, query: &str) -> Option<u32> {
        if let Some(c) = self.hours_and_minutes.captures(query) {
            let hours: u32 = c[1].parse().ok()?;
            let minutes: u32 = c[2].parse().ok()?;
            return hours.checked_mul(60)?.checked_add(minutes);
        }
        if let Some(c) = self.hours.captures(query) {
            return c[1].parse::<u32>().ok()?.checked_mul(60);
        }
        self.minutes.captures(query).and_then(|c| c[1].parse().ok())
    }

    fn extract_time_of_day(query: &str) -> Option<TimeOfDay> {
        TIMES_OF_DAY
            .iter()
            .find(|(_, words)| contains_any(query, words))
            .map(|(time, _)| *time)
    }

    /// Course type keywords lying entirely inside the matched place name do not
    /// count, so 강남 and 부산 are not read as 강 / 산 while 경기장 still is a track.
    fn extract_course_type(query: &str, location: Option<&str>) -> Option<CourseType> {
        let location_spans: Vec<(usize, usize)> = location
            .map(|keyword| {
                query
                    .match_indices(keyword)
                    .map(|(start, m)| (start, start + m.len()))
                    .collect()
            })
            .unwrap_or_default();

        let found = |word: &str| {
            query.match_indices(word).any(|(start, m)| {
                let end = start + m.len();
                !location_spans.iter().any(|&(s, e)| s <= start && end <= e)
            })
        };

        COURSE_TYPES
            .iter()
            .find(|(_, words)| words.iter().any(|w| found(w)))
            .map(|(course_type, _)| *course_type)
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> ParsedQuery {
        QueryParser::new().parse(query).unwrap()
    }

    #[test]
    fn test_empty_query_rejected() {
        assert_eq!(QueryParser::new().parse("   "), Err(ParseError::EmptyQuery));
    }

    #[test]
    fn test_neighborhood_location() {
        let parsed = parse("잠실 근처 러닝 코스");

        assert_eq!(parsed.location.as_deref(), Some("잠실"));
        assert_eq!(parsed.region.as_deref(), Some("서울"));
        assert_eq!(parsed.district.as_deref(), Some("송파구"));
        assert_eq!(parsed.neighborhood.as_deref(), Some("잠실동"));
    }

    #[test]
    fn test_bare_region_location() {
        let parsed = parse("경기도 공원 달리기");

        assert_eq!(parsed.location.as_deref(), Some("경기"));
        assert_eq!(parsed.region.as_deref(), Some("경기"));
        assert!(parsed.district.is_none());
        assert_eq!(parsed.course_type, Some(CourseType::Park));
    }

    #[test]
    fn test_distance_units() {
        assert_eq!(parse("5km 코스").distance_km, Some(5.0));
        assert_eq!(parse("3.5 키로 뛰고 싶어").distance_km, Some(3.5));
        assert_eq!(parse("10K 러닝").distance_km, Some(10.0));
        assert_eq!(parse("7킬로").distance_km, Some(7.0));
        assert_eq!(parse("그냥 러닝").distance_km, None);
    }

    #[test]
    fn test_duration() {
        assert_eq!(parse("1시간 러닝").duration_minutes, Some(60));
        assert_eq!(parse("30분 정도").duration_minutes, Some(30));
        assert_eq!(parse("1시간 30분 달리기").duration_minutes, Some(90));
    }

    #[test]
    fn test_oversized_duration_is_dropped() {
        let parsed = parse("잠실 99999999시간 러닝");
        assert_eq!(parsed.duration_minutes, None);
        assert_eq!(parsed.location.as_deref(), Some("잠실"));

        assert_eq!(parse("71582788시간 59분").duration_minutes, None);
        assert_eq!(parse("99999999999분").duration_minutes, None);
    }

    #[test]
    fn test_time_of_day() {
        assert_eq!(parse("새벽 러닝").time_of_day, Some(TimeOfDay::Morning));
        assert_eq!(parse("아침 러닝").time_of_day, Some(TimeOfDay::Morning));
        assert_eq!(parse("오늘 저녁").time_of_day, Some(TimeOfDay::Now));
        assert_eq!(parse("밤에 뛰기").time_of_day, Some(TimeOfDay::Evening));
    }

    #[test]
    fn test_location_not_read_as_course_type() {
        // 강남 contains 강, 부산 contains 산
        assert_eq!(parse("강남 5km").course_type, None);
        assert_eq!(parse("부산 러닝").course_type, None);
        assert_eq!(parse("강남 한강 러닝").course_type, Some(CourseType::River));
    }

    #[test]
    fn test_course_type_extending_past_location() {
        let parsed = parse("경기장 트랙 러닝");
        assert_eq!(parsed.location.as_deref(), Some("경기"));
        assert_eq!(parsed.course_type, Some(CourseType::Track));

        assert_eq!(parse("경기장 러닝").course_type, Some(CourseType::Track));
    }

    #[test]
    fn test_seo_gu_resolves_to_busan() {
        let parsed = parse("서구 러닝");
        assert_eq!(parsed.region.as_deref(), Some("부산"));
        assert_eq!(parsed.district.as_deref(), Some("서구"));

        let parsed = parse("달서구 러닝");
        assert_eq!(parsed.location.as_deref(), Some("달서구"));
        assert_eq!(parsed.region.as_deref(), Some("대구"));

        // Same area, so the shorter keyword still wins
        assert_eq!(parse("송파구 러닝").location.as_deref(), Some("송파"));
    }

    #[test]
    fn test_group_and_night_keywords() {
        let parsed = parse("송도 야간 크루 러닝 화장실 있는 곳");

        assert!(parsed.is_group_running);
        assert!(parsed.is_night_running);
        assert_eq!(parsed.keywords, vec!["크루러닝", "야간러닝", "화장실"]);
        assert!(parsed.wants_night_running());
    }

    #[test]
    fn test_crew_size_implies_group() {
        let parsed = parse("12명 같이 뛸 코스");

        assert_eq!(parsed.crew_size, Some(12));
        assert!(parsed.is_group_running);
        assert_eq!(parsed.keywords.iter().filter(|k| *k == "크루러닝").count(), 1);
    }

    #[test]
    fn test_difficulty() {
        assert_eq!(parse("가벼운 러닝").difficulty, Some(Difficulty::Easy));
        assert_eq!(parse("오르막 훈련").difficulty, Some(Difficulty::Hard));
        assert_eq!(parse("러닝").difficulty, None);
    }
}
