use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{CourseType, Difficulty};

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("invalid built-in pattern"))
}

fn range_km_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)(\d+(?:\.\d+)?)\s*~\s*(\d+(?:\.\d+)?)\s*km")
}

fn km_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)(\d+(?:\.\d+)?)\s*(?:km|킬로)")
}

fn meters_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)(\d+)\s*m")
}

fn slash_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"/\s*([^/]+?)\s*/")
}

fn bracket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\(([^)]+)\)")
}

fn district_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[가-힣]+(?:구|시|군)$")
}

fn neighborhood_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[가-힣]+[0-9]*(?:동|리)$")
}

/// Push a tag unless it is already present
fn push_unique(tags: &mut Vec<String>, tag: &str) {
    if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
        tags.push(tag.to_string());
    }
}

/// Merge two tag lists, keeping first-seen order and dropping duplicates
pub fn merge_tags(existing: &[String], new: &[String]) -> Vec<String> {
    let mut merged = Vec::with_capacity(existing.len() + new.len());
    for tag in existing.iter().chain(new) {
        push_unique(&mut merged, tag);
    }
    merged
}

/// Region labels are stored in their short form
pub fn canonical_region(region: &str) -> &str {
    match region {
        "경기도" => "경기",
        other => other,
    }
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// Words split on anything that is not a letter or digit
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

/// Course length in km from a raw course label.
///
/// Ranges (`1.2~1.5km`) give their mean, meters are converted to km.
pub fn extract_distance(text: &str) -> Option<f64> {
    if let Some(caps) = range_km_re().captures(text) {
        let min: f64 = caps[1].parse().ok()?;
        let max: f64 = caps[2].parse().ok()?;
        return Some((min + max) / 2.0);
    }

    if let Some(caps) = km_re().captures(text) {
        return caps[1].parse().ok();
    }

    meters_re()
        .captures(text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(|m| m / 1000.0)
}

/// Type names accepted in the ` / type / ` slot of a normalized label
const TYPE_SLOT_NAMES: &[(&str, CourseType)] = &[
    ("하천", CourseType::River),
    ("공원", CourseType::Park),
    ("호수", CourseType::Lake),
    ("트랙", CourseType::Track),
    ("운동장", CourseType::Track),
    ("산책로", CourseType::Trail),
    ("업힐", CourseType::Uphill),
    ("해안", CourseType::Coast),
    ("수변", CourseType::Waterside),
    ("저수지", CourseType::Lake),
    ("강변", CourseType::River),
    ("평지 러닝", CourseType::Park),
];

/// Course type from a raw label
pub fn extract_course_type(text: &str) -> CourseType {
    if let Some(caps) = slash_type_re().captures(text) {
        let slot = caps[1].to_lowercase();
        if let Some((_, course_type)) = TYPE_SLOT_NAMES.iter().find(|(name, _)| slot.contains(name)) {
            return *course_type;
        }
    }

    let has = |needles: &[&str]| contains_any(text, needles);
    if has(&["트랙", "경기장", "운동장"]) {
        CourseType::Track
    } else if has(&["하천", "천", "강"]) {
        CourseType::River
    } else if has(&["공원"]) {
        CourseType::Park
    } else if has(&["호수", "저수지"]) {
        CourseType::Lake
    } else if has(&["업힐", "산", "고개"]) {
        CourseType::Uphill
    } else if has(&["산책로", "둘레길"]) {
        CourseType::Trail
    } else if has(&["해안"]) {
        CourseType::Coast
    } else {
        CourseType::Other
    }
}

pub fn extract_difficulty(text: &str) -> Difficulty {
    if text.contains("업힐") || text.contains('산') {
        Difficulty::Hard
    } else if text.contains("트랙") || text.contains("평지") {
        Difficulty::Easy
    } else {
        Difficulty::Medium
    }
}

/// Parts of the first parenthesised group, split on `~`, `·` and commas
fn bracket_parts(text: &str) -> Vec<&str> {
    bracket_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            m.as_str()
                .split(['~', '·', ',', '，'])
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Regions a label spans, starting with the region it is listed under
pub fn extract_region_tags(text: &str, city: &str) -> Vec<String> {
    let mut regions = Vec::new();
    push_unique(&mut regions, canonical_region(city));

    for part in bracket_parts(text) {
        for region in ["서울", "경기", "인천", "부산"] {
            if part.contains(region) {
                push_unique(&mut regions, region);
            }
        }
    }

    regions
}

/// Districts a label spans, starting with the district it is listed under
pub fn extract_district_tags(text: &str, district: &str) -> Vec<String> {
    let mut districts = Vec::new();
    push_unique(&mut districts, district);

    for part in bracket_parts(text) {
        for word in words(part) {
            if district_re().is_match(word) {
                push_unique(&mut districts, word);
            }
        }
    }

    districts
}

/// Neighborhood (동/리) words in a label
pub fn extract_neighborhood_tags(text: &str) -> Vec<String> {
    let mut neighborhoods = Vec::new();
    for word in words(text) {
        if neighborhood_re().is_match(word) {
            push_unique(&mut neighborhoods, word);
        }
    }
    neighborhoods
}

/// Terrain and activity tags, starting with the course type
pub fn extract_natural_tags(text: &str, course_type: CourseType) -> Vec<String> {
    let mut tags = vec![course_type.label().to_string()];

    let rules: &[(&[&str], &str)] = &[
        (&["한강"], "한강"),
        (&["공원"], "공원"),
        (&["트랙"], "트랙"),
        (&["야간"], "야간가능"),
        (&["크루", "그룹"], "크루러닝"),
        (&["하천", "천"], "하천"),
        (&["호수"], "호수"),
        (&["해안", "해변"], "해안"),
    ];
    for (needles, tag) in rules {
        if contains_any(text, needles) {
            push_unique(&mut tags, tag);
        }
    }

    tags
}

/// One raw course label with the region and district it was listed under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCourse {
    pub city: String,
    #[serde(default)]
    pub district: String,
    pub name: String,
}

/// Cleaned course record ready to insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCourse {
    pub name: String,
    pub description: String,
    pub distance_km: Option<f64>,
    pub course_type: CourseType,
    pub difficulty_level: Difficulty,
    pub has_uphill: bool,
    pub note: Option<String>,
    pub city: String,
    pub district: String,
    pub region_tags: Vec<String>,
    pub district_tags: Vec<String>,
    pub neighborhood_tags: Vec<String>,
    pub natural_tags: Vec<String>,
    pub tags: Vec<String>,
}

impl NormalizedCourse {
    /// Fold another record of the same course into this one
    pub fn absorb(&mut self, other: &NormalizedCourse) {
        self.region_tags = merge_tags(&self.region_tags, &other.region_tags);
        self.district_tags = merge_tags(&self.district_tags, &other.district_tags);
        self.neighborhood_tags = merge_tags(&self.neighborhood_tags, &other.neighborhood_tags);
        self.natural_tags = merge_tags(&self.natural_tags, &other.natural_tags);
        self.tags = merge_tags(&self.tags, &other.tags);

        if let Some(region) = self.region_tags.first() {
            self.city = region.clone();
        }
        if let Some(district) = self.district_tags.first() {
            self.district = district.clone();
        }
    }
}

/// Display name: the part before ` / `, or before any bracket, dash or slash
fn clean_name(raw: &str) -> String {
    if let Some((head, _)) = raw.split_once(" / ") {
        return bracket_re().replace_all(head, "").trim().to_string();
    }
    raw.split(['(', '–', '/'])
        .next()
        .unwrap_or(raw)
        .trim()
        .to_string()
}

fn describe(city: &str, region_tags: &[String], district_tags: &[String], course_type: CourseType, length_km: Option<f64>) -> String {
    let mut description = if district_tags.is_empty() {
        format!("{}의 {} 러닝 코스입니다.", canonical_region(city), course_type.label())
    } else {
        let districts: Vec<&str> = district_tags.iter().take(2).map(String::as_str).collect();
        format!(
            "{} {}의 {} 러닝 코스입니다.",
            region_tags.join(", "),
            districts.join(", "),
            course_type.label()
        )
    };

    match length_km {
        Some(km) if km < 1.0 => description.push_str(&format!(" 총 거리는 약 {}m입니다.", (km * 1000.0).round() as u32)),
        Some(km) => description.push_str(&format!(" 총 거리는 약 {:.1}km입니다.", km)),
        None => {}
    }

    description
}

fn note_for(raw: &str) -> Option<String> {
    let mut parts = Vec::new();
    if raw.contains("업힐") {
        parts.push("업힐 구간 포함");
    }
    if raw.contains("트랙") {
        parts.push("정규 트랙 시설");
    }
    if raw.contains("전구간") || raw.contains("연계") {
        parts.push("연계 코스 가능");
    }
    if raw.contains("해안") || raw.contains("해변") {
        parts.push("해안 코스");
    }
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Clean one raw course label
///
/// # Example
/// ```
/// use course_finder::core::normalize::normalize_course;
///
/// let course = normalize_course("경기도", "광명시", "안양천 전구간 (서울~광명~안양) / 하천 / 20km+");
/// assert_eq!(course.name, "안양천 전구간");
/// assert_eq!(course.region_tags, vec!["경기", "서울"]);
/// assert_eq!(course.distance_km, Some(20.0));
/// ```
pub fn normalize_course(city: &str, district: &str, raw: &str) -> NormalizedCourse {
    let name = clean_name(raw);
    let distance_km = extract_distance(raw);
    let course_type = extract_course_type(raw);
    let difficulty_level = extract_difficulty(raw);

    let region_tags = extract_region_tags(raw, city);
    let district_tags = extract_district_tags(raw, district);
    let neighborhood_tags = extract_neighborhood_tags(raw);
    let natural_tags = extract_natural_tags(raw, course_type);

    let description = describe(city, &region_tags, &district_tags, course_type, distance_km);

    NormalizedCourse {
        name,
        description,
        distance_km,
        course_type,
        difficulty_level,
        has_uphill: raw.contains("업힐") || course_type == CourseType::Uphill,
        note: note_for(raw),
        city: region_tags.first().cloned().unwrap_or_default(),
        district: district_tags.first().cloned().unwrap_or_default(),
        tags: natural_tags.clone(),
        region_tags,
        district_tags,
        neighborhood_tags,
        natural_tags,
    }
}

/// Normalize a batch of labels, merging courses that share a name.
///
/// A district written as `A/B` lists the course under each district.
pub fn normalize_courses(raw: &[RawCourse]) -> Vec<NormalizedCourse> {
    let mut merged: Vec<NormalizedCourse> = Vec::new();

    for entry in raw {
        for district in entry.district.split('/').map(str::trim) {
            let course = normalize_course(&entry.city, district, &entry.name);
            match merged.iter_mut().find(|c| c.name == course.name) {
                Some(existing) => existing.absorb(&course),
                None => merged.push(course),
            }
        }
    }

    merged
}

/// Administrative tags parsed from a Kakao address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressTags {
    pub region_tags: Vec<String>,
    pub district_tags: Vec<String>,
    pub neighborhood_tags: Vec<String>,
}

/// Address prefixes and the region label they map to, in match order
const ADDRESS_REGIONS: &[(&[&str], &str)] = &[
    (&["서울특별시", "서울"], "서울"),
    (&["경기도", "경기"], "경기"),
    (&["인천광역시", "인천"], "인천"),
    (&["부산광역시", "부산"], "부산"),
    (&["대구광역시", "대구"], "대구"),
    (&["대전광역시", "대전"], "대전"),
    (&["광주광역시", "광주"], "광주"),
    (&["울산광역시", "울산"], "울산"),
    (&["세종특별자치시", "세종"], "세종"),
    (&["강원특별자치도", "강원도"], "강원도"),
    (&["충청북도", "충북"], "충청북도"),
    (&["충청남도", "충남"], "충청남도"),
    (&["전라북도", "전북"], "전라북도"),
    (&["전라남도", "전남"], "전라남도"),
    (&["경상북도", "경북"], "경상북도"),
    (&["경상남도", "경남"], "경상남도"),
    (&["제주특별자치도", "제주"], "제주"),
];

/// Parse `서울특별시 구로구 구로동 ...` style addresses into tags
pub fn parse_address_tags(address: &str) -> AddressTags {
    let mut tags = AddressTags::default();
    if address.trim().is_empty() {
        return tags;
    }

    let mut region_word = None;
    if let Some((names, label)) = ADDRESS_REGIONS
        .iter()
        .find(|(names, _)| names.iter().any(|n| address.contains(n)))
    {
        tags.region_tags.push(label.to_string());
        region_word = address.split_whitespace().find(|w| names.iter().any(|n| w.starts_with(n)));
    }

    let mut rest = address.split_whitespace().filter(|w| Some(*w) != region_word);

    if let Some(district) = rest.by_ref().find(|w| district_re().is_match(w)) {
        tags.district_tags.push(district.to_string());
    }
    if let Some(neighborhood) = rest.find(|w| neighborhood_re().is_match(w)) {
        tags.neighborhood_tags.push(neighborhood.to_string());
    }

    tags
}
