use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::AppError;

/// Sentinel user id stored when the identity provider has no user for the session.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Literal category value that disables category filtering.
pub const ALL_CATEGORIES: &str = "All";

// ============ Review Records ============

/// Service category a review is filed under.
///
/// Stored documents may carry values outside the known set (older clients
/// used "Household"); those are kept verbatim as `Other` so that category
/// matching stays exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceType {
    HouseholdShifting,
    CommercialShifting,
    CarTransport,
    BikeTransport,
    Warehousing,
    Other(String),
}

impl ServiceType {
    /// Categories offered to reviewers, in display order.
    pub const KNOWN: [ServiceType; 5] = [
        ServiceType::HouseholdShifting,
        ServiceType::CommercialShifting,
        ServiceType::CarTransport,
        ServiceType::BikeTransport,
        ServiceType::Warehousing,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ServiceType::HouseholdShifting => "Household Shifting",
            ServiceType::CommercialShifting => "Commercial Shifting",
            ServiceType::CarTransport => "Car Transport",
            ServiceType::BikeTransport => "Bike Transport",
            ServiceType::Warehousing => "Warehousing",
            ServiceType::Other(value) => value,
        }
    }

    /// Exact, case-sensitive parse. Anything unrecognised becomes `Other`.
    pub fn parse(value: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|known| known.as_str() == value)
            .cloned()
            .unwrap_or_else(|| ServiceType::Other(value.to_string()))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ServiceType::Other(_))
    }
}

impl From<String> for ServiceType {
    fn from(value: String) -> Self {
        ServiceType::parse(&value)
    }
}

impl From<ServiceType> for String {
    fn from(value: ServiceType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single customer review as observed in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    /// Store-assigned identifier.
    pub id: Uuid,
    /// Reviewer display name.
    pub name: String,
    /// Consignment reference (PNR / GCN) the review is tied to.
    pub pnr: String,
    /// Origin city, free text.
    pub from_location: Option<String>,
    /// Destination city, free text.
    pub to_location: Option<String>,
    /// Service category.
    pub service_type: ServiceType,
    /// Star rating. `0` marks a record whose stored rating was missing or invalid.
    pub rating: u8,
    /// Review body.
    pub comment: String,
    /// Opaque user id or [`ANONYMOUS_USER`].
    pub user_id: String,
    /// Store write time; `None` while the write is pending.
    pub created_at: Option<DateTime<Utc>>,
    /// Whether the consignment reference was matched to a real shipment.
    pub verified: bool,
    /// Reply written out-of-band by an administrator.
    pub admin_reply: Option<String>,
}

impl ReviewRecord {
    /// The rating if it is a valid star value.
    pub fn valid_rating(&self) -> Option<u8> {
        (1..=5).contains(&self.rating).then_some(self.rating)
    }
}

/// Review as submitted by a visitor, before the store assigns `id`,
/// `createdAt` and the verification policy assigns `verified`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub name: String,
    #[serde(alias = "consignmentRef")]
    pub pnr: String,
    #[serde(default)]
    pub from_location: Option<String>,
    #[serde(default)]
    pub to_location: Option<String>,
    pub service_type: ServiceType,
    /// Star rating chosen in the form; `0` means the visitor never picked one.
    #[serde(default)]
    pub rating: i64,
    pub comment: String,
}

const MAX_NAME_LEN: usize = 100;
const MAX_PNR_LEN: usize = 32;
const MAX_LOCATION_LEN: usize = 100;
const MAX_COMMENT_LEN: usize = 2000;

impl NewReview {
    /// Validates and normalizes a submission.
    ///
    /// Text fields are trimmed, blank locations dropped. The rating must be a
    /// star value and the service type one of [`ServiceType::KNOWN`].
    pub fn validate(self) -> Result<NewReview, AppError> {
        if self.rating == 0 {
            return Err(AppError::BadRequest(
                "Please give a star rating.".to_string(),
            ));
        }
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::BadRequest(
                "Rating must be between 1 and 5 stars".to_string(),
            ));
        }

        let name = required_text("name", &self.name, MAX_NAME_LEN)?;
        let pnr = required_text("pnr", &self.pnr, MAX_PNR_LEN)?;
        let comment = required_text("comment", &self.comment, MAX_COMMENT_LEN)?;
        let from_location = optional_text("fromLocation", self.from_location.as_deref())?;
        let to_location = optional_text("toLocation", self.to_location.as_deref())?;

        if !self.service_type.is_known() {
            return Err(AppError::BadRequest(format!(
                "Unknown service type: {}",
                self.service_type
            )));
        }

        Ok(NewReview {
            name,
            pnr,
            from_location,
            to_location,
            service_type: self.service_type,
            rating: self.rating,
            comment,
        })
    }
}

fn required_text(field: &str, value: &str, max_len: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} cannot be empty", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::BadRequest(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(trimmed.to_string())
}

fn optional_text(field: &str, value: Option<&str>) -> Result<Option<String>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) if v.chars().count() > MAX_LOCATION_LEN => Err(AppError::BadRequest(format!(
            "{} must be at most {} characters",
            field, MAX_LOCATION_LEN
        ))),
        Some(v) => Ok(Some(v.to_string())),
        None => Ok(None),
    }
}

// ============ View Parameters ============

/// Category filter applied to the display list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CategoryFilter {
    #[default]
    All,
    Service(ServiceType),
}

impl CategoryFilter {
    pub fn matches(&self, service_type: &ServiceType) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Service(wanted) => wanted == service_type,
        }
    }
}

impl From<String> for CategoryFilter {
    fn from(value: String) -> Self {
        if value == ALL_CATEGORIES {
            CategoryFilter::All
        } else {
            CategoryFilter::Service(ServiceType::from(value))
        }
    }
}

impl From<CategoryFilter> for String {
    fn from(value: CategoryFilter) -> Self {
        match value {
            CategoryFilter::All => ALL_CATEGORIES.to_string(),
            CategoryFilter::Service(service) => service.into(),
        }
    }
}

/// Display-list ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    Newest,
    Highest,
    Lowest,
}

impl FromStr for SortKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Newest" | "newest" => Ok(SortKey::Newest),
            "Highest" | "highest" => Ok(SortKey::Highest),
            "Lowest" | "lowest" => Ok(SortKey::Lowest),
            other => Err(AppError::BadRequest(format!(
                "Unknown sort key '{}'. Expected Newest, Highest or Lowest",
                other
            ))),
        }
    }
}

/// Client-local view state. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewParameters {
    pub category_filter: CategoryFilter,
    pub sort_key: SortKey,
    pub verified_only: bool,
}

/// Query string accepted by the review feed endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQueryParams {
    pub category: Option<String>,
    pub sort: Option<String>,
    pub verified_only: Option<bool>,
}

impl FeedQueryParams {
    pub fn into_view(self) -> Result<ViewParameters, AppError> {
        let sort_key = match self.sort.as_deref().map(str::trim) {
            None | Some("") => SortKey::default(),
            Some(raw) => raw.parse()?,
        };
        let category_filter = match self.category {
            Some(raw) if !raw.trim().is_empty() => CategoryFilter::from(raw),
            _ => CategoryFilter::All,
        };

        Ok(ViewParameters {
            category_filter,
            sort_key,
            verified_only: self.verified_only.unwrap_or(false),
        })
    }
}

// ============ Statistics ============

/// Per-star review counts, indexed by star value 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RatingDistribution([usize; 5]);

impl RatingDistribution {
    pub fn from_counts(counts: [usize; 5]) -> Self {
        Self(counts)
    }

    /// Count for a star value. Values outside 1..=5 have no bucket.
    pub fn get(&self, star: u8) -> usize {
        match star {
            1..=5 => self.0[usize::from(star) - 1],
            _ => 0,
        }
    }

    pub(crate) fn record(&mut self, star: u8) {
        if let 1..=5 = star {
            self.0[usize::from(star) - 1] += 1;
        }
    }

    /// Number of records that landed in any bucket.
    pub fn bucketed(&self) -> usize {
        self.0.iter().sum()
    }
}

impl Serialize for RatingDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        for star in (1..=5u8).rev() {
            map.serialize_entry(&star.to_string(), &self.get(star))?;
        }
        map.end()
    }
}

/// Summary over the whole review corpus, independent of the current view.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSummary {
    pub total: usize,
    pub verified_total: usize,
    /// Mean star rating rounded to one decimal, `0.0` when nothing is rated.
    pub average: f64,
    pub distribution: RatingDistribution,
}

impl StatisticsSummary {
    /// Share of all reviews that gave `star` stars, as a percentage.
    pub fn percentage(&self, star: u8) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.distribution.get(star) as f64 / self.total as f64 * 100.0
    }
}

// ============ API Request/Response Models ============

/// Response for the review feed.
#[derive(Debug, Serialize)]
pub struct FeedResponse<'a> {
    pub reviews: Vec<&'a ReviewRecord>,
    pub stats: StatisticsSummary,
}

/// Statistics with the per-star bar percentages the portal renders.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: StatisticsSummary,
    pub percentages: Vec<StarPercentage>,
}

impl From<StatisticsSummary> for StatsResponse {
    fn from(stats: StatisticsSummary) -> Self {
        let percentages = (1..=5u8)
            .rev()
            .map(|stars| StarPercentage {
                stars,
                count: stats.distribution.get(stars),
                percentage: stats.percentage(stars),
            })
            .collect();
        Self { stats, percentages }
    }
}

#[derive(Debug, Serialize)]
pub struct StarPercentage {
    pub stars: u8,
    pub count: usize,
    pub percentage: f64,
}

/// Response for a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub review: ReviewRecord,
}

/// Response for the spotlight carousel.
#[derive(Debug, Serialize)]
pub struct SpotlightResponse {
    pub index: usize,
    pub size: usize,
    pub review: Option<ReviewRecord>,
}
