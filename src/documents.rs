//! Store document boundary.
//!
//! Review documents come out of the store as loosely-shaped JSON. They are
//! coerced into [`ReviewRecord`] here, before anything reaches the
//! aggregation pipeline:
//!
//! - documents missing `name`, `pnr`, `comment` or `serviceType` are rejected
//!   and left out of the snapshot;
//! - a missing or unusable rating becomes `0` (unrated) and the record is kept;
//! - blank optional strings are treated as absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::models::{ReviewRecord, ServiceType, ANONYMOUS_USER};

/// A review document as held by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Store-assigned id.
    pub id: Uuid,
    /// Store write time, if already assigned.
    pub created_at: Option<DateTime<Utc>>,
    /// Raw document body.
    pub body: Value,
}

/// Reason a document could not become a [`ReviewRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentDefect {
    /// The body is not a JSON object.
    NotAnObject,
    /// A required field is absent, null or blank.
    Missing(&'static str),
    /// A required field has the wrong JSON type.
    WrongType(&'static str),
}

impl fmt::Display for DocumentDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentDefect::NotAnObject => write!(f, "document body is not an object"),
            DocumentDefect::Missing(field) => write!(f, "missing required field '{}'", field),
            DocumentDefect::WrongType(field) => write!(f, "field '{}' is not a string", field),
        }
    }
}

/// Coerces one stored document into a strict record.
pub fn coerce_document(doc: &StoredDocument) -> Result<ReviewRecord, DocumentDefect> {
    let body = doc.body.as_object().ok_or(DocumentDefect::NotAnObject)?;

    let name = required_str(body, &["name"], "name")?;
    let pnr = required_str(body, &["pnr", "consignmentRef"], "pnr")?;
    let comment = required_str(body, &["comment"], "comment")?;
    let service_type = ServiceType::from(required_str(body, &["serviceType"], "serviceType")?);

    let created_at = doc
        .created_at
        .or_else(|| optional_str(body, "createdAt").and_then(|s| parse_timestamp(&s)));

    Ok(ReviewRecord {
        id: doc.id,
        name,
        pnr,
        from_location: optional_str(body, "fromLocation"),
        to_location: optional_str(body, "toLocation"),
        service_type,
        rating: coerce_rating(body.get("rating")),
        comment,
        user_id: optional_str(body, "userId").unwrap_or_else(|| ANONYMOUS_USER.to_string()),
        created_at,
        verified: body.get("verified").and_then(Value::as_bool).unwrap_or(false),
        admin_reply: optional_str(body, "adminReply"),
    })
}

/// Coerces a full snapshot, dropping (and logging) rejected documents.
///
/// Input order is preserved.
pub fn coerce_snapshot(docs: &[StoredDocument]) -> Vec<ReviewRecord> {
    let mut rejected = 0;
    let records: Vec<ReviewRecord> = docs
        .iter()
        .filter_map(|doc| match coerce_document(doc) {
            Ok(record) => {
                if record.valid_rating().is_none() {
                    tracing::debug!("Review {} has no valid rating; kept as unrated", doc.id);
                }
                Some(record)
            }
            Err(defect) => {
                rejected += 1;
                tracing::warn!("Skipping malformed review document {}: {}", doc.id, defect);
                None
            }
        })
        .collect();

    if rejected > 0 {
        tracing::warn!(
            "Review snapshot: {} documents accepted, {} rejected",
            records.len(),
            rejected
        );
    }
    records
}

/// Builds the stored body for a record, the inverse of [`coerce_document`]
/// for everything except `id` and `createdAt`.
pub fn document_body(record: &ReviewRecord) -> Value {
    let mut body = Map::new();
    body.insert("name".into(), Value::from(record.name.clone()));
    body.insert("pnr".into(), Value::from(record.pnr.clone()));
    if let Some(from) = &record.from_location {
        body.insert("fromLocation".into(), Value::from(from.clone()));
    }
    if let Some(to) = &record.to_location {
        body.insert("toLocation".into(), Value::from(to.clone()));
    }
    body.insert("serviceType".into(), Value::from(record.service_type.as_str()));
    body.insert("rating".into(), Value::from(record.rating));
    body.insert("comment".into(), Value::from(record.comment.clone()));
    body.insert("userId".into(), Value::from(record.user_id.clone()));
    body.insert("verified".into(), Value::from(record.verified));
    if let Some(reply) = &record.admin_reply {
        body.insert("adminReply".into(), Value::from(reply.clone()));
    }
    Value::Object(body)
}

fn required_str(
    body: &Map<String, Value>,
    keys: &[&str],
    field: &'static str,
) -> Result<String, DocumentDefect> {
    let value = keys
        .iter()
        .find_map(|key| body.get(*key).filter(|v| !v.is_null()))
        .ok_or(DocumentDefect::Missing(field))?;

    let text = value.as_str().ok_or(DocumentDefect::WrongType(field))?.trim();
    if text.is_empty() {
        return Err(DocumentDefect::Missing(field));
    }
    Ok(text.to_string())
}

fn optional_str(body: &Map<String, Value>, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Integer, integral float, or numeric string in 1..=5; anything else is 0.
fn coerce_rating(value: Option<&Value>) -> u8 {
    let raw = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match raw {
        Some(star @ 1..=5) => star as u8,
        _ => 0,
    }
}

fn parse_timestamp(timestamp_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S%.f")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(body: Value) -> StoredDocument {
        StoredDocument {
            id: Uuid::new_v4(),
            created_at: None,
            body,
        }
    }

    fn complete_body() -> Value {
        json!({
            "name": "Kiran",
            "pnr": "VRL88291",
            "fromLocation": "Hubli",
            "toLocation": "",
            "serviceType": "Household Shifting",
            "rating": 5,
            "comment": "Packed everything carefully",
            "userId": "uid-42",
            "verified": true
        })
    }

    #[test]
    fn test_complete_document() {
        let record = coerce_document(&doc(complete_body())).unwrap();
        assert_eq!(record.name, "Kiran");
        assert_eq!(record.service_type, ServiceType::HouseholdShifting);
        assert_eq!(record.rating, 5);
        assert_eq!(record.from_location.as_deref(), Some("Hubli"));
        assert_eq!(record.to_location, None);
        assert!(record.verified);
        assert_eq!(record.user_id, "uid-42");
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let mut body = complete_body();
        body.as_object_mut().unwrap().remove("comment");
        assert_eq!(
            coerce_document(&doc(body)),
            Err(DocumentDefect::Missing("comment"))
        );

        let mut body = complete_body();
        body["name"] = json!("   ");
        assert_eq!(coerce_document(&doc(body)), Err(DocumentDefect::Missing("name")));

        let mut body = complete_body();
        body["serviceType"] = json!(3);
        assert_eq!(
            coerce_document(&doc(body)),
            Err(DocumentDefect::WrongType("serviceType"))
        );

        assert_eq!(
            coerce_document(&doc(json!(["not", "an", "object"]))),
            Err(DocumentDefect::NotAnObject)
        );
    }

    #[test]
    fn test_bad_ratings_kept_as_unrated() {
        for rating in [json!(0), json!(7), json!(-2), json!("x"), json!(4.5), Value::Null] {
            let mut body = complete_body();
            body["rating"] = rating;
            let record = coerce_document(&doc(body)).unwrap();
            assert_eq!(record.rating, 0);
            assert_eq!(record.valid_rating(), None);
        }

        let mut body = complete_body();
        body.as_object_mut().unwrap().remove("rating");
        assert_eq!(coerce_document(&doc(body)).unwrap().rating, 0);
    }

    #[test]
    fn test_loose_rating_shapes_accepted() {
        let mut body = complete_body();
        body["rating"] = json!("4");
        assert_eq!(coerce_document(&doc(body)).unwrap().rating, 4);

        let mut body = complete_body();
        body["rating"] = json!(3.0);
        assert_eq!(coerce_document(&doc(body)).unwrap().rating, 3);
    }

    #[test]
    fn test_defaults_for_absent_optional_fields() {
        let body = json!({
            "name": "Kiran",
            "consignmentRef": "VRL1",
            "serviceType": "Household",
            "rating": 2,
            "comment": "Late"
        });
        let record = coerce_document(&doc(body)).unwrap();
        assert_eq!(record.pnr, "VRL1");
        assert_eq!(record.user_id, ANONYMOUS_USER);
        assert!(!record.verified);
        assert_eq!(record.created_at, None);
        assert_eq!(record.service_type, ServiceType::Other("Household".to_string()));
    }

    #[test]
    fn test_store_timestamp_wins_over_body() {
        let mut body = complete_body();
        body["createdAt"] = json!("2024-03-01T10:00:00Z");
        let mut stored = doc(body);
        assert_eq!(
            coerce_document(&stored).unwrap().created_at.unwrap().to_rfc3339(),
            "2024-03-01T10:00:00+00:00"
        );

        let now = Utc::now();
        stored.created_at = Some(now);
        assert_eq!(coerce_document(&stored).unwrap().created_at, Some(now));
    }

    #[test]
    fn test_snapshot_skips_rejects_and_keeps_order() {
        let good_a = doc(complete_body());
        let bad = doc(json!({ "rating": 5 }));
        let good_b = doc(complete_body());

        let records = coerce_snapshot(&[good_a.clone(), bad, good_b.clone()]);
        assert_eq!(
            records.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![good_a.id, good_b.id]
        );
    }

    #[test]
    fn test_document_body_coerces_back() {
        let original = coerce_document(&doc(complete_body())).unwrap();
        let stored = StoredDocument {
            id: original.id,
            created_at: original.created_at,
            body: document_body(&original),
        };
        assert_eq!(coerce_document(&stored).unwrap(), original);
    }
}
