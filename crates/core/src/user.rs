//! User records as served by the directory API, and the draft used to write them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Entity, UserId};

/// A user record (matches the API response shape).
///
/// The client only ever holds a transient, possibly stale page of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profession: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
}

impl Entity for UserRecord {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Create/edit payload.
///
/// `id` may be chosen on create; on update the path identifier always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub profession: String,
    /// Serialized as `yyyy-MM-dd`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<NaiveDate>,
    pub country: String,
    pub city: String,
}

impl UserDraft {
    /// Pin the draft to an existing record's identifier.
    pub fn for_update(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }
}

impl From<&UserRecord> for UserDraft {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: Some(record.id),
            firstname: record.firstname.clone(),
            lastname: record.lastname.clone(),
            email: record.email.clone(),
            profession: record.profession.clone(),
            date_created: Some(record.date_created.date_naive()),
            country: record.country.clone(),
            city: record.city.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

// The API serializes SQL timestamps either as epoch millis or ISO-8601 text.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Millis(ms) => DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}"))),
        RawTimestamp::Text(text) => parse_timestamp(&text).ok_or_else(|| {
            serde::de::Error::custom(format!("unrecognized timestamp format: {text}"))
        }),
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
