use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db::{FoodEntry, FoodType, Owner};

#[derive(Debug, Deserialize)]
pub struct CreateFoodEntry {
    pub description: String,
    #[serde(deserialize_with = "iso8601::deserialize")]
    pub datetime: OffsetDateTime,
    #[serde(rename = "type")]
    pub kind: FoodType,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub city: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FoodEntryOut {
    pub id: i64,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub datetime: OffsetDateTime,
    #[serde(rename = "type")]
    pub kind: FoodType,
    pub user: Owner,
}

impl From<FoodEntry> for FoodEntryOut {
    fn from(e: FoodEntry) -> Self {
        Self {
            id: e.id,
            description: e.description,
            datetime: e.datetime,
            kind: e.kind,
            user: e.user,
        }
    }
}

/// Accepts RFC 3339 or a naive `YYYY-MM-DDTHH:MM:SS[.fff]`, read as UTC.
pub(crate) mod iso8601 {
    use serde::{de, Deserialize, Deserializer};
    use time::{
        format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
        PrimitiveDateTime,
    };

    pub fn deserialize<'de, D>(d: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid ISO 8601 datetime: {raw:?}")))
    }

    pub fn parse(raw: &str) -> Option<OffsetDateTime> {
        if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Some(dt);
        }
        let naive = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
        );
        PrimitiveDateTime::parse(raw, naive)
            .ok()
            .map(PrimitiveDateTime::assume_utc)
    }
}
