use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// A plant as served by the plants API. Read-only to the reminder engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "calendar_day::required")]
    pub planting_date: NaiveDate,
    #[serde(default, deserialize_with = "calendar_day::optional")]
    pub transplant_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Plant {
    /// Whole calendar days from `today` until the transplant day. Negative
    /// once the day has passed, `None` when no transplant is scheduled.
    pub fn days_until_transplant(&self, today: NaiveDate) -> Option<i64> {
        self.transplant_date
            .map(|day| day.signed_duration_since(today).num_days())
    }
}

/// Body of a create or update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlant {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub planting_date: NaiveDate,
    pub transplant_date: Option<NaiveDate>,
    pub image: Option<String>,
}

/// Decodes a plant collection record by record. Entries that do not form a
/// valid plant are logged and left out so one bad record cannot hide the rest.
pub fn decode_plants(entries: Vec<serde_json::Value>) -> Vec<Plant> {
    let total = entries.len();
    let plants: Vec<Plant> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<Plant>(entry) {
            Ok(plant) => Some(plant),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping malformed plant record");
                None
            }
        })
        .collect();
    if plants.len() < total {
        tracing::warn!(kept = plants.len(), total, "plant list partially decoded");
    }
    plants
}

/// Anything that can produce the current plant collection.
pub trait PlantSource: Send + Sync {
    fn plants(&self) -> Result<Vec<Plant>>;
}

impl<F> PlantSource for F
where
    F: Fn() -> Result<Vec<Plant>> + Send + Sync,
{
    fn plants(&self) -> Result<Vec<Plant>> {
        self()
    }
}

mod calendar_day {
    use super::*;

    pub fn required<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn optional<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        // An unreadable transplant day means "not scheduled" rather than a
        // rejected plant.
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.trim().is_empty() => match parse(&raw) {
                Ok(day) => Ok(Some(day)),
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring unreadable transplant date");
                    Ok(None)
                }
            },
            _ => Ok(None),
        }
    }

    /// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; the latter is
    /// reduced to its local calendar day.
    pub fn parse(raw: &str) -> std::result::Result<NaiveDate, String> {
        let trimmed = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(date);
        }
        DateTime::parse_from_rfc3339(trimmed)
            .map(|instant| instant.with_timezone(&Local).date_naive())
            .map_err(|err| format!("unrecognised date `{trimmed}`: {err}"))
    }
}
