use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    #[serde(default, deserialize_with = "lenient_string")]
    pub species_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub com_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sci_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub obs_dt: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub obs_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub loc_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subnational2_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subnational1_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub how_many: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub species_code: String,
    pub common_name: String,
    pub scientific_name: Option<String>,
    pub observed: String,
    pub observed_at: Option<NaiveDateTime>,
    pub obs_id: Option<String>,
    pub location_name: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub how_many: Option<u32>,
    pub observer: Option<String>,
}

impl From<RawObservation> for Observation {
    fn from(raw: RawObservation) -> Self {
        let observed = raw.obs_dt.unwrap_or_default();
        let observed_at = parse_observation_date(&observed);
        Self {
            species_code: raw.species_code.unwrap_or_default(),
            common_name: raw.com_name.unwrap_or_default(),
            scientific_name: non_blank(raw.sci_name),
            observed,
            observed_at,
            obs_id: non_blank(raw.obs_id),
            location_name: raw.loc_name,
            county: place_name(raw.subnational2_name),
            state: place_name(raw.subnational1_name),
            lat: raw.lat,
            lng: raw.lng,
            how_many: raw.how_many,
            observer: raw.user_display_name,
        }
    }
}

impl Observation {
    pub fn locality(&self) -> String {
        match (&self.county, &self.state) {
            (Some(county), Some(state)) => format!("{county}, {state}"),
            (Some(county), None) => county.clone(),
            (None, _) => String::new(),
        }
    }
}

pub fn normalize(raw: Vec<RawObservation>) -> Vec<Observation> {
    raw.into_iter().map(Observation::from).collect()
}

pub fn parse_observation_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn place_name(value: Option<String>) -> Option<String> {
    non_blank(value).filter(|value| value != "undefined")
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}
