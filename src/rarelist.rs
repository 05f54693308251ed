use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::SightingsError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RareSpeciesEntry {
    #[serde(rename = "Scientific Name", default, deserialize_with = "text_or_empty")]
    pub scientific_name: String,
    #[serde(
        rename = "Common Name",
        default,
        deserialize_with = "text_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub common_name: Option<String>,
}

pub trait RareListClient: Send + Sync {
    fn fetch(&self) -> Result<Vec<RareSpeciesEntry>, SightingsError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyRareList;

impl RareListClient for EmptyRareList {
    fn fetch(&self) -> Result<Vec<RareSpeciesEntry>, SightingsError> {
        Ok(Vec::new())
    }
}

#[derive(Clone)]
pub struct RareListHttpClient {
    client: Client,
    url: String,
}

impl RareListHttpClient {
    pub fn new(url: &str) -> Result<Self, SightingsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("birdclub-sightings/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SightingsError::RareListHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| SightingsError::RareListHttp(err.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl RareListClient for RareListHttpClient {
    fn fetch(&self) -> Result<Vec<RareSpeciesEntry>, SightingsError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|err| SightingsError::RareListHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "rare species list request failed".to_string());
            return Err(SightingsError::RareListStatus { status, message });
        }
        let rows: Vec<RareSpeciesEntry> = response
            .json()
            .map_err(|err| SightingsError::RareListHttp(err.to_string()))?;
        Ok(named_rows(rows))
    }
}

fn named_rows(rows: Vec<RareSpeciesEntry>) -> Vec<RareSpeciesEntry> {
    let total = rows.len();
    let named: Vec<RareSpeciesEntry> = rows
        .into_iter()
        .filter(|row| !row.scientific_name.trim().is_empty())
        .collect();
    if named.len() < total {
        debug!(skipped = total - named.len(), "rare list rows without a scientific name");
    }
    named
}

fn text_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        _ => None,
    })
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_or_none(deserializer)?.unwrap_or_default())
}
