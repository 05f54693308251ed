use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::{Coordinates, DaysBack, Region, RegionCode};
use crate::error::SightingsError;
use crate::observation::RawObservation;

pub const DEFAULT_BASE_URL: &str = "https://api.ebird.org/v2";

pub trait EbirdClient: Send + Sync {
    fn notable_near(
        &self,
        location: Coordinates,
        radius_km: u32,
        days_back: DaysBack,
    ) -> Result<Vec<RawObservation>, SightingsError>;
    fn notable_in_region(
        &self,
        region: &RegionCode,
        days_back: DaysBack,
    ) -> Result<Vec<RawObservation>, SightingsError>;
    fn species_at_location(&self, location_id: &str) -> Result<Vec<String>, SightingsError>;
    fn states(&self, country: &RegionCode) -> Result<Vec<Region>, SightingsError>;
    fn counties(&self, parent: &RegionCode) -> Result<Vec<Region>, SightingsError>;
}

#[derive(Clone)]
pub struct EbirdHttpClient {
    client: Client,
    base_url: String,
}

impl EbirdHttpClient {
    pub fn new(base_url: &str) -> Result<Self, SightingsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("birdclub-sightings/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SightingsError::EbirdHttp(err.to_string()))?,
        );

        if let Ok(token) = std::env::var("EBIRD_API_KEY")
            && !token.trim().is_empty()
        {
            headers.insert(
                "X-eBirdApiToken",
                HeaderValue::from_str(token.trim())
                    .map_err(|err| SightingsError::EbirdHttp(err.to_string()))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| SightingsError::EbirdHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_json<T, F>(&self, make_req: F) -> Result<T, SightingsError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        let response = self.send_with_retries(make_req)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "eBird request failed".to_string());
            return Err(SightingsError::EbirdStatus { status, message });
        }
        response
            .json()
            .map_err(|err| SightingsError::EbirdParse(err.to_string()))
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, SightingsError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        debug!(status, attempt, "ebird.retry");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        debug!(error = %err, attempt, "ebird.retry");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(SightingsError::EbirdHttp(err.to_string()));
                }
            }
        }
    }
}

impl EbirdClient for EbirdHttpClient {
    fn notable_near(
        &self,
        location: Coordinates,
        radius_km: u32,
        days_back: DaysBack,
    ) -> Result<Vec<RawObservation>, SightingsError> {
        let url = format!("{}/data/obs/geo/recent/notable", self.base_url);
        let query = [
            ("lat", location.lat.to_string()),
            ("lng", location.lng.to_string()),
            ("dist", radius_km.min(50).to_string()),
            ("back", days_back.to_string()),
            ("detail", "full".to_string()),
        ];
        debug!(lat = location.lat, lng = location.lng, radius_km, "ebird.request notable_near");
        self.get_json(|| self.client.get(&url).query(&query))
    }

    fn notable_in_region(
        &self,
        region: &RegionCode,
        days_back: DaysBack,
    ) -> Result<Vec<RawObservation>, SightingsError> {
        let url = format!("{}/data/obs/{}/recent/notable", self.base_url, region);
        let query = [("back", days_back.to_string()), ("detail", "full".to_string())];
        debug!(region = %region, "ebird.request notable_in_region");
        self.get_json(|| self.client.get(&url).query(&query))
    }

    fn species_at_location(&self, location_id: &str) -> Result<Vec<String>, SightingsError> {
        let url = format!("{}/product/spplist/{}", self.base_url, location_id.trim());
        self.get_json(|| self.client.get(&url))
    }

    fn states(&self, country: &RegionCode) -> Result<Vec<Region>, SightingsError> {
        let url = format!("{}/ref/region/list/subnational1/{}", self.base_url, country);
        self.get_json(|| self.client.get(&url))
    }

    fn counties(&self, parent: &RegionCode) -> Result<Vec<Region>, SightingsError> {
        let url = format!("{}/ref/region/list/subnational2/{}", self.base_url, parent);
        self.get_json(|| self.client.get(&url))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
