use tracing::{info, warn};

use crate::domain::{Coordinates, RegionCode, ScopeParameters};
use crate::ebird::EbirdClient;
use crate::error::SightingsError;
use crate::observation::{Observation, normalize};

pub trait Geolocator: Send + Sync {
    fn locate(&self) -> Result<Coordinates, SightingsError>;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

impl Geolocator for FixedLocation {
    fn locate(&self) -> Result<Coordinates, SightingsError> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl Geolocator for NoLocation {
    fn locate(&self) -> Result<Coordinates, SightingsError> {
        Err(SightingsError::GeolocationUnavailable(
            "no location source configured".to_string(),
        ))
    }
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub observations: Vec<Observation>,
    pub error: Option<SightingsError>,
}

impl FetchOutcome {
    fn empty() -> Self {
        Self::default()
    }

    fn failed(error: SightingsError) -> Self {
        Self {
            observations: Vec::new(),
            error: Some(error),
        }
    }
}

pub struct ObservationFetcher<E: EbirdClient, G: Geolocator> {
    ebird: E,
    geolocator: G,
    home_state: RegionCode,
    radius_km: u32,
}

impl<E: EbirdClient, G: Geolocator> ObservationFetcher<E, G> {
    pub fn new(ebird: E, geolocator: G, home_state: RegionCode, radius_km: u32) -> Self {
        Self {
            ebird,
            geolocator,
            home_state,
            radius_km,
        }
    }

    pub fn ebird(&self) -> &E {
        &self.ebird
    }

    pub fn home_state(&self) -> &RegionCode {
        &self.home_state
    }

    pub fn fetch(&self, scope: &ScopeParameters) -> FetchOutcome {
        let result = match scope {
            ScopeParameters::Local {
                location,
                days_back,
            } => self.ebird.notable_near(*location, self.radius_km, *days_back),
            ScopeParameters::Nearby {
                location,
                days_back,
            } => {
                let location = match location {
                    Some(location) => *location,
                    None => match self.geolocator.locate() {
                        Ok(location) => location,
                        Err(err) => {
                            info!(error = %err, "nearby scope without a location; no sightings");
                            return FetchOutcome::empty();
                        }
                    },
                };
                self.ebird.notable_near(location, self.radius_km, *days_back)
            }
            ScopeParameters::State {
                region_code,
                days_back,
            } => {
                let region = region_code.as_ref().unwrap_or(&self.home_state);
                self.ebird.notable_in_region(region, *days_back)
            }
        };

        match result {
            Ok(raw) => FetchOutcome {
                observations: normalize(raw),
                error: None,
            },
            Err(err) => {
                warn!(error = %err, scope = %scope.kind(), "observation fetch failed");
                FetchOutcome::failed(err)
            }
        }
    }

    pub fn species_at_location(&self, location_id: &str) -> Result<Vec<String>, SightingsError> {
        self.ebird.species_at_location(location_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::{DaysBack, Region};
    use crate::observation::RawObservation;

    #[derive(Default)]
    struct RecordingEbird {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl EbirdClient for RecordingEbird {
        fn notable_near(
            &self,
            location: Coordinates,
            radius_km: u32,
            days_back: DaysBack,
        ) -> Result<Vec<RawObservation>, SightingsError> {
            self.calls.lock().unwrap().push(format!(
                "near {},{} r={radius_km} back={days_back}",
                location.lat, location.lng
            ));
            if self.fail {
                return Err(SightingsError::EbirdHttp("connection reset".to_string()));
            }
            Ok(vec![RawObservation {
                com_name: Some("Bald Eagle".to_string()),
                ..RawObservation::default()
            }])
        }

        fn notable_in_region(
            &self,
            region: &RegionCode,
            days_back: DaysBack,
        ) -> Result<Vec<RawObservation>, SightingsError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("region {region} back={days_back}"));
            Ok(Vec::new())
        }

        fn species_at_location(&self, _location_id: &str) -> Result<Vec<String>, SightingsError> {
            Ok(vec!["baleag".to_string()])
        }

        fn states(&self, _country: &RegionCode) -> Result<Vec<Region>, SightingsError> {
            Ok(Vec::new())
        }

        fn counties(&self, _parent: &RegionCode) -> Result<Vec<Region>, SightingsError> {
            Ok(Vec::new())
        }
    }

    fn fetcher<G: Geolocator>(ebird: RecordingEbird, geo: G) -> ObservationFetcher<RecordingEbird, G> {
        ObservationFetcher::new(ebird, geo, "US-VA".parse().unwrap(), 25)
    }

    #[test]
    fn state_scope_defaults_to_home_state() {
        let fetcher = fetcher(RecordingEbird::default(), NoLocation);
        let outcome = fetcher.fetch(&ScopeParameters::State {
            region_code: None,
            days_back: DaysBack::clamped(7),
        });
        assert!(outcome.error.is_none());
        assert_eq!(
            fetcher.ebird().calls.lock().unwrap().as_slice(),
            ["region US-VA back=7"]
        );

        fetcher.fetch(&ScopeParameters::State {
            region_code: Some("US-VA-179".parse().unwrap()),
            days_back: DaysBack::clamped(7),
        });
        assert_eq!(
            fetcher.ebird().calls.lock().unwrap().last().unwrap(),
            "region US-VA-179 back=7"
        );
    }

    #[test]
    fn nearby_without_location_is_empty_not_error() {
        let fetcher = fetcher(RecordingEbird::default(), NoLocation);
        let outcome = fetcher.fetch(&ScopeParameters::Nearby {
            location: None,
            days_back: DaysBack::default(),
        });
        assert!(outcome.observations.is_empty());
        assert!(outcome.error.is_none());
        assert!(fetcher.ebird().calls.lock().unwrap().is_empty());
    }

    #[test]
    fn nearby_uses_device_location() {
        let here = Coordinates::new(38.3, -77.5).unwrap();
        let fetcher = fetcher(RecordingEbird::default(), FixedLocation(here));
        let outcome = fetcher.fetch(&ScopeParameters::Nearby {
            location: None,
            days_back: DaysBack::clamped(3),
        });
        assert_eq!(outcome.observations.len(), 1);
        assert_eq!(
            fetcher.ebird().calls.lock().unwrap().as_slice(),
            ["near 38.3,-77.5 r=25 back=3"]
        );
    }

    #[test]
    fn transport_failure_is_reported_with_empty_list() {
        let ebird = RecordingEbird {
            fail: true,
            ..RecordingEbird::default()
        };
        let fetcher = fetcher(ebird, NoLocation);
        let outcome = fetcher.fetch(&ScopeParameters::Local {
            location: Coordinates::new(38.3, -77.5).unwrap(),
            days_back: DaysBack::default(),
        });
        assert!(outcome.observations.is_empty());
        assert_matches!(outcome.error, Some(SightingsError::EbirdHttp(_)));
    }
}
