use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::{SpeciesAggregate, aggregate};
use crate::cache::{CacheKey, RegionCache};
use crate::domain::{Coordinates, DaysBack, Region, RegionCode, ScopeKind, ScopeParameters};
use crate::ebird::EbirdClient;
use crate::error::SightingsError;
use crate::fetcher::{Geolocator, ObservationFetcher};
use crate::observation::Observation;
use crate::rarity::RarityClassifier;
use crate::scope::{FetchTicket, ScopeController};

#[derive(Debug)]
pub struct FetchReport {
    pub generation: u64,
    pub applied: bool,
    pub species: usize,
    pub error: Option<SightingsError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeSummary {
    pub scope: ScopeParameters,
    pub selected_state: Option<RegionCode>,
    pub selected_county: Option<RegionCode>,
    pub county_candidates: Vec<Region>,
}

struct SessionState {
    controller: ScopeController,
    observations: Arc<Vec<Observation>>,
    aggregated_kind: ScopeKind,
    aggregates: Arc<Vec<SpeciesAggregate>>,
    rarity_generation: u64,
    list_generation: u64,
    last_error: Option<String>,
}

pub struct Session<E: EbirdClient, G: Geolocator> {
    fetcher: ObservationFetcher<E, G>,
    cache: RegionCache,
    classifier: RarityClassifier,
    state: Mutex<SessionState>,
}

impl<E: EbirdClient, G: Geolocator> Session<E, G> {
    pub fn new(
        fetcher: ObservationFetcher<E, G>,
        cache: RegionCache,
        initial: ScopeParameters,
        home_location: Option<Coordinates>,
    ) -> Self {
        let classifier = RarityClassifier::new(cache.clone());
        classifier.prime();
        let kind = initial.kind();
        let controller = ScopeController::new(initial, fetcher.home_state().clone(), home_location);
        Self {
            fetcher,
            cache,
            classifier,
            state: Mutex::new(SessionState {
                controller,
                observations: Arc::new(Vec::new()),
                aggregated_kind: kind,
                aggregates: Arc::new(Vec::new()),
                rarity_generation: 0,
                list_generation: 0,
                last_error: None,
            }),
        }
    }

    pub fn fetcher(&self) -> &ObservationFetcher<E, G> {
        &self.fetcher
    }

    pub fn cache(&self) -> &RegionCache {
        &self.cache
    }

    pub fn classifier(&self) -> &RarityClassifier {
        &self.classifier
    }

    pub fn aggregates(&self) -> Arc<Vec<SpeciesAggregate>> {
        let mut state = self.lock();
        let (generation, rarity) = self.classifier.snapshot();
        if generation != state.rarity_generation {
            debug!(generation, "rare list changed; re-aggregating");
            state.aggregates = Arc::new(aggregate(&state.observations, &rarity, state.aggregated_kind));
            state.rarity_generation = generation;
        }
        Arc::clone(&state.aggregates)
    }

    pub fn scope(&self) -> ScopeParameters {
        self.lock().controller.scope().clone()
    }

    pub fn scope_summary(&self) -> ScopeSummary {
        let state = self.lock();
        ScopeSummary {
            scope: state.controller.scope().clone(),
            selected_state: state.controller.selected_state().cloned(),
            selected_county: state.controller.selected_county().cloned(),
            county_candidates: state.controller.county_candidates().to_vec(),
        }
    }

    pub fn is_rare(&self, scientific_name: &str) -> bool {
        self.classifier.is_rare(scientific_name)
    }

    pub fn list_generation(&self) -> u64 {
        self.lock().list_generation
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn set_scope(&self, scope: ScopeParameters) -> FetchReport {
        let ticket = self.lock().controller.set_scope(scope);
        self.run(ticket)
    }

    pub fn select_scope(&self, kind: ScopeKind) -> FetchReport {
        let ticket = self.lock().controller.select_scope(kind);
        self.run(ticket)
    }

    pub fn select_state(&self, state: RegionCode) -> FetchReport {
        let counties = self
            .cache
            .get_cached(CacheKey::Counties)
            .and_then(|value| value.regions().cloned())
            .unwrap_or_default();
        let ticket = self.lock().controller.select_state(state, &counties);
        self.run(ticket)
    }

    pub fn select_county(&self, county: Option<RegionCode>) -> FetchReport {
        let ticket = self.lock().controller.select_county(county);
        self.run(ticket)
    }

    pub fn set_days_back(&self, days_back: DaysBack) -> FetchReport {
        let ticket = self.lock().controller.set_days_back(days_back);
        self.run(ticket)
    }

    pub fn refresh(&self) -> FetchReport {
        let ticket = self.lock().controller.reissue();
        self.run(ticket)
    }

    pub fn states(&self) -> Result<Arc<Vec<Region>>, SightingsError> {
        self.cache.states()
    }

    pub fn counties(&self) -> Result<Arc<Vec<Region>>, SightingsError> {
        self.cache.counties()
    }

    pub fn species_at_location(&self, location_id: &str) -> Result<Vec<String>, SightingsError> {
        self.fetcher.species_at_location(location_id)
    }

    fn run(&self, ticket: FetchTicket) -> FetchReport {
        let outcome = self.fetcher.fetch(&ticket.scope);

        let mut state = self.lock();
        if !state.controller.is_current(&ticket) {
            info!(
                generation = ticket.generation,
                current = state.controller.generation(),
                "discarding result for superseded scope"
            );
            return FetchReport {
                generation: ticket.generation,
                applied: false,
                species: 0,
                error: outcome.error,
            };
        }

        let (rarity_generation, rarity) = self.classifier.snapshot();
        let kind = ticket.scope.kind();
        let aggregates = aggregate(&outcome.observations, &rarity, kind);
        let species = aggregates.len();

        state.observations = Arc::new(outcome.observations);
        state.aggregated_kind = kind;
        state.aggregates = Arc::new(aggregates);
        state.rarity_generation = rarity_generation;
        state.list_generation += 1;
        state.last_error = outcome.error.as_ref().map(|err| err.to_string());
        drop(state);

        if outcome.error.is_none() {
            self.classifier.prime();
        }

        FetchReport {
            generation: ticket.generation,
            applied: true,
            species,
            error: outcome.error,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
