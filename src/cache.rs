use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::domain::{Region, RegionCode};
use crate::ebird::EbirdClient;
use crate::error::SightingsError;
use crate::rarelist::{RareListClient, RareSpeciesEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    RareSpecies,
    States,
    Counties,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::RareSpecies => write!(f, "rare-species"),
            CacheKey::States => write!(f, "states"),
            CacheKey::Counties => write!(f, "counties"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    RareSpecies(Arc<Vec<RareSpeciesEntry>>),
    Regions(Arc<Vec<Region>>),
}

impl CachedValue {
    pub fn rare_species(&self) -> Option<&Arc<Vec<RareSpeciesEntry>>> {
        match self {
            CachedValue::RareSpecies(entries) => Some(entries),
            CachedValue::Regions(_) => None,
        }
    }

    pub fn regions(&self) -> Option<&Arc<Vec<Region>>> {
        match self {
            CachedValue::Regions(regions) => Some(regions),
            CachedValue::RareSpecies(_) => None,
        }
    }
}

pub trait ReferenceSource: Send + Sync {
    fn load(&self, key: CacheKey) -> Result<CachedValue, SightingsError>;
}

pub struct HttpReferenceSource<E: EbirdClient, R: RareListClient> {
    ebird: E,
    rare_list: R,
    country: RegionCode,
}

impl<E: EbirdClient, R: RareListClient> HttpReferenceSource<E, R> {
    pub fn new(ebird: E, rare_list: R, country: RegionCode) -> Self {
        Self {
            ebird,
            rare_list,
            country,
        }
    }
}

impl<E: EbirdClient, R: RareListClient> ReferenceSource for HttpReferenceSource<E, R> {
    fn load(&self, key: CacheKey) -> Result<CachedValue, SightingsError> {
        match key {
            CacheKey::RareSpecies => Ok(CachedValue::RareSpecies(Arc::new(self.rare_list.fetch()?))),
            CacheKey::States => Ok(CachedValue::Regions(Arc::new(
                self.ebird.states(&self.country)?,
            ))),
            CacheKey::Counties => Ok(CachedValue::Regions(Arc::new(
                self.ebird.counties(&self.country)?,
            ))),
        }
    }
}

struct Entry {
    value: CachedValue,
    generation: u64,
    // load sequence number; a load that started earlier never replaces it
    started: u64,
}

struct Inner {
    source: Arc<dyn ReferenceSource>,
    entries: Mutex<HashMap<CacheKey, Entry>>,
    refreshing: Mutex<HashSet<CacheKey>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    loads: AtomicU64,
}

#[derive(Clone)]
pub struct RegionCache {
    inner: Arc<Inner>,
}

impl RegionCache {
    pub fn new(source: Arc<dyn ReferenceSource>) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                entries: Mutex::new(HashMap::new()),
                refreshing: Mutex::new(HashSet::new()),
                pending: Mutex::new(Vec::new()),
                loads: AtomicU64::new(0),
            }),
        }
    }

    pub fn get_cached(&self, key: CacheKey) -> Option<CachedValue> {
        self.entries().get(&key).map(|entry| entry.value.clone())
    }

    pub fn generation(&self, key: CacheKey) -> u64 {
        self.entries()
            .get(&key)
            .map(|entry| entry.generation)
            .unwrap_or(0)
    }

    pub fn refresh(&self, key: CacheKey) -> Result<CachedValue, SightingsError> {
        self.inner.refresh(key)
    }

    pub fn read(&self, key: CacheKey) -> Result<CachedValue, SightingsError> {
        if let Some(value) = self.get_cached(key) {
            debug!(key = %key, "cache.hit");
            self.revalidate(key);
            return Ok(value);
        }
        debug!(key = %key, "cache.miss");
        self.refresh(key)
    }

    pub fn revalidate(&self, key: CacheKey) {
        {
            let mut refreshing = lock(&self.inner.refreshing);
            if !refreshing.insert(key) {
                return;
            }
        }
        let inner = Arc::clone(&self.inner);
        let handle = thread::spawn(move || {
            if let Err(err) = inner.refresh(key) {
                warn!(key = %key, error = %err, "background refresh failed; keeping cached value");
            }
            lock(&inner.refreshing).remove(&key);
        });
        let mut pending = lock(&self.inner.pending);
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    pub fn wait_for_refreshes(&self) {
        let handles = std::mem::take(&mut *lock(&self.inner.pending));
        for handle in handles {
            if handle.join().is_err() {
                warn!("background refresh panicked");
            }
        }
    }

    pub fn states(&self) -> Result<Arc<Vec<Region>>, SightingsError> {
        self.regions(CacheKey::States)
    }

    pub fn counties(&self) -> Result<Arc<Vec<Region>>, SightingsError> {
        self.regions(CacheKey::Counties)
    }

    pub fn counties_in_state(&self, state: &RegionCode) -> Vec<Region> {
        let prefix = format!("{}-", state.as_str());
        self.get_cached(CacheKey::Counties)
            .and_then(|value| value.regions().cloned())
            .map(|counties| {
                counties
                    .iter()
                    .filter(|county| county.code.starts_with(&prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn regions(&self, key: CacheKey) -> Result<Arc<Vec<Region>>, SightingsError> {
        self.read(key)?
            .regions()
            .cloned()
            .ok_or_else(|| SightingsError::CacheMiss(key.to_string()))
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        lock(&self.inner.entries)
    }
}

impl Inner {
    fn refresh(&self, key: CacheKey) -> Result<CachedValue, SightingsError> {
        let started = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        let value = self.source.load(key)?;
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get(&key)
            && entry.started > started
        {
            debug!(key = %key, "cache.superseded");
            return Ok(entry.value.clone());
        }
        let generation = entries.get(&key).map(|entry| entry.generation).unwrap_or(0) + 1;
        entries.insert(
            key,
            Entry {
                value: value.clone(),
                generation,
                started,
            },
        );
        debug!(key = %key, generation, "cache.refreshed");
        Ok(value)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;

    use assert_matches::assert_matches;

    use super::*;

    #[derive(Default)]
    struct FlakySource {
        loads: AtomicUsize,
        failing: AtomicBool,
    }

    impl ReferenceSource for FlakySource {
        fn load(&self, key: CacheKey) -> Result<CachedValue, SightingsError> {
            let count = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.load(Ordering::SeqCst) {
                return Err(SightingsError::RareListHttp("timed out".to_string()));
            }
            match key {
                CacheKey::RareSpecies => Ok(CachedValue::RareSpecies(Arc::new(vec![
                    RareSpeciesEntry {
                        scientific_name: format!("Species {count}"),
                        common_name: None,
                    },
                ]))),
                CacheKey::States | CacheKey::Counties => {
                    Ok(CachedValue::Regions(Arc::new(vec![
                        Region {
                            code: "US-VA-179".to_string(),
                            name: "Stafford".to_string(),
                        },
                        Region {
                            code: "US-MD-003".to_string(),
                            name: "Anne Arundel".to_string(),
                        },
                    ])))
                }
            }
        }
    }

    fn first_name(value: &CachedValue) -> String {
        value.rare_species().unwrap()[0].scientific_name.clone()
    }

    #[test]
    fn first_read_blocks_then_serves_stale() {
        let source = Arc::new(FlakySource::default());
        let cache = RegionCache::new(source.clone());

        let first = cache.read(CacheKey::RareSpecies).unwrap();
        assert_eq!(first_name(&first), "Species 1");
        assert_eq!(cache.generation(CacheKey::RareSpecies), 1);

        let second = cache.read(CacheKey::RareSpecies).unwrap();
        assert_eq!(first_name(&second), "Species 1");

        cache.wait_for_refreshes();
        let refreshed = cache.get_cached(CacheKey::RareSpecies).unwrap();
        assert_eq!(first_name(&refreshed), "Species 2");
        assert_eq!(cache.generation(CacheKey::RareSpecies), 2);
    }

    #[test]
    fn failed_refresh_keeps_last_good_value() {
        let source = Arc::new(FlakySource::default());
        let cache = RegionCache::new(source.clone());
        cache.refresh(CacheKey::RareSpecies).unwrap();

        source.failing.store(true, Ordering::SeqCst);
        let served = cache.read(CacheKey::RareSpecies).unwrap();
        cache.wait_for_refreshes();

        assert_eq!(first_name(&served), "Species 1");
        let kept = cache.get_cached(CacheKey::RareSpecies).unwrap();
        assert_eq!(first_name(&kept), "Species 1");
        assert_eq!(cache.generation(CacheKey::RareSpecies), 1);
    }

    #[test]
    fn first_use_failure_is_an_error() {
        let source = Arc::new(FlakySource::default());
        source.failing.store(true, Ordering::SeqCst);
        let cache = RegionCache::new(source);
        assert_matches!(
            cache.read(CacheKey::States),
            Err(SightingsError::RareListHttp(_))
        );
        assert!(cache.get_cached(CacheKey::States).is_none());
    }

    #[test]
    fn counties_filtered_by_state_without_loading() {
        let source = Arc::new(FlakySource::default());
        let cache = RegionCache::new(source.clone());
        let state: RegionCode = "US-VA".parse().unwrap();
        assert!(cache.counties_in_state(&state).is_empty());
        assert_eq!(source.loads.load(Ordering::SeqCst), 0);

        cache.refresh(CacheKey::Counties).unwrap();
        let counties = cache.counties_in_state(&state);
        assert_eq!(counties.len(), 1);
        assert_eq!(counties[0].name, "Stafford");
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finished_refresh_handles_are_dropped() {
        let source = Arc::new(FlakySource::default());
        let cache = RegionCache::new(source);
        cache.refresh(CacheKey::States).unwrap();

        for _ in 0..50 {
            cache.read(CacheKey::States).unwrap();
            while lock(&cache.inner.pending)
                .iter()
                .any(|handle| !handle.is_finished())
            {
                thread::yield_now();
            }
        }

        assert_eq!(lock(&cache.inner.pending).len(), 1);
        cache.wait_for_refreshes();
        assert!(lock(&cache.inner.pending).is_empty());
    }

    struct SlowFirstLoad {
        loads: AtomicUsize,
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl ReferenceSource for SlowFirstLoad {
        fn load(&self, _key: CacheKey) -> Result<CachedValue, SightingsError> {
            let count = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            if count == 1 {
                self.started.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            Ok(CachedValue::RareSpecies(Arc::new(vec![RareSpeciesEntry {
                scientific_name: format!("Species {count}"),
                common_name: None,
            }])))
        }
    }

    #[test]
    fn older_load_does_not_replace_newer_value() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let cache = RegionCache::new(Arc::new(SlowFirstLoad {
            loads: AtomicUsize::new(0),
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        }));

        cache.revalidate(CacheKey::RareSpecies);
        started_rx.recv().unwrap();

        let newer = cache.read(CacheKey::RareSpecies).unwrap();
        assert_eq!(first_name(&newer), "Species 2");

        release_tx.send(()).unwrap();
        cache.wait_for_refreshes();

        let kept = cache.get_cached(CacheKey::RareSpecies).unwrap();
        assert_eq!(first_name(&kept), "Species 2");
        assert_eq!(cache.generation(CacheKey::RareSpecies), 1);
    }
}
