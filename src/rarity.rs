use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::cache::{CacheKey, RegionCache};
use crate::rarelist::RareSpeciesEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaritySet {
    names: HashSet<String>,
}

impl RaritySet {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| fold(name.as_ref()))
            .filter(|name| !name.is_empty())
            .collect();
        Self { names }
    }

    pub fn from_entries(entries: &[RareSpeciesEntry]) -> Self {
        Self::from_names(entries.iter().map(|entry| entry.scientific_name.as_str()))
    }

    pub fn contains(&self, scientific_name: &str) -> bool {
        let folded = fold(scientific_name);
        !folded.is_empty() && self.names.contains(&folded)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Clone)]
pub struct RarityClassifier {
    cache: RegionCache,
    current: Arc<Mutex<(u64, Arc<RaritySet>)>>,
}

impl RarityClassifier {
    pub fn new(cache: RegionCache) -> Self {
        Self {
            cache,
            current: Arc::new(Mutex::new((0, Arc::new(RaritySet::default())))),
        }
    }

    pub fn prime(&self) {
        self.cache.revalidate(CacheKey::RareSpecies);
    }

    pub fn is_rare(&self, scientific_name: &str) -> bool {
        self.snapshot().1.contains(scientific_name)
    }

    pub fn snapshot(&self) -> (u64, Arc<RaritySet>) {
        let generation = self.cache.generation(CacheKey::RareSpecies);
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if current.0 != generation {
            let set = self
                .cache
                .get_cached(CacheKey::RareSpecies)
                .and_then(|value| value.rare_species().map(|entries| RaritySet::from_entries(entries)))
                .unwrap_or_default();
            *current = (generation, Arc::new(set));
        }
        (current.0, Arc::clone(&current.1))
    }
}
