use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::ScopeKind;
use crate::observation::Observation;
use crate::rarity::RaritySet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualSighting {
    pub id: Option<String>,
    pub location: Option<String>,
    pub locality: String,
    pub quantity: Option<u32>,
    pub by: Option<String>,
    pub date: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl From<&Observation> for IndividualSighting {
    fn from(obs: &Observation) -> Self {
        Self {
            id: obs.obs_id.clone(),
            location: obs.location_name.clone(),
            locality: obs.locality(),
            quantity: obs.how_many,
            by: obs.observer.clone(),
            date: obs.observed.clone(),
            lat: obs.lat,
            lng: obs.lng,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesAggregate {
    pub id: String,
    pub name: String,
    pub scientific: Option<String>,
    pub is_rare: bool,
    pub locations: String,
    pub most_recent: Option<NaiveDateTime>,
    pub individual_sightings: Vec<IndividualSighting>,
}

pub fn aggregate(
    observations: &[Observation],
    rarity: &RaritySet,
    scope: ScopeKind,
) -> Vec<SpeciesAggregate> {
    if observations.is_empty() {
        return Vec::new();
    }

    let mut aggregates: Vec<SpeciesAggregate> = group_by_species(observations)
        .into_iter()
        .map(|matches| summarize(&matches, rarity, scope))
        .collect();
    // stable: equal names keep encounter order
    aggregates.sort_by(|a, b| a.name.cmp(&b.name));
    aggregates
}

fn group_by_species(observations: &[Observation]) -> Vec<Vec<&Observation>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Observation>> = Vec::new();
    for obs in observations {
        let slot = *index.entry(obs.common_name.as_str()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(obs);
    }
    groups
}

fn summarize(matches: &[&Observation], rarity: &RaritySet, scope: ScopeKind) -> SpeciesAggregate {
    let first = matches[0];
    let is_rare = first
        .scientific_name
        .as_deref()
        .map(|name| rarity.contains(name))
        .unwrap_or(false);

    SpeciesAggregate {
        id: first.species_code.clone(),
        name: first.common_name.clone(),
        scientific: first.scientific_name.clone(),
        is_rare,
        locations: locations(matches, scope),
        most_recent: matches.iter().filter_map(|obs| obs.observed_at).max(),
        individual_sightings: individual_sightings(matches),
    }
}

// state scope: sorted "County, State" joined by "; "
// otherwise: distinct counties in encounter order
fn locations(matches: &[&Observation], scope: ScopeKind) -> String {
    match scope {
        ScopeKind::State => matches
            .iter()
            .filter(|obs| obs.county.is_some())
            .map(|obs| obs.locality())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>()
            .join("; "),
        ScopeKind::Local | ScopeKind::Nearby => {
            let mut seen = HashSet::new();
            matches
                .iter()
                .filter_map(|obs| obs.county.as_deref())
                .filter(|county| seen.insert(*county))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

fn individual_sightings(matches: &[&Observation]) -> Vec<IndividualSighting> {
    let mut seen: HashSet<&str> = HashSet::new();
    matches
        .iter()
        .filter(|obs| match obs.obs_id.as_deref() {
            Some(id) => seen.insert(id),
            None => true,
        })
        .map(|obs| IndividualSighting::from(*obs))
        .collect()
}
