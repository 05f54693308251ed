use std::io::{self, Write};

use serde::Serialize;

use crate::aggregate::SpeciesAggregate;
use crate::domain::{Region, ScopeParameters};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SightingsPage<'a> {
    pub scope: &'a ScopeParameters,
    pub total_species: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub species: &'a [SpeciesAggregate],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RarityResult<'a> {
    pub scientific_name: &'a str,
    pub is_rare: bool,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_page(page: &SightingsPage<'_>) -> io::Result<()> {
        Self::print_json(page)
    }

    pub fn print_regions(regions: &[Region]) -> io::Result<()> {
        Self::print_json(&regions)
    }

    pub fn print_rarity(result: &RarityResult<'_>) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_species_codes(codes: &[String]) -> io::Result<()> {
        Self::print_json(&codes)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
