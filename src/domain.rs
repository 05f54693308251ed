use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SightingsError;

static REGION_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{2}(-[A-Z0-9]{1,3}(-[A-Z0-9]{1,4})?)?$").expect("region code pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionLevel {
    Country,
    State,
    County,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionCode(String);

impl RegionCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn level(&self) -> RegionLevel {
        match self.0.matches('-').count() {
            0 => RegionLevel::Country,
            1 => RegionLevel::State,
            _ => RegionLevel::County,
        }
    }

    pub fn state(&self) -> Option<RegionCode> {
        match self.level() {
            RegionLevel::Country => None,
            RegionLevel::State => Some(self.clone()),
            RegionLevel::County => self
                .0
                .rsplit_once('-')
                .map(|(state, _)| RegionCode(state.to_string())),
        }
    }

    pub fn country(&self) -> RegionCode {
        let country = self.0.split('-').next().unwrap_or(&self.0);
        RegionCode(country.to_string())
    }

    pub fn contains(&self, other: &RegionCode) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'-'
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RegionCode {
    type Err = SightingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !REGION_CODE.is_match(&normalized) {
            return Err(SightingsError::InvalidRegionCode(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for RegionCode {
    type Error = SightingsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RegionCode> for String {
    fn from(code: RegionCode) -> Self {
        code.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, SightingsError> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        if !valid {
            return Err(SightingsError::InvalidCoordinates(format!("{lat},{lng}")));
        }
        Ok(Self { lat, lng })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DaysBack(u8);

impl DaysBack {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 30;

    pub fn clamped(days: u32) -> Self {
        Self(days.clamp(Self::MIN as u32, Self::MAX as u32) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for DaysBack {
    fn default() -> Self {
        Self(14)
    }
}

impl fmt::Display for DaysBack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for DaysBack {
    type Error = SightingsError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        if !(Self::MIN as u32..=Self::MAX as u32).contains(&days) {
            return Err(SightingsError::InvalidDaysBack(days.to_string()));
        }
        Ok(Self(days as u8))
    }
}

impl FromStr for DaysBack {
    type Err = SightingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let days: u32 = value
            .trim()
            .parse()
            .map_err(|_| SightingsError::InvalidDaysBack(value.to_string()))?;
        Self::try_from(days)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Local,
    Nearby,
    State,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Local => write!(f, "local"),
            ScopeKind::Nearby => write!(f, "nearby"),
            ScopeKind::State => write!(f, "state"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScopeParameters {
    Local {
        location: Coordinates,
        days_back: DaysBack,
    },
    Nearby {
        location: Option<Coordinates>,
        days_back: DaysBack,
    },
    State {
        region_code: Option<RegionCode>,
        days_back: DaysBack,
    },
}

impl ScopeParameters {
    pub fn kind(&self) -> ScopeKind {
        match self {
            ScopeParameters::Local { .. } => ScopeKind::Local,
            ScopeParameters::Nearby { .. } => ScopeKind::Nearby,
            ScopeParameters::State { .. } => ScopeKind::State,
        }
    }

    pub fn days_back(&self) -> DaysBack {
        match self {
            ScopeParameters::Local { days_back, .. }
            | ScopeParameters::Nearby { days_back, .. }
            | ScopeParameters::State { days_back, .. } => *days_back,
        }
    }

    pub fn with_days_back(mut self, days: DaysBack) -> Self {
        match &mut self {
            ScopeParameters::Local { days_back, .. }
            | ScopeParameters::Nearby { days_back, .. }
            | ScopeParameters::State { days_back, .. } => *days_back = days,
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub code: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_region_code_levels() {
        let state: RegionCode = "us-va".parse().unwrap();
        assert_eq!(state.as_str(), "US-VA");
        assert_eq!(state.level(), RegionLevel::State);

        let county: RegionCode = "US-VA-179".parse().unwrap();
        assert_eq!(county.level(), RegionLevel::County);
        assert_eq!(county.state(), Some(state.clone()));
        assert_eq!(county.country().as_str(), "US");
        assert!(state.contains(&county));
        assert!(!county.contains(&state));
    }

    #[test]
    fn contains_requires_separator() {
        let state: RegionCode = "US-V".parse().unwrap();
        let other: RegionCode = "US-VA".parse().unwrap();
        assert!(!state.contains(&other));
    }

    #[test]
    fn parse_region_code_invalid() {
        let err = "Virginia".parse::<RegionCode>().unwrap_err();
        assert_matches!(err, SightingsError::InvalidRegionCode(_));
    }

    #[test]
    fn coordinates_out_of_range() {
        assert_matches!(
            Coordinates::new(91.0, 0.0),
            Err(SightingsError::InvalidCoordinates(_))
        );
        assert!(Coordinates::new(38.3, -77.46).is_ok());
    }

    #[test]
    fn days_back_bounds() {
        assert_eq!(DaysBack::clamped(0).get(), 1);
        assert_eq!(DaysBack::clamped(90).get(), 30);
        assert_eq!("7".parse::<DaysBack>().unwrap().get(), 7);
        assert_matches!(
            "31".parse::<DaysBack>(),
            Err(SightingsError::InvalidDaysBack(_))
        );
    }

    #[test]
    fn scope_days_back_override() {
        let scope = ScopeParameters::State {
            region_code: None,
            days_back: DaysBack::default(),
        };
        let scope = scope.with_days_back(DaysBack::clamped(3));
        assert_eq!(scope.days_back().get(), 3);
        assert_eq!(scope.kind(), ScopeKind::State);
    }
}
