use crate::domain::{
    Coordinates, DaysBack, Region, RegionCode, RegionLevel, ScopeKind, ScopeParameters,
};

// only the latest ticket is current
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub generation: u64,
    pub scope: ScopeParameters,
}

#[derive(Debug, Clone)]
pub struct ScopeController {
    scope: ScopeParameters,
    home_state: RegionCode,
    home_location: Option<Coordinates>,
    selected_state: Option<RegionCode>,
    selected_county: Option<RegionCode>,
    county_candidates: Vec<Region>,
    generation: u64,
}

impl ScopeController {
    pub fn new(
        initial: ScopeParameters,
        home_state: RegionCode,
        home_location: Option<Coordinates>,
    ) -> Self {
        let mut controller = Self {
            scope: initial.clone(),
            home_state,
            home_location,
            selected_state: None,
            selected_county: None,
            county_candidates: Vec::new(),
            generation: 0,
        };
        controller.sync_selection(&initial);
        controller
    }

    pub fn scope(&self) -> &ScopeParameters {
        &self.scope
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn selected_state(&self) -> Option<&RegionCode> {
        self.selected_state.as_ref()
    }

    pub fn selected_county(&self) -> Option<&RegionCode> {
        self.selected_county.as_ref()
    }

    pub fn county_candidates(&self) -> &[Region] {
        &self.county_candidates
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
    }

    pub fn select_scope(&mut self, kind: ScopeKind) -> FetchTicket {
        let days_back = self.scope.days_back();
        self.selected_state = None;
        self.selected_county = None;
        self.county_candidates.clear();
        self.scope = match kind {
            ScopeKind::Local => match self.home_location {
                Some(location) => ScopeParameters::Local {
                    location,
                    days_back,
                },
                None => ScopeParameters::Nearby {
                    location: None,
                    days_back,
                },
            },
            ScopeKind::Nearby => ScopeParameters::Nearby {
                location: None,
                days_back,
            },
            ScopeKind::State => ScopeParameters::State {
                region_code: None,
                days_back,
            },
        };
        self.issue()
    }

    pub fn select_state(&mut self, state: RegionCode, counties: &[Region]) -> FetchTicket {
        let days_back = self.scope.days_back();
        self.county_candidates = counties
            .iter()
            .filter(|county| {
                county
                    .code
                    .parse::<RegionCode>()
                    .map(|code| state.contains(&code))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        self.selected_county = None;
        self.selected_state = Some(state.clone());
        self.scope = ScopeParameters::State {
            region_code: Some(state),
            days_back,
        };
        self.issue()
    }

    pub fn select_county(&mut self, county: Option<RegionCode>) -> FetchTicket {
        let days_back = self.scope.days_back();
        let region_code = match &county {
            Some(county) => Some(county.clone()),
            None => self.selected_state.clone(),
        };
        if self.selected_state.is_none() {
            self.selected_state = county
                .as_ref()
                .and_then(RegionCode::state)
                .or_else(|| Some(self.home_state.clone()));
        }
        self.selected_county = county;
        self.scope = ScopeParameters::State {
            region_code,
            days_back,
        };
        self.issue()
    }

    pub fn set_days_back(&mut self, days_back: DaysBack) -> FetchTicket {
        self.scope = self.scope.clone().with_days_back(days_back);
        self.issue()
    }

    pub fn set_scope(&mut self, scope: ScopeParameters) -> FetchTicket {
        self.sync_selection(&scope);
        self.scope = scope;
        self.issue()
    }

    pub fn reissue(&mut self) -> FetchTicket {
        self.issue()
    }

    fn sync_selection(&mut self, scope: &ScopeParameters) {
        self.county_candidates.clear();
        match scope {
            ScopeParameters::State {
                region_code: Some(code),
                ..
            } => {
                self.selected_state = code.state();
                self.selected_county = match code.level() {
                    RegionLevel::County => Some(code.clone()),
                    _ => None,
                };
            }
            _ => {
                self.selected_state = None;
                self.selected_county = None;
            }
        }
    }

    fn issue(&mut self) -> FetchTicket {
        self.generation += 1;
        FetchTicket {
            generation: self.generation,
            scope: self.scope.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counties() -> Vec<Region> {
        vec![
            Region {
                code: "US-VA-179".to_string(),
                name: "Stafford".to_string(),
            },
            Region {
                code: "US-VA-177".to_string(),
                name: "Spotsylvania".to_string(),
            },
            Region {
                code: "US-MD-003".to_string(),
                name: "Anne Arundel".to_string(),
            },
        ]
    }

    fn controller() -> ScopeController {
        ScopeController::new(
            ScopeParameters::Local {
                location: Coordinates::new(38.3, -77.5).unwrap(),
                days_back: DaysBack::clamped(7),
            },
            "US-VA".parse().unwrap(),
            Some(Coordinates::new(38.3, -77.5).unwrap()),
        )
    }

    #[test]
    fn newer_selection_supersedes_older_ticket() {
        let mut scopes = controller();
        let first = scopes.select_scope(ScopeKind::State);
        let second = scopes.select_scope(ScopeKind::Nearby);
        assert!(!scopes.is_current(&first));
        assert!(scopes.is_current(&second));
        assert_eq!(second.scope.days_back().get(), 7);
    }

    #[test]
    fn state_then_county_then_all_counties() {
        let mut scopes = controller();
        scopes.select_scope(ScopeKind::State);

        let md: RegionCode = "US-MD".parse().unwrap();
        let ticket = scopes.select_state(md.clone(), &counties());
        assert_eq!(scopes.county_candidates().len(), 1);
        assert_eq!(
            ticket.scope,
            ScopeParameters::State {
                region_code: Some(md.clone()),
                days_back: DaysBack::clamped(7),
            }
        );

        let va: RegionCode = "US-VA".parse().unwrap();
        scopes.select_state(va.clone(), &counties());
        assert_eq!(scopes.county_candidates().len(), 2);

        let stafford: RegionCode = "US-VA-179".parse().unwrap();
        let ticket = scopes.select_county(Some(stafford.clone()));
        assert_eq!(scopes.selected_county(), Some(&stafford));
        assert_eq!(
            ticket.scope,
            ScopeParameters::State {
                region_code: Some(stafford),
                days_back: DaysBack::clamped(7),
            }
        );

        let ticket = scopes.select_county(None);
        assert_eq!(
            ticket.scope,
            ScopeParameters::State {
                region_code: Some(va),
                days_back: DaysBack::clamped(7),
            }
        );
    }

    #[test]
    fn selecting_scope_resets_region() {
        let mut scopes = controller();
        scopes.select_state("US-VA".parse().unwrap(), &counties());
        scopes.select_county(Some("US-VA-179".parse().unwrap()));

        let ticket = scopes.select_scope(ScopeKind::State);
        assert_eq!(scopes.selected_state(), None);
        assert_eq!(scopes.selected_county(), None);
        assert!(scopes.county_candidates().is_empty());
        assert_eq!(
            ticket.scope,
            ScopeParameters::State {
                region_code: None,
                days_back: DaysBack::clamped(7),
            }
        );
    }

    #[test]
    fn set_scope_tracks_county_selection() {
        let mut scopes = controller();
        scopes.set_scope(ScopeParameters::State {
            region_code: Some("US-VA-179".parse().unwrap()),
            days_back: DaysBack::default(),
        });
        assert_eq!(scopes.selected_state().map(RegionCode::as_str), Some("US-VA"));
        assert_eq!(
            scopes.selected_county().map(RegionCode::as_str),
            Some("US-VA-179")
        );
    }
}
