use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use birdclub_sightings::cache::{CacheKey, HttpReferenceSource, ReferenceSource, RegionCache};
use birdclub_sightings::config::{ConfigLoader, ResolvedConfig};
use birdclub_sightings::domain::{Coordinates, DaysBack, RegionCode, ScopeParameters};
use birdclub_sightings::ebird::EbirdHttpClient;
use birdclub_sightings::error::SightingsError;
use birdclub_sightings::fetcher::{Geolocator, ObservationFetcher};
use birdclub_sightings::output::{JsonOutput, RarityResult, SightingsPage};
use birdclub_sightings::pager::Pager;
use birdclub_sightings::rarelist::{EmptyRareList, RareListHttpClient};
use birdclub_sightings::session::Session;

#[derive(Parser)]
#[command(name = "sightings")]
#[command(about = "Notable bird sightings for the club, grouped by species")]
#[command(version)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    /// Batches of species to show
    #[arg(long, global = true, default_value_t = 1)]
    pages: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Notable sightings around a point (defaults to the club location)")]
    Local(LocalArgs),
    #[command(about = "Notable sightings around this device")]
    Nearby(DaysArgs),
    #[command(about = "Notable sightings for a state or county")]
    State(StateArgs),
    #[command(about = "List states or counties")]
    Regions(RegionsArgs),
    #[command(about = "Check a scientific name against the rare list")]
    Rare(RareArgs),
    #[command(about = "Species codes recorded at a hotspot")]
    Species(SpeciesArgs),
}

#[derive(Args)]
struct DaysArgs {
    #[arg(long)]
    days: Option<DaysBack>,
}

#[derive(Args)]
struct LocalArgs {
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,
    #[arg(long)]
    days: Option<DaysBack>,
}

#[derive(Args)]
struct StateArgs {
    /// State or county code; the home state when omitted
    #[arg(long)]
    region: Option<RegionCode>,
    #[arg(long)]
    days: Option<DaysBack>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RegionKind {
    States,
    Counties,
}

#[derive(Args)]
struct RegionsArgs {
    kind: RegionKind,
    /// Only counties of this state
    #[arg(long)]
    state: Option<RegionCode>,
}

#[derive(Args)]
struct RareArgs {
    scientific_name: String,
}

#[derive(Args)]
struct SpeciesArgs {
    location_id: String,
}

struct ConfiguredLocation(Option<Coordinates>);

impl Geolocator for ConfiguredLocation {
    fn locate(&self) -> Result<Coordinates, SightingsError> {
        self.0.ok_or_else(|| {
            SightingsError::GeolocationUnavailable("no home_location in config".to_string())
        })
    }
}

type CliSession = Session<EbirdHttpClient, ConfiguredLocation>;

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SightingsError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SightingsError) -> u8 {
    match error {
        SightingsError::InvalidRegionCode(_)
        | SightingsError::InvalidCoordinates(_)
        | SightingsError::InvalidDaysBack(_)
        | SightingsError::MissingConfig(_)
        | SightingsError::ConfigRead(_)
        | SightingsError::ConfigParse(_) => 2,
        err if err.is_upstream() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let session = build_session(&config)?;

    let result = match cli.command {
        Command::Local(args) => {
            let location = match (args.lat, args.lng) {
                (Some(lat), Some(lng)) => Coordinates::new(lat, lng)?,
                _ => config.home_location.ok_or_else(|| {
                    SightingsError::InvalidCoordinates(
                        "pass --lat/--lng or set home_location in config".to_string(),
                    )
                })?,
            };
            let scope = ScopeParameters::Local {
                location,
                days_back: args.days.unwrap_or(config.days_back),
            };
            show_sightings(&session, &config, scope, cli.pages)
        }
        Command::Nearby(args) => {
            let scope = ScopeParameters::Nearby {
                location: None,
                days_back: args.days.unwrap_or(config.days_back),
            };
            show_sightings(&session, &config, scope, cli.pages)
        }
        Command::State(args) => {
            let scope = ScopeParameters::State {
                region_code: args.region,
                days_back: args.days.unwrap_or(config.days_back),
            };
            show_sightings(&session, &config, scope, cli.pages)
        }
        Command::Regions(args) => show_regions(&session, args),
        Command::Rare(args) => {
            session.cache().read(CacheKey::RareSpecies)?;
            JsonOutput::print_rarity(&RarityResult {
                scientific_name: &args.scientific_name,
                is_rare: session.is_rare(&args.scientific_name),
            })
            .into_diagnostic()
        }
        Command::Species(args) => {
            let codes = session.species_at_location(&args.location_id)?;
            JsonOutput::print_species_codes(&codes).into_diagnostic()
        }
    };

    session.cache().wait_for_refreshes();
    result
}

fn build_session(config: &ResolvedConfig) -> miette::Result<CliSession> {
    let ebird = EbirdHttpClient::new(&config.ebird_base_url)?;
    let country = config.home_state.country();
    let source: Arc<dyn ReferenceSource> = match &config.rare_list_url {
        Some(url) => Arc::new(HttpReferenceSource::new(
            ebird.clone(),
            RareListHttpClient::new(url)?,
            country,
        )),
        None => Arc::new(HttpReferenceSource::new(ebird.clone(), EmptyRareList, country)),
    };
    let cache = RegionCache::new(source);
    let fetcher = ObservationFetcher::new(
        ebird,
        ConfiguredLocation(config.home_location),
        config.home_state.clone(),
        config.radius_km,
    );
    let initial = ScopeParameters::State {
        region_code: None,
        days_back: config.days_back,
    };
    Ok(Session::new(fetcher, cache, initial, config.home_location))
}

fn show_sightings(
    session: &CliSession,
    config: &ResolvedConfig,
    scope: ScopeParameters,
    pages: usize,
) -> miette::Result<()> {
    let report = session.set_scope(scope);
    // one-shot run: let the rare list arrive before printing
    session.cache().wait_for_refreshes();
    let aggregates = session.aggregates();

    let mut pager = Pager::new(config.page_size, config.page_increment);
    pager.reset_if_changed(session.list_generation());
    for _ in 1..pages.max(1) {
        pager.load_more();
    }

    let scope = session.scope();
    JsonOutput::print_page(&SightingsPage {
        scope: &scope,
        total_species: aggregates.len(),
        has_more: pager.has_more(aggregates.len()),
        error: report.error.as_ref().map(|err| err.to_string()),
        species: pager.take(&aggregates),
    })
    .into_diagnostic()?;

    match report.error {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn show_regions(session: &CliSession, args: RegionsArgs) -> miette::Result<()> {
    match args.kind {
        RegionKind::States => {
            let states = session.states()?;
            JsonOutput::print_regions(&states).into_diagnostic()
        }
        RegionKind::Counties => {
            let counties = session.counties()?;
            let Some(state) = args.state else {
                return JsonOutput::print_regions(&counties).into_diagnostic();
            };
            let filtered = session.cache().counties_in_state(&state);
            JsonOutput::print_regions(&filtered).into_diagnostic()
        }
    }
}
