use asphalt_survey::area::{GroundTruth, ValidationError};
use asphalt_survey::config::{Config, ConfigError};
use asphalt_survey::detection::{DetectionClient, DetectionError, DetectionResult, DetectionSession};
use asphalt_survey::geocode::{GeocodeClient, GeocodeError};
use asphalt_survey::geometry::{BboxSelector, GeoPoint};
use asphalt_survey::report::{ExportKind, MeasurementReport};
use asphalt_survey::settings::{MapSettings, SettingsError, SettingsStore};
use asphalt_survey::tracking::{
    ChannelLocationSource, FixSink, HttpFixSink, LogSink, TrackedFix, TrackingError,
    TrackingService,
};
use asphalt_survey::units::UnitSystem;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "asphalt-survey")]
#[command(about = "Detect paved areas and estimate paving material")]
struct Cli {
    /// YAML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a box dragged between two corners
    Bbox(CornerArgs),
    /// Detect paved areas inside a box and report measurements
    Detect {
        #[command(flatten)]
        corners: CornerArgs,
        #[command(flatten)]
        overrides: MeasureArgs,
        /// Save the raw detection result as JSON
        #[arg(long)]
        save: Option<PathBuf>,
        #[command(flatten)]
        exports: ExportArgs,
    },
    /// Report measurements for a saved detection result
    Measure {
        /// Detection result JSON
        input: PathBuf,
        #[command(flatten)]
        overrides: MeasureArgs,
        #[command(flatten)]
        exports: ExportArgs,
    },
    /// Search for an address
    Geocode { query: String },
    /// Show or change stored map settings
    Settings {
        /// Switch to this unit system, converting stored assumptions
        #[arg(long)]
        units: Option<UnitSystem>,
    },
    /// Replay recorded fixes through the proximity tracker
    Track {
        /// JSON array of fixes
        input: PathBuf,
        #[arg(long)]
        employee_id: Option<String>,
    },
    /// Validate a configuration file
    ValidateConfig { path: PathBuf },
}

#[derive(Args)]
struct CornerArgs {
    /// First corner as "lat,lon"
    #[arg(long, allow_hyphen_values = true)]
    from: GeoPoint,
    /// Opposite corner as "lat,lon"
    #[arg(long, allow_hyphen_values = true)]
    to: GeoPoint,
}

#[derive(Args)]
struct MeasureArgs {
    #[arg(long)]
    units: Option<UnitSystem>,
    /// Layer thickness in cm (metric) or inches (imperial)
    #[arg(long)]
    thickness: Option<f64>,
    /// Density in t/m³ (metric) or lb/ft³ (imperial)
    #[arg(long)]
    density: Option<f64>,
    /// Smallest polygon counted, in m² (metric) or ft² (imperial)
    #[arg(long)]
    min_area: Option<f64>,
    /// Lowest detection confidence counted, 0 to 1
    #[arg(long)]
    confidence: Option<f64>,
    /// Outline simplification tolerance; 0 disables it
    #[arg(long)]
    smoothing: Option<f64>,
}

/// Export targets. A flag given without a path writes a dated file in the
/// current directory.
#[derive(Args)]
struct ExportArgs {
    /// Write every detected polygon as GeoJSON
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    geojson: Option<Option<PathBuf>>,
    /// Write outlines of counted polygons as GeoJSON
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    outlines: Option<Option<PathBuf>>,
    /// Write counted polygons and totals as CSV
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    csv: Option<Option<PathBuf>>,
    /// Score counted outlines against ground truth GeoJSON
    #[arg(long, value_name = "PATH")]
    truth: Option<PathBuf>,
}

impl MeasureArgs {
    fn apply(&self, settings: &mut MapSettings) {
        if let Some(units) = self.units {
            settings.switch_units(units);
        }
        if let Some(thickness) = self.thickness {
            settings.thickness = thickness;
        }
        if let Some(density) = self.density {
            settings.density = density;
        }
        if let Some(min_area) = self.min_area {
            settings.min_area_input = min_area;
        }
        if let Some(confidence) = self.confidence {
            settings.confidence_threshold = confidence;
        }
        if let Some(smoothing) = self.smoothing {
            settings.smoothing_tolerance = smoothing;
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Settings(#[from] SettingsError),
    #[error("{}", detection_message(.0))]
    Detection(#[from] DetectionError),
    #[error("{0}")]
    Geocode(#[from] GeocodeError),
    #[error("{0}")]
    Tracking(#[from] TrackingError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Selection has no area; drag across the map first")]
    EmptySelection,
}

fn detection_message(err: &DetectionError) -> String {
    err.user_message().unwrap_or_else(|| err.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::ValidateConfig { path } => validate_config(&path),
        command => match load_config(cli.config.as_deref()) {
            Ok(config) => run(command, &config).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, CliError> {
    match path {
        Some(path) => Ok(Config::from_file(path)?),
        None => Ok(Config::default()),
    }
}

async fn run(command: Commands, config: &Config) -> Result<(), CliError> {
    match command {
        Commands::Bbox(corners) => bbox(&corners),
        Commands::Detect {
            corners,
            overrides,
            save,
            exports,
        } => detect(config, &corners, &overrides, save, &exports).await,
        Commands::Measure {
            input,
            overrides,
            exports,
        } => measure(config, &input, &overrides, &exports),
        Commands::Geocode { query } => geocode(config, &query).await,
        Commands::Settings { units } => settings(config, units),
        Commands::Track { input, employee_id } => track(config, &input, employee_id).await,
        Commands::ValidateConfig { path } => validate_config(&path),
    }
}

fn select(corners: &CornerArgs) -> Result<asphalt_survey::geometry::BoundingBox, CliError> {
    let mut selector = BboxSelector::new();
    selector.begin(corners.from);
    selector.finish(corners.to).ok_or(CliError::EmptySelection)
}

fn bbox(corners: &CornerArgs) -> Result<(), CliError> {
    let bbox = select(corners)?;
    println!(
        "south={} west={} north={} east={}",
        bbox.south, bbox.west, bbox.north, bbox.east
    );
    println!("~{:.3} km²", bbox.approx_area_km2());
    Ok(())
}

async fn detect(
    config: &Config,
    corners: &CornerArgs,
    overrides: &MeasureArgs,
    save: Option<PathBuf>,
    exports: &ExportArgs,
) -> Result<(), CliError> {
    let bbox = select(corners)?;
    let store = SettingsStore::from_config(&config.settings);
    let mut settings = store.map_settings()?;
    overrides.apply(&mut settings);

    let mut options = config.detection.options();
    options.include_parking = settings.include_parking;

    let session = DetectionSession::new(Arc::new(DetectionClient::new(&config.detection)));
    let result = session.detect(bbox, &options).await?;

    if let Some(path) = save {
        fs::write(&path, serde_json::to_string_pretty(result.as_ref())?)?;
        log::info!("Saved detection result to {}", path.display());
    }

    let report = MeasurementReport::build(&result, &settings);
    println!("{}", report);
    export(&report, exports)
}

fn measure(
    config: &Config,
    input: &Path,
    overrides: &MeasureArgs,
    exports: &ExportArgs,
) -> Result<(), CliError> {
    let content = fs::read_to_string(input)?;
    let result: DetectionResult = serde_json::from_str(&content)?;

    let store = SettingsStore::from_config(&config.settings);
    let mut settings = store.map_settings()?;
    overrides.apply(&mut settings);

    let report = MeasurementReport::build(&result, &settings);
    println!("{}", report);
    export(&report, exports)
}

fn export(report: &MeasurementReport, exports: &ExportArgs) -> Result<(), CliError> {
    let targets = [
        (ExportKind::Detections, &exports.geojson),
        (ExportKind::Outlines, &exports.outlines),
        (ExportKind::Csv, &exports.csv),
    ];
    for (kind, target) in targets {
        let Some(path) = target else {
            continue;
        };
        let path = path
            .clone()
            .unwrap_or_else(|| PathBuf::from(report.file_name(kind)));
        let (label, contents) = match kind {
            ExportKind::Detections => ("GeoJSON", serde_json::to_string_pretty(&report.to_geojson())?),
            ExportKind::Outlines => (
                "Outlines",
                serde_json::to_string_pretty(&report.to_outlines_geojson())?,
            ),
            ExportKind::Csv => ("CSV", report.to_csv()),
        };
        fs::write(&path, contents)?;
        println!("{} written to {}", label, path.display());
    }

    if let Some(path) = &exports.truth {
        let truth = GroundTruth::from_geojson(&fs::read_to_string(path)?)?;
        println!("{}", report.validate(&truth));
    }
    Ok(())
}

async fn geocode(config: &Config, query: &str) -> Result<(), CliError> {
    let client = GeocodeClient::new(&config.geocoding);
    let results = client.search(query).await?;
    if results.is_empty() {
        println!("No matches");
    }
    for result in results {
        println!("{}  ({}, {})", result.display_name, result.lat, result.lon);
    }
    Ok(())
}

fn settings(config: &Config, units: Option<UnitSystem>) -> Result<(), CliError> {
    let store = SettingsStore::from_config(&config.settings);
    let mut settings = store.map_settings()?;
    if let Some(units) = units {
        settings.switch_units(units);
        store.save_map_settings(&settings)?;
    }

    println!("units:                {}", settings.units.name());
    println!("thickness:            {}", settings.units.thickness_label(settings.thickness));
    println!("density:              {}", settings.units.density_label(settings.density));
    println!("min area:             {} ({:.2} m²)", settings.min_area_input, settings.min_area_m2());
    println!("confidence threshold: {}", settings.confidence_threshold);
    println!("smoothing tolerance:  {}", settings.smoothing_tolerance);
    println!("include parking:      {}", settings.include_parking);
    Ok(())
}

async fn track(config: &Config, input: &Path, employee_id: Option<String>) -> Result<(), CliError> {
    let fixes: Vec<TrackedFix> = serde_json::from_str(&fs::read_to_string(input)?)?;

    let store = SettingsStore::from_config(&config.settings);
    let mut settings = store.tracking_settings()?;
    settings.enabled = true;
    if let Some(employee_id) = employee_id {
        settings.employee_id = employee_id;
    }

    let sink: Arc<dyn FixSink> = match &config.tracking.sink_url {
        Some(url) => Arc::new(
            HttpFixSink::new(url.clone(), config.detection.user_agent.clone())
                .with_timeout(config.tracking.sink_timeout),
        ),
        None => Arc::new(LogSink),
    };

    let mut service = TrackingService::new(settings, &config.tracking, sink);
    let (tx, mut source) = ChannelLocationSource::new(64);
    service.start(&mut source)?;

    let offered = fixes.len();
    for fix in fixes {
        if tx.send(fix).await.is_err() {
            break;
        }
    }
    drop(tx);
    service.join().await;

    println!("Replayed {} fixes", offered);
    Ok(())
}

fn validate_config(path: &Path) -> Result<(), CliError> {
    let config = Config::from_file(path)?;
    println!("Configuration is valid");
    println!("  detection: {}", config.detection.base_url);
    println!(
        "  geocoding: {} (fallback {})",
        config.geocoding.proxy_url, config.geocoding.fallback_url
    );
    match &config.tracking.sink_url {
        Some(url) => println!(
            "  tracking:  {} (flush every {}, timeout {})",
            url,
            humantime::format_duration(config.tracking.flush_interval),
            humantime::format_duration(config.tracking.sink_timeout)
        ),
        None => println!("  tracking:  log only"),
    }
    println!("  settings:  {}", config.settings.dir.display());
    Ok(())
}
