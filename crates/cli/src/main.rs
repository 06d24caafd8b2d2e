//! SatClass CLI - classify a region of a GeoTIFF with a remote model

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use satclass_cloud::{
    ClassificationSession, HttpBackend, HttpBackendOptions, Outcome, SessionOptions,
    DEFAULT_BACKEND_URL,
};
use satclass_core::{DrawnShape, GeoBounds, HeadlessMap, ModelName, DEFAULT_OPACITY};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "satclass")]
#[command(author, version, about = "Classify satellite imagery regions", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Classification backend root URL
    #[arg(long, global = true, env = "SATCLASS_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    backend: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value = "120")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available classifier models
    Models,
    /// Upload a GeoTIFF and report its bounds
    Upload {
        /// Input GeoTIFF file
        input: PathBuf,
    },
    /// Classify a region of a GeoTIFF
    Classify {
        /// Local GeoTIFF to upload first
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        file: Option<PathBuf>,
        /// URL of an externally hosted GeoTIFF
        #[arg(long)]
        url: Option<String>,
        /// Known bounds of the URL raster: west,south,east,north
        #[arg(long, requires = "url")]
        bounds: Option<String>,
        /// Model: "XGBoost", "Random Forest", "LightGBM" (or xgboost, random_forest, lightgbm)
        #[arg(short, long, default_value = "XGBoost")]
        model: String,
        /// GeoJSON file with the region of interest (defaults to the full raster)
        #[arg(short, long)]
        roi: Option<PathBuf>,
        /// Overlay opacity
        #[arg(long, default_value_t = DEFAULT_OPACITY)]
        opacity: f64,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn parse_bounds(s: &str) -> Result<GeoBounds> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().with_context(|| format!("Invalid number: {v}")))
        .collect::<Result<Vec<_>>>()?;
    if values.len() != 4 {
        anyhow::bail!("Bounds must be 'west,south,east,north', got: {}", s);
    }
    Ok(GeoBounds::from_backend(&values)?)
}

fn read_roi(path: &Path) -> Result<DrawnShape> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ROI file {}", path.display()))?;
    Ok(DrawnShape::GeoJson(text))
}

fn print_bounds(bounds: &GeoBounds) {
    let ll = bounds.to_lat_lng_bounds();
    println!(
        "Bounds: W {:.6}, S {:.6}, E {:.6}, N {:.6}",
        bounds.west, bounds.south, bounds.east, bounds.north
    );
    println!(
        "  South-west: ({:.6}, {:.6})  North-east: ({:.6}, {:.6})",
        ll.south_west.lat, ll.south_west.lon, ll.north_east.lat, ll.north_east.lon
    );
}

fn http_backend(cli: &Cli) -> Result<Arc<HttpBackend>> {
    let backend = HttpBackend::new(HttpBackendOptions {
        base_url: cli.backend.clone(),
        request_timeout: Duration::from_secs(cli.timeout),
    })
    .context("Failed to create backend client")?;
    Ok(Arc::new(backend))
}

// ─── Main ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match &cli.command {
        Commands::Models => {
            for model in ModelName::ALL {
                println!("{:<14} ({})", model.as_str(), model.ident());
            }
        }

        Commands::Upload { input } => {
            let session = ClassificationSession::new(
                http_backend(&cli)?,
                HeadlessMap::new(),
                SessionOptions {
                    request_timeout: Duration::from_secs(cli.timeout),
                    ..Default::default()
                },
            )?;
            let pb = spinner("Uploading raster...");
            let outcome = session.select_file(input).await;
            pb.finish_and_clear();

            if let Outcome::Applied(selected) = outcome.context("Upload failed")? {
                println!("Key: {}", selected.reference.value());
                if let Some(preview) = &selected.preview_url {
                    println!("Preview: {}", preview);
                }
                if let Some(bounds) = &selected.bounds {
                    print_bounds(bounds);
                }
            }
        }

        Commands::Classify {
            file,
            url,
            bounds,
            model,
            roi,
            opacity,
        } => {
            let map = HeadlessMap::new();
            debug!(tiles = map.tile_url(), "headless map ready");
            let options = SessionOptions {
                request_timeout: Duration::from_secs(cli.timeout),
                overlay_opacity: *opacity,
                auto_classify: false,
                initial_model: model.parse::<ModelName>()?,
            };
            let session = ClassificationSession::new(http_backend(&cli)?, map.clone(), options)?;

            if let Some(path) = file {
                let pb = spinner("Uploading raster...");
                let selected = session.select_file(path).await;
                pb.finish_and_clear();
                selected.context("Upload failed")?;
            } else if let Some(url) = url {
                let known = bounds.as_deref().map(parse_bounds).transpose()?;
                session.select_url(url, known)?;
            }

            if let Some(path) = roi {
                session.draw_complete(read_roi(path)?).await?;
            }
            if let Some(roi) = session.current_roi() {
                info!(drawn = roi.origin() == satclass_core::RoiOrigin::Drawn, "using ROI");
            }

            let pb = spinner(&format!("Classifying with {}...", session.model()));
            let start = Instant::now();
            let outcome = session.classify().await;
            pb.finish_and_clear();

            let result = match outcome.context("Classification failed")? {
                Outcome::Applied(result) => result,
                Outcome::Superseded => anyhow::bail!("Classification was superseded"),
            };

            println!("Result: {}", result.result_url);
            print_bounds(&result.bounds);
            println!("  Processing time: {:.2?}", start.elapsed());
            for overlay in map.overlays() {
                println!("{}", serde_json::to_string_pretty(&overlay)?);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_argument() {
        let b = parse_bounds("30, 10, 32, 12").unwrap();
        assert_eq!(b.to_backend(), [30.0, 10.0, 32.0, 12.0]);
        assert!(parse_bounds("30,10,32").is_err());
        assert!(parse_bounds("30,10,x,12").is_err());
        assert!(parse_bounds("32,10,30,12").is_err());
    }

    #[test]
    fn cli_parses_classify() {
        let cli = Cli::try_parse_from([
            "satclass",
            "classify",
            "--url",
            "https://x/y.tif",
            "--bounds",
            "30,10,32,12",
            "--model",
            "Random Forest",
        ])
        .unwrap();
        match cli.command {
            Commands::Classify { url, model, opacity, .. } => {
                assert_eq!(url.as_deref(), Some("https://x/y.tif"));
                assert_eq!(model, "Random Forest");
                assert_eq!(opacity, 0.7);
            }
            _ => panic!("expected classify"),
        }
    }

    #[test]
    fn classify_needs_a_raster() {
        assert!(Cli::try_parse_from(["satclass", "classify"]).is_err());
        assert!(Cli::try_parse_from([
            "satclass", "classify", "--file", "a.tif", "--url", "https://x/y.tif"
        ])
        .is_err());
    }
}
