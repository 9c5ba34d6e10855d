//! Cuenca CLI - watershed delineation and basin morphometry

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cuenca_algorithms::delineation::{delineate, DelineationParams, DemHandle};
use cuenca_algorithms::hydrology::{
    flow_direction_scaled, priority_flood, ChannelThreshold, FlowModel, FlowModelParams, PriorityFloodParams,
};
use cuenca_algorithms::morphometry::MorphometricReport;
use cuenca_core::io::{read_geotiff, write_geotiff};
use cuenca_core::{Coordinate, ElevationGrid, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cuenca")]
#[command(author, version, about = "Watershed delineation and basin morphometry", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a DEM file
    Info {
        /// Input DEM file
        input: PathBuf,
    },
    /// Flow modelling grids
    Hydrology {
        #[command(subcommand)]
        algorithm: HydrologyCommands,
    },
    /// Delineate the watershed of one outlet and compute its morphometry
    Delineate(DelineateArgs),
}

#[derive(Subcommand)]
enum HydrologyCommands {
    /// Fill depressions (Priority-Flood with epsilon gradient)
    Fill {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Minimum rise between a cell and its spill neighbor
        #[arg(long, default_value = "0.00001")]
        epsilon: f64,
    },
    /// D8 flow direction of the filled DEM
    FlowDirection {
        /// Input DEM file
        input: PathBuf,
        /// Output file (codes 1-8 from east counter-clockwise, 0 = no flow)
        output: PathBuf,
    },
    /// Flow accumulation of the filled DEM
    FlowAccumulation {
        /// Input DEM file
        input: PathBuf,
        /// Output file (upstream cell count, including the cell itself)
        output: PathBuf,
    },
}

#[derive(Args)]
struct DelineateArgs {
    /// Input DEM file
    input: PathBuf,
    /// Outlet latitude (WGS84)
    #[arg(long, requires = "lon", conflicts_with_all = ["x", "y"], allow_hyphen_values = true)]
    lat: Option<f64>,
    /// Outlet longitude (WGS84)
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
    /// Outlet easting in the DEM's reference system
    #[arg(short, long, requires = "y", allow_hyphen_values = true)]
    x: Option<f64>,
    /// Outlet northing in the DEM's reference system
    #[arg(short, long, requires = "x", allow_hyphen_values = true)]
    y: Option<f64>,
    /// JSON file with delineation parameters
    #[arg(long)]
    config: Option<PathBuf>,
    /// Snap search radius in cells
    #[arg(long)]
    radius: Option<usize>,
    /// Channel threshold as contributing area (km²)
    #[arg(long, conflicts_with = "threshold_cells")]
    threshold_km2: Option<f64>,
    /// Channel threshold as contributing cells
    #[arg(long)]
    threshold_cells: Option<f64>,
    /// Abort after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Write watershed, streams and points as JSON features
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Write the morphometric report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
    /// Write the watershed mask as GeoTIFF
    #[arg(long)]
    mask: Option<PathBuf>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn read_dem(path: &Path) -> Result<ElevationGrid> {
    let pb = spinner("Reading DEM...")?;
    let raster: Raster<f64> = read_geotiff(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let dem = ElevationGrid::from_raster(raster).context("Invalid DEM")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", dem.cols(), dem.rows());
    Ok(dem)
}

fn write_raster<T: cuenca_core::RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...")?;
    write_geotiff(raster, path).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

impl DelineateArgs {
    fn coordinate(&self) -> Result<Coordinate> {
        match (self.lat, self.lon, self.x, self.y) {
            (Some(lat), Some(lon), _, _) => Ok(Coordinate::Geographic { lat, lon }),
            (_, _, Some(x), Some(y)) => Ok(Coordinate::Projected { x, y }),
            _ => anyhow::bail!("An outlet is required: pass --lat/--lon or --x/--y"),
        }
    }

    /// Config file first, then command-line overrides
    fn params(&self) -> Result<DelineationParams> {
        let mut params = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&text).with_context(|| format!("Invalid parameters in {}", path.display()))?
            }
            None => DelineationParams::default(),
        };
        if let Some(radius) = self.radius {
            params.snap.radius = radius;
        }
        if let Some(km2) = self.threshold_km2 {
            params.streams.threshold = ChannelThreshold::AreaKm2(km2);
        }
        if let Some(cells) = self.threshold_cells {
            params.streams.threshold = ChannelThreshold::Cells(cells);
        }
        if self.timeout_ms.is_some() {
            params.timeout_ms = self.timeout_ms;
        }
        Ok(params)
    }
}

fn print_report(report: &MorphometricReport) {
    println!("\nMorphometry:");
    for (name, value) in report.named_values() {
        println!("  {:<24} {}", name, value);
    }

    println!("\nConcentration time:");
    for e in &report.concentration.estimates {
        match e.hours {
            Some(h) => println!("  {:<24} {:>8.3} h", e.method.name(), h),
            None => println!("  {:<24} {:>8}", e.method.name(), "-"),
        }
    }

    println!("\nHypsometric classes:");
    for class in &report.hypsometric_table.classes {
        println!(
            "  {:>3}  {:>8.1} - {:>8.1} m  {:>10.4} km²  {:>6.2}%",
            class.number, class.lower, class.upper, class.area_km2, class.percent
        );
    }
}

fn run_delineate(args: DelineateArgs) -> Result<()> {
    let coordinate = args.coordinate()?;
    let params = args.params()?;
    let dem = read_dem(&args.input)?;

    let pb = spinner("Building flow model...")?;
    let start = Instant::now();
    let handle = DemHandle::new(dem, &params.flow).context("Failed to build flow model")?;
    pb.finish_and_clear();
    info!("Flow model ready in {:.2?}", start.elapsed());

    let start = Instant::now();
    let result = delineate(&handle, &coordinate, &params).context("Delineation failed")?;
    let elapsed = start.elapsed();

    let (row, col) = result.outlet.cell;
    println!("Outlet: cell ({}, {}), {:.0} upstream cells", row, col, result.outlet.accumulation);
    if result.outlet.moved() {
        println!("  Snapped {:.1} m from the requested point", result.outlet.snap_distance_m);
    }
    println!("Watershed: {} cells, {:.4} km²", result.mask.len(), result.report.shape.area_km2);
    println!("Streams: {} segments, max order {}", result.streams.len(), result.streams.max_order());
    println!("  Processing time: {:.2?}", elapsed);
    print_report(&result.report);

    if let Some(path) = &args.output {
        write_json(&result.to_features(), path)?;
        println!("\nFeatures saved to: {}", path.display());
    }
    if let Some(path) = &args.report {
        write_json(&result.report, path)?;
        println!("Report saved to: {}", path.display());
    }
    if let Some(path) = &args.mask {
        let raster = result.mask.to_raster(handle.dem().raster())?;
        write_raster(&raster, path)?;
        println!("Mask saved to: {}", path.display());
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => {
            let dem = read_dem(&input)?;
            let raster = dem.raster();
            let (rows, cols) = dem.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {:.3} x {:.3} m", dem.cell_width(), dem.cell_height());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            match dem.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None if dem.is_geographic() => println!("CRS: none (assumed geographic)"),
                None => println!("CRS: none (assumed projected)"),
            }
            println!("Fingerprint: {}", dem.id());
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                dem.valid_cells(),
                100.0 * dem.valid_cells() as f64 / raster.len() as f64
            );
        }

        Commands::Hydrology { algorithm } => match algorithm {
            HydrologyCommands::Fill { input, output, epsilon } => {
                let dem = read_dem(&input)?;
                let start = Instant::now();
                let result = priority_flood(dem.raster(), PriorityFloodParams { epsilon })
                    .context("Failed to fill depressions")?;
                let elapsed = start.elapsed();
                write_raster(&result, &output)?;
                done("Filled DEM", &output, elapsed);
            }

            HydrologyCommands::FlowDirection { input, output } => {
                let dem = read_dem(&input)?;
                let start = Instant::now();
                let filled = priority_flood(dem.raster(), PriorityFloodParams::default())
                    .context("Failed to fill depressions")?;
                let result = flow_direction_scaled(&filled, dem.cell_width(), dem.cell_height())
                    .context("Failed to calculate flow direction")?;
                let elapsed = start.elapsed();
                write_raster(&result, &output)?;
                done("Flow direction", &output, elapsed);
            }

            HydrologyCommands::FlowAccumulation { input, output } => {
                let dem = read_dem(&input)?;
                let start = Instant::now();
                let model = FlowModel::build(&dem, &FlowModelParams::default())
                    .context("Failed to calculate flow accumulation")?;
                let elapsed = start.elapsed();
                write_raster(model.accumulation_grid(), &output)?;
                done("Flow accumulation", &output, elapsed);
            }
        },

        Commands::Delineate(args) => run_delineate(args)?,
    }

    Ok(())
}
