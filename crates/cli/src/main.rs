//! histotile CLI - tile features and object detection for microscopy images

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use histotile_algorithms::color::StainChoice;
use histotile_algorithms::detection::{
    DogSuperpixelParams, DogSuperpixelSegmenter, NucleiParams, NucleiWatershedSegmenter,
};
use histotile_algorithms::features::{TileFeature, TileFeatureExtractor, TileFeatureParams};
use histotile_core::io::{read_rgb_tiff, MemoryRegionSource};
use histotile_core::region::TileListener;
use histotile_core::{
    CancellationToken, ImageMetadata, MeasurementList, ObjectKind, PathObject, PhysicalArea,
    PixelCalibration, RegionContext, RegionRequest, RegionSource, RegionStore, RgbImage, Roi,
    StainSet,
};
use histotile_parallel::{run_units, ProcessingMode, RunSummary, TilePlan, UnitOutcome};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "histotile")]
#[command(author, version, about = "Tile features and object detection for microscopy images", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about an image
    Info {
        #[command(flatten)]
        image: ImageArgs,
    },
    /// Coherence or LBP features for tiles centred on each region
    Features {
        #[command(flatten)]
        image: ImageArgs,
        #[command(flatten)]
        regions: RegionArgs,
        #[command(flatten)]
        run: RunArgs,
        /// Feature: coherence or lbp
        #[arg(short, long)]
        feature: Option<String>,
        /// Channels: od, h-dab, h-e, h-dab-8bit, h-e-8bit, rgb, gray
        #[arg(short, long)]
        stains: Option<String>,
        /// Mask pixels outside the inscribed circle
        #[arg(long)]
        circular: bool,
        /// Add basic channel statistics
        #[arg(long)]
        stats: bool,
    },
    /// Split regions into DoG superpixel tiles
    Superpixels {
        #[command(flatten)]
        image: ImageArgs,
        #[command(flatten)]
        regions: RegionArgs,
        #[command(flatten)]
        run: RunArgs,
        /// Edge of the processing tiles in full-resolution pixels
        #[arg(long)]
        tile_size: Option<f64>,
    },
    /// Detect nuclei with the LoG watershed
    Nuclei {
        #[command(flatten)]
        image: ImageArgs,
        #[command(flatten)]
        regions: RegionArgs,
        #[command(flatten)]
        run: RunArgs,
        /// Minimum mean detection channel value of a nucleus
        #[arg(short, long)]
        threshold: Option<f64>,
        /// Minimum nucleus area, in µm² when calibrated, pixels otherwise
        #[arg(long)]
        min_area: Option<f64>,
        /// Do not split touching nuclei by shape
        #[arg(long)]
        no_split: bool,
    },
}

#[derive(Args)]
struct ImageArgs {
    /// Input RGB TIFF
    input: PathBuf,
    /// Pixel size in µm, overriding the TIFF resolution tags
    #[arg(long)]
    pixel_size: Option<f64>,
    /// Objective magnification of the full-resolution image
    #[arg(long)]
    magnification: Option<f64>,
    /// Stain vectors of the image: h-dab or h-e
    #[arg(long)]
    image_stains: Option<String>,
}

#[derive(Args)]
struct RegionArgs {
    /// Rectangular region "x,y,w,h" in full-resolution pixels (repeatable)
    #[arg(long = "roi")]
    rois: Vec<String>,
    /// Polygon region "x y;x y;..." (repeatable)
    #[arg(long = "polygon")]
    polygons: Vec<String>,
}

#[derive(Args)]
struct RunArgs {
    /// Parameters as JSON; flags override individual fields
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Worker threads (1 = sequential, default = all cores)
    #[arg(long)]
    threads: Option<usize>,
    /// Output JSON file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

// ─── Output ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ObjectRecord<'a> {
    /// Index of the parent region on the command line
    parent: usize,
    kind: ObjectKind,
    /// Exterior ring as [x, y] pairs in full-resolution pixels
    polygon: Vec<[f64; 2]>,
    measurements: &'a MeasurementList,
}

impl<'a> ObjectRecord<'a> {
    fn new(parent: usize, object: &'a PathObject) -> Self {
        Self {
            parent,
            kind: object.kind(),
            polygon: object
                .roi()
                .to_polygon()
                .exterior()
                .coords()
                .map(|c| [c.x, c.y])
                .collect(),
            measurements: object.measurements(),
        }
    }
}

// ─── Progress ───────────────────────────────────────────────────────────

/// Shows the number of tiles read on a unit progress bar
struct ProgressListener {
    bar: ProgressBar,
    tiles: AtomicUsize,
}

impl TileListener for ProgressListener {
    fn tile_available(&self, _request: &RegionRequest, _tile: &RgbImage) {
        let tiles = self.tiles.fetch_add(1, Ordering::Relaxed) + 1;
        self.bar.set_message(format!("{} tiles read", tiles));
    }
}

fn progress_bar(units: usize) -> ProgressBar {
    let pb = ProgressBar::new(units as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} units {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn open_image(args: &ImageArgs) -> Result<MemoryRegionSource> {
    let pb = spinner("Reading image...");
    let mut pixels = read_rgb_tiff(&args.input).context("Failed to read image")?;
    pb.finish_and_clear();

    if let Some(size) = args.pixel_size {
        let calibration = PixelCalibration::microns(size, size).context("Invalid --pixel-size")?;
        pixels.set_calibration(calibration);
    }
    let stains = match args.image_stains.as_deref() {
        Some(name) => Some(parse_image_stains(name)?),
        None => None,
    };
    let metadata = ImageMetadata::new(pixels.width(), pixels.height())?
        .with_calibration(*pixels.calibration())
        .with_magnification(args.magnification)
        .with_stains(stains);

    let id = args.input.display().to_string();
    let source = MemoryRegionSource::new(id, pixels)?.with_metadata(metadata)?;
    info!("Input: {} x {}", source.metadata().width, source.metadata().height);
    Ok(source)
}

fn load_params<P: DeserializeOwned + Default>(path: Option<&Path>) -> Result<P> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config {}", path.display()))?;
            serde_json::from_reader(file)
                .with_context(|| format!("Failed to parse config {}", path.display()))
        }
        None => Ok(P::default()),
    }
}

fn parse_rectangle(s: &str) -> Result<Roi> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid region: {}", s))?;
    if parts.len() != 4 {
        anyhow::bail!("Region must be 'x,y,w,h', got: {}", s);
    }
    Roi::rectangle(parts[0], parts[1], parts[2], parts[3])
        .with_context(|| format!("Invalid region: {}", s))
}

fn parse_polygon(s: &str) -> Result<Roi> {
    let points = s
        .split(';')
        .filter(|p| !p.trim().is_empty())
        .map(|pair| {
            let coords: Vec<&str> = pair.split_whitespace().collect();
            if coords.len() != 2 {
                anyhow::bail!("Polygon point must be 'x y', got: {}", pair);
            }
            let x: f64 = coords[0].parse().context("Invalid x")?;
            let y: f64 = coords[1].parse().context("Invalid y")?;
            Ok((x, y))
        })
        .collect::<Result<Vec<_>>>()?;
    Roi::from_points(&points).with_context(|| format!("Invalid polygon: {}", s))
}

/// Parent regions from the command line; the whole image when none are given
fn parse_regions(args: &RegionArgs, metadata: &ImageMetadata, whole_image: bool) -> Result<Vec<Roi>> {
    let mut rois = args
        .rois
        .iter()
        .map(|s| parse_rectangle(s))
        .collect::<Result<Vec<_>>>()?;
    for polygon in &args.polygons {
        rois.push(parse_polygon(polygon)?);
    }
    if rois.is_empty() {
        if !whole_image {
            anyhow::bail!("No regions given. Use --roi or --polygon.");
        }
        rois.push(Roi::rectangle(0.0, 0.0, metadata.width as f64, metadata.height as f64)?);
    }
    Ok(rois)
}

fn parse_stain_choice(s: &str) -> Result<StainChoice> {
    match s.to_lowercase().as_str() {
        "od" | "optical-density" => Ok(StainChoice::OpticalDensity),
        "h-dab" | "hdab" => Ok(StainChoice::HDab),
        "h-e" | "he" => Ok(StainChoice::HEosin),
        "h-dab-8bit" => Ok(StainChoice::HDab8Bit),
        "h-e-8bit" => Ok(StainChoice::HEosin8Bit),
        "rgb" => Ok(StainChoice::Rgb),
        "gray" | "grayscale" => Ok(StainChoice::Grayscale),
        _ => anyhow::bail!(
            "Unknown stains: {}. Use od, h-dab, h-e, h-dab-8bit, h-e-8bit, rgb, gray.",
            s
        ),
    }
}

fn parse_image_stains(s: &str) -> Result<StainSet> {
    let stains = match s.to_lowercase().as_str() {
        "h-dab" | "hdab" => StainSet::h_dab()?,
        "h-e" | "he" => StainSet::h_e()?,
        _ => anyhow::bail!("Unknown image stains: {}. Use h-dab or h-e.", s),
    };
    Ok(stains)
}

fn parse_feature(s: &str) -> Result<TileFeature> {
    match s.to_lowercase().as_str() {
        "coherence" => Ok(TileFeature::Coherence),
        "lbp" => Ok(TileFeature::LocalBinaryPatterns),
        _ => anyhow::bail!("Unknown feature: {}. Use coherence or lbp.", s),
    }
}

/// Run one unit per item with a progress bar fed by a tile listener
fn run_with_progress<I, T, F>(
    source: &MemoryRegionSource,
    items: &[I],
    threads: Option<usize>,
    unit: F,
) -> Vec<UnitOutcome<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&RegionContext<'_>, &I) -> histotile_core::Result<Option<T>> + Sync + Send,
{
    let store = RegionStore::default();
    let cancel = CancellationToken::new();
    let bar = progress_bar(items.len());
    let listener: Arc<dyn TileListener> = Arc::new(ProgressListener {
        bar: bar.clone(),
        tiles: AtomicUsize::new(0),
    });
    let ctx = RegionContext::new(source, &cancel)
        .with_store(&store)
        .with_listener(&listener);

    let mode = ProcessingMode::from_threads(threads);
    let outcomes = run_units(mode, items, &cancel, |item| {
        let result = unit(&ctx, item);
        bar.inc(1);
        result
    });
    bar.finish_and_clear();

    let summary = RunSummary::from_outcomes(&outcomes);
    if summary.failed > 0 {
        warn!("{}", summary);
    } else {
        info!("{}", summary);
    }
    outcomes
}

fn write_records(records: &[ObjectRecord<'_>], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let pb = spinner("Writing output...");
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), records)
                .context("Failed to write output")?;
            pb.finish_and_clear();
            println!("{} objects saved to: {}", records.len(), path.display());
        }
        None => {
            let json = serde_json::to_string_pretty(records).context("Failed to encode output")?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn done(name: &str, count: usize, elapsed: std::time::Duration) {
    info!("{}: {} objects in {:.2?}", name, count, elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { image } => {
            let source = open_image(&image)?;
            let meta = source.metadata();

            println!("File: {}", image.input.display());
            println!("Dimensions: {} x {} ({} pixels)", meta.width, meta.height, meta.width * meta.height);
            match (
                meta.calibration.pixel_width_microns(),
                meta.calibration.pixel_height_microns(),
            ) {
                (Some(w), Some(h)) => println!("Pixel size: {:.4} x {:.4} µm", w, h),
                _ => println!("Pixel size: uncalibrated"),
            }
            match meta.magnification {
                Some(m) => println!("Magnification: {}x", m),
                None => println!("Magnification: unknown"),
            }
            if let Some(stains) = &meta.stains {
                println!("Stains: {}", stains.name());
            }
        }

        // ── Features ─────────────────────────────────────────────────
        Commands::Features {
            image,
            regions,
            run,
            feature,
            stains,
            circular,
            stats,
        } => {
            let mut params: TileFeatureParams = load_params(run.config.as_deref())?;
            if let Some(feature) = feature {
                params.feature = parse_feature(&feature)?;
            }
            if let Some(stains) = stains {
                params.stain_choice = parse_stain_choice(&stains)?;
            }
            if circular {
                params.circular = true;
            }
            if stats {
                params.include_stats = Some(true);
            }
            let extractor = TileFeatureExtractor::new(params).context("Invalid feature parameters")?;

            let source = open_image(&image)?;
            let rois = parse_regions(&regions, source.metadata(), false)?;
            let start = Instant::now();
            let outcomes = run_with_progress(&source, &rois, run.threads, |ctx, roi| {
                extractor.measure(ctx, roi)
            });

            let objects: Vec<(usize, PathObject)> = outcomes
                .into_iter()
                .zip(rois)
                .enumerate()
                .filter_map(|(i, (outcome, roi))| {
                    outcome.completed().map(|mut measurements| {
                        measurements.close();
                        (i, PathObject::with_measurements(ObjectKind::Annotation, roi, measurements))
                    })
                })
                .collect();
            done("Features", objects.len(), start.elapsed());

            let records: Vec<ObjectRecord<'_>> =
                objects.iter().map(|(i, o)| ObjectRecord::new(*i, o)).collect();
            write_records(&records, run.output.as_deref())?;
        }

        // ── Superpixels ──────────────────────────────────────────────
        Commands::Superpixels {
            image,
            regions,
            run,
            tile_size,
        } => {
            let params: DogSuperpixelParams = load_params(run.config.as_deref())?;
            let segmenter = DogSuperpixelSegmenter::new(params).context("Invalid superpixel parameters")?;
            let plan = match tile_size {
                Some(size) => TilePlan::new(size, 0.0).context("Invalid --tile-size")?,
                None => TilePlan::default(),
            };

            let source = open_image(&image)?;
            let rois = parse_regions(&regions, source.metadata(), true)?;
            let units: Vec<(usize, &Roi, geo::Rect<f64>)> = rois
                .iter()
                .enumerate()
                .flat_map(|(i, roi)| {
                    plan.tiles_for_roi(roi)
                        .into_iter()
                        .map(move |tile| (i, roi, tile.bounds))
                })
                .collect();
            info!("{} regions split into {} tiles", rois.len(), units.len());

            let start = Instant::now();
            let outcomes = run_with_progress(&source, &units, run.threads, |ctx, (_, roi, bounds)| {
                segmenter.segment_within(ctx, roi, *bounds)
            });

            let objects: Vec<(usize, PathObject)> = outcomes
                .into_iter()
                .zip(&units)
                .filter_map(|(outcome, (i, _, _))| outcome.completed().map(|tiles| (*i, tiles)))
                .flat_map(|(i, tiles)| tiles.into_iter().map(move |tile| (i, tile)))
                .collect();
            done("Superpixels", objects.len(), start.elapsed());

            let records: Vec<ObjectRecord<'_>> =
                objects.iter().map(|(i, o)| ObjectRecord::new(*i, o)).collect();
            write_records(&records, run.output.as_deref())?;
        }

        // ── Nuclei ───────────────────────────────────────────────────
        Commands::Nuclei {
            image,
            regions,
            run,
            threshold,
            min_area,
            no_split,
        } => {
            let mut params: NucleiParams = load_params(run.config.as_deref())?;
            if let Some(threshold) = threshold {
                params.threshold = threshold;
            }
            if let Some(area) = min_area {
                params.min_area = PhysicalArea::new(area, area);
            }
            if no_split {
                params.split_shape = false;
            }
            let segmenter = NucleiWatershedSegmenter::new(params).context("Invalid nuclei parameters")?;

            let source = open_image(&image)?;
            let rois = parse_regions(&regions, source.metadata(), true)?;
            let start = Instant::now();
            let outcomes = run_with_progress(&source, &rois, run.threads, |ctx, roi| {
                segmenter.detect(ctx, Some(roi))
            });

            let objects: Vec<(usize, PathObject)> = outcomes
                .into_iter()
                .enumerate()
                .filter_map(|(i, outcome)| outcome.completed().map(|nuclei| (i, nuclei)))
                .flat_map(|(i, nuclei)| nuclei.into_iter().map(move |n| (i, n)))
                .collect();
            done("Nuclei", objects.len(), start.elapsed());

            let records: Vec<ObjectRecord<'_>> =
                objects.iter().map(|(i, o)| ObjectRecord::new(*i, o)).collect();
            write_records(&records, run.output.as_deref())?;
        }
    }

    Ok(())
}
