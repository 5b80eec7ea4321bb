//! Arealis CLI - areal-weighted interpolation between polygon layers

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use arealis_algorithms::areal::{
    interpolate, Diagnostic, InterpolationParams, NullSourcePolicy, Output, OverlapStrategy,
    ResultSet, Session, Sink, WeightPolicy,
};
use arealis_core::io::{read_geojson, write_geojson};
use arealis_core::{
    FeatureCollection, FeatureStore, GeoBackend, GeoJsonStore, GeometryBackend, Layer, CRS,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "arealis")]
#[command(author, version, about = "Areal-weighted interpolation between polygon layers", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a GeoJSON layer
    Info {
        /// Input GeoJSON file
        input: PathBuf,
    },
    /// List the tables of a store directory
    Tables {
        /// Store directory (one <table>.geojson per table)
        store: PathBuf,
    },
    /// Interpolate source attributes onto target polygons
    Interpolate(InterpolateArgs),
}

#[derive(clap::Args)]
struct InterpolateArgs {
    /// Target layer: GeoJSON file, or table name with --store
    #[arg(short, long)]
    target: String,
    /// Source layer: GeoJSON file, or table name with --store
    #[arg(short, long)]
    source: String,
    /// Identifier column of the target layer [default: id]
    #[arg(long)]
    target_id: Option<String>,
    /// Identifier column of the source layer [default: id]
    #[arg(long)]
    source_id: Option<String>,
    /// Extensive variables (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    extensive: Vec<String>,
    /// Intensive variables (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    intensive: Vec<String>,
    /// Extensive denominator: sum, total
    #[arg(short, long)]
    weight: Option<String>,
    /// Drop targets that no source overlaps
    #[arg(long, conflicts_with = "keep_unmatched")]
    drop_unmatched: bool,
    /// Keep targets that no source overlaps, with null values
    #[arg(long)]
    keep_unmatched: bool,
    /// Null source handling: keep, any, per-variable
    #[arg(long)]
    na_rm: Option<String>,
    /// Working CRS, e.g. EPSG:32633; both layers are reprojected into it
    #[arg(long)]
    crs: Option<String>,
    /// Do not attach target geometries to the result
    #[arg(long)]
    no_geometry: bool,
    /// Overlap search: indexed, pairwise
    #[arg(long)]
    strategy: Option<String>,
    /// JSON parameter file; flags given on the command line override it
    #[arg(long)]
    params: Option<PathBuf>,
    /// Store directory holding the input layers as tables
    #[arg(long)]
    store: Option<PathBuf>,
    /// Write the result as a table of the store
    #[arg(long, requires = "store")]
    into: Option<String>,
    /// Write the result as a GeoJSON file
    #[arg(short, long, conflicts_with = "into")]
    output: Option<PathBuf>,
    /// Replace an existing output table or file
    #[arg(long)]
    overwrite: bool,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_layer(path: &Path) -> Result<FeatureCollection> {
    let pb = spinner("Reading layer...");
    let layer = read_geojson(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    Ok(layer)
}

fn write_layer(layer: &FeatureCollection, path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!("{} already exists (pass --overwrite to replace it)", path.display());
    }
    let pb = spinner("Writing output...");
    write_geojson(layer, path).with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn parse_weight(s: &str) -> Result<WeightPolicy> {
    match s.to_lowercase().as_str() {
        "sum" => Ok(WeightPolicy::Sum),
        "total" => Ok(WeightPolicy::Total),
        _ => bail!("Unknown weight policy: {s}. Use sum or total"),
    }
}

fn parse_null_policy(s: &str) -> Result<NullSourcePolicy> {
    match s.to_lowercase().as_str() {
        "keep" | "no" | "false" => Ok(NullSourcePolicy::Keep),
        "any" | "yes" | "true" => Ok(NullSourcePolicy::DropAny),
        "per-variable" | "variable" => Ok(NullSourcePolicy::DropPerVariable),
        _ => bail!("Unknown null policy: {s}. Use keep, any or per-variable"),
    }
}

fn parse_strategy(s: &str) -> Result<OverlapStrategy> {
    match s.to_lowercase().as_str() {
        "indexed" | "rtree" => Ok(OverlapStrategy::Indexed),
        "pairwise" | "naive" => Ok(OverlapStrategy::Pairwise),
        _ => bail!("Unknown overlap strategy: {s}. Use indexed or pairwise"),
    }
}

/// Parameters from the optional JSON file, overridden by explicit flags
fn build_params(args: &InterpolateArgs) -> Result<InterpolationParams> {
    let mut params = match &args.params {
        Some(path) => InterpolationParams::from_json_file(path)
            .with_context(|| format!("Failed to load parameters from {}", path.display()))?,
        None => InterpolationParams::default(),
    };

    if let Some(id) = &args.target_id {
        params.target_id = id.clone();
    }
    if let Some(id) = &args.source_id {
        params.source_id = id.clone();
    }
    if !args.extensive.is_empty() {
        params.extensive = args.extensive.clone();
    }
    if !args.intensive.is_empty() {
        params.intensive = args.intensive.clone();
    }
    if let Some(w) = &args.weight {
        params.weight = parse_weight(w)?;
    }
    if args.drop_unmatched {
        params.keep_unmatched = false;
    } else if args.keep_unmatched {
        params.keep_unmatched = true;
    }
    if let Some(na) = &args.na_rm {
        params.null_sources = parse_null_policy(na)?;
    }
    if let Some(crs) = &args.crs {
        params.working_crs = Some(CRS::parse(crs));
    }
    if args.no_geometry {
        params.emit_geometry = false;
    }
    if let Some(s) = &args.strategy {
        params.overlap = parse_strategy(s)?;
    }
    Ok(params)
}

fn report_diagnostics(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        eprintln!("  warning: {}", d);
    }
}

/// Tab-separated attribute table on stdout
fn print_table(result: &ResultSet) {
    println!("{}\t{}", result.target_id, result.variables.join("\t"));
    for record in &result.records {
        let values: Vec<String> = result
            .variables
            .iter()
            .map(|v| record.value(v).map_or_else(|| "NA".to_string(), |x| x.to_string()))
            .collect();
        println!("{}\t{}", record.id, values.join("\t"));
    }
}

fn done(name: &str, rows: usize, dest: &str, elapsed: std::time::Duration) {
    println!("{} complete: {} rows -> {}", name, rows, dest);
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run_info(input: &Path) -> Result<()> {
    let layer = read_layer(input)?;
    let backend = GeoBackend::new();

    let mut area = 0.0;
    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    let mut missing = 0usize;
    for geom in layer.iter().map(|f| f.geometry.as_ref()) {
        let Some(geom) = geom else {
            missing += 1;
            continue;
        };
        area += backend.area(geom).context("Failed to compute area")?;
        if let Some(rect) = backend.envelope(geom) {
            let (min, max) = (rect.min(), rect.max());
            bounds = Some(match bounds {
                None => (min.x, min.y, max.x, max.y),
                Some((x0, y0, x1, y1)) => (x0.min(min.x), y0.min(min.y), x1.max(max.x), y1.max(max.y)),
            });
        }
    }

    println!("File: {}", input.display());
    println!("Features: {} ({} without geometry)", layer.len(), missing);
    match &layer.crs {
        Some(crs) => println!("CRS: {}", crs),
        None => println!("CRS: none"),
    }
    if let Some((x0, y0, x1, y1)) = bounds {
        println!("Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})", x0, y0, x1, y1);
    }
    println!("Total area: {:.4}", area);
    let names: Vec<&str> = layer.attribute_names().into_iter().collect();
    println!("Attributes: {}", names.join(", "));
    Ok(())
}

fn run_tables(dir: &Path) -> Result<()> {
    let store = GeoJsonStore::open(dir).with_context(|| format!("Failed to open store {}", dir.display()))?;
    for name in store.table_names()? {
        let table = store.read_table(&name)?;
        let crs = table.crs.as_ref().map_or_else(|| "none".to_string(), |c| c.identifier());
        println!("{}\t{} features\t{}", name, table.len(), crs);
    }
    Ok(())
}

fn run_interpolate(args: InterpolateArgs) -> Result<()> {
    let params = build_params(&args)?;
    let backend = GeoBackend::new();

    match &args.store {
        Some(dir) => {
            let mut store =
                GeoJsonStore::open(dir).with_context(|| format!("Failed to open store {}", dir.display()))?;
            let sink = match &args.into {
                Some(name) => Sink::Table {
                    name: name.as_str(),
                    overwrite: args.overwrite,
                },
                None => Sink::Memory,
            };

            let pb = spinner("Interpolating...");
            let start = Instant::now();
            let mut session = Session::new(&mut store, &backend);
            let output = session
                .interpolate(Layer::Table(&args.target), Layer::Table(&args.source), &params, sink)
                .context("Interpolation failed")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();

            report_diagnostics(output.diagnostics());
            match output {
                Output::Table { name, rows, .. } => {
                    done("Interpolation", rows, &format!("table {name}"), elapsed)
                }
                Output::Memory(result) => emit(result, args.output.as_deref(), args.overwrite, elapsed)?,
            }
        }
        None => {
            let target = read_layer(Path::new(&args.target))?;
            let source = read_layer(Path::new(&args.source))?;
            info!(
                targets = target.len(),
                sources = source.len(),
                "layers loaded"
            );

            let pb = spinner("Interpolating...");
            let start = Instant::now();
            let result =
                interpolate(&backend, &target, &source, &params).context("Interpolation failed")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();

            report_diagnostics(&result.diagnostics);
            emit(result, args.output.as_deref(), args.overwrite, elapsed)?;
        }
    }
    Ok(())
}

fn emit(result: ResultSet, output: Option<&Path>, overwrite: bool, elapsed: std::time::Duration) -> Result<()> {
    match output {
        Some(path) => {
            let rows = result.len();
            write_layer(&result.into_feature_collection(), path, overwrite)?;
            done("Interpolation", rows, &path.display().to_string(), elapsed);
        }
        None => print_table(&result),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info { input } => run_info(&input),
        Commands::Tables { store } => run_tables(&store),
        Commands::Interpolate(args) => run_interpolate(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "arealis", "interpolate", "-t", "tracts.geojson", "-s", "blocks.geojson",
            "-e", "pop,jobs", "--weight", "total", "--na-rm", "per-variable",
            "--crs", "EPSG:32633", "--drop-unmatched", "--no-geometry",
        ]);
        let Commands::Interpolate(args) = cli.command else {
            panic!("expected interpolate");
        };
        let params = build_params(&args).unwrap();
        assert_eq!(params.extensive, vec!["pop".to_string(), "jobs".to_string()]);
        assert_eq!(params.weight, WeightPolicy::Total);
        assert_eq!(params.null_sources, NullSourcePolicy::DropPerVariable);
        assert_eq!(params.working_crs, Some(CRS::from_epsg(32633)));
        assert!(!params.keep_unmatched);
        assert!(!params.emit_geometry);
        assert_eq!(params.target_id, "id");
    }

    #[test]
    fn test_keep_unmatched_overrides_params_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, r#"{"extensive": ["pop"], "keep_unmatched": false}"#).unwrap();
        let path = path.to_string_lossy().into_owned();

        let parse = |extra: &[&str]| {
            let mut argv =
                vec!["arealis", "interpolate", "-t", "a", "-s", "b", "--params", path.as_str()];
            argv.extend_from_slice(extra);
            let Commands::Interpolate(args) = Cli::parse_from(argv).command else {
                panic!("expected interpolate");
            };
            build_params(&args).unwrap()
        };

        assert!(!parse(&[]).keep_unmatched);
        assert!(parse(&["--keep-unmatched"]).keep_unmatched);
        assert_eq!(parse(&["--keep-unmatched"]).extensive, vec!["pop".to_string()]);

        let both = Cli::try_parse_from([
            "arealis", "interpolate", "-t", "a", "-s", "b", "-e", "pop",
            "--keep-unmatched", "--drop-unmatched",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_weight("SUM").unwrap(), WeightPolicy::Sum);
        assert!(parse_weight("mean").is_err());
        assert_eq!(parse_null_policy("any").unwrap(), NullSourcePolicy::DropAny);
        assert_eq!(parse_strategy("pairwise").unwrap(), OverlapStrategy::Pairwise);
    }

    #[test]
    fn test_into_requires_store() {
        let parsed = Cli::try_parse_from([
            "arealis", "interpolate", "-t", "a", "-s", "b", "-e", "pop", "--into", "out",
        ]);
        assert!(parsed.is_err());
    }
}
