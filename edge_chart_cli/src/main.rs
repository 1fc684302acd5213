use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use edge_chart::{
    activity_chart, arm_repetitions, chunk_count, counter_regressions, detect_heavy_load,
    heavy_load_chart, parse_environment, parse_index_records, parse_inertial, BinningDiagnostics,
    BucketPolicy, ChartBundle, EdgeError, EnvironmentSample, IndexRecord, InertialSample, Params, Zone,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")");

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Edge sensor chart summaries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the activity and heavy-load chart series from exported sensor arrays
    Summarize(SummarizeArgs),
    /// Report record counts, difference ranges and counter health per input file
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Default)]
struct InputArgs {
    /// JSON array of inertial samples (head/left/right axes)
    #[arg(long, value_hint = ValueHint::FilePath)]
    inertial: Option<PathBuf>,

    /// JSON array of environment samples
    #[arg(long, value_hint = ValueHint::FilePath)]
    environment: Option<PathBuf>,

    /// JSON array of index records (diffHead/diffLeft/diffRight/armUpDown)
    #[arg(long, value_hint = ValueHint::FilePath)]
    index: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct ParamArgs {
    /// JSON file with parameters; flags below override it
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Samples per activity chunk
    #[arg(long)]
    chunk_width: Option<usize>,

    /// Difference above which a record counts as heavy load
    #[arg(long)]
    threshold: Option<f64>,

    /// Number of heavy-load buckets
    #[arg(long)]
    buckets: Option<usize>,

    /// Index records per bucket
    #[arg(long)]
    bucket_width: Option<usize>,

    /// Handling of events outside the bucket range
    #[arg(long, value_enum)]
    bucket_policy: Option<PolicyOpt>,
}

#[derive(Parser, Debug)]
struct SummarizeArgs {
    #[command(flatten)]
    inputs: InputArgs,

    #[command(flatten)]
    params: ParamArgs,

    /// Output JSON path (`-` for stdout)
    #[arg(short, long, default_value = "charts.json", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Optional CSV with one row per chart point
    #[arg(long, value_hint = ValueHint::FilePath)]
    csv: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Profile major stages with timings
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[command(flatten)]
    inputs: InputArgs,

    #[command(flatten)]
    params: ParamArgs,

    /// Output report path
    #[arg(short, long, default_value = "edge_report.txt", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PolicyOpt {
    Reject,
    Clamp,
    Drop,
}

impl From<PolicyOpt> for BucketPolicy {
    fn from(value: PolicyOpt) -> Self {
        match value {
            PolicyOpt::Reject => BucketPolicy::Reject,
            PolicyOpt::Clamp => BucketPolicy::Clamp,
            PolicyOpt::Drop => BucketPolicy::Drop,
        }
    }
}

impl ParamArgs {
    fn resolve(&self) -> Result<Params> {
        let mut params = match self.config.as_ref() {
            Some(path) => load_params(path)?,
            None => Params::default(),
        };
        if let Some(width) = self.chunk_width {
            params.chunk_width = width;
        }
        if let Some(threshold) = self.threshold {
            params.heavy_load_threshold = threshold;
        }
        if let Some(count) = self.buckets {
            params.bucket_count = count;
        }
        if let Some(width) = self.bucket_width {
            params.bucket_width = width;
        }
        if let Some(policy) = self.bucket_policy {
            params.bucket_policy = policy.into();
        }
        params.validate().context("invalid parameters")?;
        Ok(params)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Summarize(args) => args.verbose,
        Command::Inspect(args) => args.verbose,
    };
    init_tracing(verbose);

    match cli.command {
        Command::Summarize(args) => handle_summarize(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

/// Safe to call more than once; later calls keep the first subscriber.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_params(path: &Path) -> Result<Params> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read params {}", path.display()))?;
    let params: Params = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid params file", path.display()))?;
    Ok(params)
}

#[derive(Debug, Default)]
struct LoadedInputs {
    inertial: Option<Vec<InertialSample>>,
    environment: Option<Vec<EnvironmentSample>>,
    index: Option<Vec<IndexRecord>>,
}

impl LoadedInputs {
    fn is_empty(&self) -> bool {
        self.inertial.is_none() && self.environment.is_none() && self.index.is_none()
    }
}

fn load_array<T>(
    path: Option<&Path>,
    parse: fn(&[u8]) -> Result<Vec<T>, EdgeError>,
) -> Result<Option<Vec<T>>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let records = parse(&data).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(records))
}

/// Read the three arrays concurrently; the pipeline starts once all have arrived.
fn load_inputs(inputs: &InputArgs) -> Result<LoadedInputs> {
    let (inertial, (environment, index)) = rayon::join(
        || load_array(inputs.inertial.as_deref(), parse_inertial),
        || {
            rayon::join(
                || load_array(inputs.environment.as_deref(), parse_environment),
                || load_array(inputs.index.as_deref(), parse_index_records),
            )
        },
    );
    Ok(LoadedInputs {
        inertial: inertial?,
        environment: environment?,
        index: index?,
    })
}

#[derive(Debug, Serialize)]
struct ChartReport {
    params: Params,
    chunk_count: Option<usize>,
    environment_chunk_count: Option<usize>,
    arm_repetitions: Option<f64>,
    activity: Option<ChartBundle>,
    heavy_load: Option<ChartBundle>,
    binning: Option<BinningDiagnostics>,
}

/// Build each chart independently; a failing chart is logged and left out.
fn build_report(inputs: &LoadedInputs, params: &Params) -> ChartReport {
    let activity = inputs
        .inertial
        .as_ref()
        .and_then(|samples| match activity_chart(samples, params) {
            Ok(chart) => Some(chart),
            Err(err) => {
                warn!("Skipping activity chart: {}", err);
                None
            }
        });
    let (heavy_load, binning) = match inputs.index.as_ref() {
        Some(records) => match heavy_load_chart(records, params) {
            Ok(out) => {
                let diag = &out.diagnostics;
                if diag.clamped + diag.dropped > 0 {
                    warn!(
                        "Heavy-load events outside buckets 1..={}: {} clamped, {} dropped (of {})",
                        params.bucket_count, diag.clamped, diag.dropped, diag.events
                    );
                }
                (Some(out.chart), Some(out.diagnostics))
            }
            Err(err) => {
                warn!("Skipping heavy-load chart: {}", err);
                (None, None)
            }
        },
        None => (None, None),
    };

    ChartReport {
        params: params.clone(),
        chunk_count: inputs
            .inertial
            .as_ref()
            .map(|s| chunk_count(s.len(), params.chunk_width)),
        environment_chunk_count: inputs
            .environment
            .as_ref()
            .map(|s| chunk_count(s.len(), params.chunk_width)),
        arm_repetitions: inputs.index.as_deref().and_then(arm_repetitions),
        activity,
        heavy_load,
        binning,
    }
}

fn handle_summarize(args: SummarizeArgs) -> Result<()> {
    let params = args.params.resolve()?;

    let t_load = Instant::now();
    let inputs = load_inputs(&args.inputs)?;
    if inputs.is_empty() {
        return Err(anyhow!(
            "no input files supplied (use --inertial, --environment or --index)"
        ));
    }
    if args.profile || args.verbose {
        info!(
            "Load stage: {:.1} ms",
            t_load.elapsed().as_secs_f64() * 1000.0
        );
    }

    let t_compute = Instant::now();
    let report = build_report(&inputs, &params);
    if args.profile || args.verbose {
        info!(
            "Compute stage: {:.1} ms",
            t_compute.elapsed().as_secs_f64() * 1000.0
        );
    }
    if report.activity.is_none() && report.heavy_load.is_none() {
        warn!("No chart could be built from the supplied inputs");
    }
    if let Some(count) = report.arm_repetitions {
        info!("Arm raises: {}", count);
    }

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        serde_json::to_writer_pretty(&mut handle, &report)?;
        writeln!(handle)?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        serde_json::to_writer_pretty(file, &report)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!("Wrote chart JSON: {}", args.output.display());
    }

    if let Some(path) = args.csv.as_ref() {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        write_chart_rows(&report, &mut writer)?;
        info!("Wrote chart CSV: {}", path.display());
    }

    Ok(())
}

fn write_chart_rows<W: Write>(report: &ChartReport, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(["chart", "x", "head", "left", "right"])?;

    let charts = [
        ("activity", report.activity.as_ref()),
        ("heavy_load", report.heavy_load.as_ref()),
    ];
    for (name, bundle) in charts {
        if let Some(bundle) = bundle {
            let rows = bundle
                .datasets
                .iter()
                .map(|d| d.data.len())
                .max()
                .unwrap_or(0);
            for i in 0..rows {
                let cell = |zone: Zone| {
                    bundle
                        .dataset(zone)
                        .and_then(|d| d.data.get(i))
                        .map(|v| format!("{:.3}", v))
                        .unwrap_or_default()
                };
                writer.write_record([
                    name.to_string(),
                    (i + 1).to_string(),
                    cell(Zone::Head),
                    cell(Zone::Left),
                    cell(Zone::Right),
                ])?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let params = args.params.resolve()?;
    let inputs = load_inputs(&args.inputs)?;
    if inputs.is_empty() {
        return Err(anyhow!(
            "no input files supplied (use --inertial, --environment or --index)"
        ));
    }

    let report = inspect_report(&args.inputs, &inputs, &params);
    fs::write(&args.output, report)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!("Inspection report written: {}", args.output.display());
    Ok(())
}

fn inspect_report(paths: &InputArgs, inputs: &LoadedInputs, params: &Params) -> String {
    let mut report = String::new();

    if let (Some(path), Some(samples)) = (paths.inertial.as_ref(), inputs.inertial.as_ref()) {
        report.push_str(&format!("FILE: {} (inertial)\n", path.display()));
        report.push_str(&format!("  records: {}\n", samples.len()));
        report.push_str(&format!(
            "  chunks: {} (width {})\n",
            chunk_count(samples.len(), params.chunk_width),
            params.chunk_width
        ));
        let stamps: Vec<DateTime<Utc>> = samples.iter().filter_map(|s| s.timestamp).collect();
        if let (Some(first), Some(last)) = (stamps.iter().min(), stamps.iter().max()) {
            report.push_str(&format!(
                "  timespan_s: {:.1}\n",
                (*last - *first).num_milliseconds() as f64 / 1000.0
            ));
        }
        report.push('\n');
    }

    if let (Some(path), Some(samples)) = (paths.environment.as_ref(), inputs.environment.as_ref()) {
        report.push_str(&format!("FILE: {} (environment)\n", path.display()));
        report.push_str(&format!("  records: {}\n", samples.len()));
        report.push_str(&format!(
            "  chunks: {} (width {})\n",
            chunk_count(samples.len(), params.chunk_width),
            params.chunk_width
        ));
        report.push('\n');
    }

    if let (Some(path), Some(records)) = (paths.index.as_ref(), inputs.index.as_ref()) {
        report.push_str(&format!("FILE: {} (index)\n", path.display()));
        report.push_str(&format!("  records: {}\n", records.len()));
        report.push_str(&format!(
            "  arm_repetitions: {}\n",
            arm_repetitions(records).map_or("n/a".into(), |v| format!("{}", v))
        ));
        report.push_str(&format!(
            "  counter_regressions: {}\n",
            counter_regressions(records)
        ));
        for zone in Zone::ALL {
            let diffs = records.iter().map(|r| r.diff(zone));
            let min = diffs.clone().fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |m| m.min(v)))
            });
            let max = diffs.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));
            let events = detect_heavy_load(records, zone, params.heavy_load_threshold).len();
            report.push_str(&format!(
                "  diff_{}: min={}, max={}, above_{}={}\n",
                zone,
                min.map_or("n/a".into(), |v| format!("{:.3}", v)),
                max.map_or("n/a".into(), |v| format!("{:.3}", v)),
                params.heavy_load_threshold,
                events
            ));
        }
        report.push('\n');
    }

    report
}
