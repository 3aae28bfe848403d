//! tddeps - include-dependency grouping and stamp generator.
//!
//! Usage:
//!   tddeps [OPTIONS] <ROOT>... [-- <ACTION>...]
//!
//! Scans the roots, resolves quoted includes, groups the sources of every
//! build target by identical dependency closure and writes a CMake fragment
//! with the groups and per-directory stamp commands.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tddeps_analyze::{DependencyGraph, DependencyReport, StampForest, TargetGroups, build_groups};
use tddeps_core::DEFAULT_EXCLUDES;
use tddeps_emit::{FragmentStats, FragmentWriter, StateFile, touch_stamps};
use tddeps_scan::{
    DepsConfig, Extractor, GrepSearch, InProcessSearch, PatternSearch, RootSpec, TreeWalker,
};

#[derive(Parser)]
#[command(
    name = "tddeps",
    version,
    about = "Include-dependency grouping and stamp generator for CMake/TableGen builds",
    long_about = "tddeps scans source roots for quoted includes, computes the transitive \
                  dependencies of every header, source and .td file, and emits a CMake \
                  fragment grouping target sources by identical dependency sets.\n\n\
                  With -i, output is compared with the state file and only replaces it \
                  (or runs ACTION) when it changed."
)]
struct Cli {
    /// Root directories, optionally as ALIAS=PATH
    #[arg(required = true, value_name = "ROOT")]
    roots: Vec<RootSpec>,

    /// Include-search directory (repeatable; derived from the roots if absent)
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Incremental state file; output is written to STATE.tmp
    #[arg(short = 'i', value_name = "STATE")]
    state: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short = 'o', value_name = "OUT")]
    output: Option<PathBuf>,

    /// Stamp directory
    #[arg(short = 's', value_name = "STAMPDIR")]
    stamp_dir: Option<PathBuf>,

    /// Number of concurrent searches
    #[arg(short, long, default_value = "8")]
    jobs: usize,

    /// Only extract files newer than this file
    #[arg(long, value_name = "FILE")]
    newer_than: Option<PathBuf>,

    /// Search files in-process instead of running grep
    #[arg(long)]
    in_process: bool,

    /// Extra exclusion pattern (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Also write the dependency report as JSON
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Verbose diagnostics
    #[arg(short, long)]
    verbose: bool,

    /// Command run when STATE changes, instead of replacing it
    #[arg(last = true, value_name = "ACTION")]
    action: Vec<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = run(cli)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

/// Run the whole pipeline, returning the process exit code.
fn run(cli: Cli) -> Result<i32> {
    let config = build_config(&cli)?;

    let mut tree = TreeWalker::new().walk(&config).context("Walk failed")?;
    info!(
        files = tree.stats.total_files(),
        targets = tree.targets.len(),
        "traverse done in {:.2}s",
        tree.scan_duration.as_secs_f64()
    );

    let searcher: Arc<dyn PatternSearch> = if cli.in_process {
        Arc::new(InProcessSearch::new())
    } else {
        Arc::new(GrepSearch::new())
    };
    let extractor = Extractor::from_config(&config, searcher)?;

    let descriptors = extractor
        .scan_descriptors(&tree.descriptors)
        .context("Build descriptor scan failed")?;
    descriptors.apply(&mut tree);

    let queued = tree.queued_paths();
    let mut graph = DependencyGraph::new(&tree, descriptors.excluded.clone())?;
    let extracted = extractor
        .extract_includes(&queued, |file| graph.add_file(&file.path, &file.includes).map(|_| ()))
        .context("Include extraction failed")?;
    debug!(?extracted, stats = ?graph.stats(), "xrefs done");

    let targets = build_groups(&graph, config.group_name_limit);
    let aliases = config.aliases();
    let stamps = StampForest::build(&tree, graph.excluded_dirs(), &aliases);
    let writer = FragmentWriter::new(&aliases).with_stamp_dir(config.stamp_dir.as_deref());

    let mut code = 0;
    let stats = match (&cli.state, &cli.output) {
        (Some(state), _) => {
            let state = StateFile::new(state);
            let mut out = state.create_tmp()?;
            let stats = emit(&writer, &mut out, &graph, &targets, &stamps)?;
            drop(out);
            let outcome = state.commit(&cli.action)?;
            debug!(?outcome, "state handled");
            code = outcome.exit_code();
            stats
        }
        (None, Some(path)) => {
            let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
            emit(&writer, &mut BufWriter::new(file), &graph, &targets, &stamps)?
        }
        (None, None) => emit(&writer, &mut io::stdout().lock(), &graph, &targets, &stamps)?,
    };

    if cli.state.is_none()
        && let Some(ref stamp_dir) = config.stamp_dir
    {
        touch_stamps(&stamps.stamp_files(stamp_dir))?;
    }

    if let Some(ref path) = cli.json {
        write_report(path, DependencyReport::collect(&graph, targets, &stamps))?;
    }

    for warning in &tree.warnings {
        warn!(path = %warning.path.display(), "{}", warning.message);
    }
    info!(?stats, "finished");
    Ok(code)
}

fn build_config(cli: &Cli) -> Result<DepsConfig> {
    let since = match cli.newer_than {
        Some(ref file) => Some(
            std::fs::metadata(file)
                .and_then(|m| m.modified())
                .with_context(|| format!("Cannot read modification time of {}", file.display()))?,
        ),
        None => None,
    };

    let exclude_patterns: Vec<String> = DEFAULT_EXCLUDES
        .iter()
        .map(|s| s.to_string())
        .chain(cli.exclude.iter().cloned())
        .collect();

    // Roots are checked by the walker.
    let config = DepsConfig::builder()
        .roots(cli.roots.clone())
        .include_dirs(cli.include.clone())
        .exclude_patterns(exclude_patterns)
        .since(since)
        .stamp_dir(cli.stamp_dir.clone())
        .jobs(cli.jobs)
        .build()
        .context("Invalid configuration")?
        .resolve_paths()?;
    Ok(config)
}

fn emit<W: Write>(
    writer: &FragmentWriter<'_>,
    out: &mut W,
    graph: &DependencyGraph<'_>,
    targets: &[TargetGroups],
    stamps: &StampForest,
) -> Result<FragmentStats> {
    let stats = writer
        .write(out, graph, targets, stamps)
        .context("Failed to write fragment")?;
    out.flush().context("Failed to flush fragment")?;
    Ok(stats)
}

fn write_report(path: &Path, report: DependencyReport) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report)?;
    info!(path = %path.display(), "report written");
    Ok(())
}
