//! blockdiff: fixed-size block incremental diff CLI
//!
//! Commands:
//!   diff (default)            - write changed blocks + the new block map to a
//!                               directory or tar archive
//!   restore <snapshot>...     - rebuild a file from a chain of snapshots
//!   config show               - display current configuration
//!
//! `blockdiff -f disk.img -d out.tar` is shorthand for `blockdiff diff ...`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

use blockdiff_chunks::{AlgorithmHasher, BlockMap, BlockSource, DiffProcessor, RunSummary};
use blockdiff_core::config::BlockdiffConfig;
use blockdiff_core::{BlockdiffError, BlockdiffResult, HashAlgorithm, SinkMode};
use blockdiff_sink::{open_sink, padded_names, restore, NameStrategy, RestorePlan};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "blockdiff",
    version,
    about = "Fixed-size block incremental diff",
    long_about = "blockdiff: split a file into fixed-size blocks and write only the blocks \
                  that changed since the previous run, plus a JSON block map",
    subcommand_negates_reqs = true
)]
struct Cli {
    /// Path to blockdiff.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "BLOCKDIFF_CONFIG",
        default_value = "/etc/blockdiff/config.toml",
        global = true
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides log.level
    #[arg(long, env = "BLOCKDIFF_LOG", global = true)]
    log: Option<String>,

    /// Log format; overrides log.format
    #[arg(long, env = "BLOCKDIFF_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    diff: DiffArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Diff a file against the previous map and write changed blocks
    Diff(DiffArgs),

    /// Rebuild a file from snapshots written by `diff`
    Restore {
        /// Snapshot directories or tar archives, oldest first
        #[arg(required = true)]
        snapshots: Vec<PathBuf>,
        /// Where to write the rebuilt file
        #[arg(long, short = 'o')]
        output: PathBuf,
        /// Map file to restore (default: the newest snapshot's map entry)
        #[arg(long)]
        map: Option<PathBuf>,
        /// Re-hash every block with this digest (sha1, blake3) and compare with the map
        #[arg(long)]
        verify: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Args, Debug, Clone, Default)]
struct DiffArgs {
    /// Input file
    #[arg(long = "input-file", short = 'f', required = true)]
    input_file: Option<PathBuf>,

    /// Output directory or tar file (depends on mode)
    #[arg(long, short = 'd', required = true)]
    destination: Option<PathBuf>,

    /// Mode: files, tar (overrides diff.mode)
    #[arg(long, short = 'm')]
    mode: Option<String>,

    /// Block size in bytes, also accepted as `-bs` (overrides diff.block_size)
    #[arg(long = "block-size")]
    block_size: Option<u64>,

    /// Block digest: sha1, blake3 (overrides diff.hash)
    #[arg(long)]
    hash: Option<String>,

    /// Map from the previous run to diff against
    #[arg(long = "input-map")]
    input_map: Option<PathBuf>,

    /// Also write the new map to this path
    #[arg(long = "output-map")]
    output_map: Option<PathBuf>,

    /// Progress output (0 = silent)
    #[arg(long, default_value_t = 0)]
    verbose: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Exit status for a run rejected before any block was read
const EXIT_PRECONDITION: i32 = 2;

fn main() {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = match cli.log_format {
        Some(f) => f,
        None => LogFormat::from_str(&config.log.format, true)
            .map_err(|e| anyhow::anyhow!("invalid log.format: {e}"))?,
    };
    init_logging(&level, format);

    match cli.command {
        Some(Commands::Diff(args)) => cmd_diff(&config, &args),
        None => cmd_diff(&config, &cli.diff),
        Some(Commands::Restore { snapshots, output, map, verify }) => {
            cmd_restore(&config, &snapshots, &output, map.as_deref(), verify.as_deref())
        }
        Some(Commands::Config { action: ConfigAction::Show }) => {
            cmd_config_show(&config, &cli.config)
        }
    }
}

/// Map an error to the process exit status.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.chain().find_map(|e| e.downcast_ref::<BlockdiffError>()) {
        Some(e) if e.is_precondition() => EXIT_PRECONDITION,
        _ => 1,
    }
}

/// Rewrite the legacy two-letter `-bs` flag into `--block-size`.
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-bs") => OsString::from("--block-size"),
            Some(s) if s.starts_with("-bs=") => OsString::from(format!("--block-size={}", &s[4..])),
            _ => arg,
        })
        .collect()
}

// ── Config loading ────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<BlockdiffConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        BlockdiffConfig::from_toml(&content)
            .with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(BlockdiffConfig::default())
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stderr keeps log lines out of the progress/stats output
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn block_names(config: &BlockdiffConfig) -> NameStrategy {
    padded_names(&config.naming.prefix, config.naming.width, &config.naming.suffix)
}

// ── `blockdiff diff` ──────────────────────────────────────────────────────────

/// Effective diff settings: CLI flags > config file > defaults
#[derive(Debug, PartialEq)]
struct DiffSettings {
    input: PathBuf,
    destination: PathBuf,
    mode: SinkMode,
    block_size: u64,
    hash: HashAlgorithm,
    input_map: Option<PathBuf>,
    output_map: Option<PathBuf>,
    verbose: u32,
}

fn resolve_diff_settings(config: &BlockdiffConfig, args: &DiffArgs) -> Result<DiffSettings> {
    let input = args.input_file.clone().context("--input-file is required")?;
    let destination = args.destination.clone().context("--destination is required")?;

    let mode = match args.mode.as_deref() {
        Some(m) => m.parse::<SinkMode>()?,
        None => config.diff.mode,
    };
    let hash = match args.hash.as_deref() {
        Some(h) => h.parse::<HashAlgorithm>()?,
        None => config.diff.hash,
    };
    let block_size = args.block_size.unwrap_or(config.diff.block_size);

    // In files mode consecutive runs into the same directory chain automatically
    let (input_map, output_map) = match mode {
        SinkMode::Files => {
            let side_map = destination.join(&config.diff.map_name);
            (
                args.input_map.clone().or_else(|| Some(side_map.clone())),
                args.output_map.clone().or(Some(side_map)),
            )
        }
        SinkMode::Tar => (args.input_map.clone(), args.output_map.clone()),
    };

    Ok(DiffSettings {
        input,
        destination,
        mode,
        block_size,
        hash,
        input_map,
        output_map,
        verbose: args.verbose,
    })
}

fn cmd_diff(config: &BlockdiffConfig, args: &DiffArgs) -> Result<()> {
    let settings = resolve_diff_settings(config, args)?;
    let started = Instant::now();

    let source = BlockSource::open(&settings.input, settings.block_size)
        .with_context(|| format!("opening input: {}", settings.input.display()))?;

    // Validate the previous map before the sink exists, so a mismatch leaves
    // no half-created archive behind
    let mut map = BlockMap::new(&source);
    map.load_previous(settings.input_map.as_deref())
        .context("loading input map")?;

    let mut sink = open_sink(settings.mode, &settings.destination, block_names(config))
        .with_context(|| format!("opening {} sink: {}", settings.mode, settings.destination.display()))?;

    info!(
        input = %settings.input.display(),
        destination = %settings.destination.display(),
        mode = %settings.mode,
        hash = %settings.hash,
        block_size = settings.block_size,
        blocks = source.block_count(),
        "starting diff"
    );

    let mut progress = DiffProgress::new(source.total_bytes(), settings.verbose)?;
    let summary = DiffProcessor::new(
        &source,
        &mut map,
        AlgorithmHasher(settings.hash),
        |block: &[u8], index: u64, changed: bool| -> BlockdiffResult<()> {
            if changed {
                sink.write_block(index, block)?;
            }
            progress.block(changed, source.bytes_read());
            Ok(())
        },
    )
    .run()
    .with_context(|| format!("diffing {}", settings.input.display()))?;
    progress.finish();

    map.persist_optional(settings.output_map.as_deref())
        .context("writing output map")?;
    sink.write_map(&config.diff.map_name, &map.serialize()?)
        .context("writing map into sink")?;
    sink.close().context("closing sink")?;

    print_stats(&source, &summary, started);
    Ok(())
}

// ── Progress ──────────────────────────────────────────────────────────────────

struct DiffProgress {
    bar: ProgressBar,
    blocks: u64,
    changed: u64,
}

impl DiffProgress {
    fn new(total_bytes: u64, verbose: u32) -> Result<Self> {
        let bar = if verbose > 0 {
            make_progress_bar(total_bytes, "diff")?
        } else {
            ProgressBar::hidden()
        };
        Ok(DiffProgress {
            bar,
            blocks: 0,
            changed: 0,
        })
    }

    fn block(&mut self, changed: bool, bytes_read: u64) {
        self.blocks += 1;
        if changed {
            self.changed += 1;
        }
        self.bar.set_position(bytes_read);
        self.bar
            .set_message(format!("{} changed / {} blocks", self.changed, self.blocks));
    }

    fn finish(&self) {
        self.bar.finish_with_message(format!(
            "{} changed / {} blocks",
            self.changed, self.blocks
        ));
    }
}

fn make_progress_bar(total: u64, prefix: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({binary_bytes_per_sec}) {msg}",
        )
        .context("progress bar template")?
        .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn print_stats(source: &BlockSource, summary: &RunSummary, started: Instant) {
    let percent = 100.0 * source.progress();
    let elapsed = started.elapsed().as_secs_f64().max(1e-3);
    let mbps = source.bytes_read() as f64 / elapsed / (1024.0 * 1024.0);

    println!();
    println!("Total stats: {percent:>8.1}% {mbps:>8.2} MB/s");
    println!("  blocks:    {}", summary.blocks);
    println!("  changed:   {}", summary.changed);
    println!("  unchanged: {}", summary.unchanged());
    println!("  bytes:     {}", fmt_bytes(summary.bytes));
}

// ── `blockdiff restore` ───────────────────────────────────────────────────────

fn cmd_restore(
    config: &BlockdiffConfig,
    snapshots: &[PathBuf],
    output: &Path,
    map: Option<&Path>,
    verify: Option<&str>,
) -> Result<()> {
    let verify = verify.map(str::parse::<HashAlgorithm>).transpose()?;
    let names = block_names(config);

    let plan = RestorePlan {
        snapshots,
        map,
        map_name: &config.diff.map_name,
        names: &names,
        verify,
    };
    let summary = restore(&plan, output)
        .with_context(|| format!("restoring into {}", output.display()))?;

    println!("Restored:");
    println!("  output:    {}", output.display());
    println!("  blocks:    {}", summary.blocks);
    println!("  bytes:     {}", fmt_bytes(summary.bytes));
    println!("  snapshots: {}", snapshots.len());
    Ok(())
}

// ── `blockdiff config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &BlockdiffConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
