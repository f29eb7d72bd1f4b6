//! CLI entrypoint for `enumtrack`.
//!
//! Parses command-line arguments, opens the enumeration store directory,
//! selects the enumerations for each requested domain, prints what changed
//! between consecutive runs (or just lists the runs with `--list`), and
//! optionally writes CSV/TXT exports when an output directory is provided.
use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use enumtrack::{
    diff::AddressMatch,
    engine::{Report, TrackConfig, Tracker},
    export::{save_changes_csv, save_changes_txt},
    io::DEFAULT_MMAP_THRESHOLD_BYTES,
    report::{render_listing, render_report, render_summary},
    select::{SelectError, WindowPolicy},
    store::{DirStore, StoreError},
};
use log::{LevelFilter, error, info};

const DEFAULT_STORE_DIR: &str = "enumerations";

#[derive(Parser, Debug)]
#[command(
    name = "enumtrack",
    version,
    about = "Track DNS enumeration results over time"
)]
struct Args {
    /// Root domain names, comma separated (can be used multiple times)
    #[arg(short = 'd', long = "domain", required = true, value_delimiter = ',')]
    domains: Vec<String>,

    /// Path to the directory containing the enumeration files
    #[arg(long = "dir", default_value = DEFAULT_STORE_DIR)]
    dir: PathBuf,

    /// Print information for the selected enumerations instead of changes
    #[arg(long = "list")]
    list: bool,

    /// Include all enumerations in the tracking
    #[arg(long = "all")]
    all: bool,

    /// The number of recent enumerations to include in the tracking [default: 2]
    #[arg(long = "last")]
    last: Option<usize>,

    /// Exclude all enumerations before this time (format: 01/02 15:04:05 2006 UTC)
    #[arg(long = "start", value_name = "TIME")]
    start: Option<String>,

    /// Report a hostname as moved whenever its address set differs, not only
    /// when previously seen addresses disappear
    #[arg(long = "exact-addresses")]
    exact_addresses: bool,

    /// Print per-interval change counts after each report
    #[arg(long = "stats")]
    stats: bool,

    /// Path to the output directory
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Override mmap threshold in bytes. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Suppress terminal output (still writes exports if -o is provided)
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn normalize_domains(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for d in raw {
        let d = d.trim();
        if !d.is_empty() && !out.iter().any(|o| o == d) {
            out.push(d.to_string());
        }
    }
    out
}

/// Exit code for a failed selection or report run.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SelectError>() {
        Some(SelectError::InvalidPolicy(_)) => 2,
        Some(SelectError::InsufficientData { .. }) => 4,
        Some(SelectError::Store(_)) | None => 3,
    }
}

fn report_failure(context: &str, err: &anyhow::Error) -> i32 {
    error!("{}: {:#}", context, err);
    exit_code(err)
}

fn fail(context: &str, err: anyhow::Error) -> ! {
    process::exit(report_failure(context, &err));
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }

    let domains = normalize_domains(&args.domains);
    if domains.is_empty() {
        error!("no root domain names were provided");
        process::exit(2);
    }
    let policy = match WindowPolicy::from_options(args.last, args.all, args.start.as_deref()) {
        Ok(p) => p,
        Err(e) => fail("invalid tracking window", e.into()),
    };
    let threshold = if args.mmap_threshold == 0 {
        u64::MAX
    } else {
        args.mmap_threshold
    };
    let store = match DirStore::open_with_threshold(&args.dir, threshold) {
        Ok(s) => s,
        Err(e @ StoreError::NotADirectory(_)) => {
            error!("failed to open the enumeration store: {}", e);
            process::exit(2);
        }
        Err(e) => fail("failed to open the enumeration store", e.into()),
    };
    let matching = if args.exact_addresses {
        AddressMatch::Exact
    } else {
        AddressMatch::Containment
    };

    let tracker = Tracker::new(store);
    let mut reports: Vec<Report> = Vec::new();
    // exit code of the first domain that failed; later domains still run
    let mut failed: Option<i32> = None;
    for domain in domains {
        let cfg = TrackConfig {
            domain,
            policy,
            matching,
        };
        if args.list {
            match tracker.select(&cfg) {
                Ok(sel) if !args.quiet => print!("{}", render_listing(&cfg.domain, &sel)),
                Ok(_) => {}
                Err(e) => {
                    failed.get_or_insert(report_failure(&cfg.domain, &e.into()));
                }
            }
            continue;
        }
        let report = match tracker.run(&cfg) {
            Ok(r) => r,
            Err(e) => {
                failed.get_or_insert(report_failure(&cfg.domain, &e));
                continue;
            }
        };
        info!(
            "{}: {} intervals compared",
            report.domain,
            report.intervals.len()
        );
        if !args.quiet {
            print!("{}", render_report(&report));
            if args.stats {
                print!("{}", render_summary(&report));
            }
        }
        reports.push(report);
    }

    if let Some(outdir) = args.output {
        if args.list {
            info!("--list given, nothing to export");
            process::exit(failed.unwrap_or(0));
        }
        if let Err(e) = fs::create_dir_all(&outdir) {
            error!(
                "failed to create output directory {}: {}",
                outdir.display(),
                e
            );
            process::exit(5);
        }
        let ts = chrono::Local::now().format("%Y.%m.%d_%H.%M.%S");
        let csv = outdir.join(format!("enumtrack_changes_{}.csv", ts));
        let txt = outdir.join(format!("enumtrack_changes_{}.txt", ts));
        if let Err(e) = save_changes_csv(&reports, &csv) {
            error!("failed to write {}: {}", csv.display(), e);
            process::exit(5);
        }
        if let Err(e) = save_changes_txt(&reports, &txt) {
            error!("failed to write {}: {}", txt.display(), e);
            process::exit(5);
        }
        if !args.quiet {
            println!("{} {}", "Changes written to".green(), outdir.display());
        }
    }
    if let Some(code) = failed {
        process::exit(code);
    }
}
