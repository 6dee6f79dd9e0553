macro_rules! regex {
    ($pattern:expr) => {{
        use regex::Regex;
        use std::sync::OnceLock;

        static REGEX: OnceLock<Regex> = OnceLock::new();
        REGEX.get_or_init(|| Regex::new($pattern).unwrap())
    }};
}

mod args;
mod compare;
mod config;
mod counters;
mod io_utils;
mod model;
mod reconcile;
mod report;
mod stats;
mod summary;

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::Path;
use std::time::Instant;

use args::{Cli, Command, CompareArgs, ParseArgs};
use compare::{compare, drop_incomplete, Dataset};
use config::{default_compare_metrics, Assumptions, CompareMetric};
use counters::extract_counters;
use io_utils::{collect_tables, load_table, read_log};
use reconcile::{combine, dedup_by_requested};
use report::{print_comparisons, write_table};
use summary::extract_summary;

fn profile_enabled() -> bool {
    std::env::var("BENCH_PARSE_PROFILE")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Parse(args) => run_parse(args),
        Command::Compare(args) => run_compare(args),
    }
}

fn resolve_assumptions(args: &ParseArgs) -> Result<Assumptions> {
    let mut assumptions = match &args.assumptions {
        Some(path) => Assumptions::load(path)?,
        None => Assumptions::default(),
    };
    if let Some(n) = args.total_packets {
        assumptions.total_packets = n;
    }
    if let Some(n) = args.frame_overhead {
        assumptions.frame_overhead_bytes = n;
    }
    Ok(assumptions)
}

fn run_parse(args: ParseArgs) -> Result<()> {
    let profile = profile_enabled();
    let t0 = Instant::now();

    for path in [&args.summary_log, &args.counter_log] {
        if !path.exists() {
            return Err(anyhow!("{} not found!", path.display()));
        }
    }
    let assumptions = resolve_assumptions(&args)?;
    log::info!("using {:?}", assumptions);

    let t_parse = Instant::now();
    let summary_text = read_log(&args.summary_log)?;
    let (summary, duplicates) = dedup_by_requested(extract_summary(&summary_text));
    if duplicates > 0 {
        log::info!("removed {} duplicate throughput rows", duplicates);
    }
    let counter_text = read_log(&args.counter_log)?;
    let counters = extract_counters(&counter_text);
    log::info!(
        "{} test points, {} counter records",
        summary.len(),
        counters.len()
    );
    if profile {
        eprintln!("[profile] extract logs: {:.3}s", t_parse.elapsed().as_secs_f64());
    }

    let rows = combine(&summary, &counters, &assumptions);
    write_table(&rows, &args.output)?;
    println!("CSV file written to: {}", args.output.display());
    if profile {
        eprintln!("[profile] total: {:.3}s", t0.elapsed().as_secs_f64());
    }
    Ok(())
}

fn label_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run_compare(args: CompareArgs) -> Result<()> {
    let tables = collect_tables(&args.tables)?;
    if tables.len() < 2 {
        return Err(anyhow!(
            "need a baseline and at least one table to compare, found {}",
            tables.len()
        ));
    }

    let mut datasets = Vec::with_capacity(tables.len());
    for (i, path) in tables.iter().enumerate() {
        let mut rows = load_table(path)?;
        if !args.keep_incomplete {
            let dropped = drop_incomplete(&mut rows);
            if dropped > 0 {
                log::info!("{}: dropped {} rows without kernel cycles", path.display(), dropped);
            }
        }
        let label = args.labels.get(i).cloned().unwrap_or_else(|| label_for(path));
        datasets.push(Dataset { label, rows });
    }

    let metrics: Vec<CompareMetric> = if args.metrics.is_empty() {
        default_compare_metrics()
    } else {
        args.metrics.iter().map(|m| CompareMetric::raw(m)).collect()
    };

    let comparisons = compare(&datasets, &metrics);
    print_comparisons(&comparisons, &datasets);
    Ok(())
}
