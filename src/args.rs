use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_OUTPUT;

#[derive(Parser, Debug)]
#[command(about = "Merge network benchmark summary and hardware counter logs into CSV tables")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse one summary log and one counter log into a per-throughput table
    Parse(ParseArgs),
    /// Compare tables from several build configurations against the first one
    Compare(CompareArgs),
}

#[derive(clap::Args, Debug)]
pub struct ParseArgs {
    /// Throughput/RTT summary log
    pub summary_log: PathBuf,

    /// Hardware counter and cycle accounting log
    pub counter_log: PathBuf,

    /// Output CSV path
    #[arg(default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// JSON file overriding the assumed packet count, framing overhead and warm-up/cool-down
    #[arg(short = 'a', long = "assumptions")]
    pub assumptions: Option<PathBuf>,

    /// Packets sent per test point
    #[arg(long = "total-packets")]
    pub total_packets: Option<u64>,

    /// Per-packet framing overhead in bytes
    #[arg(long = "frame-overhead")]
    pub frame_overhead: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct CompareArgs {
    /// Baseline table followed by the tables to compare (files or directories of .csv)
    #[arg(required = true)]
    pub tables: Vec<PathBuf>,

    /// Display label per table, in order (defaults to file stems)
    #[arg(short = 'l', long = "label")]
    pub labels: Vec<String>,

    /// Column to compare; repeat for several (defaults to a standard metric set)
    #[arg(short = 'm', long = "metric")]
    pub metrics: Vec<String>,

    /// Keep rows without kernel cycle accounting
    #[arg(long = "keep-incomplete")]
    pub keep_incomplete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_default_output() {
        let cli = Cli::parse_from(["bench_parse_rs", "parse", "iq.txt", "out.txt"]);
        match cli.command {
            Command::Parse(args) => {
                assert_eq!(args.output, PathBuf::from(DEFAULT_OUTPUT));
                assert_eq!(args.total_packets, None);
            }
            Command::Compare(_) => panic!("expected parse"),
        }
    }

    #[test]
    fn test_compare_args() {
        assert!(Cli::try_parse_from(["bench_parse_rs", "compare"]).is_err());
        let cli = Cli::parse_from([
            "bench_parse_rs",
            "compare",
            "gcc.csv",
            "pnk.csv",
            "-l",
            "GCC",
            "-l",
            "Pancake",
        ]);
        match cli.command {
            Command::Compare(args) => {
                assert_eq!(args.tables.len(), 2);
                assert_eq!(args.labels, vec!["GCC", "Pancake"]);
                assert!(!args.keep_incomplete);
            }
            Command::Parse(_) => panic!("expected compare"),
        }
    }
}
