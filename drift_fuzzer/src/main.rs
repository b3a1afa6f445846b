use clap::{ArgAction, Parser};
use drift_fuzzer::{boot, config::Config};
use env_logger::{Env, TimestampPrecision};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Differential fuzzer for a managed-language JIT")]
struct Settings {
    /// Path to the host toolchain binary.
    #[arg(long)]
    host: PathBuf,
    /// Base seed; programs are generated from consecutive seeds.
    #[arg(long)]
    seed: Option<u64>,
    /// Stop after this many programs.
    #[arg(long)]
    num_programs: Option<u64>,
    /// Stop after this many seconds.
    #[arg(long)]
    seconds_to_run: Option<u64>,
    /// Parallel fuzzing jobs, -1 for one per core.
    #[arg(long, short = 'j', default_value = "1", allow_hyphen_values = true)]
    parallelism: i64,
    /// Reduce the program generated by --seed instead of fuzzing.
    #[arg(long)]
    reduce: bool,
    /// Use a fresh execution server per reduction candidate.
    #[arg(long)]
    reduce_use_child_processes: bool,
    /// Log the source of every generated program.
    #[arg(long)]
    output_source: bool,
    /// Append one JSON event per found example to this file.
    #[arg(long)]
    output_events_to: Option<PathBuf>,
    /// Checksum instrumentation of variable values.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    checksum: bool,
    /// Re-run saved examples in this directory and delete fixed ones.
    #[arg(long)]
    remove_fixed: Option<PathBuf>,
    /// Directory for found examples.
    #[arg(long, short = 'o', default_value = "output")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();

    let log_env = Env::new()
        .filter_or("DRIFT_LOG", "info")
        .default_write_style_or("auto");
    env_logger::Builder::from_env(log_env)
        .format_timestamp(Some(TimestampPrecision::Seconds))
        .init();

    let config = Config {
        host: settings.host,
        seed: settings.seed,
        num_programs: settings.num_programs,
        seconds_to_run: settings.seconds_to_run,
        parallelism: settings.parallelism,
        reduce: settings.reduce,
        reduce_use_child_processes: settings.reduce_use_child_processes,
        output_source: settings.output_source,
        output_events_to: settings.output_events_to,
        checksum: settings.checksum,
        remove_fixed: settings.remove_fixed,
        output: settings.output,
        ..Config::default()
    };

    boot(config)
}
