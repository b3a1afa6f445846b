use anyhow::bail;
use drift_core::config::GenConfig;
use std::{path::PathBuf, thread, time::Duration};

#[derive(Clone)]
pub struct Config {
    /// Path to the host toolchain binary.
    pub host: PathBuf,
    /// Fixed base seed; random per program when absent.
    pub seed: Option<u64>,
    pub num_programs: Option<u64>,
    pub seconds_to_run: Option<u64>,
    /// Worker count; -1 means one per core.
    pub parallelism: i64,
    pub reduce: bool,
    /// Spawn a fresh execution server for every reduction candidate
    /// instead of reusing one.
    pub reduce_use_child_processes: bool,
    pub output_source: bool,
    pub output_events_to: Option<PathBuf>,
    pub checksum: bool,
    pub remove_fixed: Option<PathBuf>,
    pub output: PathBuf,
    pub exec_timeout: Duration,
    pub compile_timeout: Duration,
    pub gen: GenConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: PathBuf::from("host"),
            seed: None,
            num_programs: None,
            seconds_to_run: None,
            parallelism: 1,
            reduce: false,
            reduce_use_child_processes: false,
            output_source: false,
            output_events_to: None,
            checksum: true,
            remove_fixed: None,
            output: PathBuf::from("output"),
            exec_timeout: Duration::from_secs(20),
            compile_timeout: Duration::from_secs(60),
            gen: GenConfig::default(),
        }
    }
}

impl Config {
    pub fn check(&self) -> anyhow::Result<()> {
        if !self.host.is_file() {
            bail!("bad host binary: {}", self.host.display());
        }
        if self.parallelism < -1 || self.parallelism == 0 {
            bail!("bad parallelism: {}", self.parallelism);
        }
        if self.num_programs.is_some() && self.seconds_to_run.is_some() {
            bail!("--num-programs and --seconds-to-run are mutually exclusive");
        }
        if self.reduce && self.seed.is_none() {
            bail!("--reduce requires --seed");
        }
        if let Some(d) = self.remove_fixed.as_ref() {
            if !d.is_dir() {
                bail!("bad remove-fixed dir: {}", d.display());
            }
        }
        if self.output.exists() && !self.output.is_dir() {
            bail!("'{}' not a directory", self.output.display());
        }
        Ok(())
    }

    pub fn jobs(&self) -> usize {
        if self.parallelism == -1 {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.parallelism as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_without_seed_is_rejected() {
        let config = Config {
            reduce: true,
            // Point at something that surely exists so only the seed check
            // can fail.
            host: PathBuf::from("/proc/self/exe"),
            ..Config::default()
        };
        assert!(config.check().is_err());
    }

    #[test]
    fn parallelism_minus_one_maps_to_cores() {
        let config = Config {
            parallelism: -1,
            ..Config::default()
        };
        assert!(config.jobs() >= 1);
    }
}
