//! The per-worker generate-compile-execute loop.

use crate::{
    classify::{run_pipeline, PairOutcome},
    compile::HostCompiler,
    config::Config,
    exec::ExecutorHandle,
    report::ExampleStore,
    stats::Stats,
    util::stop_soon,
};
use chrono::Local;
use drift_core::{gen::gen_program, print::Header, RngType};
use rand::Rng;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Retire an execution server that sat unused this long; a fresh one is
/// spawned on the next request.
const EXECUTOR_IDLE_LIMIT: Duration = Duration::from_secs(300);

pub struct SharedState {
    pub stats: Arc<Stats>,
    pub store: Arc<ExampleStore>,
}

impl Clone for SharedState {
    fn clone(&self) -> Self {
        Self {
            stats: Arc::clone(&self.stats),
            store: Arc::clone(&self.store),
        }
    }
}

pub struct Fuzzer {
    pub shared_state: SharedState,
    pub id: usize,
    pub rng: RngType,
    pub compiler: HostCompiler,
    pub executor: ExecutorHandle,
    pub config: Config,
}

impl Fuzzer {
    pub fn fuzz_loop(&mut self) -> anyhow::Result<()> {
        let deadline = self
            .config
            .seconds_to_run
            .map(|s| Instant::now() + Duration::from_secs(s));

        loop {
            if stop_soon() {
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    break;
                }
            }
            let index = self.shared_state.stats.inc_programs();
            if let Some(n) = self.config.num_programs {
                if index >= n {
                    break;
                }
            }
            // With a fixed base seed the stream of programs is the same
            // regardless of worker count or scheduling.
            let seed = match self.config.seed {
                Some(base) => base.wrapping_add(index),
                None => self.rng.gen(),
            };
            if let Err(e) = self.run_one(seed) {
                log::error!("fuzzer-{}: seed {}: {:#}", self.id, seed, e);
                return Err(e);
            }
            if self.executor.idle_for() > EXECUTOR_IDLE_LIMIT {
                self.executor.shutdown();
            }
        }
        self.executor.shutdown();
        log::info!("fuzzer-{} done", self.id);
        Ok(())
    }

    fn run_one(&mut self, seed: u64) -> anyhow::Result<()> {
        let prog = gen_program(seed, &self.config.gen, self.config.checksum);
        let header = Header::new(seed, Local::now());
        let source = prog.display_with_header(&header).to_string();
        if self.config.output_source {
            log::info!("seed {}:\n{}", seed, source);
        }

        let outcome = run_pipeline(&self.compiler, &mut self.executor, &source, false)?;
        let stats = &self.shared_state.stats;
        match &outcome {
            PairOutcome::ExecutionSuccess(_) => {}
            PairOutcome::CompileError { errors, .. } => {
                // Generated programs are supposed to always compile; an
                // error here is a generator defect worth noticing.
                stats.inc_compile_errors();
                log::warn!("seed {} failed to compile: {:?}", seed, errors);
            }
            PairOutcome::ExecutionTimeout => {
                stats.inc_timeouts();
            }
            PairOutcome::CompilerCrash { .. } => {
                stats.inc_compiler_crashes();
                self.save(seed, &source, &outcome)?;
            }
            PairOutcome::ExecutionCrash { .. } => {
                stats.inc_crashes();
                self.save(seed, &source, &outcome)?;
            }
            PairOutcome::ProgramMismatch(_) => {
                stats.inc_mismatches();
                self.save(seed, &source, &outcome)?;
            }
        }
        Ok(())
    }

    fn save(&self, seed: u64, source: &str, outcome: &PairOutcome) -> anyhow::Result<()> {
        let (debug, release) = outcome.summary();
        log::info!(
            "seed {}: {} (debug: {}, release: {})",
            seed,
            outcome.kind(),
            debug,
            release
        );
        self.shared_state.store.save(seed, source, outcome)?;
        self.shared_state.stats.inc_examples_saved();
        Ok(())
    }
}
