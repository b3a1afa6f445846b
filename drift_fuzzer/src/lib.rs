//! drift fuzzer front-end.

pub mod classify;
pub mod compile;
pub mod config;
pub mod exec;
pub mod fuzzer;
pub mod reduce;
pub mod report;
pub mod stats;
pub mod util;

use crate::{
    classify::{run_pipeline, PairOutcome},
    compile::HostCompiler,
    config::Config,
    exec::ExecutorHandle,
    fuzzer::{Fuzzer, SharedState},
    report::ExampleStore,
    stats::Stats,
    util::stop_req,
};
use anyhow::Context;
use chrono::Local;
use drift_core::{gen::gen_program, print::Header, RngType};
use rand::SeedableRng;
use std::{path::Path, sync::Arc, thread, time::Duration};

pub fn boot(config: Config) -> anyhow::Result<()> {
    config.check().context("config error")?;

    if let Some(dir) = config.remove_fixed.clone() {
        return remove_fixed(&config, &dir);
    }
    if config.reduce {
        let reduced = reduce::reduce(&config)?;
        let seed = config.seed.unwrap();
        let out = config.output.join(format!("seed_{}_reduced.cs", seed));
        std::fs::create_dir_all(&config.output)?;
        std::fs::write(&out, &reduced)
            .with_context(|| format!("failed to write {}", out.display()))?;
        log::info!("reduced example written to {}", out.display());
        println!("{}", reduced);
        return Ok(());
    }

    setup_signal_handler();

    let stats = Arc::new(Stats::new());
    let store = Arc::new(ExampleStore::new(
        config.output.clone(),
        config.output_events_to.as_deref(),
    )?);
    let shared_state = SharedState {
        stats: Arc::clone(&stats),
        store,
    };

    {
        let stats = Arc::clone(&stats);
        thread::spawn(move || {
            stats.report(Duration::from_secs(10));
        });
    }

    let jobs = config.jobs();
    log::info!("running {} fuzzer(s) against {}", jobs, config.host.display());
    let mut fuzzers = Vec::with_capacity(jobs);
    for id in 0..jobs {
        let shared_state = SharedState::clone(&shared_state);
        let config = config.clone();
        let handle = thread::spawn(move || {
            let mut fuzzer = Fuzzer {
                shared_state,
                id,
                // Seeded workers replay deterministically; otherwise each
                // worker draws its own stream.
                rng: match config.seed {
                    Some(base) => RngType::seed_from_u64(base ^ id as u64),
                    None => RngType::from_entropy(),
                },
                compiler: HostCompiler::new(config.host.clone(), config.compile_timeout),
                executor: ExecutorHandle::new(config.host.clone(), config.exec_timeout),
                config,
            };
            fuzzer.fuzz_loop()
        });
        fuzzers.push(handle);
    }

    let mut err = None;
    for (i, f) in fuzzers.into_iter().enumerate() {
        if let Ok(Err(e)) = f.join() {
            if err.is_none() {
                err = Some("fuzzer exits with errors:".to_string());
            }
            let mut info = format!("\n\tfuzzer-{}: {}", i, e);
            for (j, cause) in e.chain().enumerate() {
                info.push_str(&format!("\n\t\t{}. {}", j, cause));
            }
            err.as_mut().unwrap().push_str(&info);
        }
    }
    if let Some(err) = err {
        Err(anyhow::anyhow!(err))
    } else {
        log::info!("all done, {} programs", stats.programs());
        Ok(())
    }
}

/// Re-run every saved example from its recorded seed and delete the ones
/// that no longer reproduce.
fn remove_fixed(config: &Config, dir: &Path) -> anyhow::Result<()> {
    let compiler = HostCompiler::new(config.host.clone(), config.compile_timeout);
    let mut executor = ExecutorHandle::new(config.host.clone(), config.exec_timeout);
    let examples = report::load_examples(dir)?;
    log::info!("re-checking {} example(s) in {}", examples.len(), dir.display());

    let mut removed = 0;
    for meta in examples {
        let prog = gen_program(meta.seed, &config.gen, config.checksum);
        let header = Header::new(meta.seed, Local::now());
        let source = prog.display_with_header(&header).to_string();
        let outcome = run_pipeline(&compiler, &mut executor, &source, false)?;
        match outcome {
            PairOutcome::ExecutionSuccess(_) | PairOutcome::CompileError { .. } => {
                log::info!("seed {} is fixed, removing", meta.seed);
                report::remove_example(dir, meta.seed)?;
                removed += 1;
            }
            _ => log::debug!("seed {} still reproduces ({})", meta.seed, outcome.kind()),
        }
    }
    log::info!("removed {} fixed example(s)", removed);
    Ok(())
}

fn setup_signal_handler() {
    use signal_hook::{consts::TERM_SIGNALS, iterator::Signals};

    thread::spawn(move || {
        let mut signals = Signals::new(TERM_SIGNALS).unwrap();
        if let Some(sig) = signals.forever().next() {
            log::info!("signal {} received, stopping...", sig);
            stop_req();
        }
    });
}
