//! The reduction pipeline: establish what made the seed interesting, wrap
//! the compile-and-run plumbing in a predicate, and drive the core
//! reducer to a fixed point.

use crate::{
    classify::{run_pipeline, PairOutcome},
    compile::HostCompiler,
    config::Config,
    exec::ExecutorHandle,
};
use anyhow::bail;
use chrono::Local;
use drift_core::{
    gen::gen_program,
    print::Header,
    prog::Program,
    reduce::{runtime_simplification, Reducer},
};
use std::{cell::RefCell, time::Instant};

/// What a candidate has to reproduce to stay interesting.
#[derive(Debug, Clone)]
enum Mode {
    CompilerCrash {
        release: bool,
    },
    CompileError {
        release: bool,
        id: String,
    },
    RuntimeCrash,
    Divergence {
        debug_ex: Option<String>,
        release_ex: Option<String>,
        exceptions_differ: bool,
    },
}

/// Reduce the program generated by `config.seed` and return the final
/// source text, headed by the reduction summary.
pub fn reduce(config: &Config) -> anyhow::Result<String> {
    let seed = config.seed.expect("reduce mode requires a seed");
    let started = Instant::now();

    let prog = gen_program(seed, &config.gen, config.checksum);
    let original_len = prog.display().to_string().len();

    let compiler = HostCompiler::new(config.host.clone(), config.compile_timeout);
    let mut executor = ExecutorHandle::new(config.host.clone(), config.exec_timeout);

    let source = prog.display().to_string();
    let outcome = run_pipeline(&compiler, &mut executor, &source, false)?;
    let (debug_summary, release_summary) = outcome.summary();
    let mode = match outcome {
        PairOutcome::CompilerCrash { release, .. } => Mode::CompilerCrash { release },
        PairOutcome::CompileError { release, errors } => {
            let id = errors
                .first()
                .and_then(|l| l.split(':').next())
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            Mode::CompileError { release, id }
        }
        PairOutcome::ExecutionTimeout => {
            bail!("program times out: hangs cannot be reduced")
        }
        PairOutcome::ExecutionCrash { .. } => Mode::RuntimeCrash,
        PairOutcome::ExecutionSuccess(_) => {
            bail!("program has no errors: nothing to reduce")
        }
        PairOutcome::ProgramMismatch(pair) => Mode::Divergence {
            debug_ex: pair.debug_result.exception_type.clone(),
            release_ex: pair.release_result.exception_type.clone(),
            exceptions_differ: pair.debug_result.exception_type
                != pair.release_result.exception_type,
        },
    };
    log::info!("reducing seed {} in mode {:?}", seed, mode);

    let mode = RefCell::new(mode);
    let config2 = config.clone();
    let pred = |cand: &Program| -> bool {
        let src = cand.display().to_string();
        let outcome = if config2.reduce_use_child_processes {
            let mut fresh = ExecutorHandle::new(config2.host.clone(), config2.exec_timeout);
            run_pipeline(&compiler, &mut fresh, &src, false)
        } else {
            run_pipeline(&compiler, &mut executor, &src, false)
        };
        // Any infrastructure failure just makes the candidate boring.
        let outcome = match outcome {
            Ok(o) => o,
            Err(_) => return false,
        };
        candidate_interesting(&mode, &outcome)
    };

    let mut reduced = Reducer::new(prog, pred).reduce();
    if reduced.uses_runtime {
        runtime_simplification(&mut reduced);
    }

    let reduced_len = reduced.display().to_string().len();
    let elapsed = started.elapsed().as_secs();
    let mut header = Header::new(seed, Local::now());
    header.extra.push(format!(
        "Reduced from {:.1} KiB to {:.1} KiB in {:02}:{:02}:{:02}",
        original_len as f64 / 1024.0,
        reduced_len as f64 / 1024.0,
        elapsed / 3600,
        elapsed % 3600 / 60,
        elapsed % 60
    ));
    header.extra.push(format!("Debug: {}", debug_summary));
    header.extra.push(format!("Release: {}", release_summary));
    Ok(reduced.display_with_header(&header).to_string())
}

fn candidate_interesting(mode: &RefCell<Mode>, outcome: &PairOutcome) -> bool {
    let current = mode.borrow().clone();
    match (current, outcome) {
        (Mode::CompilerCrash { release }, PairOutcome::CompilerCrash { release: r, .. }) => {
            release == *r
        }
        (
            Mode::CompileError { release, id },
            PairOutcome::CompileError {
                release: r,
                errors,
            },
        ) => {
            release == *r
                && errors
                    .iter()
                    .filter_map(|l| l.split(':').next())
                    .any(|e| e.trim() == id)
        }
        (Mode::RuntimeCrash, PairOutcome::ExecutionCrash { .. }) => true,
        // A candidate that graduates from mismatching to crashing is at
        // least as interesting; follow it.
        (Mode::Divergence { .. }, PairOutcome::ExecutionCrash { .. }) => {
            *mode.borrow_mut() = Mode::RuntimeCrash;
            true
        }
        (
            Mode::Divergence {
                debug_ex,
                release_ex,
                exceptions_differ,
            },
            PairOutcome::ProgramMismatch(pair),
        ) => {
            if exceptions_differ {
                pair.debug_result.exception_type == debug_ex
                    && pair.release_result.exception_type == release_ex
            } else {
                pair.debug_result.checksum != pair.release_result.checksum
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ProgramPairResults, ProgramResult};

    fn result(checksum: &str, exception: Option<&str>) -> ProgramResult {
        ProgramResult {
            checksum: checksum.to_string(),
            exception_type: exception.map(|s| s.to_string()),
            checksum_sites: None,
        }
    }

    fn mismatch(debug: ProgramResult, release: ProgramResult) -> PairOutcome {
        PairOutcome::ProgramMismatch(ProgramPairResults {
            debug_result: debug,
            release_result: release,
            debug_first_unmatch: None,
            release_first_unmatch: None,
        })
    }

    #[test]
    fn checksum_mode_requires_checksum_divergence() {
        let mode = RefCell::new(Mode::Divergence {
            debug_ex: None,
            release_ex: None,
            exceptions_differ: false,
        });
        assert!(candidate_interesting(
            &mode,
            &mismatch(result("1", None), result("2", None))
        ));
        assert!(!candidate_interesting(
            &mode,
            &mismatch(result("1", None), result("1", Some("System.Exception")))
        ));
    }

    #[test]
    fn exception_mode_pins_both_exception_types() {
        let mode = RefCell::new(Mode::Divergence {
            debug_ex: Some("System.NullReferenceException".to_string()),
            release_ex: None,
            exceptions_differ: true,
        });
        assert!(candidate_interesting(
            &mode,
            &mismatch(
                result("0", Some("System.NullReferenceException")),
                result("0", None)
            )
        ));
        assert!(!candidate_interesting(
            &mode,
            &mismatch(
                result("0", Some("System.IndexOutOfRangeException")),
                result("0", None)
            )
        ));
    }

    #[test]
    fn divergence_mode_upgrades_on_crash() {
        let mode = RefCell::new(Mode::Divergence {
            debug_ex: None,
            release_ex: None,
            exceptions_differ: false,
        });
        assert!(candidate_interesting(
            &mode,
            &PairOutcome::ExecutionCrash {
                stderr: "Assert failure".to_string()
            }
        ));
        assert!(matches!(&*mode.borrow(), Mode::RuntimeCrash));
        // After the upgrade a plain mismatch no longer qualifies.
        assert!(!candidate_interesting(
            &mode,
            &mismatch(result("1", None), result("2", None))
        ));
    }

    #[test]
    fn timeouts_are_never_interesting() {
        for mode in [
            Mode::RuntimeCrash,
            Mode::CompilerCrash { release: true },
            Mode::Divergence {
                debug_ex: None,
                release_ex: None,
                exceptions_differ: false,
            },
        ] {
            let mode = RefCell::new(mode);
            assert!(!candidate_interesting(&mode, &PairOutcome::ExecutionTimeout));
        }
    }
}
