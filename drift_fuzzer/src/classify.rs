//! Outcome classification of one compile-and-run of a program pair.

use crate::{
    compile::{CompileOutput, Compiler},
    exec::{ExecError, ExecutorHandle, ProgramPairResults},
};

/// Everything one program can do to the pipeline.
#[derive(Debug, Clone)]
pub enum PairOutcome {
    /// The compiler front-end itself fell over.
    CompilerCrash { release: bool, detail: String },
    /// Diagnostics of severity error.
    CompileError { release: bool, errors: Vec<String> },
    /// The pair did not respond within the deadline.
    ExecutionTimeout,
    /// The execution server died without a response.
    ExecutionCrash { stderr: String },
    /// Both sides ran and agreed.
    ExecutionSuccess(ProgramPairResults),
    /// Both sides ran and disagreed: the payoff.
    ProgramMismatch(ProgramPairResults),
}

impl PairOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            PairOutcome::CompilerCrash { .. } => "compiler-crash",
            PairOutcome::CompileError { .. } => "compile-error",
            PairOutcome::ExecutionTimeout => "timeout",
            PairOutcome::ExecutionCrash { .. } => "crash",
            PairOutcome::ExecutionSuccess(_) => "success",
            PairOutcome::ProgramMismatch(_) => "mismatch",
        }
    }

    /// One-line per-side summary for headers and the events log.
    pub fn summary(&self) -> (String, String) {
        match self {
            PairOutcome::CompilerCrash { release, detail } => {
                let line = detail.lines().next().unwrap_or("compiler crash").to_string();
                if *release {
                    ("compiled".into(), format!("compiler crash: {}", line))
                } else {
                    (format!("compiler crash: {}", line), "compiled".into())
                }
            }
            PairOutcome::CompileError { release, errors } => {
                let ids = errors.join("; ");
                if *release {
                    ("compiled".into(), ids)
                } else {
                    (ids, "compiled".into())
                }
            }
            PairOutcome::ExecutionTimeout => ("timed out".into(), "timed out".into()),
            PairOutcome::ExecutionCrash { stderr } => {
                let line = stderr.lines().next().unwrap_or("crashed").to_string();
                (line.clone(), line)
            }
            PairOutcome::ExecutionSuccess(pair) | PairOutcome::ProgramMismatch(pair) => (
                side_summary(&pair.debug_result.checksum, &pair.debug_result.exception_type),
                side_summary(
                    &pair.release_result.checksum,
                    &pair.release_result.exception_type,
                ),
            ),
        }
    }
}

fn side_summary(checksum: &str, exception: &Option<String>) -> String {
    match exception {
        Some(ex) => format!("Throws '{}'", ex),
        None => format!("Outputs checksum {}", checksum),
    }
}

/// Compile both sides and run the pair, folding everything into one
/// [`PairOutcome`].
pub fn run_pipeline(
    compiler: &dyn Compiler,
    executor: &mut ExecutorHandle,
    source: &str,
    track_output: bool,
) -> anyhow::Result<PairOutcome> {
    let debug = match compiler.compile(source, false)? {
        CompileOutput::Binary(b) => b,
        CompileOutput::Errors(errors) => {
            return Ok(PairOutcome::CompileError {
                release: false,
                errors,
            })
        }
        CompileOutput::Crash(detail) => {
            return Ok(PairOutcome::CompilerCrash {
                release: false,
                detail,
            })
        }
        CompileOutput::Hang => return Ok(PairOutcome::ExecutionTimeout),
    };
    let release = match compiler.compile(source, true)? {
        CompileOutput::Binary(b) => b,
        CompileOutput::Errors(errors) => {
            return Ok(PairOutcome::CompileError {
                release: true,
                errors,
            })
        }
        CompileOutput::Crash(detail) => {
            return Ok(PairOutcome::CompilerCrash {
                release: true,
                detail,
            })
        }
        CompileOutput::Hang => return Ok(PairOutcome::ExecutionTimeout),
    };

    match executor.run_pair(&debug, &release, track_output) {
        Ok(pair) => {
            if pair.is_divergent() {
                Ok(PairOutcome::ProgramMismatch(pair))
            } else {
                Ok(PairOutcome::ExecutionSuccess(pair))
            }
        }
        Err(ExecError::Timeout(_)) => Ok(PairOutcome::ExecutionTimeout),
        Err(ExecError::Crash(stderr)) => Ok(PairOutcome::ExecutionCrash { stderr }),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ProgramResult;
    use std::{path::PathBuf, time::Duration};

    fn result(checksum: &str, exception: Option<&str>) -> ProgramResult {
        ProgramResult {
            checksum: checksum.to_string(),
            exception_type: exception.map(|s| s.to_string()),
            checksum_sites: None,
        }
    }

    #[test]
    fn mismatch_summary_names_both_sides() {
        let pair = ProgramPairResults {
            debug_result: result("246", None),
            release_result: result("4294967286", None),
            debug_first_unmatch: None,
            release_first_unmatch: None,
        };
        assert!(pair.is_divergent());
        let outcome = PairOutcome::ProgramMismatch(pair);
        let (debug, release) = outcome.summary();
        assert_eq!(debug, "Outputs checksum 246");
        assert_eq!(release, "Outputs checksum 4294967286");
    }

    struct FailingCompiler {
        release_only: bool,
    }

    impl Compiler for FailingCompiler {
        fn compile(&self, _source: &str, release: bool) -> anyhow::Result<CompileOutput> {
            if self.release_only && !release {
                Ok(CompileOutput::Binary(vec![0x4d, 0x5a]))
            } else {
                Ok(CompileOutput::Errors(vec![
                    "CS0165: Use of unassigned local variable".to_string(),
                ]))
            }
        }
    }

    // A compile failure is classified before any execution server is
    // spawned, so a dead host path is never touched.
    #[test]
    fn compile_errors_short_circuit_execution() {
        let mut executor =
            ExecutorHandle::new(PathBuf::from("/nonexistent/host"), Duration::from_secs(1));

        let compiler = FailingCompiler {
            release_only: false,
        };
        let outcome = run_pipeline(&compiler, &mut executor, "class C {}", false).unwrap();
        assert!(matches!(
            outcome,
            PairOutcome::CompileError { release: false, .. }
        ));

        let compiler = FailingCompiler { release_only: true };
        let outcome = run_pipeline(&compiler, &mut executor, "class C {}", false).unwrap();
        assert!(matches!(
            outcome,
            PairOutcome::CompileError { release: true, .. }
        ));
    }

    #[test]
    fn exception_summary_uses_type_name() {
        let pair = ProgramPairResults {
            debug_result: result("1", Some("System.NullReferenceException")),
            release_result: result("1", None),
            debug_first_unmatch: None,
            release_first_unmatch: None,
        };
        let outcome = PairOutcome::ProgramMismatch(pair);
        let (debug, release) = outcome.summary();
        assert_eq!(debug, "Throws 'System.NullReferenceException'");
        assert_eq!(release, "Outputs checksum 1");
    }
}
