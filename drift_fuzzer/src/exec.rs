//! Execution-server client.
//!
//! One worker owns one long-lived `<host> execution-server` child and
//! drives it over line-delimited JSON on its standard streams: one request
//! line in, one response line out. A reader thread pumps stdout; the
//! request side waits on it with a deadline and kills the child on expiry,
//! so a hung pair can never wedge the worker.

use serde::{Deserialize, Serialize};
use std::{
    io::{self, BufRead, BufReader, Read, Write},
    path::PathBuf,
    process::{Child, ChildStdin, Command, Stdio},
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;

/// Tiered compilation and JIT assertion throwing are forced on in the
/// child so the release JIT actually runs and asserts loudly.
const CHILD_ENV: [(&str, &str); 2] = [
    ("DOTNET_TieredCompilation", "1"),
    ("DOTNET_JitThrowOnAssertionFailure", "1"),
];

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),
    #[error("execution server died: {0}")]
    Crash(String),
    #[error("malformed response: {0}")]
    Protocol(String),
}

#[derive(Serialize)]
#[serde(tag = "kind")]
enum Request {
    RunPair { pair: PairRequest },
    Shutdown,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PairRequest {
    track_output: bool,
    debug: String,
    release: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Response {
    run_pair_result: Option<ProgramPairResults>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramPairResults {
    pub debug_result: ProgramResult,
    pub release_result: ProgramResult,
    #[serde(default)]
    pub debug_first_unmatch: Option<ChecksumSite>,
    #[serde(default)]
    pub release_first_unmatch: Option<ChecksumSite>,
}

impl ProgramPairResults {
    /// A pair diverges when the two runs disagree on either the exception
    /// outcome or the accumulated checksum.
    pub fn is_divergent(&self) -> bool {
        self.debug_result.exception_type != self.release_result.exception_type
            || self.debug_result.checksum != self.release_result.checksum
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramResult {
    pub checksum: String,
    #[serde(default)]
    pub exception_type: Option<String>,
    /// Present only when the request asked for per-site tracking.
    #[serde(default)]
    pub checksum_sites: Option<Vec<ChecksumSite>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChecksumSite {
    pub id: String,
    pub value: String,
}

pub struct ExecutorHandle {
    host: PathBuf,
    timeout: Duration,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    lines: Option<Receiver<io::Result<String>>>,
    stderr: Option<Arc<Mutex<Vec<u8>>>>,
    last_used: Instant,
}

impl ExecutorHandle {
    pub fn new(host: PathBuf, timeout: Duration) -> Self {
        Self {
            host,
            timeout,
            child: None,
            stdin: None,
            lines: None,
            stderr: None,
            last_used: Instant::now(),
        }
    }

    /// Time since the last request, for idle retirement by the owner.
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// Run a compiled pair and return the per-side results.
    pub fn run_pair(
        &mut self,
        debug: &[u8],
        release: &[u8],
        track_output: bool,
    ) -> Result<ProgramPairResults, ExecError> {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        self.ensure_spawned()?;
        self.last_used = Instant::now();

        let req = Request::RunPair {
            pair: PairRequest {
                track_output,
                debug: STANDARD.encode(debug),
                release: STANDARD.encode(release),
            },
        };
        if let Err(e) = self.send_line(&req) {
            self.kill();
            return Err(ExecError::Io(e));
        }

        let line = match self.lines.as_ref().unwrap().recv_timeout(self.timeout) {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                let stderr = self.drain_stderr();
                self.kill();
                return Err(if stderr.is_empty() {
                    ExecError::Io(e)
                } else {
                    ExecError::Crash(stderr)
                });
            }
            Err(RecvTimeoutError::Timeout) => {
                self.kill();
                return Err(ExecError::Timeout(self.timeout));
            }
            Err(RecvTimeoutError::Disconnected) => {
                let stderr = self.drain_stderr();
                self.kill();
                return Err(ExecError::Crash(stderr));
            }
        };

        let resp: Response = serde_json::from_str(&line)
            .map_err(|e| ExecError::Protocol(format!("{}: {:?}", e, line)))?;
        resp.run_pair_result
            .ok_or_else(|| ExecError::Protocol("response carries no pair result".into()))
    }

    /// Ask the child to exit cleanly, then make sure it is gone.
    pub fn shutdown(&mut self) {
        if self.child.is_some() {
            let _ = self.send_line(&Request::Shutdown);
        }
        self.kill();
    }

    fn send_line(&mut self, req: &Request) -> io::Result<()> {
        let stdin = self.stdin.as_mut().unwrap();
        let mut line = serde_json::to_string(req).expect("request serialization is infallible");
        line.push('\n');
        stdin.write_all(line.as_bytes())?;
        stdin.flush()
    }

    fn ensure_spawned(&mut self) -> Result<(), ExecError> {
        if self.child.is_some() {
            return Ok(());
        }
        let mut cmd = Command::new(&self.host);
        cmd.arg("execution-server")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in CHILD_ENV {
            cmd.env(k, v);
        }
        let mut child = cmd.spawn()?;

        self.stdin = Some(child.stdin.take().unwrap());
        self.lines = Some(read_lines_background(child.stdout.take().unwrap()));
        self.stderr = Some(read_background(child.stderr.take().unwrap()));
        self.child = Some(child);
        log::debug!("spawned execution server from {}", self.host.display());
        Ok(())
    }

    fn drain_stderr(&mut self) -> String {
        self.stderr
            .as_ref()
            .map(|buf| String::from_utf8_lossy(&buf.lock().unwrap()).into_owned())
            .unwrap_or_default()
    }

    fn kill(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.child = None;
        self.stdin = None;
        self.lines = None;
        self.stderr = None;
    }
}

impl Drop for ExecutorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn read_lines_background<R: Read + Send + 'static>(src: R) -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = BufReader::new(src);
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}

fn read_background<R: Read + Send + 'static>(mut src: R) -> Arc<Mutex<Vec<u8>>> {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);
    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match src.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => sink.lock().unwrap().extend_from_slice(&chunk[..n]),
            }
        }
    });
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_format_is_stable() {
        let req = Request::RunPair {
            pair: PairRequest {
                track_output: true,
                debug: "QUJD".into(),
                release: "REVG".into(),
            },
        };
        let line = serde_json::to_string(&req).unwrap();
        assert_eq!(
            line,
            r#"{"kind":"RunPair","pair":{"trackOutput":true,"debug":"QUJD","release":"REVG"}}"#
        );
        let shutdown = serde_json::to_string(&Request::Shutdown).unwrap();
        assert_eq!(shutdown, r#"{"kind":"Shutdown"}"#);
    }

    #[test]
    fn response_parses_and_classifies_divergence() {
        let line = r#"{
            "runPairResult": {
                "debugResult": {
                    "checksum": "246",
                    "exceptionType": null,
                    "checksumSites": [{"id": "c_0", "value": "246"}]
                },
                "releaseResult": {
                    "checksum": "4294967286",
                    "checksumSites": [{"id": "c_0", "value": "4294967286"}]
                },
                "debugFirstUnmatch": {"id": "c_0", "value": "246"},
                "releaseFirstUnmatch": {"id": "c_0", "value": "4294967286"}
            }
        }"#;
        let resp: Response = serde_json::from_str(line).unwrap();
        let pair = resp.run_pair_result.unwrap();
        assert!(pair.is_divergent());
        assert_eq!(
            pair.debug_first_unmatch,
            Some(ChecksumSite {
                id: "c_0".into(),
                value: "246".into()
            })
        );
    }

    #[test]
    fn matching_results_are_not_divergent() {
        let pair = ProgramPairResults {
            debug_result: ProgramResult {
                checksum: "1".into(),
                exception_type: Some("System.OverflowException".into()),
                checksum_sites: None,
            },
            release_result: ProgramResult {
                checksum: "1".into(),
                exception_type: Some("System.OverflowException".into()),
                checksum_sites: None,
            },
            debug_first_unmatch: None,
            release_first_unmatch: None,
        };
        assert!(!pair.is_divergent());
    }
}
