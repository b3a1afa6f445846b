//! Host toolchain driver.
//!
//! The compiler front-end is an external collaborator: `<host> compile`
//! reads source on stdin and writes assembly bytes to stdout. Exit code 0
//! is success, 2 means diagnostics on stderr (one `ERRORID: message` per
//! line), anything else is a compiler crash. A hung compiler is killed at
//! the deadline and surfaces as `Hang`.

use std::{
    io::{Read, Write},
    path::PathBuf,
    process::{Command, Stdio},
    sync::mpsc,
    thread,
    time::Duration,
};

#[derive(Debug, Clone)]
pub enum CompileOutput {
    Binary(Vec<u8>),
    /// Diagnostics of severity error; the leading token of each line is
    /// the stable error id.
    Errors(Vec<String>),
    Crash(String),
    Hang,
}

impl CompileOutput {
    pub fn error_ids(&self) -> Vec<String> {
        match self {
            CompileOutput::Errors(lines) => lines
                .iter()
                .filter_map(|l| l.split(':').next())
                .map(|id| id.trim().to_string())
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub trait Compiler {
    fn compile(&self, source: &str, release: bool) -> anyhow::Result<CompileOutput>;
}

pub struct HostCompiler {
    host: PathBuf,
    timeout: Duration,
}

impl HostCompiler {
    pub fn new(host: PathBuf, timeout: Duration) -> Self {
        Self { host, timeout }
    }
}

impl Compiler for HostCompiler {
    fn compile(&self, source: &str, release: bool) -> anyhow::Result<CompileOutput> {
        let mut cmd = Command::new(&self.host);
        cmd.arg("compile");
        if release {
            cmd.arg("--release");
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let mut stdin = child.stdin.take().unwrap();
        let src = source.as_bytes().to_vec();
        // The child may fill its stdout pipe before consuming all of
        // stdin; feed it from a separate thread.
        let writer = thread::spawn(move || {
            let _ = stdin.write_all(&src);
        });

        let mut stdout = child.stdout.take().unwrap();
        let mut stderr = child.stderr.take().unwrap();
        let (tx, rx) = mpsc::channel();
        let collector = thread::spawn(move || {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let _ = stdout.read_to_end(&mut out);
            let _ = stderr.read_to_end(&mut err);
            let _ = tx.send((out, err));
        });

        let (out, err) = match rx.recv_timeout(self.timeout) {
            Ok(pair) => pair,
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = writer.join();
                let _ = collector.join();
                return Ok(CompileOutput::Hang);
            }
        };
        let status = child.wait()?;
        let _ = writer.join();
        let _ = collector.join();

        let output = match status.code() {
            Some(0) => CompileOutput::Binary(out),
            Some(2) => CompileOutput::Errors(
                String::from_utf8_lossy(&err)
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| l.to_string())
                    .collect(),
            ),
            _ => CompileOutput::Crash(String::from_utf8_lossy(&err).into_owned()),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_ids_take_the_leading_token() {
        let out = CompileOutput::Errors(vec![
            "CS0165: Use of unassigned local variable 'var3'".to_string(),
            "CS0029: Cannot implicitly convert type".to_string(),
        ]);
        assert_eq!(out.error_ids(), vec!["CS0165", "CS0029"]);
        assert!(CompileOutput::Hang.error_ids().is_empty());
    }
}
