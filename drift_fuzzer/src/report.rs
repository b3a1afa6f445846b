//! Persistence of found examples and the append-only events log.

use crate::classify::PairOutcome;
use anyhow::Context;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::{
    fs::{create_dir_all, read_dir, read_to_string, remove_file, write, OpenOptions},
    io::Write as _,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Metadata saved next to each example, and the unit of the events log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleMeta {
    pub seed: u64,
    pub kind: String,
    pub debug_summary: String,
    pub release_summary: String,
    pub found_at: DateTime<Local>,
}

pub struct ExampleStore {
    out_dir: PathBuf,
    events: Option<Mutex<std::fs::File>>,
}

impl ExampleStore {
    pub fn new(out_dir: PathBuf, events_path: Option<&Path>) -> anyhow::Result<Self> {
        create_dir_all(&out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        let events = match events_path {
            Some(p) => Some(Mutex::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(p)
                    .with_context(|| format!("failed to open events log {}", p.display()))?,
            )),
            None => None,
        };
        Ok(Self { out_dir, events })
    }

    /// Persist one example; file names are keyed by seed so parallel
    /// workers never collide.
    pub fn save(&self, seed: u64, source: &str, outcome: &PairOutcome) -> anyhow::Result<()> {
        let (debug_summary, release_summary) = outcome.summary();
        let meta = ExampleMeta {
            seed,
            kind: outcome.kind().to_string(),
            debug_summary,
            release_summary,
            found_at: Local::now(),
        };
        write(self.source_path(seed), source)
            .with_context(|| format!("failed to save example for seed {}", seed))?;
        write(
            self.meta_path(seed),
            serde_json::to_string_pretty(&meta).unwrap(),
        )
        .with_context(|| format!("failed to save metadata for seed {}", seed))?;
        self.log_event(&meta);
        Ok(())
    }

    pub fn log_event(&self, meta: &ExampleMeta) {
        if let Some(events) = &self.events {
            let mut line = serde_json::to_string(meta).unwrap();
            line.push('\n');
            let mut f = events.lock().unwrap();
            if let Err(e) = f.write_all(line.as_bytes()) {
                log::warn!("failed to append event: {}", e);
            }
        }
    }

    pub fn source_path(&self, seed: u64) -> PathBuf {
        self.out_dir.join(format!("seed_{}.cs", seed))
    }

    pub fn meta_path(&self, seed: u64) -> PathBuf {
        self.out_dir.join(format!("seed_{}.json", seed))
    }
}

/// Saved examples of one directory, recovered from their metadata files.
pub fn load_examples(dir: &Path) -> anyhow::Result<Vec<ExampleMeta>> {
    let mut out = Vec::new();
    let iter =
        read_dir(dir).with_context(|| format!("failed to read_dir: {}", dir.display()))?;
    for entry in iter.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            let content = read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            match serde_json::from_str::<ExampleMeta>(&content) {
                Ok(meta) => out.push(meta),
                Err(e) => log::warn!("skipping {}: {}", path.display(), e),
            }
        }
    }
    out.sort_by_key(|m| m.seed);
    Ok(out)
}

/// Delete an example's files after it stopped reproducing.
pub fn remove_example(dir: &Path, seed: u64) -> anyhow::Result<()> {
    for name in [format!("seed_{}.cs", seed), format!("seed_{}.json", seed)] {
        let path = dir.join(name);
        if path.exists() {
            remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::PairOutcome;

    #[test]
    fn save_load_remove_roundtrip() {
        let dir = std::env::temp_dir().join(format!("drift-report-test-{}", std::process::id()));
        let store = ExampleStore::new(dir.clone(), None).unwrap();
        let outcome = PairOutcome::ExecutionCrash {
            stderr: "Fatal error. Internal CLR error.".to_string(),
        };
        store.save(42, "// example", &outcome).unwrap();

        let metas = load_examples(&dir).unwrap();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].seed, 42);
        assert_eq!(metas[0].kind, "crash");

        remove_example(&dir, 42).unwrap();
        assert!(load_examples(&dir).unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
