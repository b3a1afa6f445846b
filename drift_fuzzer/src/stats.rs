use crate::util::stop_soon;
use std::thread::sleep;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

#[derive(Debug, Default)]
pub struct Stats {
    programs: AtomicU64,
    compile_errors: AtomicU64,
    compiler_crashes: AtomicU64,
    crashes: AtomicU64,
    timeouts: AtomicU64,
    mismatches: AtomicU64,
    examples_saved: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the global index of the claimed program.
    pub fn inc_programs(&self) -> u64 {
        self.programs.fetch_add(1, Ordering::Relaxed)
    }

    pub fn programs(&self) -> u64 {
        self.programs.load(Ordering::Relaxed)
    }

    pub fn inc_compile_errors(&self) {
        self.compile_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_compiler_crashes(&self) {
        self.compiler_crashes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_crashes(&self) {
        self.crashes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_mismatches(&self) {
        self.mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_examples_saved(&self) {
        self.examples_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self, duration: Duration) {
        while !stop_soon() {
            sleep(duration);

            let programs = self.programs.load(Ordering::Relaxed);
            let compile_errors = self.compile_errors.load(Ordering::Relaxed);
            let compiler_crashes = self.compiler_crashes.load(Ordering::Relaxed);
            let crashes = self.crashes.load(Ordering::Relaxed);
            let timeouts = self.timeouts.load(Ordering::Relaxed);
            let mismatches = self.mismatches.load(Ordering::Relaxed);
            let saved = self.examples_saved.load(Ordering::Relaxed);
            log::info!(
                "programs: {}, mismatch/crash {}/{}, compiler err/crash {}/{}, timeouts: {}, saved: {}",
                programs, mismatches, crashes, compile_errors, compiler_crashes, timeouts, saved
            );
        }
    }
}
