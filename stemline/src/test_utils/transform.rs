use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crate::transform::{Transform, TransformError};

/// Copies lines unchanged after sleeping for a fixed delay.
#[derive(Debug, Clone)]
pub struct SlowIdentity {
    delay: Duration,
}

impl SlowIdentity {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Transform for SlowIdentity {
    fn apply(&mut self, line: &str) -> Result<String, TransformError> {
        thread::sleep(self.delay);

        Ok(line.to_owned())
    }
}

/// Uppercases lines, except that lines containing one of the markers fail or panic.
#[derive(Debug, Clone)]
pub struct FaultyUppercase {
    fail_marker: &'static str,
    panic_marker: &'static str,
}

impl FaultyUppercase {
    pub fn new(fail_marker: &'static str, panic_marker: &'static str) -> Self {
        Self {
            fail_marker,
            panic_marker,
        }
    }
}

impl Transform for FaultyUppercase {
    fn apply(&mut self, line: &str) -> Result<String, TransformError> {
        if line.contains(self.panic_marker) {
            panic!("refusing to transform '{line}'");
        }

        if line.contains(self.fail_marker) {
            return Err(TransformError::new(format!("cannot transform '{line}'")));
        }

        Ok(line.to_uppercase())
    }
}

/// Copies lines unchanged and counts the calls made across every clone.
#[derive(Debug, Clone, Default)]
pub struct CountingIdentity {
    calls: Arc<AtomicU64>,
}

impl CountingIdentity {
    /// Returns the number of lines transformed by this transform and its clones.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transform for CountingIdentity {
    fn apply(&mut self, line: &str) -> Result<String, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        Ok(line.to_owned())
    }
}
