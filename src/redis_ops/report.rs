use std::fmt;

/// A single non-fatal command failure for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFailure {
    pub key: String,
    pub command: &'static str,
    pub error: String,
}

impl KeyFailure {
    pub fn new(key: &str, command: &'static str, error: impl fmt::Display) -> Self {
        Self {
            key: key.to_string(),
            command,
            error: error.to_string(),
        }
    }
}

/// What happened to one key during a dump or restore.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    Succeeded,
    /// Nothing to transfer: unsupported type, vanished key or unread value.
    Skipped,
    Failed(Vec<KeyFailure>),
}

impl KeyOutcome {
    pub(crate) fn from_failures(failures: Vec<KeyFailure>) -> Self {
        if failures.is_empty() {
            Self::Succeeded
        } else {
            Self::Failed(failures)
        }
    }
}

/// Per-database tally, handed back to the caller instead of logging inline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseReport {
    pub db: u32,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<KeyFailure>,
}

impl DatabaseReport {
    pub fn new(db: u32) -> Self {
        Self {
            db,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: KeyOutcome) {
        match outcome {
            KeyOutcome::Succeeded => self.succeeded += 1,
            KeyOutcome::Skipped => self.skipped += 1,
            KeyOutcome::Failed(failures) => {
                self.failed += 1;
                self.failures.extend(failures);
            }
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

impl fmt::Display for DatabaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "db{}: {} keys, {} succeeded, {} failed, {} skipped",
            self.db,
            self.total(),
            self.succeeded,
            self.failed,
            self.skipped
        )
    }
}
