//! JSON issue store
//!
//! Persists detected issues as one JSON array on disk:
//! - Append one issue or a batch
//! - FIFO eviction down to the most recent `max_entries`
//! - Falls back to `issues.json` in the working directory when the
//!   configured directory cannot be created
//! - A file that no longer parses is moved aside before the next write

use crate::error::StoreError;
use crate::models::Issue;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default on-disk location inside the daemon container
pub const DEFAULT_STORAGE_PATH: &str = "/data/issues.json";

/// Default number of retained issues
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

const FALLBACK_PATH: &str = "issues.json";

/// Bounded append-only issue log
#[derive(Debug, Clone)]
pub struct IssueStore {
    path: PathBuf,
    max_entries: usize,
}

impl IssueStore {
    /// Open a store at `path`, creating its parent directory if needed
    pub fn open(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        let requested = path.into();
        let path = match requested.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
                match fs::create_dir_all(dir) {
                    Ok(()) => requested,
                    Err(e) => {
                        warn!(
                            path = %requested.display(),
                            error = %e,
                            "Cannot create storage directory, falling back to {}",
                            FALLBACK_PATH
                        );
                        PathBuf::from(FALLBACK_PATH)
                    }
                }
            }
            _ => requested,
        };

        Self {
            path,
            max_entries: max_entries.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// All stored issues, oldest first. A missing or unreadable file is empty.
    pub fn load(&self) -> Vec<Issue> {
        match self.read() {
            Ok(issues) => issues,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read issue store, treating as empty"
                );
                Vec::new()
            }
        }
    }

    pub fn append(&self, issue: Issue) -> Result<(), StoreError> {
        self.append_all(std::iter::once(issue))
    }

    /// Append a batch and rewrite the file once.
    ///
    /// An unreadable file fails the append; an unparsable one is renamed
    /// to `<name>.corrupt-<timestamp>` and the store starts over.
    pub fn append_all(&self, issues: impl IntoIterator<Item = Issue>) -> Result<(), StoreError> {
        let mut stored = match self.read() {
            Ok(stored) => stored,
            Err(StoreError::Encoding(e)) => {
                let moved_to = self.quarantine()?;
                warn!(
                    path = %self.path.display(),
                    moved_to = %moved_to.display(),
                    error = %e,
                    "Issue store is corrupt, moved aside"
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        stored.extend(issues);

        if stored.len() > self.max_entries {
            let excess = stored.len() - self.max_entries;
            stored.drain(..excess);
            debug!(evicted = excess, "Evicted oldest stored issues");
        }

        self.write(&stored)
    }

    fn quarantine(&self) -> Result<PathBuf, StoreError> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| FALLBACK_PATH.to_string());
        let target = self.path.with_file_name(format!(
            "{}.corrupt-{}",
            name,
            Utc::now().format("%Y%m%dT%H%M%S%.3f")
        ));
        fs::rename(&self.path, &target)?;
        Ok(target)
    }

    fn read(&self) -> Result<Vec<Issue>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read(&self.path)?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    fn write(&self, issues: &[Issue]) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(issues)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
