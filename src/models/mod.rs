use serde::Serialize;
use std::path::{Path, PathBuf};

/// Prefix under which the handler writes resized derivatives.
pub const DERIVED_PREFIX: &str = "resized/";

/// Prefix for the locally suggested file name of a downloaded derivative.
pub const SAVE_AS_PREFIX: &str = "resized_";

/// Target-store key of the derivative for `source_key`.
pub fn derived_key(source_key: &str) -> String {
    format!("{}{}", DERIVED_PREFIX, source_key)
}

/// Base name of a local path, used as the source-store key.
pub fn base_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

/// Default file name offered when saving a derivative locally.
pub fn suggested_filename(original: &str) -> String {
    format!("{}{}", SAVE_AS_PREFIX, original)
}

/// One entry of an object-created notification batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub bucket: String,
    pub key: String,
}

impl NotificationRecord {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// A local file scheduled for upload into the source store.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub path: PathBuf,
    pub bucket: String,
    pub key: String,
}

impl UploadJob {
    /// Returns `None` when the path has no file name component.
    pub fn new(path: impl Into<PathBuf>, bucket: impl Into<String>) -> Option<Self> {
        let path = path.into();
        let key = base_name(&path)?;
        Some(Self {
            path,
            bucket: bucket.into(),
            key,
        })
    }

    pub fn derived_key(&self) -> String {
        derived_key(&self.key)
    }
}

/// Terminal result of polling the target store for a derived key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Found { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl PollOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, PollOutcome::Found { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Found { attempts } | PollOutcome::Exhausted { attempts } => *attempts,
        }
    }
}

/// Per-batch result reported by the handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub written_keys: Vec<String>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.processed + self.failed
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_key_prefixes_source_key() {
        assert_eq!(derived_key("cat.png"), "resized/cat.png");
        assert_eq!(derived_key("a/b c.jpg"), "resized/a/b c.jpg");
        assert_eq!(derived_key("cat.png"), derived_key("cat.png"));
    }

    #[test]
    fn test_upload_job_uses_base_name() {
        let job = UploadJob::new("/tmp/photos/holiday.jpg", "source").unwrap();
        assert_eq!(job.key, "holiday.jpg");
        assert_eq!(job.derived_key(), "resized/holiday.jpg");
        assert!(UploadJob::new("/", "source").is_none());
    }

    #[test]
    fn test_suggested_filename() {
        assert_eq!(suggested_filename("holiday.jpg"), "resized_holiday.jpg");
    }

    #[test]
    fn test_batch_summary_counts() {
        let summary = BatchSummary {
            processed: 1,
            failed: 1,
            written_keys: vec!["resized/ok.png".to_string()],
        };
        assert_eq!(summary.total(), 2);
        assert!(!summary.all_succeeded());
    }
}
