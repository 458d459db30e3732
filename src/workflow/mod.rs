//! Client side of the pipeline: upload a local image, wait for the handler's
//! derivative to appear in the target bucket, download it and keep it in
//! memory until the user saves it.
//!
//! The store round trips run on a background task. Every status change is
//! sent back over a single channel and applied by the owner of
//! [`ClientWorkflow`], which is the only place user-visible state changes.

use crate::config::{Buckets, ClientConfig};
use crate::error::{PipelineError, Result};
use crate::models::{PollOutcome, UploadJob, base_name, suggested_filename};
use crate::services::poller::Poller;
use crate::services::storage::ObjectStore;
use crate::services::uploader::Uploader;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Extensions accepted by [`ClientWorkflow::select`]
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Selected,
    Uploading,
    WaitingForDerived,
    Ready,
    Error,
}

/// Messages from the background task, delivered in order. The last one is
/// always `Completed`, `TimedOut` or `Failed`.
#[derive(Debug)]
pub enum WorkflowEvent {
    Uploaded { key: String },
    Progress { attempt: u32, max_attempts: u32 },
    Found,
    Completed { data: Bytes },
    TimedOut { attempts: u32 },
    Failed(PipelineError),
}

impl WorkflowEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::Completed { .. } | WorkflowEvent::TimedOut { .. } | WorkflowEvent::Failed(_)
        )
    }
}

/// Why the last run ended in [`WorkflowState::Error`]
#[derive(Debug)]
pub enum Failure {
    TimedOut { attempts: u32 },
    Aborted(PipelineError),
}

#[derive(Clone)]
struct PipelineContext {
    storage: Arc<dyn ObjectStore>,
    uploader: Arc<Uploader>,
    poller: Arc<Poller>,
    buckets: Buckets,
}

pub struct ClientWorkflow {
    ctx: PipelineContext,
    state: WorkflowState,
    selected: Option<PathBuf>,
    retained: Option<Bytes>,
    failure: Option<Failure>,
    status: String,
}

impl ClientWorkflow {
    /// Fails with a configuration error before touching the store.
    pub fn new(storage: Arc<dyn ObjectStore>, config: &ClientConfig) -> Result<Self> {
        let buckets = config.validate()?;

        let ctx = PipelineContext {
            uploader: Arc::new(Uploader::new(storage.clone())),
            poller: Arc::new(Poller::new(
                storage.clone(),
                config.max_attempts,
                config.poll_interval,
            )),
            storage,
            buckets,
        };

        Ok(Self {
            ctx,
            state: WorkflowState::Idle,
            selected: None,
            retained: None,
            failure: None,
            status: "No image selected.".to_string(),
        })
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn selected(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn retained_bytes(&self) -> Option<&Bytes> {
        self.retained.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            WorkflowState::Uploading | WorkflowState::WaitingForDerived
        )
    }

    /// Chooses the local file to process next, discarding any previous
    /// result. Rejected selections leave the workflow untouched.
    pub fn select(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        if self.is_busy() {
            return Err(PipelineError::InvalidSelection(
                "an upload is already in progress".to_string(),
            ));
        }

        let path = path.into();
        let name = base_name(&path).ok_or_else(|| {
            PipelineError::InvalidSelection(format!("{} has no file name", path.display()))
        })?;

        let accepted = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                ACCEPTED_EXTENSIONS
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            })
            .unwrap_or(false);
        if !accepted {
            return Err(PipelineError::InvalidSelection(format!(
                "{} is not a JPEG or PNG image",
                name
            )));
        }

        if !path.is_file() {
            return Err(PipelineError::InvalidSelection(format!(
                "{} does not exist or is not a regular file",
                path.display()
            )));
        }

        self.retained = None;
        self.failure = None;
        self.status = format!("Selected file: {}", name);
        self.selected = Some(path);
        self.state = WorkflowState::Selected;
        Ok(())
    }

    /// Starts upload, poll and download on a background task and returns
    /// the receiving end of its event channel.
    pub fn start(&mut self) -> Result<mpsc::UnboundedReceiver<WorkflowEvent>> {
        if self.state != WorkflowState::Selected {
            return Err(PipelineError::InvalidSelection(
                "select an image before uploading".to_string(),
            ));
        }

        let path = self.selected.clone().ok_or_else(|| {
            PipelineError::InvalidSelection("select an image before uploading".to_string())
        })?;
        let job = UploadJob::new(path, self.ctx.buckets.source.clone()).ok_or_else(|| {
            PipelineError::InvalidSelection("selected path has no file name".to_string())
        })?;

        self.status = format!(
            "Uploading {} to S3 and waiting for processing...",
            job.key
        );
        self.state = WorkflowState::Uploading;

        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let event = match execute(&ctx, &job, &tx).await {
                Ok(PollResult::Downloaded(data)) => WorkflowEvent::Completed { data },
                Ok(PollResult::Exhausted(attempts)) => WorkflowEvent::TimedOut { attempts },
                Err(e) => WorkflowEvent::Failed(e),
            };
            // Receiver gone means the foreground stopped listening
            let _ = tx.send(event);
        });

        Ok(rx)
    }

    /// Applies one event from the background task.
    pub fn apply(&mut self, event: WorkflowEvent) {
        if !self.is_busy() {
            warn!("Ignoring workflow event outside of a run: {:?}", event);
            return;
        }

        match event {
            WorkflowEvent::Uploaded { key } => {
                self.state = WorkflowState::WaitingForDerived;
                self.status = format!("'{}' uploaded! Waiting for the resize handler...", key);
            }
            WorkflowEvent::Progress {
                attempt,
                max_attempts,
            } => {
                self.status = format!("Waiting... ({}/{})", attempt, max_attempts);
            }
            WorkflowEvent::Found => {
                self.status = "Resized image found! Downloading...".to_string();
            }
            WorkflowEvent::Completed { data } => {
                self.status = format!("Processing complete ({} bytes).", data.len());
                self.retained = Some(data);
                self.state = WorkflowState::Ready;
            }
            WorkflowEvent::TimedOut { attempts } => {
                self.status = format!(
                    "Error: resized image not found in the target bucket after {} attempts.",
                    attempts
                );
                self.retained = None;
                self.failure = Some(Failure::TimedOut { attempts });
                self.state = WorkflowState::Error;
            }
            WorkflowEvent::Failed(e) => {
                self.status = format!("Error: {}", e);
                self.retained = None;
                self.failure = Some(Failure::Aborted(e));
                self.state = WorkflowState::Error;
            }
        }
    }

    /// Applies events until the run ends, calling `on_update` after each.
    pub async fn drive<F>(
        &mut self,
        mut events: mpsc::UnboundedReceiver<WorkflowEvent>,
        mut on_update: F,
    ) -> WorkflowState
    where
        F: FnMut(&ClientWorkflow),
    {
        while let Some(event) = events.recv().await {
            let terminal = event.is_terminal();
            self.apply(event);
            on_update(&*self);
            if terminal {
                return self.state;
            }
        }

        // Channel closed without a final event: the task died
        if self.is_busy() {
            error!("Background workflow task ended without reporting a result");
            self.status = "Error: background task ended unexpectedly.".to_string();
            self.failure = Some(Failure::Aborted(PipelineError::TaskFailed(
                "workflow task ended without reporting a result".to_string(),
            )));
            self.state = WorkflowState::Error;
            on_update(&*self);
        }
        self.state
    }

    /// Convenience for non-interactive callers: start and drive to the end.
    pub async fn run<F>(&mut self, on_update: F) -> Result<WorkflowState>
    where
        F: FnMut(&ClientWorkflow),
    {
        let events = self.start()?;
        Ok(self.drive(events, on_update).await)
    }

    /// `resized_<original-basename>`, available once a result is retained.
    pub fn suggested_filename(&self) -> Option<String> {
        self.retained.as_ref()?;
        let name = base_name(self.selected.as_deref()?)?;
        Some(suggested_filename(&name))
    }

    /// Writes the retained derivative to `path`.
    pub async fn save_as(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let data = self.retained.as_ref().ok_or(PipelineError::NoResult)?;
        let path = path.as_ref().to_path_buf();
        tokio::fs::write(&path, data).await?;
        info!("💾 Saved resized image to {}", path.display());
        Ok(path)
    }
}

enum PollResult {
    Downloaded(Bytes),
    Exhausted(u32),
}

async fn execute(
    ctx: &PipelineContext,
    job: &UploadJob,
    tx: &mpsc::UnboundedSender<WorkflowEvent>,
) -> Result<PollResult> {
    let key = ctx.uploader.upload(job).await?;
    let _ = tx.send(WorkflowEvent::Uploaded { key });

    let derived = job.derived_key();
    let target = &ctx.buckets.target;
    let progress = tx.clone();
    let outcome = ctx
        .poller
        .wait_for(target, &derived, move |attempt, max_attempts| {
            let _ = progress.send(WorkflowEvent::Progress {
                attempt,
                max_attempts,
            });
        })
        .await?;

    match outcome {
        PollOutcome::Found { .. } => {
            let _ = tx.send(WorkflowEvent::Found);
            let data = ctx
                .storage
                .get(target, &derived)
                .await
                .map_err(|source| PipelineError::Fetch {
                    bucket: target.clone(),
                    key: derived.clone(),
                    source,
                })?;
            info!("📥 Downloaded s3://{}/{} ({} bytes)", target, derived, data.len());
            Ok(PollResult::Downloaded(data))
        }
        PollOutcome::Exhausted { attempts } => {
            warn!(
                "s3://{}/{} did not appear after {} attempts",
                target, derived, attempts
            );
            Ok(PollResult::Exhausted(attempts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Write;

    struct UnreachableStore;

    #[async_trait]
    impl ObjectStore for UnreachableStore {
        async fn put(&self, _: &str, _: &str, _: Bytes, _: Option<&str>) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("store unreachable"))
        }

        async fn get(&self, _: &str, _: &str) -> anyhow::Result<Bytes> {
            Err(anyhow::anyhow!("store unreachable"))
        }

        async fn head(&self, _: &str, _: &str) -> anyhow::Result<bool> {
            Err(anyhow::anyhow!("store unreachable"))
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            source_bucket: Some("source".to_string()),
            target_bucket: Some("target".to_string()),
            ..ClientConfig::default()
        }
    }

    fn workflow() -> ClientWorkflow {
        ClientWorkflow::new(Arc::new(UnreachableStore), &config()).unwrap()
    }

    fn image_file(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"not really a png").unwrap();
        path
    }

    #[test]
    fn test_missing_bucket_fails_construction() {
        let config = ClientConfig {
            target_bucket: None,
            ..config()
        };
        let err = ClientWorkflow::new(Arc::new(UnreachableStore), &config)
            .err()
            .unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_select_accepts_images_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut wf = workflow();
        assert_eq!(wf.state(), WorkflowState::Idle);

        let txt = image_file(&dir, "notes.txt");
        assert!(matches!(wf.select(&txt), Err(PipelineError::InvalidSelection(_))));
        assert_eq!(wf.state(), WorkflowState::Idle);

        let missing = dir.path().join("ghost.png");
        assert!(wf.select(&missing).is_err());

        let png = image_file(&dir, "Photo.PNG");
        wf.select(&png).unwrap();
        assert_eq!(wf.state(), WorkflowState::Selected);
        assert_eq!(wf.selected(), Some(png.as_path()));
    }

    #[tokio::test]
    async fn test_start_requires_selection() {
        let mut wf = workflow();
        assert!(wf.start().is_err());
        assert_eq!(wf.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn test_event_transitions_to_ready() {
        let dir = tempfile::tempdir().unwrap();
        let mut wf = workflow();
        wf.select(image_file(&dir, "cat.jpg")).unwrap();
        wf.state = WorkflowState::Uploading;

        wf.apply(WorkflowEvent::Uploaded {
            key: "cat.jpg".to_string(),
        });
        assert_eq!(wf.state(), WorkflowState::WaitingForDerived);

        wf.apply(WorkflowEvent::Progress {
            attempt: 2,
            max_attempts: 30,
        });
        assert_eq!(wf.status(), "Waiting... (2/30)");
        assert_eq!(wf.state(), WorkflowState::WaitingForDerived);
        assert!(wf.suggested_filename().is_none());

        wf.apply(WorkflowEvent::Found);
        wf.apply(WorkflowEvent::Completed {
            data: Bytes::from_static(b"resized"),
        });
        assert_eq!(wf.state(), WorkflowState::Ready);
        assert_eq!(wf.suggested_filename().as_deref(), Some("resized_cat.jpg"));

        let out = dir.path().join("out.jpg");
        wf.save_as(&out).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"resized");

        // Fresh selection drops the previous result
        wf.select(image_file(&dir, "dog.png")).unwrap();
        assert_eq!(wf.state(), WorkflowState::Selected);
        assert!(wf.retained_bytes().is_none());
        assert!(matches!(
            wf.save_as(dir.path().join("x.png")).await,
            Err(PipelineError::NoResult)
        ));
    }

    #[test]
    fn test_timeout_is_distinct_from_abort() {
        let dir = tempfile::tempdir().unwrap();
        let mut wf = workflow();
        wf.select(image_file(&dir, "cat.jpg")).unwrap();
        wf.state = WorkflowState::WaitingForDerived;

        wf.apply(WorkflowEvent::TimedOut { attempts: 30 });
        assert_eq!(wf.state(), WorkflowState::Error);
        assert!(matches!(
            wf.failure(),
            Some(Failure::TimedOut { attempts: 30 })
        ));
        assert!(wf.retained_bytes().is_none());
        assert!(wf.suggested_filename().is_none());
    }

    #[tokio::test]
    async fn test_closed_channel_without_result_is_task_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut wf = workflow();
        wf.select(image_file(&dir, "cat.jpg")).unwrap();
        wf.state = WorkflowState::Uploading;

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(WorkflowEvent::Uploaded {
            key: "cat.jpg".to_string(),
        })
        .unwrap();
        drop(tx);

        let state = wf.drive(rx, |_| {}).await;
        assert_eq!(state, WorkflowState::Error);
        assert!(matches!(
            wf.failure(),
            Some(Failure::Aborted(PipelineError::TaskFailed(_)))
        ));
        assert!(wf.retained_bytes().is_none());
    }

    #[test]
    fn test_events_ignored_when_idle() {
        let mut wf = workflow();
        wf.apply(WorkflowEvent::Completed {
            data: Bytes::from_static(b"stale"),
        });
        assert_eq!(wf.state(), WorkflowState::Idle);
        assert!(wf.retained_bytes().is_none());
    }

    #[tokio::test]
    async fn test_upload_failure_ends_in_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut wf = workflow();
        wf.select(image_file(&dir, "cat.jpg")).unwrap();

        let state = wf.run(|_| {}).await.unwrap();
        assert_eq!(state, WorkflowState::Error);
        assert!(matches!(
            wf.failure(),
            Some(Failure::Aborted(PipelineError::Upload { .. }))
        ));
        assert!(wf.status().contains("store unreachable"));
    }
}
