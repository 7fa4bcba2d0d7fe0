//! Mirror finished fine-tune jobs into an experiment tracker.
//!
//! [`FineTuneSync`] pulls job records, skips jobs that did not succeed or
//! that the tracker already holds, gathers each job's result and input
//! files and hands the assembled [`FineTuneRun`] to a [`RunTracker`].

use async_trait::async_trait;
use bon::Builder;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::client::Client;
use crate::config::RequestOptions;
use crate::object::{ApiObject, ApiValue};
use crate::resources::{File, FineTune};
use engine_ox_common::RequestError;

pub const DEFAULT_PROJECT: &str = "GPT-3";

/// A run the tracker already knows about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingRun {
    /// Status recorded in the run summary
    pub status: Option<String>,
    pub url: Option<String>,
}

impl ExistingRun {
    pub fn is_succeeded(&self) -> bool {
        self.status.as_deref() == Some("succeeded")
    }
}

/// Destination for synced fine-tune jobs
#[async_trait]
pub trait RunTracker: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Look up the run stored at `run_path`, if any
    async fn run_state(&self, run_path: &str) -> Result<Option<ExistingRun>, Self::Error>;

    /// Store `run`, replacing whatever lives at its run path
    async fn log_run(&self, run: FineTuneRun) -> Result<(), Self::Error>;
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Tracker error: {0}")]
    Tracker(#[source] Box<dyn std::error::Error + Send + Sync>),
}

fn tracker_error<E: std::error::Error + Send + Sync + 'static>(err: E) -> SyncError {
    SyncError::Tracker(Box::new(err))
}

/// Which jobs to sync and where to
#[derive(Debug, Clone, Builder)]
pub struct SyncOptions {
    /// Sync exactly this job
    #[builder(into)]
    pub id: Option<String>,

    /// Without an id, only the most recent `n_jobs` jobs; zero means all
    pub n_jobs: Option<usize>,

    #[builder(default = DEFAULT_PROJECT.to_string(), into)]
    pub project: String,

    #[builder(into)]
    pub entity: Option<String>,

    /// Replace runs that were already logged successfully
    #[builder(default)]
    pub force: bool,

    #[builder(default)]
    pub request: RequestOptions,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SyncOptions {
    /// Tracker location for a job: `[entity/]project/job_id`
    pub fn run_path(&self, job_id: &str) -> String {
        match &self.entity {
            Some(entity) => format!("{entity}/{}/{job_id}", self.project),
            None => format!("{}/{job_id}", self.project),
        }
    }

    fn show_warnings(&self) -> bool {
        self.id.is_some() || self.n_jobs.is_some()
    }
}

/// Contents of a file attached to a job, handed over as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// The job lists no such file
    NotPresent,
    /// Listed, but could not be downloaded
    Unavailable { file_id: String, reason: String },
    /// Downloaded, but not valid UTF-8
    Malformed { file_id: String, reason: String },
    Present { file_id: String, text: String },
}

impl FileContent {
    pub fn text(&self) -> Option<&str> {
        match self {
            FileContent::Present { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, FileContent::Present { .. })
    }
}

/// A training or validation file with its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct InputFile {
    pub metadata: Value,
    pub filename: Option<String>,
    pub content: FileContent,
}

/// One fine-tune job, assembled for the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct FineTuneRun {
    pub run_path: String,
    pub job_id: String,
    pub project: String,
    pub entity: Option<String>,
    /// Job record with file lists flattened to their first entry
    pub config: Map<String, Value>,
    /// Full job record
    pub job: Value,
    pub fine_tuned_model: Option<String>,
    /// Result metrics file, CSV as produced by the service
    pub results: FileContent,
    pub training_file: Option<InputFile>,
    pub validation_file: Option<InputFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotSucceeded { status: Option<String> },
    AlreadyLogged { url: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Logged {
        job_id: String,
        run_path: String,
        /// A previous run at the same path was replaced
        replaced: bool,
    },
    Skipped {
        job_id: String,
        reason: SkipReason,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: Vec<JobOutcome>,
}

impl SyncReport {
    pub fn logged(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, JobOutcome::Logged { .. }))
    }

    pub fn logged_count(&self) -> usize {
        self.logged().count()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Sync context: the client to read jobs with and the tracker to write to
pub struct FineTuneSync<'a, T> {
    client: &'a Client,
    tracker: &'a T,
}

impl<'a, T: RunTracker> FineTuneSync<'a, T> {
    pub fn new(client: &'a Client, tracker: &'a T) -> Self {
        Self { client, tracker }
    }

    pub async fn sync(&self, options: &SyncOptions) -> Result<SyncReport, SyncError> {
        let fine_tunes = FineTune::new(self.client);

        let jobs = match &options.id {
            Some(id) => vec![fine_tunes.retrieve(id, &options.request).await?.without("events")],
            None => {
                let list = fine_tunes.list(&options.request).await?;
                let Some(data) = list["data"].as_array() else {
                    tracing::info!("no fine-tune jobs have been retrieved");
                    return Ok(SyncReport::default());
                };
                let jobs: Vec<ApiObject> = data.iter().filter_map(ApiValue::as_object).cloned().collect();
                // Zero keeps every job, like an unset limit
                let keep = match options.n_jobs {
                    Some(n) if n > 0 => n.min(jobs.len()),
                    _ => jobs.len(),
                };
                jobs[jobs.len() - keep..].to_vec()
            }
        };

        let show_warnings = options.show_warnings();
        let mut report = SyncReport::default();

        // Oldest first
        for job in &jobs {
            report.outcomes.push(self.sync_job(job, options, show_warnings).await?);
        }

        if !show_warnings && report.logged_count() == 0 {
            tracing::info!("no new successful fine-tunes were found");
        }

        Ok(report)
    }

    async fn sync_job(
        &self,
        job: &ApiObject,
        options: &SyncOptions,
        show_warnings: bool,
    ) -> Result<JobOutcome, SyncError> {
        let job_id = job.id().unwrap_or_default().to_string();
        let status = job.get_str("status");

        if status != Some("succeeded") {
            if show_warnings {
                tracing::warn!(%job_id, ?status, "fine-tune job did not succeed and will not be logged");
            }
            return Ok(JobOutcome::Skipped {
                job_id,
                reason: SkipReason::NotSucceeded {
                    status: status.map(str::to_string),
                },
            });
        }

        let run_path = options.run_path(&job_id);
        let existing = self
            .tracker
            .run_state(&run_path)
            .await
            .map_err(tracker_error)?;

        if let Some(existing) = &existing {
            if existing.is_succeeded() && !options.force {
                if show_warnings {
                    tracing::warn!(
                        %job_id,
                        url = ?existing.url,
                        "fine-tune job has already been logged successfully, use force to overwrite"
                    );
                }
                return Ok(JobOutcome::Skipped {
                    job_id,
                    reason: SkipReason::AlreadyLogged {
                        url: existing.url.clone(),
                    },
                });
            }
            if show_warnings {
                tracing::info!(%job_id, %run_path, "previous run will be overwritten");
            }
        }

        let run = self.assemble(job, job_id.clone(), run_path.clone(), options).await;
        self.tracker.log_run(run).await.map_err(tracker_error)?;
        tracing::info!(%job_id, %run_path, "fine-tune job logged");

        Ok(JobOutcome::Logged {
            job_id,
            run_path,
            replaced: existing.is_some(),
        })
    }

    async fn assemble(
        &self,
        job: &ApiObject,
        job_id: String,
        run_path: String,
        options: &SyncOptions,
    ) -> FineTuneRun {
        let results = match first_file(job, "result_files") {
            Some(file) => self.fetch(file, &options.request).await,
            None => FileContent::NotPresent,
        };

        FineTuneRun {
            run_path,
            job_id,
            project: options.project.clone(),
            entity: options.entity.clone(),
            config: flatten_config(job),
            job: job.to_value(),
            fine_tuned_model: job.get_str("fine_tuned_model").map(str::to_string),
            results,
            training_file: self.input_file(job, "training_files", &options.request).await,
            validation_file: self.input_file(job, "validation_files", &options.request).await,
        }
    }

    async fn input_file(&self, job: &ApiObject, key: &str, request: &RequestOptions) -> Option<InputFile> {
        let file = first_file(job, key)?;
        let content = self.fetch(file, request).await;

        Some(InputFile {
            metadata: file.to_value(),
            filename: file.get_str("filename").map(str::to_string),
            content,
        })
    }

    async fn fetch(&self, file: &ApiObject, request: &RequestOptions) -> FileContent {
        let Some(file_id) = file.id().map(str::to_string) else {
            return FileContent::NotPresent;
        };

        let bytes = match File::new(self.client).download(&file_id, request).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%file_id, error = %err, "file could not be retrieved");
                return FileContent::Unavailable {
                    file_id,
                    reason: err.to_string(),
                };
            }
        };

        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => FileContent::Present { file_id, text },
            Err(err) => {
                tracing::warn!(%file_id, error = %err, "file contents are not valid UTF-8");
                FileContent::Malformed {
                    file_id,
                    reason: err.to_string(),
                }
            }
        }
    }
}

fn first_file<'o>(job: &'o ApiObject, key: &str) -> Option<&'o ApiObject> {
    job[key][0].as_object()
}

/// Job record with each non-empty file list replaced by its first entry
fn flatten_config(job: &ApiObject) -> Map<String, Value> {
    let mut config = job.to_map();
    for key in ["training_files", "validation_files", "result_files"] {
        if let Some(first) = config
            .get(key)
            .and_then(Value::as_array)
            .and_then(|files| files.first())
            .cloned()
        {
            config.insert(key.to_string(), first);
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_run_path() {
        let options = SyncOptions::default();
        assert_eq!(options.run_path("ft-1"), "GPT-3/ft-1");

        let options = SyncOptions::builder().project("tuning").entity("acme").build();
        assert_eq!(options.run_path("ft-1"), "acme/tuning/ft-1");
    }

    #[test]
    fn test_show_warnings_only_for_targeted_syncs() {
        assert!(!SyncOptions::default().show_warnings());
        assert!(SyncOptions::builder().id("ft-1").build().show_warnings());
        assert!(SyncOptions::builder().n_jobs(2).build().show_warnings());
    }

    #[test]
    fn test_flatten_config_takes_first_entries() {
        let job = ApiObject::from_json(
            json!({
                "id": "ft-1",
                "training_files": [{"id": "file-t1"}, {"id": "file-t2"}],
                "validation_files": [],
                "result_files": [{"id": "file-r"}]
            }),
            None,
            Arc::default(),
        )
        .unwrap();

        let config = flatten_config(&job);
        assert_eq!(config["training_files"], json!({"id": "file-t1"}));
        assert_eq!(config["validation_files"], json!([]));
        assert_eq!(config["result_files"], json!({"id": "file-r"}));
    }
}
