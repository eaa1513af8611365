//! Full-replace load run: enumerate → connect → ensure schema → reset →
//! load each file in order → done.
//!
//! The first failing step ends the run. Files committed before the failure
//! stay in the sink; later files are never attempted. Because every run
//! starts with a reset, rerunning from scratch is always safe.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use taxi_core::config::SourceConfig;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::LoadError;
use crate::source::{self, FilePattern};
use crate::transform::{CopyBatch, Transformer};
use crate::warehouse::Warehouse;

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Start,
    Enumerate,
    Connect,
    EnsureSchema,
    Reset,
    /// Zero-based position in the batch.
    LoadFile { index: usize },
    Done,
    Failed,
}

/// Outcome of one committed file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub rows: u64,
    pub elapsed_ms: u64,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Always [`RunState::Done`]; failures surface as errors instead.
    #[serde(flatten)]
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
    pub total_rows: u64,
}

impl RunReport {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Sequences one full-replace load against a [`Warehouse`].
///
/// Strictly sequential: a file is fully decoded and committed before the
/// next one is opened. Concurrent runs against the same table are not
/// guarded here; the scheduler must serialize them.
pub struct Pipeline<W: Warehouse> {
    warehouse: W,
    source_dir: PathBuf,
    pattern: FilePattern,
    transformer: Transformer,
    state: RunState,
    completed: Vec<FileReport>,
}

impl<W: Warehouse> Pipeline<W> {
    pub fn new(warehouse: W, source: &SourceConfig) -> Self {
        Self::with_pattern(warehouse, &source.data_dir, FilePattern::from_config(source))
    }

    pub fn with_pattern(warehouse: W, source_dir: &Path, pattern: FilePattern) -> Self {
        Self {
            warehouse,
            source_dir: source_dir.to_path_buf(),
            pattern,
            transformer: Transformer::default(),
            state: RunState::Start,
            completed: Vec::new(),
        }
    }

    pub fn with_transformer(mut self, transformer: Transformer) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Files committed so far in the current (or last) run.
    pub fn completed(&self) -> &[FileReport] {
        &self.completed
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    /// Execute a full run. On error the state is left at [`RunState::Failed`]
    /// and [`Pipeline::completed`] lists what was committed before it.
    pub async fn run(&mut self) -> Result<RunReport, LoadError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("bulk_load", %run_id);
        self.completed.clear();
        self.state = RunState::Start;

        let result = self.execute(run_id).instrument(span.clone()).await;
        let _enter = span.enter();
        match &result {
            Ok(report) => {
                self.state = RunState::Done;
                info!(
                    files = report.file_count(),
                    total_rows = report.total_rows,
                    "load run complete"
                );
            }
            Err(e) => {
                error!(
                    failed_at = ?self.state,
                    kind = e.kind(),
                    committed_files = self.completed.len(),
                    error = %e,
                    "load run failed"
                );
                self.state = RunState::Failed;
            }
        }
        result
    }

    async fn execute(&mut self, run_id: Uuid) -> Result<RunReport, LoadError> {
        let started_at = Utc::now();

        self.state = RunState::Enumerate;
        let batch = source::enumerate(&self.source_dir, &self.pattern)?;
        for f in batch.files() {
            info!(file = %f.display(), "queued");
        }

        self.state = RunState::Connect;
        self.warehouse.connect().await?;

        self.state = RunState::EnsureSchema;
        self.warehouse.ensure_schema().await?;
        for drift in self.warehouse.detect_drift().await? {
            warn!(%drift, "sink table layout differs from schema; it will not be altered");
        }

        self.state = RunState::Reset;
        self.warehouse.reset_contents().await?;

        let total = batch.len();
        for (index, path) in batch.files().iter().enumerate() {
            self.state = RunState::LoadFile { index };
            let started = Instant::now();
            info!(file = %path.display(), n = index + 1, of = total, "loading");

            let copy = self.transform(path).await?;
            let rows = self.warehouse.transfer(&copy).await?;
            if rows == 0 {
                warn!(file = %path.display(), "file contained no rows");
            }

            let elapsed_ms = started.elapsed().as_millis() as u64;
            info!(file = %path.display(), rows, elapsed_ms, "finished loading");
            self.completed.push(FileReport {
                path: path.clone(),
                rows,
                elapsed_ms,
            });
        }

        Ok(RunReport {
            run_id,
            state: RunState::Done,
            started_at,
            finished_at: Utc::now(),
            total_rows: self.completed.iter().map(|f| f.rows).sum(),
            files: self.completed.clone(),
        })
    }

    /// Decode off the async runtime; awaited before the transfer starts.
    async fn transform(&self, path: &Path) -> Result<CopyBatch, LoadError> {
        let transformer = self.transformer.clone();
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || transformer.transform_file(&owned))
            .await
            .map_err(|e| LoadError::Io(std::io::Error::other(e)))?
    }
}
