use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle stage of an import job.
///
/// `Queued`, `Parsing` and `Processing` are reported while the upload request is
/// being handled; `Completed` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStage {
    Queued,
    Parsing,
    Processing,
    Completed,
    Failed,
}

impl ImportStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ImportStage::Completed | ImportStage::Failed)
    }
}

/// Progress snapshot of an import job, as returned by `GET /api/import/progress/{id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub stage: ImportStage,
    /// Percentage in `0..=100`.
    pub progress: u8,
    pub message: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ImportProgress {
    /// Initial progress of a freshly registered job.
    pub fn queued(started_at: DateTime<Utc>) -> Self {
        Self {
            stage: ImportStage::Queued,
            progress: 0,
            message: "Queued".to_string(),
            started_at,
            completed_at: None,
        }
    }

    /// Returns a copy moved to `stage`, keeping the original start time.
    pub fn advance(&self, stage: ImportStage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.min(100),
            message: message.into(),
            started_at: self.started_at,
            completed_at: None,
        }
    }

    /// Returns a terminal copy stamped with `completed_at`.
    pub fn finish(
        &self,
        stage: ImportStage,
        message: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let progress = if stage == ImportStage::Completed {
            100
        } else {
            self.progress
        };
        Self {
            stage,
            progress,
            message: message.into(),
            started_at: self.started_at,
            completed_at: Some(completed_at),
        }
    }
}

/// A failure attached to a single CSV data row (1-based, header excluded).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    pub row: usize,
    pub error: String,
}

/// Rows inserted (or that would be inserted on a dry run) per target table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertedCounts {
    pub clienti_privati: u32,
    pub contratti_luce: u32,
    pub contratti_gas: u32,
}

/// Outcome of an import job, as returned by `GET /api/import/result/{id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    /// `true` iff `errors` is empty. Warnings do not affect it.
    pub success: bool,
    pub file_name: String,
    pub total_rows: usize,
    pub processed: usize,
    pub errors: Vec<ImportRowError>,
    pub inserted: InsertedCounts,
    pub warnings: Vec<String>,
}

impl ImportResult {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            success: false,
            file_name: file_name.into(),
            total_rows: 0,
            processed: 0,
            errors: Vec::new(),
            inserted: InsertedCounts::default(),
            warnings: Vec::new(),
        }
    }
}
