use crate::config::ServerConfig;
use crate::db;
use crate::importer::error::ImportError;
use crate::importer::orchestrator::{run_import, ImportRequest, ProgressSink};
use crate::job_controller::state::{ImportJob, JobUpdate, JobsState};
use actix_multipart::{Multipart, MultipartError};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use common::jobs::ImportProgress;
use common::requests::ImportOptions;
use common::responses::{ApiResponse, UploadAccepted};
use futures_util::StreamExt;
use log::{info, warn};
use md5::Context;
use tokio::sync::mpsc;

/// Upper bound for the JSON `options` part.
const MAX_OPTIONS_BYTES: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("malformed upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("missing CSV file")]
    MissingFile,
    #[error("uploaded file is empty")]
    EmptyFile,
    #[error("file exceeds the {0} byte upload limit")]
    TooLarge(usize),
    #[error("import options exceed the {0} byte limit")]
    OptionsTooLarge(usize),
    #[error("invalid import options: {0}")]
    InvalidOptions(#[from] serde_json::Error),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("import worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl UploadError {
    fn status(&self) -> StatusCode {
        match self {
            UploadError::Import(_) | UploadError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::TooLarge(_) | UploadError::OptionsTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// A fully received upload.
struct Upload {
    file_name: String,
    content: String,
    md5: String,
    options: ImportOptions,
}

/// Publishes intermediate progress of a running import to the job registry.
struct ChannelSink {
    tx: mpsc::Sender<JobUpdate>,
    job_id: String,
}

impl ProgressSink for ChannelSink {
    fn report(&self, progress: ImportProgress) {
        // A closed channel only means nobody is polling anymore.
        let _ = self.tx.blocking_send(JobUpdate {
            job_id: self.job_id.clone(),
            progress,
        });
    }
}

/// HTTP handler wrapper that converts the internal result to an `HttpResponse`.
///
/// - On success: `200 OK` with the import id and row count.
/// - On a bad upload: `400 Bad Request` (`413` when over the size limit).
/// - On a failed import: `500 Internal Server Error`; the job is left `failed`.
pub async fn process(
    payload: Multipart,
    config: web::Data<ServerConfig>,
    jobs: web::Data<JobsState>,
) -> impl Responder {
    let outcome = match read_upload(payload, config.max_upload_bytes).await {
        Ok(upload) => run_upload(upload, &config, &jobs).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(accepted) => HttpResponse::Ok().json(ApiResponse::ok(accepted)),
        Err(e) => {
            warn!("Import upload rejected: {}", e);
            HttpResponse::build(e.status()).json(ApiResponse::<()>::error(e.to_string()))
        }
    }
}

async fn read_upload(mut payload: Multipart, max_bytes: usize) -> Result<Upload, UploadError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut options = ImportOptions::default();
    let mut md5_hasher = Context::new();

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
                    .unwrap_or_else(|| "upload.csv".to_string());

                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk?;
                    if bytes.len() + chunk.len() > max_bytes {
                        return Err(UploadError::TooLarge(max_bytes));
                    }
                    md5_hasher.consume(&chunk);
                    bytes.extend_from_slice(&chunk);
                }
                file = Some((file_name, bytes));
            }
            Some("options") => {
                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk?;
                    if bytes.len() + chunk.len() > MAX_OPTIONS_BYTES {
                        return Err(UploadError::OptionsTooLarge(MAX_OPTIONS_BYTES));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                if !bytes.iter().all(u8::is_ascii_whitespace) {
                    options = serde_json::from_slice(&bytes)?;
                }
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or(UploadError::MissingFile)?;
    if bytes.is_empty() {
        return Err(UploadError::EmptyFile);
    }
    Ok(Upload {
        file_name,
        content: String::from_utf8_lossy(&bytes).into_owned(),
        md5: format!("{:x}", md5_hasher.finalize()),
        options,
    })
}

async fn run_upload(
    upload: Upload,
    config: &ServerConfig,
    jobs: &JobsState,
) -> Result<UploadAccepted, UploadError> {
    let import_id = uuid::Uuid::new_v4().to_string();
    let previous_import = jobs.previous_import_with_md5(&upload.md5).await;

    let job = ImportJob::queued(upload.options.clone(), &upload.file_name, upload.md5);
    let started_at = job.progress.started_at;
    jobs.register(&import_id, job).await;
    info!("Import {} registered for {}", import_id, upload.file_name);

    let request = ImportRequest {
        file_name: upload.file_name,
        content: upload.content,
        options: upload.options,
        consent: config.consent.clone(),
        actor_email: Some(config.actor_email.clone()),
        started_at,
        previous_import,
    };
    let sink = ChannelSink {
        tx: jobs.tx.clone(),
        job_id: import_id.clone(),
    };
    let database_path = config.database_path.clone();

    let handle = tokio::task::spawn_blocking(move || {
        let mut conn = db::open(&database_path)?;
        run_import(&mut conn, &request, &sink)
    });

    let outcome = match handle.await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            jobs.fail(&import_id, &e.to_string(), e.total_rows()).await;
            return Err(e.into());
        }
        Err(e) => {
            jobs.fail(&import_id, &format!("import worker failed: {}", e), None).await;
            return Err(e.into());
        }
    };

    let total_rows = outcome.result.total_rows;
    jobs.complete(&import_id, outcome.progress, outcome.result).await;
    info!("Import {} completed", import_id);

    Ok(UploadAccepted {
        import_id,
        message: "Import completed".to_string(),
        total_rows,
    })
}
