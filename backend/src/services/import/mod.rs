//! HTTP API of the unified CSV import.
//!
//! The provided routes are:
//! - `POST /api/import/upload`: multipart/form-data with a `file` part (the CSV)
//!   and an optional `options` part (JSON `ImportOptions`). The import runs to
//!   completion before the response is sent; the response carries the import id
//!   and the number of data rows.
//! - `GET /api/import/progress/{import_id}`: current `ImportProgress` of a job.
//! - `GET /api/import/result/{import_id}`: `ImportResult` of a job, including the
//!   per-row errors and warnings.
//! - `GET /api/import/supported-types`: record types an import can carry.

use actix_web::web::{get, post, scope};
use actix_web::Scope;

mod get_progress;
mod get_result;
mod supported_types;
mod upload;

const API_PATH: &str = "/api/import";

/// Configures and returns the Actix scope for import routes.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/upload", post().to(upload::process))
        .route("/progress/{import_id}", get().to(get_progress::process))
        .route("/result/{import_id}", get().to(get_result::process))
        .route("/supported-types", get().to(supported_types::process))
}
