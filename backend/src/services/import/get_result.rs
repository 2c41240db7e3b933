use crate::job_controller::state::JobsState;
use actix_web::{web, HttpResponse, Responder};
use common::responses::ApiResponse;

pub(crate) async fn process(import_id: web::Path<String>, state: web::Data<JobsState>) -> impl Responder {
    match state.result(&import_id).await {
        Some(result) => HttpResponse::Ok().json(ApiResponse::ok(result)),
        None => HttpResponse::NotFound().json(ApiResponse::<()>::error("Import not found")),
    }
}
