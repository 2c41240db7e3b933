use crate::job_controller::state::JobsState;
use actix_web::{web, HttpResponse, Responder};
use common::responses::ApiResponse;

pub(crate) async fn process(import_id: web::Path<String>, state: web::Data<JobsState>) -> impl Responder {
    match state.progress(&import_id).await {
        Some(progress) => HttpResponse::Ok().json(ApiResponse::ok(progress)),
        None => HttpResponse::NotFound().json(ApiResponse::<()>::error("Import not found")),
    }
}
