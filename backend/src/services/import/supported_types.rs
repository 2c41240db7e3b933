use actix_web::{HttpResponse, Responder};
use common::model::record_type::RecordType;
use common::responses::{ApiResponse, SupportedTypes};

pub(crate) async fn process() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::ok(SupportedTypes {
        types: RecordType::SUPPORTED.to_vec(),
    }))
}
