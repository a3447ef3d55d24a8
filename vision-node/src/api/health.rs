use actix_web::{get, web, HttpResponse};
use serde_json::json;

use crate::AppState;

#[get("/health")]
pub(crate) async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "model": state.model_name,
        "db_connected": state.event_store.is_configured(),
    }))
}
