mod detect;
mod health;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(detect::detect_upload)
        .service(detect::detect_latest);
}
