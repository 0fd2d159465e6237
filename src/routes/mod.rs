use crate::error::{AppError, AppResult};
use actix_web::{web, HttpResponse};

pub mod posts;
pub mod users;

/// Registers every page of the site.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(users::config_auth)
        .configure(posts::config_posts);
}

/// Fallback for paths no route claims.
pub async fn not_found() -> AppResult<HttpResponse> {
    Err(AppError::NotFound)
}
