use actix_web::{error::ResponseError, http::{header, StatusCode}, HttpResponse};
use thiserror::Error;
use url::form_urlencoded;

pub type AppResult<T> = Result<T, AppError>;

pub const LOGIN_URL: &str = "/auth/login/";

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing record, or a post the requester does not own.
    #[error("Not found")]
    NotFound,
    #[error("Authentication required")]
    Unauthenticated { next: String },
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
    #[error("Request payload error: {0}")]
    Payload(#[from] actix_web::error::PayloadError),
    #[error("Multipart error: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),
    #[error("Session error: {0}")]
    Session(#[from] actix_session::SessionInsertError),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Builds the login URL carrying the page to return to after signing in.
pub fn login_redirect_url(next: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("{}?{}", LOGIN_URL, query)
}

const NOT_FOUND_BODY: &str = "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>Page not found</title></head>\
<body><h1>Page not found</h1><p>The page you requested does not exist.</p><a href=\"/\">Back to the main page</a></body></html>";

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthenticated { .. } => StatusCode::FOUND,
            AppError::BadRequest(_) | AppError::Payload(_) | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::NotFound => HttpResponse::NotFound()
                .content_type("text/html; charset=utf-8")
                .body(NOT_FOUND_BODY),
            AppError::Unauthenticated { next } => HttpResponse::Found()
                .append_header((header::LOCATION, login_redirect_url(next)))
                .finish(),
            AppError::BadRequest(msg) => HttpResponse::BadRequest().body(msg.clone()),
            AppError::Payload(_) | AppError::Multipart(_) => {
                HttpResponse::BadRequest().body("Malformed request body.")
            }
            other => {
                log::error!("Request failed: {}", other);
                HttpResponse::InternalServerError().body("Internal server error")
            }
        }
    }
}
