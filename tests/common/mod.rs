#![allow(dead_code)]

use actix_session::Session;
use actix_web::{cookie::Cookie, dev::ServiceResponse, test, web, HttpResponse};
use chrono::{Duration, TimeZone, Utc};
use std::path::PathBuf;
use tera::Tera;
use uuid::Uuid;
use yatube_backend::config::{Config, WebConfig};
use yatube_backend::helper::pagination::Paginator;
use yatube_backend::middleware::login_session;
use yatube_backend::models::db_operations::{groups_db_operations, posts_db_operations, users_db_operations};
use yatube_backend::models::NewPost;
use yatube_backend::setup::db_setup::memory_pool;
use yatube_backend::DbPool;

/// Shared state handed to the test app: one in-memory database and a scratch media dir.
pub struct TestState {
    pub pool: DbPool,
    pub tera: Tera,
    pub config: Config,
    pub paginator: Paginator,
    posts_created: i64,
}

impl TestState {
    pub fn new() -> Self {
        let media_path: PathBuf = std::env::temp_dir().join(format!("yatube-test-media-{}", Uuid::new_v4()));
        let config = Config {
            web: WebConfig { host: "127.0.0.1".to_string(), port: 0 },
            database_path: String::new(),
            media_path: media_path.display().to_string(),
            allowed_origins: String::new(),
            log_level: "debug".to_string(),
            session_secret_key: String::new(),
            use_secure_cookies: false,
            page_size: 10,
            max_upload_size_mb: 1,
        };
        TestState {
            pool: memory_pool().unwrap(),
            tera: Tera::new("templates/**/*.html").unwrap(),
            paginator: Paginator::new(config.page_size),
            config,
            posts_created: 0,
        }
    }

    pub fn user(&self, username: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        users_db_operations::insert_user(&conn, username, "not-a-real-hash").unwrap()
    }

    /// A user whose password actually verifies. Cheap bcrypt cost keeps tests fast.
    pub fn user_with_password(&self, username: &str, password: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        let password_hash = bcrypt::hash(password, 4).unwrap();
        users_db_operations::insert_user(&conn, username, &password_hash).unwrap()
    }

    pub fn group(&self, title: &str, slug: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        groups_db_operations::create_group(&conn, title, slug, "Test description").unwrap()
    }

    /// Inserts a post one minute after the previous one, so listing order is predictable.
    pub fn post(&mut self, author_id: i64, text: &str, group_id: Option<i64>) -> i64 {
        self.posts_created += 1;
        let pub_date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(self.posts_created);
        let conn = self.pool.get().unwrap();
        let new_post = NewPost { text: text.to_string(), group_id, image: None };
        posts_db_operations::create_post(&conn, author_id, &new_post, &pub_date).unwrap()
    }
}

impl Drop for TestState {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.config.media_path);
    }
}

/// Signs the named user in without a password. Only mounted by the test app.
pub async fn force_login(username: web::Path<String>, session: Session, pool: web::Data<DbPool>) -> HttpResponse {
    let conn = pool.get().unwrap();
    let user = users_db_operations::read_user_by_username(&conn, &username).unwrap().unwrap();
    login_session(&session, &user).unwrap();
    HttpResponse::Ok().finish()
}

/// Builds the application the way the server does, plus a `/test-login/{username}/` route.
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(
                    actix_web::middleware::ErrorHandlers::new().handler(
                        actix_web::http::StatusCode::NOT_FOUND,
                        yatube_backend::helper::render_helpers::render_not_found,
                    ),
                )
                .wrap(yatube_backend::middleware::session_middleware(
                    actix_web::cookie::Key::generate(),
                    false,
                ))
                .app_data(actix_web::web::Data::new($state.config.clone()))
                .app_data(actix_web::web::Data::new($state.tera.clone()))
                .app_data(actix_web::web::Data::new($state.pool.clone()))
                .app_data(actix_web::web::Data::new($state.paginator))
                .route("/test-login/{username}/", actix_web::web::get().to(common::force_login))
                .configure(yatube_backend::routes::configure)
                .default_service(actix_web::web::route().to(yatube_backend::routes::not_found)),
        )
        .await
    };
}

/// Pulls the session cookie out of a response that set one.
pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Cookie<'static> {
    resp.response()
        .cookies()
        .find(|c| c.name() == "id")
        .map(|c| c.into_owned())
        .expect("response did not set a session cookie")
}

/// Name of the double-submit cookie set on the auth form pages.
pub const CSRF_COOKIE: &str = "__Host-Csrf-Token";

/// The CSRF cookie from a form page. Its value is also the token the form must echo back.
pub fn csrf_cookie<B>(resp: &ServiceResponse<B>) -> Cookie<'static> {
    resp.response()
        .cookies()
        .find(|c| c.name() == CSRF_COOKIE)
        .map(|c| c.into_owned())
        .expect("response did not set a CSRF cookie")
}

pub async fn body_text<B: actix_web::body::MessageBody>(resp: ServiceResponse<B>) -> String {
    let bytes = test::read_body(resp).await;
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(actix_web::http::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub const BOUNDARY: &str = "----yatube-test-boundary";

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Encodes text fields and an optional `(filename, content_type, bytes)` image part.
pub fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((filename, content_type, data)) = image {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\n", filename).as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// A 1x1 transparent GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF,
    0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02,
    0x02, 0x44, 0x01, 0x00, 0x3B,
];
