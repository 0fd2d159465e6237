use crate::error::{login_redirect_url, AppError, AppResult, LOGIN_URL};
use crate::helper::form_helpers::{validate_signup, FieldError};
use crate::helper::render_helpers::{self, TemplateView};
use crate::middleware::{login_session, logout_session, CurrentUser};
use crate::models::db_operations::users_db_operations;
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfGuarded, CsrfToken};
use actix_csrf::CsrfMiddleware;
use actix_session::Session;
use actix_web::{http::Method, web, HttpResponse};
use rand::prelude::StdRng;
use serde::Deserialize;
use tera::{Context, Tera};

pub const SIGNUP_URL: &str = "/auth/signup/";

const LOGIN_ERROR_KEY: &str = "login_error";
const SIGNUP_ERRORS_KEY: &str = "signup_errors";
const SIGNUP_USERNAME_KEY: &str = "signup_username";

// --- Structs for forms and query params ---
#[derive(Deserialize)]
struct LoginForm {
    csrf_token: CsrfToken,
    username: String,
    password: String,
    #[serde(default)]
    next: String,
}

impl CsrfGuarded for LoginForm {
    fn csrf_token(&self) -> &CsrfToken { &self.csrf_token }
}

#[derive(Deserialize)]
struct SignupForm {
    csrf_token: CsrfToken,
    username: String,
    password1: String,
    password2: String,
}

impl CsrfGuarded for SignupForm {
    fn csrf_token(&self) -> &CsrfToken { &self.csrf_token }
}

#[derive(Deserialize)]
struct NextQuery {
    next: Option<String>,
}

// --- Route Configuration ---
pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .wrap(
                CsrfMiddleware::<StdRng>::new()
                    .set_cookie(Method::GET, LOGIN_URL)
                    .set_cookie(Method::GET, SIGNUP_URL)
            )
            .route("/login/", web::get().to(show_login_form))
            .route("/login/", web::post().to(handle_login))
            .route("/signup/", web::get().to(show_signup_form))
            .route("/signup/", web::post().to(handle_signup))
            .route("/logout/", web::post().to(handle_logout)),
    );
}

/// Only same-site paths are followed after login.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path,
        _ => "/",
    }
}

fn take_flash<T: serde::de::DeserializeOwned>(session: &Session, key: &str) -> Option<T> {
    let value = session.get::<T>(key).unwrap_or(None);
    if value.is_some() {
        session.remove(key);
    }
    value
}

// --- Login/Logout Handlers ---
async fn show_login_form(
    session: Session,
    tera: web::Data<Tera>,
    token: CsrfToken,
    query: web::Query<NextQuery>,
    user: Option<CurrentUser>,
) -> AppResult<HttpResponse> {
    let next = safe_next(query.next.as_deref()).to_string();
    if user.is_some() {
        return Ok(render_helpers::redirect(&next));
    }

    let mut ctx = Context::new();
    ctx.insert("title", "Sign in");
    ctx.insert("csrf_token", token.get());
    ctx.insert("next", &next);
    if let Some(error) = take_flash::<String>(&session, LOGIN_ERROR_KEY) {
        ctx.insert("error", &error);
    }
    render_helpers::render(&tera, TemplateView::new("users/login.html", ctx), None)
}

async fn handle_login(
    session: Session,
    pool: web::Data<DbPool>,
    form: Csrf<web::Form<LoginForm>>,
) -> AppResult<HttpResponse> {
    let login_data = form.into_inner();
    let next = safe_next(Some(login_data.next.as_str())).to_string();
    let conn = pool.get()?;

    match users_db_operations::verify_credentials(&conn, login_data.username.trim(), &login_data.password)? {
        Some(user) => {
            login_session(&session, &user)?;
            log::info!("User '{}' signed in", user.username);
            Ok(render_helpers::redirect(&next))
        }
        None => {
            log::warn!("Failed sign-in attempt for username '{}'", login_data.username.trim());
            session.insert(LOGIN_ERROR_KEY, "Please enter a correct username and password.")?;
            Ok(render_helpers::redirect(&login_redirect_url(&next)))
        }
    }
}

async fn handle_logout(session: Session) -> HttpResponse {
    logout_session(&session);
    render_helpers::redirect("/")
}

// --- Signup ---
async fn show_signup_form(
    session: Session,
    tera: web::Data<Tera>,
    token: CsrfToken,
    user: Option<CurrentUser>,
) -> AppResult<HttpResponse> {
    if user.is_some() {
        return Ok(render_helpers::redirect("/"));
    }

    let mut ctx = Context::new();
    ctx.insert("title", "Sign up");
    ctx.insert("csrf_token", token.get());
    let errors: Vec<String> = take_flash(&session, SIGNUP_ERRORS_KEY).unwrap_or_default();
    let username: String = take_flash(&session, SIGNUP_USERNAME_KEY).unwrap_or_default();
    ctx.insert("errors", &errors);
    ctx.insert("username", &username);
    render_helpers::render(&tera, TemplateView::new("users/signup.html", ctx), None)
}

async fn handle_signup(
    session: Session,
    pool: web::Data<DbPool>,
    form: Csrf<web::Form<SignupForm>>,
) -> AppResult<HttpResponse> {
    let signup = form.into_inner();
    let username = signup.username.trim().to_string();
    let conn = pool.get()?;

    let mut errors: Vec<FieldError> = match validate_signup(&username, &signup.password1, &signup.password2) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };
    if errors.is_empty() && users_db_operations::username_exists(&conn, &username)? {
        errors.push(FieldError::new("username", "A user with that username already exists."));
    }

    if !errors.is_empty() {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        session.insert(SIGNUP_ERRORS_KEY, messages)?;
        session.insert(SIGNUP_USERNAME_KEY, &username)?;
        return Ok(render_helpers::redirect(SIGNUP_URL));
    }

    users_db_operations::create_user(&conn, &username, &signup.password1)?;
    let user = users_db_operations::read_user_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;
    login_session(&session, &user)?;
    log::info!("New user '{}' signed up", user.username);
    Ok(render_helpers::redirect("/"))
}

#[cfg(test)]
mod tests {
    use super::safe_next;

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/create/")), "/create/");
        assert_eq!(safe_next(Some("/posts/1/edit/?x=1")), "/posts/1/edit/?x=1");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
