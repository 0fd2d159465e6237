use crate::config::Config;
use crate::error::AppResult;
use crate::helper::pagination::{page_param, Paginator};
use crate::helper::{form_helpers, posts_helpers, render_helpers};
use crate::middleware::CurrentUser;
use crate::DbPool;
use actix_web::{web, HttpRequest, HttpResponse};
use tera::Tera;

// --- Route Configuration ---
pub fn config_posts(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/group/{slug}/", web::get().to(group_posts))
        .route("/profile/{username}/", web::get().to(profile))
        .route("/posts/{post_id}/", web::get().to(post_detail))
        .route("/create/", web::get().to(show_post_create))
        .route("/create/", web::post().to(submit_post_create))
        .route("/posts/{post_id}/edit/", web::get().to(show_post_edit))
        .route("/posts/{post_id}/edit/", web::post().to(submit_post_edit));
}

// --- Listings ---
async fn index(
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    paginator: web::Data<Paginator>,
    req: HttpRequest,
    user: Option<CurrentUser>,
) -> AppResult<HttpResponse> {
    let page = page_param(req.query_string());
    let conn = pool.get()?;
    let view = posts_helpers::index_view(&conn, &paginator, page.as_deref())?;
    render_helpers::render(&tera, view, user.as_ref())
}

async fn group_posts(
    slug: web::Path<String>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    paginator: web::Data<Paginator>,
    req: HttpRequest,
    user: Option<CurrentUser>,
) -> AppResult<HttpResponse> {
    let page = page_param(req.query_string());
    let conn = pool.get()?;
    let view = posts_helpers::group_posts_view(&conn, &paginator, &slug, page.as_deref())?;
    render_helpers::render(&tera, view, user.as_ref())
}

async fn profile(
    username: web::Path<String>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    paginator: web::Data<Paginator>,
    req: HttpRequest,
    user: Option<CurrentUser>,
) -> AppResult<HttpResponse> {
    let page = page_param(req.query_string());
    let conn = pool.get()?;
    let view = posts_helpers::profile_view(&conn, &paginator, &username, page.as_deref())?;
    render_helpers::render(&tera, view, user.as_ref())
}

async fn post_detail(
    post_id: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    user: Option<CurrentUser>,
) -> AppResult<HttpResponse> {
    let conn = pool.get()?;
    let view = posts_helpers::post_detail_view(&conn, post_id.into_inner())?;
    render_helpers::render(&tera, view, user.as_ref())
}

// --- Create ---
async fn show_post_create(
    user: CurrentUser,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> AppResult<HttpResponse> {
    let conn = pool.get()?;
    let view = posts_helpers::post_create_form(&conn)?;
    render_helpers::render(&tera, view, Some(&user))
}

async fn submit_post_create(
    user: CurrentUser,
    req: HttpRequest,
    payload: web::Payload,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let input = form_helpers::read_post_form(&req, payload, config.max_upload_size_bytes()).await?;
    let conn = pool.get()?;
    let outcome = posts_helpers::post_create_submit(&conn, &config, &user, input).await?;
    render_helpers::respond(&tera, outcome, Some(&user))
}

// --- Edit ---
async fn show_post_edit(
    user: CurrentUser,
    post_id: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> AppResult<HttpResponse> {
    let conn = pool.get()?;
    let post = posts_helpers::owned_post(&conn, &user, post_id.into_inner())?;
    let view = posts_helpers::post_edit_form(&conn, &post)?;
    render_helpers::render(&tera, view, Some(&user))
}

async fn submit_post_edit(
    user: CurrentUser,
    post_id: web::Path<i64>,
    req: HttpRequest,
    payload: web::Payload,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let conn = pool.get()?;
    // Ownership is settled before the body is read.
    let post = posts_helpers::owned_post(&conn, &user, post_id.into_inner())?;
    let input = form_helpers::read_post_form(&req, payload, config.max_upload_size_bytes()).await?;
    let outcome = posts_helpers::post_edit_submit(&conn, &config, &user, post, input).await?;
    render_helpers::respond(&tera, outcome, Some(&user))
}
