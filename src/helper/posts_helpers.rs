use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::helper::form_helpers::{validate_post_form, PostFormInput, PostFormView};
use crate::helper::media_helpers::save_post_image;
use crate::helper::pagination::{Page, Paginator};
use crate::helper::render_helpers::{FormOutcome, TemplateView};
use crate::middleware::CurrentUser;
use crate::models::db_operations::posts_db_operations::{self, PostFilter};
use crate::models::db_operations::{groups_db_operations, users_db_operations};
use crate::models::{Group, NewPost, Post};
use chrono::Utc;
use rusqlite::Connection;
use std::path::Path;
use tera::Context;

pub const INDEX_TEMPLATE: &str = "posts/index.html";
pub const GROUP_LIST_TEMPLATE: &str = "posts/group_list.html";
pub const PROFILE_TEMPLATE: &str = "posts/profile.html";
pub const POST_DETAIL_TEMPLATE: &str = "posts/post_detail.html";
pub const CREATE_POST_TEMPLATE: &str = "posts/create_post.html";
pub const UPDATE_POST_TEMPLATE: &str = "posts/update_post.html";

const DETAIL_TITLE_CHARS: usize = 30;

/// Counts the matching posts and fetches only the requested page of them.
pub fn paginate_posts(
    conn: &Connection,
    paginator: &Paginator,
    filter: PostFilter,
    requested_page: Option<&str>,
) -> AppResult<Page<Post>> {
    let count = posts_db_operations::count_posts(conn, filter)?;
    let window = paginator.window(count, requested_page);
    let posts = posts_db_operations::read_posts(conn, filter, window.limit, window.offset)?;
    Ok(paginator.page(window, count, posts))
}

pub fn index_view(conn: &Connection, paginator: &Paginator, requested_page: Option<&str>) -> AppResult<TemplateView> {
    let page_obj = paginate_posts(conn, paginator, PostFilter::All, requested_page)?;
    let mut ctx = Context::new();
    ctx.insert("page_obj", &page_obj);
    ctx.insert("title", "Latest site updates");
    Ok(TemplateView::new(INDEX_TEMPLATE, ctx))
}

pub fn group_posts_view(
    conn: &Connection,
    paginator: &Paginator,
    slug: &str,
    requested_page: Option<&str>,
) -> AppResult<TemplateView> {
    let group = groups_db_operations::read_group_by_slug(conn, slug)?.ok_or(AppError::NotFound)?;
    let page_obj = paginate_posts(conn, paginator, PostFilter::Group(group.id), requested_page)?;
    let mut ctx = Context::new();
    ctx.insert("title", &format!("Posts of the {} community", group.title));
    ctx.insert("group", &group);
    ctx.insert("page_obj", &page_obj);
    Ok(TemplateView::new(GROUP_LIST_TEMPLATE, ctx))
}

pub fn profile_view(
    conn: &Connection,
    paginator: &Paginator,
    username: &str,
    requested_page: Option<&str>,
) -> AppResult<TemplateView> {
    let author = users_db_operations::read_user_by_username(conn, username)?.ok_or(AppError::NotFound)?;
    let page_obj = paginate_posts(conn, paginator, PostFilter::Author(author.id), requested_page)?;
    let mut ctx = Context::new();
    ctx.insert("title", &format!("Profile of {}", author.username));
    ctx.insert("count_posts", &page_obj.count);
    ctx.insert("author", &author);
    ctx.insert("page_obj", &page_obj);
    Ok(TemplateView::new(PROFILE_TEMPLATE, ctx))
}

pub fn post_detail_view(conn: &Connection, post_id: i64) -> AppResult<TemplateView> {
    let post = posts_db_operations::read_post(conn, post_id)?.ok_or(AppError::NotFound)?;
    let count_posts = posts_db_operations::count_posts(conn, PostFilter::Author(post.author.id))?;
    let headline: String = post.text.chars().take(DETAIL_TITLE_CHARS).collect();

    let mut ctx = Context::new();
    ctx.insert("title", &format!("Post {}", headline));
    ctx.insert("group", &post.group);
    ctx.insert("author", &post.author);
    ctx.insert("count_posts", &count_posts);
    ctx.insert("post", &post);
    Ok(TemplateView::new(POST_DETAIL_TEMPLATE, ctx))
}

fn create_form_view(groups: &[Group], form: PostFormView) -> TemplateView {
    let mut ctx = Context::new();
    ctx.insert("title", "New post");
    ctx.insert("is_edit", &false);
    ctx.insert("groups", groups);
    ctx.insert("form", &form);
    TemplateView::new(CREATE_POST_TEMPLATE, ctx)
}

fn edit_form_view(groups: &[Group], post: &Post, form: PostFormView) -> TemplateView {
    let mut ctx = Context::new();
    ctx.insert("title", &format!("Edit post {}", post.id));
    ctx.insert("is_edit", &true);
    ctx.insert("groups", groups);
    ctx.insert("post", post);
    ctx.insert("form", &form);
    TemplateView::new(UPDATE_POST_TEMPLATE, ctx)
}

pub fn post_create_form(conn: &Connection) -> AppResult<TemplateView> {
    let groups = groups_db_operations::read_all_groups(conn)?;
    Ok(create_form_view(&groups, PostFormView::empty()))
}

/// Validates a submitted new post; saves it and points at the author's
/// profile, or hands the form back with its errors.
pub async fn post_create_submit(
    conn: &Connection,
    config: &Config,
    user: &CurrentUser,
    input: PostFormInput,
) -> AppResult<FormOutcome> {
    let groups = groups_db_operations::read_all_groups(conn)?;
    let (text, group) = (input.text.clone(), input.group.clone());

    let valid = match validate_post_form(input, &groups, config.max_upload_size_bytes()) {
        Ok(valid) => valid,
        Err(errors) => {
            log::debug!("Rejected new post from '{}': {} field error(s)", user.username, errors.len());
            let form = PostFormView::with_errors(text, group, None, errors);
            return Ok(FormOutcome::Render(create_form_view(&groups, form)));
        }
    };

    let image = match valid.image {
        Some(upload) => Some(save_post_image(Path::new(&config.media_path), upload).await?),
        None => None,
    };
    let new_post = NewPost { text: valid.text, group_id: valid.group_id, image };
    let post_id = posts_db_operations::create_post(conn, user.id, &new_post, &Utc::now())?;
    log::info!("User '{}' published post {}", user.username, post_id);

    Ok(FormOutcome::Redirect(format!("/profile/{}/", user.username)))
}

/// Fetches a post only when `user` wrote it; anything else is `NotFound`.
pub fn owned_post(conn: &Connection, user: &CurrentUser, post_id: i64) -> AppResult<Post> {
    posts_db_operations::read_post_owned_by(conn, post_id, user.id)?.ok_or(AppError::NotFound)
}

pub fn post_edit_form(conn: &Connection, post: &Post) -> AppResult<TemplateView> {
    let groups = groups_db_operations::read_all_groups(conn)?;
    Ok(edit_form_view(&groups, post, PostFormView::from_post(post)))
}

/// Applies a submitted edit to a post the user owns. Without a new upload
/// the current image stays.
pub async fn post_edit_submit(
    conn: &Connection,
    config: &Config,
    user: &CurrentUser,
    post: Post,
    input: PostFormInput,
) -> AppResult<FormOutcome> {
    let groups = groups_db_operations::read_all_groups(conn)?;
    let (text, group) = (input.text.clone(), input.group.clone());

    let valid = match validate_post_form(input, &groups, config.max_upload_size_bytes()) {
        Ok(valid) => valid,
        Err(errors) => {
            let form = PostFormView::with_errors(text, group, post.image.clone(), errors);
            return Ok(FormOutcome::Render(edit_form_view(&groups, &post, form)));
        }
    };

    let image = match valid.image {
        Some(upload) => Some(save_post_image(Path::new(&config.media_path), upload).await?),
        None => post.image.clone(),
    };
    let edited = NewPost { text: valid.text, group_id: valid.group_id, image };
    posts_db_operations::update_post(conn, post.id, &edited, &Utc::now())?;
    log::info!("User '{}' edited post {}", user.username, post.id);

    Ok(FormOutcome::Redirect(format!("/posts/{}/", post.id)))
}
