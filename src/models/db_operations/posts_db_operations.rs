use crate::models::{NewPost, Post, PostAuthor, PostGroup};
use crate::models::db_operations::{format_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Result as RusqliteResult};

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.image, u.id, u.username, g.id, g.title, g.slug
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id";

const NEWEST_FIRST: &str = "ORDER BY p.pub_date DESC, p.id DESC";

/// Which posts a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
}

impl PostFilter {
    fn where_clause(&self) -> &'static str {
        match self {
            PostFilter::All => "",
            PostFilter::Group(_) => "WHERE p.group_id = ?",
            PostFilter::Author(_) => "WHERE p.author_id = ?",
        }
    }

    fn bound_value(&self) -> Option<i64> {
        match self {
            PostFilter::All => None,
            PostFilter::Group(id) | PostFilter::Author(id) => Some(*id),
        }
    }
}

fn row_to_post(row: &Row) -> RusqliteResult<Post> {
    let pub_date: String = row.get(2)?;
    let group_id: Option<i64> = row.get(6)?;
    let group = match group_id {
        Some(id) => Some(PostGroup {
            id,
            title: row.get(7)?,
            slug: row.get(8)?,
        }),
        None => None,
    };
    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: parse_timestamp(2, &pub_date)?,
        image: row.get(3)?,
        author: PostAuthor {
            id: row.get(4)?,
            username: row.get(5)?,
        },
        group,
    })
}

pub fn count_posts(conn: &Connection, filter: PostFilter) -> RusqliteResult<usize> {
    let sql = format!("SELECT COUNT(*) FROM posts p {}", filter.where_clause());
    let count: i64 = conn.query_row(&sql, params_from_iter(filter.bound_value()), |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

/// One page of posts, newest first.
pub fn read_posts(conn: &Connection, filter: PostFilter, limit: usize, offset: usize) -> RusqliteResult<Vec<Post>> {
    let sql = format!("{} {} {} LIMIT ? OFFSET ?", POST_SELECT, filter.where_clause(), NEWEST_FIRST);
    let mut args: Vec<i64> = filter.bound_value().into_iter().collect();
    args.push(limit as i64);
    args.push(offset as i64);

    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params_from_iter(args), row_to_post)?
        .collect::<RusqliteResult<Vec<_>>>()?;
    Ok(posts)
}

pub fn read_post(conn: &Connection, post_id: i64) -> RusqliteResult<Option<Post>> {
    conn.query_row(&format!("{} WHERE p.id = ?1", POST_SELECT), [post_id], row_to_post)
        .optional()
}

/// Finds a post only if `author_id` wrote it. A missing post and someone
/// else's post both come back as `None`.
pub fn read_post_owned_by(conn: &Connection, post_id: i64, author_id: i64) -> RusqliteResult<Option<Post>> {
    conn.query_row(
        &format!("{} WHERE p.id = ?1 AND p.author_id = ?2", POST_SELECT),
        [post_id, author_id],
        row_to_post,
    )
    .optional()
}

pub fn create_post(conn: &Connection, author_id: i64, post: &NewPost, pub_date: &DateTime<Utc>) -> RusqliteResult<i64> {
    conn.execute(
        "INSERT INTO posts (text, pub_date, author_id, group_id, image) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![post.text, format_timestamp(pub_date), author_id, post.group_id, post.image],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Rewrites the editable fields of a post. The author column is left alone.
pub fn update_post(conn: &Connection, post_id: i64, post: &NewPost, pub_date: &DateTime<Utc>) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE posts SET text = ?1, group_id = ?2, image = ?3, pub_date = ?4 WHERE id = ?5",
        params![post.text, post.group_id, post.image, format_timestamp(pub_date), post_id],
    )
}
