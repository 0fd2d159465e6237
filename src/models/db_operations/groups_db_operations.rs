use crate::models::Group;
use rusqlite::{params, Connection, OptionalExtension, Row, Result as RusqliteResult};

fn row_to_group(row: &Row) -> RusqliteResult<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

pub fn create_group(conn: &Connection, title: &str, slug: &str, description: &str) -> RusqliteResult<i64> {
    conn.execute(
        "INSERT INTO post_groups (title, slug, description) VALUES (?1, ?2, ?3)",
        params![title, slug, description],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_group_by_slug(conn: &Connection, slug: &str) -> RusqliteResult<Option<Group>> {
    conn.query_row(
        "SELECT id, title, slug, description FROM post_groups WHERE slug = ?1",
        [slug],
        row_to_group,
    )
    .optional()
}

/// All groups ordered by title, as offered in the post form.
pub fn read_all_groups(conn: &Connection) -> RusqliteResult<Vec<Group>> {
    let mut stmt = conn.prepare("SELECT id, title, slug, description FROM post_groups ORDER BY title, id")?;
    let groups = stmt.query_map([], row_to_group)?.collect::<RusqliteResult<Vec<_>>>()?;
    Ok(groups)
}
