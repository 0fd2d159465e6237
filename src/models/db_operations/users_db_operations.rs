use crate::models::User;
use crate::models::db_operations::{format_timestamp, parse_timestamp};
use bcrypt::{hash, verify, BcryptError};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Error as RusqliteError, Result as RusqliteResult};

fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

const USER_COLUMNS: &str = "id, username, joined_at";

fn row_to_user(row: &Row) -> RusqliteResult<User> {
    let joined_at: String = row.get(2)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        joined_at: parse_timestamp(2, &joined_at)?,
    })
}

/// Hashes the password and stores a new user, returning its id.
pub fn create_user(conn: &Connection, username: &str, password: &str) -> RusqliteResult<i64> {
    let hashed_password = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    insert_user(conn, username, &hashed_password)
}

pub fn insert_user(conn: &Connection, username: &str, password_hash: &str) -> RusqliteResult<i64> {
    conn.execute(
        "INSERT INTO users (username, password_hash, joined_at) VALUES (?1, ?2, ?3)",
        params![username, password_hash, format_timestamp(&Utc::now())],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_users(conn: &Connection) -> RusqliteResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
    let users = stmt.query_map([], row_to_user)?.collect::<RusqliteResult<Vec<_>>>()?;
    Ok(users)
}

pub fn read_user_by_username(conn: &Connection, username: &str) -> RusqliteResult<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
        [username],
        row_to_user,
    )
    .optional()
}

pub fn read_user_by_id(conn: &Connection, user_id: i64) -> RusqliteResult<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [user_id],
        row_to_user,
    )
    .optional()
}

pub fn username_exists(conn: &Connection, username: &str) -> RusqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )
}

/// Returns the user when the password matches the stored hash.
pub fn verify_credentials(conn: &Connection, username: &str, password: &str) -> RusqliteResult<Option<User>> {
    let stored: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE username = ?1",
            [username],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match stored {
        Some((id, password_hash)) if verify(password, &password_hash).unwrap_or(false) => read_user_by_id(conn, id),
        _ => Ok(None),
    }
}

pub fn update_password(conn: &Connection, username: &str, new_password: &str) -> RusqliteResult<usize> {
    let hashed_password = hash(new_password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE username = ?2",
        params![hashed_password, username],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup::memory_pool;

    #[test]
    fn usernames_are_unique() {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        insert_user(&conn, "leo", "x").unwrap();
        assert!(insert_user(&conn, "leo", "y").is_err());
        assert!(username_exists(&conn, "leo").unwrap());
        assert!(!username_exists(&conn, "nobody").unwrap());
    }

    #[test]
    fn verify_credentials_checks_hash() {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let password_hash = hash("correct horse", 4).unwrap();
        let id = insert_user(&conn, "masha", &password_hash).unwrap();

        let user = verify_credentials(&conn, "masha", "correct horse").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "masha");
        assert!(verify_credentials(&conn, "masha", "wrong").unwrap().is_none());
        assert!(verify_credentials(&conn, "ghost", "correct horse").unwrap().is_none());
    }

    #[test]
    fn lookup_by_username_and_id() {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let id = insert_user(&conn, "auth", "x").unwrap();
        assert_eq!(read_user_by_username(&conn, "auth").unwrap().unwrap().id, id);
        assert_eq!(read_user_by_id(&conn, id).unwrap().unwrap().username, "auth");
        assert!(read_user_by_username(&conn, "missing").unwrap().is_none());
        assert_eq!(read_all_users(&conn).unwrap().len(), 1);
    }
}
