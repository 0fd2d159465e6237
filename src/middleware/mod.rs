use crate::error::AppError;
use crate::models::User;
use actix_session::{
    config::PersistentSession, storage::CookieSessionStore, Session, SessionExt, SessionInsertError,
    SessionMiddleware,
};
use actix_web::{
    cookie::{time::Duration, Key, SameSite},
    dev, FromRequest, HttpRequest,
};
use serde::Serialize;
use std::future::{ready, Ready};

const SESSION_USER_ID: &str = "user_id";
const SESSION_USERNAME: &str = "username";

/// The signed-in user, read from the session cookie.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let session = req.get_session();
        match (session.get::<i64>(SESSION_USER_ID), session.get::<String>(SESSION_USERNAME)) {
            (Ok(Some(id)), Ok(Some(username))) => ready(Ok(CurrentUser { id, username })),
            _ => ready(Err(AppError::Unauthenticated { next: req.uri().to_string() })),
        }
    }
}

/// Binds `user` to the session, rotating the session id first.
pub fn login_session(session: &Session, user: &User) -> Result<(), SessionInsertError> {
    session.renew();
    session.insert(SESSION_USER_ID, user.id)?;
    session.insert(SESSION_USERNAME, user.username.clone())?;
    Ok(())
}

pub fn logout_session(session: &Session) {
    session.purge();
}

pub fn session_middleware(key: Key, use_secure_cookies: bool) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_secure(use_secure_cookies)
        .cookie_http_only(true)
        .cookie_same_site(SameSite::Lax)
        .session_lifecycle(PersistentSession::default().session_ttl(Duration::weeks(2)))
        .build()
}
