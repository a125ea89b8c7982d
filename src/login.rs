use crate::app::AppState;
use crate::config::{Role, UserRecord};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form, Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";

/// Cookie carrying pending notices for the next rendered page.
pub const FLASH_COOKIE: &str = "flash";

/// Login form submission.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// User session data
///
/// Represents an authenticated user session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Email of the authenticated user
    pub email: String,

    /// Role recorded at login
    pub role: Role,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// The logged-in user, placed in request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session_id: String,
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Active sessions, keyed by session id.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Create and store a new session, returning its id.
    pub fn create(&self, email: &str, role: Role) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            email: email.to_string(),
            role,
            expires_at: SystemTime::now() + self.ttl,
        };

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.clone(), session);
        session_id
    }

    /// The session for `session_id` if it exists and has not expired.
    ///
    /// An expired session is dropped.
    pub fn validate(&self, session_id: &str) -> Option<Session> {
        let session = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()?;

        if session.expires_at > SystemTime::now() {
            Some(session)
        } else {
            self.remove(session_id);
            None
        }
    }

    pub fn remove(&self, session_id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }

}

/// Hash a password using Argon2
///
/// The result is a PHC string that can be stored as the `password` of a
/// user record in the configuration file.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

/// Check a submitted password against a stored secret.
///
/// Stored secrets starting with `$argon2` are verified as Argon2 hashes,
/// anything else is compared as plain text.
fn verify_password(password: &str, stored: &str) -> bool {
    if !stored.starts_with("$argon2") {
        return password == stored;
    }
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("invalid password hash in user store: {}", e);
            false
        }
    }
}

/// Verify user credentials
///
/// Returns the user's role when `email` is registered and `password`
/// matches.
pub fn verify_user(users: &HashMap<String, UserRecord>, email: &str, password: &str) -> Option<Role> {
    let user = users.get(email)?;
    verify_password(password, &user.password).then_some(user.role)
}

/// Add a notice to show on the next rendered page.
pub fn push_flash(jar: CookieJar, notice: impl Into<String>) -> CookieJar {
    let mut notices = read_flash(&jar);
    notices.push(notice.into());
    // the jar percent-encodes cookie values on the way out
    jar.add(
        Cookie::build((FLASH_COOKIE, notices.join("\n")))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Take the pending notices, clearing the flash cookie.
pub fn take_flash(jar: CookieJar) -> (CookieJar, Vec<String>) {
    let notices = read_flash(&jar);
    if notices.is_empty() {
        return (jar, notices);
    }
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), notices)
}

fn read_flash(jar: &CookieJar) -> Vec<String> {
    jar.get(FLASH_COOKIE)
        .map(|c| {
            c.value()
                .split('\n')
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Redirect to `to`, showing `notice` on the page that follows.
pub fn redirect_with_notice(jar: CookieJar, notice: impl Into<String>, to: &str) -> Response {
    (push_flash(jar, notice), Redirect::to(to)).into_response()
}

/// The user behind the request's session cookie, if any.
pub fn current_user(state: &AppState, jar: &CookieJar) -> Option<CurrentUser> {
    let session_id = jar.get(SESSION_COOKIE)?.value().to_string();
    let session = state.sessions.validate(&session_id)?;
    Some(CurrentUser {
        session_id,
        email: session.email,
        role: session.role,
    })
}

/// Serve the login page
///
/// A visitor who already has a live session goes straight to the dashboard.
pub async fn serve_login_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    if current_user(&state, &jar).is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    let (jar, notices) = take_flash(jar);
    render_login(&state, jar, notices, StatusCode::OK)
}

/// Handle user login requests
///
/// Valid credentials create a session and redirect to the dashboard;
/// anything else re-renders the form with an error notice.
pub async fn handle_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(credentials): Form<LoginForm>,
) -> Response {
    if current_user(&state, &jar).is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    match verify_user(&state.config.users, &credentials.email, &credentials.password) {
        Some(role) => {
            let session_id = state.sessions.create(&credentials.email, role);
            log::info!("{} logged in as {}", credentials.email, role.as_str());
            let cookie = Cookie::build((SESSION_COOKIE, session_id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);
            (jar.add(cookie), Redirect::to("/dashboard")).into_response()
        }
        None => {
            log::warn!("failed login for {:?}", credentials.email);
            let (jar, mut notices) = take_flash(jar);
            notices.push("Invalid email or password".to_string());
            render_login(&state, jar, notices, StatusCode::UNAUTHORIZED)
        }
    }
}

/// Handle user logout
///
/// Drops the session, clears the session cookie and returns to the login page.
pub async fn handle_logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(user) = current_user(&state, &jar) {
        state.sessions.remove(&user.session_id);
        log::info!("{} logged out", user.email);
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    redirect_with_notice(jar, "Logged out successfully", "/")
}

/// Authentication middleware
///
/// Lets the request through with a [`CurrentUser`] extension when the
/// session is valid, otherwise redirects to the login page.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match current_user(&state, &jar) {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => redirect_with_notice(jar, "Please login first", "/"),
    }
}

/// Authentication middleware for JSON endpoints
///
/// Same check as [`require_auth`], but answers 401 with a `{message}` body
/// instead of redirecting.
pub async fn require_auth_json(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match current_user(&state, &jar) {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "message": "Please login first" })),
        )
            .into_response(),
    }
}

fn render_login(state: &AppState, jar: CookieJar, notices: Vec<String>, status: StatusCode) -> Response {
    match state.templates.login(&notices) {
        Ok(page) => (status, jar, Html(page)).into_response(),
        Err(e) => {
            log::error!("failed to render login page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> HashMap<String, UserRecord> {
        let mut users = HashMap::new();
        users.insert(
            "admin@example.com".to_string(),
            UserRecord {
                password: "admin123".to_string(),
                role: Role::Admin,
            },
        );
        users.insert(
            "user@example.com".to_string(),
            UserRecord {
                password: hash_password("user123").unwrap(),
                role: Role::User,
            },
        );
        users
    }

    #[test]
    fn plain_and_hashed_secrets_verify() {
        let users = users();
        assert_eq!(verify_user(&users, "admin@example.com", "admin123"), Some(Role::Admin));
        assert_eq!(verify_user(&users, "user@example.com", "user123"), Some(Role::User));
        assert_eq!(verify_user(&users, "user@example.com", "admin123"), None);
        assert_eq!(verify_user(&users, "nobody@example.com", "admin123"), None);
    }

    #[test]
    fn hash_is_not_the_password() {
        let hash = hash_password("secret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret", &hash));
        assert!(!verify_password("Secret", &hash));
    }

    #[test]
    fn sessions_expire() {
        let live = SessionStore::new(Duration::from_secs(60));
        let id = live.create("a@example.com", Role::User);
        let session = live.validate(&id).unwrap();
        assert_eq!(session.email, "a@example.com");
        live.remove(&id);
        assert!(live.validate(&id).is_none());

        let dead = SessionStore::new(Duration::ZERO);
        let id = dead.create("a@example.com", Role::Admin);
        assert!(dead.validate(&id).is_none());
        assert!(
            dead.sessions
                .read()
                .unwrap()
                .get(&id)
                .is_none()
        );
    }

    #[test]
    fn flash_round_trips_through_the_jar() {
        let jar = push_flash(CookieJar::new(), "Error reading a.xlsx: bad zip");
        let jar = push_flash(jar, "Row added successfully!");
        let (jar, notices) = take_flash(jar);
        assert_eq!(
            notices,
            vec!["Error reading a.xlsx: bad zip", "Row added successfully!"]
        );
        assert!(read_flash(&jar).is_empty());
    }

    #[test]
    fn flash_header_is_encoded_once() {
        let response = redirect_with_notice(CookieJar::new(), "Please login first", "/");
        let cookie = response
            .headers()
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("flash="))
            .unwrap();
        assert!(cookie.starts_with("flash=Please%20login%20first;"), "{cookie}");
    }
}
