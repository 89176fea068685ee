//! Accounts, sessions and password recovery
//!
//! - Passwords are bcrypt hashes; session tokens are random and stored as SHA-256 digests
//! - The session a request runs under is an explicit three-state machine
//!   (`Loading`, `Authenticated`, `Anonymous`) resolved once per request
//! - Error messages mirror the auth provider strings and are localized at the edge

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::db::AppState;
use crate::error::{AppError, AppResult};
use crate::mailer::{Mailer, OutgoingMail};
use crate::models::{Profile, User};

const MIN_PASSWORD_LENGTH: usize = 6;
const TEMPORARY_PASSWORD_LENGTH: usize = 8;
const SESSION_TOKEN_LENGTH: usize = 48;

#[cfg(test)]
const BCRYPT_COST: u32 = 4;
#[cfg(not(test))]
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

// ---------------------------------------------------------------------------
/// Errors (provider message strings)
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AuthError {
  #[error("Invalid login credentials")]
  InvalidCredentials,

  #[error("User already registered")]
  AlreadyRegistered,

  #[error("Password should be at least 6 characters")]
  WeakPassword,

  #[error("Unable to validate email address: invalid format")]
  InvalidEmail,

  #[error("New password should be different from the old password.")]
  SamePassword,

  #[error("Auth session missing!")]
  SessionMissing,

  #[error("Session expired")]
  SessionExpired,
}

impl AuthError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      Self::InvalidCredentials | Self::SessionMissing | Self::SessionExpired => {
        StatusCode::UNAUTHORIZED
      }
      Self::AlreadyRegistered => StatusCode::CONFLICT,
      Self::WeakPassword | Self::InvalidEmail | Self::SamePassword => {
        StatusCode::UNPROCESSABLE_ENTITY
      }
    }
  }
}

/// Map a known auth provider message to its pt-BR text.
/// Unknown messages are returned verbatim.
pub fn localize_auth_message(message: &str) -> String {
  let localized = match message {
    "Invalid login credentials" => "Email ou senha incorretos",
    "User already registered" => "Este email já está cadastrado",
    "Password should be at least 6 characters" => "A senha deve ter pelo menos 6 caracteres",
    "Unable to validate email address: invalid format" => "Formato de email inválido",
    "New password should be different from the old password." => {
      "A nova senha deve ser diferente da senha atual"
    }
    "Auth session missing!" => "Sessão não encontrada. Faça login novamente",
    "Session expired" => "Sua sessão expirou. Faça login novamente",
    "Email not confirmed" => "Email ainda não confirmado",
    other => other,
  };
  localized.to_string()
}

// ---------------------------------------------------------------------------
/// Session state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
  pub user_id: i64,
  pub profile: Profile,
  pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "session", rename_all = "snake_case")]
pub enum SessionState {
  Loading,
  Authenticated(Session),
  Anonymous,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
  /// Result of the initial session lookup
  InitialFetch(Option<Session>),
  SignedIn(Session),
  SignedOut,
}

impl SessionState {
  /// Apply an event. The initial fetch only settles `Loading`; once a sign-in or
  /// sign-out has been observed, a late fetch result is ignored.
  pub fn apply(self, event: SessionEvent) -> Self {
    match (self, event) {
      (Self::Loading, SessionEvent::InitialFetch(Some(session))) => Self::Authenticated(session),
      (Self::Loading, SessionEvent::InitialFetch(None)) => Self::Anonymous,
      (state, SessionEvent::InitialFetch(_)) => state,
      (_, SessionEvent::SignedIn(session)) => Self::Authenticated(session),
      (_, SessionEvent::SignedOut) => Self::Anonymous,
    }
  }

  pub fn session(&self) -> Option<&Session> {
    match self {
      Self::Authenticated(session) => Some(session),
      _ => None,
    }
  }
}

/// Per-request session context, injected into handlers
#[derive(Debug, Clone)]
pub struct SessionContext {
  pub token: Option<String>,
  pub state: SessionState,
}

impl SessionContext {
  pub fn new(token: Option<String>) -> Self {
    Self {
      token,
      state: SessionState::Loading,
    }
  }

  pub fn apply(&mut self, event: SessionEvent) {
    let current = std::mem::replace(&mut self.state, SessionState::Loading);
    self.state = current.apply(event);
  }

  /// Resolve the bearer token against the store and settle the state
  pub async fn resolve(pool: &SqlitePool, token: Option<String>) -> AppResult<Self> {
    let session = match token.as_deref() {
      Some(token) => resolve_session(pool, token).await?,
      None => None,
    };
    let mut context = Self::new(token);
    context.apply(SessionEvent::InitialFetch(session));
    Ok(context)
  }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.strip_prefix("Bearer "))
    .map(|token| token.trim().to_string())
    .filter(|token| !token.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for SessionContext {
  type Rejection = AppError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &Arc<AppState>,
  ) -> Result<Self, Self::Rejection> {
    SessionContext::resolve(&state.db, bearer_token(&parts.headers)).await
  }
}

/// Extractor that only succeeds for an authenticated session
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

impl CurrentUser {
  pub fn id(&self) -> i64 {
    self.0.user_id
  }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
  type Rejection = AppError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &Arc<AppState>,
  ) -> Result<Self, Self::Rejection> {
    let context = SessionContext::from_request_parts(parts, state).await?;
    match context.state {
      SessionState::Authenticated(session) => Ok(CurrentUser(session)),
      _ if context.token.is_some() => Err(AuthError::SessionExpired.into()),
      _ => Err(AuthError::SessionMissing.into()),
    }
  }
}

// ---------------------------------------------------------------------------
/// Credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
  pub email: String,
  pub password: String,
  pub display_name: String,
}

/// Returned by sign-in
#[derive(Debug, Clone, Serialize)]
pub struct SessionGrant {
  pub access_token: String,
  pub expires_at: DateTime<Utc>,
  pub profile: Profile,
}

fn normalize_email(email: &str) -> AppResult<String> {
  let email = email.trim().to_lowercase();
  let valid = match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
    }
    None => false,
  };
  if valid {
    Ok(email)
  } else {
    Err(AuthError::InvalidEmail.into())
  }
}

fn check_password_strength(password: &str) -> AppResult<()> {
  if password.chars().count() < MIN_PASSWORD_LENGTH {
    return Err(AuthError::WeakPassword.into());
  }
  Ok(())
}

async fn hash_password(password: &str) -> AppResult<String> {
  let password = password.to_string();
  tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
    .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

async fn verify_password(password: &str, hash: &str) -> bool {
  let password = password.to_string();
  let hash = hash.to_string();
  tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash).unwrap_or(false))
    .await
    .unwrap_or(false)
}

fn random_alphanumeric(length: usize) -> String {
  rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(length)
    .map(char::from)
    .collect()
}

/// Random 8-character alphanumeric password issued by a reset
pub fn generate_temporary_password() -> String {
  random_alphanumeric(TEMPORARY_PASSWORD_LENGTH)
}

fn hash_token(token: &str) -> String {
  format!("{:x}", Sha256::digest(token.as_bytes()))
}

// ---------------------------------------------------------------------------
/// Database Operations
// ---------------------------------------------------------------------------

async fn find_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
  let user = sqlx::query_as::<_, User>(
    r#"
    SELECT id, email, display_name, password_hash, must_change_password, created_at
    FROM users
    WHERE email = ?
    "#,
  )
  .bind(email)
  .fetch_optional(pool)
  .await?;

  Ok(user)
}

pub async fn get_user(pool: &SqlitePool, user_id: i64) -> AppResult<User> {
  sqlx::query_as::<_, User>(
    r#"
    SELECT id, email, display_name, password_hash, must_change_password, created_at
    FROM users
    WHERE id = ?
    "#,
  )
  .bind(user_id)
  .fetch_optional(pool)
  .await?
  .ok_or_else(|| AppError::not_found("User", user_id))
}

pub async fn get_profile(pool: &SqlitePool, user_id: i64) -> AppResult<Profile> {
  let user = get_user(pool, user_id).await?;
  Ok(Profile::from(&user))
}

/// Register a new account
pub async fn sign_up(pool: &SqlitePool, account: &NewAccount) -> AppResult<Profile> {
  let email = normalize_email(&account.email)?;
  check_password_strength(&account.password)?;
  let display_name = account.display_name.trim();
  if display_name.is_empty() {
    return Err(AppError::validation("display_name is required"));
  }

  let password_hash = hash_password(&account.password).await?;

  let result = sqlx::query(
    r#"
    INSERT INTO users (email, display_name, password_hash)
    VALUES (?1, ?2, ?3)
    "#,
  )
  .bind(&email)
  .bind(display_name)
  .bind(&password_hash)
  .execute(pool)
  .await
  .map_err(|e| {
    if let sqlx::Error::Database(ref db_err) = e {
      if db_err.is_unique_violation() {
        return AppError::Auth(AuthError::AlreadyRegistered);
      }
    }
    AppError::Database(e)
  })?;

  info!(user_id = result.last_insert_rowid(), "Account created");
  get_profile(pool, result.last_insert_rowid()).await
}

/// Check credentials and open a session
pub async fn sign_in(
  pool: &SqlitePool,
  email: &str,
  password: &str,
  ttl: Duration,
) -> AppResult<SessionGrant> {
  let email = email.trim().to_lowercase();
  let user = find_user_by_email(pool, &email)
    .await?
    .ok_or(AuthError::InvalidCredentials)?;

  if !verify_password(password, &user.password_hash).await {
    warn!(user_id = user.id, "Rejected sign-in");
    return Err(AuthError::InvalidCredentials.into());
  }

  let token = random_alphanumeric(SESSION_TOKEN_LENGTH);
  let expires_at = Utc::now() + ttl;

  sqlx::query(
    r#"
    INSERT INTO auth_sessions (token_hash, user_id, expires_at)
    VALUES (?1, ?2, ?3)
    "#,
  )
  .bind(hash_token(&token))
  .bind(user.id)
  .bind(expires_at)
  .execute(pool)
  .await?;

  info!(user_id = user.id, "Signed in");

  Ok(SessionGrant {
    access_token: token,
    expires_at,
    profile: Profile::from(&user),
  })
}

/// Look up the session behind a bearer token. Expired sessions are removed.
pub async fn resolve_session(pool: &SqlitePool, token: &str) -> AppResult<Option<Session>> {
  let token_hash = hash_token(token);
  let row: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
    "SELECT user_id, expires_at FROM auth_sessions WHERE token_hash = ?",
  )
  .bind(&token_hash)
  .fetch_optional(pool)
  .await?;

  let Some((user_id, expires_at)) = row else {
    return Ok(None);
  };

  if expires_at <= Utc::now() {
    sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ?")
      .bind(&token_hash)
      .execute(pool)
      .await?;
    return Ok(None);
  }

  let profile = get_profile(pool, user_id).await?;
  Ok(Some(Session {
    user_id,
    profile,
    expires_at,
  }))
}

pub async fn sign_out(pool: &SqlitePool, token: &str) -> AppResult<()> {
  sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ?")
    .bind(hash_token(token))
    .execute(pool)
    .await?;
  Ok(())
}

/// Replace the password after verifying the current one; clears the forced-change flag
pub async fn change_password(
  pool: &SqlitePool,
  user_id: i64,
  current_password: &str,
  new_password: &str,
) -> AppResult<()> {
  check_password_strength(new_password)?;
  let user = get_user(pool, user_id).await?;

  if !verify_password(current_password, &user.password_hash).await {
    return Err(AuthError::InvalidCredentials.into());
  }
  if current_password == new_password {
    return Err(AuthError::SamePassword.into());
  }

  let password_hash = hash_password(new_password).await?;
  sqlx::query(
    "UPDATE users SET password_hash = ?1, must_change_password = 0 WHERE id = ?2",
  )
  .bind(&password_hash)
  .bind(user_id)
  .execute(pool)
  .await?;

  info!(user_id, "Password changed");
  Ok(())
}

/// Replace the account's password with a temporary one and build the mail
/// carrying it. `None` when the address has no account.
///
/// Unknown and malformed addresses still pay for one bcrypt hash, so both
/// paths take about as long.
pub async fn issue_temporary_password(pool: &SqlitePool, email: &str) -> AppResult<Option<OutgoingMail>> {
  let temporary = generate_temporary_password();
  let password_hash = hash_password(&temporary).await?;

  let Ok(email) = normalize_email(email) else {
    info!("Password reset requested for malformed address");
    return Ok(None);
  };

  let Some(user) = find_user_by_email(pool, &email).await? else {
    info!("Password reset requested for unknown address");
    return Ok(None);
  };

  sqlx::query(
    "UPDATE users SET password_hash = ?1, must_change_password = 1 WHERE id = ?2",
  )
  .bind(&password_hash)
  .bind(user.id)
  .execute(pool)
  .await?;

  sqlx::query("DELETE FROM auth_sessions WHERE user_id = ?")
    .bind(user.id)
    .execute(pool)
    .await?;

  info!(user_id = user.id, "Temporary password issued");
  Ok(Some(OutgoingMail {
    to: user.email.clone(),
    subject: "Sua senha temporária".to_string(),
    body: format!(
      "Olá, {}!\n\nSua senha temporária é: {}\n\nUse-a para entrar e defina uma nova senha em seguida.",
      user.display_name, temporary
    ),
  }))
}

/// Issue a temporary password and mail it.
///
/// Always succeeds from the caller's point of view, so the response never
/// reveals whether the address has an account. Delivery runs on its own task
/// and failures are only logged.
pub async fn reset_password(pool: &SqlitePool, mailer: &Mailer, email: &str) -> AppResult<()> {
  if let Some(mail) = issue_temporary_password(pool, email).await? {
    let mailer = mailer.clone();
    tokio::spawn(async move {
      let to = mail.to.clone();
      if let Err(e) = mailer.send(mail).await {
        error!(to = %to, error = %e, "Failed to send temporary password");
      }
    });
  }
  Ok(())
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
