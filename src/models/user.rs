use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account row, including the password hash. Never serialized to clients.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
  pub id: i64,
  pub email: String,
  pub display_name: String,
  pub password_hash: String,
  pub must_change_password: bool,
  pub created_at: DateTime<Utc>,
}

/// Public projection of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  pub id: i64,
  pub email: String,
  pub display_name: String,
  pub must_change_password: bool,
}

impl From<&User> for Profile {
  fn from(user: &User) -> Self {
    Self {
      id: user.id,
      email: user.email.clone(),
      display_name: user.display_name.clone(),
      must_change_password: user.must_change_password,
    }
  }
}
