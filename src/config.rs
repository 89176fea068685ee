//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

use chrono::Duration;

const DEFAULT_ADDR: &str = "127.0.0.1:8790";
const DEFAULT_DATABASE_URL: &str = "sqlite:fitness.db?mode=rwc";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SESSION_TTL_HOURS: i64 = 168;
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone)]
pub struct Config {
  pub addr: SocketAddr,
  pub database_url: String,
  pub max_connections: u32,
  pub session_ttl: Duration,
  /// None when SMTP is not configured; mail is then only logged
  pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
  pub host: String,
  pub port: u16,
  pub username: String,
  pub password: String,
  pub from: String,
}

impl Config {
  /// Load configuration from environment variables.
  ///
  /// | Variable | Description | Default |
  /// |----------|-------------|---------|
  /// | `FITNESS_ADDR` | Server bind address | `127.0.0.1:8790` |
  /// | `DATABASE_URL` | SQLite database URL | `sqlite:fitness.db?mode=rwc` |
  /// | `DB_MAX_CONNECTIONS` | Pool size | `5` |
  /// | `SESSION_TTL_HOURS` | Session lifetime | `168` |
  /// | `SMTP_HOST` | SMTP relay; enables the SMTP mailer | (unset) |
  /// | `SMTP_PORT` | SMTP port | `587` |
  /// | `SMTP_USERNAME` / `SMTP_PASSWORD` | SMTP credentials | (required with `SMTP_HOST`) |
  /// | `MAIL_FROM` | Sender address | `SMTP_USERNAME` |
  pub fn from_env() -> Result<Self, ConfigError> {
    let addr = env::var("FITNESS_ADDR")
      .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
      .parse()
      .map_err(|_| ConfigError::Invalid("FITNESS_ADDR"))?;

    let database_url =
      env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    let max_connections = parse_var("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
    if max_connections == 0 {
      return Err(ConfigError::Invalid("DB_MAX_CONNECTIONS"));
    }

    let ttl_hours: i64 = parse_var("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?;
    if ttl_hours <= 0 {
      return Err(ConfigError::Invalid("SESSION_TTL_HOURS"));
    }

    let smtp = match env::var("SMTP_HOST") {
      Ok(host) if !host.trim().is_empty() => Some(SmtpConfig::from_env(host)?),
      _ => None,
    };

    Ok(Self {
      addr,
      database_url,
      max_connections,
      session_ttl: Duration::hours(ttl_hours),
      smtp,
    })
  }
}

impl SmtpConfig {
  fn from_env(host: String) -> Result<Self, ConfigError> {
    let port = parse_var("SMTP_PORT", DEFAULT_SMTP_PORT)?;
    let username = env::var("SMTP_USERNAME").map_err(|_| ConfigError::Missing("SMTP_USERNAME"))?;
    let password = env::var("SMTP_PASSWORD").map_err(|_| ConfigError::Missing("SMTP_PASSWORD"))?;
    let from = env::var("MAIL_FROM").unwrap_or_else(|_| username.clone());

    Ok(Self {
      host,
      port,
      username,
      password,
      from,
    })
  }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
  match env::var(name) {
    Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
    Err(_) => Ok(default),
  }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
  #[error("{0} environment variable is required")]
  Missing(&'static str),

  #[error("Invalid {0} value")]
  Invalid(&'static str),
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  const ALL_VARS: [&str; 9] = [
    "FITNESS_ADDR",
    "DATABASE_URL",
    "DB_MAX_CONNECTIONS",
    "SESSION_TTL_HOURS",
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USERNAME",
    "SMTP_PASSWORD",
    "MAIL_FROM",
  ];

  fn env_with(overrides: &[(&'static str, &'static str)]) -> Vec<(&'static str, Option<&'static str>)> {
    ALL_VARS
      .iter()
      .map(|name| {
        let value = overrides.iter().find(|(key, _)| key == name).map(|(_, v)| *v);
        (*name, value)
      })
      .collect()
  }

  #[test]
  #[serial]
  fn test_defaults_without_env() {
    temp_env::with_vars(env_with(&[]), || {
      let config = Config::from_env().expect("defaults should load");
      assert_eq!(config.addr.to_string(), DEFAULT_ADDR);
      assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
      assert_eq!(config.max_connections, 5);
      assert_eq!(config.session_ttl, Duration::hours(168));
      assert!(config.smtp.is_none());
    });
  }

  #[test]
  #[serial]
  fn test_invalid_addr_is_rejected() {
    let vars = env_with(&[
      ("FITNESS_ADDR", "not-an-addr"),
    ]);
    temp_env::with_vars(vars, || {
      assert_eq!(
        Config::from_env().unwrap_err(),
        ConfigError::Invalid("FITNESS_ADDR")
      );
    });
  }

  #[test]
  #[serial]
  fn test_zero_ttl_is_rejected() {
    let vars = env_with(&[
      ("SESSION_TTL_HOURS", "0"),
    ]);
    temp_env::with_vars(vars, || {
      assert_eq!(
        Config::from_env().unwrap_err(),
        ConfigError::Invalid("SESSION_TTL_HOURS")
      );
    });
  }

  #[test]
  #[serial]
  fn test_smtp_requires_credentials() {
    let vars = env_with(&[
      ("SMTP_HOST", "smtp.example.com"),
    ]);
    temp_env::with_vars(vars, || {
      assert_eq!(
        Config::from_env().unwrap_err(),
        ConfigError::Missing("SMTP_USERNAME")
      );
    });
  }

  #[test]
  #[serial]
  fn test_smtp_config_loads() {
    let vars = env_with(&[
      ("SMTP_HOST", "smtp.example.com"),
      ("SMTP_PORT", "2525"),
      ("SMTP_USERNAME", "coach@example.com"),
      ("SMTP_PASSWORD", "secret"),
    ]);
    temp_env::with_vars(vars, || {
      let smtp = Config::from_env().unwrap().smtp.expect("smtp configured");
      assert_eq!(smtp.host, "smtp.example.com");
      assert_eq!(smtp.port, 2525);
      assert_eq!(smtp.from, "coach@example.com");
    });
  }
}
