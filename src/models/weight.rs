use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeightEntry {
  pub id: i64,
  pub user_id: i64,
  pub weight: f64,
  pub recorded_date: NaiveDate,
  pub notes: Option<String>,
}

/// For inserting new weight entries (without id, user_id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWeightEntry {
  pub weight: f64,
  pub recorded_date: NaiveDate,
  #[serde(default)]
  pub notes: Option<String>,
}
