use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable business identifier of an exercise.
///
/// Assigned once when the exercise first appears in a plan and carried across
/// every week and every template replication. Per-week logs reference this key,
/// never the `exercises.id` row id, which is regenerated on each replication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ExerciseKey(String);

impl ExerciseKey {
  pub fn generate() -> Self {
    Self(Uuid::new_v4().to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<String> for ExerciseKey {
  fn from(value: String) -> Self {
    Self(value)
  }
}

impl From<&str> for ExerciseKey {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}

impl std::fmt::Display for ExerciseKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

// ---------------------------------------------------------------------------
/// Progression technique applied week over week
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProgressionType {
  /// Add load every week at fixed reps
  Linear,
  /// Climb the rep range, then add load and reset reps
  Double,
  /// Load chosen by target RPE
  Rpe,
  /// Keep the prescription unchanged
  #[default]
  None,
}

// ---------------------------------------------------------------------------
/// Plan hierarchy: plan -> weeks -> days -> exercises
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrainingPlan {
  pub id: i64,
  pub user_id: i64,
  pub name: String,
  pub description: Option<String>,
  pub total_weeks: i64,
  pub current_week: i64,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub is_expired: bool,
}

impl TrainingPlan {
  /// Last day of a plan that starts on `start_date` and runs `total_weeks` weeks
  pub fn compute_end_date(start_date: NaiveDate, total_weeks: i64) -> NaiveDate {
    start_date + chrono::Duration::days(total_weeks * 7 - 1)
  }

  /// A plan expires the day after its end date
  pub fn is_expired_on(end_date: NaiveDate, today: NaiveDate) -> bool {
    today > end_date
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrainingWeek {
  pub id: i64,
  pub plan_id: i64,
  pub week_number: i64,
  pub is_deload: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrainingDay {
  pub id: i64,
  pub week_id: i64,
  pub day_number: i64,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Exercise {
  pub id: i64,
  pub day_id: i64,
  pub exercise_key: ExerciseKey,
  pub name: String,
  pub sets: i64,
  /// Rep prescription, e.g. `8-12` or `5`
  pub reps: String,
  pub rpe: Option<f64>,
  pub progression_type: ProgressionType,
  pub technique: Option<String>,
  pub technique_description: Option<String>,
  pub order_number: i64,
}

// ---------------------------------------------------------------------------
/// Per-week logs
// ---------------------------------------------------------------------------

/// One logged set. Null weight or reps means "not yet performed".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExerciseSet {
  pub id: i64,
  pub user_id: i64,
  pub exercise_key: ExerciseKey,
  pub week_number: i64,
  pub set_number: i64,
  pub weight: Option<f64>,
  pub reps: Option<i64>,
}

impl ExerciseSet {
  /// Both weight and reps recorded
  pub fn performed(&self) -> Option<(f64, i64)> {
    match (self.weight, self.reps) {
      (Some(weight), Some(reps)) => Some((weight, reps)),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExerciseObservation {
  pub id: i64,
  pub user_id: i64,
  pub exercise_key: ExerciseKey,
  pub week_number: i64,
  pub observations: String,
  pub is_completed: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn plan(start: NaiveDate, weeks: i64) -> TrainingPlan {
    TrainingPlan {
      id: 1,
      user_id: 1,
      name: "Hypertrophy".to_string(),
      description: None,
      total_weeks: weeks,
      current_week: 1,
      start_date: start,
      end_date: TrainingPlan::compute_end_date(start, weeks),
      is_expired: false,
    }
  }

  #[test]
  fn test_end_date_spans_whole_weeks() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert_eq!(
      TrainingPlan::compute_end_date(start, 8),
      NaiveDate::from_ymd_opt(2024, 2, 25).unwrap()
    );
  }

  #[test]
  fn test_expiration_is_after_end_date() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let p = plan(start, 1);
    assert!(!TrainingPlan::is_expired_on(p.end_date, p.end_date));
    assert!(!TrainingPlan::is_expired_on(p.end_date, start));
    assert!(TrainingPlan::is_expired_on(p.end_date, p.end_date + chrono::Duration::days(1)));
  }

  #[test]
  fn test_unperformed_set_has_no_values() {
    let set = ExerciseSet {
      id: 1,
      user_id: 1,
      exercise_key: ExerciseKey::from("k"),
      week_number: 1,
      set_number: 1,
      weight: Some(80.0),
      reps: None,
    };
    assert_eq!(set.performed(), None);
  }
}
