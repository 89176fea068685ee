//! Weekly exercise progress
//!
//! Reduces the sets logged for one exercise key into per-week statistics and a
//! first-to-last summary. Weeks without a performed set are reported with
//! explicit zeros so charts keep one point per week.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::{ExerciseKey, ExerciseSet};
use crate::training::{get_plan, resolve_exercise};

fn round1(value: f64) -> f64 {
  (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekStats {
  pub week_number: i64,
  pub max_weight: f64,
  /// Σ weight × reps over performed sets
  pub total_volume: f64,
  /// One decimal
  pub avg_reps: f64,
  pub sets_performed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
  pub first_week: i64,
  pub last_week: i64,
  pub start_weight: f64,
  pub end_weight: f64,
  pub weight_gain: f64,
  /// Percent change of max weight, one decimal
  pub pct_change: f64,
  /// Percent change of volume between the same weeks; absent when the first week has none
  pub volume_change_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExerciseProgress {
  pub exercise_key: ExerciseKey,
  pub name: String,
  pub weeks: Vec<WeekStats>,
  pub summary: Option<ProgressSummary>,
}

/// Stats for weeks `1..=total_weeks`; sets outside that range are ignored
pub fn weekly_stats(sets: &[ExerciseSet], total_weeks: i64) -> Vec<WeekStats> {
  (1..=total_weeks)
    .map(|week_number| {
      let performed: Vec<(f64, i64)> = sets
        .iter()
        .filter(|set| set.week_number == week_number)
        .filter_map(ExerciseSet::performed)
        .collect();

      if performed.is_empty() {
        return WeekStats {
          week_number,
          max_weight: 0.0,
          total_volume: 0.0,
          avg_reps: 0.0,
          sets_performed: 0,
        };
      }

      let max_weight = performed
        .iter()
        .map(|(weight, _)| *weight)
        .fold(f64::MIN, f64::max);
      let total_volume = performed
        .iter()
        .map(|(weight, reps)| weight * *reps as f64)
        .sum();
      let total_reps: i64 = performed.iter().map(|(_, reps)| reps).sum();

      WeekStats {
        week_number,
        max_weight,
        total_volume,
        avg_reps: round1(total_reps as f64 / performed.len() as f64),
        sets_performed: performed.len(),
      }
    })
    .collect()
}

/// Compare the first and last weeks with a positive max weight.
/// Needs at least two such weeks.
pub fn progress_summary(weeks: &[WeekStats]) -> Option<ProgressSummary> {
  let mut loaded = weeks.iter().filter(|week| week.max_weight > 0.0);
  let first = loaded.next()?;
  let last = loaded.last()?;

  let weight_gain = last.max_weight - first.max_weight;
  let volume_change_pct = (first.total_volume > 0.0)
    .then(|| round1((last.total_volume - first.total_volume) / first.total_volume * 100.0));

  Some(ProgressSummary {
    first_week: first.week_number,
    last_week: last.week_number,
    start_weight: first.max_weight,
    end_weight: last.max_weight,
    weight_gain,
    pct_change: round1(weight_gain / first.max_weight * 100.0),
    volume_change_pct,
  })
}

// ---------------------------------------------------------------------------
// Database Operations
// ---------------------------------------------------------------------------

/// Progress of the exercise behind a row id across its plan's weeks
pub async fn exercise_progress(
  pool: &SqlitePool,
  user_id: i64,
  exercise_id: i64,
) -> AppResult<ExerciseProgress> {
  let resolved = resolve_exercise(pool, user_id, exercise_id).await?;
  let plan = get_plan(pool, user_id, resolved.plan_id).await?;
  let key = resolved.exercise.exercise_key;

  let sets = sqlx::query_as::<_, ExerciseSet>(
    r#"
    SELECT id, user_id, exercise_key, week_number, set_number, weight, reps
    FROM exercise_sets
    WHERE user_id = ?1 AND exercise_key = ?2 AND week_number BETWEEN 1 AND ?3
    ORDER BY week_number, set_number
    "#,
  )
  .bind(user_id)
  .bind(&key)
  .bind(plan.total_weeks)
  .fetch_all(pool)
  .await?;

  let weeks = weekly_stats(&sets, plan.total_weeks);
  let summary = progress_summary(&weeks);

  Ok(ExerciseProgress {
    exercise_key: key,
    name: resolved.exercise.name,
    weeks,
    summary,
  })
}
