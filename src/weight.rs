//! Body weight log

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{NewWeightEntry, WeightEntry};

/// Starting vs latest weight over the whole log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTrend {
  pub entries: usize,
  pub starting_weight: f64,
  pub latest_weight: f64,
  pub change: f64,
  pub change_pct: f64,
}

/// Entries must be ordered by date. `None` for an empty log.
pub fn weight_trend(entries: &[WeightEntry]) -> Option<WeightTrend> {
  let first = entries.first()?;
  let last = entries.last()?;
  let change = last.weight - first.weight;

  Some(WeightTrend {
    entries: entries.len(),
    starting_weight: first.weight,
    latest_weight: last.weight,
    change: (change * 10.0).round() / 10.0,
    change_pct: (change / first.weight * 1000.0).round() / 10.0,
  })
}

// ---------------------------------------------------------------------------
// Database Operations
// ---------------------------------------------------------------------------

pub async fn add_entry(pool: &SqlitePool, user_id: i64, entry: &NewWeightEntry) -> AppResult<WeightEntry> {
  if !entry.weight.is_finite() || entry.weight <= 0.0 {
    return Err(AppError::validation("weight must be greater than zero"));
  }

  let id = sqlx::query(
    "INSERT INTO weight_entries (user_id, weight, recorded_date, notes) VALUES (?1, ?2, ?3, ?4)",
  )
  .bind(user_id)
  .bind(entry.weight)
  .bind(entry.recorded_date)
  .bind(&entry.notes)
  .execute(pool)
  .await?
  .last_insert_rowid();

  info!(user_id, entry_id = id, "Recorded weight");

  Ok(WeightEntry {
    id,
    user_id,
    weight: entry.weight,
    recorded_date: entry.recorded_date,
    notes: entry.notes.clone(),
  })
}

/// Oldest first
pub async fn list_entries(pool: &SqlitePool, user_id: i64) -> AppResult<Vec<WeightEntry>> {
  let entries = sqlx::query_as::<_, WeightEntry>(
    r#"
    SELECT id, user_id, weight, recorded_date, notes
    FROM weight_entries
    WHERE user_id = ?
    ORDER BY recorded_date, id
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;
  Ok(entries)
}

pub async fn delete_entry(pool: &SqlitePool, user_id: i64, entry_id: i64) -> AppResult<()> {
  let result = sqlx::query("DELETE FROM weight_entries WHERE id = ?1 AND user_id = ?2")
    .bind(entry_id)
    .bind(user_id)
    .execute(pool)
    .await?;

  if result.rows_affected() == 0 {
    return Err(AppError::not_found("WeightEntry", entry_id));
  }
  Ok(())
}

pub async fn trend(pool: &SqlitePool, user_id: i64) -> AppResult<Option<WeightTrend>> {
  let entries = list_entries(pool, user_id).await?;
  Ok(weight_trend(&entries))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{seed_test_user, setup_test_db, teardown_test_db};
  use chrono::NaiveDate;

  fn entry(weight: f64, day: u32) -> NewWeightEntry {
    NewWeightEntry {
      weight,
      recorded_date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
      notes: None,
    }
  }

  #[tokio::test]
  async fn test_entries_are_listed_by_date() {
    let pool = setup_test_db().await;
    let user_id = seed_test_user(&pool, "ana@example.com").await;

    add_entry(&pool, user_id, &entry(80.0, 20)).await.unwrap();
    add_entry(&pool, user_id, &entry(82.0, 1)).await.unwrap();
    add_entry(&pool, user_id, &entry(81.0, 10)).await.unwrap();

    let weights: Vec<f64> = list_entries(&pool, user_id)
      .await
      .unwrap()
      .iter()
      .map(|e| e.weight)
      .collect();
    assert_eq!(weights, vec![82.0, 81.0, 80.0]);

    let trend = trend(&pool, user_id).await.unwrap().expect("non-empty log");
    assert_eq!(trend.starting_weight, 82.0);
    assert_eq!(trend.latest_weight, 80.0);
    assert_eq!(trend.change, -2.0);
    assert_eq!(trend.change_pct, -2.4);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_invalid_weight_and_foreign_delete() {
    let pool = setup_test_db().await;
    let owner = seed_test_user(&pool, "ana@example.com").await;
    let other = seed_test_user(&pool, "bia@example.com").await;

    assert!(matches!(
      add_entry(&pool, owner, &entry(0.0, 1)).await,
      Err(AppError::Validation(_))
    ));

    let saved = add_entry(&pool, owner, &entry(70.5, 2)).await.unwrap();
    assert!(matches!(
      delete_entry(&pool, other, saved.id).await,
      Err(AppError::NotFound { .. })
    ));
    delete_entry(&pool, owner, saved.id).await.unwrap();
    assert!(trend(&pool, owner).await.unwrap().is_none());

    teardown_test_db(pool).await;
  }
}
