pub mod diet;
pub mod training;
pub mod user;
pub mod weight;

pub use diet::{Diet, DietDetail, DietFoodConsumption, DietMeal, DietMealFood, MealDetail};
pub use training::{
  Exercise, ExerciseKey, ExerciseObservation, ExerciseSet, ProgressionType, TrainingDay,
  TrainingPlan, TrainingWeek,
};
pub use user::{Profile, User};
pub use weight::{NewWeightEntry, WeightEntry};

/// Deserialize a patch field where an absent key leaves the stored value alone
/// (`None`) and an explicit `null` clears it (`Some(None)`).
///
/// Use together with `#[serde(default)]`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
  T: serde::Deserialize<'de>,
  D: serde::Deserializer<'de>,
{
  <Option<T> as serde::Deserialize>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
  use serde::Deserialize;

  #[derive(Debug, Deserialize)]
  struct Patch {
    #[serde(default, deserialize_with = "super::nullable")]
    note: Option<Option<String>>,
  }

  #[test]
  fn test_nullable_distinguishes_absent_from_null() {
    let absent: Patch = serde_json::from_str("{}").unwrap();
    assert_eq!(absent.note, None);

    let cleared: Patch = serde_json::from_str(r#"{"note": null}"#).unwrap();
    assert_eq!(cleared.note, Some(None));

    let set: Patch = serde_json::from_str(r#"{"note": "leve"}"#).unwrap();
    assert_eq!(set.note, Some(Some("leve".to_string())));
  }
}
