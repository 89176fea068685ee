//! Nutrition aggregation for diet plans
//!
//! Calories are never stored. They are derived from macros at fixed energy
//! densities: protein and carbs at 4 kcal/g, fat at 9 kcal/g.

use std::collections::HashSet;
use std::ops::Add;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{DietDetail, DietFoodConsumption, DietMealFood};

pub const PROTEIN_KCAL_PER_GRAM: f64 = 4.0;
pub const CARBS_KCAL_PER_GRAM: f64 = 4.0;
pub const FAT_KCAL_PER_GRAM: f64 = 9.0;

// ---------------------------------------------------------------------------
/// Macro totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
  pub protein_animal: f64,
  pub protein_vegetable: f64,
  pub carbs: f64,
  pub fat: f64,
}

impl MacroTotals {
  pub fn from_food(food: &DietMealFood) -> Self {
    Self {
      protein_animal: food.protein_animal,
      protein_vegetable: food.protein_vegetable,
      carbs: food.carbs,
      fat: food.fat,
    }
  }

  pub fn protein(&self) -> f64 {
    self.protein_animal + self.protein_vegetable
  }

  pub fn calories(&self) -> f64 {
    (self.protein() + self.carbs) * PROTEIN_KCAL_PER_GRAM + self.fat * FAT_KCAL_PER_GRAM
  }
}

impl Add for MacroTotals {
  type Output = MacroTotals;

  fn add(self, other: MacroTotals) -> MacroTotals {
    MacroTotals {
      protein_animal: self.protein_animal + other.protein_animal,
      protein_vegetable: self.protein_vegetable + other.protein_vegetable,
      carbs: self.carbs + other.carbs,
      fat: self.fat + other.fat,
    }
  }
}

impl std::iter::Sum for MacroTotals {
  fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
    iter.fold(MacroTotals::default(), |acc, m| acc + m)
  }
}

impl<'a> std::iter::Sum<&'a DietMealFood> for MacroTotals {
  fn sum<I: Iterator<Item = &'a DietMealFood>>(iter: I) -> Self {
    iter.map(MacroTotals::from_food).sum()
  }
}

/// Share of `calories` contributed by `kcal`, 0 when there are no calories
fn percentage_of(kcal: f64, calories: f64) -> f64 {
  if calories > 0.0 {
    kcal / calories * 100.0
  } else {
    0.0
  }
}

// ---------------------------------------------------------------------------
/// Diet summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealSummary {
  pub meal_id: i64,
  pub name: String,
  pub order_number: i64,
  pub protein: f64,
  pub carbs: f64,
  pub fat: f64,
  pub calories: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietSummary {
  pub total_protein: f64,
  pub total_protein_animal: f64,
  pub total_protein_vegetable: f64,
  pub total_carbs: f64,
  pub total_fat: f64,
  pub total_calories: f64,
  pub protein_pct: f64,
  pub carbs_pct: f64,
  pub fat_pct: f64,
  pub meals: Vec<MealSummary>,
}

/// Sum macros across every food of every meal and split calories by macro
pub fn summarize(diet: &DietDetail) -> DietSummary {
  let meals: Vec<MealSummary> = diet
    .meals
    .iter()
    .map(|meal| {
      let totals: MacroTotals = meal.foods.iter().sum();
      MealSummary {
        meal_id: meal.meal.id,
        name: meal.meal.name.clone(),
        order_number: meal.meal.order_number,
        protein: totals.protein(),
        carbs: totals.carbs,
        fat: totals.fat,
        calories: totals.calories(),
      }
    })
    .collect();

  let totals: MacroTotals = diet.foods().sum();
  let total_calories = totals.calories();

  DietSummary {
    total_protein: totals.protein(),
    total_protein_animal: totals.protein_animal,
    total_protein_vegetable: totals.protein_vegetable,
    total_carbs: totals.carbs,
    total_fat: totals.fat,
    total_calories,
    protein_pct: percentage_of(totals.protein() * PROTEIN_KCAL_PER_GRAM, total_calories),
    carbs_pct: percentage_of(totals.carbs * CARBS_KCAL_PER_GRAM, total_calories),
    fat_pct: percentage_of(totals.fat * FAT_KCAL_PER_GRAM, total_calories),
    meals,
  }
}

// ---------------------------------------------------------------------------
/// Daily consumed-vs-planned progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyProgress {
  pub date: NaiveDate,
  pub consumed_protein: f64,
  pub consumed_carbs: f64,
  pub consumed_fat: f64,
  pub consumed_calories: f64,
  pub total_protein: f64,
  pub total_carbs: f64,
  pub total_fat: f64,
  pub total_calories: f64,
  pub consumed_foods: usize,
  pub total_foods: usize,
  pub progress_percentage: f64,
}

/// Intersect the foods marked consumed on `date` with the diet's foods.
///
/// Log rows for other dates, rows not marked consumed, and rows pointing at
/// foods outside this diet do not count.
pub fn daily_progress(
  diet: &DietDetail,
  consumption_log: &[DietFoodConsumption],
  date: NaiveDate,
) -> DailyProgress {
  let consumed_ids: HashSet<i64> = consumption_log
    .iter()
    .filter(|entry| entry.consumption_date == date && entry.is_consumed)
    .map(|entry| entry.diet_meal_food_id)
    .collect();

  let total: MacroTotals = diet.foods().sum();
  let consumed_foods: Vec<&DietMealFood> = diet
    .foods()
    .filter(|food| consumed_ids.contains(&food.id))
    .collect();
  let consumed: MacroTotals = consumed_foods.iter().copied().sum();

  let total_calories = total.calories();
  let consumed_calories = consumed.calories();

  DailyProgress {
    date,
    consumed_protein: consumed.protein(),
    consumed_carbs: consumed.carbs,
    consumed_fat: consumed.fat,
    consumed_calories,
    total_protein: total.protein(),
    total_carbs: total.carbs,
    total_fat: total.fat,
    total_calories,
    consumed_foods: consumed_foods.len(),
    total_foods: diet.foods().count(),
    progress_percentage: percentage_of(consumed_calories, total_calories),
  }
}
