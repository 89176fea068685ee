//! HTTP route handlers.
//!
//! Every `/api` route except sign-up, sign-in and reset-password requires a
//! bearer session token, enforced by the `CurrentUser` extractor.

pub mod auth;
pub mod backup;
pub mod diet;
pub mod health;
pub mod training;
pub mod weight;

use std::sync::Arc;

use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::db::AppState;

/// Build the router with all routes.
pub fn router() -> Router<Arc<AppState>> {
  Router::new()
    // Health check
    .route("/health", get(health::health))
    // Accounts and sessions
    .route("/api/auth/sign-up", post(auth::sign_up))
    .route("/api/auth/sign-in", post(auth::sign_in))
    .route("/api/auth/sign-out", post(auth::sign_out))
    .route("/api/auth/session", get(auth::current_session))
    .route("/api/auth/change-password", post(auth::change_password))
    .route("/api/auth/reset-password", post(auth::reset_password))
    .route("/api/profile", get(auth::profile))
    // Training plans
    .route("/api/plans", get(training::list_plans).post(training::create_plan))
    .route(
      "/api/plans/:plan_id",
      get(training::get_plan)
        .patch(training::update_plan)
        .delete(training::delete_plan),
    )
    .route("/api/plans/:plan_id/structure", put(training::edit_structure))
    .route("/api/plans/:plan_id/current-week", put(training::set_current_week))
    .route(
      "/api/plans/:plan_id/weeks/:week_number/deload",
      put(training::set_deload),
    )
    // Exercises (row ids resolve to the durable key and week)
    .route("/api/exercises/:exercise_id", patch(training::update_exercise))
    .route(
      "/api/exercises/:exercise_id/sets",
      get(training::get_sets).put(training::save_sets),
    )
    .route(
      "/api/exercises/:exercise_id/observation",
      get(training::get_observation).put(training::save_observation),
    )
    .route("/api/exercises/:exercise_id/progress", get(training::exercise_progress))
    // Diets
    .route("/api/diets", get(diet::list_diets).post(diet::create_diet))
    .route(
      "/api/diets/:diet_id",
      get(diet::get_diet)
        .patch(diet::update_diet)
        .delete(diet::delete_diet),
    )
    .route("/api/diets/:diet_id/meals", put(diet::replace_meals))
    .route("/api/diets/:diet_id/summary", get(diet::summary))
    .route("/api/diets/:diet_id/progress", get(diet::progress))
    .route(
      "/api/diets/:diet_id/consumption",
      get(diet::consumption).post(diet::toggle_consumption),
    )
    // Body weight
    .route("/api/weight", get(weight::list_entries).post(weight::add_entry))
    .route("/api/weight/trend", get(weight::trend))
    .route("/api/weight/:entry_id", axum::routing::delete(weight::delete_entry))
    // Backup
    .route("/api/export", get(backup::export_data))
    .route("/api/import", post(backup::import_data))
}
