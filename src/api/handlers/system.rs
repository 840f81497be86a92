//! System handlers

use crate::core::error::ApiError;
use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use super::AppState;

/// Handler for GET /api/health - Service and database health
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_up = state
        .db
        .execute(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(ApiError::Database)
        })
        .await
        .is_ok();

    Json(json!({
        "status": "ok",
        "db": if db_up { "up" } else { "down" },
    }))
}
