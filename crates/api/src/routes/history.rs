//! Checkout History Routes

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::AppState;
use history_storage::HistoryRecord;

/// Response for a recorded checkout
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub timestamp: DateTime<Utc>,
}

/// Record a checkout
pub async fn checkout(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let timestamp = match state.repository.record_checkout().await {
        Ok(ts) => ts,
        Err(e) => {
            metrics::counter!("checkout_failures_total").increment(1);
            return Err(e.into());
        }
    };

    metrics::counter!("checkouts_total").increment(1);
    info!("Checkout recorded at {}", timestamp);

    Ok((StatusCode::CREATED, Json(CheckoutResponse { timestamp })))
}

/// List all checkouts
pub async fn list_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    let history = match state.repository.list_history().await {
        Ok(history) => history,
        Err(e) => {
            metrics::counter!("history_query_failures_total").increment(1);
            return Err(e.into());
        }
    };

    metrics::histogram!("history_list_size").record(history.len() as f64);
    Ok(Json(history))
}
