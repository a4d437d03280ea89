use axum::{
    routing::{get, post},
    Router,
};

use super::{data, forecast, health, models};
use crate::controller::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/data", get(data::get_data).put(data::put_data))
        .route("/data/stats", get(data::get_stats))
        .route("/data/reload", post(data::reload))
        .route("/data/export.csv", get(data::export_csv))
        .route("/models", get(models::get_models))
        .route("/forecast", post(forecast::forecast))
        .route("/forecast/recursive", post(forecast::forecast_recursive))
        .route("/forecast/gas", post(forecast::forecast_gas))
        .with_state(state)
}
