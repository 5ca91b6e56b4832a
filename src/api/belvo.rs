use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde_json::Value;

use crate::{AppState, Error, belvo::BelvoClient};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/institutions", get(institutions))
        .route("/accounts", get(accounts))
        .route("/balances", get(balances))
        .route("/transactions", get(transactions))
}

async fn institutions(State(belvo): State<Arc<BelvoClient>>) -> Result<Json<Vec<Value>>, Error> {
    Ok(Json(belvo.institutions().await?))
}

async fn accounts(State(belvo): State<Arc<BelvoClient>>) -> Result<Json<Vec<Value>>, Error> {
    Ok(Json(belvo.accounts().await?))
}

async fn balances(State(belvo): State<Arc<BelvoClient>>) -> Result<Json<Vec<Value>>, Error> {
    Ok(Json(belvo.balances().await?))
}

async fn transactions(State(belvo): State<Arc<BelvoClient>>) -> Result<Json<Vec<Value>>, Error> {
    Ok(Json(belvo.transactions().await?))
}
