// crates/server/src/routes/finance.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use lifedash_core::allocation::{asset_allocation, Allocation, AllocationKey, ExchangeRates};
use lifedash_core::AssetRecord;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct AssetsResponse {
    pub assets: Vec<AssetRecord>,
}

#[derive(Debug, Deserialize)]
pub struct AllocationQuery {
    pub currency: Option<String>,
    #[serde(default)]
    pub by: AllocationKey,
}

/// GET /api/finance/assets
pub async fn list_assets(State(state): State<Arc<AppState>>) -> ApiResult<Json<AssetsResponse>> {
    let assets = state.supabase()?.list_assets().await?;
    Ok(Json(AssetsResponse { assets }))
}

/// GET /api/finance/allocation?currency=&by=type|name
///
/// Exchange rates are best effort: without them every asset is taken at
/// face value.
pub async fn allocation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AllocationQuery>,
) -> ApiResult<Json<Allocation>> {
    let supabase = state.supabase()?;
    let base = state.config.base_currency.as_str();
    let currency = query
        .currency
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| base.to_string());

    let assets = supabase.list_assets().await?;
    let rates = match supabase.exchange_rates(base).await {
        Ok(rates) => rates,
        Err(e) => {
            tracing::warn!(error = %e, "Exchange rates unavailable, allocating without conversion");
            ExchangeRates::new(base)
        }
    };

    Ok(Json(asset_allocation(&assets, query.by, &currency, base, &rates)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/finance/assets", get(list_assets))
        .route("/finance/allocation", get(allocation))
}
