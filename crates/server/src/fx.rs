//! Exchange-rate lookup endpoint

use api_types::fx::{FxRateQuery, FxRateView};
use axum::{
    Json,
    extract::{Query, State},
};
use engine::Currency;

use crate::{ServerError, server::ServerState};

/// Current rate for a pair, through the long-lived lookup cache.
///
/// An unreachable source is not an error: the view carries a 1.0 rate with
/// `fallback` set.
pub async fn get_rate(
    State(state): State<ServerState>,
    Query(query): Query<FxRateQuery>,
) -> Result<Json<FxRateView>, ServerError> {
    let from = Currency::try_from(query.from.as_str())?;
    let to = match query.to.as_deref() {
        Some(code) => Currency::try_from(code)?,
        None => Currency::reporting(),
    };

    let rate = state.lookup_rates.get_rate(&from, &to).await;
    Ok(Json(FxRateView {
        from: rate.from.code().to_string(),
        to: rate.to.code().to_string(),
        rate: rate.rate,
        as_of: rate.as_of,
        fallback: rate.fallback,
    }))
}
