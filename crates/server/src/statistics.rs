//! Statistics API endpoints
//!
//! Payloads are the engine's result types; every amount is in the reporting
//! currency named by their `currency` field.

use api_types::stats::{StatisticsQuery, SummaryQuery};
use axum::{
    Extension, Json,
    extract::{Query, State},
};
use engine::{
    GroupSummary, Grouping, InvoiceFilter, InvoiceStatistics, InvoiceStatus, StatisticsOptions,
    StatsPeriod, Summary, SummaryPeriod,
};

use crate::{Owner, ServerError, server::ServerState};

fn statistics_options(query: StatisticsQuery) -> Result<StatisticsOptions, ServerError> {
    Ok(StatisticsOptions {
        period: query
            .period
            .as_deref()
            .map(StatsPeriod::try_from)
            .transpose()?
            .unwrap_or_default(),
        days: query.days,
        filter: InvoiceFilter {
            status: query
                .status
                .as_deref()
                .map(InvoiceStatus::try_from)
                .transpose()?,
            category_id: query.category_id,
            company_id: query.company_id,
            receiver_id: query.receiver_id,
            keyword: query.keyword,
        },
        grouping: query
            .group_by
            .as_deref()
            .map(Grouping::try_from)
            .transpose()?
            .unwrap_or_default(),
        aggregate: query.aggregate.unwrap_or(false),
    })
}

fn summary_period(query: &SummaryQuery) -> Result<SummaryPeriod, ServerError> {
    Ok(query
        .period
        .as_deref()
        .map(SummaryPeriod::try_from)
        .transpose()?
        .unwrap_or_default())
}

/// Handle the flexible statistics query
pub async fn get_statistics(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<InvoiceStatistics>, ServerError> {
    let options = statistics_options(query)?;
    Ok(Json(state.engine.statistics(&owner.0, &options).await?))
}

pub async fn get_summary(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Summary>, ServerError> {
    let period = summary_period(&query)?;
    Ok(Json(state.engine.summary(&owner.0, period).await?))
}

pub async fn get_by_category(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<GroupSummary>, ServerError> {
    let period = summary_period(&query)?;
    Ok(Json(state.engine.summary_by_category(&owner.0, period).await?))
}

pub async fn get_by_company(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<GroupSummary>, ServerError> {
    let period = summary_period(&query)?;
    Ok(Json(state.engine.summary_by_company(&owner.0, period).await?))
}

pub async fn get_by_receiver(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<GroupSummary>, ServerError> {
    let period = summary_period(&query)?;
    Ok(Json(state.engine.summary_by_receiver(&owner.0, period).await?))
}
