//! Invoices API endpoints

use api_types::invoice::{
    CurrencyUpdate, InvoiceCreatedResponse, InvoiceDetailView, InvoiceList, InvoiceListResponse,
    InvoiceNew, InvoiceUpdate, InvoiceView, ItemNew, ItemView, TagsResponse, TagsUpdate,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{
    CreateInvoiceCmd, Currency, Invoice, InvoiceDetail, InvoiceFilter, InvoiceItem,
    InvoiceStatus, ItemDraft, UpdateInvoiceCmd,
};
use uuid::Uuid;

use crate::{Owner, ServerError, server::ServerState};

const DEFAULT_PAGE_SIZE: u64 = 50;

pub(crate) fn map_invoice(invoice: Invoice) -> InvoiceView {
    InvoiceView {
        id: invoice.id,
        title: invoice.title,
        description: invoice.description,
        currency: invoice.currency.code().to_string(),
        amount: invoice.amount,
        target_amount: invoice.target_amount,
        status: invoice.status.as_str().to_string(),
        category_id: invoice.category_id,
        company_id: invoice.company_id,
        receiver_id: invoice.receiver_id,
        invoice_started_at: invoice.invoice_started_at,
        invoice_ended_at: invoice.invoice_ended_at,
        due_date: invoice.due_date,
        created_at: invoice.created_at,
        updated_at: invoice.updated_at,
    }
}

pub(crate) fn map_item(item: InvoiceItem) -> ItemView {
    ItemView {
        id: item.id,
        invoice_id: item.invoice_id,
        description: item.description,
        quantity: item.quantity,
        unit_price: item.unit_price,
        amount: item.amount,
        target_currency: item.target_currency.code().to_string(),
        target_amount: item.target_amount,
        fx_rate_used: item.fx_rate_used,
        created_at: item.created_at,
    }
}

fn map_detail(detail: InvoiceDetail) -> InvoiceDetailView {
    InvoiceDetailView {
        invoice: map_invoice(detail.invoice),
        items: detail.items.into_iter().map(map_item).collect(),
        tag_ids: detail.tag_ids,
    }
}

pub(crate) fn item_draft(item: ItemNew) -> ItemDraft {
    let draft = ItemDraft::new(item.description, item.quantity, item.unit_price);
    match item.target_amount {
        Some(target_amount) => draft.target_amount(target_amount),
        None => draft,
    }
}

fn parse_status(status: Option<&str>) -> Result<Option<InvoiceStatus>, ServerError> {
    Ok(status.map(InvoiceStatus::try_from).transpose()?)
}

pub async fn create(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Json(payload): Json<InvoiceNew>,
) -> Result<(StatusCode, Json<InvoiceCreatedResponse>), ServerError> {
    let currency = Currency::try_from(payload.currency.as_str())?;
    let mut cmd = CreateInvoiceCmd::new(owner.0, payload.title, currency);
    cmd.description = payload.description;
    cmd.status = parse_status(payload.status.as_deref())?.unwrap_or_default();
    cmd.category_id = payload.category_id;
    cmd.company_id = payload.company_id;
    cmd.receiver_id = payload.receiver_id;
    cmd.invoice_started_at = payload.invoice_started_at.map(|dt| dt.with_timezone(&Utc));
    cmd.invoice_ended_at = payload.invoice_ended_at.map(|dt| dt.with_timezone(&Utc));
    cmd.due_date = payload.due_date.map(|dt| dt.with_timezone(&Utc));
    cmd.items = payload.items.into_iter().map(item_draft).collect();
    cmd.tag_ids = payload.tag_ids;

    let created = state.engine.create_invoice(cmd).await?;
    let status = if created.is_duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(InvoiceCreatedResponse {
            invoice: map_detail(created.detail),
            is_duplicate: created.is_duplicate,
            message: created.message,
        }),
    ))
}

pub async fn list(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Query(query): Query<InvoiceList>,
) -> Result<Json<InvoiceListResponse>, ServerError> {
    let filter = InvoiceFilter {
        status: parse_status(query.status.as_deref())?,
        category_id: query.category_id,
        company_id: query.company_id,
        receiver_id: query.receiver_id,
        keyword: query.keyword,
    };

    let (invoices, next_cursor) = state
        .engine
        .list_invoices_page(
            &owner.0,
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            query.cursor.as_deref(),
            &filter,
        )
        .await?;

    Ok(Json(InvoiceListResponse {
        invoices: invoices.into_iter().map(map_invoice).collect(),
        next_cursor,
    }))
}

pub async fn get(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceDetailView>, ServerError> {
    let detail = state.engine.invoice(&owner.0, id).await?;
    Ok(Json(map_detail(detail)))
}

pub async fn update(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<InvoiceUpdate>,
) -> Result<Json<InvoiceDetailView>, ServerError> {
    let mut cmd = UpdateInvoiceCmd::new(owner.0, id);
    cmd.title = payload.title;
    cmd.description = payload.description;
    cmd.currency = payload
        .currency
        .as_deref()
        .map(Currency::try_from)
        .transpose()?;
    cmd.status = parse_status(payload.status.as_deref())?;
    cmd.category_id = payload.category_id;
    cmd.company_id = payload.company_id;
    cmd.receiver_id = payload.receiver_id;
    cmd.invoice_started_at = payload
        .invoice_started_at
        .map(|dt| dt.map(|dt| dt.with_timezone(&Utc)));
    cmd.invoice_ended_at = payload
        .invoice_ended_at
        .map(|dt| dt.map(|dt| dt.with_timezone(&Utc)));
    cmd.due_date = payload.due_date.map(|dt| dt.map(|dt| dt.with_timezone(&Utc)));

    let detail = state.engine.update_invoice(cmd).await?;
    Ok(Json(map_detail(detail)))
}

pub async fn update_currency(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CurrencyUpdate>,
) -> Result<Json<InvoiceDetailView>, ServerError> {
    let currency = Currency::try_from(payload.currency.as_str())?;
    let detail = state
        .engine
        .update_invoice_currency(&owner.0, id, currency)
        .await?;
    Ok(Json(map_detail(detail)))
}

pub async fn delete(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_invoice(&owner.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_tags(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TagsUpdate>,
) -> Result<Json<TagsResponse>, ServerError> {
    let tag_ids = state
        .engine
        .set_invoice_tags(&owner.0, id, &payload.tag_ids)
        .await?;
    Ok(Json(TagsResponse { tag_ids }))
}

pub async fn recalculate(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceView>, ServerError> {
    let invoice = state.engine.recompute_invoice_totals(&owner.0, id).await?;
    Ok(Json(map_invoice(invoice)))
}
