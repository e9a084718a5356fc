//! Invoice items API endpoints

use api_types::{
    invoice::ItemNew,
    item::{ItemUpdate, ItemWriteResponse},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{AddItemCmd, ItemWrite, UpdateItemCmd};
use uuid::Uuid;

use crate::{
    Owner, ServerError,
    invoices::{item_draft, map_invoice, map_item},
    server::ServerState,
};

fn map_write(write: ItemWrite) -> ItemWriteResponse {
    ItemWriteResponse {
        item: map_item(write.item),
        invoice: map_invoice(write.invoice),
    }
}

pub async fn add(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<ItemNew>,
) -> Result<(StatusCode, Json<ItemWriteResponse>), ServerError> {
    let write = state
        .engine
        .add_item(AddItemCmd::new(owner.0, invoice_id, item_draft(payload)))
        .await?;
    Ok((StatusCode::CREATED, Json(map_write(write))))
}

pub async fn update(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<ItemUpdate>,
) -> Result<Json<ItemWriteResponse>, ServerError> {
    let cmd = UpdateItemCmd {
        description: payload.description,
        quantity: payload.quantity,
        unit_price: payload.unit_price,
        target_amount: payload.target_amount,
        force_recalculate: payload.force_recalculate,
        ..UpdateItemCmd::new(owner.0, item_id)
    };
    let write = state.engine.update_item(cmd).await?;
    Ok(Json(map_write(write)))
}

pub async fn delete(
    Extension(owner): Extension<Owner>,
    State(state): State<ServerState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<api_types::invoice::InvoiceView>, ServerError> {
    let invoice = state.engine.delete_item(&owner.0, item_id).await?;
    Ok(Json(map_invoice(invoice)))
}
