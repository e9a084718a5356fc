//! Invoice line items.
//!
//! `amount` is always `quantity * unit_price`. `target_amount`/`fx_rate_used`
//! are either converted through the rate provider or pinned by the caller on
//! a single write; nothing on the row records which one happened.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError,
    util::{model_currency, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
    pub target_currency: Currency,
    pub target_amount: f64,
    pub fx_rate_used: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "invoice_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub invoice_id: String,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
    pub target_currency: String,
    pub target_amount: f64,
    pub fx_rate_used: f64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::invoices::Entity",
        from = "Column::InvoiceId",
        to = "super::invoices::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Invoice,
}

impl Related<super::invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for InvoiceItem {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "item")?,
            invoice_id: parse_uuid(&model.invoice_id, "invoice")?,
            description: model.description,
            quantity: model.quantity,
            unit_price: model.unit_price,
            amount: model.amount,
            target_currency: model_currency(&model.target_currency)?,
            target_amount: model.target_amount,
            fx_rate_used: model.fx_rate_used,
            created_at: model.created_at,
        })
    }
}
