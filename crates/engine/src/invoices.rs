//! Invoices.
//!
//! `amount` and `target_amount` on an invoice are derived: they are the sums
//! of its items' `amount` and `target_amount` and are only ever written by the
//! engine's total recompute, never from caller payloads.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError, InvoiceItem,
    util::{model_currency, parse_optional_uuid, parse_uuid},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Paid,
    #[default]
    Unpaid,
    Overdue,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 3] = [Self::Paid, Self::Unpaid, Self::Overdue];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
            Self::Overdue => "overdue",
        }
    }
}

impl TryFrom<&str> for InvoiceStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "paid" => Ok(Self::Paid),
            "unpaid" => Ok(Self::Unpaid),
            "overdue" => Ok(Self::Overdue),
            other => Err(EngineError::InvalidFilter(format!(
                "invalid invoice status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub currency: Currency,
    /// Sum of the items' `amount`, in `currency`.
    pub amount: f64,
    /// Sum of the items' `target_amount`, in the reporting currency.
    pub target_amount: f64,
    pub status: InvoiceStatus,
    pub category_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub invoice_started_at: Option<DateTime<Utc>>,
    pub invoice_ended_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entity filters shared by invoice listing and statistics. All supplied
/// filters must hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub category_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    /// Substring of the title or the description.
    pub keyword: Option<String>,
}

/// An invoice with its items and tag ids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub tag_ids: Vec<Uuid>,
}

/// Outcome of an invoice creation.
///
/// When `is_duplicate` is set nothing was written and `detail` is the
/// pre-existing invoice the submission matched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub detail: InvoiceDetail,
    pub is_duplicate: bool,
    pub message: String,
}

/// An item after a write, with the refreshed totals of its invoice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemWrite {
    pub item: InvoiceItem,
    pub invoice: Invoice,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub currency: String,
    pub amount: f64,
    pub target_amount: f64,
    pub status: String,
    pub category_id: Option<String>,
    pub company_id: Option<String>,
    pub receiver_id: Option<String>,
    pub invoice_started_at: Option<DateTimeUtc>,
    pub invoice_ended_at: Option<DateTimeUtc>,
    pub due_date: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::invoice_items::Entity")]
    Items,
    #[sea_orm(has_many = "super::invoice_tags::Entity")]
    Tags,
}

impl Related<super::invoice_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::invoice_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Invoice {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "invoice")?,
            user_id: model.user_id,
            title: model.title,
            description: model.description,
            currency: model_currency(&model.currency)?,
            amount: model.amount,
            target_amount: model.target_amount,
            status: InvoiceStatus::try_from(model.status.as_str())?,
            category_id: parse_optional_uuid(model.category_id.as_deref(), "category")?,
            company_id: parse_optional_uuid(model.company_id.as_deref(), "company")?,
            receiver_id: parse_optional_uuid(model.receiver_id.as_deref(), "receiver")?,
            invoice_started_at: model.invoice_started_at,
            invoice_ended_at: model.invoice_ended_at,
            due_date: model.due_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in InvoiceStatus::ALL {
            assert_eq!(InvoiceStatus::try_from(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_names_the_value() {
        assert_eq!(
            InvoiceStatus::try_from("cancelled"),
            Err(EngineError::InvalidFilter(
                "invalid invoice status: cancelled".to_string()
            ))
        );
    }
}
