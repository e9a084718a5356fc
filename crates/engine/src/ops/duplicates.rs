//! Duplicate submission detection for invoice creation.
//!
//! A candidate matches an existing invoice of the same owner when the
//! computed total, both period dates and the receiver are equal. Missing
//! values only match missing values.

use chrono::{DateTime, Utc};
use sea_orm::{Condition, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{ResultEngine, invoices};

use super::Engine;

#[derive(Clone, Debug, PartialEq)]
pub(super) struct DuplicateKey {
    pub(super) amount: f64,
    pub(super) invoice_started_at: Option<DateTime<Utc>>,
    pub(super) invoice_ended_at: Option<DateTime<Utc>>,
    pub(super) receiver_id: Option<Uuid>,
}

/// `col = value`, or `col IS NULL` when there is no value.
fn eq_or_null<V>(column: invoices::Column, value: Option<V>) -> Condition
where
    V: Into<sea_orm::Value>,
{
    match value {
        Some(value) => Condition::all().add(column.eq(value)),
        None => Condition::all().add(column.is_null()),
    }
}

fn duplicate_condition(user_id: &str, key: &DuplicateKey) -> Condition {
    Condition::all()
        .add(invoices::Column::UserId.eq(user_id.to_string()))
        .add(invoices::Column::Amount.eq(key.amount))
        .add(eq_or_null(
            invoices::Column::InvoiceStartedAt,
            key.invoice_started_at,
        ))
        .add(eq_or_null(invoices::Column::InvoiceEndedAt, key.invoice_ended_at))
        .add(eq_or_null(
            invoices::Column::ReceiverId,
            key.receiver_id.map(|id| id.to_string()),
        ))
}

impl Engine {
    /// Oldest existing invoice matching `key`, if any.
    pub(super) async fn find_duplicate(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        key: &DuplicateKey,
    ) -> ResultEngine<Option<invoices::Model>> {
        let found = invoices::Entity::find()
            .filter(duplicate_condition(user_id, key))
            .order_by_asc(invoices::Column::CreatedAt)
            .order_by_asc(invoices::Column::Id)
            .one(db)
            .await?;
        if let Some(existing) = &found {
            tracing::info!(
                "invoice submission for {user_id} matches existing invoice {}",
                existing.id
            );
        }
        Ok(found)
    }
}
