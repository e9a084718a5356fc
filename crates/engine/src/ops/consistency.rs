//! Derived money fields: item targets and invoice totals.
//!
//! Totals are always rebuilt by re-summing every current item of the invoice
//! inside the caller's transaction, never adjusted incrementally.

use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, QuerySelect, prelude::*};

use crate::{
    Currency, ResultEngine, invoice_items, invoices,
    money::{TargetQuote, TargetRule, Totals},
};

use super::Engine;

impl Engine {
    /// Reporting-currency value of an item amount.
    ///
    /// Items of reporting-currency invoices always mirror their amount at a
    /// 1.0 rate. Otherwise a pinned target is kept verbatim with its implied
    /// rate, and everything else converts at the provider's current rate.
    pub(super) async fn quote_target(
        &self,
        amount: f64,
        invoice_currency: &Currency,
        rule: TargetRule,
    ) -> TargetQuote {
        if invoice_currency.is_reporting() {
            return TargetQuote::identity(amount);
        }
        match rule {
            TargetRule::Pinned(target_amount) => TargetQuote::pinned(amount, target_amount),
            TargetRule::Convert => {
                let rate = self
                    .rates
                    .get_rate(invoice_currency, &Currency::reporting())
                    .await;
                TargetQuote::converted(amount, rate.rate)
            }
        }
    }

    /// Re-sum `amount` and `target_amount` over the invoice's items and store
    /// both on the invoice row.
    pub(super) async fn recalculate_invoice_totals(
        &self,
        db: &DatabaseTransaction,
        invoice_id: &str,
    ) -> ResultEngine<Totals> {
        let rows: Vec<(f64, f64)> = invoice_items::Entity::find()
            .select_only()
            .column(invoice_items::Column::Amount)
            .column(invoice_items::Column::TargetAmount)
            .filter(invoice_items::Column::InvoiceId.eq(invoice_id.to_string()))
            .into_tuple()
            .all(db)
            .await?;
        let totals = Totals::sum(rows);

        invoices::ActiveModel {
            id: ActiveValue::Set(invoice_id.to_string()),
            amount: ActiveValue::Set(totals.amount),
            target_amount: ActiveValue::Set(totals.target_amount),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .update(db)
        .await?;

        tracing::debug!(
            "recomputed totals for invoice {invoice_id}: amount={} target_amount={}",
            totals.amount,
            totals.target_amount
        );
        Ok(totals)
    }

    /// Switch an invoice to `new_currency`, re-converting every item.
    ///
    /// Pinned targets do not survive a currency change.
    pub(super) async fn on_currency_change(
        &self,
        db: &DatabaseTransaction,
        invoice_id: &str,
        new_currency: &Currency,
    ) -> ResultEngine<Totals> {
        let items = invoice_items::Entity::find()
            .filter(invoice_items::Column::InvoiceId.eq(invoice_id.to_string()))
            .all(db)
            .await?;

        for item in items {
            let quote = self
                .quote_target(item.amount, new_currency, TargetRule::Convert)
                .await;
            invoice_items::ActiveModel {
                id: ActiveValue::Set(item.id),
                target_currency: ActiveValue::Set(Currency::reporting().code().to_string()),
                target_amount: ActiveValue::Set(quote.target_amount),
                fx_rate_used: ActiveValue::Set(quote.fx_rate_used),
                ..Default::default()
            }
            .update(db)
            .await?;
        }

        invoices::ActiveModel {
            id: ActiveValue::Set(invoice_id.to_string()),
            currency: ActiveValue::Set(new_currency.code().to_string()),
            ..Default::default()
        }
        .update(db)
        .await?;

        self.recalculate_invoice_totals(db, invoice_id).await
    }
}
