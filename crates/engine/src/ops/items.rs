use chrono::Utc;
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Currency, Invoice, InvoiceItem, ItemWrite, ResultEngine,
    commands::{AddItemCmd, UpdateItemCmd},
    invoice_items,
    money::{
        TargetRule, item_amount, validate_quantity, validate_target_override, validate_unit_price,
    },
    util::{model_currency, normalize_required_text, parse_uuid},
};

use super::{Engine, invoices::PreparedItem, with_tx};

impl Engine {
    /// Add an item to an invoice and recompute the invoice totals.
    pub async fn add_item(&self, cmd: AddItemCmd) -> ResultEngine<ItemWrite> {
        let user_id = cmd.user_id.as_str();
        let prepared = PreparedItem::from_draft(&cmd.item)?;

        with_tx!(self, |db_tx| {
            let invoice = self.require_invoice(&db_tx, cmd.invoice_id, user_id).await?;
            let currency = model_currency(&invoice.currency)?;
            let quote = self
                .quote_target(prepared.amount, &currency, prepared.rule)
                .await;

            let item = invoice_items::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4().to_string()),
                invoice_id: ActiveValue::Set(invoice.id.clone()),
                description: ActiveValue::Set(prepared.description),
                quantity: ActiveValue::Set(prepared.quantity),
                unit_price: ActiveValue::Set(prepared.unit_price),
                amount: ActiveValue::Set(prepared.amount),
                target_currency: ActiveValue::Set(Currency::reporting().code().to_string()),
                target_amount: ActiveValue::Set(quote.target_amount),
                fx_rate_used: ActiveValue::Set(quote.fx_rate_used),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;

            self.recalculate_invoice_totals(&db_tx, &invoice.id).await?;
            let invoice = self.require_invoice(&db_tx, cmd.invoice_id, user_id).await?;
            Ok(ItemWrite {
                item: InvoiceItem::try_from(item)?,
                invoice: Invoice::try_from(invoice)?,
            })
        })
    }

    /// Update an item and recompute the invoice totals.
    ///
    /// `amount` is always rebuilt from the resulting quantity and unit price.
    /// A target override applies to this write only; any later write without
    /// one converts through the rate provider again.
    pub async fn update_item(&self, cmd: UpdateItemCmd) -> ResultEngine<ItemWrite> {
        let user_id = cmd.user_id.as_str();
        let description = cmd
            .description
            .as_deref()
            .map(|description| normalize_required_text(description, "description"))
            .transpose()?;
        let quantity = cmd.quantity.map(validate_quantity).transpose()?;
        let unit_price = cmd.unit_price.map(validate_unit_price).transpose()?;
        let target_override = cmd.target_amount.map(validate_target_override).transpose()?;
        let rule = TargetRule::resolve(target_override, cmd.force_recalculate);

        with_tx!(self, |db_tx| {
            let (item, invoice) = self.require_item(&db_tx, cmd.item_id, user_id).await?;
            let currency = model_currency(&invoice.currency)?;

            let quantity = quantity.unwrap_or(item.quantity);
            let unit_price = unit_price.unwrap_or(item.unit_price);
            let amount = item_amount(quantity, unit_price);
            let quote = self.quote_target(amount, &currency, rule).await;

            let item = invoice_items::ActiveModel {
                id: ActiveValue::Set(item.id.clone()),
                description: ActiveValue::Set(description.unwrap_or(item.description)),
                quantity: ActiveValue::Set(quantity),
                unit_price: ActiveValue::Set(unit_price),
                amount: ActiveValue::Set(amount),
                target_currency: ActiveValue::Set(Currency::reporting().code().to_string()),
                target_amount: ActiveValue::Set(quote.target_amount),
                fx_rate_used: ActiveValue::Set(quote.fx_rate_used),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;

            self.recalculate_invoice_totals(&db_tx, &invoice.id).await?;
            let invoice_id = parse_uuid(&invoice.id, "invoice")?;
            let invoice = self.require_invoice(&db_tx, invoice_id, user_id).await?;
            Ok(ItemWrite {
                item: InvoiceItem::try_from(item)?,
                invoice: Invoice::try_from(invoice)?,
            })
        })
    }

    /// Delete an item and return its invoice with refreshed totals.
    pub async fn delete_item(&self, user_id: &str, item_id: Uuid) -> ResultEngine<Invoice> {
        with_tx!(self, |db_tx| {
            let (item, invoice) = self.require_item(&db_tx, item_id, user_id).await?;
            invoice_items::Entity::delete_by_id(item.id).exec(&db_tx).await?;

            self.recalculate_invoice_totals(&db_tx, &invoice.id).await?;
            let invoice_id = parse_uuid(&invoice.id, "invoice")?;
            let invoice = self.require_invoice(&db_tx, invoice_id, user_id).await?;
            Invoice::try_from(invoice)
        })
    }
}
