use std::collections::BTreeSet;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*, sea_query::LikeExpr,
};

use crate::{
    Currency, EngineError, Invoice, InvoiceCreated, InvoiceDetail, InvoiceFilter, InvoiceItem,
    ResultEngine,
    commands::{CreateInvoiceCmd, ItemDraft, UpdateInvoiceCmd},
    invoice_items, invoice_tags, invoices,
    money::{
        TargetRule, Totals, item_amount, validate_quantity, validate_target_override,
        validate_unit_price,
    },
    util::{
        apply_nullable_patch, apply_optional_text_patch, normalize_optional_text,
        normalize_required_text, parse_optional_uuid, parse_uuid,
    },
};

use super::{Engine, duplicates::DuplicateKey, with_tx};

/// Largest page returned by [`Engine::list_invoices_page`].
pub const MAX_PAGE_SIZE: u64 = 500;

pub(super) trait ApplyInvoiceFilters: QueryFilter + Sized {
    fn apply_invoice_filters(self, filter: &InvoiceFilter) -> Self;
}

impl<T> ApplyInvoiceFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_invoice_filters(mut self, filter: &InvoiceFilter) -> Self {
        if let Some(status) = filter.status {
            self = self.filter(invoices::Column::Status.eq(status.as_str()));
        }
        if let Some(id) = filter.category_id {
            self = self.filter(invoices::Column::CategoryId.eq(id.to_string()));
        }
        if let Some(id) = filter.company_id {
            self = self.filter(invoices::Column::CompanyId.eq(id.to_string()));
        }
        if let Some(id) = filter.receiver_id {
            self = self.filter(invoices::Column::ReceiverId.eq(id.to_string()));
        }
        if let Some(keyword) = filter.keyword.as_deref().map(str::trim)
            && !keyword.is_empty()
        {
            let pattern = contains_pattern(keyword);
            self = self.filter(
                Condition::any()
                    .add(invoices::Column::Title.like(pattern.clone()))
                    .add(invoices::Column::Description.like(pattern)),
            );
        }
        self
    }
}

/// `LIKE` pattern matching `keyword` anywhere, with its wildcards taken literally.
fn contains_pattern(keyword: &str) -> LikeExpr {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    LikeExpr::new(escaped).escape('\\')
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct InvoicesCursor {
    created_at: DateTime<Utc>,
    invoice_id: String,
}

impl InvoicesCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid invoices cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid invoices cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid invoices cursor".to_string()))
    }
}

/// A validated item draft, before its target amount is known.
#[derive(Clone, Debug)]
pub(super) struct PreparedItem {
    pub(super) description: String,
    pub(super) quantity: f64,
    pub(super) unit_price: f64,
    pub(super) amount: f64,
    pub(super) rule: TargetRule,
}

impl PreparedItem {
    pub(super) fn from_draft(draft: &ItemDraft) -> ResultEngine<Self> {
        let description = normalize_required_text(&draft.description, "description")?;
        let quantity = validate_quantity(draft.quantity)?;
        let unit_price = validate_unit_price(draft.unit_price)?;
        let target_override = draft.target_amount.map(validate_target_override).transpose()?;
        Ok(Self {
            description,
            quantity,
            unit_price,
            amount: item_amount(quantity, unit_price),
            rule: TargetRule::resolve(target_override, false),
        })
    }
}

impl Engine {
    /// Create an invoice, its items and its tag links.
    ///
    /// A submission matching an existing invoice of the same owner (same
    /// computed total, period and receiver) writes nothing and returns the
    /// existing invoice flagged as a duplicate.
    pub async fn create_invoice(&self, cmd: CreateInvoiceCmd) -> ResultEngine<InvoiceCreated> {
        let user_id = cmd.user_id.as_str();
        let title = normalize_required_text(&cmd.title, "title")?;
        let description = normalize_optional_text(cmd.description.as_deref());
        let prepared = cmd
            .items
            .iter()
            .map(PreparedItem::from_draft)
            .collect::<ResultEngine<Vec<_>>>()?;
        let tag_ids: BTreeSet<Uuid> = cmd.tag_ids.iter().copied().collect();

        with_tx!(self, |db_tx| {
            self.require_invoice_references(
                &db_tx,
                user_id,
                cmd.category_id,
                cmd.company_id,
                cmd.receiver_id,
            )
            .await?;
            for tag_id in &tag_ids {
                self.require_tag(&db_tx, user_id, *tag_id).await?;
            }

            let mut quotes = Vec::with_capacity(prepared.len());
            for item in &prepared {
                quotes.push(
                    self.quote_target(item.amount, &cmd.currency, item.rule)
                        .await,
                );
            }
            let candidate = Totals::sum(
                prepared
                    .iter()
                    .zip(&quotes)
                    .map(|(item, quote)| (item.amount, quote.target_amount)),
            );
            let key = DuplicateKey {
                amount: candidate.amount,
                invoice_started_at: cmd.invoice_started_at,
                invoice_ended_at: cmd.invoice_ended_at,
                receiver_id: cmd.receiver_id,
            };

            if let Some(existing) = self.find_duplicate(&db_tx, user_id, &key).await? {
                let message = format!("duplicate of invoice {}", existing.id);
                let detail = self.load_detail(&db_tx, existing).await?;
                Ok(InvoiceCreated {
                    detail,
                    is_duplicate: true,
                    message,
                })
            } else {
                let invoice_id = Uuid::new_v4().to_string();
                let now = Utc::now();
                invoices::ActiveModel {
                    id: ActiveValue::Set(invoice_id.clone()),
                    user_id: ActiveValue::Set(user_id.to_string()),
                    title: ActiveValue::Set(title),
                    description: ActiveValue::Set(description),
                    currency: ActiveValue::Set(cmd.currency.code().to_string()),
                    amount: ActiveValue::Set(0.0),
                    target_amount: ActiveValue::Set(0.0),
                    status: ActiveValue::Set(cmd.status.as_str().to_string()),
                    category_id: ActiveValue::Set(cmd.category_id.map(|id| id.to_string())),
                    company_id: ActiveValue::Set(cmd.company_id.map(|id| id.to_string())),
                    receiver_id: ActiveValue::Set(cmd.receiver_id.map(|id| id.to_string())),
                    invoice_started_at: ActiveValue::Set(cmd.invoice_started_at),
                    invoice_ended_at: ActiveValue::Set(cmd.invoice_ended_at),
                    due_date: ActiveValue::Set(cmd.due_date),
                    created_at: ActiveValue::Set(cmd.created_at.unwrap_or(now)),
                    updated_at: ActiveValue::Set(now),
                }
                .insert(&db_tx)
                .await?;

                for (item, quote) in prepared.into_iter().zip(quotes) {
                    invoice_items::ActiveModel {
                        id: ActiveValue::Set(Uuid::new_v4().to_string()),
                        invoice_id: ActiveValue::Set(invoice_id.clone()),
                        description: ActiveValue::Set(item.description),
                        quantity: ActiveValue::Set(item.quantity),
                        unit_price: ActiveValue::Set(item.unit_price),
                        amount: ActiveValue::Set(item.amount),
                        target_currency: ActiveValue::Set(
                            Currency::reporting().code().to_string(),
                        ),
                        target_amount: ActiveValue::Set(quote.target_amount),
                        fx_rate_used: ActiveValue::Set(quote.fx_rate_used),
                        created_at: ActiveValue::Set(now),
                    }
                    .insert(&db_tx)
                    .await?;
                }

                for tag_id in &tag_ids {
                    invoice_tags::ActiveModel {
                        invoice_id: ActiveValue::Set(invoice_id.clone()),
                        tag_id: ActiveValue::Set(tag_id.to_string()),
                    }
                    .insert(&db_tx)
                    .await?;
                }

                self.recalculate_invoice_totals(&db_tx, &invoice_id).await?;
                let model = self
                    .require_invoice(&db_tx, parse_uuid(&invoice_id, "invoice")?, user_id)
                    .await?;
                tracing::info!("created invoice {invoice_id} for {user_id}");
                let detail = self.load_detail(&db_tx, model).await?;
                Ok(InvoiceCreated {
                    detail,
                    is_duplicate: false,
                    message: "invoice created".to_string(),
                })
            }
        })
    }

    /// An invoice with its items and tags.
    pub async fn invoice(&self, user_id: &str, invoice_id: Uuid) -> ResultEngine<InvoiceDetail> {
        with_tx!(self, |db_tx| {
            let model = self.require_invoice(&db_tx, invoice_id, user_id).await?;
            self.load_detail(&db_tx, model).await
        })
    }

    /// Lists invoices newest first, with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(created_at DESC, invoice_id DESC)`.
    /// `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    pub async fn list_invoices_page(
        &self,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
        filter: &InvoiceFilter,
    ) -> ResultEngine<(Vec<Invoice>, Option<String>)> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        with_tx!(self, |db_tx| {
            let limit_plus_one = limit + 1;
            let mut query = invoices::Entity::find()
                .filter(invoices::Column::UserId.eq(user_id.to_string()))
                .order_by_desc(invoices::Column::CreatedAt)
                .order_by_desc(invoices::Column::Id)
                .limit(limit_plus_one);

            if let Some(cursor) = cursor {
                let cursor = InvoicesCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(invoices::Column::CreatedAt.lt(cursor.created_at))
                        .add(
                            Condition::all()
                                .add(invoices::Column::CreatedAt.eq(cursor.created_at))
                                .add(invoices::Column::Id.lt(cursor.invoice_id)),
                        ),
                );
            }
            query = query.apply_invoice_filters(filter);

            let rows: Vec<invoices::Model> = query.all(&db_tx).await?;
            let page = limit as usize;
            let has_more = rows.len() > page;

            let mut out: Vec<Invoice> = Vec::with_capacity(rows.len().min(page));
            for model in rows.into_iter().take(page) {
                out.push(Invoice::try_from(model)?);
            }

            let next_cursor = out.last().map(|invoice| InvoicesCursor {
                created_at: invoice.created_at,
                invoice_id: invoice.id.to_string(),
            });
            let next_cursor = if has_more {
                next_cursor.map(|c| c.encode()).transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }

    /// Patch an invoice's own fields.
    ///
    /// Totals are never taken from the caller. A currency change re-converts
    /// every item and recomputes the totals in the same transaction.
    pub async fn update_invoice(&self, cmd: UpdateInvoiceCmd) -> ResultEngine<InvoiceDetail> {
        let user_id = cmd.user_id.as_str();
        let title = cmd
            .title
            .as_deref()
            .map(|title| normalize_required_text(title, "title"))
            .transpose()?;

        with_tx!(self, |db_tx| {
            let model = self.require_invoice(&db_tx, cmd.invoice_id, user_id).await?;

            self.require_invoice_references(
                &db_tx,
                user_id,
                cmd.category_id.flatten(),
                cmd.company_id.flatten(),
                cmd.receiver_id.flatten(),
            )
            .await?;

            let category_id = apply_nullable_patch(
                parse_optional_uuid(model.category_id.as_deref(), "category")?,
                cmd.category_id,
            );
            let company_id = apply_nullable_patch(
                parse_optional_uuid(model.company_id.as_deref(), "company")?,
                cmd.company_id,
            );
            let receiver_id = apply_nullable_patch(
                parse_optional_uuid(model.receiver_id.as_deref(), "receiver")?,
                cmd.receiver_id,
            );

            invoices::ActiveModel {
                id: ActiveValue::Set(model.id.clone()),
                title: ActiveValue::Set(title.unwrap_or_else(|| model.title.clone())),
                description: ActiveValue::Set(apply_optional_text_patch(
                    model.description.clone(),
                    cmd.description.as_deref(),
                )),
                status: ActiveValue::Set(
                    cmd.status
                        .map_or_else(|| model.status.clone(), |s| s.as_str().to_string()),
                ),
                category_id: ActiveValue::Set(category_id.map(|id| id.to_string())),
                company_id: ActiveValue::Set(company_id.map(|id| id.to_string())),
                receiver_id: ActiveValue::Set(receiver_id.map(|id| id.to_string())),
                invoice_started_at: ActiveValue::Set(apply_nullable_patch(
                    model.invoice_started_at,
                    cmd.invoice_started_at,
                )),
                invoice_ended_at: ActiveValue::Set(apply_nullable_patch(
                    model.invoice_ended_at,
                    cmd.invoice_ended_at,
                )),
                due_date: ActiveValue::Set(apply_nullable_patch(model.due_date, cmd.due_date)),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;

            if let Some(currency) = &cmd.currency
                && currency.code() != model.currency
            {
                tracing::info!(
                    "invoice {} currency {} -> {}",
                    model.id,
                    model.currency,
                    currency.code()
                );
                self.on_currency_change(&db_tx, &model.id, currency).await?;
            }

            let model = self.require_invoice(&db_tx, cmd.invoice_id, user_id).await?;
            self.load_detail(&db_tx, model).await
        })
    }

    /// Change only the currency of an invoice.
    pub async fn update_invoice_currency(
        &self,
        user_id: &str,
        invoice_id: Uuid,
        currency: Currency,
    ) -> ResultEngine<InvoiceDetail> {
        self.update_invoice(UpdateInvoiceCmd::new(user_id, invoice_id).currency(currency))
            .await
    }

    /// Delete an invoice together with its items and tag links.
    pub async fn delete_invoice(&self, user_id: &str, invoice_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_invoice(&db_tx, invoice_id, user_id).await?;
            invoice_tags::Entity::delete_many()
                .filter(invoice_tags::Column::InvoiceId.eq(model.id.clone()))
                .exec(&db_tx)
                .await?;
            invoice_items::Entity::delete_many()
                .filter(invoice_items::Column::InvoiceId.eq(model.id.clone()))
                .exec(&db_tx)
                .await?;
            invoices::Entity::delete_by_id(model.id.clone())
                .exec(&db_tx)
                .await?;
            tracing::info!("deleted invoice {} for {user_id}", model.id);
            Ok(())
        })
    }

    /// Re-sum the stored totals of an invoice from its items.
    pub async fn recompute_invoice_totals(
        &self,
        user_id: &str,
        invoice_id: Uuid,
    ) -> ResultEngine<Invoice> {
        with_tx!(self, |db_tx| {
            let model = self.require_invoice(&db_tx, invoice_id, user_id).await?;
            self.recalculate_invoice_totals(&db_tx, &model.id).await?;
            let model = self.require_invoice(&db_tx, invoice_id, user_id).await?;
            Invoice::try_from(model)
        })
    }

    /// Replace the tag set of an invoice. Returns the new tag ids, sorted.
    pub async fn set_invoice_tags(
        &self,
        user_id: &str,
        invoice_id: Uuid,
        tag_ids: &[Uuid],
    ) -> ResultEngine<Vec<Uuid>> {
        let tag_ids: BTreeSet<Uuid> = tag_ids.iter().copied().collect();
        with_tx!(self, |db_tx| {
            let model = self.require_invoice(&db_tx, invoice_id, user_id).await?;
            for tag_id in &tag_ids {
                self.require_tag(&db_tx, user_id, *tag_id).await?;
            }
            invoice_tags::Entity::delete_many()
                .filter(invoice_tags::Column::InvoiceId.eq(model.id.clone()))
                .exec(&db_tx)
                .await?;
            for tag_id in &tag_ids {
                invoice_tags::ActiveModel {
                    invoice_id: ActiveValue::Set(model.id.clone()),
                    tag_id: ActiveValue::Set(tag_id.to_string()),
                }
                .insert(&db_tx)
                .await?;
            }
            Ok(tag_ids.into_iter().collect())
        })
    }

    pub(super) async fn load_items(
        &self,
        db: &DatabaseTransaction,
        invoice_id: &str,
    ) -> ResultEngine<Vec<InvoiceItem>> {
        invoice_items::Entity::find()
            .filter(invoice_items::Column::InvoiceId.eq(invoice_id.to_string()))
            .order_by_asc(invoice_items::Column::CreatedAt)
            .order_by_asc(invoice_items::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(InvoiceItem::try_from)
            .collect()
    }

    async fn load_detail(
        &self,
        db: &DatabaseTransaction,
        model: invoices::Model,
    ) -> ResultEngine<InvoiceDetail> {
        let items = self.load_items(db, &model.id).await?;
        let tag_rows: Vec<String> = invoice_tags::Entity::find()
            .select_only()
            .column(invoice_tags::Column::TagId)
            .filter(invoice_tags::Column::InvoiceId.eq(model.id.clone()))
            .order_by_asc(invoice_tags::Column::TagId)
            .into_tuple()
            .all(db)
            .await?;
        let tag_ids = tag_rows
            .iter()
            .map(|raw| parse_uuid(raw, "tag"))
            .collect::<ResultEngine<Vec<_>>>()?;
        Ok(InvoiceDetail {
            invoice: Invoice::try_from(model)?,
            items,
            tag_ids,
        })
    }
}
