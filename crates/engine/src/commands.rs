//! Command structs for engine operations.
//!
//! These types group parameters for write operations (invoice creation and
//! update, item add/update), keeping call sites readable and avoiding long
//! argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Currency, InvoiceStatus};

/// A line item as submitted by a caller.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemDraft {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// Manual reporting-currency value for this write only.
    pub target_amount: Option<f64>,
}

impl ItemDraft {
    #[must_use]
    pub fn new(description: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            target_amount: None,
        }
    }

    #[must_use]
    pub fn target_amount(mut self, target_amount: f64) -> Self {
        self.target_amount = Some(target_amount);
        self
    }
}

/// Create an invoice together with its items and tags.
#[derive(Clone, Debug)]
pub struct CreateInvoiceCmd {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub currency: Currency,
    pub status: InvoiceStatus,
    pub category_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub invoice_started_at: Option<DateTime<Utc>>,
    pub invoice_ended_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub items: Vec<ItemDraft>,
    pub tag_ids: Vec<Uuid>,
    /// Back-dates the invoice (imports); defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

impl CreateInvoiceCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, currency: Currency) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            currency,
            status: InvoiceStatus::default(),
            category_id: None,
            company_id: None,
            receiver_id: None,
            invoice_started_at: None,
            invoice_ended_at: None,
            due_date: None,
            items: Vec::new(),
            tag_ids: Vec::new(),
            created_at: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn company_id(mut self, company_id: Uuid) -> Self {
        self.company_id = Some(company_id);
        self
    }

    #[must_use]
    pub fn receiver_id(mut self, receiver_id: Uuid) -> Self {
        self.receiver_id = Some(receiver_id);
        self
    }

    #[must_use]
    pub fn period(mut self, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        self.invoice_started_at = Some(started_at);
        self.invoice_ended_at = Some(ended_at);
        self
    }

    #[must_use]
    pub fn due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    #[must_use]
    pub fn item(mut self, item: ItemDraft) -> Self {
        self.items.push(item);
        self
    }

    #[must_use]
    pub fn tag(mut self, tag_id: Uuid) -> Self {
        self.tag_ids.push(tag_id);
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Patch an invoice's own fields.
///
/// Nullable fields use `Option<Option<_>>`: `None` keeps the stored value,
/// `Some(None)` clears it. A `currency` different from the stored one
/// re-converts every item.
#[derive(Clone, Debug, Default)]
pub struct UpdateInvoiceCmd {
    pub user_id: String,
    pub invoice_id: Uuid,
    pub title: Option<String>,
    /// `Some("")` clears the description.
    pub description: Option<String>,
    pub currency: Option<Currency>,
    pub status: Option<InvoiceStatus>,
    pub category_id: Option<Option<Uuid>>,
    pub company_id: Option<Option<Uuid>>,
    pub receiver_id: Option<Option<Uuid>>,
    pub invoice_started_at: Option<Option<DateTime<Utc>>>,
    pub invoice_ended_at: Option<Option<DateTime<Utc>>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateInvoiceCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, invoice_id: Uuid) -> Self {
        Self {
            user_id: user_id.into(),
            invoice_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    #[must_use]
    pub fn status(mut self, status: InvoiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Option<Uuid>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn receiver_id(mut self, receiver_id: Option<Uuid>) -> Self {
        self.receiver_id = Some(receiver_id);
        self
    }
}

/// Add an item to an existing invoice.
#[derive(Clone, Debug)]
pub struct AddItemCmd {
    pub user_id: String,
    pub invoice_id: Uuid,
    pub item: ItemDraft,
}

impl AddItemCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, invoice_id: Uuid, item: ItemDraft) -> Self {
        Self {
            user_id: user_id.into(),
            invoice_id,
            item,
        }
    }
}

/// Update an item.
///
/// `amount` is always recomputed. The target amount follows, in order:
/// `force_recalculate` converts through the rate provider, an explicit
/// `target_amount` is pinned for this write, otherwise the provider converts.
#[derive(Clone, Debug, Default)]
pub struct UpdateItemCmd {
    pub user_id: String,
    pub item_id: Uuid,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub target_amount: Option<f64>,
    pub force_recalculate: bool,
}

impl UpdateItemCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, item_id: Uuid) -> Self {
        Self {
            user_id: user_id.into(),
            item_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    #[must_use]
    pub fn unit_price(mut self, unit_price: f64) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    #[must_use]
    pub fn target_amount(mut self, target_amount: f64) -> Self {
        self.target_amount = Some(target_amount);
        self
    }

    #[must_use]
    pub fn force_recalculate(mut self) -> Self {
        self.force_recalculate = true;
        self
    }
}
