use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub mod invoice {
    use super::*;

    /// A line item as submitted by a client.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ItemNew {
        pub description: String,
        pub quantity: f64,
        pub unit_price: f64,
        /// Manual reporting-currency value, applied to this write only.
        pub target_amount: Option<f64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvoiceNew {
        pub title: String,
        pub description: Option<String>,
        /// ISO 4217 code, e.g. `HKD`.
        pub currency: String,
        /// `paid`, `unpaid` (default) or `overdue`.
        pub status: Option<String>,
        pub category_id: Option<Uuid>,
        pub company_id: Option<Uuid>,
        pub receiver_id: Option<Uuid>,
        pub invoice_started_at: Option<DateTime<FixedOffset>>,
        pub invoice_ended_at: Option<DateTime<FixedOffset>>,
        pub due_date: Option<DateTime<FixedOffset>>,
        #[serde(default)]
        pub items: Vec<ItemNew>,
        #[serde(default)]
        pub tag_ids: Vec<Uuid>,
    }

    /// PATCH body for an invoice.
    ///
    /// Absent fields are kept; `null` clears a nullable field. Totals are not
    /// accepted.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct InvoiceUpdate {
        pub title: Option<String>,
        /// An empty string clears the description.
        pub description: Option<String>,
        pub currency: Option<String>,
        pub status: Option<String>,
        #[serde(
            default,
            deserialize_with = "double_option",
            skip_serializing_if = "Option::is_none"
        )]
        pub category_id: Option<Option<Uuid>>,
        #[serde(
            default,
            deserialize_with = "double_option",
            skip_serializing_if = "Option::is_none"
        )]
        pub company_id: Option<Option<Uuid>>,
        #[serde(
            default,
            deserialize_with = "double_option",
            skip_serializing_if = "Option::is_none"
        )]
        pub receiver_id: Option<Option<Uuid>>,
        #[serde(
            default,
            deserialize_with = "double_option",
            skip_serializing_if = "Option::is_none"
        )]
        pub invoice_started_at: Option<Option<DateTime<FixedOffset>>>,
        #[serde(
            default,
            deserialize_with = "double_option",
            skip_serializing_if = "Option::is_none"
        )]
        pub invoice_ended_at: Option<Option<DateTime<FixedOffset>>>,
        #[serde(
            default,
            deserialize_with = "double_option",
            skip_serializing_if = "Option::is_none"
        )]
        pub due_date: Option<Option<DateTime<FixedOffset>>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CurrencyUpdate {
        pub currency: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TagsUpdate {
        pub tag_ids: Vec<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvoiceList {
        pub limit: Option<u64>,
        /// Opaque pagination cursor (base64), from `next_cursor`.
        ///
        /// Newest → older pagination.
        pub cursor: Option<String>,
        pub status: Option<String>,
        pub category_id: Option<Uuid>,
        pub company_id: Option<Uuid>,
        pub receiver_id: Option<Uuid>,
        pub keyword: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvoiceView {
        pub id: Uuid,
        pub title: String,
        pub description: Option<String>,
        pub currency: String,
        pub amount: f64,
        /// Total in the reporting currency.
        pub target_amount: f64,
        pub status: String,
        pub category_id: Option<Uuid>,
        pub company_id: Option<Uuid>,
        pub receiver_id: Option<Uuid>,
        pub invoice_started_at: Option<DateTime<Utc>>,
        pub invoice_ended_at: Option<DateTime<Utc>>,
        pub due_date: Option<DateTime<Utc>>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ItemView {
        pub id: Uuid,
        pub invoice_id: Uuid,
        pub description: String,
        pub quantity: f64,
        pub unit_price: f64,
        pub amount: f64,
        pub target_currency: String,
        pub target_amount: f64,
        pub fx_rate_used: f64,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvoiceDetailView {
        pub invoice: InvoiceView,
        pub items: Vec<ItemView>,
        pub tag_ids: Vec<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvoiceCreatedResponse {
        pub invoice: InvoiceDetailView,
        /// Set when the submission matched an existing invoice; nothing was
        /// written in that case.
        pub is_duplicate: bool,
        pub message: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvoiceListResponse {
        pub invoices: Vec<InvoiceView>,
        /// Opaque cursor for fetching the next page (older items).
        pub next_cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TagsResponse {
        pub tag_ids: Vec<Uuid>,
    }
}

pub mod item {
    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ItemUpdate {
        pub description: Option<String>,
        pub quantity: Option<f64>,
        pub unit_price: Option<f64>,
        /// Manual reporting-currency value, applied to this write only.
        pub target_amount: Option<f64>,
        /// Convert through the rate provider even if `target_amount` is sent.
        #[serde(default)]
        pub force_recalculate: bool,
    }

    /// An item after a write, with its invoice's refreshed totals.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ItemWriteResponse {
        pub item: invoice::ItemView,
        pub invoice: invoice::InvoiceView,
    }
}

pub mod stats {
    use super::*;

    /// Query string of the flexible statistics endpoint.
    ///
    /// Missing selectors default; unknown values are rejected.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct StatisticsQuery {
        /// `last_day`, `last_week`, `last_month` (default), `last_year`, `custom`.
        pub period: Option<String>,
        /// Lookback for `custom`.
        pub days: Option<i64>,
        /// `none` (default), `day`, `week`, `month`, `category`, `company`, `receiver`.
        pub group_by: Option<String>,
        pub aggregate: Option<bool>,
        pub status: Option<String>,
        pub category_id: Option<Uuid>,
        pub company_id: Option<Uuid>,
        pub receiver_id: Option<Uuid>,
        pub keyword: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct SummaryQuery {
        /// `7d`, `1m` (default) or `1y`.
        pub period: Option<String>,
    }
}

pub mod fx {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FxRateQuery {
        pub from: String,
        /// Defaults to the reporting currency.
        pub to: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FxRateView {
        pub from: String,
        pub to: String,
        pub rate: f64,
        pub as_of: NaiveDate,
        /// Set when the source was unreachable and 1.0 was substituted.
        pub fallback: bool,
    }
}

pub mod reference {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReferenceNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReferenceView {
        pub id: Uuid,
        pub name: String,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReferencesResponse {
        pub items: Vec<ReferenceView>,
    }
}
