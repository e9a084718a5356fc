//! Financial core of the invoice manager.
//!
//! The [`Engine`] keeps invoice totals consistent with their items, converts
//! item amounts into the reporting currency through a fail-soft
//! [`RateProvider`], suppresses duplicate invoice submissions and answers
//! analytics queries in the reporting currency.

pub use commands::{AddItemCmd, CreateInvoiceCmd, ItemDraft, UpdateInvoiceCmd, UpdateItemCmd};
pub use currency::{Currency, REPORTING_CURRENCY};
pub use error::EngineError;
pub use fx::{
    CONVERSION_CACHE_TTL, DEFAULT_FETCH_TIMEOUT, ExchangeRate, FxError, HttpRateSource,
    LOOKUP_CACHE_TTL, RateProvider, RateSource, StaticRateSource,
};
pub use invoice_items::InvoiceItem;
pub use invoices::{
    Invoice, InvoiceCreated, InvoiceDetail, InvoiceFilter, InvoiceStatus, ItemWrite,
};
pub use money::{TargetQuote, Totals, implied_rate, item_amount};
pub use ops::{Engine, EngineBuilder, MAX_PAGE_SIZE};
pub use references::{Reference, ReferenceKind};
pub use statistics::{
    Aggregations, Breakdown, BucketRef, EntityBucket, GroupSummary, Grouping, InvoiceRef,
    InvoiceStatistics, MAX_CUSTOM_DAYS, StatisticsOptions, StatsPeriod, StatusBreakdown, StatusTotals, Summary,
    SummaryPeriod, TimeBucket, TimeGranularity, Window,
};

pub mod categories;
pub mod commands;
pub mod companies;
mod currency;
mod error;
pub mod fx;
pub mod invoice_items;
pub mod invoice_tags;
pub mod invoices;
mod money;
mod ops;
pub mod receivers;
mod references;
mod statistics;
pub mod tags;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
