//! Read-only invoice analytics.
//!
//! Every figure is expressed in the reporting currency and is built from the
//! items' `target_amount`, summed per invoice. Native invoice amounts are never
//! added across invoices.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, InvoiceFilter, InvoiceStatus, ReferenceKind, ResultEngine};

mod buckets;

pub(crate) use buckets::{aggregate, entity_groups, status_breakdown, time_buckets};

/// Longest lookback accepted for `StatsPeriod::Custom`, about a century.
pub const MAX_CUSTOM_DAYS: i64 = 36_600;

/// Lookback selector of the flexible statistics query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    LastDay,
    LastWeek,
    #[default]
    LastMonth,
    LastYear,
    /// The last `days` days.
    Custom,
}

impl StatsPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LastDay => "last_day",
            Self::LastWeek => "last_week",
            Self::LastMonth => "last_month",
            Self::LastYear => "last_year",
            Self::Custom => "custom",
        }
    }

    /// Inclusive window ending at `now`.
    ///
    /// `Custom` without a positive `days` falls back to the last-month window;
    /// more than [`MAX_CUSTOM_DAYS`] is rejected.
    pub fn window(self, days: Option<i64>, now: DateTime<Utc>) -> ResultEngine<Window> {
        let from = match self {
            Self::LastDay => now - Duration::days(1),
            Self::LastWeek => now - Duration::days(7),
            Self::LastMonth => months_before(now, 1),
            Self::LastYear => months_before(now, 12),
            Self::Custom => match days {
                Some(days) if days > 0 => days_before(now, days)?,
                _ => months_before(now, 1),
            },
        };
        Ok(Window { from, to: now })
    }
}

impl TryFrom<&str> for StatsPeriod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "last_day" => Ok(Self::LastDay),
            "last_week" => Ok(Self::LastWeek),
            "last_month" => Ok(Self::LastMonth),
            "last_year" => Ok(Self::LastYear),
            "custom" => Ok(Self::Custom),
            other => Err(EngineError::InvalidFilter(format!("invalid period: {other}"))),
        }
    }
}

/// Coarse period of the summary queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryPeriod {
    #[serde(rename = "7d")]
    SevenDays,
    #[default]
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "1y")]
    OneYear,
}

impl SummaryPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SevenDays => "7d",
            Self::OneMonth => "1m",
            Self::OneYear => "1y",
        }
    }

    pub fn window(self, now: DateTime<Utc>) -> Window {
        let from = match self {
            Self::SevenDays => now - Duration::days(7),
            Self::OneMonth => months_before(now, 1),
            Self::OneYear => months_before(now, 12),
        };
        Window { from, to: now }
    }
}

impl TryFrom<&str> for SummaryPeriod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "7d" => Ok(Self::SevenDays),
            "1m" => Ok(Self::OneMonth),
            "1y" => Ok(Self::OneYear),
            other => Err(EngineError::InvalidFilter(format!("invalid period: {other}"))),
        }
    }
}

fn days_before(now: DateTime<Utc>, days: i64) -> ResultEngine<DateTime<Utc>> {
    let invalid = || EngineError::InvalidFilter(format!("invalid days: {days}"));
    if days > MAX_CUSTOM_DAYS {
        return Err(invalid());
    }
    Duration::try_days(days)
        .and_then(|lookback| now.checked_sub_signed(lookback))
        .ok_or_else(invalid)
}

fn months_before(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or_else(|| now - Duration::days(30 * i64::from(months)))
}

/// Grouping dimension of the flexible statistics query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// Split by status only.
    #[default]
    None,
    Day,
    Week,
    Month,
    Category,
    Company,
    Receiver,
}

impl Grouping {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Category => "category",
            Self::Company => "company",
            Self::Receiver => "receiver",
        }
    }

    /// Whether aggregations also report the highest bucket.
    ///
    /// Only day, category and company groupings do.
    pub fn reports_max_bucket(self) -> bool {
        matches!(self, Self::Day | Self::Category | Self::Company)
    }
}

impl TryFrom<&str> for Grouping {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "none" => Ok(Self::None),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "category" => Ok(Self::Category),
            "company" => Ok(Self::Company),
            "receiver" => Ok(Self::Receiver),
            other => Err(EngineError::InvalidFilter(format!("invalid group_by: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
    Day,
    Week,
    Month,
}

/// Inputs of the flexible statistics query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatisticsOptions {
    pub period: StatsPeriod,
    /// Only read for `StatsPeriod::Custom`.
    pub days: Option<i64>,
    pub filter: InvoiceFilter,
    pub grouping: Grouping,
    pub aggregate: bool,
}

/// Inclusive `[from, to]` range over invoice `created_at`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusTotals {
    pub count: u64,
    pub amount: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub paid: StatusTotals,
    pub unpaid: StatusTotals,
    pub overdue: StatusTotals,
}

impl StatusBreakdown {
    pub(crate) fn add(&mut self, status: InvoiceStatus, amount: f64) {
        let totals = match status {
            InvoiceStatus::Paid => &mut self.paid,
            InvoiceStatus::Unpaid => &mut self.unpaid,
            InvoiceStatus::Overdue => &mut self.overdue,
        };
        totals.count += 1;
        totals.amount += amount;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// First day of the bucket.
    pub start: NaiveDate,
    pub count: u64,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityBucket {
    /// `None` for the synthetic bucket of invoices without a reference.
    pub id: Option<Uuid>,
    pub name: String,
    pub count: u64,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "group", rename_all = "snake_case")]
pub enum Breakdown {
    #[serde(rename = "none")]
    Status(StatusBreakdown),
    Time {
        granularity: TimeGranularity,
        buckets: Vec<TimeBucket>,
    },
    Entity {
        kind: ReferenceKind,
        buckets: Vec<EntityBucket>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRef {
    pub id: Uuid,
    pub title: String,
    pub amount: f64,
}

/// The highest bucket of a day, category or company grouping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketRef {
    /// ISO date for day buckets, entity name otherwise.
    pub label: String,
    pub id: Option<Uuid>,
    pub count: u64,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aggregations {
    pub max: f64,
    pub min: f64,
    pub avg: f64,
    pub max_invoice: Option<InvoiceRef>,
    pub max_bucket: Option<BucketRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceStatistics {
    pub currency: Currency,
    pub period: StatsPeriod,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_count: u64,
    pub total_amount: f64,
    pub breakdown: Breakdown,
    pub aggregations: Option<Aggregations>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub currency: Currency,
    pub period: SummaryPeriod,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_count: u64,
    pub total_amount: f64,
    pub by_status: StatusBreakdown,
}

/// A summary plus entities ranked by amount, the synthetic bucket last.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    #[serde(flatten)]
    pub summary: Summary,
    pub kind: ReferenceKind,
    pub groups: Vec<EntityBucket>,
}

/// One filtered invoice with its reporting-currency amount.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct StatRow {
    pub(crate) invoice_id: Uuid,
    pub(crate) title: String,
    pub(crate) status: InvoiceStatus,
    pub(crate) category_id: Option<Uuid>,
    pub(crate) company_id: Option<Uuid>,
    pub(crate) receiver_id: Option<Uuid>,
    pub(crate) created_at: DateTime<Utc>,
    /// `Σ item.target_amount`; 0 for an invoice without items.
    pub(crate) amount: f64,
}

impl StatRow {
    pub(crate) fn reference(&self, kind: ReferenceKind) -> Option<Uuid> {
        match kind {
            ReferenceKind::Category => self.category_id,
            ReferenceKind::Company => self.company_id,
            ReferenceKind::Receiver => self.receiver_id,
            ReferenceKind::Tag => None,
        }
    }
}
