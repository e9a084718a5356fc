//! Bucketing strategies over filtered statistics rows.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate};

use crate::ReferenceKind;

use super::{
    Aggregations, Breakdown, BucketRef, EntityBucket, Grouping, InvoiceRef, StatRow,
    StatusBreakdown, TimeBucket, TimeGranularity, Window,
};

pub(crate) fn status_breakdown(rows: &[StatRow]) -> StatusBreakdown {
    let mut breakdown = StatusBreakdown::default();
    for row in rows {
        breakdown.add(row.status, row.amount);
    }
    breakdown
}

fn bucket_start(date: NaiveDate, granularity: TimeGranularity) -> NaiveDate {
    match granularity {
        TimeGranularity::Day => date,
        TimeGranularity::Week => {
            date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
        }
        TimeGranularity::Month => date.with_day(1).unwrap_or(date),
    }
}

/// Time buckets in ascending order.
///
/// Day buckets cover every calendar day of the window, empty days included.
/// Week and month buckets only exist where there is data.
pub(crate) fn time_buckets(
    rows: &[StatRow],
    granularity: TimeGranularity,
    window: &Window,
) -> Vec<TimeBucket> {
    let mut buckets: BTreeMap<NaiveDate, (u64, f64)> = BTreeMap::new();
    if granularity == TimeGranularity::Day {
        let last = window.to.date_naive();
        for day in window
            .from
            .date_naive()
            .iter_days()
            .take_while(|day| *day <= last)
        {
            buckets.insert(day, (0, 0.0));
        }
    }
    for row in rows {
        let start = bucket_start(row.created_at.date_naive(), granularity);
        let entry = buckets.entry(start).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += row.amount;
    }
    buckets
        .into_iter()
        .map(|(start, (count, amount))| TimeBucket {
            start,
            count,
            amount,
        })
        .collect()
}

/// Entity buckets, split into real references and the synthetic bucket of
/// invoices without one.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EntityGroups {
    named: Vec<EntityBucket>,
    missing: Option<EntityBucket>,
}

fn sort_by_amount_desc(buckets: &mut [EntityBucket]) {
    buckets.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.name.cmp(&b.name))
    });
}

impl EntityGroups {
    /// All buckets ordered by amount, descending.
    pub(crate) fn ranked(self) -> Vec<EntityBucket> {
        let mut buckets = self.named;
        buckets.extend(self.missing);
        sort_by_amount_desc(&mut buckets);
        buckets
    }

    /// Real references ordered by amount, then the synthetic bucket.
    pub(crate) fn missing_last(self) -> Vec<EntityBucket> {
        let mut buckets = self.named;
        sort_by_amount_desc(&mut buckets);
        buckets.extend(self.missing);
        buckets
    }
}

/// Group rows by the reference of `kind`.
///
/// `names` maps stored reference ids to display names.
pub(crate) fn entity_groups(
    rows: &[StatRow],
    kind: ReferenceKind,
    names: &HashMap<String, String>,
) -> EntityGroups {
    let mut named: HashMap<uuid::Uuid, EntityBucket> = HashMap::new();
    let mut missing: Option<EntityBucket> = None;
    for row in rows {
        let bucket = match row.reference(kind) {
            Some(id) => named.entry(id).or_insert_with(|| {
                let key = id.to_string();
                EntityBucket {
                    id: Some(id),
                    name: names.get(&key).cloned().unwrap_or(key),
                    count: 0,
                    amount: 0.0,
                }
            }),
            None => missing.get_or_insert_with(|| EntityBucket {
                id: None,
                name: kind.missing_label().to_string(),
                count: 0,
                amount: 0.0,
            }),
        };
        bucket.count += 1;
        bucket.amount += row.amount;
    }
    EntityGroups {
        named: named.into_values().collect(),
        missing,
    }
}

/// First row with the highest amount, or the lowest with `lowest`.
fn extreme(rows: &[StatRow], lowest: bool) -> Option<&StatRow> {
    rows.iter().fold(None, |best: Option<&StatRow>, row| match best {
        Some(current)
            if (lowest && row.amount >= current.amount)
                || (!lowest && row.amount <= current.amount) =>
        {
            Some(current)
        }
        _ => Some(row),
    })
}

fn max_bucket(breakdown: &Breakdown) -> Option<BucketRef> {
    match breakdown {
        Breakdown::Status(_) => None,
        Breakdown::Time { buckets, .. } => buckets
            .iter()
            .fold(None, |best: Option<&TimeBucket>, bucket| match best {
                Some(current) if bucket.amount <= current.amount => Some(current),
                _ => Some(bucket),
            })
            .map(|bucket| BucketRef {
                label: bucket.start.to_string(),
                id: None,
                count: bucket.count,
                amount: bucket.amount,
            }),
        Breakdown::Entity { buckets, .. } => buckets
            .iter()
            .fold(None, |best: Option<&EntityBucket>, bucket| match best {
                Some(current) if bucket.amount <= current.amount => Some(current),
                _ => Some(bucket),
            })
            .map(|bucket| BucketRef {
                label: bucket.name.clone(),
                id: bucket.id,
                count: bucket.count,
                amount: bucket.amount,
            }),
    }
}

/// Max, min and mean over the rows, the largest invoice and, for groupings
/// that report one, the largest bucket of `breakdown`.
///
/// An empty row set yields zeros and no references.
pub(crate) fn aggregate(rows: &[StatRow], grouping: Grouping, breakdown: &Breakdown) -> Aggregations {
    let max_row = extreme(rows, false);
    let min_row = extreme(rows, true);
    let total: f64 = rows.iter().map(|row| row.amount).sum();
    let avg = if rows.is_empty() {
        0.0
    } else {
        total / rows.len() as f64
    };
    let max_bucket = if grouping.reports_max_bucket() && !rows.is_empty() {
        max_bucket(breakdown)
    } else {
        None
    };
    Aggregations {
        max: max_row.map_or(0.0, |row| row.amount),
        min: min_row.map_or(0.0, |row| row.amount),
        avg,
        max_invoice: max_row.map(|row| InvoiceRef {
            id: row.invoice_id,
            title: row.title.clone(),
            amount: row.amount,
        }),
        max_bucket,
    }
}
