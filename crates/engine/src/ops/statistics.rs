use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    DatabaseTransaction, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    TransactionTrait, prelude::*, sea_query::Expr,
};

use crate::{
    Currency, InvoiceFilter, InvoiceStatus, ReferenceKind, ResultEngine, invoice_items, invoices,
    statistics::{
        Breakdown, GroupSummary, Grouping, InvoiceStatistics, StatRow, StatisticsOptions, Summary,
        SummaryPeriod, TimeGranularity, Window, aggregate, entity_groups, status_breakdown,
        time_buckets,
    },
    util::{parse_optional_uuid, parse_uuid},
};

use super::{Engine, invoices::ApplyInvoiceFilters, with_tx};

/// Owner, window and entity filters shared by every statistics query.
fn scoped<Q>(query: Q, user_id: &str, window: &Window, filter: &InvoiceFilter) -> Q
where
    Q: QueryFilter,
{
    query
        .filter(invoices::Column::UserId.eq(user_id.to_string()))
        .filter(invoices::Column::CreatedAt.gte(window.from))
        .filter(invoices::Column::CreatedAt.lte(window.to))
        .apply_invoice_filters(filter)
}

fn totals(rows: &[StatRow]) -> (u64, f64) {
    (rows.len() as u64, rows.iter().map(|row| row.amount).sum())
}

impl Engine {
    /// Filtered invoices with their reporting-currency amounts.
    ///
    /// Amounts are `Σ item.target_amount` per invoice, summed in the store.
    async fn stat_rows(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        window: &Window,
        filter: &InvoiceFilter,
    ) -> ResultEngine<Vec<StatRow>> {
        let models = scoped(invoices::Entity::find(), user_id, window, filter)
            .order_by_asc(invoices::Column::CreatedAt)
            .order_by_asc(invoices::Column::Id)
            .all(db)
            .await?;

        let sums: Vec<(String, Option<f64>)> = scoped(
            invoice_items::Entity::find()
                .select_only()
                .column(invoice_items::Column::InvoiceId)
                .column_as(
                    Expr::col((invoice_items::Entity, invoice_items::Column::TargetAmount)).sum(),
                    "target_sum",
                )
                .join(JoinType::InnerJoin, invoice_items::Relation::Invoice.def())
                .group_by(invoice_items::Column::InvoiceId),
            user_id,
            window,
            filter,
        )
        .into_tuple()
        .all(db)
        .await?;
        let sums: HashMap<String, f64> = sums
            .into_iter()
            .map(|(invoice_id, sum)| (invoice_id, sum.unwrap_or(0.0)))
            .collect();

        let mut rows = Vec::with_capacity(models.len());
        for model in models {
            rows.push(StatRow {
                invoice_id: parse_uuid(&model.id, "invoice")?,
                amount: sums.get(&model.id).copied().unwrap_or(0.0),
                title: model.title,
                status: InvoiceStatus::try_from(model.status.as_str())?,
                category_id: parse_optional_uuid(model.category_id.as_deref(), "category")?,
                company_id: parse_optional_uuid(model.company_id.as_deref(), "company")?,
                receiver_id: parse_optional_uuid(model.receiver_id.as_deref(), "receiver")?,
                created_at: model.created_at,
            });
        }
        Ok(rows)
    }

    async fn names_for(
        &self,
        db: &DatabaseTransaction,
        rows: &[StatRow],
        kind: ReferenceKind,
    ) -> ResultEngine<HashMap<String, String>> {
        let mut ids: Vec<String> = rows
            .iter()
            .filter_map(|row| row.reference(kind))
            .map(|id| id.to_string())
            .collect();
        ids.sort();
        ids.dedup();
        self.reference_names(db, kind, ids).await
    }

    /// Flexible statistics over the owner's invoices.
    pub async fn statistics(
        &self,
        user_id: &str,
        options: &StatisticsOptions,
    ) -> ResultEngine<InvoiceStatistics> {
        let window = options.period.window(options.days, Utc::now())?;
        with_tx!(self, |db_tx| {
            let rows = self
                .stat_rows(&db_tx, user_id, &window, &options.filter)
                .await?;

            let breakdown = match options.grouping {
                Grouping::None => Breakdown::Status(status_breakdown(&rows)),
                Grouping::Day => time_breakdown(&rows, TimeGranularity::Day, &window),
                Grouping::Week => time_breakdown(&rows, TimeGranularity::Week, &window),
                Grouping::Month => time_breakdown(&rows, TimeGranularity::Month, &window),
                Grouping::Category => {
                    self.entity_breakdown(&db_tx, &rows, ReferenceKind::Category)
                        .await?
                }
                Grouping::Company => {
                    self.entity_breakdown(&db_tx, &rows, ReferenceKind::Company)
                        .await?
                }
                Grouping::Receiver => {
                    self.entity_breakdown(&db_tx, &rows, ReferenceKind::Receiver)
                        .await?
                }
            };
            let aggregations = options
                .aggregate
                .then(|| aggregate(&rows, options.grouping, &breakdown));
            let (total_count, total_amount) = totals(&rows);

            tracing::debug!(
                "statistics for {user_id}: period={} group_by={} invoices={total_count}",
                options.period.as_str(),
                options.grouping.as_str()
            );
            Ok(InvoiceStatistics {
                currency: Currency::reporting(),
                period: options.period,
                from: window.from,
                to: window.to,
                total_count,
                total_amount,
                breakdown,
                aggregations,
            })
        })
    }

    async fn entity_breakdown(
        &self,
        db: &DatabaseTransaction,
        rows: &[StatRow],
        kind: ReferenceKind,
    ) -> ResultEngine<Breakdown> {
        let names = self.names_for(db, rows, kind).await?;
        Ok(Breakdown::Entity {
            kind,
            buckets: entity_groups(rows, kind, &names).ranked(),
        })
    }

    async fn summary_rows(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        period: SummaryPeriod,
    ) -> ResultEngine<(Summary, Vec<StatRow>)> {
        let window = period.window(Utc::now());
        let rows = self
            .stat_rows(db, user_id, &window, &InvoiceFilter::default())
            .await?;
        let (total_count, total_amount) = totals(&rows);
        let summary = Summary {
            currency: Currency::reporting(),
            period,
            from: window.from,
            to: window.to,
            total_count,
            total_amount,
            by_status: status_breakdown(&rows),
        };
        Ok((summary, rows))
    }

    /// Count and amount over a coarse period, split by status.
    pub async fn summary(&self, user_id: &str, period: SummaryPeriod) -> ResultEngine<Summary> {
        with_tx!(self, |db_tx| {
            let (summary, _rows) = self.summary_rows(&db_tx, user_id, period).await?;
            Ok(summary)
        })
    }

    async fn group_summary(
        &self,
        user_id: &str,
        period: SummaryPeriod,
        kind: ReferenceKind,
    ) -> ResultEngine<GroupSummary> {
        with_tx!(self, |db_tx| {
            let (summary, rows) = self.summary_rows(&db_tx, user_id, period).await?;
            let names = self.names_for(&db_tx, &rows, kind).await?;
            Ok(GroupSummary {
                summary,
                kind,
                groups: entity_groups(&rows, kind, &names).missing_last(),
            })
        })
    }

    pub async fn summary_by_category(
        &self,
        user_id: &str,
        period: SummaryPeriod,
    ) -> ResultEngine<GroupSummary> {
        self.group_summary(user_id, period, ReferenceKind::Category)
            .await
    }

    pub async fn summary_by_company(
        &self,
        user_id: &str,
        period: SummaryPeriod,
    ) -> ResultEngine<GroupSummary> {
        self.group_summary(user_id, period, ReferenceKind::Company)
            .await
    }

    pub async fn summary_by_receiver(
        &self,
        user_id: &str,
        period: SummaryPeriod,
    ) -> ResultEngine<GroupSummary> {
        self.group_summary(user_id, period, ReferenceKind::Receiver)
            .await
    }
}

fn time_breakdown(rows: &[StatRow], granularity: TimeGranularity, window: &Window) -> Breakdown {
    Breakdown::Time {
        granularity,
        buckets: time_buckets(rows, granularity, window),
    }
}
