//! Initial schema migration.
//!
//! - `categories`, `companies`, `receivers`, `tags`: owner-scoped lookup rows
//! - `invoices`: invoice headers with derived totals
//! - `invoice_items`: line items with their reporting-currency values
//! - `invoice_tags`: invoice/tag links

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Iden)]
enum Categories {
    Table,
    Id,
    UserId,
    Name,
    CreatedAt,
}

#[derive(Clone, Copy, Iden)]
enum Companies {
    Table,
    Id,
    UserId,
    Name,
    CreatedAt,
}

#[derive(Clone, Copy, Iden)]
enum Receivers {
    Table,
    Id,
    UserId,
    Name,
    CreatedAt,
}

#[derive(Clone, Copy, Iden)]
enum Tags {
    Table,
    Id,
    UserId,
    Name,
    CreatedAt,
}

#[derive(Iden)]
enum Invoices {
    Table,
    Id,
    UserId,
    Title,
    Description,
    Currency,
    Amount,
    TargetAmount,
    Status,
    CategoryId,
    CompanyId,
    ReceiverId,
    InvoiceStartedAt,
    InvoiceEndedAt,
    DueDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum InvoiceItems {
    Table,
    Id,
    InvoiceId,
    Description,
    Quantity,
    UnitPrice,
    Amount,
    TargetCurrency,
    TargetAmount,
    FxRateUsed,
    CreatedAt,
}

#[derive(Iden)]
enum InvoiceTags {
    Table,
    InvoiceId,
    TagId,
}

/// `id`, `user_id`, `name`, `created_at` table plus its owner index.
async fn create_reference_table<T>(
    manager: &SchemaManager<'_>,
    table: T,
    [id, user_id, name, created_at]: [T; 4],
    index_name: &str,
) -> Result<(), DbErr>
where
    T: Iden + Copy + 'static,
{
    manager
        .create_table(
            Table::create()
                .table(table)
                .if_not_exists()
                .col(ColumnDef::new(id).string().not_null().primary_key())
                .col(ColumnDef::new(user_id).string().not_null())
                .col(ColumnDef::new(name).string().not_null())
                .col(ColumnDef::new(created_at).timestamp().not_null())
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .name(index_name)
                .table(table)
                .col(user_id)
                .to_owned(),
        )
        .await
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Lookup tables
        // ───────────────────────────────────────────────────────────────────
        create_reference_table(
            manager,
            Categories::Table,
            [
                Categories::Id,
                Categories::UserId,
                Categories::Name,
                Categories::CreatedAt,
            ],
            "idx-categories-user_id",
        )
        .await?;
        create_reference_table(
            manager,
            Companies::Table,
            [
                Companies::Id,
                Companies::UserId,
                Companies::Name,
                Companies::CreatedAt,
            ],
            "idx-companies-user_id",
        )
        .await?;
        create_reference_table(
            manager,
            Receivers::Table,
            [
                Receivers::Id,
                Receivers::UserId,
                Receivers::Name,
                Receivers::CreatedAt,
            ],
            "idx-receivers-user_id",
        )
        .await?;
        create_reference_table(
            manager,
            Tags::Table,
            [Tags::Id, Tags::UserId, Tags::Name, Tags::CreatedAt],
            "idx-tags-user_id",
        )
        .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Invoices
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Invoices::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Invoices::UserId).string().not_null())
                    .col(ColumnDef::new(Invoices::Title).string().not_null())
                    .col(ColumnDef::new(Invoices::Description).string())
                    .col(
                        ColumnDef::new(Invoices::Currency)
                            .string()
                            .not_null()
                            .default("USD"),
                    )
                    .col(
                        ColumnDef::new(Invoices::Amount)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Invoices::TargetAmount)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Invoices::Status)
                            .string()
                            .not_null()
                            .default("unpaid"),
                    )
                    .col(ColumnDef::new(Invoices::CategoryId).string())
                    .col(ColumnDef::new(Invoices::CompanyId).string())
                    .col(ColumnDef::new(Invoices::ReceiverId).string())
                    .col(ColumnDef::new(Invoices::InvoiceStartedAt).timestamp())
                    .col(ColumnDef::new(Invoices::InvoiceEndedAt).timestamp())
                    .col(ColumnDef::new(Invoices::DueDate).timestamp())
                    .col(ColumnDef::new(Invoices::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Invoices::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invoices-category_id")
                            .from(Invoices::Table, Invoices::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invoices-company_id")
                            .from(Invoices::Table, Invoices::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invoices-receiver_id")
                            .from(Invoices::Table, Invoices::ReceiverId)
                            .to(Receivers::Table, Receivers::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invoices-user_id-created_at")
                    .table(Invoices::Table)
                    .col(Invoices::UserId)
                    .col(Invoices::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invoices-user_id-amount")
                    .table(Invoices::Table)
                    .col(Invoices::UserId)
                    .col(Invoices::Amount)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Invoice items
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(InvoiceItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InvoiceItems::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InvoiceItems::InvoiceId).string().not_null())
                    .col(ColumnDef::new(InvoiceItems::Description).string().not_null())
                    .col(ColumnDef::new(InvoiceItems::Quantity).double().not_null())
                    .col(ColumnDef::new(InvoiceItems::UnitPrice).double().not_null())
                    .col(ColumnDef::new(InvoiceItems::Amount).double().not_null())
                    .col(
                        ColumnDef::new(InvoiceItems::TargetCurrency)
                            .string()
                            .not_null()
                            .default("USD"),
                    )
                    .col(ColumnDef::new(InvoiceItems::TargetAmount).double().not_null())
                    .col(
                        ColumnDef::new(InvoiceItems::FxRateUsed)
                            .double()
                            .not_null()
                            .default(1.0),
                    )
                    .col(
                        ColumnDef::new(InvoiceItems::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invoice_items-invoice_id")
                            .from(InvoiceItems::Table, InvoiceItems::InvoiceId)
                            .to(Invoices::Table, Invoices::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invoice_items-invoice_id")
                    .table(InvoiceItems::Table)
                    .col(InvoiceItems::InvoiceId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Invoice tags
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(InvoiceTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(InvoiceTags::InvoiceId).string().not_null())
                    .col(ColumnDef::new(InvoiceTags::TagId).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(InvoiceTags::InvoiceId)
                            .col(InvoiceTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invoice_tags-invoice_id")
                            .from(InvoiceTags::Table, InvoiceTags::InvoiceId)
                            .to(Invoices::Table, Invoices::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invoice_tags-tag_id")
                            .from(InvoiceTags::Table, InvoiceTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invoice_tags-tag_id")
                    .table(InvoiceTags::Table)
                    .col(InvoiceTags::TagId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(InvoiceTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InvoiceItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Receivers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Companies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        Ok(())
    }
}
