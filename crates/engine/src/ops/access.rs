use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ReferenceKind, ResultEngine, categories, companies, invoice_items, invoices,
    receivers, tags,
};

use super::Engine;

/// Generates `_owned_by` and `require_` methods for a reference entity.
macro_rules! impl_reference_owned {
    ($exists_fn:ident, $require_fn:ident, $entity:path, $user_col:expr, $kind:expr) => {
        async fn $exists_fn(
            &self,
            db: &DatabaseTransaction,
            user_id: &str,
            target_id: Uuid,
        ) -> ResultEngine<bool> {
            <$entity>::find_by_id(target_id.to_string())
                .filter($user_col.eq(user_id.to_string()))
                .one(db)
                .await
                .map(|model| model.is_some())
                .map_err(Into::into)
        }

        pub(super) async fn $require_fn(
            &self,
            db: &DatabaseTransaction,
            user_id: &str,
            target_id: Uuid,
        ) -> ResultEngine<()> {
            if !self.$exists_fn(db, user_id, target_id).await? {
                return Err($kind.not_found());
            }
            Ok(())
        }
    };
}

impl Engine {
    impl_reference_owned!(
        category_owned_by,
        require_category,
        categories::Entity,
        categories::Column::UserId,
        ReferenceKind::Category
    );

    impl_reference_owned!(
        company_owned_by,
        require_company,
        companies::Entity,
        companies::Column::UserId,
        ReferenceKind::Company
    );

    impl_reference_owned!(
        receiver_owned_by,
        require_receiver,
        receivers::Entity,
        receivers::Column::UserId,
        ReferenceKind::Receiver
    );

    impl_reference_owned!(
        tag_owned_by,
        require_tag,
        tags::Entity,
        tags::Column::UserId,
        ReferenceKind::Tag
    );

    /// Validate every optional reference an invoice is about to point at.
    pub(super) async fn require_invoice_references(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        category_id: Option<Uuid>,
        company_id: Option<Uuid>,
        receiver_id: Option<Uuid>,
    ) -> ResultEngine<()> {
        if let Some(id) = category_id {
            self.require_category(db, user_id, id).await?;
        }
        if let Some(id) = company_id {
            self.require_company(db, user_id, id).await?;
        }
        if let Some(id) = receiver_id {
            self.require_receiver(db, user_id, id).await?;
        }
        Ok(())
    }

    /// Load an invoice owned by `user_id`.
    ///
    /// Invoices of other owners are reported exactly like missing ones.
    pub(super) async fn require_invoice(
        &self,
        db: &DatabaseTransaction,
        invoice_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<invoices::Model> {
        invoices::Entity::find_by_id(invoice_id.to_string())
            .filter(invoices::Column::UserId.eq(user_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("invoice not exists".to_string()))
    }

    /// Load an item together with its invoice, both owned by `user_id`.
    pub(super) async fn require_item(
        &self,
        db: &DatabaseTransaction,
        item_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<(invoice_items::Model, invoices::Model)> {
        let not_found = || EngineError::KeyNotFound("item not exists".to_string());
        let (item, invoice) = invoice_items::Entity::find_by_id(item_id.to_string())
            .find_also_related(invoices::Entity)
            .one(db)
            .await?
            .ok_or_else(not_found)?;
        match invoice {
            Some(invoice) if invoice.user_id == user_id => Ok((item, invoice)),
            _ => Err(not_found()),
        }
    }
}
