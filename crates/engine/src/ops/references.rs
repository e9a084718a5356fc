use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    Reference, ReferenceKind, ResultEngine, categories, companies, receivers, tags,
    util::normalize_required_text,
};

use super::{Engine, with_tx};

/// Generates the create and list operations of a reference entity.
macro_rules! impl_reference_ops {
    ($new_fn:ident, $list_fn:ident, $module:ident) => {
        pub async fn $new_fn(&self, user_id: &str, name: &str) -> ResultEngine<Reference> {
            let name = normalize_required_text(name, "name")?;
            with_tx!(self, |db_tx| {
                let model = $module::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4().to_string()),
                    user_id: ActiveValue::Set(user_id.to_string()),
                    name: ActiveValue::Set(name),
                    created_at: ActiveValue::Set(Utc::now()),
                }
                .insert(&db_tx)
                .await?;
                Reference::try_from(model)
            })
        }

        pub async fn $list_fn(&self, user_id: &str) -> ResultEngine<Vec<Reference>> {
            with_tx!(self, |db_tx| {
                $module::Entity::find()
                    .filter($module::Column::UserId.eq(user_id.to_string()))
                    .order_by_asc($module::Column::Name)
                    .order_by_asc($module::Column::Id)
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .map(Reference::try_from)
                    .collect::<ResultEngine<Vec<_>>>()
            })
        }
    };
}

/// `(id, name)` pairs of one reference table, restricted to `ids`.
macro_rules! names_of {
    ($module:ident, $db:expr, $ids:expr) => {
        $module::Entity::find()
            .select_only()
            .column($module::Column::Id)
            .column($module::Column::Name)
            .filter($module::Column::Id.is_in($ids))
            .into_tuple::<(String, String)>()
            .all($db)
            .await?
    };
}

impl Engine {
    impl_reference_ops!(new_category, list_categories, categories);
    impl_reference_ops!(new_company, list_companies, companies);
    impl_reference_ops!(new_receiver, list_receivers, receivers);
    impl_reference_ops!(new_tag, list_tags, tags);

    /// Display names of the given references, keyed by stored id.
    pub(super) async fn reference_names(
        &self,
        db: &DatabaseTransaction,
        kind: ReferenceKind,
        ids: Vec<String>,
    ) -> ResultEngine<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = match kind {
            ReferenceKind::Category => names_of!(categories, db, ids),
            ReferenceKind::Company => names_of!(companies, db, ids),
            ReferenceKind::Receiver => names_of!(receivers, db, ids),
            ReferenceKind::Tag => names_of!(tags, db, ids),
        };
        Ok(rows.into_iter().collect())
    }
}
