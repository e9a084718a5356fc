//! Owner-scoped lookup rows an invoice can point at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, categories, companies, receivers, tags, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Category,
    Company,
    Receiver,
    Tag,
}

impl ReferenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Company => "company",
            Self::Receiver => "receiver",
            Self::Tag => "tag",
        }
    }

    /// Label of the synthetic bucket holding invoices without this reference.
    pub fn missing_label(self) -> &'static str {
        match self {
            Self::Category => "Uncategorized",
            Self::Company => "No Company",
            Self::Receiver => "No Receiver",
            Self::Tag => "Untagged",
        }
    }

    pub(crate) fn not_found(self) -> EngineError {
        EngineError::KeyNotFound(format!("{} not exists", self.as_str()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: Uuid,
    pub kind: ReferenceKind,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

macro_rules! impl_reference_from_model {
    ($module:ident, $kind:expr) => {
        impl TryFrom<$module::Model> for Reference {
            type Error = EngineError;

            fn try_from(model: $module::Model) -> Result<Self, Self::Error> {
                Ok(Self {
                    id: parse_uuid(&model.id, $kind.as_str())?,
                    kind: $kind,
                    name: model.name,
                    created_at: model.created_at,
                })
            }
        }
    };
}

impl_reference_from_model!(categories, ReferenceKind::Category);
impl_reference_from_model!(companies, ReferenceKind::Company);
impl_reference_from_model!(receivers, ReferenceKind::Receiver);
impl_reference_from_model!(tags, ReferenceKind::Tag);
