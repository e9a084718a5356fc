use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{Owner, ServerState, router, run_with_listener};

mod fx;
mod invoices;
mod items;
mod references;
mod server;
mod statistics;

pub mod types {
    pub mod invoice {
        pub use api_types::invoice::{
            CurrencyUpdate, InvoiceCreatedResponse, InvoiceDetailView, InvoiceList,
            InvoiceListResponse, InvoiceNew, InvoiceUpdate, InvoiceView, ItemNew, ItemView,
            TagsResponse, TagsUpdate,
        };
    }

    pub mod item {
        pub use api_types::item::{ItemUpdate, ItemWriteResponse};
    }

    pub mod stats {
        pub use api_types::stats::{StatisticsQuery, SummaryQuery};
        pub use engine::{GroupSummary, InvoiceStatistics, Summary};
    }

    pub mod fx {
        pub use api_types::fx::{FxRateQuery, FxRateView};
    }

    pub mod reference {
        pub use api_types::reference::{ReferenceNew, ReferenceView, ReferencesResponse};
    }
}

pub enum ServerError {
    Engine(EngineError),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidAmount(_)
        | EngineError::InvalidText(_)
        | EngineError::InvalidCurrency(_)
        | EngineError::InvalidFilter(_)
        | EngineError::InvalidId(_)
        | EngineError::InvalidCursor(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let ServerError::Engine(err) = self;
        let (status, error) = (status_for_engine_error(&err), message_for_engine_error(err));

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
