use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{RateProvider, ResultEngine, StaticRateSource};

mod access;
mod consistency;
mod duplicates;
mod invoices;
mod items;
mod references;
mod statistics;

pub use invoices::MAX_PAGE_SIZE;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point of the financial core.
///
/// Every public operation is scoped by an owner id and runs in exactly one
/// database transaction.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    rates: Arc<RateProvider>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    rates: Option<Arc<RateProvider>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the exchange-rate provider used for item conversions.
    ///
    /// Without one, every pair converts at 1.0.
    pub fn rates(mut self, rates: Arc<RateProvider>) -> EngineBuilder {
        self.rates = Some(rates);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let rates = self
            .rates
            .unwrap_or_else(|| Arc::new(RateProvider::fixed(StaticRateSource::new())));
        Ok(Engine {
            database: self.database,
            rates,
        })
    }
}
