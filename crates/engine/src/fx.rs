//! Exchange rates.
//!
//! A [`RateSource`] knows how to fetch a spot rate from somewhere (an HTTP
//! endpoint, a seeded table). The [`RateProvider`] wraps a source with a TTL
//! cache and the fail-soft contract the rest of the engine relies on:
//! [`RateProvider::get_rate`] never fails. When the source errors the provider
//! answers with a rate of `1.0` flagged as [`ExchangeRate::fallback`].

use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Currency;

/// Cache lifetime for rates used while converting invoice items.
pub const CONVERSION_CACHE_TTL: Duration = Duration::from_secs(60);
/// Cache lifetime for rates shown to users.
pub const LOOKUP_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
/// Upper bound for a single call to the external rate source.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A spot rate: `1 from = rate to`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from: Currency,
    pub to: Currency,
    pub rate: f64,
    pub as_of: NaiveDate,
    /// `true` when the source failed and `rate` is the 1.0 stand-in.
    pub fallback: bool,
}

impl ExchangeRate {
    fn identity(from: &Currency, to: &Currency) -> Self {
        Self {
            from: from.clone(),
            to: to.clone(),
            rate: 1.0,
            as_of: Utc::now().date_naive(),
            fallback: false,
        }
    }

    fn fallback(from: &Currency, to: &Currency) -> Self {
        Self {
            fallback: true,
            ..Self::identity(from, to)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FxError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("rate source answered {0}")]
    Status(StatusCode),
    #[error("rate source has no {to} rate for {from}")]
    MissingSymbol { from: String, to: String },
    #[error("rate source returned an invalid rate for {0}")]
    InvalidRate(String),
}

/// Where spot rates come from.
#[async_trait]
pub trait RateSource: Send + Sync + fmt::Debug {
    async fn fetch(&self, from: &Currency, to: &Currency) -> Result<ExchangeRate, FxError>;
}

/// Body of a `latest` rates endpoint (`{"date": .., "rates": {"USD": ..}}`).
#[derive(Debug, Deserialize)]
struct LatestRates {
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// Rate source backed by a public `GET {base_url}/latest?base=..&symbols=..`
/// endpoint.
#[derive(Clone, Debug)]
pub struct HttpRateSource {
    client: Client,
    base_url: String,
}

impl HttpRateSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FxError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/latest", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch(&self, from: &Currency, to: &Currency) -> Result<ExchangeRate, FxError> {
        let resp = self
            .client
            .get(self.url())
            .query(&[("base", from.code()), ("symbols", to.code())])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FxError::Status(status));
        }

        let body = resp.json::<LatestRates>().await?;
        let rate = body
            .rates
            .get(to.code())
            .copied()
            .ok_or_else(|| FxError::MissingSymbol {
                from: from.to_string(),
                to: to.to_string(),
            })?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(FxError::InvalidRate(format!("{from}/{to}")));
        }

        Ok(ExchangeRate {
            from: from.clone(),
            to: to.clone(),
            rate,
            as_of: body.date.unwrap_or_else(|| Utc::now().date_naive()),
            fallback: false,
        })
    }
}

/// Deterministic rate table; pairs that were never seeded convert at 1.0.
#[derive(Clone, Debug, Default)]
pub struct StaticRateSource {
    rates: HashMap<(String, String), f64>,
}

impl StaticRateSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `1 from = rate to`. Codes are matched case-insensitively.
    #[must_use]
    pub fn with_rate(mut self, from: &str, to: &str, rate: f64) -> Self {
        self.rates.insert(
            (from.trim().to_ascii_uppercase(), to.trim().to_ascii_uppercase()),
            rate,
        );
        self
    }
}

#[async_trait]
impl RateSource for StaticRateSource {
    async fn fetch(&self, from: &Currency, to: &Currency) -> Result<ExchangeRate, FxError> {
        let rate = self
            .rates
            .get(&(from.code().to_string(), to.code().to_string()))
            .copied()
            .unwrap_or(1.0);
        Ok(ExchangeRate {
            rate,
            ..ExchangeRate::identity(from, to)
        })
    }
}

#[derive(Clone, Debug)]
struct CachedRate {
    rate: ExchangeRate,
    cached_at: Instant,
}

/// Cached, fail-soft access to a [`RateSource`].
///
/// The cache is shared by every caller holding the provider. Concurrent misses
/// on the same pair may both hit the source; the last write wins.
#[derive(Debug)]
pub struct RateProvider {
    source: Arc<dyn RateSource>,
    ttl: Duration,
    cache: RwLock<HashMap<(Currency, Currency), CachedRate>>,
}

impl RateProvider {
    pub fn new(source: Arc<dyn RateSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Provider over a seeded [`StaticRateSource`] with the conversion TTL.
    pub fn fixed(source: StaticRateSource) -> Self {
        Self::new(Arc::new(source), CONVERSION_CACHE_TTL)
    }

    /// Resolve `1 from = ? to`.
    ///
    /// Never fails: same-currency pairs return 1.0 without touching the cache
    /// or the source, and source failures degrade to a 1.0 fallback rate that
    /// is not cached.
    pub async fn get_rate(&self, from: &Currency, to: &Currency) -> ExchangeRate {
        if from == to {
            return ExchangeRate::identity(from, to);
        }

        let key = (from.clone(), to.clone());
        if let Some(hit) = self.cache.read().await.get(&key)
            && hit.cached_at.elapsed() < self.ttl
        {
            tracing::debug!("fx cache hit for {from}/{to}");
            return hit.rate.clone();
        }

        tracing::debug!("fx cache miss for {from}/{to}");
        match self.source.fetch(from, to).await {
            Ok(rate) => {
                self.cache.write().await.insert(
                    key,
                    CachedRate {
                        rate: rate.clone(),
                        cached_at: Instant::now(),
                    },
                );
                rate
            }
            Err(err) => {
                tracing::warn!("fx lookup {from}/{to} failed, using 1.0: {err}");
                ExchangeRate::fallback(from, to)
            }
        }
    }
}
