//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`KeyNotFound`] returned when a row does not exist or is not owned by the caller.
//! - [`InvalidAmount`] returned when a quantity, price or override is rejected.
//! - [`InvalidText`] returned when a required title, description or name is blank.
//! - [`InvalidFilter`] returned when a statistics period/grouping/filter value is unknown.
//!
//! Exchange-rate failures never show up here: the rate provider degrades to a
//! 1.0 rate instead (see [`RateProvider`]).
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidText`]: EngineError::InvalidText
//!  [`InvalidFilter`]: EngineError::InvalidFilter
//!  [`RateProvider`]: crate::RateProvider
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid text: {0}")]
    InvalidText(String),
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidText(a), Self::InvalidText(b)) => a == b,
            (Self::InvalidCurrency(a), Self::InvalidCurrency(b)) => a == b,
            (Self::InvalidFilter(a), Self::InvalidFilter(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
