//! Pricing arithmetic shared by the invoice and item operations.
//!
//! Amounts are plain `f64` values: the engine applies no currency rounding or
//! minor-unit conversion.

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Validate a quantity coming from a caller.
pub(crate) fn validate_quantity(quantity: f64) -> ResultEngine<f64> {
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(EngineError::InvalidAmount(
            "quantity must be a finite number >= 0".to_string(),
        ));
    }
    Ok(quantity)
}

/// Validate a unit price. Negative prices are allowed (credit lines).
pub(crate) fn validate_unit_price(unit_price: f64) -> ResultEngine<f64> {
    if !unit_price.is_finite() {
        return Err(EngineError::InvalidAmount(
            "unit_price must be a finite number".to_string(),
        ));
    }
    Ok(unit_price)
}

/// Validate a manually pinned target amount.
pub(crate) fn validate_target_override(target_amount: f64) -> ResultEngine<f64> {
    if !target_amount.is_finite() {
        return Err(EngineError::InvalidAmount(
            "target_amount must be a finite number".to_string(),
        ));
    }
    Ok(target_amount)
}

/// `amount = quantity * unit_price`.
#[must_use]
pub fn item_amount(quantity: f64, unit_price: f64) -> f64 {
    quantity * unit_price
}

/// Rate implied by a pinned target amount; 1.0 when the amount is zero.
#[must_use]
pub fn implied_rate(target_amount: f64, amount: f64) -> f64 {
    if amount == 0.0 {
        1.0
    } else {
        target_amount / amount
    }
}

/// How the target amount of an item is derived on a single write.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum TargetRule {
    /// Convert through the rate provider.
    Convert,
    /// Use the caller's value verbatim and back-compute the rate.
    Pinned(f64),
}

impl TargetRule {
    /// `force_recalculate` wins over an override sent in the same call.
    pub(crate) fn resolve(target_override: Option<f64>, force_recalculate: bool) -> Self {
        match target_override {
            Some(target) if !force_recalculate => Self::Pinned(target),
            _ => Self::Convert,
        }
    }
}

/// Derived reporting-currency values of one item.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetQuote {
    pub target_amount: f64,
    pub fx_rate_used: f64,
}

impl TargetQuote {
    #[must_use]
    pub fn identity(amount: f64) -> Self {
        Self {
            target_amount: amount,
            fx_rate_used: 1.0,
        }
    }

    #[must_use]
    pub fn converted(amount: f64, rate: f64) -> Self {
        Self {
            target_amount: amount * rate,
            fx_rate_used: rate,
        }
    }

    #[must_use]
    pub fn pinned(amount: f64, target_amount: f64) -> Self {
        Self {
            target_amount,
            fx_rate_used: implied_rate(target_amount, amount),
        }
    }
}

/// Invoice-level totals: the native and reporting sums of its items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub amount: f64,
    pub target_amount: f64,
}

impl Totals {
    /// Re-sum totals from `(amount, target_amount)` pairs.
    ///
    /// Pairs are summed in a canonical order so the same item set always
    /// yields bit-identical totals, whatever order storage returns it in.
    pub fn sum<I>(items: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut items: Vec<(f64, f64)> = items.into_iter().collect();
        items.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        items
            .into_iter()
            .fold(Self::default(), |acc, (amount, target_amount)| Self {
                amount: acc.amount + amount,
                target_amount: acc.target_amount + target_amount,
            })
    }
}
