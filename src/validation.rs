//! Boundary checks for everything that enters the market from outside.
//!
//! Money is bounded so that it always fits the storage format: two decimal
//! places, stored as integer hundredths.

use crate::api::BetType;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const MIN_BET: Decimal = dec!(1.00);
pub const MAX_BET: Decimal = dec!(10000.00);
pub const MAX_PAYOUT: Decimal = dec!(50000.00);
pub const MAX_CONFIDENCE: Decimal = dec!(100.00);
pub const DECIMAL_PLACES: u32 = 2;

/// Namespace under which non-UUID identifiers are mapped to UUIDv5.
const ID_NAMESPACE: Uuid = Uuid::from_u128(0x9f3c2a4e_8b1d_4c6f_a2e7_3d5b8c0f1e64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Subject,
    Market,
    Prediction,
    Bettor,
}
impl Display for IdKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Subject => "subject",
            Self::Market => "market",
            Self::Prediction => "prediction",
            Self::Bettor => "bettor",
        };
        write!(f, "{}", output)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be a valid number, got {raw:?}")]
    NotANumber { field: &'static str, raw: String },
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: Decimal,
        value: Decimal,
    },
    #[error("{field} must be at most {max}, got {value}")]
    AboveMaximum {
        field: &'static str,
        max: Decimal,
        value: Decimal,
    },
    #[error("{field} can only have 2 decimal places, got {raw:?}")]
    TooManyDecimals { field: &'static str, raw: String },
    #[error("{kind} identifier must not be empty")]
    EmptyIdentifier { kind: IdKind },
    #[error("bet type must be one of before, exact, after, got {0:?}")]
    InvalidBetType(String),
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}
impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotANumber { .. } => "NotANumber",
            Self::BelowMinimum { .. } => "BelowMinimum",
            Self::AboveMaximum { .. } => "AboveMaximum",
            Self::TooManyDecimals { .. } => "TooManyDecimals",
            Self::EmptyIdentifier { .. } => "EmptyIdentifier",
            Self::InvalidBetType(_) => "InvalidBetType",
            Self::EmptyField { .. } => "EmptyField",
        }
    }
}

type Result<T> = std::result::Result<T, ValidationError>;

pub fn validate_amount(raw: &str) -> Result<Decimal> {
    let amount = parse_decimal("amount", raw)?;
    if amount < MIN_BET {
        return Err(ValidationError::BelowMinimum {
            field: "amount",
            min: MIN_BET,
            value: amount,
        });
    }
    if amount > MAX_BET {
        return Err(ValidationError::AboveMaximum {
            field: "amount",
            max: MAX_BET,
            value: amount,
        });
    }
    Ok(to_money(amount))
}
pub fn validate_payout(raw: &str) -> Result<Decimal> {
    check_payout(parse_decimal("potential_payout", raw)?)
}
/// Bounds a payout that was computed rather than parsed.
pub fn check_payout(payout: Decimal) -> Result<Decimal> {
    if payout.normalize().scale() > DECIMAL_PLACES {
        return Err(ValidationError::TooManyDecimals {
            field: "potential_payout",
            raw: payout.to_string(),
        });
    }
    if payout.is_sign_negative() && !payout.is_zero() {
        return Err(ValidationError::BelowMinimum {
            field: "potential_payout",
            min: Decimal::ZERO,
            value: payout,
        });
    }
    if payout > MAX_PAYOUT {
        return Err(ValidationError::AboveMaximum {
            field: "potential_payout",
            max: MAX_PAYOUT,
            value: payout,
        });
    }
    Ok(to_money(payout))
}
/// Prediction confidence, a percentage.
pub fn validate_confidence(raw: &str) -> Result<Decimal> {
    let confidence = parse_decimal("confidence", raw)?;
    if confidence.is_sign_negative() && !confidence.is_zero() {
        return Err(ValidationError::BelowMinimum {
            field: "confidence",
            min: Decimal::ZERO,
            value: confidence,
        });
    }
    if confidence > MAX_CONFIDENCE {
        return Err(ValidationError::AboveMaximum {
            field: "confidence",
            max: MAX_CONFIDENCE,
            value: confidence,
        });
    }
    Ok(to_money(confidence))
}
/// Maps any externally supplied identifier onto a canonical UUID.
///
/// Values that already parse as a UUID (any casing, braced, urn or simple
/// form) are kept. Everything else is hashed into a UUIDv5 under a fixed
/// namespace, so legacy ids such as `demo-user-1750144109460` always resolve
/// to the same entity. All kinds share the namespace: a subject and a bettor
/// written the same way are the same person.
pub fn normalize_identifier(raw: &str, kind: IdKind) -> Result<Uuid> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyIdentifier { kind });
    }
    match Uuid::try_parse(trimmed) {
        Ok(id) => Ok(id),
        Err(_) => Ok(Uuid::new_v5(&ID_NAMESPACE, trimmed.as_bytes())),
    }
}
/// Trimmed free text such as a cause label.
pub fn require_text(field: &'static str, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    Ok(trimmed.to_string())
}
pub fn parse_bet_type(raw: &str) -> Result<BetType> {
    BetType::from_str(raw).map_err(|_| ValidationError::InvalidBetType(raw.to_string()))
}
fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    let value = Decimal::from_str(trimmed).map_err(|_| ValidationError::NotANumber {
        field,
        raw: raw.to_string(),
    })?;
    if value.normalize().scale() > DECIMAL_PLACES {
        return Err(ValidationError::TooManyDecimals {
            field,
            raw: raw.to_string(),
        });
    }
    Ok(value)
}
fn to_money(value: Decimal) -> Decimal {
    let mut value = value.normalize();
    value.rescale(DECIMAL_PLACES);
    value
}
