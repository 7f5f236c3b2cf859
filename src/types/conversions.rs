use chrono::{DateTime, TimeZone, Utc};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use std::str::FromStr;

// Decimal's 96-bit mantissa holds powers of ten only through 10^28
const MAX_SCALE_WIDTH: u32 = 28;

// Ten to the `decimals` power. The width comes straight from config;
// anything wider than the mantissa allows reports `Overflow`.
fn scale_factor(decimals: u32) -> Result<Decimal, ConversionError> {
    if decimals > MAX_SCALE_WIDTH {
        return Err(ConversionError::Overflow);
    }
    Ok(Decimal::from(10u128.pow(decimals)))
}

/// Smallest-unit chain amount to a human-denominated decimal.
pub fn u256_to_decimal(value: U256, decimals: u32) -> Result<Decimal, ConversionError> {
    let value_str = value.to_string();
    let decimal_value = Decimal::from_str(&value_str)
        .map_err(|e| ConversionError::InvalidDecimal(e.to_string()))?;

    Ok(decimal_value / scale_factor(decimals)?)
}

/// Human-denominated decimal to smallest chain units. Rejects negatives and
/// amounts with more fractional digits than the token carries, so nothing is
/// silently truncated on the way to a transaction.
pub fn decimal_to_u256(value: Decimal, decimals: u32) -> Result<U256, ConversionError> {
    if value.is_sign_negative() {
        return Err(ConversionError::NegativeAmount(value.to_string()));
    }

    let scaled = value
        .checked_mul(scale_factor(decimals)?)
        .ok_or(ConversionError::Overflow)?;
    if scaled.fract() != Decimal::ZERO {
        return Err(ConversionError::ExcessPrecision {
            value: value.to_string(),
            decimals,
        });
    }

    U256::from_dec_str(&scaled.trunc().to_string())
        .map_err(|e| ConversionError::InvalidDecimal(e.to_string()))
}

// Subgraph entity ids are lowercase hex addresses
pub fn address_to_string(addr: Address) -> String {
    format!("{:?}", addr).to_lowercase()
}

pub fn string_to_address(s: &str) -> Result<Address, ConversionError> {
    Address::from_str(s.trim()).map_err(|e| ConversionError::InvalidAddress(e.to_string()))
}

/// Indexer timestamps and contract due dates are unix seconds.
pub fn unix_seconds_to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),
    #[error("Overflow in conversion")]
    Overflow,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Negative amount: {0}")]
    NegativeAmount(String),
    #[error("Amount {value} has more than {decimals} fractional digits")]
    ExcessPrecision { value: String, decimals: u32 },
}
