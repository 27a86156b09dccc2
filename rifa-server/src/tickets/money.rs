//! Money calculation utilities using rust_decimal for precision
//!
//! 金额内部用 `Decimal` 计算，存储/序列化边界转 `f64`，
//! 两位小数四舍五入。

use crate::utils::AppError;
use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed unit price
const MAX_UNIT_PRICE: f64 = 1_000_000.0;

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> Result<(), AppError> {
    if !value.is_finite() {
        return Err(AppError::validation(format!(
            "{} must be a finite number, got {}",
            field_name, value
        )));
    }
    Ok(())
}

/// 票价校验：有限、正数、不超上限
pub fn validate_unit_price(price: f64) -> Result<(), AppError> {
    require_finite(price, "ticket_price")?;
    if price <= 0.0 {
        return Err(AppError::validation(format!(
            "ticket_price must be positive, got {}",
            price
        )));
    }
    if price > MAX_UNIT_PRICE {
        return Err(AppError::validation(format!(
            "ticket_price exceeds maximum allowed ({}), got {}",
            MAX_UNIT_PRICE, price
        )));
    }
    Ok(())
}

/// 总价 = 单价 × 张数，Decimal 精确计算后转 f64
pub fn total_price(unit_price: f64, count: u32) -> Result<f64, AppError> {
    validate_unit_price(unit_price)?;

    let price = Decimal::from_f64(unit_price)
        .ok_or_else(|| AppError::internal(format!("Invalid price value: {}", unit_price)))?;
    let total = (price * Decimal::from(count))
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);

    total
        .to_f64()
        .ok_or_else(|| AppError::internal(format!("Price overflow: {} x {}", unit_price, count)))
}

/// 金额规整到两位小数 (网关退款金额用)
pub fn round_amount(amount: f64) -> Result<f64, AppError> {
    require_finite(amount, "amount")?;
    let value = Decimal::from_f64(amount)
        .ok_or_else(|| AppError::internal(format!("Invalid amount value: {}", amount)))?;
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .ok_or_else(|| AppError::internal(format!("Amount overflow: {}", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_exact_for_decimal_prices() {
        // 0.1 + 0.2 style: 3 × 1.1 must be 3.3, not 3.3000000000000003
        assert_eq!(total_price(1.1, 3).unwrap(), 3.3);
        assert_eq!(total_price(5.0, 4).unwrap(), 20.0);
        assert_eq!(total_price(0.01, 7).unwrap(), 0.07);
    }

    #[test]
    fn rejects_non_positive_price() {
        assert!(total_price(0.0, 1).is_err());
        assert!(total_price(-1.0, 1).is_err());
        assert!(total_price(f64::NAN, 1).is_err());
        assert!(total_price(f64::INFINITY, 1).is_err());
    }

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(round_amount(3.1415).unwrap(), 3.14);
        assert_eq!(round_amount(10.0).unwrap(), 10.0);
    }
}
