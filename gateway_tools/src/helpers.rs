use cpg_common::MinorUnits;

use crate::GatewayApiError;

/// The gateway expresses amounts as decimal major units ("79.00"). Converts them to minor units without floats.
pub fn parse_gateway_amount(amount: &str) -> Result<MinorUnits, GatewayApiError> {
    let invalid = |e: String| GatewayApiError::InvalidCurrencyAmount(format!("Invalid amount: {amount}. {e}"));
    let amount = amount.trim();
    let (negative, digits) = match amount.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, amount),
    };
    let mut parts = digits.split('.');
    let whole = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| invalid("Missing whole units".into()))?;
    let whole = whole.parse::<i64>().map_err(|e| invalid(e.to_string()))?;
    let cents = match parts.next() {
        None => 0,
        Some(frac) if frac.len() == 1 => frac.parse::<i64>().map_err(|e| invalid(e.to_string()))? * 10,
        Some(frac) if frac.len() == 2 => frac.parse::<i64>().map_err(|e| invalid(e.to_string()))?,
        Some(frac) => return Err(invalid(format!("Too many decimal places in '{frac}'"))),
    };
    if parts.next().is_some() {
        return Err(invalid("More than one decimal point".into()));
    }
    let value = 100 * whole + cents;
    Ok(MinorUnits::from(if negative { -value } else { value }))
}

/// Formats a minor-unit amount the way the gateway expects it.
#[allow(clippy::cast_precision_loss)]
pub fn gateway_amount(amount: MinorUnits) -> f64 {
    amount.value() as f64 / 100.0
}
