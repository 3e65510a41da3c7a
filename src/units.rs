use crate::error::{BrokerError, Result};

const NANO_DECIMALS: usize = 9;

/// Render a nanoton amount in whole TON, e.g. "1500000000" -> "1.5"
pub fn from_nano(value: &str) -> Result<String> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BrokerError::InvalidPayload(format!("Invalid nano amount: {}", value)));
    }

    let digits = digits.trim_start_matches('0');
    let padded = format!("{:0>width$}", digits, width = NANO_DECIMALS + 1);
    let (whole, fraction) = padded.split_at(padded.len() - NANO_DECIMALS);
    let fraction = fraction.trim_end_matches('0');

    let mut result = String::new();
    if negative && (whole != "0" || !fraction.is_empty()) {
        result.push('-');
    }
    result.push_str(whole);
    if !fraction.is_empty() {
        result.push('.');
        result.push_str(fraction);
    }
    Ok(result)
}
