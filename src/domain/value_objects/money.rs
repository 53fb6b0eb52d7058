//! Money helpers.
//!
//! Amounts are integer minor units (cents). Gateways that speak decimal
//! strings (PayPal) go through `format_amount` / `parse_amount`.

/// Render cents as a decimal string with two fraction digits ("1234" -> "12.34").
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal amount string into cents.
///
/// Accepts at most two fraction digits; returns `None` for anything else.
pub fn parse_amount(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };

    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (digits, ""),
    };
    if whole.is_empty() || fraction.len() > 2 {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };
    let cents = whole.checked_mul(100)?.checked_add(fraction)?;
    Some(if negative { -cents } else { cents })
}

/// `amount * bps / 10_000`, rounded half-up.
pub fn apply_basis_points(amount: i64, bps: u32) -> i64 {
    let scaled = amount as i128 * bps as i128;
    ((scaled + 5_000) / 10_000) as i64
}
