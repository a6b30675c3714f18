//! Lenient parsing of amounts, quantities, dates and credit periods.
//!
//! The source formats numbers for humans: thousands separators, currency
//! symbols, unit suffixes and forex annotations all appear inline. None of
//! these parsers fail; an unreadable value becomes zero (or `None` for
//! dates) and is logged at debug level.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

/// Parses a monetary amount.
///
/// A composite forex value such as `-$1890.00 @ ₹96.55/$ = -₹182483.30`
/// yields the converted amount after the last `=`.
pub fn parse_amount(raw: &str) -> Decimal {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Decimal::ZERO;
    }

    let candidate = match trimmed.rfind('=') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    };
    let cleaned: String = candidate
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();

    match Decimal::from_str(&cleaned) {
        Ok(value) => value,
        Err(_) => {
            debug!(raw, "unreadable amount, using zero");
            Decimal::ZERO
        }
    }
}

/// Parses the leading number of a quantity or rate (`"10 Nos"`, `"-3 Kg"`,
/// `"12.50/Nos"`).
pub fn parse_quantity(raw: &str) -> Decimal {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();

    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in cleaned.char_indices() {
        let accepted = match c {
            '-' | '+' => i == 0,
            '.' if !seen_dot => {
                seen_dot = true;
                true
            }
            c => c.is_ascii_digit(),
        };
        if !accepted {
            break;
        }
        end = i + c.len_utf8();
    }

    let number = &cleaned[..end];
    if number.is_empty() {
        return Decimal::ZERO;
    }
    match Decimal::from_str(number.trim_start_matches('+')) {
        Ok(value) => value,
        Err(_) => {
            debug!(raw, "unreadable quantity, using zero");
            Decimal::ZERO
        }
    }
}

/// Parses a date in the source's compact (`20240101`), ISO (`2024-01-01`)
/// or display (`01-Jan-2024`) form.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    ["%Y%m%d", "%Y-%m-%d", "%d-%b-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            debug!(raw, "unreadable date");
            None
        })
}

/// Leading integer of a credit period such as `"30 Days"`.
pub fn leading_days(period: &str) -> Option<i64> {
    let digits: String = period
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Due date of a bill: the bill date plus the credit period's leading
/// integer in days, or the bill date itself when there is no usable period.
pub fn due_date(bill_date: NaiveDate, credit_period: &str) -> NaiveDate {
    match leading_days(credit_period) {
        Some(days) if days > 0 => Duration::try_days(days)
            .and_then(|d| bill_date.checked_add_signed(d))
            .unwrap_or(bill_date),
        _ => bill_date,
    }
}
