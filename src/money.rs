//! Loan amount normalization.

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// Largest magnitude formatted; anything above is returned as supplied.
const MAX_AMOUNT: f64 = 1e18;

/// Normalize a loan amount to en-AU currency form (`$2,500,000`).
///
/// Values that already look formatted (currency symbol or digit grouping)
/// and values that do not parse as a number are returned unchanged.
/// The result carries no fractional digits.
pub fn normalize_amount(raw: &str) -> String {
    let trimmed = raw.trim();
    if looks_formatted(trimmed) {
        return raw.to_string();
    }

    let numeric: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    match numeric.parse::<f64>() {
        Ok(value) if value.is_finite() && value.abs() < MAX_AMOUNT => format_currency(value),
        _ => raw.to_string(),
    }
}

fn looks_formatted(value: &str) -> bool {
    value.contains(CURRENCY_SYMBOLS) || value.contains(',')
}

fn format_currency(value: f64) -> String {
    let rounded = value.round();
    let units = rounded.abs() as u64;
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}${}", sign, group_thousands(units))
}

fn group_thousands(units: u64) -> String {
    let digits = units.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
