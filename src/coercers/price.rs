//! Price coercion with currency detection
//!
//! A price becomes `{amount, currency, currency_raw, raw_price}`. The decimal
//! separator is inferred from the digits themselves:
//!
//! - both `,` and `.` present: the later one is the decimal separator
//! - only `,`: a final group of 2 digits is decimal, of 3 is thousands
//! - only `.`: a final group of 3 digits is thousands
//!
//! Anything with more than one numeric run (`12.00 - 23.00`) is rejected.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::{json_type_name, CoercionError};

/// Phrases meaning the page had no usable price; these coerce to null
pub const PRICE_NOT_AVAILABLE: [&str; 20] = [
    "n/a",
    "na",
    "-",
    "--",
    "none",
    "null",
    "tbd",
    "not available",
    "price not available",
    "unavailable",
    "currently unavailable",
    "out of stock",
    "sold out",
    "call for price",
    "contact for price",
    "contact us",
    "price on request",
    "on request",
    "poa",
    "request a quote",
];

/// ISO-4217 codes recognized in price text
const ISO_CODES: [&str; 47] = [
    "USD", "EUR", "GBP", "JPY", "CNY", "INR", "RUB", "KRW", "BRL", "CAD", "AUD", "NZD", "HKD",
    "SGD", "CHF", "SEK", "NOK", "DKK", "ISK", "PLN", "CZK", "HUF", "RON", "BGN", "TRY", "ILS",
    "THB", "VND", "PHP", "IDR", "MYR", "MXN", "ARS", "CLP", "COP", "PEN", "ZAR", "NGN", "EGP",
    "AED", "SAR", "QAR", "KWD", "UAH", "TWD", "KES", "PKR",
];

/// Currency symbols and the code they imply (`None` when ambiguous)
const SYMBOLS: [(&str, Option<&str>); 29] = [
    ("US$", Some("USD")),
    ("CA$", Some("CAD")),
    ("AU$", Some("AUD")),
    ("NZ$", Some("NZD")),
    ("HK$", Some("HKD")),
    ("MX$", Some("MXN")),
    ("C$", Some("CAD")),
    ("A$", Some("AUD")),
    ("S$", Some("SGD")),
    ("R$", Some("BRL")),
    ("zł", Some("PLN")),
    ("Kč", Some("CZK")),
    ("Ft", Some("HUF")),
    ("Rs", Some("INR")),
    ("kr", None),
    ("€", Some("EUR")),
    ("£", Some("GBP")),
    ("¥", Some("JPY")),
    ("₹", Some("INR")),
    ("₽", Some("RUB")),
    ("₩", Some("KRW")),
    ("₺", Some("TRY")),
    ("₪", Some("ILS")),
    ("฿", Some("THB")),
    ("₫", Some("VND")),
    ("₱", Some("PHP")),
    ("₴", Some("UAH")),
    ("₦", Some("NGN")),
    ("$", Some("USD")),
];

static ISO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b({})\b", ISO_CODES.join("|"))).expect("iso currency regex")
});
static SYMBOL_RE: Lazy<Regex> = Lazy::new(|| {
    let alternatives: Vec<String> = SYMBOLS
        .iter()
        .map(|(symbol, _)| {
            if symbol.chars().all(char::is_alphabetic) {
                format!(r"\b{}\b", regex::escape(symbol))
            } else {
                regex::escape(symbol)
            }
        })
        .collect();
    Regex::new(&alternatives.join("|")).expect("currency symbol regex")
});
static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,]?\d+(?:[.,]\d+)*").expect("amount regex"));

/// A parsed price
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub currency_raw: Option<String>,
    pub raw_price: String,
}

impl Price {
    pub fn into_value(self) -> Value {
        let mut map = Map::new();
        map.insert("amount".into(), self.amount.map_or(Value::Null, Value::from));
        map.insert("currency".into(), self.currency.map_or(Value::Null, Value::String));
        map.insert("currency_raw".into(), self.currency_raw.map_or(Value::Null, Value::String));
        map.insert("raw_price".into(), Value::String(self.raw_price));
        Value::Object(map)
    }
}

/// Price object, or null when no price is available.
pub fn coerce_price(value: &Value) -> Result<Value, CoercionError> {
    Ok(parse_price_value(value)?.map_or(Value::Null, Price::into_value))
}

/// Legacy `currency` type: only the numeric amount of a price.
pub fn coerce_currency(value: &Value) -> Result<Value, CoercionError> {
    Ok(parse_price_value(value)?
        .and_then(|p| p.amount)
        .map_or(Value::Null, Value::from))
}

fn parse_price_value(value: &Value) -> Result<Option<Price>, CoercionError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(Some(Price {
            amount: n.as_f64(),
            currency: None,
            currency_raw: None,
            raw_price: n.to_string(),
        })),
        Value::String(s) => parse_price(s),
        // A previously coerced price is re-parsed from its source text
        Value::Object(map) => match map.get("raw_price") {
            Some(raw @ (Value::String(_) | Value::Number(_))) => parse_price_value(raw),
            _ => Err(CoercionError::UnexpectedType {
                expected: "price",
                actual: "object",
            }),
        },
        other => Err(CoercionError::UnexpectedType {
            expected: "price",
            actual: json_type_name(other),
        }),
    }
}

/// Parse scraped price text. `Ok(None)` means "no price".
pub fn parse_price(raw: &str) -> Result<Option<Price>, CoercionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || is_not_available(trimmed) {
        return Ok(None);
    }

    let (currency, currency_raw) = detect_currency(trimmed);

    let mut runs = AMOUNT_RE.find_iter(trimmed);
    let amount = match (runs.next(), runs.next()) {
        (None, _) => None,
        (Some(run), None) => {
            let magnitude = parse_amount(run.as_str())
                .ok_or_else(|| CoercionError::AmbiguousPrice(raw.to_string()))?;
            let negative = trimmed[..run.start()].contains('-');
            Some(if negative { -magnitude } else { magnitude })
        }
        (Some(_), Some(_)) => return Err(CoercionError::MultiplePriceAmounts(raw.to_string())),
    };

    Ok(Some(Price {
        amount,
        currency,
        currency_raw,
        raw_price: raw.to_string(),
    }))
}

fn is_not_available(value: &str) -> bool {
    let lowered = value.trim_end_matches('.').trim().to_lowercase();
    PRICE_NOT_AVAILABLE.contains(&lowered.as_str())
}

/// ISO codes win over symbols; among symbols the leftmost, longest one wins.
fn detect_currency(value: &str) -> (Option<String>, Option<String>) {
    if let Some(code) = ISO_RE.find(value) {
        return (Some(code.as_str().to_string()), Some(code.as_str().to_string()));
    }
    match SYMBOL_RE.find(value) {
        Some(found) => {
            let code = SYMBOLS
                .iter()
                .find(|(symbol, _)| *symbol == found.as_str())
                .and_then(|(_, code)| *code);
            (code.map(String::from), Some(found.as_str().to_string()))
        }
        None => (None, None),
    }
}

/// Apply the separator policy to one numeric run. `None` when ambiguous.
fn parse_amount(run: &str) -> Option<f64> {
    let has_comma = run.contains(',');
    let has_dot = run.contains('.');

    let normalized = match (has_comma, has_dot) {
        (true, true) => {
            let (decimal, thousands) = if run.rfind(',') > run.rfind('.') {
                (',', '.')
            } else {
                ('.', ',')
            };
            if run.matches(decimal).count() > 1 {
                return None;
            }
            run.replace(thousands, "").replace(decimal, ".")
        }
        (true, false) => {
            let (integer, last_group) = run.rsplit_once(',')?;
            match last_group.len() {
                2 => format!("{}.{}", integer.replace(',', ""), last_group),
                3 => run.replace(',', ""),
                _ => return None,
            }
        }
        (false, true) => {
            let (_, last_group) = run.rsplit_once('.')?;
            if last_group.len() == 3 {
                run.replace('.', "")
            } else if run.matches('.').count() > 1 {
                return None;
            } else {
                run.to_string()
            }
        }
        (false, false) => run.to_string(),
    };

    let normalized = if normalized.starts_with('.') {
        format!("0{}", normalized)
    } else {
        let stripped = normalized.trim_start_matches('0');
        if stripped.is_empty() || stripped.starts_with('.') {
            format!("0{}", stripped)
        } else {
            stripped.to_string()
        }
    };

    normalized.parse::<f64>().ok().filter(|f| f.is_finite())
}
