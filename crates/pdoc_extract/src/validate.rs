//! Semantic validators for extracted key values.
//!
//! These run after selection, for reporting and review queues. They are
//! deliberately not part of candidate scoring: format plausibility there is
//! the canonical-pattern re-match, nothing more.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::field::FieldKind;

static CERT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{Han}]\(\d{4}\)[\p{Han}]{2,}第[0-9A-Z\-]+号$").expect("builtin pattern")
});

static CONTRACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9\-]{5,}$").expect("builtin pattern"));

static ID18_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[1-9]\d{5}(?:19|20)\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])\d{3}[0-9Xx]$")
        .expect("builtin pattern")
});

static ID15_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[1-9]\d{7}(?:0\d|1[0-2])(?:[012]\d|3[01])\d{3}$").expect("builtin pattern")
});

const DATE_FORMATS: [&str; 3] = ["%Y年%m月%d日", "%Y-%m-%d", "%Y/%m/%d"];

pub fn is_valid_cert_number(cert_number: &str) -> bool {
    !cert_number.is_empty() && CERT_RE.is_match(cert_number)
}

pub fn is_valid_contract_number(contract_number: &str) -> bool {
    !contract_number.is_empty() && CONTRACT_RE.is_match(contract_number)
}

/// 18-digit ids must carry a valid ISO 7064 check char; 15-digit legacy ids
/// are format-checked only.
pub fn is_valid_id_number(id_number: &str) -> bool {
    match id_number.chars().count() {
        18 => ID18_RE.is_match(id_number) && id18_checksum_ok(id_number),
        15 => ID15_RE.is_match(id_number),
        _ => false,
    }
}

fn id18_checksum_ok(id_number: &str) -> bool {
    const FACTORS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];
    const CHECK_CHARS: [char; 11] = ['1', '0', 'X', '9', '8', '7', '6', '5', '4', '3', '2'];

    let chars: Vec<char> = id_number.chars().collect();
    let mut sum = 0u32;
    for (i, factor) in FACTORS.iter().enumerate() {
        match chars[i].to_digit(10) {
            Some(d) => sum += d * factor,
            None => return false,
        }
    }
    chars[17].to_ascii_uppercase() == CHECK_CHARS[(sum % 11) as usize]
}

pub fn is_valid_date(date_str: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(date_str, fmt).is_ok())
}

pub fn is_valid_money(money_str: &str) -> bool {
    let cleaned: String = money_str
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().is_ok()
}

/// Areas must parse and sit in a plausible residential/commercial range.
pub fn is_valid_area(area_str: &str) -> bool {
    let leading: String = area_str
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    match leading.parse::<f64>() {
        Ok(value) => value > 0.0 && value < 10_000.0,
        Err(_) => false,
    }
}

/// Validate a selected key-info map field by field. Fields without a
/// dedicated validator only need to be non-empty.
pub fn validate_key_info(key_info: &BTreeMap<FieldKind, String>) -> BTreeMap<FieldKind, bool> {
    key_info
        .iter()
        .map(|(kind, value)| {
            let ok = match kind {
                FieldKind::CertNumber => is_valid_cert_number(value),
                FieldKind::ContractNumber => is_valid_contract_number(value),
                FieldKind::IdNumber => is_valid_id_number(value),
                FieldKind::Date => is_valid_date(value),
                FieldKind::Money => is_valid_money(value),
                FieldKind::Area => is_valid_area(value),
                FieldKind::Address | FieldKind::HouseNumber => !value.is_empty(),
            };
            (*kind, ok)
        })
        .collect()
}
