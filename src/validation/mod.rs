use bigdecimal::BigDecimal;
use std::fmt;

use crate::domain::{BaseRequest, CardDetails, Money, TransactionStatusUpdate};

pub const CURRENCY_CODE_LEN: usize = 3;
pub const CARD_NAME_MAX_LEN: usize = 128;
pub const CARD_NUMBER_MIN_LEN: usize = 12;
pub const CARD_NUMBER_MAX_LEN: usize = 19;
pub const EXPIRY_YEAR_MIN: u32 = 2021;
pub const EXPIRY_YEAR_MAX: u32 = 2040;
pub const GATEWAY_ID_MAX_LEN: usize = 64;
pub const EXTERNAL_ID_MAX_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .map(|ch| if ch.is_whitespace() { ' ' } else { ch })
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

fn validate_digits(field: &'static str, value: &str, min_len: usize, max_len: usize) -> ValidationResult {
    if value.len() < min_len || value.len() > max_len || !value.chars().all(|ch| ch.is_ascii_digit()) {
        let expected = if min_len == max_len {
            format!("{}", min_len)
        } else {
            format!("{}-{}", min_len, max_len)
        };
        return Err(ValidationError::new(field, format!("must be {} digits", expected)));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_currency(currency: &str) -> ValidationResult {
    validate_required("currency", currency)?;

    if currency.len() != CURRENCY_CODE_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "currency",
            "must be a three-letter uppercase currency code",
        ));
    }

    Ok(())
}

pub fn validate_money(money: &Money) -> ValidationResult {
    validate_positive_amount(&money.amount)?;
    validate_currency(&money.currency)
}

/// Mod 10 checksum used by all major card schemes.
pub fn luhn_valid(number: &str) -> bool {
    let mut sum = 0;
    for (i, ch) in number.chars().rev().enumerate() {
        let Some(mut digit) = ch.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }

    sum % 10 == 0
}

pub fn validate_card_number(number: &str) -> ValidationResult {
    validate_digits("card_number", number, CARD_NUMBER_MIN_LEN, CARD_NUMBER_MAX_LEN)?;

    if !luhn_valid(number) {
        return Err(ValidationError::new("card_number", "failed checksum"));
    }

    Ok(())
}

pub fn validate_expiry(month: u32, year: u32) -> ValidationResult {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::new("expiry_month", "must be between 1 and 12"));
    }

    if !(EXPIRY_YEAR_MIN..=EXPIRY_YEAR_MAX).contains(&year) {
        return Err(ValidationError::new(
            "expiry_year",
            format!("must be between {} and {}", EXPIRY_YEAR_MIN, EXPIRY_YEAR_MAX),
        ));
    }

    Ok(())
}

pub fn validate_card(card: &CardDetails) -> ValidationResult {
    let name = sanitize_string(&card.name);
    validate_required("card_name", &name)?;
    validate_max_len("card_name", &name, CARD_NAME_MAX_LEN)?;
    validate_card_number(&card.number)?;
    validate_expiry(card.expiry_month, card.expiry_year)?;
    validate_digits("cvv", &card.cvv, 3, 4)
}

pub fn validate_base_request(request: &BaseRequest) -> ValidationResult {
    validate_money(&request.amount)?;
    validate_card(&request.card_details)?;

    let gateway_id = sanitize_string(&request.gateway_details.id);
    validate_required("gateway_id", &gateway_id)?;
    validate_max_len("gateway_id", &gateway_id, GATEWAY_ID_MAX_LEN)
}

pub fn validate_status_update(update: &TransactionStatusUpdate) -> ValidationResult {
    validate_required("transaction_id", &update.transaction_id)?;
    validate_max_len("transaction_id", &update.transaction_id, EXTERNAL_ID_MAX_LEN)
}
