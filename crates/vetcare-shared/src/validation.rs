//! Field-level input checks shared by every write path.
//!
//! Text helpers trim their input and count characters, not bytes.

use chrono::NaiveDate;

use crate::constants::{MAX_PET_WEIGHT_KG, MIN_PASSWORD_LEN};
use crate::error::ValidationError;

/// Trimmed, non-empty, at most `max` characters.
pub fn required_text(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required { field });
    }
    check_len(field, value, max)?;
    Ok(value.to_string())
}

/// Like [`required_text`], but blank input becomes `None`.
pub fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => {
            check_len(field, v, max)?;
            Ok(Some(v.to_string()))
        }
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

/// Lower-cased, trimmed `local@domain.tld`.
pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::Required { field: "email" });
    }

    let malformed = ValidationError::Malformed { field: "email" };
    let (local, domain) = email.split_once('@').ok_or(malformed.clone())?;

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'));
    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|l| {
            !l.is_empty() && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        && labels.last().map_or(false, |tld| {
            tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        });

    if local_ok && domain_ok {
        Ok(email)
    } else {
        Err(malformed)
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password",
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Digits, spaces and `+-()`, with at least one digit.
pub fn validate_phone(phone: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(phone) = phone.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    if !allowed || !phone.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::Malformed { field: "phone" });
    }
    Ok(Some(phone.to_string()))
}

pub fn validate_weight(weight_kg: Option<f64>) -> Result<(), ValidationError> {
    match weight_kg {
        Some(w) if !w.is_finite() || w < 0.0 || w > MAX_PET_WEIGHT_KG => {
            Err(ValidationError::OutOfRange {
                field: "weight_kg",
                detail: format!("must be between 0 and {MAX_PET_WEIGHT_KG}"),
            })
        }
        _ => Ok(()),
    }
}

pub fn validate_birth_date(date: Option<NaiveDate>, today: NaiveDate) -> Result<(), ValidationError> {
    match date {
        Some(d) if d > today => Err(ValidationError::OutOfRange {
            field: "date_of_birth",
            detail: "cannot be in the future".into(),
        }),
        _ => Ok(()),
    }
}

pub fn validate_price(price: Option<f64>) -> Result<(), ValidationError> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(ValidationError::OutOfRange {
            field: "price",
            detail: "must be a positive number".into(),
        }),
        _ => Ok(()),
    }
}

/// Whole years between `birth` and `today`.
pub fn age_in_years(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    today.years_since(birth)
}
