use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

pub const NAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const BODY_WEIGHT_MAX_KG: f64 = 500.0;
pub const PORTION_MAX_GRAMS: f64 = 100_000.0;
pub const HEIGHT_MAX_CM: i32 = 300;

/// A single malformed or out-of-range field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
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

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[\p{L}\s0-9]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.\-]{3,32}$").unwrap();
}

/// Product and category names: letters of any script, whitespace and digits.
pub fn validate_name(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::new(field, "must not be blank"));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(ValidationError::new(
            field,
            format!("must be at most {NAME_MAX_LEN} characters"),
        ));
    }
    if !NAME_RE.is_match(name) {
        return Err(ValidationError::new(
            field,
            "may contain only letters, spaces and digits",
        ));
    }
    Ok(name.to_string())
}

pub fn validate_username(raw: &str) -> Result<String, ValidationError> {
    let username = raw.trim();
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::new(
            "username",
            "must be 3-32 characters of letters, digits, '_', '.' or '-'",
        ));
    }
    Ok(username.to_string())
}

pub fn validate_password(raw: &str) -> Result<(), ValidationError> {
    if raw.chars().count() < PASSWORD_MIN_LEN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {PASSWORD_MIN_LEN} characters"),
        ));
    }
    Ok(())
}

/// Logged portion weight in grams, at most 100 kg.
pub fn validate_portion(field: &'static str, grams: f64) -> Result<f64, ValidationError> {
    if !grams.is_finite() || grams <= 0.0 || grams > PORTION_MAX_GRAMS {
        return Err(ValidationError::new(
            field,
            format!("must be within (0, {PORTION_MAX_GRAMS}] grams"),
        ));
    }
    Ok(grams)
}

/// Body weight in kilograms, kept to one decimal place. The range applies to
/// the rounded value.
pub fn validate_body_weight(kg: f64) -> Result<f64, ValidationError> {
    let rounded = (kg * 10.0).round() / 10.0;
    if !rounded.is_finite() || rounded <= 0.0 || rounded > BODY_WEIGHT_MAX_KG {
        return Err(ValidationError::new(
            "weight",
            format!("must be within (0, {BODY_WEIGHT_MAX_KG}] kg"),
        ));
    }
    Ok(rounded)
}

pub fn validate_height(cm: i32) -> Result<i32, ValidationError> {
    if cm <= 0 || cm > HEIGHT_MAX_CM {
        return Err(ValidationError::new(
            "height",
            format!("must be within (0, {HEIGHT_MAX_CM}] cm"),
        ));
    }
    Ok(cm)
}
