use std::time::Duration;

use crate::config::parse_duration_value;
use crate::error::ValidationError;

/// Splits `Key: Value` into a trimmed pair.
///
/// # Errors
///
/// Returns an error when the input has no `:`.
pub fn parse_header(s: &str) -> Result<(String, String), ValidationError> {
    match s.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(ValidationError::InvalidHeaderFormat {
            value: s.to_owned(),
        }),
    }
}

/// # Errors
///
/// Returns an error when the value is not a valid duration.
pub fn parse_duration_arg(s: &str) -> Result<Duration, ValidationError> {
    parse_duration_value(s)
}

/// # Errors
///
/// Returns an error when the value is not an integer >= 1.
pub fn parse_positive_usize(s: &str) -> Result<usize, ValidationError> {
    let value: usize = s
        .trim()
        .parse()
        .map_err(|err| ValidationError::InvalidNumber { source: err })?;
    if value == 0 {
        return Err(ValidationError::ValueTooSmall { min: 1 });
    }
    Ok(value)
}
