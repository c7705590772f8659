//! Validation Utilities

use validator::{Validate, ValidationErrors};

use super::error::SyncError;

/// Convert validation errors to SyncError
pub fn validation_error(errors: ValidationErrors) -> SyncError {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let detail = e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, detail)
            })
        })
        .next()
        .unwrap_or_else(|| "Validation failed".into());

    SyncError::Validation(message)
}

/// Validate a payload, mapping failures into SyncError
pub fn validate<T: Validate>(value: &T) -> Result<(), SyncError> {
    value.validate().map_err(validation_error)
}
