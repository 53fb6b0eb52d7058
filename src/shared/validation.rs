//! Validation Utilities

use validator::{Validate, ValidationErrors};

use super::error::AppError;

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: invalid value", field),
            })
        })
        .collect();
    messages.sort();

    if messages.is_empty() {
        AppError::Validation("Validation failed".into())
    } else {
        AppError::Validation(messages.join("; "))
    }
}

/// Validate a request body, mapping failures to `AppError::Validation`.
pub fn validate<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(validation_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 3, message = "too short"))]
        name: String,
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = validate(&Probe { name: "ab".into() }).unwrap_err();
        match err {
            AppError::Validation(msg) => assert_eq!(msg, "name: too short"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
