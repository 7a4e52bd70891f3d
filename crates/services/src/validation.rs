//! Request validation: runs `validator` rules and converts the failures
//! into [`AppError::InvalidFields`] with dotted field paths.

use std::borrow::Cow;

use domains::models::is_grade_level;
use domains::{AppError, FieldError, Result};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

pub fn validate_input<T: Validate>(input: &T) -> Result<()> {
    input.validate().map_err(into_app_error)
}

pub fn into_app_error(errors: ValidationErrors) -> AppError {
    let mut out = Vec::new();
    flatten("", &errors, &mut out);
    out.sort_by(|a, b| a.field.cmp(&b.field));
    AppError::InvalidFields(out)
}

fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                out.extend(list.iter().map(|e| FieldError::new(path.clone(), message_for(e))));
            }
            ValidationErrorsKind::Struct(inner) => flatten(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    flatten(&format!("{path}[{idx}]"), inner, out);
                }
            }
        }
    }
}

fn message_for(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => match error.code.as_ref() {
            "email" => "Valid email required".to_string(),
            "length" => "Invalid length".to_string(),
            "range" => "Value out of range".to_string(),
            "required" => "Field is required".to_string(),
            other => format!("Invalid value ({other})"),
        },
    }
}

fn failure(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Optional leading `+`, a non-zero digit, then up to 15 more digits.
pub fn phone(value: &str) -> std::result::Result<(), ValidationError> {
    let digits = value.strip_prefix('+').unwrap_or(value);
    let mut chars = digits.chars();
    let valid = matches!(chars.next(), Some('1'..='9'))
        && digits.len() <= 16
        && chars.all(|c| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(failure("phone", "Valid phone number required"))
    }
}

pub fn grade_level(value: &str) -> std::result::Result<(), ValidationError> {
    if is_grade_level(value) {
        Ok(())
    } else {
        Err(failure("grade", "Grade must be between 1 and 12"))
    }
}

pub fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(failure("required", "Field is required"))
    } else {
        Ok(())
    }
}

/// `HH:MM`, 24-hour clock.
pub fn time_of_day(value: &str) -> std::result::Result<(), ValidationError> {
    let ok = chrono::NaiveTime::parse_from_str(value, "%H:%M").is_ok() && value.len() == 5;
    if ok {
        Ok(())
    } else {
        Err(failure("time", "Time must be HH:MM"))
    }
}

pub fn accepted(value: &bool) -> std::result::Result<(), ValidationError> {
    if *value {
        Ok(())
    } else {
        Err(failure("terms", "Terms and conditions must be accepted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Address {
        #[validate(length(min = 5, message = "Street address required"))]
        street: String,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Form {
        #[validate(length(min = 2, max = 50))]
        name: String,
        #[validate(custom(function = "phone"))]
        phone: String,
        #[validate(nested)]
        address: Address,
    }

    #[test]
    fn phone_rules() {
        assert!(phone("+15551234567").is_ok());
        assert!(phone("5551234").is_ok());
        assert!(phone("0551234").is_err());
        assert!(phone("+1-555-1234").is_err());
        assert!(phone("12345678901234567").is_err());
    }

    #[test]
    fn times_and_grades() {
        assert!(time_of_day("08:30").is_ok());
        assert!(time_of_day("8:30").is_err());
        assert!(time_of_day("25:00").is_err());
        assert!(grade_level("1").is_ok());
        assert!(grade_level("0").is_err());
    }

    #[test]
    fn nested_errors_get_dotted_paths() {
        let form = Form {
            name: "A".into(),
            phone: "abc".into(),
            address: Address {
                street: "x".into(),
            },
        };
        let AppError::InvalidFields(fields) = validate_input(&form).unwrap_err() else {
            panic!("expected field errors");
        };
        let paths: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(paths, vec!["address.street", "name", "phone"]);
        assert_eq!(fields[0].message, "Street address required");
    }
}
