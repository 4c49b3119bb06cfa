use crate::error::{AppError, Result};

/// Validates a display name.
pub fn validate_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name cannot be empty".to_string()));
    }

    if name.chars().count() > 100 {
        return Err(AppError::Validation("Name is too long".to_string()));
    }

    Ok(())
}

/// Validates an email address. Only the shape `local@domain` is checked.
pub fn validate_email(email: &str) -> Result<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace) => Ok(()),
        _ => Err(AppError::Validation("Wrong email input".to_string())),
    }
}

/// Validates a password.
///
/// # Arguments
///
/// * `password` - The password to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the password is valid.
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validates the profession a CV is stored under.
pub fn validate_profession(profession: &str) -> Result<()> {
    let profession = profession.trim();
    if profession.is_empty() {
        return Err(AppError::Validation("Profession cannot be empty".to_string()));
    }

    if profession.len() > 100 {
        return Err(AppError::Validation("Profession is too long".to_string()));
    }

    if profession.chars().any(char::is_control) {
        return Err(AppError::Validation(
            "Profession cannot contain control characters".to_string(),
        ));
    }

    Ok(())
}
