use std::sync::LazyLock;

use regex::Regex;

use super::ApiError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

pub fn validate_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.len() < 2 {
        return Err(ApiError::validation(
            "Name must be at least 2 characters long",
        ));
    }
    if trimmed.len() > 100 {
        return Err(ApiError::validation("Name must be 100 characters or less"));
    }
    Ok(trimmed)
}

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let trimmed = email.trim();
    if !EMAIL_RE.is_match(trimmed) {
        return Err(ApiError::validation("Invalid email address"));
    }
    Ok(trimmed)
}

pub fn validate_password(password: &str, min_len: usize) -> Result<&str, ApiError> {
    if password.len() < min_len {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters long",
            min_len
        )));
    }
    Ok(password)
}

pub fn validate_title(title: &str) -> Result<&str, ApiError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Title cannot be empty"));
    }
    if trimmed.len() > 200 {
        return Err(ApiError::validation("Title must be 200 characters or less"));
    }
    Ok(trimmed)
}

pub fn validate_promo_code(code: &str) -> Result<&str, ApiError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Promo code cannot be empty"));
    }
    if trimmed.len() > 50 {
        return Err(ApiError::validation(
            "Promo code must be 50 characters or less",
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::validation(
            "Promo code can only contain letters, numbers, hyphens, and underscores",
        ));
    }
    Ok(trimmed)
}

pub fn validate_progress(progress: i32) -> Result<i32, ApiError> {
    if !(0..=100).contains(&progress) {
        return Err(ApiError::validation(format!(
            "Invalid progress: {}. Progress must be between 0 and 100",
            progress
        )));
    }
    Ok(progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id(1).is_ok());
        assert!(validate_id(12345).is_ok());
        assert!(validate_id(0).is_err());
        assert!(validate_id(-1).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Jo").is_ok());
        assert!(validate_name("  Maria  ").is_ok());
        assert!(validate_name("A").is_err());
        assert!(validate_name("  ").is_err());
        assert!(validate_name("a".repeat(101).as_str()).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("  user@example.com  ").is_ok());
        assert!(validate_email("user@example").is_err());
        assert!(validate_email("not an email").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret", 6).is_ok());
        assert!(validate_password("short", 6).is_err());
    }

    #[test]
    fn test_validate_promo_code() {
        assert!(validate_promo_code("SUMMER-2026").is_ok());
        assert!(validate_promo_code("free_access").is_ok());
        assert!(validate_promo_code("").is_err());
        assert!(validate_promo_code("bad code").is_err());
        assert!(validate_promo_code("a".repeat(51).as_str()).is_err());
    }

    #[test]
    fn test_validate_progress() {
        assert!(validate_progress(0).is_ok());
        assert!(validate_progress(100).is_ok());
        assert!(validate_progress(-1).is_err());
        assert!(validate_progress(101).is_err());
    }
}
