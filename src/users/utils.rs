use crate::types::ValidationError;
use regex::Regex;

pub const USERNAME_MAX_LEN: usize = 150;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).unwrap()
    };
    static ref USERNAME_RE: Regex = Regex::new(r"\A[\w.@+-]+\z").unwrap();
}

/// Empty addresses are accepted, the field is optional.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if !email.is_empty() && !EMAIL_RE.is_match(&email.to_lowercase()) {
        Err(ValidationError::from(
            "email",
            format!("Invalid email: {}", email),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        Err(ValidationError::from("username", "This field is required"))
    } else if username.chars().count() > USERNAME_MAX_LEN {
        Err(ValidationError::from(
            "username",
            format!("Username is longer than {} characters", USERNAME_MAX_LEN),
        ))
    } else if !USERNAME_RE.is_match(username) {
        Err(ValidationError::from(
            "username",
            "Username may only contain letters, digits and @/./+/-/_",
        ))
    } else {
        Ok(())
    }
}

pub fn validate_password(password: &str, password_check: &str) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    if password.is_empty() {
        errors.add_error("password", "This field is required");
    }
    if password_check.is_empty() {
        errors.add_error("password_check", "This field is required");
    } else if password != password_check {
        errors.add_error("password_check", "Passwords do not match");
    }
    errors.into_result(())
}
