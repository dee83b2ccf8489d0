//! Request field validation shared by the API handlers.

use thiserror::Error;

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 255;
const MAX_FILENAME_LEN: usize = 255;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("name must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters")]
    BadNameLength,
    #[error("name contains forbidden characters")]
    ForbiddenNameChars,
    #[error("name must contain at least one letter or digit")]
    NameWithoutContent,
    #[error("filename is missing")]
    MissingFilename,
    #[error("invalid filename")]
    InvalidFilename,
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("username is too long")]
    UsernameTooLong,
    #[error("password must not be empty")]
    EmptyPassword,
}

/// Validate and normalize a person name: trimmed, bounded length, no shell- or
/// path-hostile characters, at least one alphanumeric.
pub fn person_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() < MIN_NAME_LEN || name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::BadNameLength);
    }
    if name.chars().any(|c| matches!(c, '<' | '>' | '"' | '/' | '\\' | '|' | '?' | '*')) {
        return Err(ValidationError::ForbiddenNameChars);
    }
    if !name.chars().any(|c| c.is_alphanumeric()) {
        return Err(ValidationError::NameWithoutContent);
    }
    Ok(name.to_string())
}

/// Validate an uploaded filename: present, bounded, no path separators or
/// reserved characters.
pub fn upload_filename(raw: Option<&str>) -> Result<&str, ValidationError> {
    let filename = raw.ok_or(ValidationError::MissingFilename)?;
    if filename.trim().is_empty() {
        return Err(ValidationError::MissingFilename);
    }
    if filename.chars().count() > MAX_FILENAME_LEN {
        return Err(ValidationError::InvalidFilename);
    }
    if filename
        .chars()
        .any(|c| matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
    {
        return Err(ValidationError::InvalidFilename);
    }
    Ok(filename)
}

pub fn username(raw: &str) -> Result<String, ValidationError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(ValidationError::EmptyUsername);
    }
    if username.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::UsernameTooLong);
    }
    Ok(username.to_string())
}

pub fn password(raw: &str) -> Result<&str, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyPassword);
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_name_trims_and_accepts() {
        assert_eq!(person_name("  Ada Lovelace ").unwrap(), "Ada Lovelace");
    }

    #[test]
    fn person_name_rejects_short_and_empty() {
        assert_eq!(person_name("   ").unwrap_err(), ValidationError::EmptyName);
        assert_eq!(person_name("A").unwrap_err(), ValidationError::BadNameLength);
    }

    #[test]
    fn person_name_rejects_forbidden_characters() {
        assert_eq!(
            person_name("Ada/Lovelace").unwrap_err(),
            ValidationError::ForbiddenNameChars
        );
        assert_eq!(
            person_name("<script>").unwrap_err(),
            ValidationError::ForbiddenNameChars
        );
    }

    #[test]
    fn person_name_requires_alphanumeric() {
        assert_eq!(
            person_name("-- --").unwrap_err(),
            ValidationError::NameWithoutContent
        );
    }

    #[test]
    fn upload_filename_rejects_path_components() {
        assert_eq!(
            upload_filename(Some("../../etc/passwd")).unwrap_err(),
            ValidationError::InvalidFilename
        );
        assert_eq!(
            upload_filename(None).unwrap_err(),
            ValidationError::MissingFilename
        );
        assert_eq!(upload_filename(Some("face.jpg")).unwrap(), "face.jpg");
    }

    #[test]
    fn username_and_password_rules() {
        assert_eq!(username("  admin ").unwrap(), "admin");
        assert_eq!(username(" ").unwrap_err(), ValidationError::EmptyUsername);
        assert_eq!(password("").unwrap_err(), ValidationError::EmptyPassword);
        assert_eq!(password("secret").unwrap(), "secret");
    }
}
