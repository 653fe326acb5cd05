use std::fmt;

/// Closed error taxonomy shared by every layer. The server translates each
/// kind to exactly one HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("field '{field}' must be between {min} and {max} characters, got {len}")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
        len: usize,
    },

    #[error("field '{0}' is required")]
    Required(&'static str),

    #[error("duplicate stat '{name}' in {phase}")]
    DuplicateStat { phase: &'static str, name: String },

    #[error("stat '{name}' in {phase}: {reason}")]
    InvalidStat {
        phase: &'static str,
        name: String,
        reason: &'static str,
    },

    #[error("schema must describe at least one stat")]
    EmptySchema,

    #[error("team '{0}' appears more than once in the match")]
    DuplicateTeam(String),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

pub(crate) fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::Length {
            field,
            min,
            max,
            len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_length_counts_chars_not_bytes() {
        assert!(check_length("username", "ñañañaña", 4, 8).is_ok());
    }

    #[test]
    fn check_length_reports_bounds() {
        let err = check_length("username", "abc", 4, 32).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Length {
                field: "username",
                min: 4,
                max: 32,
                len: 3
            }
        );
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn kind_strings_are_stable() {
        assert_eq!(ErrorKind::Unauthenticated.as_str(), "unauthenticated");
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
    }
}
