//! Mapping handler errors onto wire codes.

use crate::error::{BusinessError, ErrorCode};

/// The caller-facing outcome of an error, plus what to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Wire code.
    pub code: i32,
    /// Caller-facing message.
    pub message: String,
    /// Caller-facing hint.
    pub hint: String,
    /// Internal detail for the log. Never sent to the caller.
    pub diagnostic: Option<String>,
}

impl Translation {
    /// The success translation: code 0, empty message and hint.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            code: 0,
            message: String::new(),
            hint: String::new(),
            diagnostic: None,
        }
    }

    /// Returns `true` if this is an adapter-level system failure rather than
    /// a business error or success.
    #[must_use]
    pub fn is_system(&self) -> bool {
        ErrorCode::from_code(self.code).is_some() && self.diagnostic.is_some()
    }
}

/// Classifies handler errors.
///
/// A [`BusinessError`] anywhere in the error's chain passes through
/// unchanged, unless it carries code 0, which is reserved for success.
/// Anything else becomes [`ErrorCode::System`] with a generic message; the
/// original text is kept only as the diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTranslator;

impl ErrorTranslator {
    /// Translates an optional handler error.
    #[must_use]
    pub fn translate(error: Option<&anyhow::Error>) -> Translation {
        let Some(error) = error else {
            return Translation::ok();
        };

        match error.downcast_ref::<BusinessError>() {
            // Zero is the success code; a failure must never read as one.
            Some(business) if business.code == 0 => Self::internal(
                ErrorCode::System,
                format!("business error declared success code 0: {business}"),
            ),
            Some(business) => Translation {
                code: business.code,
                message: business.message.clone(),
                hint: business.hint.clone(),
                diagnostic: None,
            },
            None => Self::internal(ErrorCode::System, format!("{error:#}")),
        }
    }

    /// Builds the translation for a failure raised by the adapter itself.
    #[must_use]
    pub fn internal(code: ErrorCode, diagnostic: impl Into<String>) -> Translation {
        Translation {
            code: code.code(),
            message: code.message().to_string(),
            hint: String::new(),
            diagnostic: Some(diagnostic.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_absent_error_is_success() {
        assert_eq!(ErrorTranslator::translate(None), Translation::ok());
    }

    #[test]
    fn test_business_error_passes_through() {
        let err = anyhow::Error::from(BusinessError::new(42, "quota exceeded").with_hint("retry later"));
        let t = ErrorTranslator::translate(Some(&err));
        assert_eq!(t.code, 42);
        assert_eq!(t.message, "quota exceeded");
        assert_eq!(t.hint, "retry later");
        assert_eq!(t.diagnostic, None);
        assert!(!t.is_system());
    }

    #[test]
    fn test_business_error_code_in_reserved_range_stays_business() {
        let err = anyhow::Error::from(BusinessError::new(-1, "looks reserved"));
        let t = ErrorTranslator::translate(Some(&err));
        assert_eq!(t.code, -1);
        assert_eq!(t.message, "looks reserved");
        assert!(!t.is_system());
    }

    #[test]
    fn test_business_error_with_success_code_is_system() {
        let err = anyhow::Error::from(BusinessError::new(0, "not really fine"));
        let t = ErrorTranslator::translate(Some(&err));
        assert_eq!(t.code, ErrorCode::System.code());
        assert_eq!(t.message, "internal system error");
        assert!(t.is_system());
        assert!(t.diagnostic.as_deref().unwrap().contains("not really fine"));
    }

    #[test]
    fn test_business_error_under_context() {
        let result: anyhow::Result<()> =
            Err(BusinessError::new(9, "nope").into());
        let err = result.context("loading account").unwrap_err();
        let t = ErrorTranslator::translate(Some(&err));
        assert_eq!(t.code, 9);
        assert_eq!(t.message, "nope");
    }

    #[test]
    fn test_opaque_error_is_system() {
        let err = anyhow!("connection refused to db-primary:5432");
        let t = ErrorTranslator::translate(Some(&err));
        assert_eq!(t.code, ErrorCode::System.code());
        assert_eq!(t.message, "internal system error");
        assert!(t.hint.is_empty());
        assert!(!t.message.contains("db-primary"));
        assert!(t.diagnostic.as_deref().unwrap().contains("db-primary"));
        assert!(t.is_system());
    }

    #[test]
    fn test_internal() {
        let t = ErrorTranslator::internal(ErrorCode::PanicInHandler, "boom");
        assert_eq!(t.code, -2004);
        assert_eq!(t.message, ErrorCode::PanicInHandler.message());
        assert_eq!(t.diagnostic.as_deref(), Some("boom"));
    }
}
