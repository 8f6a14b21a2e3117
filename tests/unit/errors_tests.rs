/*!
 * Tests for error types and conversions
 */

use dubtrack::errors::{ApiError, AppError, PersistenceError, ValidationError};

#[test]
fn test_validationError_tooManyItems_shouldDisplayCountAndLimit() {
    let error = ValidationError::TooManyItems {
        count: 101,
        max: 100,
    };
    let display = format!("{}", error);
    assert!(display.contains("101"));
    assert!(display.contains("100"));
}

#[test]
fn test_validationError_invalidUrl_shouldDisplayOffendingLine() {
    let error = ValidationError::InvalidUrl("not a url".to_string());
    let display = format!("{}", error);
    assert!(display.contains("Not a valid URL"));
    assert!(display.contains("not a url"));
}

#[test]
fn test_apiError_server_shouldDisplayStatusAndMessage() {
    let error = ApiError::Server {
        status_code: 503,
        message: "pipeline overloaded".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("503"));
    assert!(display.contains("pipeline overloaded"));
}

#[test]
fn test_apiError_transport_shouldDisplayCorrectly() {
    let error = ApiError::Transport("connection refused".to_string());
    let display = format!("{}", error);
    assert!(display.contains("transport failed"));
    assert!(display.contains("connection refused"));
}

#[test]
fn test_persistenceError_isQuota_shouldOnlyMatchQuotaVariant() {
    assert!(PersistenceError::QuotaExceeded("disk full".to_string()).is_quota());
    assert!(!PersistenceError::Io("permission denied".to_string()).is_quota());
    assert!(!PersistenceError::Serialize("bad record".to_string()).is_quota());
}

#[test]
fn test_appError_fromValidationError_shouldWrapAndDisplay() {
    let app_error: AppError = ValidationError::EmptyBatch.into();
    let display = format!("{}", app_error);
    assert!(display.contains("Validation error"));
    assert!(display.contains("no items"));
}

#[test]
fn test_appError_fromApiError_shouldWrapAndDisplay() {
    let app_error: AppError = ApiError::Parse("unexpected field".to_string()).into();
    let display = format!("{}", app_error);
    assert!(display.contains("Pipeline error"));
    assert!(display.contains("unexpected field"));
}

#[test]
fn test_appError_submissionInFlight_shouldDisplayCorrectly() {
    let display = format!("{}", AppError::SubmissionInFlight);
    assert!(display.contains("already in flight"));
}

#[test]
fn test_appError_fromIoError_shouldBecomeFileError() {
    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let app_error: AppError = io_error.into();
    assert!(matches!(app_error, AppError::File(_)));
}
