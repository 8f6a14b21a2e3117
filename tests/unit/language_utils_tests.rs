/*!
 * Tests for language utility functions
 */

use dubtrack::language_utils::{get_language_name, normalize_for_pipeline, validate_language_code};

/// Test validation of language codes
#[test]
fn test_validateLanguageCode_withValidCodes_shouldAccept() {
    // ISO 639-1 tests
    assert!(validate_language_code("en").is_ok());
    assert!(validate_language_code("fr").is_ok());
    assert!(validate_language_code("de").is_ok());

    // ISO 639-2/T tests
    assert!(validate_language_code("eng").is_ok());
    assert!(validate_language_code("fra").is_ok());
    assert!(validate_language_code("deu").is_ok());

    // ISO 639-2/B tests
    assert!(validate_language_code("fre").is_ok());
    assert!(validate_language_code("ger").is_ok());
    assert!(validate_language_code("dut").is_ok());

    // Whitespace and case tests
    assert!(validate_language_code(" EN ").is_ok());
    assert!(validate_language_code("ENG").is_ok());
}

/// Test rejection of malformed codes
#[test]
fn test_validateLanguageCode_withInvalidCodes_shouldReject() {
    assert!(validate_language_code("xyz").is_err());
    assert!(validate_language_code("123").is_err());
    assert!(validate_language_code("e").is_err());
    assert!(validate_language_code("english").is_err());
    assert!(validate_language_code("").is_err());
}

/// Test normalization to the codes the pipeline expects
#[test]
fn test_normalizeForPipeline_withValidCodes_shouldPreferPart1() {
    assert_eq!(normalize_for_pipeline("en").unwrap(), "en");
    assert_eq!(normalize_for_pipeline("eng").unwrap(), "en");
    assert_eq!(normalize_for_pipeline("fra").unwrap(), "fr");
    assert_eq!(normalize_for_pipeline("fre").unwrap(), "fr");
    assert_eq!(normalize_for_pipeline("ger").unwrap(), "de");

    // Case insensitivity
    assert_eq!(normalize_for_pipeline("EN").unwrap(), "en");
    assert_eq!(normalize_for_pipeline("FRE").unwrap(), "fr");

    // Whitespace
    assert_eq!(normalize_for_pipeline(" en ").unwrap(), "en");
}

/// Test that normalization fails loudly on unknown codes
#[test]
fn test_normalizeForPipeline_withInvalidCode_shouldError() {
    let error = normalize_for_pipeline("zz").unwrap_err();
    assert!(error.to_string().contains("zz"));
}

/// Test English name lookup used by config validation
#[test]
fn test_getLanguageName_withKnownCodes_shouldReturnEnglishNames() {
    assert_eq!(get_language_name("en").unwrap(), "English");
    assert_eq!(get_language_name("fr").unwrap(), "French");
    assert_eq!(get_language_name("deu").unwrap(), "German");
    assert_eq!(get_language_name("dut").unwrap(), "Dutch");
    assert!(get_language_name("qqq").is_err());
}
