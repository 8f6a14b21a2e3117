use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// The pipeline accepts ISO 639-1 (2-letter) codes and falls back to
/// ISO 639-2 (3-letter) codes for languages without a 2-letter form.
/// ISO 639-2/B codes that differ from their 639-2/T equivalents
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("fre", "fra"), // French
    ("ger", "deu"), // German
    ("dut", "nld"), // Dutch
    ("gre", "ell"), // Greek
    ("chi", "zho"), // Chinese
    ("cze", "ces"), // Czech
    ("ice", "isl"), // Icelandic
    ("alb", "sqi"), // Albanian
    ("arm", "hye"), // Armenian
    ("baq", "eus"), // Basque
    ("bur", "mya"), // Burmese
    ("per", "fas"), // Persian
    ("geo", "kat"), // Georgian
    ("may", "msa"), // Malay
    ("mac", "mkd"), // Macedonian
    ("rum", "ron"), // Romanian
    ("slo", "slk"), // Slovak
    ("wel", "cym"), // Welsh
];

fn resolve(code: &str) -> Option<Language> {
    let normalized = code.trim().to_lowercase();
    match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => Language::from_639_3(&normalized).or_else(|| {
            PART2B_TO_PART2T
                .iter()
                .find(|(part2b, _)| *part2b == normalized)
                .and_then(|(_, part2t)| Language::from_639_3(part2t))
        }),
        _ => None,
    }
}

/// Validate that a code is a known ISO 639-1 or ISO 639-2 language code
pub fn validate_language_code(code: &str) -> Result<()> {
    resolve(code)
        .map(|_| ())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Normalize a language code to the form the pipeline expects: ISO 639-1
/// where one exists, ISO 639-2/T otherwise
pub fn normalize_for_pipeline(code: &str) -> Result<String> {
    let lang =
        resolve(code).ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))?;
    Ok(lang
        .to_639_1()
        .map(str::to_string)
        .unwrap_or_else(|| lang.to_639_3().to_string()))
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let lang = resolve(code).ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;
    Ok(lang.to_name().to_string())
}
