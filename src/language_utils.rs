use anyhow::{Result, anyhow};
use isolang::Language;
use once_cell::sync::Lazy;
use regex::Regex;

/// Locale utilities for translation targets
///
/// Locales are an ISO 639-1 (or 639-3) language code optionally followed by a
/// region or script subtag: `en`, `ko`, `zh-CN`, `pt_BR`, `zh-Hant`.
/// Canonical form lowercases the language, uppercases a region and
/// title-cases a script, joined with `-`.
static LOCALE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{2,3})(?:[-_]([A-Za-z]{2}|[0-9]{3}|[A-Za-z]{4}))?$")
        .expect("locale pattern is valid")
});

/// Resolve the language part of a code to an isolang language
fn lookup_language(code: &str) -> Option<Language> {
    match code.len() {
        2 => Language::from_639_1(code),
        3 => Language::from_639_3(code),
        _ => None,
    }
}

/// Validate a locale code and return its canonical form
pub fn normalize_locale(code: &str) -> Result<String> {
    let trimmed = code.trim();
    let captures = LOCALE_PATTERN
        .captures(trimmed)
        .ok_or_else(|| anyhow!("Invalid locale code: {}", code))?;

    let language = captures[1].to_lowercase();
    if lookup_language(&language).is_none() {
        return Err(anyhow!("Unknown language in locale: {}", code));
    }

    match captures.get(2) {
        None => Ok(language),
        Some(subtag) => {
            let subtag = subtag.as_str();
            let subtag = if subtag.len() == 4 {
                // Script subtag, e.g. Hant
                let mut chars = subtag.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            } else {
                subtag.to_uppercase()
            };
            Ok(format!("{}-{}", language, subtag))
        }
    }
}

/// Language part of a locale (`zh-CN` -> `zh`)
pub fn locale_language(locale: &str) -> &str {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
}

/// Check whether two locale codes name the same locale
pub fn locales_match(a: &str, b: &str) -> bool {
    match (normalize_locale(a), normalize_locale(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get a human readable name for a locale, used in prompts
pub fn get_locale_name(locale: &str) -> Result<String> {
    let canonical = normalize_locale(locale)?;
    let language = lookup_language(locale_language(&canonical))
        .ok_or_else(|| anyhow!("Failed to get language from locale: {}", locale))?;

    match canonical.split_once('-') {
        Some((_, region)) => Ok(format!("{} ({})", language.to_name(), region)),
        None => Ok(language.to_name().to_string()),
    }
}

/// Normalize a list of target locales for an event.
///
/// Order is preserved, duplicates are dropped and the source locale is
/// removed (content never needs translating into its own language).
pub fn normalize_target_locales(targets: &[String], source_locale: &str) -> Result<Vec<String>> {
    let source = normalize_locale(source_locale)?;
    let mut result: Vec<String> = Vec::with_capacity(targets.len());

    for target in targets {
        let canonical = normalize_locale(target)?;
        if canonical != source && !result.contains(&canonical) {
            result.push(canonical);
        }
    }

    Ok(result)
}
