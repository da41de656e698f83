/*!
 * Tests for locale utilities
 */

use cookloc::language_utils::{
    get_locale_name, locale_language, locales_match, normalize_locale, normalize_target_locales,
};

#[test]
fn test_normalizeLocale_withCommonCodes_shouldCanonicalize() {
    assert_eq!(normalize_locale("ko").unwrap(), "ko");
    assert_eq!(normalize_locale("JA").unwrap(), "ja");
    assert_eq!(normalize_locale("pt_br").unwrap(), "pt-BR");
    assert_eq!(normalize_locale("zh-TW").unwrap(), "zh-TW");
    assert_eq!(normalize_locale("es-419").unwrap(), "es-419");
}

#[test]
fn test_normalizeLocale_withThreeLetterCode_shouldAccept() {
    assert_eq!(normalize_locale("kor").unwrap(), "kor");
}

#[test]
fn test_normalizeLocale_withUnknownLanguage_shouldFail() {
    let err = normalize_locale("qq").unwrap_err();
    assert!(err.to_string().contains("qq"));
}

#[test]
fn test_localeLanguage_shouldStripRegion() {
    assert_eq!(locale_language("zh-CN"), "zh");
    assert_eq!(locale_language("pt_BR"), "pt");
    assert_eq!(locale_language("en"), "en");
}

#[test]
fn test_localesMatch_shouldIgnoreCaseAndSeparator() {
    assert!(locales_match("pt_br", "PT-BR"));
    assert!(!locales_match("pt-BR", "pt-PT"));
    assert!(!locales_match("??", "??"));
}

#[test]
fn test_getLocaleName_withPlainLanguage_shouldUseEnglishName() {
    assert_eq!(get_locale_name("ko").unwrap(), "Korean");
    assert_eq!(get_locale_name("zh-CN").unwrap(), "Chinese (CN)");
}

#[test]
fn test_normalizeTargetLocales_shouldPreserveOrder() {
    let targets = vec![
        "ja".to_string(),
        "zh_cn".to_string(),
        "en".to_string(),
        "zh-CN".to_string(),
    ];

    let result = normalize_target_locales(&targets, "ko").unwrap();

    assert_eq!(result, vec!["ja", "zh-CN", "en"]);
}

#[test]
fn test_normalizeTargetLocales_withInvalidTarget_shouldFail() {
    let targets = vec!["en".to_string(), "not a locale".to_string()];

    assert!(normalize_target_locales(&targets, "ko").is_err());
}
