use isolang::Language;

use crate::errors::{Result, StorageError};

/// Language utilities for store keys
///
/// A store is keyed by `code` or `code_COUNTRY` (e.g. `pt_BR`). Codes are
/// ISO 639-1 or ISO 639-2; unknown codes are still accepted as keys, they
/// just get no metadata.
/// ISO 639-2/B codes that differ from their 639-2/T form
const PART2B_TO_PART2T: [(&str, &str); 18] = [
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Plural rules for languages that do not use the Germanic `(n != 1)` pair
const PLURAL_RULES: [(&str, u32, &str); 14] = [
    ("ja", 1, "0"),
    ("ko", 1, "0"),
    ("zh", 1, "0"),
    ("vi", 1, "0"),
    ("th", 1, "0"),
    ("fr", 2, "(n > 1)"),
    ("pt_BR", 2, "(n > 1)"),
    ("lt", 3, "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && (n%100<10 || n%100>=20) ? 1 : 2)"),
    ("ru", 3, "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)"),
    ("uk", 3, "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)"),
    ("pl", 3, "(n==1 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)"),
    ("cs", 3, "(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2"),
    ("sk", 3, "(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2"),
    ("ar", 6, "n==0 ? 0 : n==1 ? 1 : n==2 ? 2 : n%100>=3 && n%100<=10 ? 3 : n%100>=11 ? 4 : 5"),
];

/// Default plural count for languages missing from the table
pub const DEFAULT_NPLURALS: u32 = 2;

/// Default plural equation for languages missing from the table
pub const DEFAULT_PLURAL_EQUATION: &str = "(n != 1)";

/// Split a store key into `(code, country)`
///
/// The country part is upper-cased; an empty key or an empty half is rejected.
pub fn parse_language_key(key: &str) -> Result<(String, Option<String>)> {
    let key = key.trim();
    let (code, country) = match key.split_once('_') {
        Some((code, country)) => (code, Some(country)),
        None => (key, None),
    };

    if code.is_empty() || country.is_some_and(str::is_empty) {
        return Err(StorageError::Validation(format!(
            "Invalid language key: '{}'",
            key
        )));
    }

    Ok((code.to_string(), country.map(str::to_uppercase)))
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Option<String> {
    let normalized_code = code.trim().to_lowercase();

    match normalized_code.len() {
        2 => Language::from_639_1(&normalized_code).map(|lang| lang.to_639_3().to_string()),
        3 => {
            if Language::from_639_3(&normalized_code).is_some() {
                return Some(normalized_code);
            }
            PART2B_TO_PART2T
                .iter()
                .find(|(b, _)| *b == normalized_code)
                .map(|(_, t)| t.to_string())
        }
        _ => None,
    }
}

/// Whether the code is a known ISO 639-1 or ISO 639-2 code
pub fn is_known_code(code: &str) -> bool {
    normalize_to_part2t(code).is_some()
}

/// English name of a language code
pub fn english_name(code: &str) -> Option<String> {
    let part2t = normalize_to_part2t(code)?;
    Language::from_639_3(&part2t).map(|lang| lang.to_name().to_string())
}

/// Native name (autonym) of a language code
pub fn native_name(code: &str) -> Option<String> {
    let part2t = normalize_to_part2t(code)?;
    Language::from_639_3(&part2t)
        .and_then(|lang| lang.to_autonym())
        .map(str::to_string)
}

/// `(nplurals, equation)` for a store key; the full key wins over the bare code
pub fn plural_rule(key: &str) -> (u32, String) {
    let code = key.split('_').next().unwrap_or(key);
    PLURAL_RULES
        .iter()
        .find(|(k, _, _)| *k == key)
        .or_else(|| PLURAL_RULES.iter().find(|(k, _, _)| *k == code))
        .map(|(_, n, eq)| (*n, eq.to_string()))
        .unwrap_or((DEFAULT_NPLURALS, DEFAULT_PLURAL_EQUATION.to_string()))
}
