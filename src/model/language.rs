/*!
 * Language metadata attached to translation stores.
 */

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::language_utils;

/// Basic information about a language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    /// ISO 639 language code
    pub code: String,
    /// Optional ISO 3166 two-letter country code (upper case)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Native language name
    pub name: String,
    /// English language name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_eng: Option<String>,
    pub nplurals: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_equation: Option<String>,
    #[serde(default)]
    pub special_chars: Vec<String>,
}

impl LanguageInfo {
    /// Build the info for a store key, filling names and plural rules when known
    ///
    /// Unknown codes never fail: the key itself becomes the name.
    pub fn from_key(key: &str) -> Result<Self> {
        let (code, country) = language_utils::parse_language_key(key)?;
        let name_eng = language_utils::english_name(&code);
        let name = language_utils::native_name(&code)
            .or_else(|| name_eng.clone())
            .unwrap_or_else(|| key.trim().to_string());

        let mut info = Self {
            code,
            country,
            name,
            name_eng,
            nplurals: language_utils::DEFAULT_NPLURALS,
            plural_equation: None,
            special_chars: Vec::new(),
        };
        let (nplurals, equation) = language_utils::plural_rule(&info.key());
        info.nplurals = nplurals;
        info.plural_equation = Some(equation);
        Ok(info)
    }

    /// `code` or `code_COUNTRY`
    pub fn key(&self) -> String {
        match &self.country {
            Some(country) => format!("{}_{}", self.code, country.to_uppercase()),
            None => self.code.clone(),
        }
    }
}
