// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

const DEFAULT_LANG: &str = "en";

// Extrator de idioma (primeiro idioma do Accept-Language)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Locale {
    pub fn from_header(header_str: &str) -> Self {
        let lang = accept_language::parse(header_str)
            .first()
            // "pt-BR" -> "pt", "en" -> "en"
            .map(|tag| tag.split('-').next().unwrap_or(tag.as_str()).to_lowercase())
            .unwrap_or_else(|| DEFAULT_LANG.to_string());
        Locale(lang)
    }

    pub fn is_portuguese(&self) -> bool {
        self.0 == "pt"
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale(DEFAULT_LANG.to_string())
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let locale = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|header_value| header_value.to_str().ok())
            .map(Locale::from_header)
            .unwrap_or_default();

        Ok(locale)
    }
}
