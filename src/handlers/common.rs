//! Extractors shared by the storefront handlers.
//!
//! Axum's stock extractors answer malformed input with plain-text bodies;
//! these wrappers turn every rejection into a `validation_error` envelope
//! before the handler runs.

use crate::{errors::ServiceError, AppState};
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{header, request::Parts},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use validator::Validate;

/// JSON body that has passed `validator` checks
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string with rejections mapped to `validation_error`
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))
    }
}

/// Path parameters with rejections mapped to `validation_error`
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| Self(value))
            .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))
    }
}

/// Locale the request should be served in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Locale {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Default, Deserialize)]
struct LangParam {
    lang: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for Locale {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let lang = Query::<LangParam>::try_from_uri(&parts.uri)
            .map(|Query(p)| p.lang)
            .unwrap_or_default();
        let accept = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());

        let supported = state.config.locales();
        Ok(Self(resolve_locale(
            lang.as_deref(),
            accept,
            &supported,
            &state.config.default_locale,
        )))
    }
}

/// `?lang=` wins, then the best supported `Accept-Language` entry, then the default.
pub fn resolve_locale(
    lang: Option<&str>,
    accept_language: Option<&str>,
    supported: &[String],
    default_locale: &str,
) -> String {
    let is_supported = |tag: &str| supported.iter().any(|s| s == tag);

    if let Some(tag) = lang.map(primary_subtag).filter(|t| is_supported(t)) {
        return tag;
    }

    if let Some(header) = accept_language {
        let mut ranges: Vec<(String, f32)> = header
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.split(';');
                let tag = primary_subtag(parts.next()?);
                if tag.is_empty() || tag == "*" {
                    return None;
                }
                let q = parts
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((tag, q))
            })
            .filter(|(_, q)| *q > 0.0)
            .collect();
        ranges.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((tag, _)) = ranges.into_iter().find(|(tag, _)| is_supported(tag)) {
            return tag;
        }
    }

    default_locale.to_string()
}

fn primary_subtag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}
