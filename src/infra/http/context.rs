//! Storefront context taken from request headers.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::HeaderMap, http::request::Parts};

use crate::application::context::StorefrontContext;

pub const SALES_CHANNEL_HEADER: &str = "x-sales-channel-id";
pub const LANGUAGE_HEADER: &str = "x-language-id";
pub const CURRENCY_HEADER: &str = "x-currency-id";
pub const CUSTOMER_GROUP_HEADER: &str = "x-customer-group-id";
/// Comma-separated ids of the rules active for the visitor.
pub const RULE_IDS_HEADER: &str = "x-rule-ids";

/// Extractor for the [`StorefrontContext`] of a request. Absent or
/// non-ASCII headers keep the default value.
#[derive(Debug, Clone)]
pub struct Storefront(pub StorefrontContext);

impl Storefront {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let mut context = StorefrontContext::default();
        if let Some(value) = header(SALES_CHANNEL_HEADER) {
            context.sales_channel_id = value;
        }
        if let Some(value) = header(LANGUAGE_HEADER) {
            context.language_id = value;
        }
        if let Some(value) = header(CURRENCY_HEADER) {
            context.currency_id = value;
        }
        if let Some(value) = header(CUSTOMER_GROUP_HEADER) {
            context.customer_group_id = value;
        }
        if let Some(value) = header(RULE_IDS_HEADER) {
            context.rule_ids = value
                .split(',')
                .map(str::trim)
                .filter(|rule| !rule.is_empty())
                .map(str::to_string)
                .collect();
        }

        Self(context)
    }
}

impl<S> FromRequestParts<S> for Storefront
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
