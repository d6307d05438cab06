//! Response cache around the blog detail handler.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{instrument, warn};

use crate::application::context::StorefrontContext;
use crate::application::error::HttpError;

use super::codec::{self, CachedResponse};
use super::config::CacheConfig;
use super::keys::{generate_key, generate_tags};
use super::lock::mutex_lock;
use super::store::{CacheBackend, CacheItem};
use super::{CacheError, tracer};

const SOURCE: &str = "cache::detail";

/// Renders the detail page of one article.
#[async_trait]
pub trait DetailHandler: Send + Sync {
    async fn detail(&self, article_id: &str, context: &StorefrontContext) -> Response;
}

/// Serves detail pages from a [`CacheBackend`], falling back to the wrapped
/// handler on a miss.
pub struct CachedBlogDetail {
    decorated: Arc<dyn DetailHandler>,
    cache: Arc<dyn CacheBackend>,
    compression_level: i32,
    max_body_bytes: usize,
}

impl CachedBlogDetail {
    pub fn new(
        decorated: Arc<dyn DetailHandler>,
        cache: Arc<dyn CacheBackend>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            decorated,
            cache,
            compression_level: config.compression_level,
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Render on a miss. Responses that must not be stored are parked in
    /// `passthrough` untouched so their extensions survive.
    async fn populate(
        &self,
        article_id: &str,
        context: &StorefrontContext,
        passthrough: &Mutex<Option<Response>>,
    ) -> Result<CacheItem, CacheError> {
        let (response, traced) =
            tracer::with_tracer(self.decorated.detail(article_id, context)).await;

        if response.status() != StatusCode::OK {
            *mutex_lock(passthrough, SOURCE, "park_status") = Some(response);
            return Ok(CacheItem::uncacheable());
        }

        let (parts, body) = response.into_parts();
        let body = codec::collect_body(body).await?;
        if body.len() > self.max_body_bytes {
            let response = Response::from_parts(parts, Body::from(body));
            *mutex_lock(passthrough, SOURCE, "park_oversized") = Some(response);
            return Ok(CacheItem::uncacheable());
        }

        let buffered = CachedResponse::from_parts(&parts, body);
        Ok(CacheItem {
            value: codec::compress(&buffered, self.compression_level)?,
            tags: generate_tags(article_id, traced),
            cacheable: true,
        })
    }
}

#[async_trait]
impl DetailHandler for CachedBlogDetail {
    #[instrument(skip_all, fields(article_id = %article_id))]
    async fn detail(&self, article_id: &str, context: &StorefrontContext) -> Response {
        let key = generate_key(article_id, context);
        let passthrough = Mutex::new(None);

        let stored = self
            .cache
            .get(&key, Box::pin(self.populate(article_id, context, &passthrough)))
            .await;

        let parked = mutex_lock(&passthrough, SOURCE, "take_parked").take();
        if let Some(response) = parked {
            return response;
        }

        match stored.and_then(|value| codec::uncompress(&value)) {
            Ok(cached) => cached.into_response(),
            Err(err) => {
                warn!(cache = "detail", key = %key, error = %err, "detail cache failed");
                HttpError::from_error(
                    "cache::detail::CachedBlogDetail",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    &err,
                )
                .into_response()
            }
        }
    }
}
