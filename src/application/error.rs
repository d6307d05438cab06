use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::application::page::PageError;
use crate::application::repos::RepoError;
use crate::application::search::SearchError;
use crate::application::seo::SeoError;
use crate::application::sitemap::SitemapError;
use crate::infra::error::InfraError;

/// Diagnostic chain attached to failed responses and logged by the
/// response middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status,
            public_message,
            report: ErrorReport::from_message(source, status, detail),
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        Self {
            status,
            public_message,
            report: ErrorReport::from_error(source, status, error),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn internal(source: &'static str, error: &dyn StdError) -> Self {
        Self::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            error,
        )
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<SearchError> for HttpError {
    fn from(error: SearchError) -> Self {
        const SOURCE: &str = "application::search::BlogSearchPageLoader";
        match error {
            SearchError::MissingParameter(name) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Missing request parameter",
                format!("query parameter `{name}` is required"),
            ),
            SearchError::Repo(err) => HttpError::internal(SOURCE, &err),
        }
    }
}

impl From<PageError> for HttpError {
    fn from(error: PageError) -> Self {
        const SOURCE: &str = "application::page::BlogPageLoader";
        match error {
            PageError::NotFound { article_id } => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Blog entry not found",
                format!("no visible blog entry `{article_id}`"),
            ),
            PageError::Repo(err) => HttpError::internal(SOURCE, &err),
        }
    }
}

impl From<SeoError> for HttpError {
    fn from(error: SeoError) -> Self {
        HttpError::internal("application::seo", &error)
    }
}

impl From<SitemapError> for HttpError {
    fn from(error: SitemapError) -> Self {
        HttpError::internal("application::sitemap::BlogUrlProvider", &error)
    }
}

impl From<RepoError> for HttpError {
    fn from(error: RepoError) -> Self {
        HttpError::internal("application::repos", &error)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Seo(#[from] SeoError),
    #[error(transparent)]
    Sitemap(#[from] SitemapError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
