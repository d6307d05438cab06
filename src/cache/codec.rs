//! Compressed storage format for cached HTTP responses.
//!
//! Layout before compression: a big-endian `u32` header length, the JSON
//! header (status and headers), then the raw body bytes. The whole frame is
//! zstd-compressed.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode, response::Parts},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};

use super::CacheError;

const LENGTH_PREFIX: usize = 4;

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(skip)]
    pub body: Bytes,
}

impl CachedResponse {
    /// Buffer a response body, keeping headers that are valid UTF-8.
    pub async fn buffer(response: Response) -> Result<Self, CacheError> {
        let (parts, body) = response.into_parts();
        let body = collect_body(body).await?;
        Ok(Self::from_parts(&parts, body))
    }

    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();

        Self {
            status: parts.status.as_u16(),
            headers,
            body,
        }
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                headers.append(name, value);
            }
        }
        response
    }
}

pub async fn collect_body(body: Body) -> Result<Bytes, CacheError> {
    Ok(BodyExt::collect(body)
        .await
        .map_err(|err| CacheError::Body(err.to_string()))?
        .to_bytes())
}

pub fn compress(response: &CachedResponse, level: i32) -> Result<Bytes, CacheError> {
    let header = serde_json::to_vec(response)?;
    let header_len = u32::try_from(header.len())
        .map_err(|_| CacheError::Corrupt("response header exceeds u32 length".to_string()))?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX + header.len() + response.body.len());
    frame.extend_from_slice(&header_len.to_be_bytes());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&response.body);

    let compressed = zstd::encode_all(frame.as_slice(), level)?;
    Ok(Bytes::from(compressed))
}

pub fn uncompress(value: &[u8]) -> Result<CachedResponse, CacheError> {
    let frame = zstd::decode_all(value)?;
    if frame.len() < LENGTH_PREFIX {
        return Err(CacheError::Corrupt("frame shorter than length prefix".to_string()));
    }

    let (prefix, rest) = frame.split_at(LENGTH_PREFIX);
    let mut len_bytes = [0u8; LENGTH_PREFIX];
    len_bytes.copy_from_slice(prefix);
    let header_len = u32::from_be_bytes(len_bytes) as usize;
    if rest.len() < header_len {
        return Err(CacheError::Corrupt(format!(
            "header length {header_len} exceeds frame of {} bytes",
            rest.len()
        )));
    }

    let (header, body) = rest.split_at(header_len);
    let mut response: CachedResponse = serde_json::from_slice(header)?;
    response.body = Bytes::copy_from_slice(body);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use axum::http::header::CONTENT_TYPE;
    use axum::response::IntoResponse;

    use super::*;

    fn sample() -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![
                ("content-type".to_string(), "text/html; charset=utf-8".to_string()),
                ("x-robots-tag".to_string(), "noindex".to_string()),
            ],
            body: Bytes::from_static(b"<html><body>Hello</body></html>"),
        }
    }

    #[test]
    fn uncompress_restores_compressed_response() {
        let original = sample();
        let stored = compress(&original, 3).expect("compress");
        assert_eq!(uncompress(&stored).expect("uncompress"), original);
    }

    #[test]
    fn empty_body_is_supported() {
        let original = CachedResponse {
            status: 204,
            headers: Vec::new(),
            body: Bytes::new(),
        };
        let stored = compress(&original, 1).expect("compress");
        assert_eq!(uncompress(&stored).expect("uncompress"), original);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let stored = zstd::encode_all(&[0u8, 0][..], 1).expect("encode");
        assert!(matches!(uncompress(&stored), Err(CacheError::Corrupt(_))));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(uncompress(b"definitely not zstd").is_err());
    }

    #[tokio::test]
    async fn buffer_and_rebuild_response() {
        let response = (
            StatusCode::OK,
            [(CONTENT_TYPE, "application/xml; charset=utf-8")],
            "<rss/>",
        )
            .into_response();

        let cached = CachedResponse::buffer(response).await.expect("buffer");
        assert_eq!(cached.status, 200);
        assert_eq!(cached.body, Bytes::from_static(b"<rss/>"));

        let rebuilt = cached.into_response();
        assert_eq!(rebuilt.status(), StatusCode::OK);
        assert_eq!(
            rebuilt.headers().get(CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(&b"application/xml; charset=utf-8"[..])
        );
    }
}
