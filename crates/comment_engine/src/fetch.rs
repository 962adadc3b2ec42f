use std::time::Duration;

use comment_core::{parse_page, ContentId, RawPage};
use engine_logging::engine_warn;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::{FailureKind, FetchError};

pub const DEFAULT_ENDPOINT: &str = "https://weibo.com/ajax/statuses/buildComments";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub endpoint: String,
    /// Query parameter carrying the pagination cursor.
    pub cursor_param: String,
    /// Fixed parameters sent with every request besides `id`, cursor and `flow`.
    pub extra_query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            cursor_param: "max_id".to_string(),
            extra_query: vec![("is_show_bulletin".to_string(), "0".to_string())],
            headers: vec![
                (
                    "User-Agent".to_string(),
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36"
                        .to_string(),
                ),
                ("Referer".to_string(), "https://weibo.com/".to_string()),
                ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
            ],
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
            max_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Issues exactly one page request. Retrying is the caller's decision.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, content_id: &ContentId, cursor: u64) -> Result<RawPage, FetchError>;
}

/// HTTP page fetcher sharing one connection pool across all workers.
#[derive(Debug, Clone)]
pub struct ReqwestPageFetcher {
    settings: FetchSettings,
    endpoint: Url,
    client: reqwest::Client,
}

impl ReqwestPageFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let endpoint = Url::parse(&settings.endpoint)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .default_headers(build_headers(&settings.headers)?)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            endpoint,
            client,
        })
    }

    pub fn page_url(&self, content_id: &ContentId, cursor: u64) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("id", content_id.as_str());
            for (key, value) in &self.settings.extra_query {
                query.append_pair(key, value);
            }
            query.append_pair(&self.settings.cursor_param, &cursor.to_string());
            query.append_pair("flow", "1");
        }
        url
    }
}

fn build_headers(pairs: &[(String, String)]) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| FetchError::new(FailureKind::InvalidHeader, format!("{name}: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| FetchError::new(FailureKind::InvalidHeader, format!("{name}: {err}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[async_trait::async_trait]
impl PageFetcher for ReqwestPageFetcher {
    async fn fetch(&self, content_id: &ContentId, cursor: u64) -> Result<RawPage, FetchError> {
        let url = self.page_url(content_id, cursor);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            body.extend_from_slice(&chunk);
        }

        // Schema drift must not loop forever: an unreadable page ends the listing.
        match parse_page(&body) {
            Ok(page) => Ok(page),
            Err(err) => {
                engine_warn!(
                    "Content {} cursor {}: malformed response treated as empty ({})",
                    content_id,
                    cursor,
                    err
                );
                Ok(RawPage::empty())
            }
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
