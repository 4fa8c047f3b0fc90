use std::time::Duration;

use futures::future::BoxFuture;
use log::debug;
use reqwest::header::LOCATION;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::errors::FetchError;

static ESMIRROR_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

pub type FetchFuture = BoxFuture<'static, Result<Vec<u8>, FetchError>>;

/// Source of raw module bytes. The download coordinator only talks to this.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &Url) -> FetchFuture;
}

/// HTTP GET with redirects handled here rather than by the transport, so the
/// hop count is bounded and every hop is logged.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_redirects: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_redirects: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(ESMIRROR_USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            max_redirects,
        })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &Url) -> FetchFuture {
        let client = self.client.clone();
        let url = url.clone();
        let max_redirects = self.max_redirects;
        Box::pin(async move { get_following_redirects(&client, url, max_redirects).await })
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

async fn get_following_redirects(
    client: &Client,
    start: Url,
    max_redirects: usize,
) -> Result<Vec<u8>, FetchError> {
    let mut url = start.clone();
    let mut hops = 0;

    loop {
        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();

        if is_followed_redirect(status) {
            if hops >= max_redirects {
                return Err(FetchError::TooManyRedirects {
                    url: start.to_string(),
                    limit: max_redirects,
                });
            }
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| FetchError::MissingLocation {
                    url: url.to_string(),
                    status: status.as_u16(),
                })?;
            let next = url.join(location).map_err(|_| FetchError::InvalidLocation {
                url: url.to_string(),
                location: location.to_string(),
            })?;
            debug!("Redirect {} ({}) -> {}", url, status.as_u16(), next);
            url = next;
            hops += 1;
            continue;
        }

        if status.is_success() {
            let bytes = response.bytes().await.map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
            return Ok(bytes.to_vec());
        }

        let body = match response.bytes().await {
            Ok(bytes) => String::from_utf8_lossy(bytes.as_ref()).to_string(),
            Err(_) => String::new(),
        };
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }
}
