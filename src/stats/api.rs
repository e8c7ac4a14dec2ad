//! The authenticated HTTP transport.
//!
//! A thin wrapper over [`reqwest::Client`] that owns the base URL and the
//! default headers the API requires (`Accept`, versioned `User-Agent`, and
//! optional bearer authorization).

use super::error::FetchError;
use crate::Result;
use ohno::IntoAppError;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

const ACCEPT_JSON: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// API client bound to one base URL and one (optional) token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client. `base_url` must not end with a slash.
    pub fn new(base_url: impl Into<String>, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("Bearer {t}")).into_app_err("encoding authorization header")?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .into_app_err("building HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// The base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an absolute URL from a path relative to the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Issue a single GET. Retry and classification happen in the caller.
    pub async fn get(&self, url: &str) -> core::result::Result<reqwest::Response, reqwest::Error> {
        self.http.get(url).send().await
    }

    /// Deserialize a successful response body, converting shape mismatches
    /// into [`FetchError::Parse`].
    pub async fn parse_body<T: DeserializeOwned>(resp: reqwest::Response) -> core::result::Result<T, FetchError> {
        resp.json::<T>().await.map_err(|e| FetchError::Parse(e.to_string()))
    }
}
