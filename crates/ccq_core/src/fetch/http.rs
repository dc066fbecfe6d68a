//! Blocking HTTP client for the text API.
//!
//! A request is `GET {api_url}?urn={urn}`; a successful body looks like
//! `{"title": "...", "fulltext": ["...", ...]}` and a rejected one like
//! `{"error": {"code": "...", "description": "..."}}`.

use super::{FetchError, FetchResult, FetchedSection, SectionSource};
use log::{error, info};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("ccq/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GetTextBody {
    Text {
        title: String,
        #[serde(default)]
        fulltext: Vec<String>,
    },
    Failure {
        error: ApiErrorBody,
    },
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

/// `SectionSource` backed by the remote text API.
pub struct HttpSectionSource {
    client: Client,
    api_url: Url,
}

impl HttpSectionSource {
    /// Builds a client for the given API endpoint.
    pub fn new(api_url: Url) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, api_url })
    }

    /// Full request URL for one urn, with the urn percent-encoded.
    pub fn request_url(&self, urn: &str) -> Url {
        let mut url = self.api_url.clone();
        url.query_pairs_mut().append_pair("urn", urn);
        url
    }
}

impl SectionSource for HttpSectionSource {
    fn fetch_section(&self, urn: &str) -> FetchResult<FetchedSection> {
        let started_at = Instant::now();
        let result = self.request(urn);

        match &result {
            Ok(section) => info!(
                "event=fetch_section module=fetch status=ok urn={} paragraphs={} duration_ms={}",
                urn,
                section.fulltext.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=fetch_section module=fetch status=error urn={} duration_ms={} error={}",
                urn,
                started_at.elapsed().as_millis(),
                err
            ),
        }

        result
    }
}

impl HttpSectionSource {
    fn request(&self, urn: &str) -> FetchResult<FetchedSection> {
        let http_error = |source: reqwest::Error| FetchError::Http {
            urn: urn.to_string(),
            source,
        };

        let response = self
            .client
            .get(self.request_url(urn))
            .send()
            .map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                urn: urn.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(http_error)?;
        parse_section_body(urn, &body)
    }
}

/// Decodes a text API response body for `urn`.
pub fn parse_section_body(urn: &str, body: &str) -> FetchResult<FetchedSection> {
    let parsed: GetTextBody = serde_json::from_str(body).map_err(|source| FetchError::Decode {
        urn: urn.to_string(),
        source,
    })?;

    match parsed {
        GetTextBody::Text { title, fulltext } => Ok(FetchedSection { title, fulltext }),
        GetTextBody::Failure { error } => Err(FetchError::Api {
            urn: urn.to_string(),
            code: error.code,
            description: error.description,
        }),
    }
}
