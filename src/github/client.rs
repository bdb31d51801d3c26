//! GitHub API client.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::credentials;
use crate::error::{Result, SquashError};

/// Default REST endpoint for github.com.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Upper bound on how long any single request may block.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for interacting with the GitHub REST and GraphQL APIs.
#[derive(Clone)]
pub struct GitHubClient {
    pub(crate) token: String,
    pub(crate) base_url: String,
    pub(crate) graphql_url: String,
    pub(crate) client: Client,
}

impl GitHubClient {
    /// Create a new github.com client with the given token.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_enterprise(token, DEFAULT_API_URL)
    }

    /// Create a client for GitHub Enterprise with a custom REST base URL.
    ///
    /// The GraphQL endpoint is derived from the REST base: `.../api/v3`
    /// maps to `.../api/graphql`, anything else gets `/graphql` appended.
    pub fn with_enterprise(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let mut url = base_url.into();
        while url.ends_with('/') {
            url.pop();
        }
        if url.is_empty() {
            return Err(SquashError::InvalidConfig("API base URL is empty".into()));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            token: token.into(),
            graphql_url: graphql_url_for(&url),
            base_url: url,
            client,
        })
    }

    /// Create a client from the environment.
    ///
    /// The token comes from the credential chain in [`credentials::resolve_token`];
    /// `GITHUB_API_URL` overrides the REST base URL.
    pub fn from_env() -> Result<Self> {
        let token = credentials::resolve_token()?;
        match std::env::var("GITHUB_API_URL") {
            Ok(url) if !url.trim().is_empty() => Self::with_enterprise(token, url.trim()),
            _ => Self::new(token),
        }
    }

    /// Get the default headers for API requests.
    pub(crate) fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|_| {
            SquashError::InvalidConfig("token contains characters not allowed in a header".into())
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("squash-only"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Make a GET request to the REST API.
    pub(crate) fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(%url, "GET");
        let response = self.client.get(&url).headers(self.headers()?).send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(SquashError::GitHub {
                message: format!("API request failed ({}): {}", status, body),
            });
        }

        response.json().map_err(|e| SquashError::GitHub {
            message: format!("Failed to parse response: {}", e),
        })
    }

    /// Make a PATCH request to the REST API and hand back the raw status.
    ///
    /// The caller decides what the status means; only transport failures
    /// are errors here.
    pub(crate) fn patch<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<StatusCode> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(%url, "PATCH");
        let response = self
            .client
            .patch(&url)
            .headers(self.headers()?)
            .json(body)
            .send()?;
        Ok(response.status())
    }

    /// Run a GraphQL query and return its `data` member.
    ///
    /// Any entry in the `errors` array fails the whole call, even when
    /// partial data came back alongside it.
    pub(crate) fn graphql<T: DeserializeOwned, V: Serialize>(
        &self,
        query: &str,
        variables: &V,
    ) -> Result<T> {
        #[derive(Serialize)]
        struct Request<'a, V> {
            query: &'a str,
            variables: &'a V,
        }

        tracing::debug!(url = %self.graphql_url, "POST graphql");
        let response = self
            .client
            .post(&self.graphql_url)
            .headers(self.headers()?)
            .json(&Request { query, variables })
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(SquashError::GitHub {
                message: format!("GraphQL request failed ({}): {}", status, body),
            });
        }

        let body = response.text()?;
        parse_graphql_response(&body)
    }

    /// Get the REST base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the GraphQL endpoint URL.
    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Decode a GraphQL response body, turning an error payload into [`SquashError::GraphQl`].
pub(crate) fn parse_graphql_response<T: DeserializeOwned>(body: &str) -> Result<T> {
    let response: GraphQlResponse<T> = serde_json::from_str(body)?;

    if !response.errors.is_empty() {
        return Err(SquashError::GraphQl {
            messages: response.errors.into_iter().map(|e| e.message).collect(),
        });
    }

    response.data.ok_or_else(|| SquashError::GraphQl {
        messages: vec!["response contained no data".into()],
    })
}

fn graphql_url_for(base_url: &str) -> String {
    match base_url.strip_suffix("/api/v3") {
        Some(host) => format!("{}/api/graphql", host),
        None => format!("{}/graphql", base_url),
    }
}
