use crate::error::{Result, ScanError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Basic-auth pair sent with every request when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Transport settings scoped to one `JenkinsClient`.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Skip TLS certificate verification. Jenkins instances found in the
    /// wild frequently run with self-signed certificates.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
    /// `None` means requests may block indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
            user_agent: format!("Pillage/{}", env!("CARGO_PKG_VERSION")),
            timeout: None,
        }
    }
}

/// A validated, immutable reference to a Jenkins resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JenkinsEndpoint {
    url: String,
    base_url: String,
}

impl JenkinsEndpoint {
    /// Fails unless `url` is an absolute http(s) URL with a host.
    pub fn new(url: &str) -> Result<Self> {
        let parsed =
            Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScanError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                url,
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("{}: missing host", url)))?;

        let base_url = match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        };

        Ok(Self {
            url: url.to_string(),
            base_url,
        })
    }

    /// The URL exactly as it was supplied.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Scheme and network location only, e.g. `https://jenkins:8443`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Append a sub-resource to the endpoint URL without doubling slashes.
    pub fn join(&self, suffix: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            suffix.trim_start_matches('/')
        )
    }
}

/// CSRF token issued by `/crumbIssuer/api/json`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Crumb {
    #[serde(rename = "crumbRequestField")]
    pub crumb_request_field: String,

    pub crumb: String,
}

impl Crumb {
    pub fn to_headers(&self) -> Result<HeaderMap> {
        let name = HeaderName::from_bytes(self.crumb_request_field.as_bytes())
            .map_err(|e| ScanError::InvalidCrumb(e.to_string()))?;
        let value =
            HeaderValue::from_str(&self.crumb).map_err(|e| ScanError::InvalidCrumb(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(name, value);
        Ok(headers)
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_denied(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN
    }

    /// Decode the body as JSON, `None` if it is not valid for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_str(&self.body).ok()
    }
}

#[derive(Debug, Clone)]
pub struct JenkinsClient {
    client: Client,
    credentials: Option<Credentials>,
}

impl JenkinsClient {
    pub fn new(options: &TransportOptions, credentials: Option<Credentials>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(options.user_agent.clone())
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5));

        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            credentials,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials {
            Some(ref creds) => request.basic_auth(&creds.username, Some(&creds.password)),
            None => request,
        }
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        debug!("GET {}", url);
        let response = self.authorize(self.client.get(url)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("GET {} -> {}", url, status);

        Ok(HttpResponse { status, body })
    }

    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: HeaderMap,
    ) -> Result<HttpResponse> {
        debug!("POST {}", url);
        let response = self
            .authorize(self.client.post(url))
            .headers(headers)
            .form(form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("POST {} -> {}", url, status);

        Ok(HttpResponse { status, body })
    }

    /// Ask Jenkins for a CSRF crumb. Instances with CSRF protection disabled
    /// answer 404, which yields `None`.
    pub async fn fetch_crumb(&self, root: &JenkinsEndpoint) -> Result<Option<Crumb>> {
        let response = self.get(&root.join("crumbIssuer/api/json")).await?;
        if !response.is_success() {
            debug!("No crumb issued ({})", response.status);
            return Ok(None);
        }
        Ok(response.json::<Crumb>())
    }
}
