//! Blocking HTTP transport for the portal session. Owns connection
//! settings plus the credential and CSRF token carried across requests.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use super::error::{ClientError, TransportError};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; liferake/0.1; +https://github.com/liferake)";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Header the portal uses to surface and accept anti-forgery tokens.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// One HTTP exchange as seen by the layers above the transport.
///
/// The blocking reqwest response cannot be constructed by hand, so the
/// transport copies status, headers, body, and the post-redirect URL into
/// this owned form. Bodies are read eagerly; the portal returns JSON and
/// small HTML pages.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// URL after redirects. The form-login success check reads this.
    pub final_url: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Response header value, if present and readable as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse the body as JSON, if it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Request plumbing shared by authentication, token discovery, and the
/// retrying executor. The credential and CSRF token installed here ride
/// on every subsequent request until replaced. Implemented by
/// [HttpSession] and by scripted doubles in tests.
pub trait Transport {
    fn get(
        &mut self,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> Result<RawResponse, TransportError>;

    fn post_form(
        &mut self,
        path: &str,
        form: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> Result<RawResponse, TransportError>;

    /// The configured base URL, without a trailing slash.
    fn base_url(&self) -> &str;

    /// Install or replace the Authorization value sent with every request.
    fn set_credential(&mut self, value: HeaderValue);

    /// Drop the Authorization value, returning to anonymous requests.
    fn clear_credential(&mut self);

    fn has_credential(&self) -> bool;

    /// Remember a discovered anti-forgery token; sent as X-CSRF-Token on
    /// every subsequent request.
    fn set_csrf_token(&mut self, token: String);

    fn csrf_token(&self) -> Option<&str>;
}

/// Blocking transport over one portal base URL. Cookies are kept for the
/// session lifetime; form login depends on them.
#[derive(Debug)]
pub struct HttpSession {
    inner: reqwest::blocking::Client,
    base: String,
    credential: Option<HeaderValue>,
    csrf_token: Option<String>,
}

impl HttpSession {
    /// Builder for a session against `base_url`.
    pub fn builder(base_url: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(base_url)
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn apply_state(
        &self,
        mut request: reqwest::blocking::RequestBuilder,
        extra: &[(&'static str, String)],
    ) -> reqwest::blocking::RequestBuilder {
        if let Some(credential) = &self.credential {
            request = request.header(AUTHORIZATION, credential.clone());
        }
        if let Some(token) = &self.csrf_token {
            request = request.header(CSRF_HEADER, token.as_str());
        }
        for (name, value) in extra {
            request = request.header(*name, value.as_str());
        }
        request
    }

    fn read(url: &str, response: reqwest::blocking::Response) -> Result<RawResponse, TransportError> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .map_err(|e| TransportError::from_reqwest(url, e))?;
        Ok(RawResponse {
            status,
            headers,
            body,
            final_url,
        })
    }
}

impl Transport for HttpSession {
    fn get(
        &mut self,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> Result<RawResponse, TransportError> {
        let url = self.url_for(path);
        let mut request = self.inner.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let request = self.apply_state(request, headers);
        let response = request
            .send()
            .map_err(|e| TransportError::from_reqwest(&url, e))?;
        Self::read(&url, response)
    }

    fn post_form(
        &mut self,
        path: &str,
        form: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> Result<RawResponse, TransportError> {
        let url = self.url_for(path);
        let request = self.apply_state(self.inner.post(&url).form(form), headers);
        let response = request
            .send()
            .map_err(|e| TransportError::from_reqwest(&url, e))?;
        Self::read(&url, response)
    }

    fn base_url(&self) -> &str {
        &self.base
    }

    fn set_credential(&mut self, value: HeaderValue) {
        self.credential = Some(value);
    }

    fn clear_credential(&mut self) {
        self.credential = None;
    }

    fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    fn set_csrf_token(&mut self, token: String) {
        self.csrf_token = Some(token);
    }

    fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }
}

/// Builder for [HttpSession] with optional User-Agent, timeout, and TLS
/// verification settings.
#[derive(Debug)]
pub struct SessionBuilder {
    base_url: String,
    user_agent: Option<String>,
    timeout_secs: u64,
    verify_tls: bool,
}

impl SessionBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_tls: true,
        }
    }

    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Verify TLS certificates (default true). Disable for deployments
    /// behind self-signed certificates.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Validate the base URL and build the blocking client.
    pub fn build(self) -> Result<HttpSession, ClientError> {
        let parsed =
            reqwest::Url::parse(&self.base_url).map_err(|e| ClientError::InvalidBaseUrl {
                input: self.base_url.clone(),
                reason: e.to_string(),
            })?;
        if parsed.host_str().is_none() {
            return Err(ClientError::InvalidBaseUrl {
                input: self.base_url.clone(),
                reason: "URL has no host".to_string(),
            });
        }
        let base = self.base_url.trim_end_matches('/').to_string();
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(!self.verify_tls)
            .build()
            .map_err(|e| ClientError::Build { source: e })?;
        Ok(HttpSession {
            inner,
            base,
            credential: None,
            csrf_token: None,
        })
    }
}
