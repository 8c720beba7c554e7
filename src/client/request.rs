//! Retrying JSON request executor.
//!
//! Every API call funnels through [RequestExecutor::execute], which owns
//! the retry loop, the one-time CSRF discovery, and the re-authentication
//! attempt on the first 401/403. Failures after the last attempt are
//! logged and counted rather than propagated; the caller sees `None` and
//! keeps whatever it already collected.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::auth::{self, Credentials};
use super::session::Transport;
use super::tokens::discover_csrf_token;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Injection point for the retry and pacing delays.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the calling thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct RequestExecutor<T: Transport, S: Sleeper> {
    transport: T,
    credentials: Option<Credentials>,
    max_attempts: u32,
    sleeper: S,
    errors: u64,
    csrf_probed: bool,
}

impl<T: Transport, S: Sleeper> RequestExecutor<T, S> {
    pub fn new(
        transport: T,
        credentials: Option<Credentials>,
        max_attempts: u32,
        sleeper: S,
    ) -> Self {
        Self {
            transport,
            credentials,
            max_attempts: max_attempts.max(1),
            sleeper,
            errors: 0,
            csrf_probed: false,
        }
    }

    /// Runs the strategy chain for the configured credentials. Returns
    /// false when no credentials were given or no strategy succeeded;
    /// requests still go out unauthenticated in that case.
    pub fn authenticate(&mut self) -> bool {
        match &self.credentials {
            Some(credentials) => auth::authenticate(&mut self.transport, credentials).is_some(),
            None => false,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Requests that exhausted their attempts or died on a TLS error.
    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.username.as_str())
    }

    pub(crate) fn pause(&mut self, duration: Duration) {
        self.sleeper.sleep(duration);
    }

    /// GET a JSON endpoint with retries. Exponential backoff between
    /// attempts; a 401/403 on the first attempt triggers one
    /// re-authentication pass; TLS failures are terminal because no
    /// retry will fix a certificate.
    pub fn execute(&mut self, path: &str, query: &[(&str, String)]) -> Option<Value> {
        if !self.csrf_probed {
            self.csrf_probed = true;
            if self.transport.csrf_token().is_none() {
                discover_csrf_token(&mut self.transport);
            }
        }

        let headers = [
            ("Accept", "application/json".to_string()),
            ("Content-Type", "application/json".to_string()),
        ];
        for attempt in 0..self.max_attempts {
            match self.transport.get(path, query, &headers) {
                Ok(response) if response.is_success() => {
                    match serde_json::from_str(&response.body) {
                        Ok(value) => return Some(value),
                        Err(e) => warn!("undecodable JSON from {}: {}", path, e),
                    }
                }
                Ok(response) => {
                    if attempt == 0 {
                        debug!("request to {} returned HTTP {}", path, response.status);
                        debug!("query: {:?}", query);
                        debug!("body preview: {}", preview(&response.body));
                    }
                    if response.status == 401 || response.status == 403 {
                        warn!("access denied ({}) for {}", response.status, path);
                        if attempt == 0 && self.credentials.is_some() {
                            info!("re-authenticating");
                            self.authenticate();
                        }
                    } else {
                        warn!("HTTP {} from {}", response.status, path);
                    }
                }
                Err(e) if e.is_tls() => {
                    error!("{}", e);
                    error!("hint: pass --no-ssl if the server uses a self-signed certificate");
                    self.errors += 1;
                    return None;
                }
                Err(e) => warn!("request attempt failed: {}", e),
            }
            if attempt + 1 < self.max_attempts {
                let delay = Duration::from_secs(1u64 << attempt.min(16));
                debug!("retrying {} in {:?}", path, delay);
                self.sleeper.sleep(delay);
            }
        }
        self.errors += 1;
        warn!("giving up on {} after {} attempts", path, self.max_attempts);
        None
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
