//! Multi-strategy authentication against the portal.
//!
//! Deployments differ in which login mechanisms they leave enabled, so
//! the authenticator walks a fixed list of strategies and stops at the
//! first one that verifiably works. All of them failing is survivable:
//! some instances allow anonymous reads, and the access probe decides
//! whether the run can proceed.

use base64::prelude::*;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::session::Transport;
use super::tokens::extract_form_tokens;

/// Identity probe shared by the basic-auth and form-login checks.
const CURRENT_USER_PATH: &str = "/api/jsonws/user/get-current-user";
const FORM_LOGIN_PATH: &str = "/c/portal/login";
const TOKEN_LOGIN_PATH: &str = "/api/jsonws/user/authenticate";
const OAUTH_TOKEN_PATH: &str = "/o/oauth2/token";

/// OAuth2 client id stock deployments register for headless API access.
const OAUTH_CLIENT_ID: &str = "headless-server";

/// Username/password pair for the portal account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Outcome of one strategy attempt. The credential artifact, if any, is
/// installed on the transport by the strategy itself; `verified` means
/// follow-up requests can rely on it.
#[derive(Debug)]
pub struct AuthOutcome {
    pub verified: bool,
    pub note: Option<String>,
}

impl AuthOutcome {
    fn verified(note: impl Into<String>) -> Self {
        Self {
            verified: true,
            note: Some(note.into()),
        }
    }

    fn failed_with(note: impl Into<String>) -> Self {
        Self {
            verified: false,
            note: Some(note.into()),
        }
    }
}

/// One way of turning credentials into a working session.
pub trait AuthStrategy {
    fn id(&self) -> &'static str;
    fn attempt(&self, transport: &mut dyn Transport, credentials: &Credentials) -> AuthOutcome;
}

/// The strategy chain in priority order.
pub fn strategies() -> Vec<Box<dyn AuthStrategy>> {
    vec![
        Box::new(BasicAuth),
        Box::new(FormLogin),
        Box::new(TokenEndpoint),
        Box::new(PasswordGrant),
    ]
}

/// Try each default strategy in order, stopping at the first verified
/// outcome. Returns the id of the winning strategy, or None when every
/// strategy failed; the session is left uncredentialed in that case.
pub fn authenticate<T: Transport>(
    transport: &mut T,
    credentials: &Credentials,
) -> Option<&'static str> {
    authenticate_with(transport, credentials, &strategies())
}

/// Same as [authenticate] over a caller-supplied strategy list.
pub fn authenticate_with<T: Transport>(
    transport: &mut T,
    credentials: &Credentials,
    strategies: &[Box<dyn AuthStrategy>],
) -> Option<&'static str> {
    info!("authenticating as {}", credentials.username);
    for strategy in strategies {
        debug!("trying {} authentication", strategy.id());
        let outcome = strategy.attempt(transport, credentials);
        if outcome.verified {
            match &outcome.note {
                Some(note) => info!("{} authentication succeeded: {}", strategy.id(), note),
                None => info!("{} authentication succeeded", strategy.id()),
            }
            return Some(strategy.id());
        }
        if let Some(note) = &outcome.note {
            debug!("{} authentication failed: {}", strategy.id(), note);
        }
    }
    warn!("no authentication strategy succeeded; continuing unauthenticated");
    None
}

/// Basic access authentication, probed against the current-user endpoint.
/// The header stays installed only when the probe confirms it works.
struct BasicAuth;

impl AuthStrategy for BasicAuth {
    fn id(&self) -> &'static str {
        "basic"
    }

    fn attempt(&self, transport: &mut dyn Transport, credentials: &Credentials) -> AuthOutcome {
        let encoded =
            BASE64_STANDARD.encode(format!("{}:{}", credentials.username, credentials.password));
        let header = match HeaderValue::try_from(format!("Basic {}", encoded)) {
            Ok(header) => header,
            Err(e) => return AuthOutcome::failed_with(format!("credential not header-safe: {}", e)),
        };
        transport.set_credential(header);
        let response = match transport.get(CURRENT_USER_PATH, &[], &[]) {
            Ok(response) => response,
            Err(e) => {
                transport.clear_credential();
                return AuthOutcome::failed_with(e.to_string());
            }
        };
        if response.status == 200 {
            if let Some(user) = response.json().filter(|v| v.is_object()) {
                let screen_name = user
                    .get("screenName")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                return AuthOutcome::verified(format!("signed in as {}", screen_name));
            }
        }
        transport.clear_credential();
        AuthOutcome::failed_with(format!("identity probe returned HTTP {}", response.status))
    }
}

/// Form-based login through the portal's HTML login page. The portal
/// answers 200 for failed logins too, so success detection re-queries the
/// identity endpoint and falls back to scanning the landing page for
/// login markers.
struct FormLogin;

impl AuthStrategy for FormLogin {
    fn id(&self) -> &'static str {
        "form-login"
    }

    fn attempt(&self, transport: &mut dyn Transport, credentials: &Credentials) -> AuthOutcome {
        let page = match transport.get(FORM_LOGIN_PATH, &[], &[]) {
            Ok(page) => page,
            Err(e) => return AuthOutcome::failed_with(e.to_string()),
        };
        if page.status != 200 {
            return AuthOutcome::failed_with(format!("login page returned HTTP {}", page.status));
        }

        let tokens = extract_form_tokens(&page.body);
        let mut form: Vec<(&str, String)> = vec![
            ("login", credentials.username.clone()),
            ("password", credentials.password.clone()),
            ("rememberMe", "false".to_string()),
        ];
        if let Some(p_auth) = &tokens.p_auth {
            form.push(("p_auth", p_auth.clone()));
        }
        if let Some(csrf) = &tokens.csrf {
            form.push(("csrf_token", csrf.clone()));
            transport.set_csrf_token(csrf.clone());
        }
        if let Some(token) = &tokens.authenticity {
            form.push(("authenticity_token", token.clone()));
        }

        let headers = [
            (
                "Referer",
                format!("{}{}", transport.base_url(), FORM_LOGIN_PATH),
            ),
            ("Origin", transport.base_url().to_string()),
        ];
        let response = match transport.post_form(FORM_LOGIN_PATH, &form, &headers) {
            Ok(response) => response,
            Err(e) => return AuthOutcome::failed_with(e.to_string()),
        };
        if response.status != 200 || response.final_url.contains("error") {
            return AuthOutcome::failed_with(format!("login POST returned HTTP {}", response.status));
        }

        if let Ok(user) = transport.get(CURRENT_USER_PATH, &[], &[]) {
            if user.status == 200 && user.json().filter(|v| v.is_object()).is_some() {
                return AuthOutcome::verified("identity confirmed after login");
            }
        }
        let lowered = response.body.to_lowercase();
        if !lowered.contains("sign-in") && !lowered.contains("login") {
            return AuthOutcome::verified("landing page has no login markers");
        }
        AuthOutcome::failed_with("landing page still shows a login form")
    }
}

/// JSON web-service login endpoint. A 200 means the server accepted the
/// credentials and bound them to the session cookie; the body carries no
/// usable artifact and is not inspected.
struct TokenEndpoint;

impl AuthStrategy for TokenEndpoint {
    fn id(&self) -> &'static str {
        "token-endpoint"
    }

    fn attempt(&self, transport: &mut dyn Transport, credentials: &Credentials) -> AuthOutcome {
        let form = [
            ("companyId", String::new()),
            ("login", credentials.username.clone()),
            ("password", credentials.password.clone()),
            ("remoteAddr", String::new()),
            ("remoteHost", String::new()),
            ("userAgent", String::new()),
        ];
        match transport.post_form(TOKEN_LOGIN_PATH, &form, &[]) {
            Ok(response) if response.status == 200 => {
                AuthOutcome::verified("server accepted credentials")
            }
            Ok(response) => AuthOutcome::failed_with(format!("HTTP {}", response.status)),
            Err(e) => AuthOutcome::failed_with(e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// OAuth2 resource-owner password grant against the portal's token
/// endpoint.
struct PasswordGrant;

impl AuthStrategy for PasswordGrant {
    fn id(&self) -> &'static str {
        "oauth2"
    }

    fn attempt(&self, transport: &mut dyn Transport, credentials: &Credentials) -> AuthOutcome {
        let form = [
            ("grant_type", "password".to_string()),
            ("username", credentials.username.clone()),
            ("password", credentials.password.clone()),
            ("client_id", OAUTH_CLIENT_ID.to_string()),
        ];
        let response = match transport.post_form(OAUTH_TOKEN_PATH, &form, &[]) {
            Ok(response) => response,
            Err(e) => return AuthOutcome::failed_with(e.to_string()),
        };
        if response.status != 200 {
            return AuthOutcome::failed_with(format!("HTTP {}", response.status));
        }
        let token = serde_json::from_str::<TokenResponse>(&response.body)
            .ok()
            .and_then(|t| t.access_token)
            .filter(|t| !t.is_empty());
        let token = match token {
            Some(token) => token,
            None => return AuthOutcome::failed_with("no access_token in response"),
        };
        match HeaderValue::try_from(format!("Bearer {}", token)) {
            Ok(header) => {
                transport.set_credential(header);
                AuthOutcome::verified("bearer token installed")
            }
            Err(e) => AuthOutcome::failed_with(format!("token not header-safe: {}", e)),
        }
    }
}
