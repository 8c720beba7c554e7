//! Anti-forgery token discovery and extraction heuristics.
//!
//! The portal surfaces its CSRF token inconsistently: some pages return it
//! as a response header, others embed it in inline script or form markup.
//! Discovery walks a short list of candidate pages and scans each.
//! Extraction is best-effort text matching, not an HTML parse, and may
//! miss tokens on markup variants it has not seen.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use super::session::{Transport, CSRF_HEADER};

/// Pages likely to carry a token for the current session, in probe order.
const TOKEN_PAGES: [&str; 4] = ["/", "/web/guest", "/group/control_panel", "/api/jsonws"];

/// Loose `csrf: "..."` / `csrf=...` match. The 10-character minimum keeps
/// it from latching onto unrelated short fragments in inline script.
static CSRF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)csrf["\s]*[=:]["\s]*([^"&\s<>]{10,})"#).expect("Invalid regex")
});

/// Same shape as [CSRF_RE] without the length floor; login forms embed
/// short per-form tokens.
static FORM_CSRF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)csrf["\s]*[=:]["\s]*([^"&\s]+)"#).expect("Invalid regex"));

static P_AUTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"p_auth["\s]*[=:]["\s]*([^"&\s]+)"#).expect("Invalid regex"));

static AUTHENTICITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"authenticity_token["\s]*[=:]["\s]*([^"&\s]+)"#).expect("Invalid regex")
});

/// Extract a session CSRF token candidate from page text.
pub fn extract_csrf_candidate(text: &str) -> Option<String> {
    CSRF_RE.captures(text).map(|c| c[1].to_string())
}

/// Anti-forgery values a login form may require, scraped from the login
/// page. Any subset may be present depending on the portal version.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FormTokens {
    pub p_auth: Option<String>,
    pub csrf: Option<String>,
    pub authenticity: Option<String>,
}

/// Scan a login page for the token values its form variants use.
pub fn extract_form_tokens(html: &str) -> FormTokens {
    FormTokens {
        p_auth: P_AUTH_RE.captures(html).map(|c| c[1].to_string()),
        csrf: FORM_CSRF_RE.captures(html).map(|c| c[1].to_string()),
        authenticity: AUTHENTICITY_RE.captures(html).map(|c| c[1].to_string()),
    }
}

/// Walk the candidate pages until a token turns up, then install it on
/// the session. A response header beats a body scan. Total failure is a
/// warning, not an error: requests without the header often still work.
pub fn discover_csrf_token<T: Transport + ?Sized>(transport: &mut T) -> bool {
    for path in TOKEN_PAGES {
        let response = match transport.get(path, &[], &[]) {
            Ok(response) => response,
            Err(e) => {
                debug!("token probe {} failed: {}", path, e);
                continue;
            }
        };
        if !response.is_success() {
            continue;
        }
        if let Some(header) = response.header(CSRF_HEADER).filter(|h| !h.is_empty()) {
            info!("CSRF token found in {} header of {}", CSRF_HEADER, path);
            let header = header.to_string();
            transport.set_csrf_token(header);
            return true;
        }
        if let Some(token) = extract_csrf_candidate(&response.body) {
            info!("CSRF token extracted from body of {}", path);
            transport.set_csrf_token(token);
            return true;
        }
    }
    warn!("no CSRF token found on any candidate page; continuing without one");
    false
}
