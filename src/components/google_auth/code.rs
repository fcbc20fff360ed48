//! Authorization code extraction from the consent page.
//!
//! Google's out-of-band flow ends on a page that shows the code instead of
//! redirecting to a listener. The code shows up either in the final URL's
//! query string or in the visible page text, depending on which flavour of
//! the approval page was served.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use url::Url;

/// Every authorization code Google currently issues starts with this
const CODE_PREFIX: &str = "4/1";

lazy_static! {
    static ref RESPONSE_CODE: Regex = Regex::new(r"code%3D(.+?)(?:%26|&|$)").unwrap();
    static ref PAGE_PATTERNS: [Regex; 3] = [
        Regex::new(r"4/1[A-Za-z0-9_-]{40,}").unwrap(),
        Regex::new(r"(?i)paste it there:\s*([4/1][A-Za-z0-9_-]{40,})").unwrap(),
        Regex::new(r"(?is)Authorisation code.*?([4/1][A-Za-z0-9_-]{40,})").unwrap(),
    ];
}

/// Find the authorization code in the page URL or, failing that, the page text
pub fn extract_code(current_url: &str, page_text: Option<&str>) -> Option<String> {
    let url = match Url::parse(current_url) {
        Ok(url) => url,
        Err(e) => {
            debug!("Consent page URL did not parse: {}", e);
            return None;
        }
    };

    if let Some(code) = code_from_url(&url) {
        return Some(code);
    }

    page_text.and_then(code_from_text)
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn code_from_url(url: &Url) -> Option<String> {
    if let Some(approval) = query_param(url, "approvalCode") {
        if approval.starts_with(CODE_PREFIX) {
            debug!("Found approval code in URL params");
            return Some(approval);
        }
    }

    // `response` carries a still-encoded `code=` pair
    if let Some(response) = query_param(url, "response") {
        if let Some(captures) = RESPONSE_CODE.captures(&response) {
            let raw = &captures[1];
            let decoded = urlencoding::decode(raw)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            debug!("Found code in response parameter");
            return Some(decoded);
        }
    }

    if let Some(code) = query_param(url, "code") {
        if code.starts_with(CODE_PREFIX) {
            debug!("Found code in URL code param");
            return Some(code);
        }
    }

    None
}

fn code_from_text(text: &str) -> Option<String> {
    for pattern in PAGE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(text) {
            let code = captures
                .get(1)
                .or_else(|| captures.get(0))
                .map(|m| m.as_str().trim().to_string())?;
            debug!("Found code in page content");
            return Some(code);
        }
    }
    None
}
