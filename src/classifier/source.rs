//! Traffic source classification from the referrer and user agent.

use crate::classifier::tables::{
    first_host_match, IN_APP_BROWSERS, REFERRAL_HOSTS, SEARCH_ENGINES,
};
use regex::Regex;
use std::sync::OnceLock;

pub const DIRECT: &str = "Direct";
pub const UNKNOWN: &str = "Unknown";

fn url_host_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i)[a-z][a-z0-9+.\-]*://(?:[^@/?#]*@)?([^:/?#\s]+)")
            .expect("url host pattern is valid")
    })
}

/// Extract the hostname of an absolute URL, lowercased.
pub fn referrer_host(referrer: &str) -> Option<String> {
    url_host_pattern()
        .captures(referrer.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
}

/// Classify where a visit came from.
///
/// Never fails: an unparseable referrer yields "Unknown".
pub fn classify_source(user_agent: &str, referrer: &str) -> String {
    let ua_lower = user_agent.to_ascii_lowercase();
    if let Some(app) = IN_APP_BROWSERS
        .iter()
        .find(|app| app.signature.matches(&ua_lower))
    {
        return app.signature.label.to_string();
    }

    let referrer = referrer.trim();
    if referrer.is_empty() {
        return DIRECT.to_string();
    }

    let Some(host) = referrer_host(referrer) else {
        return UNKNOWN.to_string();
    };

    if let Some(label) = first_host_match(REFERRAL_HOSTS, &host) {
        return label.to_string();
    }
    if let Some(label) = first_host_match(SEARCH_ENGINES, &host) {
        return label.to_string();
    }
    host
}

/// Sources from social in-app browsers rank lowest for intent.
pub fn is_social_app(source: &str) -> bool {
    matches!(source, "Instagram" | "Facebook")
}
