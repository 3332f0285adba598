//! Device and context classification.
//!
//! Turns raw browser signals (user agent, referrer, screen geometry, locale)
//! into an immutable [`SessionContext`]. Classification is best-effort and
//! total: every field of the result is a non-empty string.

pub mod source;
pub mod tables;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub use source::{classify_source, is_social_app, referrer_host, DIRECT, UNKNOWN};
use tables::{
    first_match, lookup_screen, BOT_SIGNATURES, BROWSERS, IN_APP_BROWSERS, IPHONE_SCREENS,
    OPERATING_SYSTEMS,
};

/// Coarse device form factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Desktop => write!(f, "Desktop"),
            DeviceType::Mobile => write!(f, "Mobile"),
            DeviceType::Tablet => write!(f, "Tablet"),
        }
    }
}

/// Screen geometry as reported by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenInfo {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
    /// Device pixel ratio
    pub pixel_ratio: f64,
}

impl Default for ScreenInfo {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            pixel_ratio: 1.0,
        }
    }
}

impl ScreenInfo {
    pub fn new(width: u32, height: u32, pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
        }
    }

    /// Parse `"<w>x<h>"` or `"<w>x<h>@<dpr>"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (dims, dpr) = match s.split_once('@') {
            Some((dims, dpr)) => (dims, dpr.trim().parse::<f64>().ok()?),
            None => (s, 1.0),
        };
        let (w, h) = dims.split_once(['x', 'X'])?;
        Some(Self::new(w.trim().parse().ok()?, h.trim().parse().ok()?, dpr))
    }

    /// Resolution string, e.g. "1920x1080". "Unknown" when not reported.
    pub fn resolution(&self) -> String {
        if self.width == 0 || self.height == 0 {
            UNKNOWN.to_string()
        } else {
            format!("{}x{}", self.width, self.height)
        }
    }
}

/// Raw signals captured from the browser at page load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientSignals {
    pub user_agent: String,
    pub referrer: String,
    pub screen: ScreenInfo,
    pub locale: String,
}

/// Immutable snapshot of where a visit came from and on what device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionContext {
    pub browser: String,
    pub os: String,
    pub device_type: DeviceType,
    pub device_model: String,
    pub source: String,
    pub user_agent: String,
    pub screen_resolution: String,
    pub locale: String,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            browser: UNKNOWN.to_string(),
            os: UNKNOWN.to_string(),
            device_type: DeviceType::Desktop,
            device_model: UNKNOWN.to_string(),
            source: DIRECT.to_string(),
            user_agent: UNKNOWN.to_string(),
            screen_resolution: UNKNOWN.to_string(),
            locale: UNKNOWN.to_string(),
        }
    }
}

fn android_model_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Android.*;\s*([^;]+?)\s*Build").expect("android model pattern is valid")
    })
}

fn non_empty(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Classify a visit's context. Pure; never fails.
pub fn classify(signals: &ClientSignals) -> SessionContext {
    let ua = signals.user_agent.as_str();
    let ua_lower = ua.to_ascii_lowercase();

    let in_app = IN_APP_BROWSERS
        .iter()
        .find(|app| app.signature.matches(&ua_lower));

    let browser = in_app
        .map(|app| app.browser)
        .or_else(|| first_match(BROWSERS, ua))
        .unwrap_or(UNKNOWN);
    let os = first_match(OPERATING_SYSTEMS, ua).unwrap_or(UNKNOWN);

    let (device_type, device_model) = if ua_lower.contains("ipad") {
        (DeviceType::Tablet, "iPad".to_string())
    } else if ua_lower.contains("iphone") || ua_lower.contains("ipod") {
        let screen = signals.screen;
        let model = match lookup_screen(IPHONE_SCREENS, screen.width, screen.height, screen.pixel_ratio)
        {
            Some(inferred) => format!("iPhone (Likely {inferred})"),
            None => "iPhone".to_string(),
        };
        (DeviceType::Mobile, model)
    } else if ua_lower.contains("android") {
        let model = android_model_pattern()
            .captures(ua)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Android Device".to_string());
        (DeviceType::Mobile, model)
    } else if in_app.is_some() {
        (DeviceType::Mobile, "Mobile Device".to_string())
    } else {
        (DeviceType::Desktop, "Desktop/Laptop".to_string())
    };

    SessionContext {
        browser: browser.to_string(),
        os: os.to_string(),
        device_type,
        device_model,
        source: classify_source(ua, &signals.referrer),
        user_agent: non_empty(ua),
        screen_resolution: signals.screen.resolution(),
        locale: non_empty(&signals.locale),
    }
}

/// Check a user agent against known bot, crawler and headless signatures.
pub fn is_suspicious_agent(user_agent: &str) -> bool {
    first_match(BOT_SIGNATURES, user_agent).is_some()
}
