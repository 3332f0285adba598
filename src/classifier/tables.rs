//! Static lookup tables driving the classifier.
//!
//! Each table is an ordered list of signatures; the first entry whose needle
//! appears in the input (case-insensitively) wins. Adding a browser, OS or
//! device fingerprint means adding a row here, not touching control flow.

/// An ordered pattern -> label row.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    /// Substrings, any of which selects this row
    pub needles: &'static [&'static str],
    /// Label reported on match
    pub label: &'static str,
}

impl Signature {
    /// Check whether any needle occurs in the (already lowercased) haystack.
    pub fn matches(&self, haystack_lower: &str) -> bool {
        self.needles
            .iter()
            .any(|needle| haystack_lower.contains(&needle.to_ascii_lowercase()))
    }
}

/// Find the first matching row's label.
pub fn first_match(table: &[Signature], haystack: &str) -> Option<&'static str> {
    let lower = haystack.to_ascii_lowercase();
    table.iter().find(|s| s.matches(&lower)).map(|s| s.label)
}

/// Find the first row with a needle naming `host` or one of its parent
/// domains.
///
/// A needle ending in `.` (e.g. `google.`) names a brand label followed by a
/// public suffix of one or two labels, so `google.co.uk` matches but
/// `google.com.example.net` does not.
pub fn first_host_match(table: &[Signature], host: &str) -> Option<&'static str> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    table
        .iter()
        .find(|s| s.needles.iter().any(|needle| host_matches(&host, needle)))
        .map(|s| s.label)
}

fn host_matches(host: &str, needle: &str) -> bool {
    let needle = needle.to_ascii_lowercase();
    match needle.strip_suffix('.') {
        Some(brand) => {
            let labels: Vec<&str> = host.split('.').collect();
            labels
                .iter()
                .position(|label| *label == brand)
                .is_some_and(|i| matches!(labels.len() - i - 1, 1 | 2))
        }
        None => host == needle || host.ends_with(&format!(".{needle}")),
    }
}

/// In-app browsers embedded in social apps, keyed to the app name used as
/// traffic source.
#[derive(Debug, Clone, Copy)]
pub struct InAppBrowser {
    pub signature: Signature,
    /// Browser label, e.g. "Instagram WebView"
    pub browser: &'static str,
}

pub const IN_APP_BROWSERS: &[InAppBrowser] = &[
    InAppBrowser {
        signature: Signature {
            needles: &["Instagram"],
            label: "Instagram",
        },
        browser: "Instagram WebView",
    },
    InAppBrowser {
        signature: Signature {
            needles: &["FBAN", "FBAV"],
            label: "Facebook",
        },
        browser: "Facebook WebView",
    },
    InAppBrowser {
        signature: Signature {
            needles: &["LinkedInApp"],
            label: "LinkedIn",
        },
        browser: "LinkedIn WebView",
    },
];

/// Generic browser signatures. Order matters: Edge and Opera also carry
/// "Chrome", and almost everything carries "Safari".
pub const BROWSERS: &[Signature] = &[
    Signature {
        needles: &["Edg"],
        label: "Edge",
    },
    Signature {
        needles: &["OPR", "Opera"],
        label: "Opera",
    },
    Signature {
        needles: &["Firefox", "FxiOS"],
        label: "Firefox",
    },
    Signature {
        needles: &["CriOS", "Chrome"],
        label: "Chrome",
    },
    Signature {
        needles: &["Safari"],
        label: "Safari",
    },
];

pub const OPERATING_SYSTEMS: &[Signature] = &[
    Signature {
        needles: &["iPhone", "iPad", "iPod"],
        label: "iOS",
    },
    Signature {
        needles: &["Android"],
        label: "Android",
    },
    Signature {
        needles: &["Macintosh", "Mac OS X"],
        label: "MacOS",
    },
    Signature {
        needles: &["Windows"],
        label: "Windows",
    },
    Signature {
        needles: &["CrOS"],
        label: "ChromeOS",
    },
    Signature {
        needles: &["Linux"],
        label: "Linux",
    },
];

/// Automation and crawler signatures.
pub const BOT_SIGNATURES: &[Signature] = &[Signature {
    needles: &[
        "bot",
        "crawl",
        "spider",
        "slurp",
        "headless",
        "phantomjs",
        "puppeteer",
        "playwright",
        "selenium",
        "lighthouse",
    ],
    label: "Bot",
}];

/// Referrer hosts that map to a named professional/social source. Matched
/// with [`first_host_match`].
pub const REFERRAL_HOSTS: &[Signature] = &[
    Signature {
        needles: &["linkedin.com", "lnkd.in"],
        label: "LinkedIn",
    },
    Signature {
        needles: &["github.com"],
        label: "GitHub",
    },
];

/// Search engine hosts collapsed to a canonical label. Matched with
/// [`first_host_match`].
pub const SEARCH_ENGINES: &[Signature] = &[
    Signature {
        needles: &["google."],
        label: "Google Search",
    },
    Signature {
        needles: &["bing.com"],
        label: "Bing Search",
    },
    Signature {
        needles: &["duckduckgo.com"],
        label: "DuckDuckGo Search",
    },
];

/// A known phone screen: long edge x short edge in CSS pixels at a device
/// pixel ratio.
#[derive(Debug, Clone, Copy)]
pub struct ScreenFingerprint {
    pub long_edge: u32,
    pub short_edge: u32,
    pub pixel_ratio: f64,
    pub model: &'static str,
}

pub const IPHONE_SCREENS: &[ScreenFingerprint] = &[
    ScreenFingerprint {
        long_edge: 844,
        short_edge: 390,
        pixel_ratio: 3.0,
        model: "iPhone 12 / 12 Pro / 13 / 14",
    },
    ScreenFingerprint {
        long_edge: 926,
        short_edge: 428,
        pixel_ratio: 3.0,
        model: "iPhone 12 Pro Max / 13 Pro Max / 14 Plus",
    },
    ScreenFingerprint {
        long_edge: 812,
        short_edge: 375,
        pixel_ratio: 3.0,
        model: "iPhone X / XS / 11 Pro",
    },
    ScreenFingerprint {
        long_edge: 896,
        short_edge: 414,
        pixel_ratio: 2.0,
        model: "iPhone XR / 11",
    },
    ScreenFingerprint {
        long_edge: 780,
        short_edge: 360,
        pixel_ratio: 3.0,
        model: "iPhone 12 mini / 13 mini",
    },
    ScreenFingerprint {
        long_edge: 852,
        short_edge: 393,
        pixel_ratio: 3.0,
        model: "iPhone 14 Pro / 15 Pro",
    },
    ScreenFingerprint {
        long_edge: 932,
        short_edge: 430,
        pixel_ratio: 3.0,
        model: "iPhone 14 Pro Max / 15 Pro Max",
    },
];

/// Look up a phone model by screen geometry. Orientation does not matter.
pub fn lookup_screen(
    table: &[ScreenFingerprint],
    width: u32,
    height: u32,
    pixel_ratio: f64,
) -> Option<&'static str> {
    let long_edge = width.max(height);
    let short_edge = width.min(height);
    table
        .iter()
        .find(|f| {
            f.long_edge == long_edge
                && f.short_edge == short_edge
                && (f.pixel_ratio - pixel_ratio).abs() < 0.01
        })
        .map(|f| f.model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_respects_order() {
        let edge = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 Chrome/120.0 Safari/537.36 Edg/120.0";
        assert_eq!(first_match(BROWSERS, edge), Some("Edge"));
        assert_eq!(first_match(BROWSERS, "Chrome/120 Safari/537"), Some("Chrome"));
        assert_eq!(first_match(BROWSERS, "nothing here"), None);
    }

    #[test]
    fn test_lookup_screen_ignores_orientation() {
        assert_eq!(
            lookup_screen(IPHONE_SCREENS, 844, 390, 3.0),
            Some("iPhone 12 / 12 Pro / 13 / 14")
        );
        assert_eq!(
            lookup_screen(IPHONE_SCREENS, 390, 844, 3.0),
            Some("iPhone 12 / 12 Pro / 13 / 14")
        );
        assert_eq!(lookup_screen(IPHONE_SCREENS, 390, 844, 2.0), None);
    }
}
