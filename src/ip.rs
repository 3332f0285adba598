//! Best-effort public IP lookup.
//!
//! A failed or disabled lookup yields `None`; the session is recorded with
//! an unknown IP rather than failing.

/// Source of the visitor's public IP address.
pub trait IpLookup: Send + Sync {
    fn lookup(&self) -> Option<String>;
}

/// Lookup that never resolves an address.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIpLookup;

impl IpLookup for NoIpLookup {
    fn lookup(&self) -> Option<String> {
        None
    }
}

/// Lookup returning a fixed address. Useful when the host already knows the
/// address, e.g. from a request's peer address.
#[derive(Debug, Clone)]
pub struct StaticIp(pub String);

impl IpLookup for StaticIp {
    fn lookup(&self) -> Option<String> {
        Some(self.0.clone()).filter(|ip| !ip.trim().is_empty())
    }
}

#[cfg(feature = "remote")]
pub use remote::IpifyLookup;

#[cfg(feature = "remote")]
mod remote {
    use super::IpLookup;
    use serde::Deserialize;
    use std::time::Duration;

    /// Default lookup endpoint.
    pub const IPIFY_URL: &str = "https://api.ipify.org?format=json";

    #[derive(Debug, Deserialize)]
    struct IpifyResponse {
        ip: String,
    }

    /// Lookup via the ipify JSON API.
    ///
    /// Uses a blocking client; call it from a blocking context.
    pub struct IpifyLookup {
        client: Option<reqwest::blocking::Client>,
        url: String,
    }

    impl IpifyLookup {
        pub fn new() -> Self {
            Self::with_url(IPIFY_URL)
        }

        pub fn with_url(url: impl Into<String>) -> Self {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .map_err(|e| tracing::warn!("Could not build IP lookup client: {}", e))
                .ok();
            Self {
                client,
                url: url.into(),
            }
        }
    }

    impl Default for IpifyLookup {
        fn default() -> Self {
            Self::new()
        }
    }

    impl IpLookup for IpifyLookup {
        fn lookup(&self) -> Option<String> {
            let client = self.client.as_ref()?;
            let response = client
                .get(&self.url)
                .send()
                .map_err(|e| tracing::debug!("IP lookup failed: {}", e))
                .ok()?;
            if !response.status().is_success() {
                tracing::debug!("IP lookup returned {}", response.status());
                return None;
            }
            response
                .json::<IpifyResponse>()
                .map(|r| r.ip)
                .map_err(|e| tracing::debug!("IP lookup response unreadable: {}", e))
                .ok()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_unreachable_endpoint_degrades() {
            let lookup = IpifyLookup::with_url("http://127.0.0.1:9/");
            assert_eq!(lookup.lookup(), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_and_noop_lookups() {
        assert_eq!(NoIpLookup.lookup(), None);
        assert_eq!(
            StaticIp("203.0.113.7".to_string()).lookup().as_deref(),
            Some("203.0.113.7")
        );
        assert_eq!(StaticIp(String::new()).lookup(), None);
    }
}
