//! Proxy string handling.
//!
//! The engine does not decide proxy policy; it accepts either nothing
//! (direct connections, environment ignored) or a single proxy string that
//! is applied to every agent for both schemes.

/// Normalizes a `host:port` or URL proxy string.
///
/// Blank input yields `None`. A value without a scheme gets `http://`.
#[must_use]
pub fn normalize_proxy(proxy: &str) -> Option<String> {
    let trimmed = proxy.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") {
        Some(trimmed.to_string())
    } else {
        Some(format!("http://{trimmed}"))
    }
}

/// Returns the first non-empty proxy variable for `scheme` from the environment.
///
/// Used by hosts that opt into environment proxies; the engine itself never
/// reads the environment.
#[must_use]
pub fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
