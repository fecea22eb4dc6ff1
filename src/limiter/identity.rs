//! Client identity extraction.

use axum::http::HeaderMap;

/// Identity used when no proxy header names the client.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// First `x-forwarded-for` entry, then `x-real-ip`, else `"unknown"`.
pub fn client_identity(headers: &HeaderMap) -> String {
    // X-Forwarded-For is "client, proxy1, proxy2"
    if let Some(client_ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return client_ip.to_string();
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return real_ip.to_string();
    }

    UNKNOWN_CLIENT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_identity(&headers), "1.2.3.4");
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_identity(&headers), "9.9.9.9");
    }

    #[test]
    fn test_unknown_without_headers() {
        assert_eq!(client_identity(&HeaderMap::new()), UNKNOWN_CLIENT);
    }
}
