//! Shared utility functions for the shop service.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};

/// Format a Unix timestamp as a human-readable date (e.g., "Jan 15, 2024")
pub fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

/// Format an amount in cents as an AUD display string (e.g., "$50.00").
pub fn format_aud(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{}${}.{:02}", sign, cents / 100, cents % 100)
}

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_aud_pads_cents() {
        assert_eq!(format_aud(5000), "$50.00");
        assert_eq!(format_aud(1001), "$10.01");
        assert_eq!(format_aud(9), "$0.09");
        assert_eq!(format_aud(-250), "-$2.50");
    }

    #[test]
    fn format_date_known_timestamp() {
        // 2024-01-15 00:00:00 UTC
        assert_eq!(format_date(1705276800), "Jan 15, 2024");
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc123"));

        let mut bad = HeaderMap::new();
        bad.insert("Authorization", "Basic abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&bad), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }
}
