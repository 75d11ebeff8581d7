//! Common utility functions used across Sidekick components

use chrono::Utc;
use uuid::Uuid;

/// Short random suffix (8 characters)
fn generate_short_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

/// Generate a timestamped ID with optional prefix
pub fn generate_timestamped_id(prefix: Option<&str>) -> String {
    let timestamp = Utc::now().timestamp();
    let short_uuid = generate_short_id();

    match prefix {
        Some(p) => format!("{}_{}_{}", p, timestamp, short_uuid),
        None => format!("{}_{}", timestamp, short_uuid),
    }
}

/// Parse a stored numeric id. Missing, blank or non-numeric values are absent.
pub fn parse_numeric_id(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
}

/// Initials of a display name, "U" when the name is empty
pub fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|part| part.chars().next())
        .collect();
    if letters.is_empty() {
        "U".to_string()
    } else {
        letters
    }
}
