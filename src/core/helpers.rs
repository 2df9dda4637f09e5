use chrono::SecondsFormat;
use uuid::Uuid;

/// Fixed-width UTC timestamp, so string order matches time order.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Display name for an account that has none stored: the local part of its email.
pub fn fallback_display_name(email: &str) -> String {
    match email.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => "User".to_string(),
    }
}
