//! Header allow-list applied to scraped pages before they are frozen.
//!
//! Only headers named here survive into committed fixtures; everything else
//! (cookies, dates, server banners, auth tokens) is volatile or sensitive.

use actc_types::PageSnapshot;
use serde_json::Value;

pub const HEADER_ALLOW_LIST: [&str; 1] = ["content-type"];

/// Header names compare case-insensitively, as HTTP defines them.
pub fn is_allowed(name: &str) -> bool {
    HEADER_ALLOW_LIST
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(name))
}

/// Keep only allow-listed `{ "name", "value" }` headers, preserving order.
/// Entries without a string name are dropped.
pub fn filter_headers(headers: Vec<Value>) -> Vec<Value> {
    headers
        .into_iter()
        .filter(|header| {
            header
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(is_allowed)
        })
        .collect()
}

/// Filter both request and response headers of a page snapshot in place.
pub fn scrub_page_headers(page: &mut PageSnapshot) {
    for pointer in ["/request/headers", "/response/headers"] {
        if let Some(Value::Array(headers)) = page.as_value_mut().pointer_mut(pointer) {
            let kept = filter_headers(std::mem::take(headers));
            *headers = kept;
        }
    }
}
