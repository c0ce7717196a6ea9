//! Outbound HTTP capability backing the client verbs.

use crate::value::Response;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::time::Duration;

/// One long-lived client shared by every `fetch`/`send`/`put`/`delete`,
/// with a bounded per-request timeout.
static CLIENT: Lazy<reqwest::blocking::Client> = Lazy::new(|| {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build HTTP client")
});

/// Performs one HTTP exchange and captures status, body, and one
/// representative value per header name.
///
/// `headers` entries are `"Name: Value"` strings; entries without a colon
/// are skipped. Transport failures surface as the error string; no retries.
pub fn http_exchange(
    method: &str,
    url: &str,
    body: Option<String>,
    headers: &[String],
) -> Result<Response, String> {
    let mut request = match method {
        "GET" => CLIENT.get(url),
        "POST" => CLIENT.post(url),
        "PUT" => CLIENT.put(url),
        "DELETE" => CLIENT.delete(url),
        other => return Err(format!("unsupported HTTP method: {}", other)),
    };

    if let Some(body) = body {
        request = request.body(body);
    }

    for entry in headers {
        if let Some((name, value)) = entry.split_once(':') {
            request = request.header(name.trim(), value.trim());
        }
    }

    let response = request.send().map_err(|e| e.to_string())?;

    let status = response.status().as_u16();
    let raw_headers = response.headers().clone();
    let body = response.text().map_err(|e| e.to_string())?;

    let mut header_map = HashMap::new();
    for (name, value) in raw_headers.iter() {
        if let Ok(value) = value.to_str() {
            header_map.insert(canonical_header_name(name.as_str()), value.to_string());
        }
    }

    Ok(Response {
        status,
        body,
        headers: header_map,
    })
}

/// Canonical `Content-Type`-style capitalization for a header name.
///
/// The wire layer hands names over lowercased; user code looks headers up
/// by their conventional spelling.
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("content-type"), "Content-Type");
        assert_eq!(canonical_header_name("x-request-id"), "X-Request-Id");
        assert_eq!(canonical_header_name("ACCEPT"), "Accept");
    }
}
