//! Authentication headers for backend requests.

/// Adds `Authorization: Bearer` when a key is available; keyless local
/// endpoints get the request untouched.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    api_key: Option<&str>,
) -> reqwest::RequestBuilder {
    match api_key {
        Some(key) => request.header("Authorization", format!("Bearer {key}")),
        None => request,
    }
}
